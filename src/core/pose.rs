//! Marker triangulation.
//!
//! Converts three tracked marker positions into a rigid transform. Marker
//! order carries meaning:
//!
//! - `p0` is the reference corner and becomes the basis origin side
//! - `p1` is the neighbour along the model's +Y axis (Y points from p1 to p0)
//! - `p2` completes the plane; Z is the plane normal `(p1-p0) x (p2-p0)`
//!
//! Permuting the inputs yields a different physical alignment, not just a
//! numerically different answer.

use thiserror::Error;

use crate::config::DEFAULT_POSE_EPSILON;
use crate::domain::{Mat3, Pose, Quaternion, Vec3};

/// Reasons a marker triple cannot produce a pose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoseError {
    /// Markers are nearly collinear or coincident
    #[error("Markers are too close to collinear to define a plane")]
    DegenerateTriangle,

    /// A basis vector came out non-finite
    #[error("Marker positions produced a non-finite basis vector")]
    InvalidVector,
}

/// Stateless pose computation from three marker positions
#[derive(Debug, Clone, Copy)]
pub struct PoseEstimator {
    /// Minimum length of the plane normal before normalization, in the
    /// same units as the marker positions (metres from the tracker)
    epsilon: f32,
}

impl Default for PoseEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_POSE_EPSILON)
    }
}

impl PoseEstimator {
    pub fn new(epsilon: f32) -> Self {
        Self { epsilon }
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Centroid position and `(x, y, z)` column-basis orientation.
    pub fn compute_pose(&self, p0: Vec3, p1: Vec3, p2: Vec3) -> Result<Pose, PoseError> {
        let center = p0.add(p1).add(p2).scale(1.0 / 3.0);

        let normal = p1.sub(p0).cross(p2.sub(p0));
        // A NaN length fails this comparison too.
        if !(normal.length() > self.epsilon) {
            return Err(PoseError::DegenerateTriangle);
        }

        let z = normal.normalize();
        let y = p0.sub(p1).normalize();
        let x = y.cross(z).normalize();

        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(PoseError::InvalidVector);
        }

        let basis = Mat3::from_columns(x, y, z);
        Ok(Pose::new(center, Quaternion::from_rotation_matrix(&basis)))
    }
}
