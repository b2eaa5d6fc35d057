//! Geometry primitives for marker triangulation.
//!
//! Single-precision vectors, a column-major 3x3 matrix, and unit quaternions
//! (w, x, y, z convention). Only the operations the pose engine and its
//! observers need are provided.

use serde::{Deserialize, Serialize};

/// A 3-D point or direction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Create a new vector.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Right-handed cross product.
    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction.
    ///
    /// A zero-length input yields non-finite components; callers check
    /// [`Vec3::is_finite`] rather than relying on a sentinel.
    pub fn normalize(self) -> Self {
        self.scale(1.0 / self.length())
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn distance(self, rhs: Self) -> f32 {
        self.sub(rhs).length()
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Vec3> for [f32; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5}, {:.5})", self.x, self.y, self.z)
    }
}

impl std::str::FromStr for Vec3 {
    type Err = anyhow::Error;

    /// Parse `x,y,z`.
    fn from_str(s: &str) -> anyhow::Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            anyhow::bail!("Expected three comma-separated components, got: {}", s);
        }
        let mut out = [0.0f32; 3];
        for (slot, part) in out.iter_mut().zip(parts) {
            *slot = part
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid component '{}': {}", part, e))?;
        }
        Ok(out.into())
    }
}

/// Column-major 3x3 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3 {
    pub columns: [Vec3; 3],
}

impl Mat3 {
    pub fn from_columns(x: Vec3, y: Vec3, z: Vec3) -> Self {
        Self { columns: [x, y, z] }
    }

    /// Element at `row`, `col`.
    fn at(&self, row: usize, col: usize) -> f32 {
        let c = self.columns[col];
        match row {
            0 => c.x,
            1 => c.y,
            _ => c.z,
        }
    }

    pub fn determinant(&self) -> f32 {
        let [a, b, c] = self.columns;
        a.dot(b.cross(c))
    }
}

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    /// Create a quaternion. The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub const fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// Convert a proper rotation matrix into a quaternion.
    ///
    /// Branches on the largest diagonal term so the square root argument
    /// stays well away from zero.
    pub fn from_rotation_matrix(m: &Mat3) -> Self {
        let (m00, m11, m22) = (m.at(0, 0), m.at(1, 1), m.at(2, 2));
        let trace = m00 + m11 + m22;

        let q = if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Self::new(
                0.25 * s,
                (m.at(2, 1) - m.at(1, 2)) / s,
                (m.at(0, 2) - m.at(2, 0)) / s,
                (m.at(1, 0) - m.at(0, 1)) / s,
            )
        } else if m00 > m11 && m00 > m22 {
            let s = (1.0 + m00 - m11 - m22).sqrt() * 2.0;
            Self::new(
                (m.at(2, 1) - m.at(1, 2)) / s,
                0.25 * s,
                (m.at(0, 1) + m.at(1, 0)) / s,
                (m.at(0, 2) + m.at(2, 0)) / s,
            )
        } else if m11 > m22 {
            let s = (1.0 + m11 - m00 - m22).sqrt() * 2.0;
            Self::new(
                (m.at(0, 2) - m.at(2, 0)) / s,
                (m.at(0, 1) + m.at(1, 0)) / s,
                0.25 * s,
                (m.at(1, 2) + m.at(2, 1)) / s,
            )
        } else {
            let s = (1.0 + m22 - m00 - m11).sqrt() * 2.0;
            Self::new(
                (m.at(1, 0) - m.at(0, 1)) / s,
                (m.at(0, 2) + m.at(2, 0)) / s,
                (m.at(1, 2) + m.at(2, 1)) / s,
                0.25 * s,
            )
        };

        q.normalize()
    }

    pub fn norm(self) -> f32 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn normalize(self) -> Self {
        let n = self.norm();
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }

    /// The rotation matrix whose columns are the rotated unit axes.
    pub fn to_rotation_matrix(self) -> Mat3 {
        Mat3::from_columns(
            self.rotate(Vec3::new(1.0, 0.0, 0.0)),
            self.rotate(Vec3::new(0.0, 1.0, 0.0)),
            self.rotate(Vec3::new(0.0, 0.0, 1.0)),
        )
    }
}

/// A rigid transform: the anchor's position and orientation in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quaternion,
}

impl Pose {
    pub fn new(position: Vec3, orientation: Quaternion) -> Self {
        Self {
            position,
            orientation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Vec3, b: Vec3) {
        assert!(a.distance(b) < 1e-5, "{} != {}", a, b);
    }

    #[test]
    fn test_cross_is_right_handed() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::new(0.0, 1.0, 0.0);
        assert_close(x.cross(y), Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_normalize_zero_is_not_finite() {
        assert!(!Vec3::zero().normalize().is_finite());
    }

    #[test]
    fn test_quaternion_matrix_roundtrip() {
        // 90 degrees about Z.
        let m = Mat3::from_columns(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        );
        let q = Quaternion::from_rotation_matrix(&m);
        let back = q.to_rotation_matrix();
        for i in 0..3 {
            assert_close(back.columns[i], m.columns[i]);
        }
        assert!((q.norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_quaternion_from_half_turn() {
        // Trace is -1 here, exercising the non-trace branches.
        let m = Mat3::from_columns(
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(0.0, 0.0, -1.0),
        );
        let q = Quaternion::from_rotation_matrix(&m);
        assert_close(q.rotate(Vec3::new(0.0, 1.0, 0.0)), Vec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn test_vec3_from_str() {
        let v: Vec3 = "0, 0.12,-1".parse().unwrap();
        assert_eq!(v, Vec3::new(0.0, 0.12, -1.0));
        assert!("1,2".parse::<Vec3>().is_err());
        assert!("a,b,c".parse::<Vec3>().is_err());
    }
}
