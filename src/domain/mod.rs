//! Domain types for overlaykit.
//!
//! This module contains the core data structures:
//! - Asset: synchronized model records
//! - Geometry: vectors, rotations, poses
//! - Marker: tracked marker samples and role assignment
//! - Placement: observable placement state

pub mod asset;
pub mod geometry;
pub mod marker;
pub mod placement;

// Re-export commonly used types
pub use asset::AssetRecord;
pub use geometry::{Mat3, Pose, Quaternion, Vec3};
pub use marker::{MarkerRoles, MarkerSample};
pub use placement::{PlacementSnapshot, PlacementState};
