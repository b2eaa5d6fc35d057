//! Placement core.
//!
//! - PoseEstimator: marker triangle to anchor pose
//! - PlacementEngine: visibility and pose gating for the active model
//! - PlacementActor: serialized event loop around the engine

pub mod actor;
pub mod placement;
pub mod pose;

pub use actor::{PlacementActor, PlacementCommand, PlacementHandle};
pub use placement::{MarkerOutcome, PlacementEngine};
pub use pose::{PoseError, PoseEstimator};
