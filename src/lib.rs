//! overlaykit - Marker-anchored model placement toolkit
//!
//! Keeps a private, content-addressed mirror of a user's folder of 3D
//! models and places the chosen model on a physical anchor derived from
//! three tracked image markers.
//!
//! # Architecture
//!
//! - Sync is transactional: copies are staged, then committed together
//!   with the catalog, so a failed sync leaves the previous state intact
//! - Placement runs on a single event loop; observers read snapshots
//! - Rendering and tracking sit behind adapter traits
//!
//! # Modules
//!
//! - `adapters`: Loader, tracker, and folder seams (plus headless versions)
//! - `core`: Pose estimation and the placement state machine
//! - `domain`: Data structures (AssetRecord, Pose, MarkerSample)
//! - `library`: Content cache, catalog, and folder watcher
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Link and mirror a folder of models
//! overlaykit link ~/Models
//! overlaykit sync
//!
//! # Replay a recorded tracker session
//! overlaykit replay chairs/oak.usdz session.jsonl
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod library;

// Re-export main types at crate root for convenience
pub use core::{PlacementActor, PlacementEngine, PlacementHandle, PoseError, PoseEstimator};
pub use domain::{AssetRecord, MarkerSample, PlacementSnapshot, PlacementState, Pose, Vec3};
pub use library::{ContentCache, SyncError};
