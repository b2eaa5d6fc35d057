//! Adapter interfaces for external collaborators.
//!
//! The core never decodes, renders, or tracks anything itself. These seams
//! describe what it needs from the asset loader, the marker tracker, and
//! folder access, plus headless implementations for tools and tests.

pub mod folder;
pub mod headless;
pub mod model;
pub mod model_cache;
pub mod tracking;

pub use folder::LinkedFolder;
pub use headless::{HeadlessLoader, HeadlessModel};
pub use model::{ModelHandle, ModelLoader};
pub use model_cache::CachingLoader;
pub use tracking::{AnchorUpdate, MarkerBoard};
