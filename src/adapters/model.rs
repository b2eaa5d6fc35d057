//! Renderable model seams.
//!
//! The placement engine never looks inside a model. It only toggles
//! visibility and moves the anchor the model hangs from.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::Pose;

/// Opaque handle to a decoded, renderable model
pub trait ModelHandle: Send + Sync + std::fmt::Debug {
    /// Show or hide the model
    fn set_enabled(&mut self, enabled: bool);

    /// Move the anchor the model is attached to
    fn set_transform(&mut self, pose: &Pose);

    /// Independent instance sharing the decoded asset
    fn clone_handle(&self) -> Box<dyn ModelHandle>;
}

/// Turns a resolved local path into a renderable model
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Decode the asset at `path`
    async fn load(&self, path: &Path) -> Result<Box<dyn ModelHandle>>;
}
