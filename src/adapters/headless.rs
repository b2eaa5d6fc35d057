//! Headless model loader.
//!
//! Stands in for a real renderer: validates that the mirrored file is
//! there and hands back a handle that just remembers visibility and anchor
//! transform. Used by the CLI replay command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::model::{ModelHandle, ModelLoader};
use crate::domain::Pose;

/// In-memory model handle
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessModel {
    pub source: PathBuf,
    pub size_bytes: u64,
    pub enabled: bool,
    pub transform: Option<Pose>,
}

impl ModelHandle for HeadlessModel {
    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn set_transform(&mut self, pose: &Pose) {
        self.transform = Some(*pose);
    }

    fn clone_handle(&self) -> Box<dyn ModelHandle> {
        Box::new(self.clone())
    }
}

/// Loader producing [`HeadlessModel`]s for existing files
#[derive(Debug, Clone, Default)]
pub struct HeadlessLoader;

#[async_trait]
impl ModelLoader for HeadlessLoader {
    async fn load(&self, path: &Path) -> Result<Box<dyn ModelHandle>> {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to open model: {}", path.display()))?;

        if !metadata.is_file() {
            anyhow::bail!("Model path is not a file: {}", path.display());
        }

        tracing::debug!(path = %path.display(), "Loaded headless model");

        Ok(Box::new(HeadlessModel {
            source: path.to_path_buf(),
            size_bytes: metadata.len(),
            enabled: true,
            transform: None,
        }))
    }
}
