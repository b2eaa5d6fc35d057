//! Least-recently-used cache in front of a [`ModelLoader`].
//!
//! Decoding a model is expensive, and users often flip back to the model
//! they just had. Resident entries are handed out as clones; a path is
//! decoded at most once while it stays resident.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::model::{ModelHandle, ModelLoader};

/// A [`ModelLoader`] wrapper keeping the `capacity` most recent decodes
pub struct CachingLoader<L> {
    inner: L,
    capacity: usize,
    /// Most recently used at the back
    entries: Mutex<VecDeque<(PathBuf, Box<dyn ModelHandle>)>>,
}

impl<L: ModelLoader> CachingLoader<L> {
    pub fn new(inner: L, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner,
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of resident entries
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl<L: ModelLoader> ModelLoader for CachingLoader<L> {
    async fn load(&self, path: &Path) -> Result<Box<dyn ModelHandle>> {
        // Held across the decode so concurrent requests for one path share it.
        let mut entries = self.entries.lock().await;

        if let Some(pos) = entries.iter().position(|(p, _)| p == path) {
            if let Some(entry) = entries.remove(pos) {
                debug!(path = %path.display(), "Model cache hit");
                let handle = entry.1.clone_handle();
                entries.push_back(entry);
                return Ok(handle);
            }
        }

        let decoded = self.inner.load(path).await?;
        let handle = decoded.clone_handle();

        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back((path.to_path_buf(), decoded));

        Ok(handle)
    }
}
