//! Linked source folder.
//!
//! Remembers which external folder the user chose so the next launch can
//! sync from it without asking again.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LinkRecord {
    source_root: PathBuf,
    linked_at: DateTime<Utc>,
}

/// File-backed link to the user's model folder
#[derive(Debug, Clone)]
pub struct LinkedFolder {
    path: PathBuf,
}

impl LinkedFolder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Remember `source_root` as the folder to sync from
    pub async fn link(&self, source_root: impl Into<PathBuf>) -> Result<PathBuf> {
        let source_root = source_root.into();
        let source_root = fs::canonicalize(&source_root)
            .await
            .with_context(|| format!("Failed to resolve folder: {}", source_root.display()))?;

        if !fs::metadata(&source_root).await?.is_dir() {
            anyhow::bail!("Not a directory: {}", source_root.display());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let record = LinkRecord {
            source_root: source_root.clone(),
            linked_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&record)?;
        fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write folder link: {}", self.path.display()))?;

        tracing::info!("Linked model folder {}", source_root.display());
        Ok(source_root)
    }

    /// The linked folder, or None if nothing has been linked yet.
    ///
    /// Errors when the link exists but its folder is gone.
    pub async fn resolve(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read folder link: {}", self.path.display()))?;
        let record: LinkRecord =
            serde_json::from_str(&content).context("Failed to parse folder link")?;

        match fs::metadata(&record.source_root).await {
            Ok(meta) if meta.is_dir() => Ok(Some(record.source_root)),
            _ => anyhow::bail!(
                "Linked folder is no longer available: {}",
                record.source_root.display()
            ),
        }
    }

    /// Forget the link
    pub async fn unlink(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_link_round_trip() {
        let temp = TempDir::new().unwrap();
        let models = temp.path().join("models");
        std::fs::create_dir_all(&models).unwrap();

        let link = LinkedFolder::new(temp.path().join("state").join("linked_folder.json"));
        assert!(link.resolve().await.unwrap().is_none());

        let linked = link.link(&models).await.unwrap();
        assert_eq!(link.resolve().await.unwrap(), Some(linked));

        link.unlink().await.unwrap();
        assert!(link.resolve().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_link_is_error() {
        let temp = TempDir::new().unwrap();
        let models = temp.path().join("models");
        std::fs::create_dir_all(&models).unwrap();

        let link = LinkedFolder::new(temp.path().join("linked_folder.json"));
        link.link(&models).await.unwrap();
        std::fs::remove_dir_all(&models).unwrap();

        assert!(link.resolve().await.is_err());
    }

    #[tokio::test]
    async fn test_link_rejects_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.usdz");
        std::fs::write(&file, b"x").unwrap();

        let link = LinkedFolder::new(temp.path().join("linked_folder.json"));
        assert!(link.link(&file).await.is_err());
    }
}
