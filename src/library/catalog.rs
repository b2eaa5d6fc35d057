//! Persisted catalog of synchronized assets.
//!
//! The on-disk form is a JSON array of [`AssetRecord`]s ordered by relative
//! path, so an unchanged catalog always serializes to the same bytes. Writes
//! go to a temp file in the same directory which is then renamed over the
//! previous catalog; readers only ever see a complete snapshot.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::fs;

use crate::domain::AssetRecord;

/// Errors that can occur reading or writing the catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error on catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Duplicate catalog entry: {0}")]
    DuplicateKey(String),

    #[error("Catalog writer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Full mapping of relative path to record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    records: BTreeMap<String, AssetRecord>,
}

impl CatalogSnapshot {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot, rejecting repeated relative paths
    pub fn from_records(
        records: impl IntoIterator<Item = AssetRecord>,
    ) -> Result<Self, CatalogError> {
        let mut map = BTreeMap::new();
        for record in records {
            let key = record.relative_path.clone();
            if map.insert(key.clone(), record).is_some() {
                return Err(CatalogError::DuplicateKey(key));
            }
        }
        Ok(Self { records: map })
    }

    /// Load a catalog, returning an empty one if the file does not exist
    pub async fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read(path).await.map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let records: Vec<AssetRecord> = serde_json::from_slice(&content)?;
        Self::from_records(records)
    }

    /// Atomically replace the catalog at `path` with this snapshot
    pub async fn persist(&self, path: &Path) -> Result<(), CatalogError> {
        let bytes = self.to_json()?;
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes)).await??;
        Ok(())
    }

    /// Serialized form, records ordered by relative path
    pub fn to_json(&self) -> Result<Vec<u8>, CatalogError> {
        let records: Vec<&AssetRecord> = self.records.values().collect();
        let mut bytes = serde_json::to_vec_pretty(&records)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    pub fn get(&self, relative_path: &str) -> Option<&AssetRecord> {
        self.records.get(relative_path)
    }

    pub fn records(&self) -> impl Iterator<Item = &AssetRecord> {
        self.records.values()
    }

    /// Records sorted case-insensitively by display name
    pub fn sorted_by_name(&self) -> Vec<AssetRecord> {
        let mut items: Vec<AssetRecord> = self.records.values().cloned().collect();
        items.sort_by(AssetRecord::display_order);
        items
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CatalogError> {
    let io_err = |source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(path: &str, hash: &str) -> AssetRecord {
        AssetRecord::new(path, hash, Utc::now())
    }

    #[tokio::test]
    async fn test_missing_catalog_is_empty() {
        let temp = TempDir::new().unwrap();
        let catalog = CatalogSnapshot::load(&temp.path().join("catalog.json"))
            .await
            .unwrap();
        assert!(catalog.is_empty());
    }

    #[tokio::test]
    async fn test_persist_and_load_preserves_every_field() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("catalog.json");

        let original = CatalogSnapshot::from_records(vec![
            record("b/Heart.usdz", "aa"),
            record("Lung.usdz", "bb"),
        ])
        .unwrap();
        original.persist(&path).await.unwrap();

        let loaded = CatalogSnapshot::load(&path).await.unwrap();
        assert_eq!(loaded, original);

        // No temp files left next to the catalog
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let result = CatalogSnapshot::from_records(vec![record("a.usdz", "1"), record("a.usdz", "2")]);
        assert!(matches!(result, Err(CatalogError::DuplicateKey(k)) if k == "a.usdz"));
    }

    #[test]
    fn test_serialization_is_order_independent() {
        let now = Utc::now();
        let a = AssetRecord::new("x.usdz", "1", now);
        let b = AssetRecord::new("y.usdz", "2", now);

        let first = CatalogSnapshot::from_records(vec![a.clone(), b.clone()]).unwrap();
        let second = CatalogSnapshot::from_records(vec![b, a]).unwrap();
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_catalog_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("catalog.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        assert!(matches!(
            CatalogSnapshot::load(&path).await,
            Err(CatalogError::Serialization(_))
        ));
    }
}
