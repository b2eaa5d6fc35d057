//! Synchronized asset records.

use std::cmp::Ordering;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One tracked source file and its cached copy.
///
/// `relative_path` is the identity: it is unique within a sync root and
/// stable across re-scans. It always uses `/` as the separator so catalogs
/// written on one platform read back on another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    /// Path relative to the sync root
    pub relative_path: String,

    /// Display name (last path component)
    pub file_name: String,

    /// Lowercase hex SHA-256 of the file content
    pub content_hash: String,

    /// Source-side modification time when the hash was taken
    pub last_modified: DateTime<Utc>,
}

impl AssetRecord {
    /// Build a record, deriving the display name from the relative path.
    pub fn new(
        relative_path: impl Into<String>,
        content_hash: impl Into<String>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        let relative_path = relative_path.into();
        let file_name = Path::new(&relative_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| relative_path.clone());

        Self {
            relative_path,
            file_name,
            content_hash: content_hash.into(),
            last_modified,
        }
    }

    /// Case-insensitive ordering by display name, ties broken by path.
    pub fn display_order(a: &Self, b: &Self) -> Ordering {
        a.file_name
            .to_lowercase()
            .cmp(&b.file_name.to_lowercase())
            .then_with(|| a.relative_path.cmp(&b.relative_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_derived_from_path() {
        let record = AssetRecord::new("anatomy/heart.usdz", "ab", Utc::now());
        assert_eq!(record.file_name, "heart.usdz");
    }

    #[test]
    fn test_display_order_is_case_insensitive() {
        let now = Utc::now();
        let mut records = vec![
            AssetRecord::new("b/Zeta.usdz", "1", now),
            AssetRecord::new("alpha.usdz", "2", now),
            AssetRecord::new("a/Beta.usdz", "3", now),
        ];
        records.sort_by(AssetRecord::display_order);

        let names: Vec<_> = records.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["alpha.usdz", "Beta.usdz", "Zeta.usdz"]);
    }

    #[test]
    fn test_serialized_field_names() {
        let record = AssetRecord::new("a.usdz", "00ff", Utc::now());
        let json = serde_json::to_value(&record).unwrap();

        for key in ["relativePath", "fileName", "contentHash", "lastModified"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }
}
