//! Private model mirror.
//!
//! Mirrors an external folder of model files into a private cache,
//! deduplicating by content hash and keeping a catalog across restarts.

pub mod cache;
pub mod catalog;
pub mod digest;
pub mod watcher;

pub use cache::{ContentCache, SyncError, SyncOutcome, SyncReport};
pub use catalog::{CatalogError, CatalogSnapshot};
pub use digest::{compute_file_hash, ContentDigester, Sha256Digester};
pub use watcher::{FolderWatcher, WatchEvent, WatchHandle};
