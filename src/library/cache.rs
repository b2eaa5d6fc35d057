//! Content-addressed mirror of an external model folder.
//!
//! A sync walks the source folder, reuses records whose modification time
//! is unchanged, hashes everything else, and stages fresh copies in a
//! scratch directory. Only when the whole walk succeeds are staged copies
//! moved into the mirror and the new catalog written. A failed or cancelled
//! sync leaves both untouched.
//!
//! # Storage Layout
//!
//! ```text
//! <home>/
//! ├── catalog.json          # CatalogSnapshot (JSON array of records)
//! ├── .sync.lock            # advisory lock, one sync per home
//! ├── .staging/<uuid>/      # scratch copies for an in-flight sync
//! └── models/
//!     └── <relativePath>    # mirrored asset
//! ```

use std::fs::OpenOptions;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use glob::Pattern;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::catalog::{CatalogError, CatalogSnapshot};
use super::digest::{ContentDigester, Sha256Digester};
use crate::config::SyncSettings;
use crate::domain::AssetRecord;

/// Errors that can occur during a sync
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Source folder unavailable: {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Another process is syncing into {0}")]
    Busy(PathBuf),
}

impl SyncError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn source_unavailable(path: &Path, source: std::io::Error) -> Self {
        Self::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Counters describing what a sync did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Asset files found in the source
    pub discovered: usize,
    /// Records reused via the modification-time fast path
    pub reused: usize,
    /// Files whose content was hashed
    pub hashed: usize,
    /// Files copied into the mirror
    pub copied: usize,
    /// Records dropped because their source disappeared
    pub dropped: usize,
}

/// Records produced by a sync plus its report
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Sorted case-insensitively by display name
    pub records: Vec<AssetRecord>,
    pub report: SyncReport,
}

/// A candidate asset found while walking the source
struct SourceFile {
    absolute: PathBuf,
    relative: String,
    modified: DateTime<Utc>,
}

/// Owns the private mirror directory and its catalog
pub struct ContentCache {
    home: PathBuf,
    mirror_dir: PathBuf,
    catalog_path: PathBuf,
    settings: SyncSettings,
    exclude: Vec<Pattern>,
    digester: Arc<dyn ContentDigester>,

    /// In-memory catalog; the lock also serializes syncs on this instance
    catalog: Mutex<CatalogSnapshot>,
}

impl ContentCache {
    /// Open a cache rooted at `home`, seeding the in-memory catalog from disk
    pub async fn open(home: impl Into<PathBuf>, settings: SyncSettings) -> Result<Self, SyncError> {
        let chunk_size = settings.chunk_size_bytes;
        Self::open_with_digester(home, settings, Arc::new(Sha256Digester::new(chunk_size))).await
    }

    /// Open a cache with a custom content digester
    pub async fn open_with_digester(
        home: impl Into<PathBuf>,
        settings: SyncSettings,
        digester: Arc<dyn ContentDigester>,
    ) -> Result<Self, SyncError> {
        let home = home.into();
        let mirror_dir = home.join("models");
        let catalog_path = home.join("catalog.json");

        fs::create_dir_all(&mirror_dir)
            .await
            .map_err(|e| SyncError::io(&mirror_dir, e))?;

        let catalog = CatalogSnapshot::load(&catalog_path).await?;
        info!(records = catalog.len(), "Loaded catalog");

        let exclude = settings
            .exclude
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Ignoring invalid exclude pattern '{}': {}", p, e);
                    None
                }
            })
            .collect();

        Ok(Self {
            home,
            mirror_dir,
            catalog_path,
            settings,
            exclude,
            digester,
            catalog: Mutex::new(catalog),
        })
    }

    pub fn mirror_dir(&self) -> &Path {
        &self.mirror_dir
    }

    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    /// Deterministic mirror location for a record. Performs no I/O.
    pub fn resolve_local_path(&self, record: &AssetRecord) -> PathBuf {
        mirror_location(&self.mirror_dir, &record.relative_path)
    }

    /// Current catalog sorted by display name
    pub async fn records(&self) -> Vec<AssetRecord> {
        self.catalog.lock().await.sorted_by_name()
    }

    /// Clone of the current in-memory catalog
    pub async fn snapshot(&self) -> CatalogSnapshot {
        self.catalog.lock().await.clone()
    }

    /// Mirror `source_root` and return its records sorted by display name
    pub async fn sync(&self, source_root: &Path) -> Result<Vec<AssetRecord>, SyncError> {
        Ok(self.sync_with_report(source_root).await?.records)
    }

    /// Mirror `source_root`, also reporting how much work was done
    #[instrument(skip(self), fields(source = %source_root.display()))]
    pub async fn sync_with_report(&self, source_root: &Path) -> Result<SyncOutcome, SyncError> {
        let mut catalog = self.catalog.lock().await;
        let _process_lock = self.acquire_process_lock()?;

        let sources = self.walk_source(source_root).await?;
        let staging = StagingDir::create(&self.home).await?;

        let mut report = SyncReport {
            discovered: sources.len(),
            ..SyncReport::default()
        };
        let mut discovered = Vec::with_capacity(sources.len());
        let mut staged = Vec::new();

        for source in sources {
            let destination = mirror_location(&self.mirror_dir, &source.relative);
            let cached_copy_exists = fs::try_exists(&destination).await.unwrap_or(false);

            if let Some(existing) = catalog.get(&source.relative) {
                if existing.last_modified == source.modified && cached_copy_exists {
                    debug!(path = %source.relative, "Unchanged, reusing record");
                    report.reused += 1;
                    discovered.push(existing.clone());
                    continue;
                }
            }

            let hash = self
                .digester
                .digest(&source.absolute)
                .await
                .map_err(|e| SyncError::io(&source.absolute, e))?;
            report.hashed += 1;

            let same_content = catalog
                .get(&source.relative)
                .is_some_and(|existing| existing.content_hash == hash);

            if same_content && cached_copy_exists {
                debug!(path = %source.relative, "Touched but identical, keeping cached copy");
            } else {
                let scratch = staging.stage(&source.relative, &source.absolute).await?;
                staged.push((scratch, destination));
                report.copied += 1;
            }

            discovered.push(AssetRecord::new(source.relative, hash, source.modified));
        }

        let next = CatalogSnapshot::from_records(discovered)?;
        report.dropped = catalog
            .records()
            .filter(|r| next.get(&r.relative_path).is_none())
            .count();

        // Commit: mirror first, then the catalog that describes it.
        let mut journal = MirrorJournal::new(&self.mirror_dir, staging.displaced_dir());
        if let Err(e) = self.commit(&mut journal, &staged, &next).await {
            warn!("Sync commit failed, restoring mirror: {}", e);
            journal.rollback().await;
            return Err(e);
        }
        *catalog = next;
        drop(staging);

        info!(
            discovered = report.discovered,
            reused = report.reused,
            hashed = report.hashed,
            copied = report.copied,
            dropped = report.dropped,
            "Sync complete"
        );

        Ok(SyncOutcome {
            records: catalog.sorted_by_name(),
            report,
        })
    }

    /// Exclusive advisory lock on `<home>/.sync.lock`, released on drop
    fn acquire_process_lock(&self) -> Result<std::fs::File, SyncError> {
        let lock_path = self.home.join(".sync.lock");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| SyncError::io(&lock_path, e))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(file),
            Err(e) => Err(lock_error(&self.home, &lock_path, e)),
        }
    }

    /// Move staged copies into the mirror, then persist the catalog
    async fn commit(
        &self,
        journal: &mut MirrorJournal,
        staged: &[(PathBuf, PathBuf)],
        next: &CatalogSnapshot,
    ) -> Result<(), SyncError> {
        for (scratch, destination) in staged {
            journal.place(scratch, destination).await?;
        }
        next.persist(&self.catalog_path).await?;
        Ok(())
    }

    /// Recursively collect asset files under `root`, skipping hidden entries
    async fn walk_source(&self, root: &Path) -> Result<Vec<SourceFile>, SyncError> {
        let meta = fs::metadata(root)
            .await
            .map_err(|e| SyncError::source_unavailable(root, e))?;
        if !meta.is_dir() {
            return Err(SyncError::source_unavailable(
                root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            ));
        }

        let mut files = Vec::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| SyncError::source_unavailable(&dir, e))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| SyncError::source_unavailable(&dir, e))?
            {
                let name = entry.file_name();
                if name.to_string_lossy().starts_with('.') {
                    continue;
                }

                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| SyncError::source_unavailable(&path, e))?;

                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }

                if !self.is_asset(&path) {
                    continue;
                }

                // Symlinks are followed for files only.
                let metadata = fs::metadata(&path)
                    .await
                    .map_err(|e| SyncError::source_unavailable(&path, e))?;
                if !metadata.is_file() {
                    continue;
                }

                let Some(relative) = relative_key(root, &path) else {
                    warn!("Skipping non UTF-8 path: {}", path.display());
                    continue;
                };

                if self.exclude.iter().any(|p| p.matches(&relative)) {
                    debug!(path = %relative, "Excluded by pattern");
                    continue;
                }

                let modified = metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| DateTime::<Utc>::from(SystemTime::UNIX_EPOCH));

                files.push(SourceFile {
                    absolute: path,
                    relative,
                    modified,
                });
            }
        }

        Ok(files)
    }

    fn is_asset(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.settings.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

/// `root`-relative path with `/` separators, or None if not UTF-8
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    Some(parts?.join("/"))
}

fn mirror_location(mirror_dir: &Path, relative_path: &str) -> PathBuf {
    relative_path
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(mirror_dir.to_path_buf(), |acc, part| acc.join(part))
}

/// Only contention maps to `Busy`; anything else is a real I/O failure.
fn lock_error(home: &Path, lock_path: &Path, e: std::io::Error) -> SyncError {
    let contended = e.kind() == std::io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error();
    if contended {
        SyncError::Busy(home.to_path_buf())
    } else {
        SyncError::io(lock_path, e)
    }
}

/// One reversible change made to the mirror during a commit
#[derive(Debug)]
enum MirrorChange {
    CreatedDir(PathBuf),
    Displaced { original: PathBuf, backup: PathBuf },
    Placed(PathBuf),
}

/// Records every mirror change of a commit so a failure can undo them.
///
/// Whatever sits where a staged copy must go (a stale file, an orphaned
/// directory, or a file blocking a parent directory) is moved aside into
/// the staging area rather than deleted. On success the staging area is
/// dropped with it; on failure it is moved back.
struct MirrorJournal {
    mirror_dir: PathBuf,
    displaced_dir: PathBuf,
    changes: Vec<MirrorChange>,
}

impl MirrorJournal {
    fn new(mirror_dir: &Path, displaced_dir: PathBuf) -> Self {
        Self {
            mirror_dir: mirror_dir.to_path_buf(),
            displaced_dir,
            changes: Vec::new(),
        }
    }

    /// Move a staged copy to `destination`
    async fn place(&mut self, scratch: &Path, destination: &Path) -> Result<(), SyncError> {
        let relative = destination.strip_prefix(&self.mirror_dir).map_err(|_| {
            SyncError::io(
                destination,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "outside the mirror"),
            )
        })?;

        let mut current = self.mirror_dir.clone();
        if let Some(parent) = relative.parent() {
            for component in parent.components() {
                current.push(component);
                match fs::symlink_metadata(&current).await {
                    Ok(meta) if meta.is_dir() => {}
                    Ok(_) => {
                        self.displace(&current).await?;
                        self.create_dir(&current).await?;
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        self.create_dir(&current).await?;
                    }
                    Err(e) => return Err(SyncError::io(&current, e)),
                }
            }
        }

        match fs::symlink_metadata(destination).await {
            Ok(_) => self.displace(destination).await?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(SyncError::io(destination, e)),
        }

        fs::rename(scratch, destination)
            .await
            .map_err(|e| SyncError::io(destination, e))?;
        self.changes.push(MirrorChange::Placed(destination.to_path_buf()));
        Ok(())
    }

    async fn create_dir(&mut self, path: &Path) -> Result<(), SyncError> {
        fs::create_dir(path)
            .await
            .map_err(|e| SyncError::io(path, e))?;
        self.changes.push(MirrorChange::CreatedDir(path.to_path_buf()));
        Ok(())
    }

    /// Move a file or directory out of the way, keeping it for rollback
    async fn displace(&mut self, original: &Path) -> Result<(), SyncError> {
        fs::create_dir_all(&self.displaced_dir)
            .await
            .map_err(|e| SyncError::io(&self.displaced_dir, e))?;

        let backup = self.displaced_dir.join(self.changes.len().to_string());
        fs::rename(original, &backup)
            .await
            .map_err(|e| SyncError::io(original, e))?;

        debug!(path = %original.display(), "Displaced mirror entry");
        self.changes.push(MirrorChange::Displaced {
            original: original.to_path_buf(),
            backup,
        });
        Ok(())
    }

    /// Undo every recorded change, newest first
    async fn rollback(self) {
        for change in self.changes.into_iter().rev() {
            let result = match &change {
                MirrorChange::Placed(path) => fs::remove_file(path).await,
                MirrorChange::CreatedDir(path) => fs::remove_dir(path).await,
                MirrorChange::Displaced { original, backup } => fs::rename(backup, original).await,
            };
            if let Err(e) = result {
                warn!(?change, "Failed to undo mirror change: {}", e);
            }
        }
    }
}

/// Scratch directory for one sync, removed when dropped
struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    async fn create(home: &Path) -> Result<Self, SyncError> {
        let path = home.join(".staging").join(Uuid::new_v4().to_string());
        fs::create_dir_all(&path)
            .await
            .map_err(|e| SyncError::io(&path, e))?;
        Ok(Self { path })
    }

    /// Holding area for mirror entries replaced during the commit
    fn displaced_dir(&self) -> PathBuf {
        self.path.join(".displaced")
    }

    /// Copy `source` into the staging area under `relative`
    async fn stage(&self, relative: &str, source: &Path) -> Result<PathBuf, SyncError> {
        let scratch = mirror_location(&self.path, relative);
        if let Some(parent) = scratch.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::io(parent, e))?;
        }
        fs::copy(source, &scratch)
            .await
            .map_err(|e| SyncError::io(source, e))?;
        Ok(scratch)
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove staging dir {}: {}", self.path.display(), e);
            }
        }
    }
}
