//! Source folder watcher.
//!
//! Watches the linked source folder and re-runs a sync once file system
//! activity has settled, so the mirror follows edits without a manual
//! refresh.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use tokio::sync::mpsc;

use super::cache::{ContentCache, SyncReport};

/// Outcome of a sync triggered by the watcher
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Synced(SyncReport),
    Failed(String),
}

/// Watches one source root and keeps a [`ContentCache`] in step with it
pub struct FolderWatcher {
    source_root: PathBuf,
    debounce: Duration,
}

impl FolderWatcher {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            debounce: Duration::from_secs(2),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Start watching; each settled burst of changes produces one sync.
    pub fn watch(&self, cache: Arc<ContentCache>) -> Result<(mpsc::Receiver<WatchEvent>, WatchHandle)> {
        if !self.source_root.is_dir() {
            anyhow::bail!("Watch directory does not exist: {}", self.source_root.display());
        }

        let (event_tx, event_rx) = mpsc::channel::<WatchEvent>(16);
        let (stop_tx, stop_rx) = mpsc::channel::<()>(1);
        let (change_tx, change_rx) = mpsc::unbounded_channel::<()>();

        let mut debouncer = new_debouncer(self.debounce, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    if events.iter().any(|e| !is_hidden(&e.path)) {
                        let _ = change_tx.send(());
                    }
                }
                Err(e) => tracing::warn!("Watcher error: {:?}", e),
            }
        })?;
        debouncer
            .watcher()
            .watch(&self.source_root, RecursiveMode::Recursive)?;

        let source_root = self.source_root.clone();
        tracing::info!("Watching {} for model changes", source_root.display());

        let task = tokio::spawn(async move {
            // The debouncer stops watching when dropped, so it lives in the task.
            let _debouncer = debouncer;
            run_watcher(source_root, cache, change_rx, stop_rx, event_tx).await;
        });

        Ok((event_rx, WatchHandle { stop_tx, task }))
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Handle to control the watcher
pub struct WatchHandle {
    stop_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl WatchHandle {
    /// Stop the watcher
    pub async fn stop(self) -> Result<()> {
        let _ = self.stop_tx.send(()).await;
        self.task.await?;
        Ok(())
    }
}

async fn run_watcher(
    source_root: PathBuf,
    cache: Arc<ContentCache>,
    mut change_rx: mpsc::UnboundedReceiver<()>,
    mut stop_rx: mpsc::Receiver<()>,
    event_tx: mpsc::Sender<WatchEvent>,
) {
    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                tracing::info!("Watcher stopping...");
                break;
            }
            change = change_rx.recv() => {
                if change.is_none() {
                    tracing::error!("Watcher channel disconnected");
                    break;
                }
                // Collapse anything that queued up while the previous sync ran.
                while change_rx.try_recv().is_ok() {}

                let event = match cache.sync_with_report(&source_root).await {
                    Ok(outcome) => WatchEvent::Synced(outcome.report),
                    Err(e) => {
                        tracing::warn!("Sync after change failed: {}", e);
                        WatchEvent::Failed(e.to_string())
                    }
                };
                if event_tx.send(event).await.is_err() {
                    break;
                }
            }
        }
    }
}
