//! Command-line interface for overlaykit.
//!
//! Provides commands for linking a model folder, syncing it into the
//! private mirror, inspecting the catalog, computing poses, and replaying
//! recorded tracker sessions against the placement engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::adapters::{AnchorUpdate, CachingLoader, HeadlessLoader, LinkedFolder, MarkerBoard};
use crate::config::{self, ResolvedConfig};
use crate::core::{PlacementActor, PlacementEngine, PlacementHandle, PoseEstimator};
use crate::domain::{AssetRecord, PlacementSnapshot, PlacementState, Vec3};
use crate::library::{ContentCache, FolderWatcher, WatchEvent};

/// overlaykit - Marker-anchored model placement toolkit
#[derive(Parser, Debug)]
#[command(name = "overlaykit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Remember the folder to sync models from
    Link {
        /// Folder containing model files
        folder: PathBuf,
    },

    /// Mirror the linked folder into the private cache
    Sync {
        /// Sync from this folder instead of the linked one
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Keep running and re-sync when the folder changes
        #[arg(short, long)]
        watch: bool,
    },

    /// List cataloged models
    Models,

    /// Print the mirrored path of a cataloged model
    Resolve {
        /// Path relative to the source folder (e.g. "chairs/oak.usdz")
        relative_path: String,
    },

    /// Compute the anchor pose for three marker positions
    Pose {
        /// Reference marker position "x,y,z"
        #[arg(allow_hyphen_values = true)]
        p0: Vec3,

        /// Up marker position "x,y,z"
        #[arg(allow_hyphen_values = true)]
        p1: Vec3,

        /// Plane marker position "x,y,z"
        #[arg(allow_hyphen_values = true)]
        p2: Vec3,
    },

    /// Replay a recorded tracker session against a cataloged model
    Replay {
        /// Catalog path of the model to place
        model: String,

        /// JSON Lines file of tracker events
        updates: PathBuf,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Link { folder } => link_folder(&folder).await,
            Commands::Sync { source, watch } => sync_models(source, watch).await,
            Commands::Models => list_models().await,
            Commands::Resolve { relative_path } => resolve_model(&relative_path).await,
            Commands::Pose { p0, p1, p2 } => compute_pose(p0, p1, p2),
            Commands::Replay { model, updates } => replay_session(&model, &updates).await,
            Commands::Config => show_config(),
        }
    }
}

async fn open_cache(cfg: &ResolvedConfig) -> Result<ContentCache> {
    ContentCache::open(&cfg.home, cfg.sync.clone())
        .await
        .with_context(|| format!("Failed to open model cache at {}", cfg.home.display()))
}

/// Link a source folder
async fn link_folder(folder: &Path) -> Result<()> {
    let cfg = config::config()?;
    let linked = LinkedFolder::new(cfg.linked_folder_path())
        .link(folder)
        .await?;

    println!("Linked {}", linked.display());
    println!("Run `overlaykit sync` to mirror its models.");
    Ok(())
}

/// Sync once, optionally keep following the folder
async fn sync_models(source: Option<PathBuf>, watch: bool) -> Result<()> {
    let cfg = config::config()?;

    let source_root = match source {
        Some(path) => path,
        None => LinkedFolder::new(cfg.linked_folder_path())
            .resolve()
            .await?
            .context("No folder linked. Run `overlaykit link <folder>` or pass --source")?,
    };

    let cache = Arc::new(open_cache(cfg).await?);
    let outcome = cache.sync_with_report(&source_root).await?;

    let report = &outcome.report;
    println!(
        "Synced {} model(s) from {}",
        outcome.records.len(),
        source_root.display()
    );
    println!(
        "  reused: {}  hashed: {}  copied: {}  dropped: {}",
        report.reused, report.hashed, report.copied, report.dropped
    );

    if !watch {
        return Ok(());
    }

    let (mut events, handle) = FolderWatcher::new(&source_root).watch(Arc::clone(&cache))?;
    println!("Watching for changes (Ctrl+C to stop)...");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping...");
                break;
            }
            event = events.recv() => match event {
                Some(WatchEvent::Synced(report)) => {
                    println!(
                        "Re-synced: {} model(s), copied {}, dropped {}",
                        report.discovered, report.copied, report.dropped
                    );
                }
                Some(WatchEvent::Failed(message)) => {
                    eprintln!("Sync failed: {}", message);
                }
                None => break,
            },
        }
    }

    handle.stop().await
}

/// List cataloged models in display order
async fn list_models() -> Result<()> {
    let cfg = config::config()?;
    let cache = open_cache(cfg).await?;
    let records = cache.records().await;

    if records.is_empty() {
        println!("No models cataloged. Run `overlaykit sync` first.");
        return Ok(());
    }

    println!("{:<30} {:<40} {:<14} {:<20}", "NAME", "PATH", "HASH", "MODIFIED");
    println!("{}", "-".repeat(106));

    for record in &records {
        println!(
            "{:<30} {:<40} {:<14} {:<20}",
            truncate(&record.file_name, 28),
            truncate(&record.relative_path, 38),
            &record.content_hash[..record.content_hash.len().min(12)],
            record.last_modified.format("%Y-%m-%d %H:%M:%S")
        );
    }

    println!("\n{} model(s)", records.len());
    Ok(())
}

/// Print the local mirror path for a cataloged model
async fn resolve_model(relative_path: &str) -> Result<()> {
    let cfg = config::config()?;
    let cache = open_cache(cfg).await?;
    let record = find_record(&cache, relative_path).await?;
    let local = cache.resolve_local_path(&record);

    if !local.exists() {
        anyhow::bail!(
            "Mirrored copy is missing: {} (run `overlaykit sync`)",
            local.display()
        );
    }

    println!("{}", local.display());
    Ok(())
}

async fn find_record(cache: &ContentCache, relative_path: &str) -> Result<AssetRecord> {
    let snapshot = cache.snapshot().await;
    snapshot
        .get(relative_path)
        .cloned()
        .with_context(|| format!("Model not in catalog: {}", relative_path))
}

/// Compute and print a pose
fn compute_pose(p0: Vec3, p1: Vec3, p2: Vec3) -> Result<()> {
    let cfg = config::config()?;
    let pose = PoseEstimator::new(cfg.pose_epsilon).compute_pose(p0, p1, p2)?;
    println!("{}", serde_json::to_string_pretty(&pose)?);
    Ok(())
}

/// Control lines that may appear in a replay file next to tracker events
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ControlEvent {
    Reposition,
    TrackingFailed { message: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplayLine {
    Anchor(AnchorUpdate),
    Control(ControlEvent),
}

/// Drive the placement engine from a JSON Lines tracker recording
async fn replay_session(model: &str, updates: &Path) -> Result<()> {
    let cfg = config::config()?;
    let cache = open_cache(cfg).await?;
    let record = find_record(&cache, model).await?;

    let engine = PlacementEngine::new(
        PoseEstimator::new(cfg.pose_epsilon),
        cfg.marker_roles()?,
    );
    let loader = CachingLoader::new(HeadlessLoader, cfg.loader_cache_capacity);
    let (handle, task) = PlacementActor::spawn(engine, Arc::new(loader));

    handle.load_model(cache.resolve_local_path(&record)).await?;
    let mut last = wait_for_load(&handle).await?;
    print_snapshot(0, &last)?;
    if last.state == PlacementState::Idle {
        anyhow::bail!(
            "Model could not be loaded: {}",
            last.last_error.unwrap_or_default()
        );
    }

    let file = tokio::fs::File::open(updates)
        .await
        .with_context(|| format!("Failed to open replay file: {}", updates.display()))?;
    let mut lines = BufReader::new(file).lines();
    let mut board = MarkerBoard::new();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let parsed: ReplayLine = serde_json::from_str(&line)
            .with_context(|| format!("Invalid replay event on line {}", line_no))?;

        match parsed {
            ReplayLine::Anchor(update) => {
                let sample = board.apply(update).clone();
                handle.markers_updated(sample).await?;
            }
            ReplayLine::Control(ControlEvent::Reposition) => {
                handle.request_reposition().await?;
            }
            ReplayLine::Control(ControlEvent::TrackingFailed { message }) => {
                board.clear();
                handle.tracking_failed(message).await?;
            }
        }
        handle.flush().await?;

        let current = handle.snapshot();
        if current != last {
            print_snapshot(line_no, &current)?;
            last = current;
        }
    }

    drop(handle);
    task.await?;
    Ok(())
}

/// Wait for the initial model load to either land or fail
async fn wait_for_load(handle: &PlacementHandle) -> Result<PlacementSnapshot> {
    let mut rx = handle.subscribe();
    let snapshot = tokio::time::timeout(
        Duration::from_secs(30),
        rx.wait_for(|s| s.state != PlacementState::Idle || s.last_error.is_some()),
    )
    .await
    .context("Timed out loading model")??
    .clone();
    Ok(snapshot)
}

fn print_snapshot(line_no: usize, snapshot: &PlacementSnapshot) -> Result<()> {
    println!(
        "{:>5}  {}",
        line_no,
        serde_json::to_string(snapshot).context("Failed to encode snapshot")?
    );
    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("overlaykit configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:          {}", cfg.home.display());
    println!("  Mirror:        {}", cfg.mirror_dir().display());
    println!("  Catalog:       {}", cfg.catalog_path().display());
    println!("  Linked folder: {}", cfg.linked_folder_path().display());
    println!();
    println!("Sync:");
    println!("  Extensions: {}", cfg.sync.extensions.join(", "));
    println!("  Chunk size: {} bytes", cfg.sync.chunk_size_bytes);
    if cfg.sync.exclude.is_empty() {
        println!("  Exclude:    (none)");
    } else {
        println!("  Exclude:    {}", cfg.sync.exclude.join(", "));
    }
    println!();
    println!("Markers:");
    for (role, marker) in ["reference", "up", "plane"].iter().zip(&cfg.markers) {
        println!("  {:<10} {} ({} m)", role, marker.name, marker.physical_width);
    }
    println!();
    println!("Pose epsilon:          {}", cfg.pose_epsilon);
    println!("Loader cache capacity: {}", cfg.loader_cache_capacity);

    Ok(())
}

/// Truncate a string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_line_variants() {
        let anchor: ReplayLine =
            serde_json::from_str(r#"{"event":"removed","marker":"MarkerA"}"#).unwrap();
        assert!(matches!(anchor, ReplayLine::Anchor(AnchorUpdate::Removed { .. })));

        let reposition: ReplayLine = serde_json::from_str(r#"{"event":"reposition"}"#).unwrap();
        assert!(matches!(reposition, ReplayLine::Control(ControlEvent::Reposition)));

        let failed: ReplayLine =
            serde_json::from_str(r#"{"event":"tracking_failed","message":"no camera"}"#).unwrap();
        assert!(matches!(
            failed,
            ReplayLine::Control(ControlEvent::TrackingFailed { .. })
        ));

        assert!(serde_json::from_str::<ReplayLine>(r#"{"event":"teleport"}"#).is_err());
    }

    #[test]
    fn test_pose_args_accept_negative_components() {
        let cli = Cli::try_parse_from([
            "overlaykit",
            "pose",
            "-0.1,0,0",
            "0,0.12,0",
            "0,0,0.12",
        ])
        .unwrap();
        match cli.command {
            Commands::Pose { p0, .. } => assert_eq!(p0, Vec3::new(-0.1, 0.0, 0.0)),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a_very_long_model_name.usdz", 10), "a_very_...");
    }
}
