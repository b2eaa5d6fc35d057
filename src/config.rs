//! Configuration for overlaykit.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (OVERLAYKIT_HOME)
//! 2. Config file (.overlaykit/config.yaml)
//! 3. Defaults (~/.overlaykit)
//!
//! Config file discovery:
//! - Searches current directory and parents for .overlaykit/config.yaml
//! - Paths in config file are relative to the .overlaykit/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::MarkerRoles;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub sync: Option<SyncConfig>,
    #[serde(default)]
    pub markers: Option<Vec<MarkerDefinition>>,
    #[serde(default)]
    pub pose: Option<PoseConfig>,
    #[serde(default)]
    pub loader: Option<LoaderConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory holding the mirror and catalog
    pub home: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub extensions: Option<Vec<String>>,
    pub chunk_size_bytes: Option<usize>,
    pub exclude: Option<Vec<String>>,
}

/// A printed fiducial marker known to the tracker
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarkerDefinition {
    pub name: String,
    /// Printed edge length in metres
    pub physical_width: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoseConfig {
    pub epsilon: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    pub cache_capacity: Option<usize>,
}

/// Settings that drive a content sync
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Recognized asset extensions, compared case-insensitively
    pub extensions: Vec<String>,
    /// Read size for streaming content hashes
    pub chunk_size_bytes: usize,
    /// Glob patterns (matched against relative paths) to leave out
    pub exclude: Vec<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            extensions: vec!["usdz".to_string()],
            chunk_size_bytes: 1_048_576, // 1MB
            exclude: Vec::new(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to overlaykit home
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub sync: SyncSettings,
    /// Marker definitions; the first three are p0, p1, p2
    pub markers: Vec<MarkerDefinition>,
    /// Degenerate-triangle threshold on the cross product length
    pub pose_epsilon: f32,
    /// Number of decoded models kept by the loader cache
    pub loader_cache_capacity: usize,
}

pub const DEFAULT_POSE_EPSILON: f32 = 1e-5;

fn default_markers() -> Vec<MarkerDefinition> {
    ["MarkerA", "MarkerB", "MarkerC"]
        .into_iter()
        .map(|name| MarkerDefinition {
            name: name.to_string(),
            physical_width: 0.12,
        })
        .collect()
}

impl ResolvedConfig {
    /// Private mirror of synchronized models
    pub fn mirror_dir(&self) -> PathBuf {
        self.home.join("models")
    }

    /// Persisted catalog snapshot
    pub fn catalog_path(&self) -> PathBuf {
        self.home.join("catalog.json")
    }

    /// Persisted source folder link
    pub fn linked_folder_path(&self) -> PathBuf {
        self.home.join("linked_folder.json")
    }

    /// Marker role assignment derived from the configured marker order
    pub fn marker_roles(&self) -> Result<MarkerRoles> {
        match self.markers.as_slice() {
            [a, b, c, ..] => Ok(MarkerRoles {
                reference: a.name.clone(),
                up: b.name.clone(),
                plane: c.name.clone(),
            }),
            other => anyhow::bail!(
                "At least three markers are required for placement, {} configured",
                other.len()
            ),
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".overlaykit").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge a parsed file over the defaults
fn resolve(config: Option<ConfigFile>, config_file: Option<PathBuf>, default_home: PathBuf) -> ResolvedConfig {
    let env_home = std::env::var("OVERLAYKIT_HOME").ok().map(PathBuf::from);

    let Some(config) = config else {
        return ResolvedConfig {
            home: env_home.unwrap_or(default_home),
            config_file,
            sync: SyncSettings::default(),
            markers: default_markers(),
            pose_epsilon: DEFAULT_POSE_EPSILON,
            loader_cache_capacity: 1,
        };
    };

    let home = if let Some(home) = env_home {
        home
    } else if let (Some(home_path), Some(config_path)) = (&config.paths.home, &config_file) {
        let dir = config_path.parent().unwrap_or(Path::new("."));
        resolve_path(dir, home_path)
    } else {
        default_home
    };

    let defaults = SyncSettings::default();
    let sync = match config.sync {
        Some(s) => SyncSettings {
            extensions: s.extensions.unwrap_or(defaults.extensions),
            chunk_size_bytes: s
                .chunk_size_bytes
                .filter(|n| *n > 0)
                .unwrap_or(defaults.chunk_size_bytes),
            exclude: s.exclude.unwrap_or_default(),
        },
        None => defaults,
    };

    ResolvedConfig {
        home,
        config_file,
        sync,
        markers: config.markers.unwrap_or_else(default_markers),
        pose_epsilon: config
            .pose
            .and_then(|p| p.epsilon)
            .unwrap_or(DEFAULT_POSE_EPSILON),
        loader_cache_capacity: config
            .loader
            .and_then(|l| l.cache_capacity)
            .unwrap_or(1)
            .max(1),
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".overlaykit");

    let config_file = find_config_file();
    let parsed = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };

    Ok(resolve(parsed, config_file, default_home))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
