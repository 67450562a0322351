//! # Index Configuration
//!
//! Where a chain's index lives and how chunks are cut.

use serde::{Deserialize, Serialize};
use shared_types::{VersionTag, DEFAULT_MANIFEST_VERSION};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::errors::IndexError;
use super::range::FileRange;
use crate::adapters::lock::DEFAULT_LOCK_TIMEOUT;

/// Configuration for one chain's chunk index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Root holding `<chain>/finalized` and `<chain>/blooms`.
    pub index_root: PathBuf,

    /// Root holding `<chain>/tmp` and the derived caches.
    pub cache_root: PathBuf,

    /// Chain name, used as a directory component.
    pub chain: String,

    /// Manifest version string; its keccak256 is the version tag.
    pub manifest_version: String,

    /// Block interval on which chunks are snapped (default: 250000).
    pub snap_to_grid: u64,

    /// First block at which snapping applies (default: 2000000).
    pub first_snap: u64,

    /// Target appearances per chunk (default: 2000000).
    ///
    /// Chunks above this size are still written; the writer only warns.
    pub apps_per_chunk: u64,

    /// How long to wait for the directory lock (default: 30s).
    pub lock_timeout_ms: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_root: PathBuf::from("unchained"),
            cache_root: PathBuf::from("cache"),
            chain: "mainnet".to_string(),
            manifest_version: DEFAULT_MANIFEST_VERSION.to_string(),
            snap_to_grid: 250_000,
            first_snap: 2_000_000,
            apps_per_chunk: 2_000_000,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT.as_millis() as u64,
        }
    }
}

impl IndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.index_root = root.into();
        self
    }

    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = root.into();
        self
    }

    pub fn with_chain(mut self, chain: impl Into<String>) -> Self {
        self.chain = chain.into();
        self
    }

    pub fn with_manifest_version(mut self, version: impl Into<String>) -> Self {
        self.manifest_version = version.into();
        self
    }

    /// Set the snap grid and the block it starts at.
    pub fn with_snap(mut self, snap_to_grid: u64, first_snap: u64) -> Self {
        self.snap_to_grid = snap_to_grid;
        self.first_snap = first_snap;
        self
    }

    pub fn with_apps_per_chunk(mut self, apps: u64) -> Self {
        self.apps_per_chunk = apps;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `UNCHAINED_INDEX_PATH`: index root (default: unchained)
    /// - `UNCHAINED_CACHE_PATH`: cache root (default: cache)
    /// - `UNCHAINED_CHAIN`: chain name (default: mainnet)
    /// - `UNCHAINED_MANIFEST_VERSION`: manifest version string
    /// - `UNCHAINED_SNAP_TO_GRID`: snap grid (default: 250000)
    /// - `UNCHAINED_FIRST_SNAP`: first snapped block (default: 2000000)
    /// - `UNCHAINED_APPS_PER_CHUNK`: target chunk size (default: 2000000)
    /// - `UNCHAINED_LOCK_TIMEOUT_MS`: lock wait (default: 30000)
    ///
    /// Unparseable numbers fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let number = |key: &str, default: u64| {
            env::var(key)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            index_root: env::var("UNCHAINED_INDEX_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.index_root),
            cache_root: env::var("UNCHAINED_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_root),
            chain: env::var("UNCHAINED_CHAIN").unwrap_or(defaults.chain),
            manifest_version: env::var("UNCHAINED_MANIFEST_VERSION")
                .unwrap_or(defaults.manifest_version),
            snap_to_grid: number("UNCHAINED_SNAP_TO_GRID", defaults.snap_to_grid),
            first_snap: number("UNCHAINED_FIRST_SNAP", defaults.first_snap),
            apps_per_chunk: number("UNCHAINED_APPS_PER_CHUNK", defaults.apps_per_chunk),
            lock_timeout_ms: number("UNCHAINED_LOCK_TIMEOUT_MS", defaults.lock_timeout_ms),
        }
    }

    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| IndexError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if self.chain.is_empty() {
            return Err(IndexError::Config("chain must not be empty".into()));
        }
        if self.chain.contains(['/', '\\']) || self.chain == "." || self.chain == ".." {
            return Err(IndexError::Config(format!(
                "chain '{}' is not a plain directory name",
                self.chain
            )));
        }
        if self.manifest_version.is_empty() {
            return Err(IndexError::Config("manifest_version must not be empty".into()));
        }
        if self.snap_to_grid == 0 {
            return Err(IndexError::Config("snap_to_grid must be positive".into()));
        }
        if self.apps_per_chunk == 0 {
            return Err(IndexError::Config("apps_per_chunk must be positive".into()));
        }
        Ok(())
    }

    /// Tag written into every chunk and bloom header.
    pub fn version_tag(&self) -> VersionTag {
        VersionTag::from_manifest_version(&self.manifest_version)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// True when `range` ends on the snap grid.
    pub fn is_snap(&self, range: &FileRange) -> bool {
        self.snap_to_grid != 0
            && range.last >= self.first_snap
            && range.last % self.snap_to_grid == 0
    }
}
