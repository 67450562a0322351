//! # Chunk Index Service
//!
//! The facade implementing `ChunkIndexApi` over one chain's directories.
//!
//! ## Architecture
//!
//! This service:
//! 1. Serialises writers per range; reads take no lock
//! 2. Runs every replacement through `durable_replace`
//! 3. Quarantines the chain after a failed restore
//! 4. Restores surviving backups on open and before tagging

mod api;
mod decache;
mod reader;
mod recovery;
mod tagger;
mod task;
mod writer;

pub use task::WriteTask;

use parking_lot::Mutex;
use shared_types::VersionTag;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::lock::IndexLock;
use crate::adapters::paths::UnchainedPaths;
use crate::domain::config::IndexConfig;
use crate::domain::errors::{IndexError, IoResultExt};
use crate::domain::metrics::IndexMetrics;
use crate::domain::range::FileRange;
use crate::ports::outbound::PathResolver;

/// Name of the marker that halts writes after a failed restore.
pub const QUARANTINE_MARKER: &str = "index.inconsistent";

/// Chunk index for one chain.
pub struct ChunkIndexService<P: PathResolver = UnchainedPaths> {
    pub(crate) config: IndexConfig,
    pub(crate) paths: P,
    pub(crate) tag: VersionTag,
    pub(crate) metrics: Arc<IndexMetrics>,
    pub(crate) ranges: RangeLocks,
    /// Held for the service's lifetime when opened exclusively.
    _lock: Option<IndexLock>,
}

impl ChunkIndexService<UnchainedPaths> {
    /// Open the chain described by `config` with the standard layout.
    pub fn open(config: IndexConfig) -> Result<Self, IndexError> {
        let paths = UnchainedPaths::from_config(&config);
        Self::with_paths(config, paths)
    }

    /// Open and hold the chain's `IndexLock` until the service is dropped.
    pub fn open_exclusive(config: IndexConfig) -> Result<Self, IndexError> {
        config.validate()?;
        let lock_dir = config.index_root.join(&config.chain);
        let lock = IndexLock::acquire(&lock_dir, config.lock_timeout())?;
        let paths = UnchainedPaths::from_config(&config);
        Self::build(config, paths, Some(lock))
    }
}

impl<P: PathResolver> ChunkIndexService<P> {
    /// Open with a custom directory layout.
    ///
    /// Creates the chunk, bloom and tmp directories, then restores any
    /// backups left by an interrupted write. A quarantined chain opens for
    /// reading but is not recovered automatically.
    pub fn with_paths(config: IndexConfig, paths: P) -> Result<Self, IndexError> {
        config.validate()?;
        Self::build(config, paths, None)
    }

    fn build(config: IndexConfig, paths: P, lock: Option<IndexLock>) -> Result<Self, IndexError> {
        let service = Self {
            tag: config.version_tag(),
            config,
            paths,
            metrics: Arc::new(IndexMetrics::new()),
            ranges: RangeLocks::default(),
            _lock: lock,
        };

        for dir in [service.index_dir(), service.bloom_dir(), service.tmp_dir()] {
            fs::create_dir_all(&dir).at(&dir)?;
        }

        if service.is_quarantined() {
            tracing::warn!(
                chain = %service.config.chain,
                marker = %service.quarantine_marker().display(),
                "[chunk-index] chain is quarantined; writes disabled until cleared"
            );
        } else {
            let report = service.recover_all()?;
            if !report.is_empty() {
                tracing::warn!(
                    restored = report.restored.len(),
                    discarded = report.discarded.len(),
                    orphaned = report.orphaned.len(),
                    failed = report.failures.len(),
                    "[chunk-index] recovered backups from an interrupted write"
                );
            }
        }

        tracing::info!(
            chain = %service.config.chain,
            index = %service.index_dir().display(),
            tag = %service.tag,
            "[chunk-index] opened chunk index"
        );
        Ok(service)
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn paths(&self) -> &P {
        &self.paths
    }

    /// Tag stamped into newly written chunks.
    pub fn version_tag(&self) -> VersionTag {
        self.tag
    }

    pub fn metrics(&self) -> Arc<IndexMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn index_dir(&self) -> PathBuf {
        self.paths.index_dir(&self.config.chain)
    }

    pub fn bloom_dir(&self) -> PathBuf {
        self.paths.bloom_dir(&self.config.chain)
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.paths.tmp_dir(&self.config.chain)
    }

    pub fn chunk_path(&self, range: &FileRange) -> PathBuf {
        self.paths.chunk_path(&self.config.chain, range)
    }

    pub fn bloom_path(&self, range: &FileRange) -> PathBuf {
        self.paths.bloom_path(&self.config.chain, range)
    }

    pub fn quarantine_marker(&self) -> PathBuf {
        self.tmp_dir().join(QUARANTINE_MARKER)
    }

    pub fn is_quarantined(&self) -> bool {
        self.quarantine_marker().exists()
    }

    /// Re-enable writes after the directory has been inspected by hand.
    pub fn clear_quarantine(&self) -> Result<(), IndexError> {
        let marker = self.quarantine_marker();
        match fs::remove_file(&marker) {
            Ok(()) => {
                tracing::warn!(marker = %marker.display(), "[chunk-index] quarantine cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IndexError::io(&marker, e)),
        }
    }

    pub(crate) fn ensure_writable(&self) -> Result<(), IndexError> {
        let marker = self.quarantine_marker();
        if marker.exists() {
            return Err(IndexError::DirectoryQuarantined { marker });
        }
        Ok(())
    }

    /// Write the quarantine marker. Failing to write it is only logged: the
    /// caller is already returning a fatal error.
    pub(crate) fn quarantine(&self, cause: &str) {
        let marker = self.quarantine_marker();
        tracing::error!(
            chain = %self.config.chain,
            marker = %marker.display(),
            cause,
            "[chunk-index] quarantining index directory"
        );
        let written = File::create(&marker)
            .and_then(|mut f| writeln!(f, "{}", cause).and_then(|_| f.sync_all()));
        if let Err(e) = written {
            tracing::error!(error = %e, "[chunk-index] could not write quarantine marker");
        }
    }

    /// Quarantine the chain if `result` is a failed restore.
    pub(crate) fn escalate<T>(&self, result: Result<T, IndexError>) -> Result<T, IndexError> {
        if let Err(err @ IndexError::RestoreFailed { .. }) = &result {
            self.quarantine(&err.to_string());
        }
        result
    }
}

/// One mutex per range so writers and taggers of the same chunk take turns
/// while different ranges proceed in parallel.
#[derive(Debug, Default)]
pub(crate) struct RangeLocks {
    inner: Mutex<HashMap<FileRange, Arc<Mutex<()>>>>,
}

impl RangeLocks {
    pub(crate) fn handle(&self, range: FileRange) -> Arc<Mutex<()>> {
        Arc::clone(self.inner.lock().entry(range).or_default())
    }

    /// Forget ranges nobody holds a handle to.
    ///
    /// A handle taken after this runs gets a fresh mutex, which is fine:
    /// the map is the only other owner, so no one can be waiting on the old
    /// one.
    pub(crate) fn prune(&self) {
        self.inner
            .lock()
            .retain(|_, handle| Arc::strong_count(handle) > 1);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().len()
    }
}
