//! # Operation Reports
//!
//! What writes, audits and recovery passes did, in a form hosts can log or
//! serialize.

use serde::Serialize;
use std::path::PathBuf;

use super::range::FileRange;

/// Outcome of a committed chunk write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteChunkReport {
    pub range: FileRange,
    pub address_count: u32,
    pub appearance_count: u32,
    /// Size of the chunk file in bytes.
    pub file_size: u64,
    /// True when the range ends on the snap grid.
    pub snapped: bool,
}

impl WriteChunkReport {
    /// Emit the report as a structured `info` event.
    pub fn report(&self) {
        tracing::info!(
            range = %self.range,
            addresses = self.address_count,
            appearances = self.appearance_count,
            bytes = self.file_size,
            snapped = self.snapped,
            "[chunk-index] wrote chunk"
        );
    }
}

/// Result of a full structural check of one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub path: PathBuf,
    pub range: FileRange,
    /// False when the header hash differs from the expected tag.
    pub tag_current: bool,
    pub address_count: u32,
    pub appearance_count: u32,
    pub file_size: u64,
    pub expected_size: u64,
    /// True when the bloom file exists and tests positive for every address.
    pub bloom_consistent: bool,
    pub problems: Vec<String>,
}

impl AuditReport {
    pub fn new(path: impl Into<PathBuf>, range: FileRange) -> Self {
        Self {
            path: path.into(),
            range,
            ..Default::default()
        }
    }

    /// True when the chunk has no structural problems and a current tag.
    pub fn is_healthy(&self) -> bool {
        self.problems.is_empty() && self.tag_current && self.bloom_consistent
    }

    pub fn add_problem(&mut self, problem: impl Into<String>) {
        self.problems.push(problem.into());
    }
}

/// Result of a recovery pass over the tmp directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// Targets put back from a surviving backup.
    pub restored: Vec<PathBuf>,
    /// Backups dropped because their write had already committed.
    pub discarded: Vec<PathBuf>,
    /// Backups with no recognisable target; left in place.
    pub orphaned: Vec<PathBuf>,
    /// Restores that failed. Any entry here quarantines the directory.
    pub failures: Vec<RecoveryFailure>,
}

/// A backup that could not be put back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryFailure {
    pub backup: PathBuf,
    pub target: PathBuf,
    pub reason: String,
}

impl RecoveryReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when every backup found was restored.
    pub fn is_successful(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.restored.is_empty()
            && self.discarded.is_empty()
            && self.orphaned.is_empty()
            && self.failures.is_empty()
    }

    pub fn add_restored(&mut self, target: PathBuf) {
        self.restored.push(target);
    }

    pub fn add_discarded(&mut self, backup: PathBuf) {
        self.discarded.push(backup);
    }

    pub fn add_orphan(&mut self, backup: PathBuf) {
        self.orphaned.push(backup);
    }

    pub fn add_failure(&mut self, backup: PathBuf, target: PathBuf, reason: impl Into<String>) {
        self.failures.push(RecoveryFailure {
            backup,
            target,
            reason: reason.into(),
        });
    }

    /// Fold another pass into this one.
    pub fn merge(&mut self, other: RecoveryReport) {
        self.restored.extend(other.restored);
        self.discarded.extend(other.discarded);
        self.orphaned.extend(other.orphaned);
        self.failures.extend(other.failures);
    }
}
