//! # Domain Errors
//!
//! Error types for the chunk index.
//!
//! ## Design Principles
//!
//! - Parse and validation errors go straight back to the caller
//! - Every filesystem error names the path it happened on
//! - `RestoreFailed` and `DirectoryQuarantined` are fatal: the directory can
//!   no longer be trusted without manual inspection

use chunk_bloom::BloomError;
use shared_types::VersionTag;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::adapters::lock::LockError;

/// Errors that can occur in the chunk index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// File name does not encode a block range.
    #[error("Malformed range in file name: {name}")]
    MalformedRange { name: String },

    /// Header sentinel mismatch; the file is not a chunk of this format.
    #[error("Bad magic in {}: expected {expected:#010x}, got {found:#010x}", .path.display())]
    BadMagic {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    /// Header hash does not match the current manifest version.
    #[error("Stale version in {}: expected {expected}, got {found}", .path.display())]
    StaleVersion {
        path: PathBuf,
        expected: VersionTag,
        found: VersionTag,
    },

    /// Read, write, sync or rename failure.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A backup exists for a path with no operation in progress.
    #[error("Backup {} for {} survived an earlier operation", .backup.display(), .path.display())]
    InconsistentBackup { path: PathBuf, backup: PathBuf },

    /// Restoring a backup failed. Fatal.
    #[error("Failed to restore {} from backup: {source}", .path.display())]
    RestoreFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writes are halted until the quarantine marker is cleared.
    #[error("Index directory quarantined after a failed restore (marker {})", .marker.display())]
    DirectoryQuarantined { marker: PathBuf },

    /// The file parsed but its structure is wrong.
    #[error("Corrupt chunk {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Offsets or counts do not fit the 32-bit fields of the format.
    #[error("Chunk too large: {appearances} appearances do not fit a u32 offset")]
    ChunkTooLarge { appearances: usize },

    /// Bloom file could not be read or decoded.
    #[error("Bloom error on {}: {source}", .path.display())]
    Bloom {
        path: PathBuf,
        #[source]
        source: BloomError,
    },

    /// The operation was cancelled; any backup has been restored.
    #[error("Operation cancelled at stage '{stage}'")]
    Cancelled { stage: &'static str },

    /// Directory lock could not be acquired.
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A background write task panicked or was aborted.
    #[error("Write task failed: {0}")]
    TaskFailed(String),
}

impl IndexError {
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        IndexError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn bloom(path: impl AsRef<Path>, source: BloomError) -> Self {
        IndexError::Bloom {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn corrupt(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        IndexError::Corrupt {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// True when further writes to the directory must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IndexError::RestoreFailed { .. } | IndexError::DirectoryQuarantined { .. }
        )
    }

    /// True when an I/O error is a plain "file does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, IndexError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Attach a path to an `io::Result`.
pub trait IoResultExt<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T, IndexError>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T, IndexError> {
        self.map_err(|e| IndexError::io(path, e))
    }
}
