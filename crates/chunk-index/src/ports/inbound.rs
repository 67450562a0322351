//! # Inbound Ports (Driving Ports)
//!
//! The API the chunk index exposes to scrapers, exporters and reorg
//! handling.

use shared_types::{Address, Appearance, VersionTag};

use crate::domain::cancel::CancellationFlag;
use crate::domain::chunk::AddressAppearanceMap;
use crate::domain::decache::DecachePlan;
use crate::domain::errors::IndexError;
use crate::domain::range::FileRange;
use crate::domain::report::{AuditReport, RecoveryReport, WriteChunkReport};

/// Primary API of the chunk index for one chain.
pub trait ChunkIndexApi {
    /// Build and durably commit the chunk and bloom for `range`.
    ///
    /// ## Atomicity
    ///
    /// Existing chunk and bloom files are backed up first. Any failure after
    /// that point puts them back, or removes the new files when there were
    /// none.
    ///
    /// ## Errors
    ///
    /// - `Cancelled`: `cancel` was raised; previous files are in place
    /// - `RestoreFailed`: the rollback itself failed; the chain is quarantined
    /// - `DirectoryQuarantined`: an earlier rollback failed
    fn write_chunk(
        &self,
        range: FileRange,
        working_set: &AddressAppearanceMap,
        appearance_count: usize,
        cancel: &CancellationFlag,
    ) -> Result<WriteChunkReport, IndexError>;

    /// Rewrite the version tag of one chunk and its bloom.
    ///
    /// Returns `false` when both already carry `tag`.
    fn tag_chunk(&self, range: FileRange, tag: &VersionTag) -> Result<bool, IndexError>;

    /// Tag every chunk of the chain. Returns how many were rewritten.
    fn tag_all(&self, tag: &VersionTag) -> Result<usize, IndexError>;

    /// Appearances of `address` in one chunk, or `None` when absent.
    fn query_address(
        &self,
        range: FileRange,
        address: &Address,
    ) -> Result<Option<Vec<Appearance>>, IndexError>;

    /// Appearances of `address` across every chunk, ordered by block.
    fn find_appearances(&self, address: &Address) -> Result<Vec<Appearance>, IndexError>;

    /// `Ok(false)` when the chunk's tag differs from `expected`.
    ///
    /// ## Errors
    ///
    /// - `BadMagic`: not a chunk file
    /// - `Io`: unreadable or shorter than a header
    fn validate(&self, range: FileRange, expected: &VersionTag) -> Result<bool, IndexError>;

    /// Full structural check of one chunk and its bloom.
    fn audit(&self, range: FileRange, expected: &VersionTag) -> Result<AuditReport, IndexError>;

    /// Plan removal of everything covering the invalidated ranges.
    ///
    /// Nothing is deleted; run `DecachePlan::execute` for that.
    fn decache(&self, invalidated: &[FileRange]) -> Result<DecachePlan, IndexError>;

    /// Restore every surviving backup of the chain.
    fn recover(&self) -> Result<RecoveryReport, IndexError>;
}
