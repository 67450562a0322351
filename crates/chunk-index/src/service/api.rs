//! # Chunk Index API Implementation

use shared_types::{Address, Appearance, VersionTag};

use super::ChunkIndexService;
use crate::adapters::fs::{audit_chunk, validate};
use crate::domain::cancel::CancellationFlag;
use crate::domain::chunk::AddressAppearanceMap;
use crate::domain::decache::DecachePlan;
use crate::domain::errors::IndexError;
use crate::domain::range::FileRange;
use crate::domain::report::{AuditReport, RecoveryReport, WriteChunkReport};
use crate::ports::inbound::ChunkIndexApi;
use crate::ports::outbound::PathResolver;

impl<P: PathResolver> ChunkIndexApi for ChunkIndexService<P> {
    fn write_chunk(
        &self,
        range: FileRange,
        working_set: &AddressAppearanceMap,
        appearance_count: usize,
        cancel: &CancellationFlag,
    ) -> Result<WriteChunkReport, IndexError> {
        let report = self.commit_chunk(range, working_set, appearance_count, cancel);
        self.ranges.prune();
        report
    }

    fn tag_chunk(&self, range: FileRange, tag: &VersionTag) -> Result<bool, IndexError> {
        let tagged = self.retag(range, tag);
        self.ranges.prune();
        tagged
    }

    fn tag_all(&self, tag: &VersionTag) -> Result<usize, IndexError> {
        self.retag_all(tag)
    }

    fn query_address(
        &self,
        range: FileRange,
        address: &Address,
    ) -> Result<Option<Vec<Appearance>>, IndexError> {
        self.lookup(range, address)
    }

    fn find_appearances(&self, address: &Address) -> Result<Vec<Appearance>, IndexError> {
        self.scan(address)
    }

    fn validate(&self, range: FileRange, expected: &VersionTag) -> Result<bool, IndexError> {
        validate(&self.chunk_path(&range), expected)
    }

    fn audit(&self, range: FileRange, expected: &VersionTag) -> Result<AuditReport, IndexError> {
        audit_chunk(&self.chunk_path(&range), &self.bloom_path(&range), expected)
    }

    fn decache(&self, invalidated: &[FileRange]) -> Result<DecachePlan, IndexError> {
        self.plan(invalidated)
    }

    fn recover(&self) -> Result<RecoveryReport, IndexError> {
        if self.is_quarantined() {
            return Err(IndexError::DirectoryQuarantined {
                marker: self.quarantine_marker(),
            });
        }
        self.recover_all()
    }
}
