//! # Decache
//!
//! Lists the chain's chunks, blooms and derived caches and plans what a
//! reorg invalidates.

use super::ChunkIndexService;
use crate::adapters::fs::{list_files, walk_files};
use crate::domain::decache::{plan_decache, CacheEntry, DecacheOutcome, DecachePlan, EntryKind};
use crate::domain::errors::IndexError;
use crate::domain::range::FileRange;
use crate::ports::outbound::{PathResolver, BLOOM_EXT, CHUNK_EXT};

impl<P: PathResolver> ChunkIndexService<P> {
    /// Every chunk, bloom and cache file of the chain.
    pub fn listing(&self) -> Result<Vec<CacheEntry>, IndexError> {
        let index_dir = self.index_dir();
        let bloom_dir = self.bloom_dir();
        let tmp_dir = self.tmp_dir();

        let mut entries = Vec::new();
        for path in list_files(&index_dir, CHUNK_EXT)? {
            entries.push(CacheEntry::new(EntryKind::Chunk, path));
        }
        for path in list_files(&bloom_dir, BLOOM_EXT)? {
            entries.push(CacheEntry::new(EntryKind::Bloom, path));
        }

        let cache_dir = self.paths.cache_dir(&self.config.chain);
        for path in walk_files(&cache_dir, &[tmp_dir, index_dir, bloom_dir])? {
            entries.push(CacheEntry::new(EntryKind::Cache, path));
        }
        Ok(entries)
    }

    pub(crate) fn plan(&self, invalidated: &[FileRange]) -> Result<DecachePlan, IndexError> {
        let plan = plan_decache(invalidated, &self.listing()?);
        tracing::info!(
            chunks = plan.chunks.len(),
            blooms = plan.blooms.len(),
            cache_items = plan.cache_items.len(),
            skipped = plan.skipped.len(),
            "[chunk-index] planned decache"
        );
        Ok(plan)
    }

    /// Plan and remove in one step.
    pub fn decache_and_remove(
        &self,
        invalidated: &[FileRange],
    ) -> Result<(DecachePlan, DecacheOutcome), IndexError> {
        self.ensure_writable()?;
        let plan = self.plan(invalidated)?;
        let outcome = plan
            .execute()
            .map_err(|(path, source)| IndexError::io(path, source))?;
        self.ranges.prune();
        tracing::info!(
            removed = outcome.removed.len(),
            missing = outcome.missing.len(),
            "[chunk-index] decache removed files"
        );
        Ok((plan, outcome))
    }
}
