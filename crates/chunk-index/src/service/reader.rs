//! # Queries
//!
//! Lock-free reads: single-chunk lookups and the parallel scan over every
//! chunk of the chain.

use rayon::prelude::*;
use shared_types::{Address, Appearance};

use super::ChunkIndexService;
use crate::adapters::fs::{list_ranges, query_address, read_bloom, QueryOutcome};
use crate::domain::errors::IndexError;
use crate::domain::range::FileRange;
use crate::ports::outbound::{PathResolver, CHUNK_EXT};

impl<P: PathResolver> ChunkIndexService<P> {
    pub(crate) fn lookup(
        &self,
        range: FileRange,
        address: &Address,
    ) -> Result<Option<Vec<Appearance>>, IndexError> {
        let chunk_path = self.chunk_path(&range);
        let bloom_path = self.bloom_path(&range);

        let bloom = match read_bloom(&bloom_path) {
            Ok(bloom) => Some(bloom),
            Err(e) if e.is_not_found() => {
                tracing::debug!(range = %range, "[chunk-index] no bloom, searching the table");
                None
            }
            Err(e) => return Err(e),
        };

        let outcome = query_address(&chunk_path, bloom.as_ref(), address)?;
        self.metrics.record_lookup(
            outcome.bloom_hit(),
            matches!(outcome, QueryOutcome::Found(_)),
        );
        Ok(outcome.into_appearances())
    }

    pub(crate) fn scan(&self, address: &Address) -> Result<Vec<Appearance>, IndexError> {
        let ranges = list_ranges(&self.index_dir(), CHUNK_EXT)?;

        let hits = ranges
            .par_iter()
            .map(|(range, _)| self.lookup(*range, address))
            .collect::<Result<Vec<_>, _>>()?;

        let mut appearances: Vec<Appearance> = hits.into_iter().flatten().flatten().collect();
        appearances.sort_unstable();
        appearances.dedup();

        tracing::debug!(
            %address,
            chunks = ranges.len(),
            appearances = appearances.len(),
            "[chunk-index] scanned chain"
        );
        Ok(appearances)
    }
}
