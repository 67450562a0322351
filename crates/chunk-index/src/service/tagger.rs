//! # Chunk Tagger
//!
//! Rewrites the version tag of a chunk (offset 4) and of its bloom
//! (offset 2) through a patched copy renamed over the original, each inside
//! its own `durable_replace`. The two
//! files are not updated atomically together: a crash between them leaves
//! a chunk with the new tag beside a bloom with the old one, which the next
//! `tag_chunk` finishes.

use chunk_bloom::{ChunkBloom, BLOOM_TAG_OFFSET};
use shared_types::VersionTag;

use super::ChunkIndexService;
use crate::adapters::fs::{
    durable_replace, list_ranges, patch_synced, read_bloom_header, read_header, write_synced,
    ChunkReader,
};
use crate::domain::cancel::CancellationFlag;
use crate::domain::errors::IndexError;
use crate::domain::header::HASH_OFFSET;
use crate::domain::range::FileRange;
use crate::ports::outbound::{PathResolver, CHUNK_EXT};

impl<P: PathResolver> ChunkIndexService<P> {
    pub(crate) fn retag(&self, range: FileRange, tag: &VersionTag) -> Result<bool, IndexError> {
        self.ensure_writable()?;
        let handle = self.ranges.handle(range);
        let _guard = handle.lock();

        self.recover_range(&range)?;

        let chunk_path = self.chunk_path(&range);
        let bloom_path = self.bloom_path(&range);
        let tmp_dir = self.tmp_dir();
        let cancel = CancellationFlag::new();

        let header = read_header(&chunk_path)?;
        let bloom_header = match read_bloom_header(&bloom_path) {
            Ok(h) => Some(h),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        if header.hash == *tag && bloom_header.map_or(false, |h| h.tag == *tag) {
            tracing::debug!(range = %range, tag = %tag, "[chunk-index] already tagged");
            return Ok(false);
        }

        if header.hash != *tag {
            self.escalate(durable_replace(&tmp_dir, &[chunk_path.as_path()], &cancel, |_| {
                patch_synced(&chunk_path, HASH_OFFSET, tag.as_bytes())
            }))?;
        }

        match bloom_header {
            Some(h) if h.tag == *tag => {}
            Some(_) => {
                self.escalate(durable_replace(&tmp_dir, &[bloom_path.as_path()], &cancel, |_| {
                    patch_synced(&bloom_path, BLOOM_TAG_OFFSET, tag.as_bytes())
                }))?;
            }
            None => {
                let addresses = ChunkReader::open(&chunk_path)?.address_table()?;
                let bloom = ChunkBloom::from_addresses(*tag, addresses.iter().map(|r| &r.address));
                self.escalate(durable_replace(&tmp_dir, &[bloom_path.as_path()], &cancel, |_| {
                    write_synced(&bloom_path, |w| {
                        bloom.write_to(w).map_err(|e| IndexError::bloom(&bloom_path, e))
                    })
                }))?;
                tracing::warn!(range = %range, "[chunk-index] bloom was missing, rebuilt while tagging");
            }
        }

        self.metrics.record_tag();
        tracing::info!(range = %range, tag = %tag, "[chunk-index] tagged chunk");
        Ok(true)
    }

    pub(crate) fn retag_all(&self, tag: &VersionTag) -> Result<usize, IndexError> {
        let mut rewritten = 0;
        for (range, _) in list_ranges(&self.index_dir(), CHUNK_EXT)? {
            if self.retag(range, tag)? {
                rewritten += 1;
            }
        }
        self.ranges.prune();
        tracing::info!(rewritten, tag = %tag, "[chunk-index] tagged chain");
        Ok(rewritten)
    }
}
