//! # Chunk Writer
//!
//! Build tables and bloom, then commit both through `durable_replace`.

use shared_types::Appearance;

use super::ChunkIndexService;
use crate::adapters::fs::{durable_replace, write_synced};
use crate::domain::cancel::CancellationFlag;
use crate::domain::chunk::{AddressAppearanceMap, ChunkData};
use crate::domain::errors::{IndexError, IoResultExt};
use crate::domain::range::FileRange;
use crate::domain::report::WriteChunkReport;
use crate::ports::outbound::PathResolver;

impl<P: PathResolver> ChunkIndexService<P> {
    pub(crate) fn commit_chunk(
        &self,
        range: FileRange,
        working_set: &AddressAppearanceMap,
        appearance_count: usize,
        cancel: &CancellationFlag,
    ) -> Result<WriteChunkReport, IndexError> {
        self.ensure_writable()?;
        let handle = self.ranges.handle(range);
        let _guard = handle.lock();

        cancel.checkpoint("build")?;
        let chunk = ChunkData::build(self.tag, working_set, appearance_count)?;
        if chunk.header().appearance_count as u64 > self.config.apps_per_chunk {
            tracing::warn!(
                range = %range,
                appearances = chunk.header().appearance_count,
                target = self.config.apps_per_chunk,
                "[chunk-index] chunk exceeds target size"
            );
        }
        if !range.is_inverted() {
            if let Some(stray) = first_outside(&chunk, &range) {
                tracing::warn!(range = %range, appearance = %stray, "[chunk-index] appearance outside chunk range");
            }
        }
        let bloom = chunk.build_bloom();

        let chunk_path = self.chunk_path(&range);
        let bloom_path = self.bloom_path(&range);
        let tmp_dir = self.tmp_dir();

        let attempt = || {
            durable_replace(
                &tmp_dir,
                &[chunk_path.as_path(), bloom_path.as_path()],
                cancel,
                |cancel| {
                    cancel.checkpoint("tables")?;
                    let chunk_bytes =
                        write_synced(&chunk_path, |w| chunk.write_to(w).at(&chunk_path))?;
                    cancel.checkpoint("bloom")?;
                    let bloom_bytes = write_synced(&bloom_path, |w| {
                        bloom
                            .write_to(w)
                            .map_err(|e| IndexError::bloom(&bloom_path, e))
                    })?;
                    Ok((chunk_bytes, bloom_bytes))
                },
            )
        };

        let committed = match attempt() {
            Err(IndexError::InconsistentBackup { path, backup }) => {
                tracing::warn!(
                    path = %path.display(),
                    backup = %backup.display(),
                    "[chunk-index] stale backup found before write, recovering"
                );
                self.recover_range(&range).and_then(|_| attempt())
            }
            other => other,
        };
        let (file_size, bloom_size) = self.escalate(committed)?;

        let report = WriteChunkReport {
            range,
            address_count: chunk.header().address_count,
            appearance_count: chunk.header().appearance_count,
            file_size,
            snapped: self.config.is_snap(&range),
        };
        self.metrics.record_write(file_size + bloom_size);
        report.report();
        Ok(report)
    }
}

fn first_outside(chunk: &ChunkData, range: &FileRange) -> Option<Appearance> {
    chunk
        .appearances()
        .iter()
        .copied()
        .find(|a| !range.contains(a.block_number as u64))
}
