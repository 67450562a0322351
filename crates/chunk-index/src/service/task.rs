//! # Background Writes
//!
//! Runs a chunk write on tokio's blocking pool so async hosts do not stall
//! on fsync.

use std::sync::Arc;
use tokio::task::JoinHandle;

use super::ChunkIndexService;
use crate::domain::cancel::CancellationFlag;
use crate::domain::chunk::AddressAppearanceMap;
use crate::domain::errors::IndexError;
use crate::domain::range::FileRange;
use crate::domain::report::WriteChunkReport;
use crate::ports::inbound::ChunkIndexApi;
use crate::ports::outbound::PathResolver;

/// Handle to a write running in the background.
#[derive(Debug)]
pub struct WriteTask {
    range: FileRange,
    cancel: CancellationFlag,
    handle: JoinHandle<Result<WriteChunkReport, IndexError>>,
}

impl WriteTask {
    pub fn range(&self) -> FileRange {
        self.range
    }

    /// Ask the write to stop at its next checkpoint. Previous files are
    /// restored if it already started.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the write to finish.
    pub async fn join(self) -> Result<WriteChunkReport, IndexError> {
        self.handle
            .await
            .map_err(|e| IndexError::TaskFailed(e.to_string()))?
    }
}

impl<P: PathResolver + 'static> ChunkIndexService<P> {
    /// Start `write_chunk` on the blocking pool. Must be called from within
    /// a tokio runtime.
    pub fn spawn_write(
        self: Arc<Self>,
        range: FileRange,
        working_set: AddressAppearanceMap,
        appearance_count: usize,
    ) -> WriteTask {
        let cancel = CancellationFlag::new();
        let flag = cancel.clone();
        let handle = tokio::task::spawn_blocking(move || {
            self.write_chunk(range, &working_set, appearance_count, &flag)
        });
        WriteTask {
            range,
            cancel,
            handle,
        }
    }
}
