//! Cooperative cancellation for long writes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::errors::IndexError;

/// Shared cancel switch checked between the steps of a write.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with `Cancelled { stage }` if the flag has been raised.
    pub fn checkpoint(&self, stage: &'static str) -> Result<(), IndexError> {
        if self.is_cancelled() {
            tracing::warn!(stage, "[chunk-index] operation cancelled");
            return Err(IndexError::Cancelled { stage });
        }
        Ok(())
    }
}
