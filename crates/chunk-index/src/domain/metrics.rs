//! Counters for index operations.
//!
//! ## Usage
//!
//! ```ignore
//! let metrics = service.metrics();
//! let snapshot = metrics.snapshot();
//! println!("bloom hit rate: {:.3}", snapshot.bloom_positive_rate());
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters shared by every operation of one service.
#[derive(Debug, Default)]
pub struct IndexMetrics {
    /// Chunks committed by `write_chunk`
    pub chunks_written: AtomicU64,
    /// Chunk and bloom bytes committed
    pub bytes_written: AtomicU64,
    /// Chunks whose header tag was rewritten
    pub chunks_tagged: AtomicU64,
    /// Lookups answered by the bloom alone
    pub bloom_negatives: AtomicU64,
    /// Lookups the bloom passed on to the address table
    pub bloom_positives: AtomicU64,
    /// Bloom positives the address table did not confirm
    pub bloom_false_positives: AtomicU64,
    /// Files put back from a backup
    pub restores: AtomicU64,
}

impl IndexMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_write(&self, bytes: u64) {
        self.chunks_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_tag(&self) {
        self.chunks_tagged.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a bloom test, and for positives whether the table confirmed it.
    pub fn record_lookup(&self, bloom_hit: bool, found: bool) {
        if !bloom_hit {
            self.bloom_negatives.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.bloom_positives.fetch_add(1, Ordering::Relaxed);
        if !found {
            self.bloom_false_positives.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_restores(&self, count: u64) {
        self.restores.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            chunks_written: self.chunks_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            chunks_tagged: self.chunks_tagged.load(Ordering::Relaxed),
            bloom_negatives: self.bloom_negatives.load(Ordering::Relaxed),
            bloom_positives: self.bloom_positives.load(Ordering::Relaxed),
            bloom_false_positives: self.bloom_false_positives.load(Ordering::Relaxed),
            restores: self.restores.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of `IndexMetrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub chunks_written: u64,
    pub bytes_written: u64,
    pub chunks_tagged: u64,
    pub bloom_negatives: u64,
    pub bloom_positives: u64,
    pub bloom_false_positives: u64,
    pub restores: u64,
}

impl MetricsSnapshot {
    /// Share of bloom tests that passed.
    pub fn bloom_positive_rate(&self) -> f64 {
        let total = self.bloom_negatives + self.bloom_positives;
        if total == 0 {
            0.0
        } else {
            self.bloom_positives as f64 / total as f64
        }
    }

    /// Share of bloom positives that were false.
    pub fn observed_false_positive_rate(&self) -> f64 {
        if self.bloom_positives == 0 {
            0.0
        } else {
            self.bloom_false_positives as f64 / self.bloom_positives as f64
        }
    }
}
