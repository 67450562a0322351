//! # Chunk Index
//!
//! File-based index from addresses to the `(block, transaction)` locations
//! where they appear, cut into immutable chunks with a bloom filter each.
//!
//! ## Chunk File (little-endian)
//!
//! ```text
//! HeaderRecord       44 bytes   [Magic:4][Hash:32][AddressCount:4][AppearanceCount:4]
//! AddressRecord[]    A × 28     [Address:20][Offset:4][Count:4]
//! AppearanceRecord[] P × 8      [Block:4][TxIndex:4]
//! ```
//!
//! Files are named `<first:09>-<last:09>.bin` in `finalized/`, with a
//! `<first:09>-<last:09>.bloom` beside them in `blooms/`.
//!
//! ## Domain Invariants
//!
//! | Invariant | Description |
//! |-----------|-------------|
//! | Sorted tables | Addresses ascend; each slice of appearances ascends |
//! | Contiguous offsets | Address slices tile the appearance table exactly |
//! | Bloom mirrors chunk | Rebuilt from the final address set on every write |
//! | Durable replace | A failed write leaves the previous files (or none) |
//! | Quarantine | A failed restore halts writes to the chain |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - range codec, chunk format, table checks, decache planning
//! - `ports/` - `ChunkIndexApi` and `PathResolver`
//! - `adapters/` - filesystem reads and durable writes, locking, paths
//! - `service/` - `ChunkIndexService`
//!
//! ## Usage
//!
//! ```ignore
//! use chunk_index::{ChunkIndexApi, ChunkIndexService, CancellationFlag, FileRange, IndexConfig};
//!
//! let service = ChunkIndexService::open(IndexConfig::from_env())?;
//! let report = service.write_chunk(
//!     FileRange::new(0, 2_000_000),
//!     &working_set,
//!     total,
//!     &CancellationFlag::new(),
//! )?;
//!
//! let hits = service.find_appearances(&address)?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::fs::{ChunkReader, QueryOutcome};
pub use adapters::{IndexLock, LockError, UnchainedPaths};
pub use domain::{
    AddressAppearanceMap, AddressRecord, AuditReport, CacheEntry, CancellationFlag, ChunkData,
    DecacheOutcome, DecachePlan, EntryKind, FileRange, HeaderRecord, IndexConfig, IndexError,
    IndexMetrics, MetricsSnapshot, RecoveryReport, WriteChunkReport, HEADER_SIZE, MAGIC_NUMBER,
};
pub use ports::inbound::ChunkIndexApi;
pub use ports::outbound::PathResolver;
pub use service::{ChunkIndexService, WriteTask, QUARANTINE_MARKER};

pub use shared_types::{Address, Appearance, VersionTag};
