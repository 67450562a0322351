//! # Domain Layer
//!
//! Pure logic for the chunk index: file naming, the binary chunk format,
//! table construction and checks, decache planning and configuration.
//! The only I/O here is encoding into a `Write` and `DecachePlan::execute`.

pub mod cancel;
pub mod chunk;
pub mod config;
pub mod decache;
pub mod errors;
pub mod header;
pub mod metrics;
pub mod range;
pub mod records;
pub mod report;

pub use cancel::CancellationFlag;
pub use chunk::{check_tables, chunk_file_size, AddressAppearanceMap, ChunkData};
pub use config::IndexConfig;
pub use decache::{plan_decache, CacheEntry, DecacheOutcome, DecachePlan, EntryKind};
pub use errors::{IndexError, IoResultExt};
pub use header::{HeaderRecord, HASH_OFFSET, HEADER_SIZE, MAGIC_NUMBER};
pub use metrics::{IndexMetrics, MetricsSnapshot};
pub use range::{FileRange, RANGE_DIGITS};
pub use records::{
    decode_table, encode_table, AddressRecord, FixedRecord, ADDRESS_RECORD_SIZE,
    APPEARANCE_RECORD_SIZE,
};
pub use report::{AuditReport, RecoveryFailure, RecoveryReport, WriteChunkReport};
