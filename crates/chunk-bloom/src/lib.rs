//! # Chunk Bloom
//!
//! Per-chunk bloom filters used to skip chunks that provably do not contain
//! a queried address.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): Pure bloom logic, no filesystem access
//!   - `BloomFilter`: one fixed-width bit array
//!   - `ChunkBloom`: the arrays of one chunk plus the bloom file codec
//!   - `compute_bit_positions`: keccak-based address to bit mapping
//!
//! ## Invariants
//!
//! - **No false negatives**: an inserted address always tests true
//! - **Rebuild, never patch**: a chunk bloom is built from the final address
//!   set of its chunk on every write
//!
//! ## Usage Example
//!
//! ```ignore
//! use chunk_bloom::ChunkBloom;
//! use shared_types::{Address, VersionTag};
//!
//! let tag = VersionTag::from_manifest_version("trueblocks-core@v2.0.0-release");
//! let bloom = ChunkBloom::from_addresses(tag, &addresses);
//! assert!(bloom.test(&addresses[0]));
//!
//! let bytes = bloom.encode();
//! let restored = ChunkBloom::decode(&bytes)?;
//! ```

pub mod domain;
pub mod error;

pub use domain::{
    BloomFilter, BloomHeader, ChunkBloom, BLOOM_HEADER_SIZE, BLOOM_MAGIC, BLOOM_TAG_OFFSET,
};
pub use error::BloomError;
