//! Domain Layer - Pure bloom logic
//!
//! This layer contains:
//! - Hash-to-bit mapping
//! - Fixed array geometry and FPR estimate
//! - Single bit array
//! - Multi-array chunk bloom and its file codec
//!
//! RULES:
//! - No filesystem access (codecs work over `Read`/`Write`)
//! - No async code

pub mod bloom_filter;
pub mod chunk_bloom;
pub mod hash_functions;
pub mod parameters;

pub use bloom_filter::BloomFilter;
pub use chunk_bloom::{
    BloomHeader, ChunkBloom, BLOOM_ARRAY_SIZE, BLOOM_HEADER_SIZE, BLOOM_MAGIC, BLOOM_TAG_OFFSET,
};
pub use hash_functions::{bit_location, compute_bit_positions};
pub use parameters::{
    calculate_fpr, BloomFilterParams, BITS_PER_ADDRESS, BLOOM_WIDTH_IN_BITS, BLOOM_WIDTH_IN_BYTES,
    MAX_ADDRS_IN_BLOOM,
};
