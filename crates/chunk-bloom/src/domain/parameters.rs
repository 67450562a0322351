//! Fixed chunk bloom parameters
//!
//! Every chunk bloom in a deployment uses the same geometry so that bloom
//! files can be compared and rebuilt bit-for-bit.
//!
//! Formulas:
//! - FPR = (1 - e^(-kn/m))^k

/// Width of one bit array in bytes.
pub const BLOOM_WIDTH_IN_BYTES: usize = 1_048_576 / 8;

/// Width of one bit array in bits (m).
pub const BLOOM_WIDTH_IN_BITS: usize = BLOOM_WIDTH_IN_BYTES * 8;

/// Bits set per address (k).
pub const BITS_PER_ADDRESS: usize = 5;

/// Addresses a single bit array takes before a new one is started.
pub const MAX_ADDRS_IN_BLOOM: u32 = 50_000;

/// Bloom parameters with their expected false positive rate.
#[derive(Clone, Debug, PartialEq)]
pub struct BloomFilterParams {
    /// Number of bits in one array
    pub size_bits: usize,
    /// Number of bit positions per element
    pub hash_count: usize,
    /// Expected false positive rate at `elements`
    pub expected_fpr: f64,
    /// Element count the estimate was computed for
    pub elements: usize,
}

impl BloomFilterParams {
    /// Parameters of a chunk bloom array holding `elements` addresses.
    pub fn for_elements(elements: usize) -> Self {
        Self {
            size_bits: BLOOM_WIDTH_IN_BITS,
            hash_count: BITS_PER_ADDRESS,
            expected_fpr: calculate_fpr(BLOOM_WIDTH_IN_BITS, elements, BITS_PER_ADDRESS),
            elements,
        }
    }

    /// Parameters of a full array.
    pub fn at_capacity() -> Self {
        Self::for_elements(MAX_ADDRS_IN_BLOOM as usize)
    }
}

/// Calculate the false positive rate for given parameters
///
/// Formula: FPR = (1 - e^(-kn/m))^k
pub fn calculate_fpr(m: usize, n: usize, k: usize) -> f64 {
    if m == 0 {
        return 1.0;
    }
    let exponent = -(k as f64) * (n as f64) / (m as f64);
    (1.0 - exponent.exp()).powi(k as i32)
}
