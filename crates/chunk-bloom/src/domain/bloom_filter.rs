//! Single fixed-width bloom array
//!
//! INVARIANTS:
//! - No false negatives: if inserted, contains() MUST return true
//! - Width is always BLOOM_WIDTH_IN_BITS

use bitvec::prelude::*;
use shared_types::Address;

use super::hash_functions::{bit_location, compute_bit_positions};
use super::parameters::{calculate_fpr, BITS_PER_ADDRESS, BLOOM_WIDTH_IN_BITS, BLOOM_WIDTH_IN_BYTES};
use crate::error::BloomError;

/// One bit array of a chunk bloom.
///
/// The backing storage is kept in on-disk byte order, so serialization is a
/// straight copy of the raw slice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BloomFilter {
    /// Bit array storing the filter state
    bits: BitVec<u8, Lsb0>,
    /// Number of addresses inserted (n)
    n: u32,
}

impl Default for BloomFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl BloomFilter {
    /// Create an empty array.
    pub fn new() -> Self {
        Self {
            bits: bitvec![u8, Lsb0; 0; BLOOM_WIDTH_IN_BITS],
            n: 0,
        }
    }

    /// Rebuild an array from its serialized bytes and insertion count.
    pub fn from_raw(bytes: Vec<u8>, n_inserted: u32) -> Result<Self, BloomError> {
        if bytes.len() != BLOOM_WIDTH_IN_BYTES {
            return Err(BloomError::BadWidth {
                expected: BLOOM_WIDTH_IN_BYTES,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            bits: BitVec::<u8, Lsb0>::from_vec(bytes),
            n: n_inserted,
        })
    }

    /// Insert an address.
    ///
    /// After insertion, `contains(address)` is guaranteed to return true.
    pub fn insert(&mut self, address: &Address) {
        for bit in compute_bit_positions(address) {
            self.bits.set(Self::index_of(bit), true);
        }
        self.n += 1;
    }

    /// Test if an address might be in the array.
    ///
    /// Returns:
    /// - `true` if the address might be present (could be a false positive)
    /// - `false` if the address is definitely NOT present
    pub fn contains(&self, address: &Address) -> bool {
        compute_bit_positions(address)
            .iter()
            .all(|&bit| self.bits[Self::index_of(bit)])
    }

    /// Calculate the current false positive rate
    pub fn false_positive_rate(&self) -> f64 {
        calculate_fpr(BLOOM_WIDTH_IN_BITS, self.n as usize, BITS_PER_ADDRESS)
    }

    /// Get the number of bits set in the array
    pub fn bits_set(&self) -> usize {
        self.bits.count_ones()
    }

    /// Get the number of addresses inserted
    pub fn elements_inserted(&self) -> u32 {
        self.n
    }

    /// Raw bytes in file order.
    pub fn as_raw_slice(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }

    fn index_of(bit: u32) -> usize {
        let (byte, mask) = bit_location(bit);
        byte * 8 + mask.trailing_zeros() as usize
    }
}
