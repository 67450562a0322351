//! Hash functions for the chunk bloom
//!
//! An address is hashed once with keccak256. The first 20 bytes of the
//! digest are read as five big-endian `u32` words, and each word modulo the
//! array width names one bit.

use shared_types::{keccak256, Address};

use super::parameters::{BITS_PER_ADDRESS, BLOOM_WIDTH_IN_BITS, BLOOM_WIDTH_IN_BYTES};

/// Compute the k bit numbers an address sets.
pub fn compute_bit_positions(address: &Address) -> [u32; BITS_PER_ADDRESS] {
    let digest = keccak256(address.as_bytes());
    let mut bits = [0u32; BITS_PER_ADDRESS];
    for (i, bit) in bits.iter_mut().enumerate() {
        let start = i * 4;
        let word = u32::from_be_bytes([
            digest[start],
            digest[start + 1],
            digest[start + 2],
            digest[start + 3],
        ]);
        *bit = word % BLOOM_WIDTH_IN_BITS as u32;
    }
    bits
}

/// Byte index and mask of a bit number inside the serialized array.
///
/// Bytes are laid out high bit number first: bit 0 lives in the last byte.
pub fn bit_location(bit: u32) -> (usize, u8) {
    let which = (bit / 8) as usize;
    let index = BLOOM_WIDTH_IN_BYTES - which - 1;
    let mask = 1u8 << (bit % 8);
    (index, mask)
}
