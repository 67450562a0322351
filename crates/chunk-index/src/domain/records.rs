//! # Table Records
//!
//! Fixed-width records of the two chunk tables. Encoding is explicit and
//! little-endian; nothing relies on in-memory struct layout.

use shared_types::{Address, Appearance, ADDRESS_LEN};

use super::header::read_u32;

/// Size of one address table entry.
pub const ADDRESS_RECORD_SIZE: usize = 28;

/// Size of one appearance table entry.
pub const APPEARANCE_RECORD_SIZE: usize = 8;

/// A record with a fixed on-disk width.
pub trait FixedRecord: Sized {
    const SIZE: usize;

    /// Write exactly `SIZE` bytes into `out`.
    fn encode_into(&self, out: &mut [u8]);

    /// Read from exactly `SIZE` bytes.
    fn decode_from(buf: &[u8]) -> Self;
}

/// One entry of the address table.
///
/// `offset`/`count` delimit this address's slice of the appearance table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRecord {
    pub address: Address,
    pub offset: u32,
    pub count: u32,
}

impl AddressRecord {
    /// Index one past the end of this record's appearance slice.
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.count as u64
    }
}

impl FixedRecord for AddressRecord {
    const SIZE: usize = ADDRESS_RECORD_SIZE;

    fn encode_into(&self, out: &mut [u8]) {
        out[..ADDRESS_LEN].copy_from_slice(self.address.as_bytes());
        out[20..24].copy_from_slice(&self.offset.to_le_bytes());
        out[24..28].copy_from_slice(&self.count.to_le_bytes());
    }

    fn decode_from(buf: &[u8]) -> Self {
        let mut address = [0u8; ADDRESS_LEN];
        address.copy_from_slice(&buf[..ADDRESS_LEN]);
        Self {
            address: Address(address),
            offset: read_u32(buf, 20),
            count: read_u32(buf, 24),
        }
    }
}

impl FixedRecord for Appearance {
    const SIZE: usize = APPEARANCE_RECORD_SIZE;

    fn encode_into(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.block_number.to_le_bytes());
        out[4..8].copy_from_slice(&self.transaction_index.to_le_bytes());
    }

    fn decode_from(buf: &[u8]) -> Self {
        Appearance::new(read_u32(buf, 0), read_u32(buf, 4))
    }
}

/// Encode a table into one contiguous buffer.
pub fn encode_table<R: FixedRecord>(records: &[R]) -> Vec<u8> {
    let mut out = vec![0u8; records.len() * R::SIZE];
    for (record, chunk) in records.iter().zip(out.chunks_exact_mut(R::SIZE)) {
        record.encode_into(chunk);
    }
    out
}

/// Decode a buffer holding a whole number of records.
pub fn decode_table<R: FixedRecord>(buf: &[u8]) -> Vec<R> {
    buf.chunks_exact(R::SIZE).map(R::decode_from).collect()
}
