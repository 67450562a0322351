//! Chunk bloom: the bloom file that accompanies one chunk
//!
//! ## File Layout (little-endian)
//!
//! ```text
//! [Magic:u16][Tag:32][Count:u32]
//! Count × { [NInserted:u32][Bits:BLOOM_WIDTH_IN_BYTES] }
//! ```
//!
//! A chunk bloom is a pure function of its chunk's address set. It is built
//! once per write and never patched.

use std::io::{Read, Write};

use shared_types::{Address, VersionTag};

use super::bloom_filter::BloomFilter;
use super::parameters::{BLOOM_WIDTH_IN_BYTES, MAX_ADDRS_IN_BLOOM};
use crate::error::BloomError;

/// Format sentinel at the start of every bloom file.
pub const BLOOM_MAGIC: u16 = 0xdead;

/// Byte offset of the version tag inside a bloom file.
pub const BLOOM_TAG_OFFSET: u64 = 2;

/// Size of magic + tag + count.
pub const BLOOM_HEADER_SIZE: usize = 2 + 32 + 4;

/// Size of one serialized array including its insertion counter.
pub const BLOOM_ARRAY_SIZE: usize = 4 + BLOOM_WIDTH_IN_BYTES;

/// Arrays reserved up front when reading; the rest grow as they arrive.
const PREALLOCATED_ARRAYS: u32 = 16;

/// Header of a bloom file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloomHeader {
    pub magic: u16,
    pub tag: VersionTag,
    pub count: u32,
}

impl BloomHeader {
    /// Decode and check the magic of a 38-byte header.
    pub fn decode(buf: &[u8; BLOOM_HEADER_SIZE]) -> Result<Self, BloomError> {
        let magic = u16::from_le_bytes([buf[0], buf[1]]);
        if magic != BLOOM_MAGIC {
            return Err(BloomError::BadMagic {
                expected: BLOOM_MAGIC,
                found: magic,
            });
        }
        let mut tag = [0u8; 32];
        tag.copy_from_slice(&buf[2..34]);
        let count = u32::from_le_bytes([buf[34], buf[35], buf[36], buf[37]]);
        Ok(Self {
            magic,
            tag: VersionTag(tag),
            count,
        })
    }

    pub fn encode(&self) -> [u8; BLOOM_HEADER_SIZE] {
        let mut buf = [0u8; BLOOM_HEADER_SIZE];
        buf[0..2].copy_from_slice(&self.magic.to_le_bytes());
        buf[2..34].copy_from_slice(self.tag.as_bytes());
        buf[34..38].copy_from_slice(&self.count.to_le_bytes());
        buf
    }

    /// Read just the header from a bloom stream.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, BloomError> {
        let mut buf = [0u8; BLOOM_HEADER_SIZE];
        reader.read_exact(&mut buf)?;
        Self::decode(&buf)
    }
}

/// The set of bit arrays covering one chunk's addresses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkBloom {
    tag: VersionTag,
    blooms: Vec<BloomFilter>,
}

impl ChunkBloom {
    /// Create an empty bloom carrying `tag`.
    pub fn new(tag: VersionTag) -> Self {
        Self {
            tag,
            blooms: Vec::new(),
        }
    }

    /// Build a bloom from a whole address set.
    pub fn from_addresses<'a, I>(tag: VersionTag, addresses: I) -> Self
    where
        I: IntoIterator<Item = &'a Address>,
    {
        let mut bloom = Self::new(tag);
        for address in addresses {
            bloom.insert(address);
        }
        bloom
    }

    /// Insert an address, starting a new array once the current one is full.
    pub fn insert(&mut self, address: &Address) {
        let needs_array = self
            .blooms
            .last()
            .map_or(true, |b| b.elements_inserted() >= MAX_ADDRS_IN_BLOOM);
        if needs_array {
            tracing::trace!(arrays = self.blooms.len() + 1, "[chunk-bloom] starting bit array");
            self.blooms.push(BloomFilter::new());
        }
        if let Some(current) = self.blooms.last_mut() {
            current.insert(address);
        }
    }

    /// May return false positives, never false negatives.
    pub fn test(&self, address: &Address) -> bool {
        self.blooms.iter().any(|b| b.contains(address))
    }

    pub fn version_tag(&self) -> VersionTag {
        self.tag
    }

    pub fn set_version_tag(&mut self, tag: VersionTag) {
        self.tag = tag;
    }

    /// Total addresses inserted across all arrays.
    pub fn address_count(&self) -> u64 {
        self.blooms.iter().map(|b| b.elements_inserted() as u64).sum()
    }

    /// Number of bit arrays.
    pub fn array_count(&self) -> usize {
        self.blooms.len()
    }

    /// Probability that a random absent address tests positive.
    pub fn false_positive_rate(&self) -> f64 {
        let miss_all: f64 = self
            .blooms
            .iter()
            .map(|b| 1.0 - b.false_positive_rate())
            .product();
        1.0 - miss_all
    }

    pub fn header(&self) -> BloomHeader {
        BloomHeader {
            magic: BLOOM_MAGIC,
            tag: self.tag,
            count: self.blooms.len() as u32,
        }
    }

    /// Size of the serialized file in bytes.
    pub fn encoded_len(&self) -> usize {
        BLOOM_HEADER_SIZE + self.blooms.len() * BLOOM_ARRAY_SIZE
    }

    /// Write the whole bloom as one contiguous block.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), BloomError> {
        writer.write_all(&self.header().encode())?;
        for bloom in &self.blooms {
            writer.write_all(&bloom.elements_inserted().to_le_bytes())?;
            writer.write_all(bloom.as_raw_slice())?;
        }
        Ok(())
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        // Writing into a Vec cannot fail
        let _ = self.write_to(&mut out);
        out
    }

    /// Read a whole bloom from a stream.
    ///
    /// The stream must end exactly after the last array. The header count is
    /// not trusted for allocation; a count larger than the stream ends in
    /// `Truncated`.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, BloomError> {
        let header = BloomHeader::read_from(reader)?;
        let mut blooms = Vec::with_capacity(header.count.min(PREALLOCATED_ARRAYS) as usize);
        for index in 0..header.count {
            let mut counter = [0u8; 4];
            reader
                .read_exact(&mut counter)
                .map_err(|e| BloomError::from_short_read(e, index))?;
            let mut raw = vec![0u8; BLOOM_WIDTH_IN_BYTES];
            reader
                .read_exact(&mut raw)
                .map_err(|e| BloomError::from_short_read(e, index))?;
            blooms.push(BloomFilter::from_raw(raw, u32::from_le_bytes(counter))?);
        }

        let mut trailing = [0u8; 1];
        if reader.read(&mut trailing)? != 0 {
            return Err(BloomError::TrailingBytes {
                arrays: header.count,
            });
        }

        Ok(Self {
            tag: header.tag,
            blooms,
        })
    }

    pub fn decode(mut bytes: &[u8]) -> Result<Self, BloomError> {
        Self::read_from(&mut bytes)
    }
}
