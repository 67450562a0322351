//! # Chunk Header
//!
//! The first 44 bytes of every chunk file, little-endian:
//!
//! ```text
//! [Magic:4][Hash:32][AddressCount:4][AppearanceCount:4]
//! ```
//!
//! Magic is checked on every read. Hash is only compared against the
//! current manifest tag when full validation is asked for.

use shared_types::VersionTag;
use std::fmt;
use std::path::Path;

use super::errors::IndexError;

/// Format sentinel shared by every chunk.
pub const MAGIC_NUMBER: u32 = 0xdeadbeef;

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 44;

/// Byte offset of the version hash inside the header.
pub const HASH_OFFSET: u64 = 4;

/// Header of a chunk file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderRecord {
    pub magic: u32,
    pub hash: VersionTag,
    pub address_count: u32,
    pub appearance_count: u32,
}

impl HeaderRecord {
    /// Header for a freshly built chunk.
    pub fn new(hash: VersionTag, address_count: u32, appearance_count: u32) -> Self {
        Self {
            magic: MAGIC_NUMBER,
            hash,
            address_count,
            appearance_count,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..36].copy_from_slice(self.hash.as_bytes());
        buf[36..40].copy_from_slice(&self.address_count.to_le_bytes());
        buf[40..44].copy_from_slice(&self.appearance_count.to_le_bytes());
        buf
    }

    /// Decode without checking the magic.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Self {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&buf[4..36]);
        Self {
            magic: read_u32(buf, 0),
            hash: VersionTag(hash),
            address_count: read_u32(buf, 36),
            appearance_count: read_u32(buf, 40),
        }
    }

    /// Reject the header unless its magic is `MAGIC_NUMBER`.
    pub fn check_magic(&self, path: &Path) -> Result<(), IndexError> {
        if self.magic != MAGIC_NUMBER {
            return Err(IndexError::BadMagic {
                path: path.to_path_buf(),
                expected: MAGIC_NUMBER,
                found: self.magic,
            });
        }
        Ok(())
    }

    /// Reject the header unless it carries `expected`.
    pub fn check_hash(&self, path: &Path, expected: &VersionTag) -> Result<(), IndexError> {
        if self.hash != *expected {
            return Err(IndexError::StaleVersion {
                path: path.to_path_buf(),
                expected: *expected,
                found: self.hash,
            });
        }
        Ok(())
    }
}

impl fmt::Display for HeaderRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{\"magic\":\"{:#010x}\",\"hash\":\"{}\",\"addressCount\":{},\"appearanceCount\":{}}}",
            self.magic, self.hash, self.address_count, self.appearance_count
        )
    }
}

pub(crate) fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}
