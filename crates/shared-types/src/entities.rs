//! # Core Index Entities
//!
//! The primitives every index crate agrees on.
//!
//! ## Clusters
//!
//! - **Identity**: `Address`, `Hash`
//! - **Versioning**: `VersionTag`
//! - **Location**: `Appearance`

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

use crate::errors::TypesError;

/// A 32-byte keccak digest.
pub type Hash = [u8; 32];

/// Width of an address in bytes.
pub const ADDRESS_LEN: usize = 20;

/// Manifest version string the current index format is built against.
pub const DEFAULT_MANIFEST_VERSION: &str = "trueblocks-core@v2.0.0-release";

/// Keccak256 of arbitrary bytes.
pub fn keccak256(data: &[u8]) -> Hash {
    let digest = Keccak256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

// =============================================================================
// ADDRESS
// =============================================================================

/// A 20-byte account identifier.
///
/// Ordering is plain byte ordering, which is the sort order of the
/// address table inside a chunk.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    /// Build an address from exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypesError> {
        let arr: [u8; ADDRESS_LEN] =
            bytes
                .try_into()
                .map_err(|_| TypesError::InvalidLength {
                    expected: ADDRESS_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(arr))
    }

    /// Parse a hex address, with or without the `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, TypesError> {
        let bytes = decode_hex(s)?;
        Self::from_slice(&bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; ADDRESS_LEN]> for Address {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }
}

// =============================================================================
// VERSION TAG
// =============================================================================

/// Version identifier stamped into chunk and bloom headers.
///
/// This is the keccak of a manifest version string. It identifies the
/// format a file was built against; it is not a content checksum.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VersionTag(pub Hash);

impl VersionTag {
    /// Tag for a manifest version string.
    pub fn from_manifest_version(version: &str) -> Self {
        Self(keccak256(version.as_bytes()))
    }

    /// Parse a 32-byte hex tag.
    pub fn from_hex(s: &str) -> Result<Self, TypesError> {
        let bytes = decode_hex(s)?;
        let arr: Hash = bytes
            .as_slice()
            .try_into()
            .map_err(|_| TypesError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionTag({})", self.to_hex())
    }
}

// =============================================================================
// APPEARANCE
// =============================================================================

/// A `(block, transaction index)` location where an address occurs.
///
/// Derived ordering is block first, then transaction index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Appearance {
    pub block_number: u32,
    pub transaction_index: u32,
}

impl Appearance {
    pub fn new(block_number: u32, transaction_index: u32) -> Self {
        Self {
            block_number,
            transaction_index,
        }
    }
}

impl fmt::Display for Appearance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.block_number, self.transaction_index)
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, TypesError> {
    let trimmed = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    hex::decode(trimmed).map_err(|e| TypesError::InvalidHex(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_hex_roundtrip() {
        let addr = Address::from_hex("0x00000000000000000000000000000000000000ff").unwrap();
        assert_eq!(addr.0[19], 0xff);
        assert_eq!(addr.to_hex(), "0x00000000000000000000000000000000000000ff");
        assert_eq!("00000000000000000000000000000000000000ff".parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        let result = Address::from_hex("0xdeadbeef");
        assert!(matches!(
            result,
            Err(TypesError::InvalidLength {
                expected: 20,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_address_rejects_bad_hex() {
        assert!(matches!(
            Address::from_hex("0xzz"),
            Err(TypesError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_address_ordering_is_bytewise() {
        let low = Address([0x01; 20]);
        let mut high_bytes = [0x01; 20];
        high_bytes[0] = 0x02;
        let high = Address(high_bytes);
        assert!(low < high);
    }

    #[test]
    fn test_version_tag_is_keccak_of_manifest() {
        // keccak256("") is a well known constant
        let empty = VersionTag::from_manifest_version("");
        assert_eq!(
            empty.to_hex(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );

        let current = VersionTag::from_manifest_version(DEFAULT_MANIFEST_VERSION);
        assert_ne!(current, empty);
        assert_eq!(VersionTag::from_hex(&current.to_hex()).unwrap(), current);
    }

    #[test]
    fn test_appearance_orders_by_block_then_tx() {
        let mut apps = vec![
            Appearance::new(10, 2),
            Appearance::new(9, 7),
            Appearance::new(10, 1),
        ];
        apps.sort();
        assert_eq!(
            apps,
            vec![
                Appearance::new(9, 7),
                Appearance::new(10, 1),
                Appearance::new(10, 2)
            ]
        );
    }
}
