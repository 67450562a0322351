//! # Chunk Data
//!
//! The in-memory form of one chunk: header, address table and appearance
//! table, built from a working set of address → appearances.
//!
//! ## Table Invariants
//!
//! | Invariant | Description |
//! |-----------|-------------|
//! | Sorted | Address table ascending by address bytes, no duplicates |
//! | Contiguous | `offset[0] == 0`, `offset[i] + count[i] == offset[i+1]` |
//! | Complete | `Σcount == appearance_count` |
//! | Ordered slices | Each address's appearances ascend by (block, tx) |

use chunk_bloom::ChunkBloom;
use shared_types::{Address, Appearance, VersionTag};
use std::collections::HashMap;
use std::io::{self, Write};

use super::errors::IndexError;
use super::header::{HeaderRecord, HEADER_SIZE};
use super::range::FileRange;
use super::records::{encode_table, AddressRecord, ADDRESS_RECORD_SIZE, APPEARANCE_RECORD_SIZE};

/// Working set handed to the writer: every appearance of every address in
/// one block range.
pub type AddressAppearanceMap = HashMap<Address, Vec<Appearance>>;

/// Expected file size for the given table lengths.
pub fn chunk_file_size(address_count: u64, appearance_count: u64) -> u64 {
    HEADER_SIZE as u64
        + address_count * ADDRESS_RECORD_SIZE as u64
        + appearance_count * APPEARANCE_RECORD_SIZE as u64
}

/// One chunk's tables, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkData {
    header: HeaderRecord,
    addresses: Vec<AddressRecord>,
    appearances: Vec<Appearance>,
}

impl ChunkData {
    /// Build both tables from a working set.
    ///
    /// `declared_appearances` is the caller's running total; it sizes the
    /// appearance table up front. The header always carries the real count.
    pub fn build(
        tag: VersionTag,
        working_set: &AddressAppearanceMap,
        declared_appearances: usize,
    ) -> Result<Self, IndexError> {
        let mut sorted: Vec<&Address> = working_set.keys().collect();
        sorted.sort_unstable();

        let mut addresses = Vec::with_capacity(sorted.len());
        let mut appearances = Vec::with_capacity(declared_appearances);
        let mut offset: u32 = 0;

        for address in sorted {
            let mut apps = working_set[address].clone();
            apps.sort();
            let count = u32::try_from(apps.len()).map_err(|_| IndexError::ChunkTooLarge {
                appearances: apps.len(),
            })?;

            addresses.push(AddressRecord {
                address: *address,
                offset,
                count,
            });
            appearances.extend(apps);

            offset = offset
                .checked_add(count)
                .ok_or(IndexError::ChunkTooLarge {
                    appearances: appearances.len(),
                })?;
        }

        if appearances.len() != declared_appearances {
            tracing::warn!(
                declared = declared_appearances,
                actual = appearances.len(),
                "[chunk-index] declared appearance count differs from working set"
            );
        }

        let address_count = u32::try_from(addresses.len()).map_err(|_| {
            IndexError::ChunkTooLarge {
                appearances: appearances.len(),
            }
        })?;
        let header = HeaderRecord::new(tag, address_count, offset);

        Ok(Self {
            header,
            addresses,
            appearances,
        })
    }

    pub fn header(&self) -> &HeaderRecord {
        &self.header
    }

    pub fn addresses(&self) -> &[AddressRecord] {
        &self.addresses
    }

    pub fn appearances(&self) -> &[Appearance] {
        &self.appearances
    }

    /// Build the bloom from the same address set as the address table.
    pub fn build_bloom(&self) -> ChunkBloom {
        ChunkBloom::from_addresses(self.header.hash, self.addresses.iter().map(|r| &r.address))
    }

    pub fn file_size(&self) -> u64 {
        chunk_file_size(self.addresses.len() as u64, self.appearances.len() as u64)
    }

    /// Appearances of `address`, if it is in the table.
    pub fn lookup(&self, address: &Address) -> Option<&[Appearance]> {
        let idx = self
            .addresses
            .binary_search_by(|r| r.address.cmp(address))
            .ok()?;
        let record = &self.addresses[idx];
        self.appearances
            .get(record.offset as usize..record.end() as usize)
    }

    /// Write header, address table, appearance table, in that order.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.header.encode())?;
        writer.write_all(&encode_table(&self.addresses))?;
        writer.write_all(&encode_table(&self.appearances))?;
        Ok(())
    }
}

/// Check the table invariants of a decoded chunk.
///
/// Returns one message per violation; an empty list means the tables are
/// sound. Appearances outside `range` are reported when the range is not
/// inverted.
pub fn check_tables(
    header: &HeaderRecord,
    addresses: &[AddressRecord],
    appearances: &[Appearance],
    range: &FileRange,
) -> Vec<String> {
    let mut problems = Vec::new();

    if addresses.len() != header.address_count as usize {
        problems.push(format!(
            "header claims {} addresses, table has {}",
            header.address_count,
            addresses.len()
        ));
    }
    if appearances.len() != header.appearance_count as usize {
        problems.push(format!(
            "header claims {} appearances, table has {}",
            header.appearance_count,
            appearances.len()
        ));
    }

    let mut expected_offset: u64 = 0;
    for (i, record) in addresses.iter().enumerate() {
        if i > 0 && addresses[i - 1].address >= record.address {
            problems.push(format!("address {} out of order at index {}", record.address, i));
        }
        if record.offset as u64 != expected_offset {
            problems.push(format!(
                "address {} starts at {}, expected {}",
                record.address, record.offset, expected_offset
            ));
        }
        expected_offset = record.end();

        if let Some(slice) = appearances.get(record.offset as usize..record.end() as usize) {
            if slice.windows(2).any(|w| w[0] > w[1]) {
                problems.push(format!("appearances of {} are not sorted", record.address));
            }
        } else {
            problems.push(format!(
                "address {} points past the appearance table",
                record.address
            ));
        }
    }
    if expected_offset != header.appearance_count as u64 {
        problems.push(format!(
            "address slices cover {} appearances, header claims {}",
            expected_offset, header.appearance_count
        ));
    }

    if !range.is_inverted() {
        if let Some(stray) = appearances
            .iter()
            .find(|a| !range.contains(a.block_number as u64))
        {
            problems.push(format!("appearance {} lies outside {}", stray, range));
        }
    }

    problems
}
