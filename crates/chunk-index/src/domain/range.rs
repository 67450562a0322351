//! # File Ranges
//!
//! The `(first, last)` block range encoded in a chunk or bloom file name.
//!
//! ## Naming
//!
//! `<first:09>-<last:09>.<ext>`, e.g. `013433393-013436307.bloom`. A bare
//! `<n>.<ext>` is read as `(0, n)` for bootstrap chunks. `first > last` is
//! accepted as written and never rejected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::errors::IndexError;

/// Decimal digits each bound is padded to.
pub const RANGE_DIGITS: usize = 9;

/// Inclusive block range of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct FileRange {
    pub first: u64,
    pub last: u64,
}

impl FileRange {
    pub fn new(first: u64, last: u64) -> Self {
        Self { first, last }
    }

    /// Range covering a single block.
    pub fn from_block(block: u64) -> Self {
        Self::new(block, block)
    }

    /// Everything at or after `block`, as invalidated by a reorg at `block`.
    pub fn reorg_from(block: u64) -> Self {
        Self::new(block, u64::MAX)
    }

    /// Parse the range out of a file name or path.
    ///
    /// Directories and everything from the first `.` are ignored.
    pub fn from_filename(name: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = name.as_ref();
        let malformed = || IndexError::MalformedRange {
            name: path.display().to_string(),
        };

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(malformed)?;
        let stem = file_name.split('.').next().unwrap_or(file_name);

        let parts: Vec<&str> = stem.split('-').collect();
        match parts.as_slice() {
            [last] => Ok(Self::new(0, parse_bound(last).ok_or_else(malformed)?)),
            [first, last] => Ok(Self::new(
                parse_bound(first).ok_or_else(malformed)?,
                parse_bound(last).ok_or_else(malformed)?,
            )),
            _ => Err(malformed()),
        }
    }

    /// Render the file name, appending `.ext` only when `ext` is non-empty.
    pub fn to_filename(&self, ext: &str) -> String {
        let ext = ext.trim_start_matches('.');
        if ext.is_empty() {
            self.to_string()
        } else {
            format!("{}.{}", self, ext)
        }
    }

    /// `(low, high)` regardless of the order the bounds were written in.
    pub fn span(&self) -> (u64, u64) {
        (self.first.min(self.last), self.first.max(self.last))
    }

    /// True when the bounds were written high to low.
    pub fn is_inverted(&self) -> bool {
        self.first > self.last
    }

    /// Number of blocks covered.
    pub fn block_count(&self) -> u64 {
        let (low, high) = self.span();
        (high - low).saturating_add(1)
    }

    pub fn contains(&self, block: u64) -> bool {
        let (low, high) = self.span();
        low <= block && block <= high
    }

    /// True when the two ranges share at least one block.
    pub fn intersects(&self, other: &FileRange) -> bool {
        let (a_low, a_high) = self.span();
        let (b_low, b_high) = other.span();
        a_low <= b_high && b_low <= a_high
    }

    /// True when the whole range lies after `block`.
    pub fn follows(&self, block: u64) -> bool {
        self.span().0 > block
    }

    /// True when the whole range lies before `block`.
    pub fn precedes(&self, block: u64) -> bool {
        self.span().1 < block
    }
}

impl fmt::Display for FileRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:0width$}-{:0width$}",
            self.first,
            self.last,
            width = RANGE_DIGITS
        )
    }
}

impl FromStr for FileRange {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_filename(s)
    }
}

fn parse_bound(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
