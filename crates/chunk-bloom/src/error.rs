//! Error types for the chunk bloom crate

use std::io;
use thiserror::Error;

/// Errors reading, writing or decoding a bloom file.
#[derive(Debug, Error)]
pub enum BloomError {
    #[error("Bad bloom magic: expected {expected:#06x}, got {found:#06x}")]
    BadMagic { expected: u16, found: u16 },

    #[error("Bloom file truncated inside array {array}")]
    Truncated { array: u32 },

    #[error("Bloom file has bytes after its {arrays} arrays")]
    TrailingBytes { arrays: u32 },

    #[error("Bloom array has wrong width: expected {expected} bytes, got {actual}")]
    BadWidth { expected: usize, actual: usize },

    #[error("Bloom I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BloomError {
    /// Map an early EOF inside array `array` to `Truncated`.
    pub(crate) fn from_short_read(err: io::Error, array: u32) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            BloomError::Truncated { array }
        } else {
            BloomError::Io(err)
        }
    }
}
