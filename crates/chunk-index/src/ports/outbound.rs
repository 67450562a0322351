//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the chunk index needs from its host.

use std::path::PathBuf;

use crate::domain::range::FileRange;

/// Extension of chunk files.
pub const CHUNK_EXT: &str = "bin";

/// Extension of bloom files.
pub const BLOOM_EXT: &str = "bloom";

/// Resolves a chain to its on-disk directories.
///
/// Production: `UnchainedPaths` (adapters/paths.rs)
pub trait PathResolver: Send + Sync {
    /// Directory holding `<range>.bin` chunk files.
    fn index_dir(&self, chain: &str) -> PathBuf;

    /// Directory holding `<range>.bloom` files.
    fn bloom_dir(&self, chain: &str) -> PathBuf;

    /// Root of the chain's derived caches (blocks, txs, traces, ...).
    fn cache_dir(&self, chain: &str) -> PathBuf;

    /// Scratch directory for backups and the quarantine marker.
    ///
    /// Must be on the same filesystem as the index for restores to be a
    /// rename.
    fn tmp_dir(&self, chain: &str) -> PathBuf;

    fn chunk_path(&self, chain: &str, range: &FileRange) -> PathBuf {
        self.index_dir(chain).join(range.to_filename(CHUNK_EXT))
    }

    fn bloom_path(&self, chain: &str, range: &FileRange) -> PathBuf {
        self.bloom_dir(chain).join(range.to_filename(BLOOM_EXT))
    }
}
