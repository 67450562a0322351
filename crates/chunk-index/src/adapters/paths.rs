//! Standard on-disk layout of an unchained index.
//!
//! ```text
//! <index_root>/<chain>/finalized/<range>.bin
//! <index_root>/<chain>/blooms/<range>.bloom
//! <cache_root>/<chain>/tmp/
//! <cache_root>/<chain>/{blocks,txs,traces,...}/
//! ```

use std::path::{Path, PathBuf};

use crate::domain::config::IndexConfig;
use crate::ports::outbound::{PathResolver, BLOOM_EXT, CHUNK_EXT};

pub const FINALIZED_DIR: &str = "finalized";
pub const BLOOMS_DIR: &str = "blooms";
pub const TMP_DIR: &str = "tmp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnchainedPaths {
    index_root: PathBuf,
    cache_root: PathBuf,
}

impl UnchainedPaths {
    pub fn new(index_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            index_root: index_root.into(),
            cache_root: cache_root.into(),
        }
    }

    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(&config.index_root, &config.cache_root)
    }
}

impl PathResolver for UnchainedPaths {
    fn index_dir(&self, chain: &str) -> PathBuf {
        self.index_root.join(chain).join(FINALIZED_DIR)
    }

    fn bloom_dir(&self, chain: &str) -> PathBuf {
        self.index_root.join(chain).join(BLOOMS_DIR)
    }

    fn cache_dir(&self, chain: &str) -> PathBuf {
        self.cache_root.join(chain)
    }

    fn tmp_dir(&self, chain: &str) -> PathBuf {
        self.cache_root.join(chain).join(TMP_DIR)
    }
}

/// Bloom path for a chunk path: `finalized/X.bin` → `blooms/X.bloom`.
pub fn to_bloom_path(chunk_path: &Path) -> PathBuf {
    swap_sibling(chunk_path, BLOOMS_DIR, BLOOM_EXT)
}

/// Chunk path for a bloom path: `blooms/X.bloom` → `finalized/X.bin`.
pub fn to_index_path(bloom_path: &Path) -> PathBuf {
    swap_sibling(bloom_path, FINALIZED_DIR, CHUNK_EXT)
}

fn swap_sibling(path: &Path, dir: &str, ext: &str) -> PathBuf {
    let renamed = path.with_extension(ext);
    match (path.parent().and_then(Path::parent), renamed.file_name()) {
        (Some(root), Some(name)) => root.join(dir).join(name),
        _ => renamed,
    }
}
