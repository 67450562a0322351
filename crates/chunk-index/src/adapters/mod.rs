//! # Adapters Layer
//!
//! - `fs`: chunk and bloom files on a local filesystem
//! - `lock`: process-level lock on an index directory
//! - `paths`: the standard unchained directory layout

pub mod fs;
pub mod lock;
pub mod paths;

pub use lock::{IndexLock, LockError, DEFAULT_LOCK_TIMEOUT};
pub use paths::{to_bloom_path, to_index_path, UnchainedPaths};
