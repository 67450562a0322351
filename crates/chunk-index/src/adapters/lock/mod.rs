//! # Index Process Locking
//!
//! Keeps a second process from writing the same chain's index. Threads
//! inside one process are serialised per range by the service instead.

mod index_lock;
#[cfg(test)]
mod tests;

pub use index_lock::{IndexLock, LockError, DEFAULT_LOCK_TIMEOUT, LOCK_FILE};
