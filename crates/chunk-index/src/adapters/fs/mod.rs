//! # Filesystem Adapters
//!
//! - `backup`: backup copies and "created" markers in the tmp directory
//! - `durable`: backup → write → sync → clear, with restore on failure
//! - `reader`: header, table and bloom reads
//! - `listing`: directory listings

pub mod backup;
pub mod durable;
pub mod listing;
pub mod reader;

pub use backup::{
    backup_path_for, commit_marker_for, created_marker_for, move_file, restore_from, BackupFile,
};
pub use durable::{durable_replace, patch_synced, write_synced};
pub use listing::{list_files, list_ranges, walk_files};
pub use reader::{
    audit_chunk, audit_chunk_at, query_address, read_bloom, read_bloom_header, read_chunk_header,
    read_header, validate, ChunkReader, QueryOutcome,
};
