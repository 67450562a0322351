//! # Shared Types Crate
//!
//! Primitives shared by the bloom and chunk crates: addresses, version tags
//! and appearances.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every crate that reads or writes index files
//!   uses these types, so byte order and sort order are decided once.
//! - **Fixed Width**: every type here has a fixed on-disk width.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
