//! # Integration Tests
//!
//! Whole-index flows through `ChunkIndexApi`, against real directories.

pub mod crash_safety;
pub mod flows;
