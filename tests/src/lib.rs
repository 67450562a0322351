//! # Chunk Index Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Seeded working sets and scratch indexes
//! └── integration/
//!     ├── flows.rs      # write → query → tag → decache
//!     └── crash_safety.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p index-tests
//!
//! # By category
//! cargo test -p index-tests integration::flows
//! cargo test -p index-tests integration::crash_safety
//!
//! # Benchmarks
//! cargo bench -p index-tests
//! ```

pub mod fixtures;
pub mod integration;
