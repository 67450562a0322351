//! # Ports Layer
//!
//! - `inbound.rs` - API exposed to callers of the index
//! - `outbound.rs` - directory layout the host provides

pub mod inbound;
pub mod outbound;
