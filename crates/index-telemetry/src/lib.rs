//! # Index Telemetry
//!
//! Installs the `tracing` subscriber that renders the chunk index's
//! structured events.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use index_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let _guard = init_telemetry(TelemetryConfig::from_env())?;
//!     // chunk writes, tags and recoveries now log through the subscriber
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `UNCHAINED_LOG_LEVEL` | `info` | Log level filter |
//! | `UNCHAINED_JSON_LOGS` | `false` | JSON lines output |
//! | `UNCHAINED_CONSOLE_OUTPUT` | `true` | Write to stdout |
//! | `UNCHAINED_CHAIN` | `mainnet` | Chain in the service name |

mod config;
mod subscriber;

pub use config::TelemetryConfig;
pub use subscriber::build_filter;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Install the subscriber for the process.
///
/// Returns a guard that logs shutdown when dropped. Fails if another
/// subscriber is already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    subscriber::init_subscriber(&config)?;

    tracing::info!(
        service = %config.full_service_name(),
        level = %config.log_level,
        json = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        service: config.full_service_name(),
    })
}

/// Guard that keeps telemetry active for the host's lifetime.
#[derive(Debug)]
pub struct TelemetryGuard {
    service: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service, "Shutting down telemetry...");
    }
}

/// Span carrying a chunk's range, for wrapping host-side work on it.
///
/// ```rust,ignore
/// let _span = range_span!("consolidate", first = 0u64, last = 2_000_000u64).entered();
/// ```
#[macro_export]
macro_rules! range_span {
    ($name:expr, first = $first:expr, last = $last:expr $(, $($field:tt)*)?) => {
        tracing::info_span!($name, first = $first, last = $last $(, $($field)*)?)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_fails() {
        let config = TelemetryConfig::default().with_log_level("warn");
        let first = init_telemetry(config.clone());
        assert!(first.is_ok());
        assert!(matches!(
            init_telemetry(config),
            Err(TelemetryError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_range_span() {
        let span = range_span!("write", first = 0u64, last = 99u64);
        let _entered = span.enter();
    }
}
