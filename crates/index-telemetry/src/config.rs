//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for the tracing subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error, or a full directive)
    pub log_level: String,

    /// Whether to write to stdout at all
    pub console_output: bool,

    /// JSON lines instead of the human-readable format
    pub json_logs: bool,

    /// Chain the host is indexing
    pub chain: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "chunk-index".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            chain: "mainnet".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `UNCHAINED_SERVICE_NAME`: Service name (default: chunk-index)
    /// - `UNCHAINED_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `UNCHAINED_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `UNCHAINED_JSON_LOGS`: Enable JSON logs (default: false, true in containers)
    /// - `UNCHAINED_CHAIN`: Chain name (default: mainnet)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("UNCHAINED_SERVICE_NAME")
                .unwrap_or_else(|_| "chunk-index".to_string()),

            log_level: env::var("UNCHAINED_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("UNCHAINED_CONSOLE_OUTPUT")
                .map(|v| parse_flag(&v).unwrap_or(true))
                .unwrap_or(true),

            json_logs: env::var("UNCHAINED_JSON_LOGS")
                .map(|v| parse_flag(&v).unwrap_or(false))
                .unwrap_or(is_container),

            chain: env::var("UNCHAINED_CHAIN").unwrap_or_else(|_| "mainnet".to_string()),
        }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Service name qualified by chain, e.g. `chunk-index-sepolia`.
    pub fn full_service_name(&self) -> String {
        if self.chain == "mainnet" {
            self.service_name.clone()
        } else {
            format!("{}-{}", self.service_name, self.chain)
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
