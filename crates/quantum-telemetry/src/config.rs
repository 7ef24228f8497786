//! Telemetry configuration, overridable from the node's config file or
//! environment.

use std::env;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for a terminal.
    Pretty,
    /// One JSON object per line, for log aggregation.
    Json,
}

/// Telemetry configuration for the node process.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Log level filter (trace, debug, info, warn, error), or a full
    /// `tracing_subscriber::EnvFilter` directive string.
    pub log_level: String,
    pub log_format: LogFormat,
    /// Network this node is running (surfaced as a constant log field).
    pub network: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            network: "dev".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Overlay environment variables onto a base configuration.
    ///
    /// - `QC_LOG_LEVEL` or `RUST_LOG`: filter directive.
    /// - `QC_JSON_LOGS`: `1`/`true` switches to JSON output.
    pub fn from_env(mut self) -> Self {
        if let Ok(level) = env::var("QC_LOG_LEVEL").or_else(|_| env::var("RUST_LOG")) {
            self.log_level = level;
        }
        if let Ok(v) = env::var("QC_JSON_LOGS") {
            if v == "1" || v.eq_ignore_ascii_case("true") {
                self.log_format = LogFormat::Json;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_pretty_info() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }
}
