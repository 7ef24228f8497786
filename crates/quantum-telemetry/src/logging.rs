//! Tracing-subscriber wiring and structured-field logging macros.
//!
//! Every consensus-relevant event is logged with structured fields
//! (`height`, `hash`, `reason`) rather than interpolated strings, so a log
//! aggregator can filter and alert on them without parsing free text.

use crate::config::{LogFormat, TelemetryConfig};
use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter directive: {0}")]
    BadFilter(String),
}

/// Initializes the global `tracing` subscriber for the process. Must be
/// called exactly once, as early as possible in `main`.
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::BadFilter(e.to_string()))?;

    let builder = fmt().with_env_filter(filter).with_target(true);

    let _ = match config.log_format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    Ok(())
}

/// Log a block-related event with standard fields. `$hash` is logged with
/// `Debug` rather than `Display`: `shared_types::Hash` is a bare `[u8;
/// 32]` with no `Display` impl of its own.
#[macro_export]
macro_rules! log_block_event {
    ($level:ident, $msg:expr, $height:expr, $hash:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            height = $height,
            hash = ?$hash,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a transaction-related event with standard fields.
#[macro_export]
macro_rules! log_tx_event {
    ($level:ident, $msg:expr, $tx_hash:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            tx_hash = ?$tx_hash,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a peer-related event with standard fields.
#[macro_export]
macro_rules! log_peer_event {
    ($level:ident, $msg:expr, $peer_addr:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            peer_addr = %$peer_addr,
            $($($field)*,)?
            $msg
        )
    };
}
