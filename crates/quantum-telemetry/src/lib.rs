//! Structured logging (`tracing`) and Prometheus metrics for the node.
//!
//! Logging *configuration* (what to log, to where) is read from
//! [`TelemetryConfig`]; this crate only wires the mechanism up.

mod config;
mod logging;
mod metrics;

pub use config::{LogFormat, TelemetryConfig};
pub use logging::{init_tracing, TelemetryError};
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsError, MetricsHandle,
    BLOCKS_ACCEPTED, BLOCKS_MINED, BLOCKS_REJECTED, BLOCK_VALIDATION_SECONDS, CHAIN_HEIGHT,
    CUMULATIVE_DIFFICULTY, HASHES_COMPUTED, MEMPOOL_BYTES, MEMPOOL_EVICTIONS, MEMPOOL_SIZE,
    PEERS_BANNED, PEERS_CONNECTED, REORGS, SIGNATURE_FAILURES, SIGNATURE_VERIFICATIONS,
};
