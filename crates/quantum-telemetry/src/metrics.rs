//! Prometheus metrics for the node.
//!
//! Naming convention: `qc_<component>_<metric>_<unit>`.

use lazy_static::lazy_static;
use prometheus::{exponential_buckets, Counter, Encoder, Gauge, Histogram, Registry, TextEncoder};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics registration failed: {0}")]
    Registration(String),
    #[error("metrics encoding failed: {0}")]
    Encoding(String),
}

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // -- chain --
    pub static ref BLOCKS_ACCEPTED: Counter = Counter::new(
        "qc_chain_blocks_accepted_total", "Total blocks appended to the main chain"
    ).expect("metric creation failed");
    pub static ref BLOCKS_REJECTED: Counter = Counter::new(
        "qc_chain_blocks_rejected_total", "Total blocks rejected during validation"
    ).expect("metric creation failed");
    pub static ref REORGS: Counter = Counter::new(
        "qc_chain_reorgs_total", "Total completed reorgs"
    ).expect("metric creation failed");
    pub static ref CHAIN_HEIGHT: Gauge = Gauge::new(
        "qc_chain_height", "Current chain tip height"
    ).expect("metric creation failed");
    pub static ref CUMULATIVE_DIFFICULTY: Gauge = Gauge::new(
        "qc_chain_cumulative_difficulty", "Cumulative difficulty of the main chain tip"
    ).expect("metric creation failed");
    pub static ref BLOCK_VALIDATION_SECONDS: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "qc_chain_block_validation_seconds", "Time spent validating a block"
        ).buckets(exponential_buckets(0.0001, 2.0, 15).unwrap())
    ).expect("metric creation failed");

    // -- mempool --
    pub static ref MEMPOOL_SIZE: Gauge = Gauge::new(
        "qc_mempool_size", "Transactions currently admitted to the mempool"
    ).expect("metric creation failed");
    pub static ref MEMPOOL_BYTES: Gauge = Gauge::new(
        "qc_mempool_bytes", "Total byte size of the mempool"
    ).expect("metric creation failed");
    pub static ref MEMPOOL_EVICTIONS: Counter = Counter::new(
        "qc_mempool_evictions_total", "Transactions evicted for low fee rate"
    ).expect("metric creation failed");

    // -- p2p --
    pub static ref PEERS_CONNECTED: Gauge = Gauge::new(
        "qc_p2p_peers_connected", "Currently connected peers"
    ).expect("metric creation failed");
    pub static ref PEERS_BANNED: Counter = Counter::new(
        "qc_p2p_peers_banned_total", "Total peers banned"
    ).expect("metric creation failed");

    // -- miner --
    pub static ref BLOCKS_MINED: Counter = Counter::new(
        "qc_miner_blocks_mined_total", "Total blocks found by this node's miner"
    ).expect("metric creation failed");
    pub static ref HASHES_COMPUTED: Counter = Counter::new(
        "qc_miner_hashes_total", "Total PoW hash attempts across all workers"
    ).expect("metric creation failed");

    // -- signature verification --
    pub static ref SIGNATURE_VERIFICATIONS: Counter = Counter::new(
        "qc_crypto_signature_verifications_total", "Total signature verifications performed"
    ).expect("metric creation failed");
    pub static ref SIGNATURE_FAILURES: Counter = Counter::new(
        "qc_crypto_signature_failures_total", "Total signature verifications that failed"
    ).expect("metric creation failed");
}

/// Handle kept alive for the lifetime of the process; metrics are globally
/// registered and this only needs to be held so the registry isn't dropped.
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Registers every metric with the global registry. Call once at startup.
pub fn register_metrics() -> Result<MetricsHandle, MetricsError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(BLOCKS_ACCEPTED.clone()),
        Box::new(BLOCKS_REJECTED.clone()),
        Box::new(REORGS.clone()),
        Box::new(CHAIN_HEIGHT.clone()),
        Box::new(CUMULATIVE_DIFFICULTY.clone()),
        Box::new(BLOCK_VALIDATION_SECONDS.clone()),
        Box::new(MEMPOOL_SIZE.clone()),
        Box::new(MEMPOOL_BYTES.clone()),
        Box::new(MEMPOOL_EVICTIONS.clone()),
        Box::new(PEERS_CONNECTED.clone()),
        Box::new(PEERS_BANNED.clone()),
        Box::new(BLOCKS_MINED.clone()),
        Box::new(HASHES_COMPUTED.clone()),
        Box::new(SIGNATURE_VERIFICATIONS.clone()),
        Box::new(SIGNATURE_FAILURES.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| MetricsError::Registration(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encodes every registered metric as Prometheus text format, for the
/// admin/introspection surface to expose.
pub fn encode_metrics() -> Result<String, MetricsError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| MetricsError::Encoding(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
}

/// Timer guard that observes elapsed seconds into a histogram on drop.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
