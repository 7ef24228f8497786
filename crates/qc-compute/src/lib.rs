//! CPU-parallel compute primitives shared by the chain manager and the
//! miner: batch content hashing (merkle trees, signature preimages) and the
//! proof-of-work nonce search. Both are embarrassingly parallel and fan out
//! across cores via Rayon.
//!
//! Post-quantum signature verification itself is not implemented here; it
//! lives in `qc-01-crypto`. `tasks::signatures::batch_verify` only supplies
//! the thread-pool fan-out, parameterized over whatever verify routine the
//! caller passes in.

pub mod backends;
pub mod domain;
pub mod tasks;

use primitive_types::U256;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Cpu,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Cpu => write!(f, "CPU (Rayon)"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("compute task failed: {0}")]
    TaskFailed(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub backend: Backend,
    pub worker_threads: u32,
}

/// A compute backend. Only one implementation exists (`backends::cpu`) but
/// keeping the trait seam makes the mining loop and merkle builder testable
/// against a fake engine without spinning up real worker threads.
pub trait ComputeEngine: Send + Sync {
    fn backend(&self) -> Backend;
    fn device_info(&self) -> &DeviceInfo;

    /// Hash each input independently, fanned out across the thread pool.
    fn batch_hash(&self, inputs: &[Vec<u8>]) -> Vec<[u8; 32]>;

    /// Search `nonce_start..nonce_start + nonce_count` for a nonce whose
    /// header hash is `<= target`, split across worker threads. Returns the
    /// first nonce found; does not guarantee the lowest.
    fn pow_search(
        &self,
        header_template: &[u8],
        target: U256,
        nonce_start: u64,
        nonce_count: u64,
    ) -> Option<(u64, [u8; 32])>;
}

/// Construct the CPU compute engine.
pub fn cpu_engine() -> Arc<dyn ComputeEngine> {
    Arc::new(backends::cpu::CpuEngine::new())
}

/// Generic parallel fan-out over a slice. Used for batch signature
/// verification, where the per-item routine is supplied by the caller.
pub fn parallel_map<T, F, R>(items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    use rayon::prelude::*;
    items.par_iter().map(|item| f(item)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_engine_reports_cpu_backend() {
        let engine = cpu_engine();
        assert_eq!(engine.backend(), Backend::Cpu);
        assert!(engine.device_info().worker_threads >= 1);
    }

    #[test]
    fn parallel_map_preserves_order() {
        let items = vec![1, 2, 3, 4, 5];
        let doubled = parallel_map(&items, |x| x * 2);
        assert_eq!(doubled, vec![2, 4, 6, 8, 10]);
    }
}
