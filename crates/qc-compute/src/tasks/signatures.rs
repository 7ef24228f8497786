//! Parallel signature-verification fan-out.
//!
//! The post-quantum verify routine lives in `qc-01-crypto`; this just
//! supplies the thread-pool batching so a block with hundreds of
//! transactions doesn't verify signatures one at a time.

use crate::parallel_map;

#[derive(Debug, Clone)]
pub struct BatchVerifyResult {
    pub results: Vec<bool>,
    pub valid_count: usize,
    pub invalid_count: usize,
}

/// Verify every item in parallel with the caller-supplied routine.
pub fn batch_verify<T, F>(items: &[T], verify_one: F) -> BatchVerifyResult
where
    T: Sync,
    F: Fn(&T) -> bool + Sync,
{
    let results = parallel_map(items, |item| verify_one(item));
    let valid_count = results.iter().filter(|&&v| v).count();
    let invalid_count = results.len() - valid_count;
    BatchVerifyResult {
        results,
        valid_count,
        invalid_count,
    }
}
