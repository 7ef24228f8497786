//! CPU compute backend using Rayon.
//!
//! The only backend. Hashing is SHA3-256, the same sponge primitive used
//! for content hashing elsewhere in the node, so mining and verification
//! share one hash implementation.

use crate::{Backend, ComputeEngine, DeviceInfo};
use primitive_types::U256;
use rayon::prelude::*;
use sha3::{Digest, Sha3_256};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

pub struct CpuEngine {
    device_info: DeviceInfo,
}

impl CpuEngine {
    pub fn new() -> Self {
        let threads = num_cpus::get() as u32;
        Self {
            device_info: DeviceInfo {
                name: format!("CPU ({threads} threads)"),
                backend: Backend::Cpu,
                worker_threads: threads,
            },
        }
    }
}

impl Default for CpuEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeEngine for CpuEngine {
    fn backend(&self) -> Backend {
        Backend::Cpu
    }

    fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    fn batch_hash(&self, inputs: &[Vec<u8>]) -> Vec<[u8; 32]> {
        inputs
            .par_iter()
            .map(|input| {
                let mut hasher = Sha3_256::new();
                hasher.update(input);
                let digest = hasher.finalize();
                let mut out = [0u8; 32];
                out.copy_from_slice(&digest);
                out
            })
            .collect()
    }

    fn pow_search(
        &self,
        header_template: &[u8],
        target: U256,
        nonce_start: u64,
        nonce_count: u64,
    ) -> Option<(u64, [u8; 32])> {
        if nonce_count == 0 {
            return None;
        }

        let found = AtomicBool::new(false);
        let result_nonce = AtomicU64::new(0);
        let result_hash: Mutex<[u8; 32]> = Mutex::new([0u8; 32]);

        let num_workers = (self.device_info.worker_threads as u64).max(1);
        let chunk_size = (nonce_count / num_workers).max(1);

        (0..num_workers).into_par_iter().for_each(|worker| {
            let start = nonce_start + worker * chunk_size;
            let end = if worker == num_workers - 1 {
                nonce_start + nonce_count
            } else {
                (start + chunk_size).min(nonce_start + nonce_count)
            };

            for nonce in start..end {
                if nonce % 4096 == 0 && found.load(Ordering::Relaxed) {
                    return;
                }

                let mut header = header_template.to_vec();
                header.extend_from_slice(&nonce.to_be_bytes());

                let mut hasher = Sha3_256::new();
                hasher.update(&header);
                let digest = hasher.finalize();
                let mut hash = [0u8; 32];
                hash.copy_from_slice(&digest);

                if U256::from_big_endian(&hash) <= target {
                    found.store(true, Ordering::SeqCst);
                    result_nonce.store(nonce, Ordering::SeqCst);
                    *result_hash.lock().unwrap() = hash;
                    return;
                }
            }
        });

        if found.load(Ordering::SeqCst) {
            let nonce = result_nonce.load(Ordering::SeqCst);
            let hash = *result_hash.lock().unwrap();
            Some((nonce, hash))
        } else {
            None
        }
    }
}
