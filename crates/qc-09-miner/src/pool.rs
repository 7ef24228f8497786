//! The worker-thread pool: builds templates from the chain tip and the
//! mempool, hands each worker a disjoint nonce subrange, and serializes
//! submission of a found block back through the chain manager (the chain
//! manager is a single logical writer — see `qc-08-chain`; only one thread
//! ever calls `submit_block`).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use qc_03_store::adapters::kv::KeyValueStore;
use qc_07_mempool::TransactionPool;
use qc_08_chain::ChainManager;
use qc_compute::ComputeEngine;
use shared_types::Address;

use crate::config::MinerConfig;
use crate::errors::MinerError;
use crate::template::{ActiveTemplate, TemplateSlot};
use crate::worker::{self, MinedNonce};

/// Splits `u64`'s nonce space into `n` contiguous, disjoint `(start, len)`
/// subranges so no two workers ever hash the same `(header, nonce)` pair.
pub fn nonce_subranges(n: u32) -> Vec<(u64, u64)> {
    if n == 0 {
        return Vec::new();
    }
    let n = n as u64;
    let chunk = u64::MAX / n;
    (0..n)
        .map(|i| {
            let start = i * chunk;
            let len = if i == n - 1 { u64::MAX - start } else { chunk };
            (start, len)
        })
        .collect()
}

fn build_and_publish<KV: KeyValueStore>(
    chain: &Mutex<ChainManager<KV>>,
    mempool: &Mutex<TransactionPool>,
    slot: &TemplateSlot,
    seq_counter: &AtomicU64,
    coinbase_recipient: Address,
    max_block_bytes: u64,
    now: u64,
) {
    let selected = mempool.lock().expect("mempool mutex poisoned").select_for_block(max_block_bytes);
    let chain_tpl = chain.lock().expect("chain mutex poisoned").build_template(coinbase_recipient, selected);
    let height = chain_tpl.height;
    let seq = seq_counter.fetch_add(1, Ordering::SeqCst) + 1;
    slot.publish(ActiveTemplate::from_chain_template(seq, chain_tpl, now));
    tracing::info!(height, seq, "mining template rotated");
}

/// Owns the worker threads and the single collector thread that submits
/// mined blocks. Dropping this (or calling [`Miner::stop`]) signals every
/// worker to abort within one batch and joins them.
pub struct Miner<KV: KeyValueStore + 'static> {
    chain: Arc<Mutex<ChainManager<KV>>>,
    mempool: Arc<Mutex<TransactionPool>>,
    engine: Arc<dyn ComputeEngine>,
    config: Arc<MinerConfig>,
    coinbase_recipient: Address,
    slot: Arc<TemplateSlot>,
    seq_counter: Arc<AtomicU64>,
    stop: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    collector: Mutex<Option<JoinHandle<()>>>,
}

impl<KV: KeyValueStore + 'static> Miner<KV> {
    pub fn new(
        chain: Arc<Mutex<ChainManager<KV>>>,
        mempool: Arc<Mutex<TransactionPool>>,
        engine: Arc<dyn ComputeEngine>,
        config: MinerConfig,
        coinbase_recipient: Address,
    ) -> Self {
        Self {
            chain,
            mempool,
            engine,
            config: Arc::new(config),
            coinbase_recipient,
            slot: Arc::new(TemplateSlot::new()),
            seq_counter: Arc::new(AtomicU64::new(0)),
            stop: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::new()),
            collector: Mutex::new(None),
        }
    }

    /// Builds a fresh template from the current tip and the best-fee-rate
    /// slice of the mempool, and publishes it so every worker refetches on
    /// its next invalidation check. Call this after every block commit
    /// (ours or a peer's) and whenever the mempool changes materially.
    pub fn refresh_template(&self, now: u64) {
        build_and_publish(
            &self.chain,
            &self.mempool,
            &self.slot,
            &self.seq_counter,
            self.coinbase_recipient,
            self.config.max_block_bytes,
            now,
        );
    }

    /// Spawns `config.worker_threads` mining threads plus one collector
    /// thread that owns the only path back into the chain manager. A
    /// no-op if `worker_threads` is `0` — a node that only validates and
    /// relays never starts a pool.
    pub fn start(&self) {
        if self.config.worker_threads == 0 {
            return;
        }
        let subranges = nonce_subranges(self.config.worker_threads);
        let (tx, rx) = mpsc::channel::<MinedNonce>();

        let mut workers = self.workers.lock().expect("worker list mutex poisoned");
        for (start, len) in subranges {
            let engine = Arc::clone(&self.engine);
            let slot = Arc::clone(&self.slot);
            let stop = Arc::clone(&self.stop);
            let sender = tx.clone();
            let batch_size = self.config.batch_size;
            workers.push(std::thread::spawn(move || loop {
                match worker::mine(&engine, &slot, start, len, batch_size, &stop) {
                    Some(result) => {
                        if sender.send(result).is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }));
        }
        drop(tx);

        let chain = Arc::clone(&self.chain);
        let mempool = Arc::clone(&self.mempool);
        let slot = Arc::clone(&self.slot);
        let seq_counter = Arc::clone(&self.seq_counter);
        let config = Arc::clone(&self.config);
        let coinbase_recipient = self.coinbase_recipient;
        *self.collector.lock().expect("collector mutex poisoned") = Some(std::thread::spawn(move || {
            run_collector(rx, chain, mempool, slot, seq_counter, config, coinbase_recipient)
        }));
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        for handle in self.workers.lock().expect("worker list mutex poisoned").drain(..) {
            let _ = handle.join();
        }
        if let Some(handle) = self.collector.lock().expect("collector mutex poisoned").take() {
            let _ = handle.join();
        }
    }
}

impl<KV: KeyValueStore + 'static> Drop for Miner<KV> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Runs on its own thread: every mined nonce from any worker funnels
/// through here, so `ChainManager::submit_block` is only ever called from
/// one place. A nonce for a stale template (the slot moved on while this
/// one was in flight) is dropped silently rather than rejected loudly —
/// racing workers finding the same template is expected, not an error.
fn run_collector<KV: KeyValueStore + 'static>(
    rx: mpsc::Receiver<MinedNonce>,
    chain: Arc<Mutex<ChainManager<KV>>>,
    mempool: Arc<Mutex<TransactionPool>>,
    slot: Arc<TemplateSlot>,
    seq_counter: Arc<AtomicU64>,
    config: Arc<MinerConfig>,
    coinbase_recipient: Address,
) {
    for result in rx {
        let Some(mut template) = slot.snapshot() else { continue };
        if template.seq != result.seq {
            continue;
        }
        template.header.nonce = result.nonce;
        let hash = template.header.hash();

        let outcome: Result<(), MinerError> = (|| {
            let block = qc_06_block::Block {
                header: template.header.clone(),
                transactions: template.transactions.clone(),
            };
            let now = block.header.timestamp;
            let mut chain_guard = chain.lock().expect("chain mutex poisoned");
            let mut mempool_guard = mempool.lock().expect("mempool mutex poisoned");
            chain_guard.submit_block(block, &mut mempool_guard, now)?;
            Ok(())
        })();

        match outcome {
            Ok(()) => {
                quantum_telemetry::BLOCKS_MINED.inc();
                quantum_telemetry::log_block_event!(info, "mined a block", template.header.height, hash, nonce = result.nonce);
            }
            Err(err) => {
                quantum_telemetry::log_block_event!(warn, "mined block was rejected", template.header.height, hash, err = %err);
            }
        }

        build_and_publish(
            &chain,
            &mempool,
            &slot,
            &seq_counter,
            coinbase_recipient,
            config.max_block_bytes,
            unix_now(),
        );
    }
}


#[cfg(test)]
mod integration_tests {
    use super::*;
    use qc_03_store::{InMemoryKVStore, StoreConfig};
    use qc_06_block::genesis::build_genesis;
    use qc_07_mempool::MempoolConfig;
    use qc_08_chain::ChainConfig;
    use std::time::Duration;

    const EASY_BITS: u32 = 0x20ff_ffff;

    fn addr(byte: u8) -> Address {
        let mut bytes = [0u8; 25];
        bytes[0] = Address::VERSION_DEV;
        bytes[1] = byte;
        Address(bytes)
    }

    fn easy_config() -> ChainConfig {
        let mut cfg = ChainConfig::default();
        cfg.block.difficulty.initial_bits = EASY_BITS;
        cfg.block.difficulty.min_bits = EASY_BITS;
        cfg.block.difficulty.max_bits = EASY_BITS;
        cfg.median_time_window = 1;
        cfg
    }

    #[test]
    fn a_lone_worker_mines_and_submits_a_block_within_a_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = easy_config();
        let genesis = build_genesis(&cfg.block.difficulty, 1_700_000_000, &[]);
        let chain = ChainManager::<InMemoryKVStore>::open_in_memory(dir.path(), cfg, StoreConfig::default(), genesis)
            .expect("chain manager should open cleanly against a fresh temp dir");
        let chain = Arc::new(Mutex::new(chain));
        let mempool = Arc::new(Mutex::new(TransactionPool::new(MempoolConfig::default())));

        let miner_config = MinerConfig { worker_threads: 1, batch_size: 50_000, max_block_bytes: 1024 * 1024 };
        let miner = Miner::new(Arc::clone(&chain), mempool, qc_compute::cpu_engine(), miner_config, addr(7));
        miner.refresh_template(1_700_000_100);
        miner.start();

        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        loop {
            if chain.lock().expect("chain mutex poisoned").tip().height >= 1 {
                break;
            }
            assert!(std::time::Instant::now() < deadline, "miner did not submit a block before the deadline");
            std::thread::sleep(Duration::from_millis(20));
        }
        miner.stop();
    }
}
