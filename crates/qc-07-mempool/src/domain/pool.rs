//! The transaction pool: `tx_hash -> Transaction` plus a signer-address and
//! a fee-rate index, the admission pipeline, byte-budget eviction, and
//! block-commit/reorg re-evaluation.

use std::collections::{BTreeSet, HashMap, HashSet};

use qc_04_state::StateStore;
use qc_05_tx::{basic_validate, MultiSigRegistry, Transaction, TxConfig, TxContext, TxPayload};
use shared_types::{Address, CoreError, Hash};

use super::entities::{GossipItemType, GossipRecord, MempoolEntry, Timestamp};
use super::errors::MempoolError;
use super::value_objects::FeeRateKey;
use crate::config::MempoolConfig;

/// A height reserved for mempool dry runs. No real block will ever reach
/// it, so [`StateStore::apply_block`]/[`MultiSigRegistry::apply_block`]
/// write-sets tagged with it are unambiguously this probe's own and safe
/// to revert in a loop without disturbing real chain write-sets.
const PROBE_HEIGHT: u64 = u64::MAX;

/// Applies a transaction's state effects and then immediately reverts
/// them — the "copy-on-write overlay" the admission pipeline validates
/// against without ever mutating real state. Returns the same error a
/// real block application would.
fn dry_run_validate(
    tx: &Transaction,
    state: &mut StateStore,
    multisig: &mut MultiSigRegistry,
    ctx: TxContext,
) -> Result<(), CoreError> {
    let result = state.apply_block(PROBE_HEIGHT, |txn| {
        qc_05_tx::state_validate_and_apply(tx, txn, multisig, ctx)
    });
    if result.is_ok() {
        while multisig.revert_block(PROBE_HEIGHT).is_some() {}
        state
            .revert_block(PROBE_HEIGHT)
            .expect("probe write-set was just pushed at PROBE_HEIGHT");
    }
    result
}

/// Pending transaction pool: admission, fee-rate eviction, and the
/// block-commit/reorg hooks that keep it consistent with the chain tip.
pub struct TransactionPool {
    config: MempoolConfig,
    by_hash: HashMap<Hash, MempoolEntry>,
    by_fee_rate: BTreeSet<FeeRateKey>,
    by_sender: HashMap<Address, HashSet<u64>>,
    total_bytes: u64,
}

impl TransactionPool {
    pub fn new(config: MempoolConfig) -> Self {
        Self {
            config,
            by_hash: HashMap::new(),
            by_fee_rate: BTreeSet::new(),
            by_sender: HashMap::new(),
            total_bytes: 0,
        }
    }

    pub fn config(&self) -> &MempoolConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn get(&self, hash: &Hash) -> Option<&Transaction> {
        self.by_hash.get(hash).map(|entry| &entry.tx)
    }

    /// Greedily selects entries highest-fee-rate first until `max_bytes`
    /// would be exceeded. Used by the miner to fill a block template; does
    /// not remove anything from the pool — `on_block_committed` is what
    /// drops transactions once they actually land in a block.
    pub fn select_for_block(&self, max_bytes: u64) -> Vec<Transaction> {
        let mut selected = Vec::new();
        let mut used = 0u64;
        for key in self.by_fee_rate.iter().rev() {
            let entry = self.by_hash.get(&key.hash).expect("fee-rate index is kept in sync with by_hash");
            if used + entry.size_bytes > max_bytes {
                continue;
            }
            used += entry.size_bytes;
            selected.push(entry.tx.clone());
        }
        selected
    }

    /// Runs the admission pipeline: basic validate, state-validate against
    /// a copy-on-write overlay of the current tip, then make room for the
    /// new entry by evicting lower fee-rate entries if the pool is over
    /// its byte budget. Returns the gossip record to announce on success.
    pub fn submit(
        &mut self,
        tx: Transaction,
        tx_cfg: &TxConfig,
        state: &mut StateStore,
        multisig: &mut MultiSigRegistry,
        ctx: TxContext,
        now: Timestamp,
    ) -> Result<GossipRecord, MempoolError> {
        if matches!(tx.payload, TxPayload::Coinbase { .. }) {
            return Err(MempoolError::Invalid(CoreError::Malformed(
                "coinbase transactions are never admitted to the mempool".to_string(),
            )));
        }
        basic_validate(&tx, tx_cfg)?;

        let entry = MempoolEntry::new(tx, now);
        if self.by_hash.contains_key(&entry.hash) {
            return Err(MempoolError::AlreadyPresent);
        }
        if entry.fee_per_byte < self.config.min_fee_per_byte {
            return Err(MempoolError::FeeTooLow {
                fee_per_byte: entry.fee_per_byte,
                minimum: self.config.min_fee_per_byte,
            });
        }

        dry_run_validate(&entry.tx, state, multisig, ctx)?;

        let item_type = GossipItemType::of(&entry.tx.payload)
            .expect("coinbase already rejected above");
        let key = FeeRateKey {
            fee_per_byte: entry.fee_per_byte,
            added_at: entry.added_at,
            hash: entry.hash,
        };
        self.make_room_for(key, entry.size_bytes)?;

        self.by_sender
            .entry(entry.sender())
            .or_default()
            .insert(entry.tx.nonce);
        self.total_bytes += entry.size_bytes;
        self.by_fee_rate.insert(key);
        let hash = entry.hash;
        self.by_hash.insert(hash, entry);

        quantum_telemetry::MEMPOOL_SIZE.set(self.by_hash.len() as f64);
        quantum_telemetry::MEMPOOL_BYTES.set(self.total_bytes as f64);
        quantum_telemetry::log_tx_event!(debug, "transaction admitted to mempool", hash, fee_per_byte = key.fee_per_byte);

        Ok(GossipRecord {
            tx_hash: hash,
            item_type,
        })
    }

    /// Evicts the lowest fee-rate entries until `incoming_bytes` more fits
    /// under the byte budget. Refuses (without evicting anything) once the
    /// cheapest remaining entry already ranks at or below the incoming
    /// transaction — evicting it would just be swapping in an
    /// equally-or-less valuable entry.
    fn make_room_for(&mut self, incoming: FeeRateKey, incoming_bytes: u64) -> Result<(), MempoolError> {
        while self.total_bytes + incoming_bytes > self.config.mempool_max_bytes {
            let Some(cheapest) = self.by_fee_rate.iter().next().copied() else {
                return Err(MempoolError::PoolFull {
                    max_bytes: self.config.mempool_max_bytes,
                });
            };
            if cheapest >= incoming {
                return Err(MempoolError::PoolFull {
                    max_bytes: self.config.mempool_max_bytes,
                });
            }
            let evicted_hash = cheapest.hash;
            self.remove(&evicted_hash);
            quantum_telemetry::MEMPOOL_EVICTIONS.inc();
            quantum_telemetry::log_tx_event!(debug, "evicted from mempool to make room for a higher fee-rate transaction", evicted_hash);
        }
        Ok(())
    }

    pub fn remove(&mut self, hash: &Hash) -> Option<MempoolEntry> {
        let entry = self.by_hash.remove(hash)?;
        self.total_bytes -= entry.size_bytes;
        self.by_fee_rate.remove(&FeeRateKey {
            fee_per_byte: entry.fee_per_byte,
            added_at: entry.added_at,
            hash: entry.hash,
        });
        if let Some(nonces) = self.by_sender.get_mut(&entry.sender()) {
            nonces.remove(&entry.tx.nonce);
            if nonces.is_empty() {
                self.by_sender.remove(&entry.sender());
            }
        }
        quantum_telemetry::MEMPOOL_SIZE.set(self.by_hash.len() as f64);
        quantum_telemetry::MEMPOOL_BYTES.set(self.total_bytes as f64);
        Some(entry)
    }

    /// Drops transactions a just-committed block included, then
    /// re-evaluates everything else against the new tip: a transaction
    /// whose sender now has a used key or a skipped nonce no longer
    /// validates and is dropped rather than left to fail silently later.
    pub fn on_block_committed(
        &mut self,
        included: &[Hash],
        state: &mut StateStore,
        multisig: &mut MultiSigRegistry,
        ctx: TxContext,
    ) {
        for hash in included {
            self.remove(hash);
        }
        self.re_evaluate(state, multisig, ctx);
    }

    /// Re-validates every remaining entry against the (possibly new, post
    /// reorg) tip, dropping anything that no longer validates.
    pub fn re_evaluate(&mut self, state: &mut StateStore, multisig: &mut MultiSigRegistry, ctx: TxContext) {
        let stale: Vec<Hash> = self
            .by_hash
            .values()
            .filter(|entry| dry_run_validate(&entry.tx, state, multisig, ctx).is_err())
            .map(|entry| entry.hash)
            .collect();
        for hash in stale {
            self.remove(&hash);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_01_crypto::KeyPair;
    use shared_types::PublicKeyBytes;

    fn addr(byte: u8) -> Address {
        let mut bytes = [0u8; 25];
        bytes[0] = Address::VERSION_DEV;
        bytes[1] = byte;
        Address(bytes)
    }

    fn ctx() -> TxContext {
        TxContext { block_height: 1 }
    }

    fn funded_sender(store: &mut StateStore, balance: u64) -> (KeyPair, Address) {
        let keypair = KeyPair::generate();
        let address = qc_01_crypto::address_of(&keypair.public_key_bytes(), Address::VERSION_DEV);
        store
            .apply_block(0, |txn| {
                txn.credit(address, balance);
                Ok(())
            })
            .unwrap();
        (keypair, address)
    }

    fn transfer(keypair: &KeyPair, sender: Address, nonce: u64, fee: u64, amount: u64) -> Transaction {
        let mut tx = Transaction {
            master_address: sender,
            public_key: keypair.public_key_bytes(),
            signature: shared_types::SignatureBytes(Vec::new()),
            nonce,
            fee,
            payload: TxPayload::Transfer {
                outputs: vec![(addr(200), amount)],
                message: None,
            },
        };
        tx.signature = keypair.sign(&tx.canonical_bytes());
        tx
    }

    #[test]
    fn valid_transaction_is_admitted_and_does_not_mutate_real_state() {
        let mut store = StateStore::new();
        let mut multisig = MultiSigRegistry::new();
        let (keypair, sender) = funded_sender(&mut store, 1_000);
        let mut pool = TransactionPool::new(MempoolConfig::default());

        let tx = transfer(&keypair, sender, 0, 10, 50);
        let hash = tx.hash();
        let gossip = pool
            .submit(tx, &TxConfig::default(), &mut store, &mut multisig, ctx(), 100)
            .unwrap();
        assert_eq!(gossip.tx_hash, hash);
        assert_eq!(gossip.item_type, GossipItemType::Transfer);
        assert_eq!(pool.len(), 1);
        // Dry-run validation must not have touched real state.
        assert_eq!(store.get_account(&sender).balance, 1_000);
        assert_eq!(store.get_account(&sender).nonce, 0);
    }

    #[test]
    fn duplicate_submission_is_rejected() {
        let mut store = StateStore::new();
        let mut multisig = MultiSigRegistry::new();
        let (keypair, sender) = funded_sender(&mut store, 1_000);
        let mut pool = TransactionPool::new(MempoolConfig::default());

        let tx = transfer(&keypair, sender, 0, 10, 50);
        pool.submit(tx.clone(), &TxConfig::default(), &mut store, &mut multisig, ctx(), 100)
            .unwrap();
        let result = pool.submit(tx, &TxConfig::default(), &mut store, &mut multisig, ctx(), 101);
        assert!(matches!(result, Err(MempoolError::AlreadyPresent)));
    }

    #[test]
    fn coinbase_is_never_admitted() {
        let mut store = StateStore::new();
        let mut multisig = MultiSigRegistry::new();
        let mut pool = TransactionPool::new(MempoolConfig::default());
        let tx = Transaction {
            master_address: addr(1),
            public_key: PublicKeyBytes(Vec::new()),
            signature: shared_types::SignatureBytes(Vec::new()),
            nonce: 0,
            fee: 0,
            payload: TxPayload::Coinbase {
                recipient: addr(1),
                amount: 100,
            },
        };
        let result = pool.submit(tx, &TxConfig::default(), &mut store, &mut multisig, ctx(), 0);
        assert!(matches!(result, Err(MempoolError::Invalid(CoreError::Malformed(_)))));
    }

    #[test]
    fn overflow_evicts_lowest_fee_rate_entries_to_fit_a_richer_one() {
        let mut store = StateStore::new();
        let mut multisig = MultiSigRegistry::new();
        let mut pool = TransactionPool::new(MempoolConfig {
            mempool_max_bytes: 0,
            min_fee_per_byte: 0,
        });

        let (cheap_keypair, cheap_sender) = funded_sender(&mut store, 1_000);
        let cheap_tx = transfer(&cheap_keypair, cheap_sender, 0, 1, 10);
        let cheap_size = cheap_tx.canonical_bytes().len() as u64;
        pool.config.mempool_max_bytes = cheap_size;
        let cheap_hash = cheap_tx.hash();
        pool.submit(cheap_tx, &TxConfig::default(), &mut store, &mut multisig, ctx(), 100)
            .unwrap();
        assert!(pool.contains(&cheap_hash));

        let (rich_keypair, rich_sender) = funded_sender(&mut store, 1_000);
        let rich_tx = transfer(&rich_keypair, rich_sender, 0, 100, 10);
        let rich_hash = rich_tx.hash();
        pool.submit(rich_tx, &TxConfig::default(), &mut store, &mut multisig, ctx(), 101)
            .unwrap();

        assert!(!pool.contains(&cheap_hash), "cheap entry should have been evicted");
        assert!(pool.contains(&rich_hash));
    }

    #[test]
    fn overflow_refuses_a_newcomer_that_is_itself_the_cheapest() {
        let mut store = StateStore::new();
        let mut multisig = MultiSigRegistry::new();

        let (rich_keypair, rich_sender) = funded_sender(&mut store, 1_000);
        let rich_tx = transfer(&rich_keypair, rich_sender, 0, 100, 10);
        let rich_size = rich_tx.canonical_bytes().len() as u64;

        let mut pool = TransactionPool::new(MempoolConfig {
            mempool_max_bytes: rich_size,
            min_fee_per_byte: 0,
        });
        pool.submit(rich_tx, &TxConfig::default(), &mut store, &mut multisig, ctx(), 100)
            .unwrap();

        let (cheap_keypair, cheap_sender) = funded_sender(&mut store, 1_000);
        let cheap_tx = transfer(&cheap_keypair, cheap_sender, 0, 1, 10);
        let result = pool.submit(cheap_tx, &TxConfig::default(), &mut store, &mut multisig, ctx(), 101);
        assert!(matches!(result, Err(MempoolError::PoolFull { .. })));
    }

    #[test]
    fn block_commit_removes_included_and_invalidated_entries() {
        let mut store = StateStore::new();
        let mut multisig = MultiSigRegistry::new();
        let (keypair, sender) = funded_sender(&mut store, 1_000);
        let mut pool = TransactionPool::new(MempoolConfig::default());

        let tx0 = transfer(&keypair, sender, 0, 10, 50);
        let tx1 = transfer(&keypair, sender, 1, 10, 50);
        let hash0 = tx0.hash();
        let hash1 = tx1.hash();
        pool.submit(tx0.clone(), &TxConfig::default(), &mut store, &mut multisig, ctx(), 100)
            .unwrap();
        pool.submit(tx1, &TxConfig::default(), &mut store, &mut multisig, ctx(), 101)
            .unwrap();

        // Commit tx0 for real, advancing the sender's nonce to 1.
        store
            .apply_block(1, |txn| qc_05_tx::state_validate_and_apply(&tx0, txn, &mut multisig, ctx()))
            .unwrap();

        pool.on_block_committed(&[hash0], &mut store, &mut multisig, TxContext { block_height: 2 });

        assert!(!pool.contains(&hash0));
        // tx1 reused the same signing key as tx0, which is now marked used.
        assert!(!pool.contains(&hash1));
        assert!(pool.is_empty());
    }
}
