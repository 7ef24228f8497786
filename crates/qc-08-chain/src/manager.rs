//! The chain manager: the single writer of chain state. Validates and
//! stores every structurally-sound header it sees, tracks the
//! header-reachable branch with the highest cumulative work, and keeps
//! [`qc_04_state::StateStore`] and [`qc_05_tx::MultiSigRegistry`] in sync
//! with whichever branch that is — extending directly when the new best
//! header is a child of the current tip, reorganizing via a
//! lowest-common-ancestor walk otherwise.

use std::collections::HashMap;
use std::path::Path;

use qc_02_codec::Encode;
use qc_03_store::adapters::kv::KeyValueStore;
use qc_03_store::{BlockStore, InMemoryKVStore, RocksKVStore, StoreConfig};
use qc_04_state::StateStore;
use qc_05_tx::{MultiSigRegistry, Transaction, TxConfig, TxContext, TxPayload};
use qc_06_block::{merkle_root, validate_header, Block, BlockHeader, HeaderContext};
use qc_07_mempool::{GossipRecord, MempoolError, TransactionPool};
use shared_types::{Address, CoreError, Hash};

use crate::config::ChainConfig;
use crate::errors::ChainError;
use crate::fork_state::{ForkState, ForkStateFile};
use crate::index::BlockIndex;
use crate::meta::{ChainMeta, ChainMetaFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptOutcome {
    pub became_tip: bool,
}

/// What a miner needs to build a candidate header: the tip it extends, the
/// difficulty it must meet, and the transaction list (coinbase first).
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub prev_hash: Hash,
    pub height: u64,
    pub bits: u32,
    pub coinbase_recipient: Address,
    pub transactions: Vec<Transaction>,
}

enum SwitchError {
    TooDeep,
    Invalid(Hash, CoreError),
    Chain(ChainError),
}

impl From<ChainError> for SwitchError {
    fn from(err: ChainError) -> Self {
        Self::Chain(err)
    }
}

impl From<std::io::Error> for SwitchError {
    fn from(err: std::io::Error) -> Self {
        Self::Chain(ChainError::from(err))
    }
}

pub struct ChainManager<KV: KeyValueStore> {
    config: ChainConfig,
    store: BlockStore<KV>,
    state: StateStore,
    multisig: MultiSigRegistry,
    index: BlockIndex,
    canonical_heights: HashMap<u64, Hash>,
    applied_tip: Hash,
    fork_state_file: ForkStateFile,
    meta_file: ChainMetaFile,
}

impl ChainManager<RocksKVStore> {
    pub fn open(data_dir: &Path, config: ChainConfig, store_config: StoreConfig, genesis: Block) -> Result<Self, ChainError> {
        let store = BlockStore::open(data_dir, store_config)?;
        Self::open_with(data_dir, store, config, genesis)
    }
}

impl ChainManager<InMemoryKVStore> {
    pub fn open_in_memory(
        data_dir: &Path,
        config: ChainConfig,
        store_config: StoreConfig,
        genesis: Block,
    ) -> Result<Self, ChainError> {
        let store = BlockStore::open_in_memory(data_dir, store_config)?;
        Self::open_with(data_dir, store, config, genesis)
    }
}

impl<KV: KeyValueStore> ChainManager<KV> {
    fn open_with(data_dir: &Path, store: BlockStore<KV>, config: ChainConfig, genesis: Block) -> Result<Self, ChainError> {
        let meta_file = ChainMetaFile::new(data_dir);
        let fork_state_file = ForkStateFile::new(data_dir);

        let (index, applied_tip) = match meta_file.load()? {
            Some(meta) => {
                let index = BlockIndex::rebuild(&meta.headers, &meta.invalid);
                (index, meta.applied_tip)
            }
            None => {
                let genesis_hash = genesis.hash();
                store.put_block(genesis_hash, 0, &genesis.encode_to_vec())?;
                (BlockIndex::new(&genesis.header), genesis_hash)
            }
        };

        let mut manager = Self {
            config,
            store,
            state: StateStore::new(),
            multisig: MultiSigRegistry::new(),
            index,
            canonical_heights: HashMap::new(),
            applied_tip,
            fork_state_file,
            meta_file,
        };

        manager.replay_to(applied_tip)?;

        if manager.fork_state_file.load()?.is_some() {
            tracing::warn!("found a fork-state record from an interrupted reorg; discarding it and re-deriving the tip");
            manager.fork_state_file.clear()?;
        }
        manager.reconcile()?;
        manager.persist_meta()?;

        Ok(manager)
    }

    pub fn tip(&self) -> BlockHeader {
        self.index.header(&self.applied_tip).cloned().expect("applied tip is always indexed")
    }

    pub fn header_at(&self, height: u64) -> Option<BlockHeader> {
        self.canonical_heights.get(&height).and_then(|h| self.index.header(h)).cloned()
    }

    pub fn block_by_hash(&self, hash: &Hash) -> Result<Block, ChainError> {
        self.fetch_block(hash)
    }

    pub fn cumulative_difficulty(&self) -> u128 {
        self.index.cumulative_work(&self.applied_tip).unwrap_or(0)
    }

    pub fn build_template(&self, coinbase_recipient: Address, selected: Vec<Transaction>) -> BlockTemplate {
        let parent = self.tip();
        let height = parent.height + 1;
        let bits = self.expected_bits(&parent).unwrap_or(parent.bits);
        let fee_sum = selected.iter().fold(0u64, |acc, tx| acc.saturating_add(tx.fee));
        let amount = qc_06_block::subsidy(&self.config.block.difficulty, height).saturating_add(fee_sum);
        let coinbase = Transaction {
            master_address: coinbase_recipient,
            public_key: shared_types::PublicKeyBytes(Vec::new()),
            signature: shared_types::SignatureBytes(Vec::new()),
            nonce: 0,
            fee: 0,
            payload: TxPayload::Coinbase { recipient: coinbase_recipient, amount },
        };
        let mut transactions = Vec::with_capacity(selected.len() + 1);
        transactions.push(coinbase);
        transactions.extend(selected);
        BlockTemplate { prev_hash: self.applied_tip, height, bits, coinbase_recipient, transactions }
    }

    pub fn submit_transaction(
        &mut self,
        tx: Transaction,
        tx_cfg: &TxConfig,
        mempool: &mut TransactionPool,
        now: u64,
    ) -> Result<GossipRecord, MempoolError> {
        let ctx = TxContext { block_height: self.tip().height };
        mempool.submit(tx, tx_cfg, &mut self.state, &mut self.multisig, ctx, now)
    }

    /// Validates and, if it extends the best branch, applies `block`.
    /// `mempool` is reconciled against whatever the tip ends up being once
    /// this call returns, whether or not this particular block moved it.
    pub fn submit_block(&mut self, block: Block, mempool: &mut TransactionPool, now: u64) -> Result<AcceptOutcome, ChainError> {
        let hash = block.hash();
        let height = block.header.height;
        let result = self.submit_block_inner(block, mempool, now);
        match &result {
            Ok(outcome) => {
                quantum_telemetry::BLOCKS_ACCEPTED.inc();
                quantum_telemetry::CHAIN_HEIGHT.set(self.tip().height as f64);
                quantum_telemetry::CUMULATIVE_DIFFICULTY.set(self.cumulative_difficulty() as f64);
                quantum_telemetry::log_block_event!(info, "block accepted", height, hash, became_tip = outcome.became_tip);
            }
            Err(err) => {
                quantum_telemetry::BLOCKS_REJECTED.inc();
                quantum_telemetry::log_block_event!(debug, "block rejected", height, hash, reason = %err);
            }
        }
        result
    }

    fn submit_block_inner(&mut self, block: Block, mempool: &mut TransactionPool, now: u64) -> Result<AcceptOutcome, ChainError> {
        let hash = block.hash();
        if self.index.contains(&hash) {
            return Err(ChainError::AlreadyKnown(hash));
        }
        if self.index.is_invalid(&block.header.parent_hash) {
            return Err(ChainError::BranchInvalid(block.header.parent_hash));
        }
        let parent = self
            .index
            .header(&block.header.parent_hash)
            .ok_or(CoreError::UnknownParent(block.header.parent_hash))?
            .clone();

        {
            let _timer = quantum_telemetry::HistogramTimer::new(&quantum_telemetry::BLOCK_VALIDATION_SECONDS);
            self.validate_candidate(&parent, &block, now)?;
        }

        self.store.put_block(hash, block.header.height, &block.encode_to_vec())?;
        let outcome = self.index.insert(block.header.clone())?;
        self.persist_meta()?;

        let tip_before = self.applied_tip;
        if outcome.becomes_best {
            self.reconcile()?;
        }
        let moved = self.applied_tip != tip_before;
        if moved {
            let ctx = TxContext { block_height: self.tip().height };
            let tip_hash = self.applied_tip;
            let included: Vec<Hash> = self.fetch_block(&tip_hash)?.transactions.iter().map(Transaction::hash).collect();
            mempool.on_block_committed(&included, &mut self.state, &mut self.multisig, ctx);
        }

        Ok(AcceptOutcome { became_tip: self.applied_tip == hash })
    }

    fn validate_candidate(&self, parent: &BlockHeader, block: &Block, now: u64) -> Result<(), CoreError> {
        let ctx = HeaderContext {
            parent_height: parent.height,
            parent_hash: parent.hash(),
            now,
            max_future_skew_secs: self.config.block.max_future_skew_secs,
        };
        validate_header(&block.header, &ctx)?;
        self.check_median_time_past(&block.header)?;

        let expected_bits = self.expected_bits(parent)?;
        if block.header.bits != expected_bits {
            return Err(CoreError::BadPoW);
        }

        let expected_root = merkle_root(&block.transactions);
        if block.header.merkle_root != expected_root {
            return Err(CoreError::BadMerkleRoot);
        }

        let Some(coinbase) = block.transactions.first() else {
            return Err(CoreError::Malformed("block has no transactions".to_string()));
        };
        let TxPayload::Coinbase { amount, .. } = &coinbase.payload else {
            return Err(CoreError::Malformed("block body has no leading coinbase transaction".to_string()));
        };
        let fee_sum = block.transactions[1..]
            .iter()
            .try_fold(0u64, |acc, tx| acc.checked_add(tx.fee))
            .ok_or_else(|| CoreError::Malformed("fee sum overflows a u64".to_string()))?;
        let expected_subsidy = qc_06_block::subsidy(&self.config.block.difficulty, block.header.height);
        if *amount != expected_subsidy.saturating_add(fee_sum) {
            return Err(CoreError::Malformed("coinbase amount does not equal subsidy plus fees".to_string()));
        }
        Ok(())
    }

    fn check_median_time_past(&self, header: &BlockHeader) -> Result<(), CoreError> {
        let window = self.config.median_time_window.max(1);
        let mut timestamps = Vec::new();
        let mut cur = header.parent_hash;
        for _ in 0..window {
            let Some(h) = self.index.header(&cur) else { break };
            timestamps.push(h.timestamp);
            if h.height == 0 {
                break;
            }
            cur = h.parent_hash;
        }
        timestamps.sort_unstable();
        let median = timestamps[timestamps.len() / 2];
        if header.timestamp <= median {
            return Err(CoreError::BadTimestamp);
        }
        Ok(())
    }

    fn expected_bits(&self, parent: &BlockHeader) -> Result<u32, CoreError> {
        let height = parent.height + 1;
        let cfg = &self.config.block.difficulty;
        if !qc_06_block::is_retarget_height(cfg, height) {
            return Ok(parent.bits);
        }
        let window = cfg.measurement_window.max(1);
        let oldest = self
            .index
            .header_n_back(parent.hash(), window - 1)
            .ok_or(CoreError::UnknownParent(parent.hash()))?;
        Ok(qc_06_block::retarget(cfg, parent.bits, oldest.timestamp, parent.timestamp))
    }

    /// Moves `applied_tip` toward `index.best_hash()`, retrying against the
    /// next-best candidate whenever a branch turns out to fail state
    /// validation, until the tip matches the index's best header or every
    /// remaining candidate has been exhausted or is too deep to replay.
    fn reconcile(&mut self) -> Result<(), ChainError> {
        loop {
            let candidate = self.index.best_hash();
            if candidate == self.applied_tip {
                return Ok(());
            }
            match self.switch_to(candidate) {
                Ok(()) => return Ok(()),
                Err(SwitchError::TooDeep) => return Ok(()),
                Err(SwitchError::Invalid(bad_hash, reason)) => {
                    let bad_height = self.index.header(&bad_hash).map(|h| h.height).unwrap_or(0);
                    quantum_telemetry::log_block_event!(warn, "reorg candidate failed state validation; marking branch permanently invalid", bad_height, bad_hash, reason = %reason);
                    self.index.mark_invalid(bad_hash);
                    self.persist_meta()?;
                }
                Err(SwitchError::Chain(err)) => return Err(err),
            }
        }
    }

    fn switch_to(&mut self, candidate: Hash) -> Result<(), SwitchError> {
        let (fork_point, old_path, new_path) = self
            .index
            .lowest_common_ancestor(self.applied_tip, candidate)
            .ok_or_else(|| SwitchError::Chain(CoreError::UnknownParent(candidate).into()))?;

        let depth = old_path.len().max(new_path.len()) as u64;
        if depth > self.config.reorg_limit {
            return Err(SwitchError::TooDeep);
        }

        if !old_path.is_empty() {
            let candidate_height = self.index.header(&candidate).map(|h| h.height).unwrap_or(0);
            quantum_telemetry::REORGS.inc();
            quantum_telemetry::log_block_event!(info, "reorg in progress", candidate_height, candidate, fork_point = ?fork_point, depth);
            let fork_state = ForkState {
                initiator: candidate,
                fork_point,
                old_path: old_path.clone(),
                new_path: new_path.clone(),
            };
            self.fork_state_file.persist(&fork_state)?;
        }

        self.execute_reorg(&old_path, &new_path)?;

        self.applied_tip = candidate;
        self.fork_state_file.clear()?;
        self.persist_meta()?;
        Ok(())
    }

    fn execute_reorg(&mut self, old_path: &[Hash], new_path: &[Hash]) -> Result<(), SwitchError> {
        for hash in old_path.iter().rev() {
            let header = self.index.header(hash).expect("path hash must be indexed").clone();
            let block = self.fetch_block(hash)?;
            self.revert_block_body(&header, &block)?;
            self.canonical_heights.remove(&header.height);
        }

        for hash in new_path {
            let header = self.index.header(hash).expect("path hash must be indexed").clone();
            let block = self.fetch_block(hash)?;
            if let Err(err) = self.apply_block_body(&header, &block) {
                for h in old_path {
                    let oh = self.index.header(h).expect("path hash must be indexed").clone();
                    let ob = self.fetch_block(h).expect("old_path blocks were already applied once and must still be readable");
                    self.apply_block_body(&oh, &ob)
                        .expect("old_path previously applied cleanly; replay to restore the prior tip must succeed");
                    self.canonical_heights.insert(oh.height, *h);
                }
                return Err(SwitchError::Invalid(*hash, err));
            }
            self.canonical_heights.insert(header.height, *hash);
        }
        Ok(())
    }

    fn replay_to(&mut self, tip: Hash) -> Result<(), ChainError> {
        let mut path = Vec::new();
        let mut cur = tip;
        loop {
            let header = self.index.header(&cur).ok_or(CoreError::UnknownParent(cur))?.clone();
            path.push(cur);
            if header.height == 0 {
                break;
            }
            cur = header.parent_hash;
        }
        path.reverse();

        for hash in path {
            let header = self.index.header(&hash).expect("just walked this hash").clone();
            let block = self.fetch_block(&hash)?;
            self.apply_block_body(&header, &block)?;
            self.canonical_heights.insert(header.height, hash);
        }
        self.applied_tip = tip;
        Ok(())
    }

    fn apply_block_body(&mut self, header: &BlockHeader, block: &Block) -> Result<(), CoreError> {
        let ctx = TxContext { block_height: header.height };
        let state = &mut self.state;
        let multisig = &mut self.multisig;
        for (i, tx) in block.transactions.iter().enumerate() {
            let result = state.apply_block(header.height, |txn| qc_05_tx::state_validate_and_apply(tx, txn, &mut *multisig, ctx));
            if let Err(err) = result {
                for _ in 0..i {
                    state.revert_block(header.height).expect("write-set for this block must still be on top");
                }
                while multisig.revert_block(header.height).is_some() {}
                return Err(err);
            }
        }
        Ok(())
    }

    fn revert_block_body(&mut self, header: &BlockHeader, block: &Block) -> Result<(), ChainError> {
        for _ in 0..block.transactions.len() {
            self.state.revert_block(header.height)?;
        }
        while self.multisig.revert_block(header.height).is_some() {}
        Ok(())
    }

    fn fetch_block(&self, hash: &Hash) -> Result<Block, ChainError> {
        let bytes = self.store.get_block(hash)?;
        Block::decode_from_slice(&bytes).map_err(|e| ChainError::Invalid(CoreError::Malformed(e.to_string())))
    }

    fn persist_meta(&self) -> Result<(), ChainError> {
        let meta = ChainMeta {
            headers: self.index.headers_in_arrival_order(),
            applied_tip: self.applied_tip,
            invalid: self.index.invalid_hashes(),
        };
        self.meta_file.persist(&meta)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_06_block::genesis::{build_genesis, GenesisAllocation};
    use qc_06_block::BlockConfig;
    use qc_07_mempool::MempoolConfig;

    // Loosest possible compact target (max exponent, max mantissa): the
    // digest-vs-target PoW check in `validate_header` passes for all but a
    // vanishingly small fraction of hashes, so fixed test nonces work
    // without an actual mining search.
    const EASY_BITS: u32 = 0x20ff_ffff;

    fn addr(byte: u8) -> Address {
        let mut bytes = [0u8; 25];
        bytes[0] = Address::VERSION_DEV;
        bytes[1] = byte;
        Address(bytes)
    }

    fn test_config() -> ChainConfig {
        let mut block = BlockConfig::default();
        block.difficulty.initial_bits = EASY_BITS;
        block.difficulty.min_bits = EASY_BITS;
        ChainConfig { block, reorg_limit: 100, median_time_window: 3 }
    }

    fn bootstrap() -> (tempfile::TempDir, ChainManager<InMemoryKVStore>, Address) {
        let dir = tempfile::tempdir().unwrap();
        let recipient = addr(1);
        let cfg = test_config();
        let genesis = build_genesis(&cfg.block.difficulty, 1_700_000_000, &[GenesisAllocation { recipient, amount: 1_000_000 }]);
        let manager = ChainManager::open_in_memory(dir.path(), cfg, StoreConfig::default(), genesis).unwrap();
        (dir, manager, recipient)
    }

    fn mine_on(parent: &BlockHeader, cfg: &ChainConfig, recipient: Address, timestamp: u64, nonce: u64) -> Block {
        let height = parent.height + 1;
        let amount = qc_06_block::subsidy(&cfg.block.difficulty, height);
        let transactions = vec![Transaction {
            master_address: recipient,
            public_key: shared_types::PublicKeyBytes(Vec::new()),
            signature: shared_types::SignatureBytes(Vec::new()),
            nonce: 0,
            fee: 0,
            payload: TxPayload::Coinbase { recipient, amount },
        }];
        let header = BlockHeader {
            version: 1,
            height,
            parent_hash: parent.hash(),
            merkle_root: merkle_root(&transactions),
            timestamp,
            bits: EASY_BITS,
            nonce,
            extra_nonce: 0,
        };
        Block { header, transactions }
    }

    fn mine_child(manager: &ChainManager<InMemoryKVStore>, recipient: Address, timestamp: u64, nonce: u64) -> Block {
        mine_on(&manager.tip(), &test_config(), recipient, timestamp, nonce)
    }

    fn empty_mempool() -> TransactionPool {
        TransactionPool::new(MempoolConfig::default())
    }

    #[test]
    fn genesis_boot_reports_height_zero_tip() {
        let (_dir, manager, _) = bootstrap();
        assert_eq!(manager.tip().height, 0);
        assert_eq!(manager.cumulative_difficulty(), manager.index.cumulative_work(&manager.applied_tip).unwrap());
    }

    #[test]
    fn submitting_a_valid_child_advances_the_tip() {
        let (_dir, mut manager, recipient) = bootstrap();
        let mut mempool = empty_mempool();
        let block = mine_child(&manager, recipient, 1_700_000_100, 1);
        let hash = block.hash();
        let outcome = manager.submit_block(block, &mut mempool, 1_700_000_200).unwrap();
        assert!(outcome.became_tip);
        assert_eq!(manager.tip().hash(), hash);
        assert_eq!(manager.header_at(1).unwrap().hash(), hash);
    }

    #[test]
    fn resubmitting_a_known_block_is_rejected() {
        let (_dir, mut manager, recipient) = bootstrap();
        let mut mempool = empty_mempool();
        let block = mine_child(&manager, recipient, 1_700_000_100, 1);
        manager.submit_block(block.clone(), &mut mempool, 1_700_000_200).unwrap();
        let err = manager.submit_block(block, &mut mempool, 1_700_000_200).unwrap_err();
        assert!(matches!(err, ChainError::AlreadyKnown(_)));
    }

    #[test]
    fn a_longer_side_chain_triggers_a_reorg_to_the_new_tip() {
        let (_dir, mut manager, recipient) = bootstrap();
        let mut mempool = empty_mempool();
        let genesis = manager.tip();

        let a1 = mine_on(&genesis, &test_config(), recipient, 1_700_000_100, 1);
        let a1_hash = a1.hash();
        manager.submit_block(a1.clone(), &mut mempool, 1_700_000_200).unwrap();
        assert_eq!(manager.tip().hash(), a1_hash);

        // A side branch that arrives later but ends up two blocks deep
        // outweighs the single-block branch once its second block lands.
        let b1 = mine_on(&genesis, &test_config(), recipient, 1_700_000_101, 2);
        let b1_hash = b1.hash();
        let outcome = manager.submit_block(b1.clone(), &mut mempool, 1_700_000_200).unwrap();
        assert!(!outcome.became_tip);
        assert_eq!(manager.tip().hash(), a1_hash, "equal work ties favor the earlier arrival");

        let b2 = mine_on(&b1.header, &test_config(), recipient, 1_700_000_160, 1);
        let b2_hash = b2.hash();
        let outcome = manager.submit_block(b2, &mut mempool, 1_700_000_200).unwrap();
        assert!(outcome.became_tip);
        assert_eq!(manager.tip().hash(), b2_hash);
        assert_eq!(manager.header_at(1).unwrap().hash(), b1_hash);
        assert_eq!(manager.header_at(2).unwrap().hash(), b2_hash);
    }
}
