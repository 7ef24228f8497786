//! Genesis block construction.

use shared_types::{Address, Hash};

use crate::difficulty::DifficultyConfig;
use crate::entities::{Block, BlockHeader};

/// Initial coin allocations baked into the genesis block, each realized as
/// a `Coinbase` payload rather than a `Transfer` (there is no sender to
/// debit at height 0).
#[derive(Clone, Debug)]
pub struct GenesisAllocation {
    pub recipient: Address,
    pub amount: u64,
}

/// Builds the genesis block: height 0, zero parent hash, one coinbase
/// transaction per allocation (none, for a network with no pre-mine), and
/// the network's configured starting difficulty.
pub fn build_genesis(
    difficulty: &DifficultyConfig,
    timestamp: u64,
    allocations: &[GenesisAllocation],
) -> Block {
    let transactions: Vec<qc_05_tx::Transaction> = allocations
        .iter()
        .map(|alloc| qc_05_tx::Transaction {
            master_address: alloc.recipient,
            public_key: shared_types::PublicKeyBytes(Vec::new()),
            signature: shared_types::SignatureBytes(Vec::new()),
            nonce: 0,
            fee: 0,
            payload: qc_05_tx::TxPayload::Coinbase {
                recipient: alloc.recipient,
                amount: alloc.amount,
            },
        })
        .collect();

    let merkle_root = crate::validate::merkle_root(&transactions);

    let header = BlockHeader {
        version: 1,
        height: 0,
        parent_hash: ZERO_HASH,
        merkle_root,
        timestamp,
        bits: difficulty.initial_bits,
        nonce: 0,
        extra_nonce: 0,
    };

    Block { header, transactions }
}

const ZERO_HASH: Hash = [0u8; 32];
