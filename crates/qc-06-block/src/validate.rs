//! Header-level validation: merkle root, PoW, timestamp, and height/parent
//! linkage. Per-transaction validation belongs to `qc-05-tx`; this module
//! only checks what the header itself commits to.

use qc_compute::tasks::merkle::MerkleRootTask;
use qc_compute::ComputeEngine;
use shared_types::{CoreError, Hash};
use std::sync::Arc;

use crate::difficulty::target_from_bits;
use crate::entities::{Block, BlockHeader};

/// Computes the merkle root over a transaction list's content hashes.
/// Delegates the actual tree-building (including the odd-count
/// duplicate-last tie-break) to `qc-compute`.
pub fn merkle_root(transactions: &[qc_05_tx::Transaction]) -> Hash {
    let engine = qc_compute::cpu_engine();
    merkle_root_with_engine(transactions, &engine)
}

fn merkle_root_with_engine(
    transactions: &[qc_05_tx::Transaction],
    engine: &Arc<dyn ComputeEngine>,
) -> Hash {
    let leaf_hashes = transactions.iter().map(|tx| tx.hash()).collect();
    MerkleRootTask { leaf_hashes }.execute(engine)
}

/// Context a header is validated against: its parent's height/hash and the
/// wall-clock time validation runs at (for future-timestamp rejection).
pub struct HeaderContext {
    pub parent_height: u64,
    pub parent_hash: Hash,
    pub now: u64,
    pub max_future_skew_secs: u64,
}

/// Checks the header's structural linkage and proof of work. Does not check
/// the merkle root against a body — call [`validate_block`] for that, which
/// needs the transaction list.
pub fn validate_header(header: &BlockHeader, ctx: &HeaderContext) -> Result<(), CoreError> {
    if header.height != ctx.parent_height + 1 {
        return Err(CoreError::BadHeight {
            got: header.height,
            parent: ctx.parent_height,
        });
    }
    if header.parent_hash != ctx.parent_hash {
        return Err(CoreError::UnknownParent(header.parent_hash));
    }
    if header.timestamp > ctx.now + ctx.max_future_skew_secs {
        return Err(CoreError::BadTimestamp);
    }

    let target = target_from_bits(header.bits);
    let digest = header.hash();
    let digest_value = primitive_types::U256::from_big_endian(&digest);
    if digest_value > target {
        return Err(CoreError::BadPoW);
    }
    Ok(())
}

/// Full block validation: header linkage/PoW plus the merkle root commits
/// to the actual transaction list.
pub fn validate_block(block: &Block, ctx: &HeaderContext) -> Result<(), CoreError> {
    validate_header(&block.header, ctx)?;
    let expected_root = merkle_root(&block.transactions);
    if block.header.merkle_root != expected_root {
        return Err(CoreError::BadMerkleRoot);
    }
    if !matches!(block.transactions.first().map(|tx| &tx.payload), Some(qc_05_tx::TxPayload::Coinbase { .. })) {
        return Err(CoreError::Malformed("block body has no leading coinbase transaction".to_string()));
    }
    Ok(())
}
