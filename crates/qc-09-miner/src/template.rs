//! The template a worker mines against, plus the sequence counter that
//! signals invalidation. `qc-08-chain::BlockTemplate` carries the
//! consensus-relevant fields (prev hash, height, bits, coinbase recipient,
//! selected transactions); this wraps it with the coinbase amount worked
//! out, the merkle root computed, and a header ready to have its nonce
//! searched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use primitive_types::U256;
use qc_05_tx::Transaction;
use qc_06_block::BlockHeader;
use qc_08_chain::BlockTemplate;

/// A template with its header fully built except for `nonce`, and the PoW
/// target it must beat.
#[derive(Clone, Debug)]
pub struct ActiveTemplate {
    pub seq: u64,
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub target: U256,
}

impl ActiveTemplate {
    pub fn from_chain_template(seq: u64, tpl: BlockTemplate, timestamp: u64) -> Self {
        let merkle_root = qc_06_block::merkle_root(&tpl.transactions);
        let header = BlockHeader {
            version: 1,
            height: tpl.height,
            parent_hash: tpl.prev_hash,
            merkle_root,
            timestamp,
            bits: tpl.bits,
            nonce: 0,
            extra_nonce: 0,
        };
        let target = qc_06_block::difficulty::target_from_bits(tpl.bits);
        Self { seq, header, transactions: tpl.transactions, target }
    }
}

/// Shared between the producer (whoever calls [`TemplateSlot::publish`] on
/// a new tip or a mempool refresh) and every mining worker. Workers never
/// write here; they only read a snapshot and poll [`TemplateSlot::seq`].
pub struct TemplateSlot {
    seq: AtomicU64,
    current: Mutex<Option<ActiveTemplate>>,
}

impl TemplateSlot {
    pub fn new() -> Self {
        Self { seq: AtomicU64::new(0), current: Mutex::new(None) }
    }

    pub fn seq(&self) -> u64 {
        self.seq.load(Ordering::Acquire)
    }

    /// Installs a freshly built template, bumping the sequence counter so
    /// every worker's next invalidation check refetches.
    pub fn publish(&self, tpl: ActiveTemplate) {
        self.seq.store(tpl.seq, Ordering::Release);
        *self.current.lock().expect("template slot mutex poisoned") = Some(tpl);
    }

    pub fn snapshot(&self) -> Option<ActiveTemplate> {
        self.current.lock().expect("template slot mutex poisoned").clone()
    }
}

impl Default for TemplateSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Address;

    fn addr(byte: u8) -> Address {
        let mut bytes = [0u8; 25];
        bytes[0] = Address::VERSION_DEV;
        bytes[1] = byte;
        Address(bytes)
    }

    fn sample_chain_template() -> BlockTemplate {
        BlockTemplate {
            prev_hash: [0u8; 32],
            height: 1,
            bits: 0x2000_ffff,
            coinbase_recipient: addr(1),
            transactions: vec![],
        }
    }

    #[test]
    fn publishing_bumps_the_sequence_counter() {
        let slot = TemplateSlot::new();
        assert_eq!(slot.seq(), 0);
        let tpl = ActiveTemplate::from_chain_template(1, sample_chain_template(), 1_700_000_000);
        slot.publish(tpl);
        assert_eq!(slot.seq(), 1);
        assert!(slot.snapshot().is_some());
    }
}
