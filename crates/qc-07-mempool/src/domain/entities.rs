//! The pool entry and the gossip record the admission pipeline emits.

use qc_05_tx::{Transaction, TxPayload};
use shared_types::Hash;

pub type Timestamp = u64;

/// An admitted transaction plus the bookkeeping the pool's indices need:
/// its content hash (computed once on admission, not recomputed per
/// lookup), its encoded size (the byte-budget eviction currency), and its
/// fee rate (fee per byte, the eviction and priority currency).
#[derive(Clone, Debug)]
pub struct MempoolEntry {
    pub tx: Transaction,
    pub hash: Hash,
    pub size_bytes: u64,
    pub fee_per_byte: u64,
    pub added_at: Timestamp,
}

impl MempoolEntry {
    pub fn new(tx: Transaction, added_at: Timestamp) -> Self {
        let hash = tx.hash();
        let size_bytes = tx.canonical_bytes().len() as u64;
        let fee_per_byte = tx.fee / size_bytes.max(1);
        Self {
            tx,
            hash,
            size_bytes,
            fee_per_byte,
            added_at,
        }
    }

    pub fn sender(&self) -> shared_types::Address {
        self.tx.master_address
    }
}

/// The item-type tag carried in a gossip `(mr, tx_hash, type)` record,
/// mirroring the typed transaction messages on the wire (`TX`, `MT`, `TK`,
/// `TT`, `SL`, `MC`, `MS`, `MV`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GossipItemType {
    Transfer,
    Message,
    TokenCreate,
    TokenTransfer,
    Slave,
    MultiSigCreate,
    MultiSigSpend,
    MultiSigVote,
}

impl GossipItemType {
    pub fn of(payload: &TxPayload) -> Option<Self> {
        match payload {
            TxPayload::Transfer { .. } => Some(Self::Transfer),
            // A coinbase only ever exists inside a block body; it is never
            // admitted to the mempool and never gossiped standalone.
            TxPayload::Coinbase { .. } => None,
            TxPayload::Message { .. } => Some(Self::Message),
            TxPayload::TokenCreate { .. } => Some(Self::TokenCreate),
            TxPayload::TokenTransfer { .. } => Some(Self::TokenTransfer),
            TxPayload::Slave { .. } => Some(Self::Slave),
            TxPayload::MultiSigCreate { .. } => Some(Self::MultiSigCreate),
            TxPayload::MultiSigSpend { .. } => Some(Self::MultiSigSpend),
            TxPayload::MultiSigVote { .. } => Some(Self::MultiSigVote),
        }
    }
}

/// The `(mr, tx_hash, type)` record emitted on successful admission, handed
/// off to the P2P layer to announce as an `MR` (have-hash) message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GossipRecord {
    pub tx_hash: Hash,
    pub item_type: GossipItemType,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Address, PublicKeyBytes, SignatureBytes};

    fn addr(byte: u8) -> Address {
        let mut bytes = [0u8; 25];
        bytes[0] = Address::VERSION_DEV;
        bytes[1] = byte;
        Address(bytes)
    }

    #[test]
    fn entry_fee_per_byte_divides_fee_by_encoded_size() {
        let tx = Transaction {
            master_address: addr(1),
            public_key: PublicKeyBytes(vec![1, 2, 3]),
            signature: SignatureBytes(vec![4, 5, 6]),
            nonce: 0,
            fee: 1000,
            payload: TxPayload::Transfer {
                outputs: vec![(addr(2), 500)],
                message: None,
            },
        };
        let entry = MempoolEntry::new(tx, 0);
        assert_eq!(entry.fee_per_byte, entry.tx.fee / entry.size_bytes);
    }

    #[test]
    fn gossip_item_type_has_no_variant_for_coinbase() {
        let payload = TxPayload::Coinbase {
            recipient: addr(1),
            amount: 100,
        };
        assert_eq!(GossipItemType::of(&payload), None);
    }
}
