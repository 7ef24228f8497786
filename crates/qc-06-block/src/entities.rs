//! Block header and body.

use qc_02_codec::{CodecResult, Encode, Reader, Writer};
use qc_05_tx::Transaction;
use shared_types::Hash;

/// A block header. `bits` is the compact (Bitcoin-style nBits) encoding of
/// the PoW target; see [`crate::difficulty::target_from_bits`] to expand it.
/// The header hash commits to every field here, including `nonce` and
/// `extra_nonce` — a miner has two independent nonce spaces to search so a
/// worker thread can own a disjoint `nonce` range while `extra_nonce` still
/// lets the whole template be re-rolled without touching transactions.
/// `nonce` encodes last (see [`Encode`] impl below) so a mining template is
/// just the encoding of every other field with `nonce`'s eight bytes
/// appended by the search loop — `qc-compute`'s `pow_search` contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u32,
    pub height: u64,
    pub parent_hash: Hash,
    pub merkle_root: Hash,
    pub timestamp: u64,
    pub bits: u32,
    pub nonce: u64,
    pub extra_nonce: u64,
}

impl BlockHeader {
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.encode(&mut w);
        w.into_bytes()
    }

    /// The header's identity and the PoW search target: `hash() <= target`.
    pub fn hash(&self) -> Hash {
        qc_01_crypto::hash(&self.canonical_bytes())
    }

    /// Every encoded field except `nonce`. A miner appends the eight
    /// big-endian bytes of a candidate nonce to this and hashes the result;
    /// that equals `canonical_bytes()` of this header with `nonce` set to
    /// the candidate, since `nonce` is the last field `encode` writes.
    pub fn mining_template_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u32(self.version);
        w.u64(self.height);
        w.fixed_bytes(&self.parent_hash);
        w.fixed_bytes(&self.merkle_root);
        w.u64(self.timestamp);
        w.u32(self.bits);
        w.u64(self.extra_nonce);
        w.into_bytes()
    }
}

impl Encode for BlockHeader {
    fn encode(&self, w: &mut Writer) {
        w.u32(self.version);
        w.u64(self.height);
        w.fixed_bytes(&self.parent_hash);
        w.fixed_bytes(&self.merkle_root);
        w.u64(self.timestamp);
        w.u32(self.bits);
        w.u64(self.extra_nonce);
        w.u64(self.nonce);
    }

    fn decode(r: &mut Reader) -> CodecResult<Self> {
        Ok(Self {
            version: r.u32()?,
            height: r.u64()?,
            parent_hash: r.fixed_bytes()?,
            merkle_root: r.fixed_bytes()?,
            timestamp: r.u64()?,
            bits: r.u32()?,
            extra_nonce: r.u64()?,
            nonce: r.u64()?,
        })
    }
}

/// A full block: header plus its ordered transaction list. `transactions[0]`
/// must be a `Coinbase` payload; every other entry pays into `merkle_root`
/// via its content hash, in the order given.
#[derive(Debug, Clone)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }
}

impl Encode for Block {
    fn encode(&self, w: &mut Writer) {
        self.header.encode(w);
        w.seq(&self.transactions, |w, tx| tx.encode(w));
    }

    fn decode(r: &mut Reader) -> CodecResult<Self> {
        Ok(Self {
            header: BlockHeader::decode(r)?,
            transactions: r.seq(qc_05_tx::Transaction::decode)?,
        })
    }
}
