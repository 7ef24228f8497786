//! The durable record behind the in-memory [`crate::index::BlockIndex`]:
//! every header this node has validated, in arrival order, plus which hash
//! the applied chain state currently tracks. `qc-03-store` keeps block
//! bytes addressable by hash, but its by-height index assumes one block
//! per height and can't disambiguate forks; this sidecar is how the index
//! and the canonical path survive a restart without depending on that.

use std::io;
use std::path::{Path, PathBuf};

use qc_02_codec::{CodecResult, Encode, Reader, Writer};
use qc_06_block::BlockHeader;
use shared_types::Hash;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainMeta {
    pub headers: Vec<BlockHeader>,
    pub applied_tip: Hash,
    pub invalid: Vec<Hash>,
}

impl Encode for ChainMeta {
    fn encode(&self, w: &mut Writer) {
        w.seq(&self.headers, |w, h| h.encode(w));
        w.fixed_bytes(&self.applied_tip);
        w.seq(&self.invalid, |w, h| {
            w.fixed_bytes(h);
        });
    }

    fn decode(r: &mut Reader) -> CodecResult<Self> {
        Ok(Self {
            headers: r.seq(BlockHeader::decode)?,
            applied_tip: r.fixed_bytes::<32>()?,
            invalid: r.seq(|r| r.fixed_bytes::<32>())?,
        })
    }
}

pub struct ChainMetaFile {
    path: PathBuf,
}

impl ChainMetaFile {
    pub fn new(data_dir: &Path) -> Self {
        Self { path: data_dir.join("chain_meta.bin") }
    }

    pub fn load(&self) -> io::Result<Option<ChainMeta>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(ChainMeta::decode_from_slice(&bytes).ok()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn persist(&self, meta: &ChainMeta) -> io::Result<()> {
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, meta.encode_to_vec())?;
        std::fs::rename(&tmp, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(height: u64) -> BlockHeader {
        BlockHeader {
            version: 1,
            height,
            parent_hash: [0u8; 32],
            merkle_root: [0u8; 32],
            timestamp: 1_700_000_000,
            bits: 0x2000_ffff,
            nonce: 0,
            extra_nonce: 0,
        }
    }

    #[test]
    fn meta_round_trips() {
        let meta = ChainMeta {
            headers: vec![header(0), header(1)],
            applied_tip: [7u8; 32],
            invalid: vec![[8u8; 32]],
        };
        assert_eq!(ChainMeta::decode_from_slice(&meta.encode_to_vec()).unwrap(), meta);
    }

    #[test]
    fn persist_then_load_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let file = ChainMetaFile::new(dir.path());
        assert_eq!(file.load().unwrap(), None);

        let meta = ChainMeta { headers: vec![header(0)], applied_tip: [1u8; 32], invalid: vec![] };
        file.persist(&meta).unwrap();
        assert_eq!(file.load().unwrap(), Some(meta));
    }
}
