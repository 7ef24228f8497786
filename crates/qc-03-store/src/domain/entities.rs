//! On-disk location records. These are index *payloads*, not the blocks
//! themselves — callers (`qc-06-block`) own the schema of the block bytes.

use qc_02_codec::{CodecResult, Encode, Reader, Writer};
use shared_types::Hash;

/// Where a record lives: which rotated block file, what byte offset, how
/// long the framed record is, and its checksum (verified on read).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLocation {
    pub file_id: u32,
    pub offset: u64,
    pub length: u32,
    pub checksum: u32,
}

impl Encode for BlockLocation {
    fn encode(&self, w: &mut Writer) {
        w.u32(self.file_id)
            .u64(self.offset)
            .u32(self.length)
            .u32(self.checksum);
    }

    fn decode(r: &mut Reader) -> CodecResult<Self> {
        Ok(Self {
            file_id: r.u32()?,
            offset: r.u64()?,
            length: r.u32()?,
            checksum: r.u32()?,
        })
    }
}

/// Summary of what is currently stored, persisted under a single key so
/// a restart doesn't need a full file scan to answer "what's the tip".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageMetadata {
    pub genesis_hash: Option<Hash>,
    pub latest_height: Option<u64>,
    pub block_count: u64,
    pub active_file_id: u32,
    pub active_file_len: u64,
}

impl Encode for StorageMetadata {
    fn encode(&self, w: &mut Writer) {
        match self.genesis_hash {
            Some(h) => {
                w.u8(1);
                w.fixed_bytes(&h);
            }
            None => {
                w.u8(0);
            }
        }
        match self.latest_height {
            Some(h) => {
                w.u8(1);
                w.u64(h);
            }
            None => {
                w.u8(0);
            }
        }
        w.u64(self.block_count)
            .u32(self.active_file_id)
            .u64(self.active_file_len);
    }

    fn decode(r: &mut Reader) -> CodecResult<Self> {
        let genesis_hash = match r.u8()? {
            0 => None,
            _ => Some(r.fixed_bytes::<32>()?),
        };
        let latest_height = match r.u8()? {
            0 => None,
            _ => Some(r.u64()?),
        };
        Ok(Self {
            genesis_hash,
            latest_height,
            block_count: r.u64()?,
            active_file_id: r.u32()?,
            active_file_len: r.u64()?,
        })
    }
}
