//! The block store facade: open a data directory, put/get blocks by hash
//! or height. Generic over [`KeyValueStore`] so tests can run entirely
//! in memory while production wires in rocksdb.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use qc_02_codec::{CodecResult, Encode, Reader, Writer};
use shared_types::Hash;

use crate::adapters::block_file::BlockFile;
use crate::adapters::kv::{BatchOp, InMemoryKVStore, KeyValueStore, RocksKVStore};
use crate::adapters::lock::DatabaseLock;
use crate::domain::entities::{BlockLocation, StorageMetadata};
use crate::domain::errors::StorageError;
use crate::recovery;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub max_file_bytes: u64,
    pub max_block_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 128 * 1024 * 1024,
            max_block_bytes: 4 * 1024 * 1024,
        }
    }
}

/// A full record written to a block file: the hash and height travel with
/// the payload so the index can be rebuilt from the block files alone.
struct StoreRecord {
    header_hash: Hash,
    height: u64,
    payload: Vec<u8>,
}

impl Encode for StoreRecord {
    fn encode(&self, w: &mut Writer) {
        w.fixed_bytes(&self.header_hash);
        w.u64(self.height);
        w.var_bytes(&self.payload);
    }

    fn decode(r: &mut Reader) -> CodecResult<Self> {
        Ok(Self {
            header_hash: r.fixed_bytes::<32>()?,
            height: r.u64()?,
            payload: r.var_bytes()?,
        })
    }
}

fn hash_key(hash: &Hash) -> Vec<u8> {
    let mut k = Vec::with_capacity(33);
    k.push(b'h');
    k.extend_from_slice(hash);
    k
}

fn height_key(height: u64) -> Vec<u8> {
    let mut k = Vec::with_capacity(9);
    k.push(b't');
    k.extend_from_slice(&height.to_be_bytes());
    k
}

const META_KEY: &[u8] = b"meta";

pub struct BlockStore<KV: KeyValueStore> {
    data_dir: PathBuf,
    config: StoreConfig,
    kv: KV,
    active_file: Mutex<BlockFile>,
    metadata: Mutex<StorageMetadata>,
    _lock: DatabaseLock,
}

impl BlockStore<RocksKVStore> {
    /// Open (or create) a production store, acquiring an exclusive lock
    /// on `data_dir` and running crash recovery before returning.
    pub fn open(data_dir: &Path, config: StoreConfig) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir).map_err(|e| StorageError::Io(e.to_string()))?;
        let lock = DatabaseLock::acquire(data_dir)?;
        let kv = RocksKVStore::open(&data_dir.join("index"))?;
        Self::open_with(data_dir.to_path_buf(), kv, config, lock)
    }
}

impl BlockStore<InMemoryKVStore> {
    /// Open a store for tests: in-memory index, real block files on disk
    /// (so recovery/rotation logic is still exercised).
    pub fn open_in_memory(data_dir: &Path, config: StoreConfig) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir).map_err(|e| StorageError::Io(e.to_string()))?;
        let lock = DatabaseLock::acquire(data_dir)?;
        Self::open_with(data_dir.to_path_buf(), InMemoryKVStore::new(), config, lock)
    }
}

impl<KV: KeyValueStore> BlockStore<KV> {
    fn open_with(
        data_dir: PathBuf,
        kv: KV,
        config: StoreConfig,
        lock: DatabaseLock,
    ) -> Result<Self, StorageError> {
        let mut metadata = match kv.get(META_KEY)? {
            Some(bytes) => StorageMetadata::decode_from_slice(&bytes)?,
            None => StorageMetadata::default(),
        };

        let report = recovery::recover_file(&data_dir, metadata.active_file_id)?;
        if report.truncated_bytes > 0 {
            tracing::warn!(
                truncated_bytes = report.truncated_bytes,
                "store recovered from a torn trailing write"
            );
        }

        // Self-healing: re-insert any recovered record whose index entry
        // is missing (e.g. the index lagged the block file at crash time).
        let mut repair_ops = Vec::new();
        for rec in &report.records {
            let record = StoreRecord::decode_from_slice(&rec.payload)?;
            let h_key = hash_key(&record.header_hash);
            if kv.get(&h_key)?.is_none() {
                let checksum = crc32fast::hash(&rec.payload);
                let framed_len = qc_02_codec::encode_frame(&rec.payload).len() as u32;
                let location = BlockLocation {
                    file_id: metadata.active_file_id,
                    offset: rec.offset,
                    length: framed_len,
                    checksum,
                };
                repair_ops.push(BatchOp::put(h_key, location.encode_to_vec()));
                repair_ops.push(BatchOp::put(height_key(record.height), record.header_hash.to_vec()));
                metadata.block_count += 1;
                metadata.latest_height = Some(
                    metadata
                        .latest_height
                        .map_or(record.height, |h| h.max(record.height)),
                );
                if record.height == 0 {
                    metadata.genesis_hash = Some(record.header_hash);
                }
            }
        }
        if !repair_ops.is_empty() {
            kv.atomic_batch_write(repair_ops)?;
        }

        let active_file = BlockFile::open(&data_dir, metadata.active_file_id)?;
        metadata.active_file_len = active_file.len;
        kv.atomic_batch_write(vec![BatchOp::put(META_KEY.to_vec(), metadata.encode_to_vec())])?;

        Ok(Self {
            data_dir,
            config,
            kv,
            active_file: Mutex::new(active_file),
            metadata: Mutex::new(metadata),
            _lock: lock,
        })
    }

    /// Append a new block. Fails if a block with this hash is already
    /// stored or the payload exceeds the configured size limit.
    pub fn put_block(&self, hash: Hash, height: u64, payload: &[u8]) -> Result<(), StorageError> {
        if payload.len() > self.config.max_block_bytes {
            return Err(StorageError::BlockTooLarge {
                size: payload.len(),
                max: self.config.max_block_bytes,
            });
        }
        if self.kv.get(&hash_key(&hash))?.is_some() {
            return Err(StorageError::BlockExists(hash));
        }

        let record = StoreRecord {
            header_hash: hash,
            height,
            payload: payload.to_vec(),
        }
        .encode_to_vec();
        let checksum = crc32fast::hash(&record);
        let framed_len = qc_02_codec::encode_frame(&record).len() as u32;

        let mut metadata = self.metadata.lock().unwrap();
        let mut active_file = self.active_file.lock().unwrap();

        if active_file.len + framed_len as u64 > self.config.max_file_bytes {
            metadata.active_file_id += 1;
            *active_file = BlockFile::open(&self.data_dir, metadata.active_file_id)?;
        }

        let offset = active_file.append(&record)?;
        metadata.active_file_len = active_file.len;
        metadata.block_count += 1;
        metadata.latest_height = Some(metadata.latest_height.map_or(height, |h| h.max(height)));
        if height == 0 {
            metadata.genesis_hash = Some(hash);
        }

        let location = BlockLocation {
            file_id: metadata.active_file_id,
            offset,
            length: framed_len,
            checksum,
        };

        self.kv.atomic_batch_write(vec![
            BatchOp::put(hash_key(&hash), location.encode_to_vec()),
            BatchOp::put(height_key(height), hash.to_vec()),
            BatchOp::put(META_KEY.to_vec(), metadata.encode_to_vec()),
        ])?;

        Ok(())
    }

    pub fn get_block(&self, hash: &Hash) -> Result<Vec<u8>, StorageError> {
        let location_bytes = self
            .kv
            .get(&hash_key(hash))?
            .ok_or(StorageError::BlockNotFound(*hash))?;
        let location = BlockLocation::decode_from_slice(&location_bytes)?;
        self.read_record(&location, hash)
    }

    pub fn get_block_by_height(&self, height: u64) -> Result<Vec<u8>, StorageError> {
        let hash_bytes = self
            .kv
            .get(&height_key(height))?
            .ok_or(StorageError::HeightNotFound(height))?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&hash_bytes);
        self.get_block(&hash)
    }

    pub fn block_exists(&self, hash: &Hash) -> Result<bool, StorageError> {
        Ok(self.kv.get(&hash_key(hash))?.is_some())
    }

    pub fn get_metadata(&self) -> StorageMetadata {
        self.metadata.lock().unwrap().clone()
    }

    pub fn latest_height(&self) -> Option<u64> {
        self.metadata.lock().unwrap().latest_height
    }

    fn read_record(&self, location: &BlockLocation, hash: &Hash) -> Result<Vec<u8>, StorageError> {
        let active_file = self.active_file.lock().unwrap();
        let bytes = if location.file_id == active_file.file_id {
            active_file.read_at(location.offset, location.length)?
        } else {
            drop(active_file);
            BlockFile::open(&self.data_dir, location.file_id)?
                .read_at(location.offset, location.length)?
        };

        let actual = crc32fast::hash(&bytes);
        if actual != location.checksum {
            return Err(StorageError::DataCorruption {
                hash: *hash,
                expected: location.checksum,
                actual,
            });
        }
        let record = StoreRecord::decode_from_slice(&bytes)?;
        Ok(record.payload)
    }
}
