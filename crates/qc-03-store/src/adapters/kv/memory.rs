use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{BatchOp, KeyValueStore};
use crate::domain::errors::StorageError;

/// In-memory index for tests. `BTreeMap` gives deterministic prefix-scan
/// ordering, matching rocksdb's sorted iteration without needing rocksdb.
#[derive(Default)]
pub struct InMemoryKVStore {
    data: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    fn atomic_batch_write(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        let mut data = self.data.lock().unwrap();
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get() {
        let kv = InMemoryKVStore::new();
        kv.atomic_batch_write(vec![BatchOp::put(b"a".to_vec(), b"1".to_vec())])
            .unwrap();
        assert_eq!(kv.get(b"a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn batch_is_all_or_nothing_in_application_order() {
        let kv = InMemoryKVStore::new();
        kv.atomic_batch_write(vec![
            BatchOp::put(b"a".to_vec(), b"1".to_vec()),
            BatchOp::put(b"b".to_vec(), b"2".to_vec()),
        ])
        .unwrap();
        assert_eq!(kv.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(kv.get(b"b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn prefix_scan_is_ordered() {
        let kv = InMemoryKVStore::new();
        kv.atomic_batch_write(vec![
            BatchOp::put(b"h:2".to_vec(), b"y".to_vec()),
            BatchOp::put(b"h:1".to_vec(), b"x".to_vec()),
            BatchOp::put(b"z:1".to_vec(), b"n".to_vec()),
        ])
        .unwrap();
        let scanned = kv.prefix_scan(b"h:").unwrap();
        assert_eq!(scanned, vec![(b"h:1".to_vec(), b"x".to_vec()), (b"h:2".to_vec(), b"y".to_vec())]);
    }
}
