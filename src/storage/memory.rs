//! In-memory key-value store for tests and throwaway ledgers.

use crate::error::{Result, StorageError};
use crate::storage::{KeyValueStore, WriteBatch, WriteOp};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

#[derive(Default, Clone, Debug)]
pub struct MemoryStorage {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> Result<usize> {
        let data = self.data.read().map_err(|_| StorageError::Poisoned)?;
        Ok(data.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn write_all(data: &mut BTreeMap<Vec<u8>, Vec<u8>>, batch: &WriteBatch) {
    for op in batch.ops() {
        match op {
            WriteOp::Put { key, value } => {
                data.insert(key.clone(), value.clone());
            }
            WriteOp::Delete { key } => {
                data.remove(key);
            }
        }
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let data = self.data.read().map_err(|_| StorageError::Poisoned)?;
        Ok(data.get(key).cloned())
    }

    fn apply(&self, batch: WriteBatch) -> Result<()> {
        let mut data = self.data.write().map_err(|_| StorageError::Poisoned)?;
        write_all(&mut data, &batch);
        Ok(())
    }

    fn apply_if_absent(&self, key: &[u8], batch: WriteBatch) -> Result<bool> {
        let mut data = self.data.write().map_err(|_| StorageError::Poisoned)?;
        if data.contains_key(key) {
            return Ok(false);
        }
        write_all(&mut data, &batch);
        Ok(true)
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert!(storage.is_empty().unwrap());

        let mut batch = WriteBatch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.put(b"b".to_vec(), b"2".to_vec());
        storage.apply(batch).unwrap();

        assert_eq!(storage.len().unwrap(), 2);
        assert_eq!(storage.get(b"a").unwrap(), Some(b"1".to_vec()));

        let mut batch = WriteBatch::new();
        batch.delete(b"a".to_vec());
        storage.apply(batch).unwrap();
        assert_eq!(storage.get(b"a").unwrap(), None);
    }

    #[test]
    fn test_clones_share_data() {
        let storage = MemoryStorage::new();
        let other = storage.clone();

        let mut batch = WriteBatch::new();
        batch.put(b"shared".to_vec(), b"yes".to_vec());
        other.apply(batch).unwrap();

        assert!(storage.contains(b"shared").unwrap());
    }

    #[test]
    fn test_apply_if_absent_writes_once() {
        let storage = MemoryStorage::new();

        let mut first = WriteBatch::new();
        first.put(b"block-a".to_vec(), b"a".to_vec());
        first.put(b"lh".to_vec(), b"block-a".to_vec());
        assert!(storage.apply_if_absent(b"lh", first).unwrap());

        let mut second = WriteBatch::new();
        second.put(b"block-b".to_vec(), b"b".to_vec());
        second.put(b"lh".to_vec(), b"block-b".to_vec());
        assert!(!storage.apply_if_absent(b"lh", second).unwrap());

        assert_eq!(storage.len().unwrap(), 2);
        assert_eq!(storage.get(b"lh").unwrap(), Some(b"block-a".to_vec()));
    }
}
