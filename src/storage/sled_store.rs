//! Durable store backed by the `sled` embedded database.

use crate::error::{LedgerError, Result, StorageError};
use crate::storage::{KeyValueStore, WriteBatch, WriteOp};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Db;
use std::path::Path;
use tracing::debug;

/// Persistent storage implementation
#[derive(Debug, Clone)]
pub struct PersistentStorage {
    db: Db,
}

impl PersistentStorage {
    /// Open or create a database at `db_path`
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let db = sled::open(db_path).map_err(StorageError::from)?;
        debug!(path = %db_path.display(), "opened sled database");
        Ok(Self { db })
    }

    /// Open a database that must already exist at `db_path`
    ///
    /// Fails with `NotFound` and creates nothing when the directory is missing.
    pub fn open_existing<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if !db_path.is_dir() {
            return Err(LedgerError::NotFound(format!(
                "no database at {}",
                db_path.display()
            )));
        }
        Self::new(db_path)
    }
}

impl KeyValueStore for PersistentStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self.db.get(key).map_err(StorageError::from)?;
        Ok(value.map(|ivec| ivec.to_vec()))
    }

    fn apply(&self, batch: WriteBatch) -> Result<()> {
        let mut sled_batch = sled::Batch::default();
        for op in batch.ops() {
            match op {
                WriteOp::Put { key, value } => sled_batch.insert(key.as_slice(), value.as_slice()),
                WriteOp::Delete { key } => sled_batch.remove(key.as_slice()),
            }
        }

        self.db.apply_batch(sled_batch).map_err(StorageError::from)?;
        self.flush()
    }

    fn apply_if_absent(&self, key: &[u8], batch: WriteBatch) -> Result<bool> {
        let outcome = self.db.transaction(|tx| {
            if tx.get(key)?.is_some() {
                return Ok(false);
            }
            for op in batch.ops() {
                match op {
                    WriteOp::Put { key, value } => {
                        tx.insert(key.as_slice(), value.as_slice())?;
                    }
                    WriteOp::Delete { key } => {
                        tx.remove(key.as_slice())?;
                    }
                }
            }
            Ok::<bool, ConflictableTransactionError<()>>(true)
        });

        let applied = match outcome {
            Ok(applied) => applied,
            Err(TransactionError::Storage(e)) => return Err(StorageError::from(e).into()),
            Err(TransactionError::Abort(())) => {
                return Err(StorageError::DatabaseError("transaction aborted".to_string()).into())
            }
        };

        if applied {
            self.flush()?;
        }
        Ok(applied)
    }

    fn flush(&self) -> Result<()> {
        self.db.flush().map_err(StorageError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (PersistentStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = PersistentStorage::new(temp_dir.path()).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_missing_key() {
        let (storage, _temp_dir) = create_test_storage();
        assert_eq!(storage.get(b"absent").unwrap(), None);
        assert!(!storage.contains(b"absent").unwrap());
    }

    #[test]
    fn test_batch_applies_all_writes() {
        let (storage, _temp_dir) = create_test_storage();

        let mut batch = WriteBatch::new();
        batch.put(b"block".to_vec(), b"bytes".to_vec());
        batch.put(b"lh".to_vec(), b"block".to_vec());
        storage.apply(batch).unwrap();

        assert_eq!(storage.get(b"block").unwrap(), Some(b"bytes".to_vec()));
        assert_eq!(storage.get(b"lh").unwrap(), Some(b"block".to_vec()));

        let mut removal = WriteBatch::new();
        removal.delete(b"block".to_vec());
        storage.apply(removal).unwrap();
        assert!(!storage.contains(b"block").unwrap());
    }

    #[test]
    fn test_apply_if_absent() {
        let (storage, _temp_dir) = create_test_storage();

        let mut first = WriteBatch::new();
        first.put(b"genesis-a".to_vec(), b"a".to_vec());
        first.put(b"lh".to_vec(), b"genesis-a".to_vec());
        assert!(storage.apply_if_absent(b"lh", first).unwrap());

        let mut second = WriteBatch::new();
        second.put(b"genesis-b".to_vec(), b"b".to_vec());
        second.put(b"lh".to_vec(), b"genesis-b".to_vec());
        assert!(!storage.apply_if_absent(b"lh", second).unwrap());

        assert_eq!(storage.get(b"lh").unwrap(), Some(b"genesis-a".to_vec()));
        assert!(!storage.contains(b"genesis-b").unwrap());
    }

    #[test]
    fn test_data_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let storage = PersistentStorage::new(temp_dir.path()).unwrap();
            let mut batch = WriteBatch::new();
            batch.put(b"key".to_vec(), b"value".to_vec());
            storage.apply(batch).unwrap();
        }

        let reopened = PersistentStorage::open_existing(temp_dir.path()).unwrap();
        assert_eq!(reopened.get(b"key").unwrap(), Some(b"value".to_vec()));
    }

    #[test]
    fn test_open_existing_creates_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("blocks");

        let result = PersistentStorage::open_existing(&missing);
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
        assert!(!missing.exists());
    }
}
