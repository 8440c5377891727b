//! Storage layer for the blockchain.
//!
//! The ledger consumes an ordered byte-string store with atomic multi-key
//! writes. [`PersistentStorage`] backs it with the `sled` embedded database;
//! [`MemoryStorage`] keeps everything in process for tests and throwaway
//! ledgers.

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStorage;
pub use sled_store::PersistentStorage;

use crate::error::Result;

/// Storage keys with a fixed meaning
pub mod keys {
    /// Key holding the hash of the most recently appended block
    pub const TIP: &[u8] = b"lh";
}

/// A single write inside a [`WriteBatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Set `key` to `value`
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Remove `key`
    Delete { key: Vec<u8> },
}

/// Group of writes applied all-or-nothing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a put
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(WriteOp::Put {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Queue a delete
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(WriteOp::Delete { key: key.into() });
        self
    }

    /// Queued writes in insertion order
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Transactional key-value store contract
///
/// Readers never observe a partially applied batch.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Apply every write in `batch` atomically
    fn apply(&self, batch: WriteBatch) -> Result<()>;

    /// Apply `batch` atomically only if `key` is absent
    ///
    /// The check and the writes form one step. Returns `false`, writing
    /// nothing, when `key` already exists.
    fn apply_if_absent(&self, key: &[u8], batch: WriteBatch) -> Result<bool>;

    /// Make previously applied batches durable
    fn flush(&self) -> Result<()>;

    /// Check whether `key` is present
    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}
