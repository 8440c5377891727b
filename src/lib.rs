//! powledger - a proof-of-work ledger on an embedded key-value store.
//!
//! Blocks of UTXO-style transactions are mined against a fixed difficulty,
//! persisted under their hash, and linked back to a genesis block. Balances
//! and coin selection are computed by scanning the chain.

pub mod config;
pub mod core;
pub mod crypto;
pub mod error;
pub mod storage;
pub mod utils;

pub use crate::config::{Config, LedgerConfig};
pub use crate::core::{
    Block, Blockchain, ChainIterator, MiningTask, SpendableOutputs, Transaction,
    TransactionInput, TransactionOutput, UnspentTransaction, UtxoSource,
};
pub use crate::crypto::{AddressLocker, CancelToken, Hash256, Locker, ProofOfWork};
pub use crate::error::{LedgerError, Result};
pub use crate::storage::{KeyValueStore, MemoryStorage, PersistentStorage, WriteBatch};
