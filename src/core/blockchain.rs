//! Ledger store and chain traversal.
//!
//! A [`Blockchain`] is an explicit handle over one key-value store. Blocks are
//! stored under their own hash and the key `lh` points at the tip. Appending
//! a block and moving the tip happen in one atomic batch, and concurrent
//! appends on the same handle are serialized.

use crate::config::LedgerConfig;
use crate::core::{Block, Transaction, GENESIS_MEMO};
use crate::crypto::{AddressLocker, CancelToken, Hash256, Locker, ProofOfWork};
use crate::error::{LedgerError, Result, StorageError};
use crate::storage::{keys, KeyValueStore, WriteBatch};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Handle over a persisted chain
pub struct Blockchain<S: KeyValueStore> {
    store: S,
    pow: ProofOfWork,
    mining_reward: u64,
    locker: Arc<dyn Locker>,
    /// Held across read-tip, mine and write
    append_lock: Mutex<()>,
}

impl<S: KeyValueStore> fmt::Debug for Blockchain<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blockchain")
            .field("difficulty", &self.pow.difficulty())
            .field("mining_reward", &self.mining_reward)
            .field("locker", &self.locker)
            .finish()
    }
}

impl<S: KeyValueStore> Blockchain<S> {
    /// Create a new chain whose genesis block rewards `identity`
    ///
    /// Fails with `AlreadyExists` if the store already holds a chain.
    pub fn create(store: S, identity: &str, config: &LedgerConfig) -> Result<Self> {
        Self::create_with_locker(store, identity, config, Arc::new(AddressLocker))
    }

    /// Create a new chain using a custom ownership locker
    pub fn create_with_locker(
        store: S,
        identity: &str,
        config: &LedgerConfig,
        locker: Arc<dyn Locker>,
    ) -> Result<Self> {
        if let Some(tip) = store.get(keys::TIP)? {
            return Err(LedgerError::AlreadyExists(format!(
                "tip {}",
                hex::encode(tip)
            )));
        }

        let chain = Self::with_parts(store, config, locker);
        let coinbase = Transaction::coinbase(
            identity,
            GENESIS_MEMO,
            chain.mining_reward,
            chain.locker.as_ref(),
        );
        let genesis = Block::genesis(coinbase, &chain.pow, &CancelToken::new())?;

        // Another creator may have written a genesis while this one was mining
        if !chain.store.apply_if_absent(keys::TIP, Self::block_batch(&genesis)?)? {
            warn!(hash = %genesis.hash, "lost genesis race, discarding block");
            return Err(LedgerError::AlreadyExists(
                "chain created concurrently".to_string(),
            ));
        }

        info!(hash = %genesis.hash, identity, "created genesis block");
        Ok(chain)
    }

    /// Open an existing chain
    ///
    /// Fails with `NotFound` if the store holds no chain.
    pub fn resume(store: S, config: &LedgerConfig) -> Result<Self> {
        Self::resume_with_locker(store, config, Arc::new(AddressLocker))
    }

    /// Open an existing chain using a custom ownership locker
    pub fn resume_with_locker(
        store: S,
        config: &LedgerConfig,
        locker: Arc<dyn Locker>,
    ) -> Result<Self> {
        let chain = Self::with_parts(store, config, locker);
        let tip = chain.tip()?;
        info!(tip = %tip, "resumed blockchain");
        Ok(chain)
    }

    fn with_parts(store: S, config: &LedgerConfig, locker: Arc<dyn Locker>) -> Self {
        Self {
            store,
            pow: ProofOfWork::new(config.difficulty),
            mining_reward: config.mining_reward,
            locker,
            append_lock: Mutex::new(()),
        }
    }

    /// Hash of the most recently appended block
    pub fn tip(&self) -> Result<Hash256> {
        match self.store.get(keys::TIP)? {
            Some(bytes) => Hash256::from_slice(&bytes),
            None => Err(LedgerError::NotFound("no tip pointer in storage".to_string())),
        }
    }

    /// Mine a block holding `transactions` on top of the tip and persist it
    pub fn append(&self, transactions: Vec<Transaction>) -> Result<Block> {
        self.append_with_cancel(transactions, &CancelToken::new())
    }

    /// Like [`Blockchain::append`], abandoning the search once `cancel` fires
    ///
    /// A cancelled append leaves storage and tip untouched.
    pub fn append_with_cancel(
        &self,
        transactions: Vec<Transaction>,
        cancel: &CancelToken,
    ) -> Result<Block> {
        let _guard = self
            .append_lock
            .lock()
            .map_err(|_| StorageError::Poisoned)?;

        let tip = self.tip()?;
        let block = Block::create(transactions, Some(tip), &self.pow, cancel)?;
        self.write_block(&block)?;

        info!(
            hash = %block.hash,
            transactions = block.transactions.len(),
            nonce = block.nonce,
            "appended block"
        );
        Ok(block)
    }

    /// Store `block` and point the tip at it in one batch
    fn write_block(&self, block: &Block) -> Result<()> {
        self.store.apply(Self::block_batch(block)?)
    }

    fn block_batch(block: &Block) -> Result<WriteBatch> {
        let mut batch = WriteBatch::new();
        batch.put(block.hash.as_slice(), block.serialize()?);
        batch.put(keys::TIP, block.hash.as_slice());
        Ok(batch)
    }

    /// Walk the chain from the current tip back to genesis
    ///
    /// The tip is read once, so a concurrent append is not observed.
    pub fn iter(&self) -> Result<ChainIterator<'_, S>> {
        let tip = self.tip()?;
        Ok(ChainIterator {
            store: &self.store,
            next_hash: Some(tip),
        })
    }

    /// Collect every block from tip to genesis
    pub fn blocks(&self) -> Result<Vec<Block>> {
        self.iter()?.collect()
    }

    /// Number of blocks in the chain
    pub fn height(&self) -> Result<u64> {
        let mut height = 0u64;
        for block in self.iter()? {
            block?;
            height += 1;
        }
        Ok(height)
    }

    /// Find a transaction by id
    pub fn find_transaction(&self, id: &Hash256) -> Result<Option<Transaction>> {
        for block in self.iter()? {
            if let Some(tx) = block?.transactions.into_iter().find(|tx| &tx.id == id) {
                return Ok(Some(tx));
            }
        }
        Ok(None)
    }

    /// Audit every block from tip to genesis
    ///
    /// Checks the storage key, the transaction ids and the proof of work.
    ///
    /// Returns the number of blocks checked.
    pub fn verify_chain(&self) -> Result<u64> {
        let mut expected = Some(self.tip()?);
        let mut checked = 0u64;

        for block in self.iter()? {
            let block = block?;

            if expected.as_ref() != Some(&block.hash) {
                warn!(hash = %block.hash, "block stored under a foreign key");
                return Err(LedgerError::InvalidBlock {
                    hash: block.hash.to_hex(),
                    reason: "stored under a different key".to_string(),
                });
            }

            if let Some(tx) = block.transactions.iter().find(|tx| tx.id != tx.hash()) {
                warn!(hash = %block.hash, tx = %tx.id, "transaction id does not match contents");
                return Err(LedgerError::InvalidBlock {
                    hash: block.hash.to_hex(),
                    reason: format!("transaction {} does not match its id", tx.id),
                });
            }

            if !self.pow.validate(&block) {
                warn!(hash = %block.hash, "proof of work does not validate");
                return Err(LedgerError::InvalidBlock {
                    hash: block.hash.to_hex(),
                    reason: "proof of work does not validate".to_string(),
                });
            }

            expected = block.prev_hash.clone();
            checked += 1;
        }

        debug!(blocks = checked, "chain verified");
        Ok(checked)
    }

    /// Whether `block` satisfies this chain's proof-of-work rule
    pub fn validate_block(&self, block: &Block) -> bool {
        self.pow.validate(block)
    }

    pub fn mining_reward(&self) -> u64 {
        self.mining_reward
    }

    /// Ownership locker used for outputs and spends
    pub fn locker(&self) -> &dyn Locker {
        self.locker.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: KeyValueStore + 'static> Blockchain<S> {
    /// Run [`Blockchain::append`] on a worker thread
    pub fn append_in_background(self: &Arc<Self>, transactions: Vec<Transaction>) -> MiningTask {
        let chain = Arc::clone(self);
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let handle = thread::spawn(move || chain.append_with_cancel(transactions, &token));
        MiningTask { cancel, handle }
    }
}

/// In-flight background append
#[derive(Debug)]
pub struct MiningTask {
    cancel: CancelToken,
    handle: JoinHandle<Result<Block>>,
}

impl MiningTask {
    /// Ask the worker to abandon its search
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the worker is done and return the appended block
    pub fn wait(self) -> Result<Block> {
        self.handle
            .join()
            .map_err(|_| LedgerError::WorkerPanicked)?
    }
}

/// Backward cursor over a chain, tip first
pub struct ChainIterator<'a, S: KeyValueStore> {
    store: &'a S,
    next_hash: Option<Hash256>,
}

impl<'a, S: KeyValueStore> ChainIterator<'a, S> {
    fn load(&self, hash: &Hash256) -> Result<Block> {
        match self.store.get(hash.as_slice())? {
            Some(bytes) => Block::deserialize(&bytes),
            None => Err(LedgerError::InvalidBlock {
                hash: hash.to_hex(),
                reason: "missing from storage".to_string(),
            }),
        }
    }
}

impl<'a, S: KeyValueStore> Iterator for ChainIterator<'a, S> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next_hash.take()?;
        match self.load(&hash) {
            Ok(block) => {
                self.next_hash = block.prev_hash.clone();
                Some(Ok(block))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
