//! Block data structures.
//!
//! A block is an ordered list of transactions linked to its predecessor by
//! hash and sealed with a proof-of-work nonce.

use crate::core::Transaction;
use crate::crypto::{CancelToken, Hash256, HashBuilder, ProofOfWork};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Memo carried by the genesis coinbase transaction
pub const GENESIS_MEMO: &str = "First Transaction from Genesis";

/// Complete block structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Proof-of-work digest, also the block's storage key
    pub hash: Hash256,
    /// Transactions in this block
    pub transactions: Vec<Transaction>,
    /// Hash of the previous block, `None` for genesis
    pub prev_hash: Option<Hash256>,
    /// Nonce found by the miner
    pub nonce: u64,
}

impl Block {
    /// Build and mine a block on top of `prev_hash`
    pub fn create(
        transactions: Vec<Transaction>,
        prev_hash: Option<Hash256>,
        pow: &ProofOfWork,
        cancel: &CancelToken,
    ) -> Result<Self> {
        let digest = Self::digest_of(&transactions);
        let mined = pow.mine(prev_hash.as_ref(), &digest, cancel)?;

        debug!(
            hash = %mined.hash,
            nonce = mined.nonce,
            attempts = mined.attempts,
            seconds = mined.duration_seconds,
            "block mined"
        );

        Ok(Self {
            hash: mined.hash,
            transactions,
            prev_hash,
            nonce: mined.nonce,
        })
    }

    /// Build and mine the first block of a chain
    pub fn genesis(coinbase: Transaction, pow: &ProofOfWork, cancel: &CancelToken) -> Result<Self> {
        Self::create(vec![coinbase], None, pow, cancel)
    }

    /// Check if this is the genesis block
    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_none()
    }

    /// SHA-256 over the concatenated transaction ids
    pub fn transactions_digest(&self) -> Hash256 {
        Self::digest_of(&self.transactions)
    }

    fn digest_of(transactions: &[Transaction]) -> Hash256 {
        let mut builder = HashBuilder::new();
        for tx in transactions {
            builder.update_hash(&tx.id);
        }
        builder.finalize()
    }

    /// Encode the block for storage
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a block read back from storage
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TransactionInput, TransactionOutput};
    use crate::crypto::{hash_data, AddressLocker};
    use crate::error::LedgerError;

    fn test_pow() -> ProofOfWork {
        ProofOfWork::new(8)
    }

    fn coinbase(to: &str) -> Transaction {
        Transaction::coinbase(to, "", 100, &AddressLocker)
    }

    #[test]
    fn test_genesis_block() {
        let pow = test_pow();
        let block = Block::genesis(coinbase("alice"), &pow, &CancelToken::new()).unwrap();

        assert!(block.is_genesis());
        assert_eq!(block.transactions.len(), 1);
        assert!(pow.validate(&block));
    }

    #[test]
    fn test_transactions_digest() {
        let a = coinbase("alice");
        let b = coinbase("bob");
        let block = Block {
            hash: hash_data(b""),
            transactions: vec![a.clone(), b.clone()],
            prev_hash: None,
            nonce: 0,
        };

        let mut joined = a.id.as_slice().to_vec();
        joined.extend_from_slice(b.id.as_slice());
        assert_eq!(block.transactions_digest(), hash_data(&joined));
    }

    #[test]
    fn test_empty_block_digest() {
        let pow = test_pow();
        let block = Block::create(Vec::new(), Some(hash_data(b"tip")), &pow, &CancelToken::new())
            .unwrap();

        assert_eq!(block.transactions_digest(), hash_data(b""));
        assert!(pow.validate(&block));
    }

    #[test]
    fn test_block_serialization_round_trip() {
        let pow = test_pow();
        let funding = coinbase("alice");
        let spend = Transaction::new(
            vec![TransactionInput::new(funding.id.clone(), 0, "alice".to_string())],
            vec![
                TransactionOutput::new(40, "bob".to_string()),
                TransactionOutput::new(60, "alice".to_string()),
            ],
        );
        let block = Block::create(
            vec![funding, spend],
            Some(hash_data(b"prev")),
            &pow,
            &CancelToken::new(),
        )
        .unwrap();

        let bytes = block.serialize().unwrap();
        let decoded = Block::deserialize(&bytes).unwrap();
        assert_eq!(block, decoded);
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        let result = Block::deserialize(&[0xFF, 0x01, 0x02]);
        assert!(matches!(result, Err(LedgerError::Decode(_))));
    }

    #[test]
    fn test_tampering_breaks_validation() {
        let pow = test_pow();
        let block = Block::genesis(coinbase("alice"), &pow, &CancelToken::new()).unwrap();

        let mut bumped = block.clone();
        bumped.nonce += 1;
        assert!(!pow.validate(&bumped));

        let mut rewritten = block.clone();
        rewritten.transactions = vec![coinbase("mallory")];
        assert!(!pow.validate(&rewritten));
    }
}
