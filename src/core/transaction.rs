//! Transaction data structures.
//!
//! This module defines the inputs, outputs and transactions of the ledger,
//! the coinbase reward transaction and the transfer builder.

use crate::core::UtxoSource;
use crate::crypto::{hash_data, Hash256, Locker};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Output index carried by the coinbase sentinel input
pub const COINBASE_OUTPUT_INDEX: i64 = -1;

/// Default reward paid by a coinbase transaction
pub const DEFAULT_MINING_REWARD: u64 = 100;

/// Transaction input referencing a previous output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    /// Id of the transaction holding the output being spent, `None` for coinbase
    pub source_tx: Option<Hash256>,
    /// Index of the output in the source transaction, `-1` for coinbase
    pub output_index: i64,
    /// Proof that the spender may unlock the output (coinbase: free-form memo)
    pub unlock_token: String,
}

impl TransactionInput {
    /// Create an input spending `source_tx:output_index`
    pub fn new(source_tx: Hash256, output_index: u32, unlock_token: String) -> Self {
        Self {
            source_tx: Some(source_tx),
            output_index: i64::from(output_index),
            unlock_token,
        }
    }

    /// Create the coinbase sentinel input
    pub fn coinbase(memo: String) -> Self {
        Self {
            source_tx: None,
            output_index: COINBASE_OUTPUT_INDEX,
            unlock_token: memo,
        }
    }

    /// Check if this is the coinbase sentinel
    pub fn is_coinbase(&self) -> bool {
        self.source_tx.is_none() && self.output_index == COINBASE_OUTPUT_INDEX
    }

    /// The output this input spends, if it references a real one
    pub fn spent_output(&self) -> Option<(&Hash256, u32)> {
        let source_tx = self.source_tx.as_ref()?;
        let index = u32::try_from(self.output_index).ok()?;
        Some((source_tx, index))
    }
}

/// Transaction output assigning value to a lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    /// Amount carried by this output
    pub value: u64,
    /// Lock the owner must open to spend this output
    pub lock_token: String,
}

impl TransactionOutput {
    /// Create a new transaction output
    pub fn new(value: u64, lock_token: String) -> Self {
        Self { value, lock_token }
    }
}

/// Main transaction structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Digest of the inputs and outputs
    pub id: Hash256,
    /// Transaction inputs
    pub inputs: Vec<TransactionInput>,
    /// Transaction outputs
    pub outputs: Vec<TransactionOutput>,
}

/// Canonical digest input: everything but the id, in field order
#[derive(Serialize)]
struct TransactionContent<'a> {
    inputs: &'a [TransactionInput],
    outputs: &'a [TransactionOutput],
}

impl Transaction {
    /// Create a transaction and compute its id
    pub fn new(inputs: Vec<TransactionInput>, outputs: Vec<TransactionOutput>) -> Self {
        let id = Self::compute_id(&inputs, &outputs);
        Self {
            id,
            inputs,
            outputs,
        }
    }

    /// Create a coinbase transaction paying `reward` to `recipient`
    ///
    /// An empty memo becomes `Reward to '<recipient>'`.
    pub fn coinbase(recipient: &str, memo: &str, reward: u64, locker: &dyn Locker) -> Self {
        let memo = if memo.is_empty() {
            format!("Reward to '{}'", recipient)
        } else {
            memo.to_string()
        };

        let input = TransactionInput::coinbase(memo);
        let output = TransactionOutput::new(reward, locker.lock(recipient));
        Self::new(vec![input], vec![output])
    }

    /// Build a transfer of `amount` from `from` to `to`
    ///
    /// Spends the outputs selected by `source` and returns any surplus to
    /// `from` as a change output.
    pub fn transfer<U: UtxoSource + ?Sized>(
        from: &str,
        to: &str,
        amount: u64,
        source: &U,
    ) -> Result<Self> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount(
                "transfer amount must be positive".to_string(),
            ));
        }

        let spendable = source.spendable_outputs(from, amount)?;
        if spendable.accumulated < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: spendable.accumulated,
            });
        }

        let locker = source.locker();
        let proof = locker.proof(from);

        let mut inputs = Vec::new();
        for (tx_id, indices) in &spendable.outputs {
            let source_tx = Hash256::from_hex(tx_id)?;
            for &index in indices {
                inputs.push(TransactionInput::new(source_tx.clone(), index, proof.clone()));
            }
        }

        let mut outputs = vec![TransactionOutput::new(amount, locker.lock(to))];
        if spendable.accumulated > amount {
            outputs.push(TransactionOutput::new(
                spendable.accumulated - amount,
                locker.lock(from),
            ));
        }

        let tx = Self::new(inputs, outputs);
        debug!(
            id = %tx.id,
            from,
            to,
            amount,
            inputs = tx.inputs.len(),
            "built transfer"
        );
        Ok(tx)
    }

    /// Get the transaction hash
    ///
    /// The id field never takes part in its own digest.
    pub fn hash(&self) -> Hash256 {
        Self::compute_id(&self.inputs, &self.outputs)
    }

    fn compute_id(inputs: &[TransactionInput], outputs: &[TransactionOutput]) -> Hash256 {
        let content = TransactionContent { inputs, outputs };
        // Encoding plain structs into a Vec has no failure path
        let serialized = bincode::serialize(&content).unwrap_or_default();
        hash_data(&serialized)
    }

    /// Check if this is a coinbase transaction
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }
}
