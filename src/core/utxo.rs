//! Unspent output scanning.
//!
//! Every query performs one full backward walk of the chain; nothing is
//! cached. Blocks are visited tip first and, inside a block, transactions,
//! outputs and inputs in stored order, so results are reproducible for a
//! given chain.

use crate::core::{Blockchain, Transaction, TransactionOutput};
use crate::crypto::{Hash256, Locker};
use crate::error::{LedgerError, Result};
use crate::storage::KeyValueStore;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// A transaction holding at least one unspent output for an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentTransaction {
    pub transaction: Transaction,
    /// Indices of the outputs still unspent for the queried address
    pub unspent_outputs: Vec<u32>,
}

impl UnspentTransaction {
    /// The unspent outputs with their indices
    pub fn outputs(&self) -> impl Iterator<Item = (u32, &TransactionOutput)> + '_ {
        self.unspent_outputs.iter().filter_map(move |&index| {
            self.transaction
                .outputs
                .get(index as usize)
                .map(|output| (index, output))
        })
    }
}

/// Outputs picked to fund a transfer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpendableOutputs {
    /// Total value of the selected outputs
    pub accumulated: u64,
    /// Selected output indices keyed by hex transaction id
    pub outputs: BTreeMap<String, Vec<u32>>,
}

/// Anything able to fund a transfer
pub trait UtxoSource {
    /// Greedily select unspent outputs of `address` worth at least `amount`
    fn spendable_outputs(&self, address: &str, amount: u64) -> Result<SpendableOutputs>;

    /// Locker deciding ownership of the selected outputs
    fn locker(&self) -> &dyn Locker;
}

impl<S: KeyValueStore> Blockchain<S> {
    /// Transactions holding unspent outputs locked to `address`
    pub fn find_unspent_transactions(&self, address: &str) -> Result<Vec<UnspentTransaction>> {
        let locker = self.locker();
        let mut spent: HashMap<Hash256, HashSet<u32>> = HashMap::new();
        let mut unspent = Vec::new();

        for block in self.iter()? {
            for tx in block?.transactions {
                let spent_here = spent.get(&tx.id);
                let unspent_outputs: Vec<u32> = (0u32..)
                    .zip(tx.outputs.iter())
                    .filter(|(index, output)| {
                        let already_spent = spent_here.map_or(false, |set| set.contains(index));
                        !already_spent && locker.owns(address, &output.lock_token)
                    })
                    .map(|(index, _)| index)
                    .collect();

                if !tx.is_coinbase() {
                    for input in &tx.inputs {
                        if !locker.spent_by(address, &input.unlock_token) {
                            continue;
                        }
                        if let Some((source_tx, index)) = input.spent_output() {
                            spent.entry(source_tx.clone()).or_default().insert(index);
                        }
                    }
                }

                if !unspent_outputs.is_empty() {
                    unspent.push(UnspentTransaction {
                        transaction: tx,
                        unspent_outputs,
                    });
                }
            }
        }

        debug!(address, transactions = unspent.len(), "scanned unspent transactions");
        Ok(unspent)
    }

    /// Unspent outputs locked to `address`
    pub fn find_utxo(&self, address: &str) -> Result<Vec<TransactionOutput>> {
        let unspent = self.find_unspent_transactions(address)?;
        Ok(unspent
            .iter()
            .flat_map(|utx| utx.outputs().map(|(_, output)| output.clone()))
            .collect())
    }

    /// Total unspent value locked to `address`
    pub fn balance(&self, address: &str) -> Result<u64> {
        self.find_utxo(address)?
            .iter()
            .try_fold(0u64, |total, output| {
                total.checked_add(output.value).ok_or_else(|| {
                    LedgerError::ValueOverflow(format!("balance of {}", address))
                })
            })
    }

    /// Select outputs of `address` in scan order until `amount` is covered
    ///
    /// When the whole unspent set falls short, the partial selection is
    /// returned with `accumulated < amount`.
    pub fn find_spendable_outputs(&self, address: &str, amount: u64) -> Result<SpendableOutputs> {
        let mut selection = SpendableOutputs::default();

        'scan: for utx in self.find_unspent_transactions(address)? {
            let tx_id = utx.transaction.id.to_hex();
            for (index, output) in utx.outputs() {
                if selection.accumulated >= amount {
                    break 'scan;
                }
                selection.accumulated = selection
                    .accumulated
                    .checked_add(output.value)
                    .ok_or_else(|| {
                        LedgerError::ValueOverflow(format!("spendable outputs of {}", address))
                    })?;
                selection
                    .outputs
                    .entry(tx_id.clone())
                    .or_default()
                    .push(index);
            }
        }

        debug!(
            address,
            amount,
            accumulated = selection.accumulated,
            "selected spendable outputs"
        );
        Ok(selection)
    }
}

impl<S: KeyValueStore> UtxoSource for Blockchain<S> {
    fn spendable_outputs(&self, address: &str, amount: u64) -> Result<SpendableOutputs> {
        self.find_spendable_outputs(address, amount)
    }

    fn locker(&self) -> &dyn Locker {
        Blockchain::locker(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::storage::MemoryStorage;

    fn create_test_chain(identity: &str) -> Blockchain<MemoryStorage> {
        let config = LedgerConfig {
            difficulty: 8,
            mining_reward: 100,
        };
        Blockchain::create(MemoryStorage::new(), identity, &config).unwrap()
    }

    fn send(chain: &Blockchain<MemoryStorage>, from: &str, to: &str, amount: u64) {
        let tx = Transaction::transfer(from, to, amount, chain).unwrap();
        chain.append(vec![tx]).unwrap();
    }

    #[test]
    fn test_genesis_balance() {
        let chain = create_test_chain("alice");
        assert_eq!(chain.balance("alice").unwrap(), 100);
        assert_eq!(chain.balance("bob").unwrap(), 0);
    }

    #[test]
    fn test_value_overflow_is_reported() {
        let config = LedgerConfig {
            difficulty: 8,
            mining_reward: u64::MAX - 1,
        };
        let chain = Blockchain::create(MemoryStorage::new(), "alice", &config).unwrap();
        let reward = Transaction::coinbase("alice", "", 10, chain.locker());
        chain.append(vec![reward]).unwrap();

        assert!(matches!(
            chain.balance("alice"),
            Err(LedgerError::ValueOverflow(_))
        ));
        assert!(matches!(
            chain.find_spendable_outputs("alice", u64::MAX),
            Err(LedgerError::ValueOverflow(_))
        ));

        // Stops before reaching the large genesis output
        let selection = chain.find_spendable_outputs("alice", 10).unwrap();
        assert_eq!(selection.accumulated, 10);
        assert_eq!(selection.outputs.len(), 1);
    }

    #[test]
    fn test_balance_after_transfer() {
        let chain = create_test_chain("alice");
        send(&chain, "alice", "bob", 40);

        assert_eq!(chain.balance("alice").unwrap(), 60);
        assert_eq!(chain.balance("bob").unwrap(), 40);

        let unspent = chain.find_unspent_transactions("alice").unwrap();
        assert_eq!(unspent.len(), 1);
        assert_eq!(unspent[0].unspent_outputs, vec![1]);
    }

    #[test]
    fn test_spending_change() {
        let chain = create_test_chain("alice");
        send(&chain, "alice", "bob", 40);
        send(&chain, "alice", "carol", 60);
        send(&chain, "bob", "carol", 15);

        assert_eq!(chain.balance("alice").unwrap(), 0);
        assert_eq!(chain.balance("bob").unwrap(), 25);
        assert_eq!(chain.balance("carol").unwrap(), 75);
        assert!(chain.find_utxo("alice").unwrap().is_empty());
    }

    #[test]
    fn test_selection_short_circuits() {
        let chain = create_test_chain("alice");
        let reward = Transaction::coinbase("alice", "", 100, chain.locker());
        let reward_id = reward.id.to_hex();
        chain.append(vec![reward]).unwrap();

        let selection = chain.find_spendable_outputs("alice", 50).unwrap();
        assert_eq!(selection.accumulated, 100);
        assert_eq!(selection.outputs.len(), 1);
        assert_eq!(selection.outputs.get(&reward_id), Some(&vec![0]));

        let both = chain.find_spendable_outputs("alice", 150).unwrap();
        assert_eq!(both.accumulated, 200);
        assert_eq!(both.outputs.len(), 2);
    }

    #[test]
    fn test_selection_falls_short() {
        let chain = create_test_chain("alice");
        send(&chain, "alice", "bob", 40);

        let selection = chain.find_spendable_outputs("alice", 1000).unwrap();
        assert_eq!(selection.accumulated, 60);
        assert_eq!(selection.outputs.len(), 1);

        let tip = chain.tip().unwrap();
        let err = Transaction::transfer("alice", "carol", 1000, &chain).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(chain.tip().unwrap(), tip);
    }

    #[test]
    fn test_conservation() {
        let chain = create_test_chain("alice");
        send(&chain, "alice", "bob", 30);
        send(&chain, "bob", "carol", 10);
        send(&chain, "alice", "carol", 70);

        let total: u64 = ["alice", "bob", "carol"]
            .iter()
            .map(|address| chain.balance(address).unwrap())
            .sum();
        let coinbase_blocks = chain
            .blocks()
            .unwrap()
            .iter()
            .filter(|block| block.transactions.iter().any(Transaction::is_coinbase))
            .count() as u64;

        assert_eq!(total, 100 * coinbase_blocks);
    }
}
