//! Core ledger data structures and logic.
//!
//! This module contains transactions, blocks, the ledger store and the
//! unspent output scanner.

pub mod block;
pub mod blockchain;
pub mod transaction;
pub mod utxo;

// Re-export commonly used types
pub use block::*;
pub use blockchain::*;
pub use transaction::*;
pub use utxo::*;
