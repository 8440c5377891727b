//! Error types for the ledger engine.
//!
//! Every failure is surfaced to the caller; nothing is retried internally.

use thiserror::Error;

// Core error type
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("Blockchain already exists: {0}")]
    AlreadyExists(String),
    #[error("No existing blockchain found: {0}")]
    NotFound(String),
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Value overflow: {0}")]
    ValueOverflow(String),
    #[error("Decode failure: {0}")]
    Decode(String),
    #[error("Invalid block {hash}: {reason}")]
    InvalidBlock { hash: String, reason: String },
    #[error("Mining cancelled")]
    MiningCancelled,
    #[error("Nonce space exhausted without meeting the target")]
    NonceSpaceExhausted,
    #[error("Mining worker panicked")]
    WorkerPanicked,
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration field: {field}")]
    InvalidConfig { field: String },
    #[error("Value {value} for {field} out of range {range}")]
    ValueOutOfRange {
        field: String,
        value: String,
        range: String,
    },
    #[error("Failed to read configuration file: {0}")]
    Read(String),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::DatabaseError(err.to_string())
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Storage(err.into())
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(err: bincode::Error) -> Self {
        LedgerError::Decode(err.to_string())
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_message() {
        let err = LedgerError::InsufficientFunds {
            required: 1000,
            available: 60,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds: required 1000, available 60"
        );
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: LedgerError = StorageError::DatabaseError("disk full".to_string()).into();
        assert!(matches!(err, LedgerError::Storage(_)));
        assert_eq!(err.to_string(), "Storage failure: Database error: disk full");
    }

    #[test]
    fn test_config_error_conversion() {
        let err: LedgerError = ConfigError::InvalidConfig {
            field: "difficulty".to_string(),
        }
        .into();
        assert!(matches!(err, LedgerError::Config(_)));
    }
}
