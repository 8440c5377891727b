//! Configuration management for the ledger.
//!
//! Values start from defaults, may be loaded from a JSON file, and are then
//! overridden by `LEDGER_*` environment variables.

use crate::crypto::DEFAULT_DIFFICULTY;
use crate::core::DEFAULT_MINING_REWARD;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ledger protocol constants
    pub ledger: LedgerConfig,
    /// Storage configuration
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Ledger protocol constants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Leading zero bits demanded of a block digest
    pub difficulty: u32,
    /// Value paid by a coinbase transaction
    pub mining_reward: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database directory
    pub db_path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (pretty, compact, full)
    pub format: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./tmp/blocks"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Get the tracing level
    pub fn tracing_level(&self) -> Level {
        match self.level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

impl Config {
    /// Load configuration from environment variables and defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.overlay(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file, then apply environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        let mut config: Config = serde_json::from_str(&raw)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        config.overlay(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `LEDGER_*` variables found by `lookup`
    pub fn overlay<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(difficulty) = lookup("LEDGER_DIFFICULTY") {
            self.ledger.difficulty = difficulty.parse().map_err(|_| ConfigError::InvalidConfig {
                field: "difficulty".to_string(),
            })?;
        }
        if let Some(reward) = lookup("LEDGER_MINING_REWARD") {
            self.ledger.mining_reward = reward.parse().map_err(|_| ConfigError::InvalidConfig {
                field: "mining_reward".to_string(),
            })?;
        }

        if let Some(db_path) = lookup("LEDGER_DB_PATH") {
            self.storage.db_path = PathBuf::from(db_path);
        }

        if let Some(level) = lookup("LEDGER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LEDGER_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // The target 2^(256 - difficulty) must fit in 256 bits
        if self.ledger.difficulty == 0 || self.ledger.difficulty > 255 {
            return Err(ConfigError::ValueOutOfRange {
                field: "ledger.difficulty".to_string(),
                value: self.ledger.difficulty.to_string(),
                range: "1-255".to_string(),
            }
            .into());
        }

        if self.ledger.mining_reward == 0 {
            return Err(ConfigError::ValueOutOfRange {
                field: "ledger.mining_reward".to_string(),
                value: "0".to_string(),
                range: "1+".to_string(),
            }
            .into());
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::InvalidConfig {
                    field: format!("logging.level: {}", self.logging.level),
                }
                .into());
            }
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" | "full" => {}
            _ => {
                return Err(ConfigError::InvalidConfig {
                    field: format!("logging.format: {}", self.logging.format),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Get the tracing level from the logging configuration
    pub fn tracing_level(&self) -> Level {
        self.logging.tracing_level()
    }
}
