//! Utility functions for the ledger binary and library users.

use crate::config::LoggingConfig;
use crate::crypto::Hash256;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false`
/// if a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.tracing_level().as_str().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.format.as_str() {
        "pretty" => builder.pretty().try_init(),
        "full" => builder.try_init(),
        _ => builder.compact().try_init(),
    };
    installed.is_ok()
}

/// Format a hash as a hex string
pub fn format_hash(hash: &Hash256, prefix: bool) -> String {
    let hex = hash.to_hex();
    if prefix {
        format!("0x{}", hex)
    } else {
        hex
    }
}

/// Format an optional hash, empty for a missing one
pub fn format_opt_hash(hash: Option<&Hash256>) -> String {
    hash.map(Hash256::to_hex).unwrap_or_default()
}
