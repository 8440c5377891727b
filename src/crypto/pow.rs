//! Proof of Work implementation for the ledger.
//!
//! A block is admissible when the SHA-256 digest of
//! `prev_hash || transactions_digest || difficulty || nonce`, read as an
//! unsigned big-endian 256-bit integer, is strictly below `2^(256 - difficulty)`.
//! Difficulty and nonce are written as 8-byte big-endian integers.

use crate::core::Block;
use crate::crypto::{hash_data, Hash256};
use crate::error::{LedgerError, Result};
use primitive_types::U256;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Default number of leading zero bits demanded of a block digest
pub const DEFAULT_DIFFICULTY: u32 = 18;

/// Attempts between two progress reports
const PROGRESS_INTERVAL: u64 = 100_000;

/// Shared flag used to abandon an in-flight mining search
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that has not been cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Result of a successful mining search
#[derive(Debug, Clone)]
pub struct MiningResult {
    /// The winning nonce
    pub nonce: u64,
    /// The digest produced by the winning nonce
    pub hash: Hash256,
    /// Total attempts made
    pub attempts: u64,
    /// Time taken in seconds
    pub duration_seconds: f64,
    /// Average hash rate
    pub hash_rate: f64,
}

/// Proof-of-work rule for a fixed difficulty
#[derive(Debug, Clone)]
pub struct ProofOfWork {
    difficulty: u32,
    target: U256,
}

impl ProofOfWork {
    /// Create the rule for `difficulty`
    pub fn new(difficulty: u32) -> Self {
        Self {
            difficulty,
            target: calculate_target(difficulty),
        }
    }

    /// Difficulty this rule was built for
    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Exclusive upper bound for admissible digests
    pub fn target(&self) -> &U256 {
        &self.target
    }

    /// Bytes fed to SHA-256 for one candidate nonce
    pub fn candidate_input(
        &self,
        prev_hash: Option<&Hash256>,
        transactions_digest: &Hash256,
        nonce: u64,
    ) -> Vec<u8> {
        let mut data = Vec::with_capacity(32 + 32 + 8 + 8);
        if let Some(prev_hash) = prev_hash {
            data.extend_from_slice(prev_hash.as_slice());
        }
        data.extend_from_slice(transactions_digest.as_slice());
        data.extend_from_slice(&i64::from(self.difficulty).to_be_bytes());
        data.extend_from_slice(&nonce.to_be_bytes());
        data
    }

    /// Digest of one candidate nonce
    pub fn candidate_hash(
        &self,
        prev_hash: Option<&Hash256>,
        transactions_digest: &Hash256,
        nonce: u64,
    ) -> Hash256 {
        hash_data(&self.candidate_input(prev_hash, transactions_digest, nonce))
    }

    /// Search nonces from zero upwards until a digest falls below the target
    pub fn mine(
        &self,
        prev_hash: Option<&Hash256>,
        transactions_digest: &Hash256,
        cancel: &CancelToken,
    ) -> Result<MiningResult> {
        let start_time = Instant::now();
        let mut attempts = 0u64;
        let mut nonce = 0u64;

        // Only the trailing nonce bytes change between attempts
        let mut input = self.candidate_input(prev_hash, transactions_digest, nonce);
        let nonce_at = input.len() - 8;

        loop {
            if cancel.is_cancelled() {
                warn!(attempts, "mining cancelled");
                return Err(LedgerError::MiningCancelled);
            }

            input[nonce_at..].copy_from_slice(&nonce.to_be_bytes());
            let hash = hash_data(&input);
            attempts += 1;

            if hash_meets_target(&hash, &self.target) {
                let duration_seconds = start_time.elapsed().as_secs_f64();
                return Ok(MiningResult {
                    nonce,
                    hash,
                    attempts,
                    duration_seconds,
                    hash_rate: rate(attempts, duration_seconds),
                });
            }

            if attempts % PROGRESS_INTERVAL == 0 {
                let elapsed = start_time.elapsed().as_secs_f64();
                debug!(
                    attempts,
                    nonce,
                    hash_rate = rate(attempts, elapsed),
                    expected = calculate_expected_attempts(self.difficulty),
                    "mining in progress"
                );
            }

            nonce = match nonce.checked_add(1) {
                Some(next) => next,
                None => return Err(LedgerError::NonceSpaceExhausted),
            };
        }
    }

    /// Recompute a block's digest from its stored nonce and check it
    ///
    /// The digest must be below the target and equal to the stored hash.
    pub fn validate(&self, block: &Block) -> bool {
        let hash = self.candidate_hash(
            block.prev_hash.as_ref(),
            &block.transactions_digest(),
            block.nonce,
        );
        hash_meets_target(&hash, &self.target) && hash == block.hash
    }
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self::new(DEFAULT_DIFFICULTY)
    }
}

/// Calculate the target value `2^(256 - difficulty)` for a given difficulty
///
/// Difficulty 0 would need 2^256, so it saturates to the largest value.
pub fn calculate_target(difficulty: u32) -> U256 {
    if difficulty == 0 {
        return U256::MAX;
    }
    let shift = 256u32.saturating_sub(difficulty);
    U256::one() << shift as usize
}

/// Interpret a digest as an unsigned big-endian integer
pub fn hash_to_u256(hash: &Hash256) -> U256 {
    U256::from_big_endian(hash.as_slice())
}

/// Check if a hash is strictly below the target
pub fn hash_meets_target(hash: &Hash256, target: &U256) -> bool {
    hash_to_u256(hash) < *target
}

/// Calculate expected number of attempts for a given difficulty
pub fn calculate_expected_attempts(difficulty: u32) -> u64 {
    1u64.checked_shl(difficulty).unwrap_or(u64::MAX)
}

fn rate(attempts: u64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        attempts as f64 / seconds
    } else {
        0.0
    }
}
