//! Incremental hashing over a sequence of byte pieces.

use crate::crypto::Hash256;
use sha2::{Digest, Sha256};

/// Hash builder for incremental hashing
pub struct HashBuilder {
    hasher: Sha256,
}

impl HashBuilder {
    /// Create a new hash builder
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    /// Add raw bytes to the hash
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.hasher.update(data);
        self
    }

    /// Add a hash to the hash
    pub fn update_hash(&mut self, hash: &Hash256) -> &mut Self {
        self.update(hash.as_slice())
    }

    /// Finalize the hash and return the result
    pub fn finalize(&mut self) -> Hash256 {
        let hasher = std::mem::take(&mut self.hasher);
        Hash256::new(hasher.finalize().into())
    }
}

impl Default for HashBuilder {
    fn default() -> Self {
        Self::new()
    }
}
