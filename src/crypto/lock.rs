//! Ownership locks for transaction outputs.
//!
//! Outputs carry a lock token and inputs carry an unlock proof. The ledger
//! never interprets either one itself; it asks a [`Locker`]. The default
//! [`AddressLocker`] compares plain address strings, which is a stand-in
//! for real public-key locks and signatures.

use std::fmt;

/// Capability deciding who owns an output and who spent it
pub trait Locker: Send + Sync + fmt::Debug {
    /// Lock token placed on an output paid to `address`
    fn lock(&self, address: &str) -> String;

    /// Unlock proof placed on an input spent by `address`
    fn proof(&self, address: &str) -> String;

    /// Whether `proof` opens an output locked with `lock_token`
    fn unlock(&self, proof: &str, lock_token: &str) -> bool;

    /// Whether an output locked with `lock_token` belongs to `address`
    fn owns(&self, address: &str, lock_token: &str) -> bool {
        self.unlock(&self.proof(address), lock_token)
    }

    /// Whether an input carrying `proof` was spent by `address`
    fn spent_by(&self, address: &str, proof: &str) -> bool {
        self.unlock(proof, &self.lock(address))
    }
}

/// Plain string-equality locks keyed by address
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressLocker;

impl Locker for AddressLocker {
    fn lock(&self, address: &str) -> String {
        address.to_string()
    }

    fn proof(&self, address: &str) -> String {
        address.to_string()
    }

    fn unlock(&self, proof: &str, lock_token: &str) -> bool {
        proof == lock_token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_locker_equality() {
        let locker = AddressLocker;
        let lock = locker.lock("alice");

        assert!(locker.unlock("alice", &lock));
        assert!(!locker.unlock("bob", &lock));
        assert!(locker.owns("alice", &lock));
        assert!(!locker.owns("alice", "bob"));
    }

    #[test]
    fn test_spent_by_matches_proof() {
        let locker = AddressLocker;
        let proof = locker.proof("alice");

        assert!(locker.spent_by("alice", &proof));
        assert!(!locker.spent_by("bob", &proof));
    }
}
