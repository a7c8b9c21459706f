// web-server/src/nonce_store.rs
//! Single-use login challenges, one live nonce per wallet address.
//!
//! `issue` is idempotent while a nonce is live: repeated challenge requests
//! for the same address get the same value back. `consume` removes the nonce
//! in the same step that reads it, so of any number of concurrent
//! verification attempts exactly one can obtain it.

use alloy_primitives::Address;
use chrono::{DateTime, Duration, Utc};
use common::PlatformError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::utils::token::generate_nonce;

/// An issued challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce {
    pub address: Address,
    pub value: String,
    pub issued_at: DateTime<Utc>,
}

impl Nonce {
    fn fresh(address: Address) -> Self {
        Self {
            address,
            value: generate_nonce(),
            issued_at: Utc::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        Utc::now().signed_duration_since(self.issued_at) >= ttl
    }
}

#[derive(Debug)]
pub struct NonceStore {
    nonces: DashMap<Address, Nonce>,
    ttl: Duration,
}

impl NonceStore {
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            nonces: DashMap::new(),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    /// Return the live nonce for `address`, or record and return a fresh one
    pub fn issue(&self, address: Address) -> Nonce {
        match self.nonces.entry(address) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_expired(self.ttl) {
                    tracing::debug!("Replacing expired nonce for {}", address);
                    entry.insert(Nonce::fresh(address));
                }
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                tracing::debug!("Issued nonce for {}", address);
                entry.insert(Nonce::fresh(address)).value().clone()
            }
        }
    }

    /// Remove and return the live nonce for `address`.
    ///
    /// The nonce is gone after this call whatever the caller does next.
    pub fn consume(&self, address: &Address) -> Result<Nonce, PlatformError> {
        let (_, nonce) = self
            .nonces
            .remove(address)
            .ok_or(PlatformError::ChallengeMissing)?;

        if nonce.is_expired(self.ttl) {
            tracing::warn!("Expired nonce presented for {}", address);
            return Err(PlatformError::ChallengeMissing);
        }

        Ok(nonce)
    }

    /// Drop a cached nonce without using it
    pub fn discard(&self, address: &Address) -> bool {
        self.nonces.remove(address).is_some()
    }

    /// Remove every expired nonce, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        // Issues may land while the sweep runs, so count removals directly
        let mut purged = 0;
        self.nonces.retain(|_, nonce| {
            let expired = nonce.is_expired(self.ttl);
            if expired {
                purged += 1;
            }
            !expired
        });
        purged
    }

    pub fn len(&self) -> usize {
        self.nonces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nonces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[test]
    fn test_issue_is_idempotent_while_live() {
        let store = NonceStore::new(300);
        let first = store.issue(addr(1));
        let second = store.issue(addr(1));

        assert_eq!(first.value, second.value);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_addresses_get_distinct_nonces() {
        let store = NonceStore::new(300);
        assert_ne!(store.issue(addr(1)).value, store.issue(addr(2)).value);
    }

    #[test]
    fn test_consume_is_single_use() {
        let store = NonceStore::new(300);
        let issued = store.issue(addr(1));

        let consumed = store.consume(&addr(1)).unwrap();
        assert_eq!(consumed.value, issued.value);
        assert_eq!(store.consume(&addr(1)), Err(PlatformError::ChallengeMissing));
    }

    #[test]
    fn test_consume_without_issue() {
        let store = NonceStore::new(300);
        assert_eq!(store.consume(&addr(9)), Err(PlatformError::ChallengeMissing));
    }

    #[test]
    fn test_reissue_after_consume_is_fresh() {
        let store = NonceStore::new(300);
        let first = store.issue(addr(1));
        store.consume(&addr(1)).unwrap();

        let second = store.issue(addr(1));
        assert_ne!(first.value, second.value);
    }

    #[test]
    fn test_expired_nonce_is_missing_and_replaced() {
        let store = NonceStore::new(0);
        let first = store.issue(addr(1));
        assert_eq!(store.consume(&addr(1)), Err(PlatformError::ChallengeMissing));

        let second = store.issue(addr(1));
        assert_ne!(first.value, second.value);
        assert_eq!(store.purge_expired(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_discard() {
        let store = NonceStore::new(300);
        store.issue(addr(1));
        assert!(store.discard(&addr(1)));
        assert!(!store.discard(&addr(1)));
    }

    #[test]
    fn test_concurrent_consume_has_one_winner() {
        let store = NonceStore::new(300);
        store.issue(addr(7));
        let winners = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    if store.consume(&addr(7)).is_ok() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_purge_while_issuing() {
        let store = NonceStore::new(300);

        std::thread::scope(|scope| {
            for worker in 0..4u8 {
                let store = &store;
                scope.spawn(move || {
                    for i in 0..250u8 {
                        let mut bytes = [0u8; 20];
                        bytes[0] = worker;
                        bytes[1] = i;
                        store.issue(Address::from(bytes));
                    }
                });
            }
            for _ in 0..500 {
                // Nothing is old enough to expire
                assert_eq!(store.purge_expired(), 0);
            }
        });

        assert_eq!(store.len(), 1000);
    }

    #[test]
    fn test_purge_counts_only_expired() {
        let stale = NonceStore::new(0);
        for byte in 1..=3 {
            stale.issue(addr(byte));
        }
        assert_eq!(stale.purge_expired(), 3);
        assert_eq!(stale.purge_expired(), 0);
    }
}
