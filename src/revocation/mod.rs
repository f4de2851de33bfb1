//! Revoked token ids, kept only until the token would have expired anyway.

mod sweeper;

pub use sweeper::spawn_sweeper;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationEntry {
    pub token_id: String,
    /// Unix seconds; the entry can be dropped once this has passed.
    pub expires_at: i64,
}

/// Concurrent set of revoked token ids (`jti` -> expiry).
/// Owned by whoever builds the verifier; share it through an `Arc`.
#[derive(Debug, Default)]
pub struct RevocationRegistry {
    entries: DashMap<String, i64>,
}

impl RevocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent. Returns `true` when `token_id` was not revoked before.
    /// Revoking twice keeps the later expiry.
    pub fn revoke(&self, token_id: &str, expires_at: i64) -> bool {
        let mut inserted = false;
        self.entries
            .entry(token_id.to_string())
            .and_modify(|exp| *exp = (*exp).max(expires_at))
            .or_insert_with(|| {
                inserted = true;
                expires_at
            });
        debug!(jti = %token_id, expires_at, inserted, "token revoked");
        inserted
    }

    pub fn is_revoked(&self, token_id: &str) -> bool {
        self.entries.contains_key(token_id)
    }

    /// Drops entries with `expires_at <= now`; returns how many were removed.
    pub fn sweep(&self, now: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, exp| *exp > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot for writing to a durable store.
    pub fn entries(&self) -> Vec<RevocationEntry> {
        self.entries
            .iter()
            .map(|e| RevocationEntry {
                token_id: e.key().clone(),
                expires_at: *e.value(),
            })
            .collect()
    }

    /// Reloads entries saved with `entries()`.
    pub fn restore<I>(&self, entries: I)
    where
        I: IntoIterator<Item = RevocationEntry>,
    {
        for entry in entries {
            self.revoke(&entry.token_id, entry.expires_at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn revoke_is_idempotent() {
        let registry = RevocationRegistry::new();
        assert!(registry.revoke("a", 100));
        assert!(!registry.revoke("a", 50));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.entries()[0].expires_at, 100);
        assert!(!registry.revoke("a", 200));
        assert_eq!(registry.entries()[0].expires_at, 200);
    }

    #[test]
    fn sweep_drops_only_expired_entries() {
        let registry = RevocationRegistry::new();
        registry.revoke("old", 100);
        registry.revoke("edge", 150);
        registry.revoke("live", 200);
        assert_eq!(registry.sweep(150), 2);
        assert!(!registry.is_revoked("old"));
        assert!(!registry.is_revoked("edge"));
        assert!(registry.is_revoked("live"));
    }

    #[test]
    fn restore_reloads_snapshot() {
        let registry = RevocationRegistry::new();
        registry.revoke("a", 10);
        registry.revoke("b", 20);
        let snapshot = registry.entries();

        let reloaded = RevocationRegistry::new();
        reloaded.restore(snapshot);
        assert!(reloaded.is_revoked("a"));
        assert!(reloaded.is_revoked("b"));
    }

    #[test]
    fn concurrent_revoke_and_lookup_lose_nothing() {
        let registry = Arc::new(RevocationRegistry::new());
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let id = format!("t{}-{}", t, i);
                        assert!(registry.revoke(&id, i64::MAX));
                        assert!(registry.is_revoked(&id));
                        if i % 50 == 0 {
                            registry.sweep(0);
                        }
                    }
                })
            })
            .collect();
        for handle in threads {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 8 * 500);
    }
}
