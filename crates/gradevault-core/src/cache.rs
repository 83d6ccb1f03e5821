//! Short-lived cache of open history stores.
//!
//! Opening a store runs the slow KDF, so callers that serve the same user
//! repeatedly can keep the handle here for a while. Entries are keyed by
//! namespace and credential hash: a different password never hits another
//! password's entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use secrecy::ExposeSecret;

use crate::crypto::{credential_hash, namespace_id, UserKeyContext};
use crate::error::Result;
use crate::storage::HistoryStore;
use crate::vault::Vault;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    namespace: String,
    credential: String,
}

impl CacheKey {
    fn for_context(context: &UserKeyContext) -> Self {
        Self {
            namespace: namespace_id(context.username()),
            credential: credential_hash(
                context.username(),
                context.password().expose_secret(),
                context.server_secret().expose_secret(),
            )
            .as_str()
            .to_string(),
        }
    }
}

struct CachedStore {
    store: Arc<HistoryStore>,
    stored_at: Instant,
}

/// Caller-owned TTL map of open stores.
pub struct StoreCache {
    ttl: Duration,
    entries: HashMap<CacheKey, CachedStore>,
}

impl StoreCache {
    /// A zero `ttl` disables caching.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Return a live cached store for `context`, or open and cache one.
    pub fn get_or_open(&mut self, vault: &Vault, context: &UserKeyContext) -> Result<Arc<HistoryStore>> {
        self.expire();
        let key = CacheKey::for_context(context);
        if let Some(cached) = self.entries.get(&key) {
            return Ok(Arc::clone(&cached.store));
        }

        let store = Arc::new(vault.open(context)?);
        if !self.ttl.is_zero() {
            self.entries.insert(
                key,
                CachedStore {
                    store: Arc::clone(&store),
                    stored_at: Instant::now(),
                },
            );
        }
        Ok(store)
    }

    /// Drop every entry for `username`, e.g. after a wipe or migration.
    pub fn invalidate_user(&mut self, username: &str) {
        let namespace = namespace_id(username);
        self.entries.retain(|key, _| key.namespace != namespace);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove entries older than the TTL.
    pub fn expire(&mut self) {
        if self.ttl.is_zero() {
            self.entries.clear();
            return;
        }
        let ttl = self.ttl;
        self.entries.retain(|_, cached| cached.stored_at.elapsed() <= ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KdfParams;
    use secrecy::SecretString;
    use tempfile::tempdir;

    fn vault(root: &std::path::Path) -> Vault {
        Vault::new(root, SecretString::from("s".to_string()), KdfParams::new(1_000).unwrap()).unwrap()
    }

    fn context(vault: &Vault, password: &str) -> UserKeyContext {
        vault.context("alice", SecretString::from(password.to_string())).unwrap()
    }

    #[test]
    fn test_hit_returns_same_store() {
        let dir = tempdir().unwrap();
        let vault = vault(dir.path());
        let mut cache = StoreCache::new(Duration::from_secs(60));

        let first = cache.get_or_open(&vault, &context(&vault, "pw1")).unwrap();
        let second = cache.get_or_open(&vault, &context(&vault, "pw1")).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_different_password_misses() {
        let dir = tempdir().unwrap();
        let vault = vault(dir.path());
        let mut cache = StoreCache::new(Duration::from_secs(60));

        let first = cache.get_or_open(&vault, &context(&vault, "pw1")).unwrap();
        let second = cache.get_or_open(&vault, &context(&vault, "pw2")).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 2);
        cache.invalidate_user("alice");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let dir = tempdir().unwrap();
        let vault = vault(dir.path());
        let mut cache = StoreCache::new(Duration::from_millis(20));

        cache.get_or_open(&vault, &context(&vault, "pw1")).unwrap();
        assert_eq!(cache.len(), 1);
        std::thread::sleep(Duration::from_millis(50));
        cache.expire();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_ttl_disables_caching() {
        let dir = tempdir().unwrap();
        let vault = vault(dir.path());
        let mut cache = StoreCache::new(Duration::ZERO);

        cache.get_or_open(&vault, &context(&vault, "pw1")).unwrap();
        assert!(cache.is_empty());
    }
}
