//! Process-wide entry point for opening per-user histories.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::crypto::{namespace_id, KdfParams, UserKeyContext};
use crate::error::{Result, VaultError};
use crate::mismatch::{MismatchResolver, SaveAttempt};
use crate::storage::file_store::{lock_guard, wipe_namespace, Layout, NamespaceLock};
use crate::storage::{HistoryEngine, HistoryStore, Snapshot};

/// Hands out one mutex per namespace.
///
/// Entries nobody else holds are dropped whenever a new lock is handed out,
/// so the map only grows with concurrently active users.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<String, NamespaceLock>>,
}

impl LockRegistry {
    pub(crate) fn lock_for(&self, namespace: &str) -> Result<NamespaceLock> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| VaultError::Storage("Lock registry poisoned".to_string()))?;
        locks.retain(|name, lock| name == namespace || Arc::strong_count(lock) > 1);
        Ok(Arc::clone(locks.entry(namespace.to_string()).or_default()))
    }

    /// Number of namespaces with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct VaultInner {
    root: PathBuf,
    server_secret: SecretString,
    params: KdfParams,
    locks: LockRegistry,
}

/// Storage root, server secret, KDF parameters and per-user locks.
///
/// Cloning is cheap and every clone shares the same lock registry, so
/// handles opened through any clone serialize against each other.
#[derive(Debug, Clone)]
pub struct Vault {
    inner: Arc<VaultInner>,
}

impl Vault {
    pub fn new(root: impl Into<PathBuf>, server_secret: SecretString, params: KdfParams) -> Result<Self> {
        if server_secret.expose_secret().is_empty() {
            return Err(VaultError::InvalidInput(
                "Server secret cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            inner: Arc::new(VaultInner {
                root: root.into(),
                server_secret,
                params,
                locks: LockRegistry::default(),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn kdf_params(&self) -> KdfParams {
        self.inner.params
    }

    /// Bind a username and password to this vault's server secret.
    pub fn context(&self, username: &str, password: SecretString) -> Result<UserKeyContext> {
        UserKeyContext::new(
            username,
            password,
            SecretString::from(self.inner.server_secret.expose_secret().to_string()),
        )
    }

    fn lock_for(&self, username: &str) -> Result<NamespaceLock> {
        self.inner.locks.lock_for(&namespace_id(username))
    }

    /// True if `username` has a history namespace. Runs crash recovery first.
    pub fn exists(&self, username: &str) -> Result<bool> {
        let layout = Layout::for_user(&self.inner.root, username);
        let lock = self.lock_for(username)?;
        let _guard = lock_guard(&lock)?;
        layout.recover()?;
        Ok(layout.hash_record().exists())
    }

    /// Delete a user's history without their password.
    ///
    /// Returns `false` if there was nothing to delete.
    pub fn wipe_user(&self, username: &str) -> Result<bool> {
        if username.trim().is_empty() {
            return Err(VaultError::InvalidInput(
                "Username cannot be empty".to_string(),
            ));
        }
        let layout = Layout::for_user(&self.inner.root, username);
        let lock = self.lock_for(username)?;
        let _guard = lock_guard(&lock)?;
        layout.recover()?;
        if !layout.dir().exists() {
            return Ok(false);
        }
        wipe_namespace(&layout)?;
        Ok(true)
    }

    /// Create a namespace; fails `AlreadyExists` if one is present.
    pub fn create_new(&self, context: &UserKeyContext) -> Result<HistoryStore> {
        let lock = self.lock_for(context.username())?;
        HistoryStore::create_new(&self.inner.root, context, &self.inner.params, lock)
    }

    /// Open a namespace; fails `NotInitialized` if none exists.
    pub fn open_existing(&self, context: &UserKeyContext) -> Result<HistoryStore> {
        let lock = self.lock_for(context.username())?;
        HistoryStore::open_existing(&self.inner.root, context, &self.inner.params, lock)
    }

    /// Open the user's namespace, creating it if absent.
    ///
    /// Does not compare credentials; call [`HistoryEngine::verify`] for that.
    pub fn open(&self, context: &UserKeyContext) -> Result<HistoryStore> {
        if self.exists(context.username())? {
            self.open_existing(context)
        } else {
            match self.create_new(context) {
                Err(VaultError::AlreadyExists) => self.open_existing(context),
                other => other,
            }
        }
    }

    /// Save a snapshot, or hand back a resolver if the password changed.
    ///
    /// # Examples
    ///
    /// ```
    /// use gradevault_core::{GradebookSnapshot, KdfParams, SaveAttempt, Vault};
    /// use secrecy::SecretString;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let vault = Vault::new(dir.path(), SecretString::from("server-secret".to_string()), KdfParams::new(1_000).unwrap()).unwrap();
    /// let context = vault.context("alice", SecretString::from("pw1".to_string())).unwrap();
    ///
    /// let attempt = vault.save_snapshot(context, &GradebookSnapshot::new(100, Vec::new())).unwrap();
    /// assert!(matches!(attempt, SaveAttempt::Saved(100)));
    /// ```
    pub fn save_snapshot<S: Snapshot>(&self, context: UserKeyContext, snapshot: &S) -> Result<SaveAttempt> {
        let store = self.open(&context)?;
        match store.save(snapshot) {
            Ok(()) => Ok(SaveAttempt::Saved(snapshot.timestamp())),
            Err(VaultError::CredentialMismatch) => {
                debug!(namespace = %store.namespace(), "Save deferred pending mismatch decision");
                Ok(SaveAttempt::Mismatch(MismatchResolver::new(
                    self.clone(),
                    context,
                    store,
                )))
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn vault(root: &Path) -> Vault {
        Vault::new(root, SecretString::from("server-secret".to_string()), KdfParams::new(1_000).unwrap()).unwrap()
    }

    #[test]
    fn test_empty_server_secret_rejected() {
        let result = Vault::new("/tmp", SecretString::from("".to_string()), KdfParams::default());
        assert!(matches!(result, Err(VaultError::InvalidInput(_))));
    }

    #[test]
    fn test_same_user_shares_lock() {
        let registry = LockRegistry::default();
        let a = registry.lock_for("ns-a").unwrap();
        let again = registry.lock_for("ns-a").unwrap();
        let b = registry.lock_for("ns-b").unwrap();

        assert!(Arc::ptr_eq(&a, &again));
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_wipe_user_without_password() {
        let dir = tempdir().unwrap();
        let vault = vault(dir.path());
        let context = vault.context("alice", SecretString::from("pw1".to_string())).unwrap();
        vault.create_new(&context).unwrap();

        assert!(vault.wipe_user("alice").unwrap());
        assert!(!vault.exists("alice").unwrap());
        assert!(!vault.wipe_user("alice").unwrap());
    }

    #[test]
    fn test_unused_locks_are_dropped() {
        let registry = LockRegistry::default();
        drop(registry.lock_for("ns-a").unwrap());
        let _held = registry.lock_for("ns-b").unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_open_bootstraps_then_reopens() {
        let dir = tempdir().unwrap();
        let vault = vault(dir.path());
        let context = vault.context("alice", SecretString::from("pw1".to_string())).unwrap();

        assert!(!vault.exists("alice").unwrap());
        vault.open(&context).unwrap();
        assert!(vault.exists("alice").unwrap());
        vault.open(&context).unwrap().verify().unwrap();
    }

    #[test]
    fn test_open_does_not_verify() {
        let dir = tempdir().unwrap();
        let vault = vault(dir.path());
        vault.open(&vault.context("alice", SecretString::from("pw1".to_string())).unwrap()).unwrap();

        let store = vault.open(&vault.context("alice", SecretString::from("pw2".to_string())).unwrap()).unwrap();
        assert!(matches!(store.verify(), Err(VaultError::CredentialMismatch)));
    }
}
