//! File-backed history store.
//!
//! One directory per user, named by [`crate::crypto::namespace_id`]. The
//! credential hash record sits in plaintext next to the encrypted index and
//! snapshot files; see [`layout`] for the exact structure.

mod integrity;
mod layout;
mod migration;

use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use super::encryption::{open_json, seal_json};
use super::traits::HistoryEngine;
use super::types::{IntegrityReport, Snapshot, VersionIndexEntry};
use crate::crypto::{credential_hash, derive_key, CredentialHash, DerivedKey, KdfParams, UserKeyContext};
use crate::error::{Result, VaultError};
use crate::fs::{create_private_dir, remove_dir_if_exists, remove_file_if_exists, write_atomic};

pub(crate) use layout::Layout;

/// Per-user mutex shared by every handle on the same namespace.
pub(crate) type NamespaceLock = Arc<Mutex<()>>;

pub(crate) fn lock_guard(lock: &Mutex<()>) -> Result<MutexGuard<'_, ()>> {
    lock.lock()
        .map_err(|_| VaultError::Storage("History lock poisoned".to_string()))
}

/// Decryption failures at the store boundary mean the key is wrong.
fn mismatch_on_decrypt(err: VaultError) -> VaultError {
    match err {
        VaultError::DecryptionFailed => VaultError::CredentialMismatch,
        other => other,
    }
}

/// An open handle on one user's history.
///
/// Holds the working key and the expected credential hash for the
/// credentials it was opened with. Both are replaced by [`HistoryStore::migrate`].
pub struct HistoryStore {
    layout: Layout,
    username: String,
    server_secret: SecretString,
    params: KdfParams,
    expected: CredentialHash,
    key: DerivedKey,
    lock: NamespaceLock,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("namespace", &self.layout.namespace())
            .field("dir", &self.layout.dir())
            .finish_non_exhaustive()
    }
}

impl HistoryStore {
    fn from_context(
        root: &Path,
        context: &UserKeyContext,
        params: &KdfParams,
        lock: NamespaceLock,
    ) -> Result<Self> {
        let username = context.username();
        let password = context.password().expose_secret();
        let secret = context.server_secret().expose_secret();

        Ok(Self {
            layout: Layout::for_user(root, username),
            username: username.to_string(),
            server_secret: SecretString::from(secret.to_string()),
            params: *params,
            expected: credential_hash(username, password, secret),
            key: derive_key(password, username, secret, params)?,
            lock,
        })
    }

    /// Create a namespace for a user with no history yet.
    pub(crate) fn create_new(
        root: &Path,
        context: &UserKeyContext,
        params: &KdfParams,
        lock: NamespaceLock,
    ) -> Result<Self> {
        let store = Self::from_context(root, context, params, lock)?;
        {
            let _guard = lock_guard(&store.lock)?;
            store.layout.recover()?;
            if store.layout.hash_record().exists() {
                return Err(VaultError::AlreadyExists);
            }
            fs::create_dir_all(root)?;
            create_private_dir(store.layout.dir())?;
            create_private_dir(&store.layout.snapshots_dir())?;
            write_hash_record(&store.layout, &store.expected)?;
        }
        info!(namespace = %store.layout.namespace(), "Created history namespace");
        Ok(store)
    }

    /// Open a namespace whose credential hash record already exists.
    pub(crate) fn open_existing(
        root: &Path,
        context: &UserKeyContext,
        params: &KdfParams,
        lock: NamespaceLock,
    ) -> Result<Self> {
        let store = Self::from_context(root, context, params, lock)?;
        {
            let _guard = lock_guard(&store.lock)?;
            store.layout.recover()?;
            if !store.layout.hash_record().exists() {
                return Err(VaultError::NotInitialized);
            }
        }
        debug!(namespace = %store.layout.namespace(), "Opened history namespace");
        Ok(store)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Directory name of this user's namespace.
    pub fn namespace(&self) -> &str {
        self.layout.namespace()
    }

    /// Hash of the credentials this handle was opened (or migrated) with.
    pub fn credential_hash(&self) -> &CredentialHash {
        &self.expected
    }

    fn read_hash_record(&self) -> Result<CredentialHash> {
        match fs::read_to_string(self.layout.hash_record()) {
            Ok(text) => CredentialHash::from_hex(&text),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(VaultError::NotInitialized),
            Err(err) => Err(err.into()),
        }
    }

    fn read_index(&self) -> Result<Vec<VersionIndexEntry>> {
        let bytes = match fs::read(self.layout.index()) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        open_json(&self.key, &bytes).map_err(mismatch_on_decrypt)
    }

    fn write_index(&self, index: &[VersionIndexEntry]) -> Result<()> {
        let sealed = seal_json(&self.key, index)?;
        write_atomic(&self.layout.index(), &sealed)
    }

    /// Most recent recorded version, if any.
    pub fn latest(&self) -> Result<Option<VersionIndexEntry>> {
        Ok(self.list_history()?.pop())
    }

    /// Delete snapshot files the index does not reference, plus stale temp
    /// files. Returns the number of orphaned snapshots removed.
    pub fn prune_orphans(&self) -> Result<usize> {
        let _guard = lock_guard(&self.lock)?;
        self.verify()?;

        let report = integrity::inspect(&self.layout, &self.read_index()?)?;
        for timestamp in &report.orphaned_snapshots {
            remove_file_if_exists(&self.layout.snapshot(*timestamp))?;
        }
        for temp in self.layout.stale_temp_files()? {
            debug!(path = %temp.display(), "Removing stale temp file");
            remove_file_if_exists(&temp)?;
        }

        if !report.orphaned_snapshots.is_empty() {
            info!(
                namespace = %self.layout.namespace(),
                removed = report.orphaned_snapshots.len(),
                "Pruned orphaned snapshots"
            );
        }
        Ok(report.orphaned_snapshots.len())
    }
}

/// Remove a namespace and its crash-recovery siblings. Caller holds the lock.
pub(crate) fn wipe_namespace(layout: &Layout) -> Result<()> {
    remove_dir_if_exists(layout.dir())?;
    remove_dir_if_exists(&layout.retired())?;
    layout.recover()?;
    info!(namespace = %layout.namespace(), "Wiped history namespace");
    Ok(())
}

fn write_hash_record(layout: &Layout, hash: &CredentialHash) -> Result<()> {
    write_atomic(&layout.hash_record(), format!("{}\n", hash).as_bytes())
}

impl HistoryEngine for HistoryStore {
    fn verify(&self) -> Result<()> {
        let stored = self.read_hash_record()?;
        if stored != self.expected {
            warn!(namespace = %self.layout.namespace(), "Credential hash mismatch");
            return Err(VaultError::CredentialMismatch);
        }
        Ok(())
    }

    fn list_history(&self) -> Result<Vec<VersionIndexEntry>> {
        self.verify()?;
        let index = self.read_index()?;
        Ok(index
            .into_iter()
            .filter(|entry| {
                let present = self.layout.snapshot(entry.timestamp).exists();
                if !present {
                    warn!(
                        namespace = %self.layout.namespace(),
                        timestamp = entry.timestamp,
                        "Index entry has no snapshot file; skipping"
                    );
                }
                present
            })
            .collect())
    }

    fn save<S: Snapshot>(&self, snapshot: &S) -> Result<()> {
        let _guard = lock_guard(&self.lock)?;
        self.verify()?;

        let timestamp = snapshot.timestamp();
        let mut index = self.read_index()?;
        if index.iter().any(|entry| entry.timestamp == timestamp) {
            return Err(VaultError::DuplicateSnapshot(timestamp));
        }

        // Snapshot first: a crash here leaves an orphan, never a dangling entry.
        create_private_dir(&self.layout.snapshots_dir())?;
        write_atomic(&self.layout.snapshot(timestamp), &seal_json(&self.key, snapshot)?)?;

        let position = index.partition_point(|entry| entry.timestamp < timestamp);
        index.insert(position, VersionIndexEntry::for_snapshot(snapshot));
        self.write_index(&index)?;

        debug!(
            namespace = %self.layout.namespace(),
            timestamp,
            versions = index.len(),
            "Saved snapshot"
        );
        Ok(())
    }

    fn load<S: Snapshot>(&self, timestamp: i64) -> Result<S> {
        self.verify()?;
        let bytes = match fs::read(self.layout.snapshot(timestamp)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(VaultError::NotFound(timestamp))
            }
            Err(err) => return Err(err.into()),
        };
        open_json(&self.key, &bytes).map_err(mismatch_on_decrypt)
    }

    fn remove_entry(&self, timestamp: i64) -> Result<()> {
        let _guard = lock_guard(&self.lock)?;
        self.verify()?;

        let mut index = self.read_index()?;
        let position = index
            .iter()
            .position(|entry| entry.timestamp == timestamp)
            .ok_or(VaultError::NotFound(timestamp))?;
        index.remove(position);

        // Index first: a crash here leaves an orphan, never a dangling entry.
        self.write_index(&index)?;
        if !remove_file_if_exists(&self.layout.snapshot(timestamp))? {
            warn!(
                namespace = %self.layout.namespace(),
                timestamp,
                "Removed index entry had no snapshot file"
            );
        }

        info!(namespace = %self.layout.namespace(), timestamp, "Removed snapshot");
        Ok(())
    }

    fn wipe(self) -> Result<()> {
        let _guard = lock_guard(&self.lock)?;
        wipe_namespace(&self.layout)
    }

    fn migrate(&mut self, old_password: &SecretString, new_password: &SecretString) -> Result<()> {
        let lock = Arc::clone(&self.lock);
        let _guard = lock_guard(&lock)?;
        self.layout.recover()?;

        let secret = self.server_secret.expose_secret();
        let old = old_password.expose_secret();
        let new = new_password.expose_secret();
        if new.is_empty() {
            return Err(VaultError::InvalidInput(
                "Password cannot be empty".to_string(),
            ));
        }

        let stored = self.read_hash_record()?;
        if stored != credential_hash(&self.username, old, secret) {
            warn!(namespace = %self.layout.namespace(), "Old password rejected during migration");
            return Err(VaultError::CredentialMismatch);
        }
        let old_key = derive_key(old, &self.username, secret, &self.params)?;

        let new_hash = credential_hash(&self.username, new, secret);
        let new_key = derive_key(new, &self.username, secret, &self.params)?;
        let migrated = migration::rekey(&self.layout, &old_key, &new_hash, &new_key)?;

        self.expected = new_hash;
        self.key = new_key;
        info!(namespace = %self.layout.namespace(), versions = migrated, "Migrated history to new password");
        Ok(())
    }

    fn check_integrity(&self) -> Result<IntegrityReport> {
        self.verify()?;
        let report = integrity::inspect(&self.layout, &self.read_index()?)?;
        if !report.is_clean() {
            warn!(
                namespace = %self.layout.namespace(),
                missing = report.missing_snapshots.len(),
                orphaned = report.orphaned_snapshots.len(),
                "History integrity check found problems"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::{Course, GradebookSnapshot};
    use tempfile::tempdir;

    fn fast() -> KdfParams {
        KdfParams::new(1_000).unwrap()
    }

    fn context(password: &str) -> UserKeyContext {
        UserKeyContext::from_parts("alice", password, "server-secret").unwrap()
    }

    fn snapshot(ts: i64, grade: i32) -> GradebookSnapshot {
        GradebookSnapshot::new(ts, vec![Course::new("Math", grade)])
    }

    #[test]
    fn test_create_writes_hash_record() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::create_new(dir.path(), &context("pw1"), &fast(), NamespaceLock::default()).unwrap();

        let record = fs::read_to_string(store.layout.hash_record()).unwrap();
        assert_eq!(record, format!("{}\n", store.credential_hash()));
        store.verify().unwrap();
    }

    #[test]
    fn test_create_twice_fails() {
        let dir = tempdir().unwrap();
        HistoryStore::create_new(dir.path(), &context("pw1"), &fast(), NamespaceLock::default()).unwrap();
        let result = HistoryStore::create_new(dir.path(), &context("pw1"), &fast(), NamespaceLock::default());
        assert!(matches!(result, Err(VaultError::AlreadyExists)));
    }

    #[cfg(unix)]
    #[test]
    fn test_create_leaves_existing_root_permissions_alone() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let root = dir.path().join("shared");
        fs::create_dir(&root).unwrap();
        fs::set_permissions(&root, fs::Permissions::from_mode(0o755)).unwrap();

        let store = HistoryStore::create_new(&root, &context("pw1"), &fast(), NamespaceLock::default()).unwrap();

        let mode = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&root), 0o755);
        assert_eq!(mode(store.layout.dir()), 0o700);
    }

    #[test]
    fn test_open_existing_requires_record() {
        let dir = tempdir().unwrap();
        let result = HistoryStore::open_existing(dir.path(), &context("pw1"), &fast(), NamespaceLock::default());
        assert!(matches!(result, Err(VaultError::NotInitialized)));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::create_new(dir.path(), &context("pw1"), &fast(), NamespaceLock::default()).unwrap();

        store.save(&snapshot(100, 90)).unwrap();
        let loaded: GradebookSnapshot = store.load(100).unwrap();

        assert_eq!(loaded, snapshot(100, 90));
    }

    #[test]
    fn test_index_is_encrypted_on_disk() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::create_new(dir.path(), &context("pw1"), &fast(), NamespaceLock::default()).unwrap();
        store.save(&snapshot(100, 90)).unwrap();

        let raw = fs::read(store.layout.index()).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("Math"));
    }

    #[test]
    fn test_corrupted_hash_record_is_consistency_error() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::create_new(dir.path(), &context("pw1"), &fast(), NamespaceLock::default()).unwrap();
        fs::write(store.layout.hash_record(), b"garbage").unwrap();

        assert!(matches!(store.verify(), Err(VaultError::StoreConsistency(_))));
    }

    #[test]
    fn test_poisoned_lock_maps_to_storage_error() {
        let lock = NamespaceLock::default();
        let poisoner = Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();

        assert!(matches!(lock_guard(&lock), Err(VaultError::Storage(_))));
    }
}
