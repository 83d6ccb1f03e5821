//! History engine trait definition.
//!
//! `HistoryEngine` is the interface a per-user history backend exposes once
//! it has been opened. Opening is owned by [`crate::Vault`], which knows the
//! storage root, KDF parameters and per-user locks.

use secrecy::SecretString;

use super::types::{IntegrityReport, Snapshot, VersionIndexEntry};
use crate::error::Result;

/// Interface for one user's encrypted, versioned history.
///
/// All implementations must ensure:
/// - Snapshots and the index are encrypted at rest
/// - The index is sorted by timestamp and holds unique timestamps
/// - Every mutation re-checks the credential hash before touching data
/// - Mutations on the same user are serialized
pub trait HistoryEngine: Send + Sync {
    /// Compare the presented credentials against the stored credential hash.
    ///
    /// # Errors
    ///
    /// - `VaultError::CredentialMismatch` if the hash differs
    /// - `VaultError::NotInitialized` if the hash record is gone
    fn verify(&self) -> Result<()>;

    /// All recorded versions, oldest first.
    ///
    /// Entries whose snapshot file has disappeared are skipped.
    fn list_history(&self) -> Result<Vec<VersionIndexEntry>>;

    /// Record a snapshot under its own timestamp.
    ///
    /// # Errors
    ///
    /// - `VaultError::CredentialMismatch` if verification fails
    /// - `VaultError::DuplicateSnapshot` if the timestamp is already indexed
    fn save<S: Snapshot>(&self, snapshot: &S) -> Result<()>
    where
        Self: Sized;

    /// Decrypt the snapshot recorded at `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::NotFound` if no snapshot file exists for it.
    fn load<S: Snapshot>(&self, timestamp: i64) -> Result<S>
    where
        Self: Sized;

    /// Drop one version from the index and delete its snapshot file.
    fn remove_entry(&self, timestamp: i64) -> Result<()>;

    /// Delete the whole namespace, including the credential hash record.
    ///
    /// The next open for this user bootstraps an empty history.
    fn wipe(self) -> Result<()>
    where
        Self: Sized;

    /// Re-encrypt everything from the key of `old_password` to the key of
    /// `new_password`, then switch this handle to the new credentials.
    ///
    /// The swap is all-or-nothing: an interrupted migration leaves the
    /// history readable with the old password.
    fn migrate(&mut self, old_password: &SecretString, new_password: &SecretString) -> Result<()>;

    /// Compare the index against the snapshot files on disk.
    fn check_integrity(&self) -> Result<IntegrityReport>;
}
