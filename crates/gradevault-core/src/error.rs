//! Error types for gradevault core operations.
//!
//! Errors are descriptive at the core level; the CLI layer maps these
//! to user-facing messages and exit codes.

use thiserror::Error;

/// Result type alias for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Core error type for vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The presented password no longer matches the one the history was
    /// encrypted with.
    #[error("Credential mismatch: password does not match the stored history")]
    CredentialMismatch,

    /// Authenticated decryption failed (wrong key or tampered data).
    #[error("Decryption failed")]
    DecryptionFailed,

    /// No snapshot recorded for the requested timestamp.
    #[error("Snapshot not found: {0}")]
    NotFound(i64),

    /// The user has no history namespace yet.
    #[error("History not initialized for this user")]
    NotInitialized,

    /// A history namespace already exists for this user.
    #[error("History already exists for this user")]
    AlreadyExists,

    /// A snapshot with the same timestamp is already recorded.
    #[error("Snapshot already recorded: {0}")]
    DuplicateSnapshot(i64),

    /// Index and snapshot files disagree.
    #[error("Store consistency violation: {0}")]
    StoreConsistency(String),

    /// Envelope or key-derivation error
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage backend error (generic)
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl VaultError {
    /// True for failures the mismatch/migration flow can recover from.
    pub fn is_credential_mismatch(&self) -> bool {
        matches!(
            self,
            VaultError::CredentialMismatch | VaultError::DecryptionFailed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        let err: VaultError = std::io::Error::new(std::io::ErrorKind::Other, "disk gone").into();
        assert!(matches!(err, VaultError::Io { .. }));
        assert!(err.to_string().contains("disk gone"));
    }

    #[test]
    fn test_mismatch_classification() {
        assert!(VaultError::CredentialMismatch.is_credential_mismatch());
        assert!(VaultError::DecryptionFailed.is_credential_mismatch());
        assert!(!VaultError::NotFound(1).is_credential_mismatch());
    }
}
