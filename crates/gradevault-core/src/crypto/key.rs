//! Key derivation using SHA-256 and PBKDF2-HMAC-SHA256.
//!
//! The password is first bound to the username and server secret through a
//! composition distinct from the credential hash, then stretched with PBKDF2
//! salted by the server secret.

use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::hash::absorb;
use crate::error::{Result, VaultError};

/// Default PBKDF2 iteration count.
pub const DEFAULT_KDF_ITERATIONS: u32 = 480_000;

/// Length of derived key in bytes (32 bytes = 256 bits for ChaCha20-Poly1305).
pub const KEY_LENGTH: usize = 32;

/// Tunable parameters for the slow KDF step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub iterations: u32,
}

impl KdfParams {
    pub fn new(iterations: u32) -> Result<Self> {
        if iterations == 0 {
            return Err(VaultError::InvalidInput(
                "KDF iterations must be at least 1".to_string(),
            ));
        }
        Ok(Self { iterations })
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_KDF_ITERATIONS,
        }
    }
}

/// A symmetric key derived from a user's credentials.
///
/// Key material is zeroized from memory when dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key: bytes }
    }

    /// Get a reference to the raw key bytes.
    ///
    /// Avoid storing or logging this value.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Derive the history encryption key for a credential triple.
///
/// Two users with the same password get different keys because the username
/// is part of the input keying material. The username is not secret, so this
/// is weaker than a random per-user salt.
///
/// # Examples
///
/// ```
/// use gradevault_core::crypto::{derive_key, KdfParams};
///
/// let params = KdfParams::new(1_000).unwrap();
/// let key = derive_key("pw1", "alice", "server-secret", &params).unwrap();
/// assert_eq!(key.as_bytes().len(), 32);
/// ```
pub fn derive_key(
    password: &str,
    username: &str,
    server_secret: &str,
    params: &KdfParams,
) -> Result<DerivedKey> {
    if server_secret.is_empty() {
        return Err(VaultError::InvalidInput(
            "Server secret cannot be empty".to_string(),
        ));
    }

    let reversed: String = password.chars().rev().collect();
    let mut hasher = Sha256::new();
    absorb(&mut hasher, password.as_bytes());
    absorb(&mut hasher, server_secret.as_bytes());
    absorb(&mut hasher, username.as_bytes());
    absorb(&mut hasher, reversed.as_bytes());
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());

    let mut key_bytes = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(
        &digest,
        server_secret.as_bytes(),
        params.iterations,
        &mut key_bytes,
    );
    digest.zeroize();

    Ok(DerivedKey::from_bytes(key_bytes))
}
