//! Credential hashing.
//!
//! The credential hash binds username, password and server secret into one
//! SHA-256 digest. It is stored in plaintext next to a user's history and
//! compared on every access, so a changed password is caught by a cheap
//! comparison instead of by a failed decryption.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::{Result, VaultError};

/// Length of a hex-encoded SHA-256 digest.
pub const HASH_HEX_LENGTH: usize = 64;

/// Hex digest of `username ∥ password ∥ server_secret`.
#[derive(Clone, Eq)]
pub struct CredentialHash(String);

impl CredentialHash {
    /// Parse a stored record, tolerating surrounding whitespace.
    pub fn from_hex(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.len() != HASH_HEX_LENGTH || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(VaultError::StoreConsistency(
                "Credential hash record is malformed".to_string(),
            ));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for CredentialHash {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.0.as_bytes(), other.0.as_bytes());
        a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

impl fmt::Display for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialHash({}…)", &self.0[..8.min(self.0.len())])
    }
}

/// Feed one length-prefixed field into `hasher`.
///
/// Prefixing keeps field boundaries fixed, so ("ab", "c") and ("a", "bc")
/// never produce the same input.
pub(crate) fn absorb(hasher: &mut Sha256, field: &[u8]) {
    hasher.update((field.len() as u64).to_le_bytes());
    hasher.update(field);
}

/// Compute the mismatch-oracle hash for a credential triple.
pub fn credential_hash(username: &str, password: &str, server_secret: &str) -> CredentialHash {
    let mut hasher = Sha256::new();
    absorb(&mut hasher, username.as_bytes());
    absorb(&mut hasher, password.as_bytes());
    absorb(&mut hasher, server_secret.as_bytes());
    CredentialHash(hex::encode(hasher.finalize()))
}

/// Directory name for a user's namespace: a one-way mapping of the username.
pub fn namespace_id(username: &str) -> String {
    let mut hasher = Sha256::new();
    absorb(&mut hasher, username.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        let a = credential_hash("alice", "pw1", "secret");
        let b = credential_hash("alice", "pw1", "secret");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), HASH_HEX_LENGTH);
    }

    #[test]
    fn test_any_single_input_changes_hash() {
        let base = credential_hash("alice", "pw1", "secret");
        assert_ne!(base, credential_hash("alicf", "pw1", "secret"));
        assert_ne!(base, credential_hash("alice", "pw2", "secret"));
        assert_ne!(base, credential_hash("alice", "pw1", "secreT"));
    }

    #[test]
    fn test_field_boundaries_do_not_shift() {
        assert_ne!(
            credential_hash("ab", "c", "secret"),
            credential_hash("a", "bc", "secret")
        );
    }

    #[test]
    fn test_no_collisions_over_sample() {
        let mut seen = std::collections::HashSet::new();
        for user in ["alice", "bob", "carol", ""] {
            for pw in ["pw1", "pw2", "PW1", "1wp"] {
                for secret in ["s1", "s2"] {
                    assert!(seen.insert(credential_hash(user, pw, secret).to_string()));
                }
            }
        }
    }

    #[test]
    fn test_namespace_hides_username() {
        let ns = namespace_id("alice");
        assert!(!ns.contains("alice"));
        assert_eq!(ns, namespace_id("alice"));
        assert_ne!(ns, namespace_id("bob"));
    }

    #[test]
    fn test_from_hex_round_trip() {
        let hash = credential_hash("alice", "pw1", "secret");
        let parsed = CredentialHash::from_hex(&format!("{}\n", hash)).unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn test_from_hex_rejects_garbage() {
        assert!(CredentialHash::from_hex("not-a-hash").is_err());
        assert!(CredentialHash::from_hex(&"z".repeat(HASH_HEX_LENGTH)).is_err());
    }

    #[test]
    fn test_debug_is_truncated() {
        let hash = credential_hash("alice", "pw1", "secret");
        let debug = format!("{:?}", hash);
        assert!(!debug.contains(hash.as_str()));
    }
}
