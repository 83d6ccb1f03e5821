//! Credential hashing and key derivation for gradevault.
//!
//! - **Credential hash**: SHA-256 over username, password and server secret,
//!   stored in plaintext as the mismatch oracle.
//! - **Derived key**: SHA-256 over a different composition of the same
//!   secrets, stretched with PBKDF2-HMAC-SHA256.
//!
//! ## Threat Model
//!
//! We defend against:
//! - Theft of the history directory
//! - Offline brute-force attacks on a password (slowed by the KDF)
//!
//! We do NOT defend against:
//! - An attacker who also holds the server secret and can guess usernames
//! - Access to a running process's memory

pub mod context;
pub mod hash;
pub mod key;

pub use context::UserKeyContext;
pub use hash::{credential_hash, namespace_id, CredentialHash};
pub use key::{derive_key, DerivedKey, KdfParams, DEFAULT_KDF_ITERATIONS};
