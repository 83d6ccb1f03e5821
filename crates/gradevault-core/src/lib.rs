//! # Gradevault Core
//!
//! Encrypted, versioned per-user gradebook history.
//!
//! Each user's history is encrypted with a key derived from their own
//! password. A plaintext credential hash stored beside it detects a changed
//! password before any decryption is attempted, and the [`mismatch`] module
//! lets the caller continue, delete or migrate when that happens.
//!
//! ## Architecture
//!
//! - **crypto**: credential hashing and key derivation
//! - **storage**: snapshot codec, file-backed history store, integrity checks
//! - **vault**: storage root, server secret and per-user locks
//! - **mismatch**: the continue/delete/migrate decision
//! - **cache**: optional TTL cache of open stores

pub mod cache;
pub mod crypto;
pub mod error;
pub mod fs;
pub mod mismatch;
pub mod storage;
pub mod vault;

pub use cache::StoreCache;
pub use crypto::{credential_hash, derive_key, CredentialHash, DerivedKey, KdfParams, UserKeyContext};
pub use error::{Result, VaultError};
pub use mismatch::{MismatchChoice, MismatchResolver, MismatchState, SaveAttempt, SaveOutcome};
pub use storage::{
    Assignment, Course, CourseOverview, GradebookSnapshot, HistoryEngine, HistoryStore,
    IntegrityReport, Snapshot, VersionIndexEntry,
};
pub use vault::Vault;

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
