//! Authenticated encryption of snapshot and index payloads.
//!
//! Envelope layout: `[version (1 byte)][nonce (12 bytes)][ciphertext + tag]`.
//! ChaCha20-Poly1305 authenticates the ciphertext, so a wrong key or a
//! flipped bit fails closed instead of yielding garbage plaintext.

use chacha20poly1305::{
    aead::{Aead, OsRng, rand_core::RngCore},
    ChaCha20Poly1305, Key, KeyInit, Nonce,
};
use serde::{de::DeserializeOwned, Serialize};
use zeroize::Zeroizing;

use crate::crypto::DerivedKey;
use crate::error::{Result, VaultError};

/// Current envelope format version.
pub const ENVELOPE_VERSION: u8 = 1;

/// Nonce size for ChaCha20-Poly1305 (96 bits / 12 bytes)
const NONCE_SIZE: usize = 12;

const HEADER_SIZE: usize = 1 + NONCE_SIZE;

/// Encrypt `data` under `key`.
///
/// # Examples
///
/// ```
/// use gradevault_core::crypto::{derive_key, KdfParams};
/// use gradevault_core::storage::encryption::{decrypt, encrypt};
///
/// let key = derive_key("pw1", "alice", "secret", &KdfParams::new(1_000).unwrap()).unwrap();
/// let sealed = encrypt(&key, b"secret data").unwrap();
/// assert_eq!(decrypt(&key, &sealed).unwrap().as_slice(), b"secret data");
/// ```
pub fn encrypt(key: &DerivedKey, data: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, data)
        .map_err(|_| VaultError::Crypto("Encryption failed".to_string()))?;

    let mut envelope = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    envelope.push(ENVELOPE_VERSION);
    envelope.extend_from_slice(&nonce_bytes);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

/// Decrypt an envelope produced by [`encrypt`].
///
/// # Errors
///
/// - `VaultError::DecryptionFailed` if the key is wrong or the data was tampered with
/// - `VaultError::Crypto` if the envelope is truncated or has an unknown version
pub fn decrypt(key: &DerivedKey, envelope: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if envelope.len() < HEADER_SIZE {
        return Err(VaultError::Crypto("Envelope is truncated".to_string()));
    }
    if envelope[0] != ENVELOPE_VERSION {
        return Err(VaultError::Crypto(format!(
            "Unsupported envelope version: {}",
            envelope[0]
        )));
    }

    let (nonce_bytes, ciphertext) = envelope[1..].split_at(NONCE_SIZE);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| VaultError::DecryptionFailed)
}

/// Serialize `value` to JSON and encrypt it.
pub fn seal_json<T: Serialize + ?Sized>(key: &DerivedKey, value: &T) -> Result<Vec<u8>> {
    let plaintext = Zeroizing::new(serde_json::to_vec(value)?);
    encrypt(key, &plaintext)
}

/// Decrypt an envelope and deserialize the JSON inside.
pub fn open_json<T: DeserializeOwned>(key: &DerivedKey, envelope: &[u8]) -> Result<T> {
    let plaintext = decrypt(key, envelope)?;
    Ok(serde_json::from_slice(&plaintext)?)
}
