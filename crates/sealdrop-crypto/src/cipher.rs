//! Whole-payload AES-256-GCM encryption/decryption
//!
//! Ciphertext format (binary):
//! ```text
//! [N bytes: ciphertext][16 bytes: GCM tag]      nonce: 12 random bytes, stored separately
//! ```
//!
//! Each payload is encrypted exactly once with a fresh nonce. Chunking for
//! upload happens afterwards over ciphertext bytes, so a (key, nonce) pair is
//! never reused within an item.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use sealdrop_core::{ShareError, ShareResult};

use crate::keys::ItemKey;
use crate::{NONCE_SIZE, TAG_SIZE};

/// Output of one `encrypt` call.
#[derive(Debug, Clone)]
pub struct Sealed {
    /// Ciphertext with the 16-byte tag appended.
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_SIZE],
}

/// Encrypt `plaintext` with AES-256-GCM under a freshly generated nonce.
pub fn encrypt(plaintext: &[u8], key: &ItemKey) -> ShareResult<Sealed> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| ShareError::Other(anyhow::anyhow!("AES-GCM encryption failed: {e}")))?;

    debug_assert_eq!(ciphertext.len(), plaintext.len() + TAG_SIZE);

    Ok(Sealed {
        ciphertext,
        nonce: nonce_bytes,
    })
}

/// Decrypt and authenticate `ciphertext` (tag appended).
///
/// Malformed inputs (nonce not 12 bytes, ciphertext shorter than the tag)
/// are `Protocol` errors; tag failure is `Authentication`. No plaintext is
/// returned unless the tag verifies.
pub fn decrypt(ciphertext: &[u8], nonce: &[u8], key: &ItemKey) -> ShareResult<Vec<u8>> {
    if nonce.len() != NONCE_SIZE {
        return Err(ShareError::protocol(format!(
            "invalid nonce size: {} bytes (expected {NONCE_SIZE})",
            nonce.len()
        )));
    }
    if ciphertext.len() < TAG_SIZE {
        return Err(ShareError::protocol(format!(
            "ciphertext too short: {} bytes (minimum {TAG_SIZE})",
            ciphertext.len()
        )));
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| ShareError::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{derive_key, generate_master_key, generate_salt, ItemKey};

    fn test_key() -> ItemKey {
        derive_key(&generate_master_key(), &generate_salt()).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();
        let plaintext = b"hello, encrypted world!";

        let sealed = encrypt(plaintext, &key).unwrap();
        let decrypted = decrypt(&sealed.ciphertext, &sealed.nonce, &key).unwrap();

        assert_eq!(&decrypted, plaintext);
    }

    #[test]
    fn test_hello_sizes() {
        let key = test_key();
        let sealed = encrypt(b"hello", &key).unwrap();

        // plaintext (5) + tag (16) = 21
        assert_eq!(sealed.ciphertext.len(), 21);
        assert_eq!(sealed.nonce.len(), 12);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let key = test_key();
        let sealed = encrypt(b"", &key).unwrap();
        assert_eq!(sealed.ciphertext.len(), TAG_SIZE);

        let decrypted = decrypt(&sealed.ciphertext, &sealed.nonce, &key).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let key = test_key();
        let a = encrypt(b"same", &key).unwrap();
        let b = encrypt(b"same", &key).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let sealed = encrypt(b"secret data", &test_key()).unwrap();
        let result = decrypt(&sealed.ciphertext, &sealed.nonce, &test_key());
        assert!(matches!(result, Err(ShareError::Authentication)));
    }

    #[test]
    fn test_decrypt_wrong_nonce() {
        let key = test_key();
        let sealed = encrypt(b"secret data", &key).unwrap();
        let mut nonce = sealed.nonce;
        nonce[0] ^= 0x01;

        let result = decrypt(&sealed.ciphertext, &nonce, &key);
        assert!(matches!(result, Err(ShareError::Authentication)));
    }

    #[test]
    fn test_tampered_tag() {
        let key = test_key();
        let mut sealed = encrypt(b"secret data", &key).unwrap();
        let last = sealed.ciphertext.len() - 1;
        sealed.ciphertext[last] ^= 0x80;

        let result = decrypt(&sealed.ciphertext, &sealed.nonce, &key);
        assert!(matches!(result, Err(ShareError::Authentication)));
    }

    #[test]
    fn test_malformed_inputs_are_protocol_errors() {
        let key = test_key();
        let sealed = encrypt(b"x", &key).unwrap();

        let short_nonce = decrypt(&sealed.ciphertext, &sealed.nonce[..8], &key);
        assert!(matches!(short_nonce, Err(ShareError::Protocol(_))));

        let truncated = decrypt(&sealed.ciphertext[..10], &sealed.nonce, &key);
        assert!(matches!(truncated, Err(ShareError::Protocol(_))));
    }
}
