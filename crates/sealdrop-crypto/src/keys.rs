//! Key hierarchy: master key generation, HKDF item key derivation

use hkdf::Hkdf;
use rand::RngCore;
use sealdrop_core::{ShareError, ShareResult};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::encoding::b64_encode;
use crate::{HKDF_INFO, KEY_SIZE, SALT_SIZE};

/// The per-item 256-bit master key. Zeroized on drop.
///
/// Only travels in the share link fragment; the server sees its derived
/// item key's ciphertext or its password-wrapped form, never the key itself.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Transport encoding used in link fragments and inside password wraps.
    pub fn to_base64(&self) -> String {
        b64_encode(&self.bytes)
    }

    /// Parse the textual form. Fails with `KeyDerivation` on bad base64 or
    /// a length other than 32 bytes.
    pub fn from_base64(encoded: &str) -> ShareResult<Self> {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;

        let mut decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ShareError::KeyDerivation(format!("master key is not valid base64: {e}")))?;

        if decoded.len() != KEY_SIZE {
            let len = decoded.len();
            decoded.zeroize();
            return Err(ShareError::KeyDerivation(format!(
                "master key has wrong size: {len} bytes (expected {KEY_SIZE})"
            )));
        }

        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self::from_bytes(bytes))
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A 256-bit AES-GCM key, derived from a master key (payload) or a password
/// (wrap). Zeroized on drop.
#[derive(Clone)]
pub struct ItemKey {
    bytes: [u8; KEY_SIZE],
}

impl ItemKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for ItemKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random 256-bit master key.
pub fn generate_master_key() -> MasterKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    MasterKey::from_bytes(bytes)
}

/// Generate a fresh 16-byte salt.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive the item's AES-256-GCM key from the master key via HKDF-SHA256.
///
/// Deterministic for a given `(master, salt)`. The salt must be 16 bytes.
pub fn derive_key(master: &MasterKey, salt: &[u8]) -> ShareResult<ItemKey> {
    if salt.len() != SALT_SIZE {
        return Err(ShareError::KeyDerivation(format!(
            "salt has wrong size: {} bytes (expected {SALT_SIZE})",
            salt.len()
        )));
    }

    let hkdf = Hkdf::<Sha256>::new(Some(salt), master.as_bytes());
    let mut okm = [0u8; KEY_SIZE];
    hkdf.expand(HKDF_INFO, &mut okm)
        .map_err(|e| ShareError::KeyDerivation(format!("HKDF expand failed: {e}")))?;
    Ok(ItemKey::from_bytes(okm))
}

/// `derive_key` over the textual master key, as carried in a link fragment.
pub fn derive_key_b64(master_b64: &str, salt: &[u8]) -> ShareResult<ItemKey> {
    let master = MasterKey::from_base64(master_b64)?;
    derive_key(&master, salt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_master_key() -> MasterKey {
        MasterKey::from_bytes([42u8; KEY_SIZE])
    }

    #[test]
    fn test_master_key_generation() {
        let k1 = generate_master_key();
        let k2 = generate_master_key();
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
    }

    #[test]
    fn test_master_key_base64_roundtrip() {
        let master = generate_master_key();
        let encoded = master.to_base64();
        assert_eq!(encoded.len(), 44, "32 bytes encode to 44 padded chars");

        let decoded = MasterKey::from_base64(&encoded).unwrap();
        assert_eq!(decoded.as_bytes(), master.as_bytes());
    }

    #[test]
    fn test_master_key_rejects_wrong_length() {
        let short = b64_encode(&[7u8; 16]);
        let err = MasterKey::from_base64(&short).unwrap_err();
        assert!(matches!(err, ShareError::KeyDerivation(_)));
    }

    #[test]
    fn test_master_key_rejects_bad_encoding() {
        let err = MasterKey::from_base64("%%%not-a-key%%%").unwrap_err();
        assert!(matches!(err, ShareError::KeyDerivation(_)));
    }

    #[test]
    fn test_derive_deterministic() {
        let master = test_master_key();
        let salt = [1u8; SALT_SIZE];
        let k1 = derive_key(&master, &salt).unwrap();
        let k2 = derive_key(&master, &salt).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes(), "HKDF must be deterministic");
    }

    #[test]
    fn test_derive_different_salts() {
        let master = test_master_key();
        let k1 = derive_key(&master, &[1u8; SALT_SIZE]).unwrap();
        let k2 = derive_key(&master, &[2u8; SALT_SIZE]).unwrap();
        assert_ne!(
            k1.as_bytes(),
            k2.as_bytes(),
            "different salts must produce different keys"
        );
    }

    #[test]
    fn test_derive_rejects_bad_salt() {
        let master = test_master_key();
        let err = derive_key(&master, &[0u8; 8]).unwrap_err();
        assert!(matches!(err, ShareError::KeyDerivation(_)));
    }

    #[test]
    fn test_derive_b64_matches_raw() {
        let master = test_master_key();
        let salt = [5u8; SALT_SIZE];
        let raw = derive_key(&master, &salt).unwrap();
        let via_text = derive_key_b64(&master.to_base64(), &salt).unwrap();
        assert_eq!(raw.as_bytes(), via_text.as_bytes());

        let err = derive_key_b64("short", &salt).unwrap_err();
        assert!(matches!(err, ShareError::KeyDerivation(_)));
    }

    #[test]
    fn test_debug_is_redacted() {
        let master = test_master_key();
        let rendered = format!("{master:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("42"));
    }
}
