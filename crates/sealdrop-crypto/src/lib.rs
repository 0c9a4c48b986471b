//! sealdrop-crypto: client-side encryption for one-time share links
//!
//! Architecture: Encrypt-then-Chunk with AES-256-GCM
//!
//! Pipeline: plaintext → encrypt once (AES-256-GCM) → split ciphertext into chunks → upload
//!
//! Key hierarchy:
//! ```text
//! Master Key (256-bit random, per item, lives only in the link fragment)
//!   ├── Item Key (HKDF-SHA256, salt = 16 random bytes, info = "AES-GCM Encryption Key")
//!   │   └── Payload AEAD: AES-256-GCM (nonce = random 96-bit, tag = 128-bit)
//!   └── Password Wrap (optional)
//!       └── AES-256-GCM(PBKDF2-SHA256(password, wrap salt, 100k), base64(master key))
//! ```

pub mod cipher;
pub mod encoding;
pub mod keys;
pub mod password;

pub use cipher::{decrypt, encrypt, Sealed};
pub use encoding::{b64_decode, b64_encode};
pub use keys::{
    derive_key, derive_key_b64, generate_master_key, generate_salt, ItemKey, MasterKey,
};
pub use password::{unwrap, verify, wrap, PasswordParams};

/// Size of a master or item key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an HKDF / PBKDF2 salt in bytes
pub const SALT_SIZE: usize = 16;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// HKDF context label. Fixed so links interoperate with the browser client.
pub const HKDF_INFO: &[u8] = b"AES-GCM Encryption Key";

/// PBKDF2-SHA256 iteration count for password wrapping
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Minimum access password length, in UTF-16 code units
pub const MIN_PASSWORD_LEN: usize = 6;
