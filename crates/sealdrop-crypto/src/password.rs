//! Optional second factor: PBKDF2 password → wrapping key → AES-GCM(master key)
//!
//! The wrapped plaintext is the master key's base64 text, not its raw bytes,
//! so wrappers stay compatible with the browser client.
//!
//! Every failure on the receive side (tag failure, decrypted key does not match
//! the link key, undecodable result) surfaces as `ShareError::Password`. The
//! cause is only visible at debug level.

use pbkdf2::pbkdf2_hmac;
use sealdrop_core::types::PasswordProtection;
use sealdrop_core::{ShareError, ShareResult};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroizing;

use crate::cipher::{decrypt, encrypt};
use crate::encoding::{b64_decode, b64_encode};
use crate::keys::{generate_salt, ItemKey, MasterKey};
use crate::{KEY_SIZE, MIN_PASSWORD_LEN, PBKDF2_ITERATIONS};

/// PBKDF2 parameters for password wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordParams {
    /// PBKDF2-SHA256 iterations (default: 100 000). Not stored on the wire,
    /// so anything else only round-trips with itself.
    pub iterations: u32,
}

impl Default for PasswordParams {
    fn default() -> Self {
        Self {
            iterations: PBKDF2_ITERATIONS,
        }
    }
}

/// Wrap `master` under `password`.
///
/// Fails with `Validation` if the password is shorter than 6 UTF-16 code
/// units, the length a browser reports.
pub fn wrap(
    master: &MasterKey,
    password: &SecretString,
    params: &PasswordParams,
) -> ShareResult<PasswordProtection> {
    // Counted like a browser's `password.length`: UTF-16 code units
    let units = password.expose_secret().encode_utf16().count();
    if units < MIN_PASSWORD_LEN {
        return Err(ShareError::validation(format!(
            "access password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let salt = generate_salt();
    let wrap_key = derive_wrap_key(password, &salt, params);
    let key_text = Zeroizing::new(master.to_base64());
    let sealed = encrypt(key_text.as_bytes(), &wrap_key)?;

    Ok(PasswordProtection {
        data: b64_encode(&sealed.ciphertext),
        iv: b64_encode(&sealed.nonce),
        salt: b64_encode(&salt),
    })
}

/// Recover the master key from a wrapper.
pub fn unwrap(
    wrapper: &PasswordProtection,
    password: &SecretString,
    params: &PasswordParams,
) -> ShareResult<MasterKey> {
    let opened = match open(wrapper, password, params)? {
        Some(opened) => opened,
        None => {
            tracing::debug!(cause = "tag", "password unwrap failed");
            return Err(ShareError::Password);
        }
    };

    let text = std::str::from_utf8(&opened).map_err(|_| {
        tracing::debug!(cause = "encoding", "password unwrap failed");
        ShareError::Password
    })?;
    MasterKey::from_base64(text).map_err(|_| {
        tracing::debug!(cause = "encoding", "password unwrap failed");
        ShareError::Password
    })
}

/// Check `password` against a wrapper when the caller already holds the
/// master key (the receive flow gets it from the link fragment).
///
/// Tag failure and key mismatch take the same path through a constant-time
/// comparison and return the same error.
pub fn verify(
    wrapper: &PasswordProtection,
    password: &SecretString,
    expected: &MasterKey,
    params: &PasswordParams,
) -> ShareResult<()> {
    let expected_text = Zeroizing::new(expected.to_base64());

    let (opened, tag_ok) = match open(wrapper, password, params)? {
        Some(opened) => (opened, Choice::from(1u8)),
        None => (
            Zeroizing::new(vec![0u8; expected_text.len()]),
            Choice::from(0u8),
        ),
    };

    let same = opened.as_slice().ct_eq(expected_text.as_bytes());
    if bool::from(tag_ok & same) {
        return Ok(());
    }

    tracing::debug!(
        cause = if bool::from(tag_ok) { "mismatch" } else { "tag" },
        "password verification failed"
    );
    Err(ShareError::Password)
}

/// Decode the wrapper and attempt the AEAD open. `Ok(None)` = tag failure.
fn open(
    wrapper: &PasswordProtection,
    password: &SecretString,
    params: &PasswordParams,
) -> ShareResult<Option<Zeroizing<Vec<u8>>>> {
    let data = b64_decode("passwordProtection.data", &wrapper.data)?;
    let iv = b64_decode("passwordProtection.iv", &wrapper.iv)?;
    let salt = b64_decode("passwordProtection.salt", &wrapper.salt)?;

    let wrap_key = derive_wrap_key(password, &salt, params);
    match decrypt(&data, &iv, &wrap_key) {
        Ok(plaintext) => Ok(Some(Zeroizing::new(plaintext))),
        Err(ShareError::Authentication) => Ok(None),
        Err(e) => Err(e),
    }
}

fn derive_wrap_key(password: &SecretString, salt: &[u8], params: &PasswordParams) -> ItemKey {
    let mut okm = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(
        password.expose_secret().as_bytes(),
        salt,
        params.iterations,
        &mut okm,
    );
    ItemKey::from_bytes(okm)
}
