//! Property tests for the payload cipher and the password wrap.

use proptest::prelude::*;
use sealdrop_core::ShareError;
use sealdrop_crypto::{
    decrypt, derive_key, encrypt, unwrap, verify, wrap, MasterKey, PasswordParams,
};
use secrecy::SecretString;

const FAST: PasswordParams = PasswordParams { iterations: 500 };

proptest! {
    #[test]
    fn roundtrip_any_payload(
        key_bytes in any::<[u8; 32]>(),
        salt in any::<[u8; 16]>(),
        plaintext in proptest::collection::vec(any::<u8>(), 0..4096),
    ) {
        let key = derive_key(&MasterKey::from_bytes(key_bytes), &salt).unwrap();
        let sealed = encrypt(&plaintext, &key).unwrap();
        prop_assert_eq!(sealed.ciphertext.len(), plaintext.len() + 16);

        let opened = decrypt(&sealed.ciphertext, &sealed.nonce, &key).unwrap();
        prop_assert_eq!(opened, plaintext);
    }

    #[test]
    fn any_single_bit_flip_is_rejected(
        plaintext in proptest::collection::vec(any::<u8>(), 1..512),
        flip in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let key = derive_key(&MasterKey::from_bytes([3u8; 32]), &[9u8; 16]).unwrap();
        let mut sealed = encrypt(&plaintext, &key).unwrap();
        let pos = flip.index(sealed.ciphertext.len());
        sealed.ciphertext[pos] ^= 1 << bit;

        let result = decrypt(&sealed.ciphertext, &sealed.nonce, &key);
        prop_assert!(matches!(result, Err(ShareError::Authentication)));
    }

    #[test]
    fn distinct_salts_give_independent_keys(
        key_bytes in any::<[u8; 32]>(),
        a in any::<[u8; 16]>(),
        b in any::<[u8; 16]>(),
    ) {
        prop_assume!(a != b);
        let master = MasterKey::from_bytes(key_bytes);
        let ka = derive_key(&master, &a).unwrap();
        let kb = derive_key(&master, &b).unwrap();
        prop_assert_ne!(ka.as_bytes(), kb.as_bytes());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn wrap_roundtrips_for_any_valid_password(
        key_bytes in any::<[u8; 32]>(),
        password in "[a-zA-Z0-9 ]{6,24}",
    ) {
        let master = MasterKey::from_bytes(key_bytes);
        let secret = SecretString::from(password.as_str());
        let wrapper = wrap(&master, &secret, &FAST).unwrap();

        let recovered = unwrap(&wrapper, &secret, &FAST).unwrap();
        prop_assert_eq!(recovered.as_bytes(), master.as_bytes());
        prop_assert!(verify(&wrapper, &secret, &master, &FAST).is_ok());
    }

    #[test]
    fn wrong_password_never_unwraps(
        key_bytes in any::<[u8; 32]>(),
        password in "[a-z]{6,12}",
    ) {
        let master = MasterKey::from_bytes(key_bytes);
        let wrapper = wrap(&master, &SecretString::from(password.as_str()), &FAST).unwrap();
        let wrong = SecretString::from(format!("{password}X"));

        prop_assert!(matches!(unwrap(&wrapper, &wrong, &FAST), Err(ShareError::Password)));
        prop_assert!(matches!(verify(&wrapper, &wrong, &master, &FAST), Err(ShareError::Password)));
    }
}
