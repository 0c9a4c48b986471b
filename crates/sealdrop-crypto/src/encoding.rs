//! Base64 transport encoding (standard alphabet, padded), as produced by `btoa`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sealdrop_core::{ShareError, ShareResult};

pub fn b64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode a base64 field of a server response. `field` names it in the error.
pub fn b64_decode(field: &str, s: &str) -> ShareResult<Vec<u8>> {
    if s.is_empty() {
        return Err(ShareError::protocol(format!("missing {field}")));
    }
    STANDARD
        .decode(s)
        .map_err(|e| ShareError::protocol(format!("{field} is not valid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_empty_is_protocol_error() {
        let err = b64_decode("iv", "").unwrap_err();
        assert!(matches!(err, ShareError::Protocol(_)));
        assert!(err.to_string().contains("missing iv"));
    }

    #[test]
    fn test_decode_garbage_names_field() {
        let err = b64_decode("salt", "not base64!").unwrap_err();
        assert!(err.to_string().contains("salt"));
    }

    #[test]
    fn test_encode_is_padded_standard() {
        assert_eq!(b64_encode(b"hello"), "aGVsbG8=");
        assert_eq!(b64_decode("x", "aGVsbG8=").unwrap(), b"hello");
    }
}
