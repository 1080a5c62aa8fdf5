//! HMAC-SHA256 digests for refresh and access tokens.
//!
//! Digests are rendered as uppercase hexadecimal. Verification recomputes the
//! MAC and compares it in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Compute the uppercase hex HMAC-SHA256 of `token` under `key`.
pub fn hash_token(token: &str, key: &[u8]) -> Result<String, CryptoError> {
    if token.is_empty() {
        return Err(CryptoError::InvalidInput("token must not be empty".into()));
    }
    if key.is_empty() {
        return Err(CryptoError::InvalidInput("HMAC key must not be empty".into()));
    }

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| CryptoError::InvalidKey(format!("HMAC key rejected: {e}")))?;
    mac.update(token.as_bytes());
    Ok(hex::encode_upper(mac.finalize().into_bytes()))
}

/// Check `token` against a stored digest.
///
/// Returns `false` for empty inputs or a digest that is not hex; never
/// errors.
pub fn verify_token(token: &str, stored_digest: &str, key: &[u8]) -> bool {
    if token.is_empty() || stored_digest.is_empty() || key.is_empty() {
        return false;
    }
    let Ok(expected) = hex::decode(stored_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    mac.update(token.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"refresh-token-hmac-key";

    #[test]
    fn test_hash_is_deterministic_uppercase_hex() {
        let a = hash_token("abc.def.ghi", KEY).unwrap();
        let b = hash_token("abc.def.ghi", KEY).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert!(verify_token("abc.def.ghi", &a, KEY));
    }

    #[test]
    fn test_single_bit_change_fails_verification() {
        let token = "refresh-token-value";
        let digest = hash_token(token, KEY).unwrap();

        let mut bytes = token.as_bytes().to_vec();
        bytes[0] ^= 0x01;
        let mutated = String::from_utf8(bytes).unwrap();
        assert!(!verify_token(&mutated, &digest, KEY));

        let mut digest_bytes = hex::decode(&digest).unwrap();
        digest_bytes[31] ^= 0x80;
        assert!(!verify_token(token, &hex::encode_upper(digest_bytes), KEY));
    }

    #[test]
    fn test_different_key_produces_different_digest() {
        let a = hash_token("t", KEY).unwrap();
        let b = hash_token("t", b"another-key").unwrap();
        assert_ne!(a, b);
        assert!(!verify_token("t", &a, b"another-key"));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(matches!(
            hash_token("", KEY),
            Err(CryptoError::InvalidInput(_))
        ));
        assert!(matches!(
            hash_token("t", b""),
            Err(CryptoError::InvalidInput(_))
        ));
        assert!(!verify_token("", "AB", KEY));
        assert!(!verify_token("t", "", KEY));
        assert!(!verify_token("t", "not-hex", KEY));
    }

    #[test]
    fn test_lowercase_digest_still_verifies() {
        let digest = hash_token("t", KEY).unwrap().to_lowercase();
        assert!(verify_token("t", &digest, KEY));
    }
}
