//! Startup-loaded key material.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};

use backoffice_core::config::auth::AuthConfig;
use backoffice_core::error::AppError;
use backoffice_core::result::AppResult;

use super::CryptoError;
use super::gcm::{self, KEY_SIZE};
use super::hash;

/// Holds the HMAC and AES keys for the lifetime of the process.
///
/// Built once from configuration and shared behind an `Arc`. Keys are never
/// rotated in place and never appear in `Debug` output.
#[derive(Clone)]
pub struct KeyProvider {
    hmac_key: Vec<u8>,
    encryption_key: [u8; KEY_SIZE],
}

impl fmt::Debug for KeyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyProvider")
            .field("hmac_key", &"<redacted>")
            .field("encryption_key", &"<redacted>")
            .finish()
    }
}

impl KeyProvider {
    /// Load keys from configuration, failing fast when either is missing or
    /// the encryption key is not 32 bytes.
    pub fn from_config(config: &AuthConfig) -> AppResult<Self> {
        let hmac_key = config.token_hmac_key.trim();
        if hmac_key.is_empty() {
            return Err(AppError::configuration(
                "Token HMAC key not configured. Set auth.token_hmac_key",
            ));
        }

        let encoded = config.token_encryption_key.trim();
        if encoded.is_empty() {
            return Err(AppError::configuration(
                "Token encryption key not configured. Set auth.token_encryption_key",
            ));
        }
        let raw = STANDARD.decode(encoded).map_err(|e| {
            AppError::configuration(format!("Token encryption key is not valid base64: {e}"))
        })?;

        Self::new(hmac_key.as_bytes(), &raw)
    }

    /// Build a provider from raw key bytes.
    pub fn new(hmac_key: &[u8], encryption_key: &[u8]) -> AppResult<Self> {
        if hmac_key.is_empty() {
            return Err(AppError::configuration("Token HMAC key must not be empty"));
        }
        gcm::validate_key(encryption_key, "Token encryption key")?;

        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(encryption_key);
        Ok(Self {
            hmac_key: hmac_key.to_vec(),
            encryption_key: key,
        })
    }

    /// HMAC digest of a token.
    pub fn hash_token(&self, token: &str) -> Result<String, CryptoError> {
        hash::hash_token(token, &self.hmac_key)
    }

    /// Constant-time check of a token against a stored digest.
    pub fn verify_token(&self, token: &str, stored_digest: &str) -> bool {
        hash::verify_token(token, stored_digest, &self.hmac_key)
    }

    /// Encrypt a token for cross-service forwarding.
    pub fn encrypt_token(&self, token: &str) -> Result<String, CryptoError> {
        gcm::encrypt_gcm(token, &self.encryption_key)
    }

    /// Decrypt a token produced by [`KeyProvider::encrypt_token`].
    pub fn decrypt_token(&self, payload: &str) -> Result<String, CryptoError> {
        gcm::decrypt_gcm(payload, &self.encryption_key)
    }
}
