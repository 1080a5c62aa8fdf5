//! Token hashing and authenticated encryption.

pub mod gcm;
pub mod hash;
pub mod keys;

pub use gcm::{decrypt_gcm, encrypt_gcm, validate_key};
pub use hash::{hash_token, verify_token};
pub use keys::KeyProvider;

use backoffice_core::error::{AppError, ErrorKind};
use thiserror::Error;

/// Errors produced by the token crypto primitives.
///
/// `AuthenticationFailed` is kept distinct from `Malformed` so callers can
/// tell a tampered or foreign payload apart from one that was never a
/// ciphertext at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// A required input was empty.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The key has the wrong length.
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// The cipher failed while encrypting.
    #[error("encryption failed: {0}")]
    Encryption(String),
    /// The payload is not a well-formed encrypted blob.
    #[error("malformed payload: {0}")]
    Malformed(String),
    /// The authentication tag did not verify.
    #[error("authentication tag verification failed")]
    AuthenticationFailed,
}

impl From<CryptoError> for AppError {
    fn from(err: CryptoError) -> Self {
        let kind = match &err {
            CryptoError::InvalidInput(_) | CryptoError::Malformed(_) => ErrorKind::Validation,
            CryptoError::InvalidKey(_) => ErrorKind::Configuration,
            CryptoError::Encryption(_) => ErrorKind::Internal,
            CryptoError::AuthenticationFailed => ErrorKind::Authentication,
        };
        AppError::with_source(kind, err.to_string(), err)
    }
}
