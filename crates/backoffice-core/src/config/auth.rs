//! Token key material configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Key material for refresh-token hashing and bearer-token encryption.
///
/// Both keys are required. They default to empty strings here so that the
/// key provider can reject them with a precise configuration error at
/// startup instead of a generic deserialization failure.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC-SHA256 key for refresh-token digests (UTF-8 text).
    #[serde(default)]
    pub token_hmac_key: String,
    /// AES-256-GCM key for bearer-token encryption, base64-encoded
    /// (standard alphabet) 32 raw bytes.
    #[serde(default)]
    pub token_encryption_key: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_hmac_key", &"<redacted>")
            .field("token_encryption_key", &"<redacted>")
            .finish()
    }
}
