//! Refresh-token record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A stored refresh token. Only the HMAC digest of the raw token is kept.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshToken {
    /// Unique record identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Correlation id shared with the owning session.
    pub jwt_id: String,
    /// Uppercase hex HMAC-SHA256 digest of the raw token.
    pub token_hash: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
    /// Revoked tokens never grant access again.
    pub is_revoked: bool,
    /// Set once the token has been redeemed.
    pub is_used: bool,
    /// When the token was issued.
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Whether the token has passed its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Data required to store a newly issued refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRefreshToken {
    /// Owning user.
    pub user_id: Uuid,
    /// Correlation id shared with the owning session.
    pub jwt_id: String,
    /// Digest of the raw token.
    pub token_hash: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}

impl NewRefreshToken {
    /// Materialize the record as it will be stored.
    pub fn into_record(self, id: Uuid, now: DateTime<Utc>) -> RefreshToken {
        RefreshToken {
            id,
            user_id: self.user_id,
            jwt_id: self.jwt_id,
            token_hash: self.token_hash,
            expires_at: self.expires_at,
            is_revoked: false,
            is_used: false,
            created_at: now,
        }
    }
}
