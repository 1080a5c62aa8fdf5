//! Session entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::status::SessionStatus;

/// A login session bound to one issued access token.
///
/// A session is keyed for lookups by `(user_id, jwt_id)`, the correlation
/// id shared with the access token and its refresh tokens. Neither is
/// updated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    /// Unique session identifier.
    pub id: Uuid,
    /// The user this session belongs to.
    pub user_id: Uuid,
    /// Correlation id of the access token (`jti`).
    pub jwt_id: String,
    /// HMAC digest of the access token. Never the raw token.
    pub token_hash: Option<String>,
    /// Free-form client description.
    pub device_info: Option<String>,
    /// Client address as reported by the edge.
    pub ip_address: Option<String>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Expiry instant. Absent means it was never computed.
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the session may still grant access.
    pub is_active: bool,
    /// When the session was deactivated, if ever.
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A session is valid iff it is active and its expiry is set and later
    /// than `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_some_and(|exp| exp > now)
    }

    /// Derive the coarse status of this session at `now`.
    pub fn status_at(&self, now: DateTime<Utc>) -> SessionStatus {
        if !self.is_active {
            SessionStatus::Invalid
        } else if self.is_valid_at(now) {
            SessionStatus::Valid
        } else {
            SessionStatus::Expired
        }
    }

    /// Whether the row is eligible for deletion at the given retention
    /// cutoff: expired before it, or deactivated before it.
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        let expired = self.expires_at.is_some_and(|exp| exp < cutoff);
        let revoked = !self.is_active && self.revoked_at.is_some_and(|at| at < cutoff);
        expired || revoked
    }
}

/// Data required to create a new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSession {
    /// The user this session belongs to.
    pub user_id: Uuid,
    /// Correlation id of the access token.
    pub jwt_id: String,
    /// HMAC digest of the access token, when already known.
    pub token_hash: Option<String>,
    /// Free-form client description.
    pub device_info: Option<String>,
    /// Client address.
    pub ip_address: Option<String>,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}

impl NewSession {
    /// Materialize the row as it will be stored.
    pub fn into_session(self, id: Uuid, now: DateTime<Utc>) -> Session {
        Session {
            id,
            user_id: self.user_id,
            jwt_id: self.jwt_id,
            token_hash: self.token_hash,
            device_info: self.device_info,
            ip_address: self.ip_address,
            created_at: now,
            expires_at: Some(self.expires_at),
            is_active: true,
            revoked_at: None,
        }
    }
}
