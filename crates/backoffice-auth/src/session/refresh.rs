//! Refresh-token issuance and single-use redemption.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use rand::RngCore;
use tracing::{info, warn};
use uuid::Uuid;

use backoffice_core::error::AppError;
use backoffice_core::result::AppResult;
use backoffice_entity::session::{NewRefreshToken, RefreshToken, SessionStatus};

use crate::crypto::KeyProvider;

use super::manager::SessionManager;

/// Size of a raw refresh token in bytes.
const TOKEN_BYTES: usize = 32;

/// A freshly issued refresh token. `token` is the only copy of the raw value.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    /// Raw token handed to the client.
    pub token: String,
    /// The stored record (digest only).
    pub record: RefreshToken,
}

/// Issues and redeems refresh tokens bound to sessions.
#[derive(Debug, Clone)]
pub struct RefreshTokenService {
    sessions: Arc<SessionManager>,
    keys: Arc<KeyProvider>,
}

impl RefreshTokenService {
    /// Creates a new refresh-token service.
    pub fn new(sessions: Arc<SessionManager>, keys: Arc<KeyProvider>) -> Self {
        Self { sessions, keys }
    }

    fn ttl(&self) -> Duration {
        let hours = self.sessions.config().refresh_token_ttl_hours;
        i64::try_from(hours)
            .ok()
            .and_then(Duration::try_hours)
            .unwrap_or(Duration::MAX)
    }

    /// Issue a refresh token for the session `(user_id, jwt_id)`.
    pub async fn issue(&self, user_id: Uuid, jwt_id: &str) -> AppResult<IssuedRefreshToken> {
        if jwt_id.is_empty() {
            return Err(AppError::validation("Session correlation id must not be empty"));
        }

        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);

        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.ttl())
            .ok_or_else(|| AppError::configuration("Refresh token TTL is out of range"))?;

        let record = self
            .sessions
            .store()
            .insert_refresh_token(&NewRefreshToken {
                user_id,
                jwt_id: jwt_id.to_string(),
                token_hash: self.keys.hash_token(&token)?,
                expires_at,
            })
            .await?;

        Ok(IssuedRefreshToken { token, record })
    }

    /// Redeem a raw refresh token exactly once.
    ///
    /// Presenting a token that was already redeemed revokes every session of
    /// its owner. An expired owning session is renewed with the configured
    /// maximum duration; an invalid one rejects the redemption.
    pub async fn redeem(&self, raw_token: &str) -> AppResult<RefreshToken> {
        let raw_token = raw_token.trim();
        if raw_token.is_empty() {
            return Err(AppError::authentication("Invalid refresh token"));
        }

        let digest = self.keys.hash_token(raw_token)?;
        let store = self.sessions.store();
        let record = store
            .find_refresh_token_by_hash(&digest)
            .await?
            .ok_or_else(|| AppError::authentication("Invalid refresh token"))?;

        if !self.keys.verify_token(raw_token, &record.token_hash) {
            return Err(AppError::authentication("Invalid refresh token"));
        }
        if record.is_expired_at(Utc::now()) {
            return Err(AppError::authentication("Refresh token has expired"));
        }
        if record.is_revoked {
            return Err(AppError::authentication("Refresh token has been revoked"));
        }
        if record.is_used {
            warn!(
                user_id = %record.user_id,
                token_id = %record.id,
                "Refresh token reuse detected, revoking all sessions"
            );
            self.sessions.revoke_session(record.user_id).await;
            return Err(AppError::authentication("Refresh token has already been used"));
        }

        match self
            .sessions
            .check_session_status(record.user_id, &record.jwt_id)
            .await
        {
            SessionStatus::Valid => {}
            SessionStatus::Expired => {
                self.sessions
                    .renew_expired_session(
                        record.user_id,
                        &record.jwt_id,
                        self.sessions.max_duration(),
                    )
                    .await;
            }
            SessionStatus::Invalid | SessionStatus::Error => {
                return Err(AppError::authentication("Session is no longer valid"));
            }
        }

        if !store.mark_refresh_token_used(record.id).await? {
            return Err(AppError::authentication("Refresh token has already been used"));
        }

        info!(user_id = %record.user_id, token_id = %record.id, "Refresh token redeemed");
        Ok(RefreshToken {
            is_used: true,
            ..record
        })
    }

    /// Redeem a refresh token and issue its successor for the same session.
    pub async fn rotate(&self, raw_token: &str) -> AppResult<IssuedRefreshToken> {
        let redeemed = self.redeem(raw_token).await?;
        self.issue(redeemed.user_id, &redeemed.jwt_id).await
    }
}
