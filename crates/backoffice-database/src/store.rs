//! Session store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use backoffice_core::result::AppResult;
use backoffice_entity::session::{NewRefreshToken, NewSession, RefreshToken, Session};

/// Result of rotating a user's sessions around a current correlation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationOutcome {
    /// Identifier of the current session (reused or newly inserted).
    pub session_id: Uuid,
    /// Whether the current session already existed.
    pub reused: bool,
    /// Number of other sessions deactivated.
    pub revoked_sessions: u64,
    /// Number of refresh tokens revoked alongside them.
    pub revoked_tokens: u64,
}

/// Result of revoking every active session of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RevocationOutcome {
    /// Number of sessions deactivated.
    pub revoked_sessions: u64,
    /// Number of refresh tokens revoked.
    pub revoked_tokens: u64,
}

/// Durable storage for sessions and refresh tokens.
///
/// Multi-row operations (`rotate_sessions`, `revoke_user_sessions`,
/// `delete_stale`) must be atomic: either every change is applied or none
/// is. Two implementations are provided:
/// - PostgreSQL (one transaction per operation)
/// - In-memory (one critical section per operation)
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Find a session by user and correlation id.
    async fn find_by_correlation(&self, user_id: Uuid, jwt_id: &str)
    -> AppResult<Option<Session>>;

    /// List the user's sessions that are valid at `now`, newest first.
    async fn find_active_by_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Session>>;

    /// Whether the user has at least one session valid at `now`.
    async fn has_active_session(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<bool>;

    /// Insert a new active session.
    async fn insert(&self, data: &NewSession) -> AppResult<Session>;

    /// Set the expiry of a session and reactivate it. Returns `false` when no
    /// row matches.
    async fn renew(
        &self,
        user_id: Uuid,
        jwt_id: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Store the access-token digest on a session. Returns `false` when no
    /// row matches.
    async fn set_token_hash(&self, session_id: Uuid, token_hash: &str) -> AppResult<bool>;

    /// Deactivate every other active session of the user, revoke and mark
    /// used every refresh token sharing their correlation ids, and make sure
    /// a session for `current_jwt_id` exists (reusing it if present,
    /// inserting `data` otherwise).
    async fn rotate_sessions(
        &self,
        user_id: Uuid,
        current_jwt_id: &str,
        revoked_at: DateTime<Utc>,
        data: &NewSession,
    ) -> AppResult<RotationOutcome>;

    /// Deactivate every active session of the user and revoke the
    /// not-yet-revoked refresh tokens sharing their correlation ids.
    async fn revoke_user_sessions(
        &self,
        user_id: Uuid,
        revoked_at: DateTime<Utc>,
    ) -> AppResult<RevocationOutcome>;

    /// List sessions that expired, or were deactivated, before `cutoff`.
    async fn find_stale(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Session>>;

    /// Delete the rows `find_stale` would return, together with the refresh
    /// tokens of those sessions and any refresh token that expired before
    /// `cutoff`. Returns the number of sessions deleted.
    async fn delete_stale(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;

    /// Store a newly issued refresh token.
    async fn insert_refresh_token(&self, data: &NewRefreshToken) -> AppResult<RefreshToken>;

    /// Find a refresh token by its digest.
    async fn find_refresh_token_by_hash(&self, token_hash: &str)
    -> AppResult<Option<RefreshToken>>;

    /// Mark a refresh token used, only if it is neither used nor revoked.
    /// Returns `false` when another redemption won the race.
    async fn mark_refresh_token_used(&self, id: Uuid) -> AppResult<bool>;

    /// Revoke and mark used every refresh token with one of the given
    /// correlation ids.
    async fn revoke_refresh_tokens(&self, jwt_ids: &[String]) -> AppResult<u64>;
}
