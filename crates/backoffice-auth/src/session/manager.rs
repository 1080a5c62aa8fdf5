//! Session lifecycle manager: registration, invalidation, renewal, and
//! status checks.
//!
//! Read-style operations never fail. Store errors are logged and mapped to
//! the conservative answer (`false`, `Invalid`/`Error`, empty list) so a
//! storage outage denies access instead of granting it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use backoffice_core::config::session::SessionConfig;
use backoffice_core::error::AppError;
use backoffice_core::result::AppResult;
use backoffice_database::store::SessionStore;
use backoffice_entity::session::{NewSession, Session, SessionStatus};

use crate::crypto::KeyProvider;

/// Optional client details recorded with a new session.
#[derive(Debug, Clone, Default)]
pub struct SessionMetadata {
    /// HMAC digest of the issued access token, when already computed.
    pub token_hash: Option<String>,
    /// Free-form device description.
    pub device_info: Option<String>,
    /// Client address.
    pub ip_address: Option<String>,
}

/// Manages the session lifecycle on top of a [`SessionStore`].
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    keys: Arc<KeyProvider>,
    config: SessionConfig,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .finish()
    }
}

/// Parse a user identifier received at an API boundary.
pub fn parse_user_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|e| AppError::validation(format!("Invalid user id '{raw}': {e}")))
}

/// Convert configured minutes into a duration, saturating on overflow.
pub(crate) fn minutes(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_minutes)
        .unwrap_or(Duration::MAX)
}

fn expiry_after(now: DateTime<Utc>, duration: Duration) -> AppResult<DateTime<Utc>> {
    now.checked_add_signed(duration)
        .ok_or_else(|| AppError::validation("Session duration is out of range"))
}

impl SessionManager {
    /// Creates a new session manager.
    pub fn new(store: Arc<dyn SessionStore>, keys: Arc<KeyProvider>, config: SessionConfig) -> Self {
        Self {
            store,
            keys,
            config,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Session lifecycle configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Configured upper bound on a session lifetime.
    pub fn max_duration(&self) -> Duration {
        minutes(self.config.max_duration_minutes)
    }

    /// Clamp a requested duration to the configured maximum.
    pub fn effective_duration(&self, requested: Duration) -> Duration {
        requested.min(self.max_duration())
    }

    /// Whether the session identified by `(user_id, jwt_id)` is valid now.
    pub async fn is_valid_session(&self, user_id: Uuid, jwt_id: &str) -> bool {
        if jwt_id.is_empty() {
            return false;
        }

        match self.store.find_by_correlation(user_id, jwt_id).await {
            Ok(Some(session)) => {
                let valid = session.is_valid_at(Utc::now());
                if !valid {
                    info!(
                        user_id = %user_id,
                        jwt_id = %jwt_id,
                        is_active = session.is_active,
                        expires_at = ?session.expires_at,
                        "Session validation failed"
                    );
                }
                valid
            }
            Ok(None) => {
                info!(user_id = %user_id, jwt_id = %jwt_id, "No session found");
                false
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to validate session");
                false
            }
        }
    }

    /// Whether the user has any valid session.
    pub async fn has_active_session(&self, user_id: Uuid) -> bool {
        match self.store.has_active_session(user_id, Utc::now()).await {
            Ok(found) => found,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to check active sessions");
                false
            }
        }
    }

    /// Insert a new active session expiring after `min(requested, max)`.
    ///
    /// Not idempotent: registering the same correlation id twice creates two
    /// rows.
    pub async fn register_session(
        &self,
        user_id: Uuid,
        jwt_id: &str,
        requested: Duration,
        metadata: SessionMetadata,
    ) -> AppResult<Uuid> {
        let data = self.new_session(user_id, jwt_id, requested, metadata, Utc::now())?;
        let session = self.store.insert(&data).await?;

        info!(
            user_id = %user_id,
            session_id = %session.id,
            expires_at = %data.expires_at,
            "Session registered"
        );
        Ok(session.id)
    }

    /// Revoke every other session of the user and make sure the current one
    /// exists, in one atomic step.
    ///
    /// Returns `None` when the rotation failed; in that case nothing was
    /// changed and the caller must deny access.
    pub async fn invalidate_previous_sessions(
        &self,
        user_id: Uuid,
        current_jwt_id: &str,
        duration: Duration,
        metadata: SessionMetadata,
    ) -> Option<Uuid> {
        let now = Utc::now();
        let data = match self.new_session(user_id, current_jwt_id, duration, metadata, now) {
            Ok(data) => data,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Rejected session rotation");
                return None;
            }
        };

        match self
            .store
            .rotate_sessions(user_id, current_jwt_id, now, &data)
            .await
        {
            Ok(outcome) => {
                info!(
                    user_id = %user_id,
                    session_id = %outcome.session_id,
                    reused = outcome.reused,
                    revoked_sessions = outcome.revoked_sessions,
                    revoked_tokens = outcome.revoked_tokens,
                    "Invalidated previous sessions"
                );
                Some(outcome.session_id)
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to invalidate previous sessions");
                None
            }
        }
    }

    /// Deactivate every session of the user and revoke their refresh tokens.
    ///
    /// Errors are logged and swallowed.
    pub async fn revoke_session(&self, user_id: Uuid) {
        match self.store.revoke_user_sessions(user_id, Utc::now()).await {
            Ok(outcome) => info!(
                user_id = %user_id,
                revoked_sessions = outcome.revoked_sessions,
                revoked_tokens = outcome.revoked_tokens,
                "Sessions revoked"
            ),
            Err(e) => error!(user_id = %user_id, error = %e, "Failed to revoke sessions"),
        }
    }

    /// Classify the session identified by `(user_id, jwt_id)`.
    pub async fn check_session_status(&self, user_id: Uuid, jwt_id: &str) -> SessionStatus {
        if jwt_id.is_empty() {
            return SessionStatus::Invalid;
        }

        match self.store.find_by_correlation(user_id, jwt_id).await {
            Ok(Some(session)) => session.status_at(Utc::now()),
            Ok(None) => {
                info!(user_id = %user_id, jwt_id = %jwt_id, "No session found");
                SessionStatus::Invalid
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to check session status");
                SessionStatus::Error
            }
        }
    }

    /// Set `expires_at = now + new_duration` and reactivate the session.
    ///
    /// Best-effort: a missing row is logged as a warning, errors are logged.
    pub async fn renew_expired_session(&self, user_id: Uuid, jwt_id: &str, new_duration: Duration) {
        if jwt_id.is_empty() {
            return;
        }

        let expires_at = match expiry_after(Utc::now(), new_duration) {
            Ok(at) => at,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Cannot renew session");
                return;
            }
        };

        match self.store.renew(user_id, jwt_id, expires_at).await {
            Ok(true) => info!(
                user_id = %user_id,
                expires_at = %expires_at,
                "Expired session renewed"
            ),
            Ok(false) => warn!(
                user_id = %user_id,
                jwt_id = %jwt_id,
                "Cannot renew session: no matching session"
            ),
            Err(e) => error!(user_id = %user_id, error = %e, "Failed to renew session"),
        }
    }

    /// List the user's valid sessions, newest first.
    pub async fn get_active_sessions(&self, user_id: Uuid) -> Vec<Session> {
        match self.store.find_active_by_user(user_id, Utc::now()).await {
            Ok(sessions) => sessions,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to list active sessions");
                Vec::new()
            }
        }
    }

    /// Record the HMAC digest of the access token issued for a session.
    pub async fn attach_token_hash(&self, session_id: Uuid, access_token: &str) -> AppResult<()> {
        let digest = self.keys.hash_token(access_token)?;
        if self.store.set_token_hash(session_id, &digest).await? {
            Ok(())
        } else {
            Err(AppError::not_found(format!("Session {session_id} not found")))
        }
    }

    fn new_session(
        &self,
        user_id: Uuid,
        jwt_id: &str,
        requested: Duration,
        metadata: SessionMetadata,
        now: DateTime<Utc>,
    ) -> AppResult<NewSession> {
        if jwt_id.is_empty() {
            return Err(AppError::validation("Session correlation id must not be empty"));
        }
        let effective = self.effective_duration(requested);
        if effective <= Duration::zero() {
            return Err(AppError::validation("Session duration must be positive"));
        }

        Ok(NewSession {
            user_id,
            jwt_id: jwt_id.to_string(),
            token_hash: metadata.token_hash,
            device_info: metadata.device_info,
            ip_address: metadata.ip_address,
            expires_at: expiry_after(now, effective)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoffice_database::MemorySessionStore;

    fn manager_with(store: MemorySessionStore, max_minutes: u64) -> SessionManager {
        let keys = KeyProvider::new(b"hmac-key", &[3u8; 32]).unwrap();
        let config = SessionConfig {
            max_duration_minutes: max_minutes,
            ..SessionConfig::default()
        };
        SessionManager::new(Arc::new(store), Arc::new(keys), config)
    }

    #[test]
    fn test_parse_user_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_user_id(&id.to_string()).unwrap(), id);
        let err = parse_user_id("not-a-guid").unwrap_err();
        assert_eq!(err.kind, backoffice_core::error::ErrorKind::Validation);
    }

    #[test]
    fn test_effective_duration_clamps() {
        let manager = manager_with(MemorySessionStore::new(), 15);
        assert_eq!(
            manager.effective_duration(Duration::minutes(60)),
            Duration::minutes(15)
        );
        assert_eq!(
            manager.effective_duration(Duration::minutes(5)),
            Duration::minutes(5)
        );
        assert_eq!(minutes(u64::MAX), Duration::MAX);
    }

    #[tokio::test]
    async fn test_register_clamps_to_max_duration() {
        let store = MemorySessionStore::new();
        let manager = manager_with(store.clone(), 5);
        let user = Uuid::new_v4();

        let before = Utc::now();
        let id = manager
            .register_session(user, "S1", Duration::minutes(10), SessionMetadata::default())
            .await
            .unwrap();
        let after = Utc::now();

        let session = store.find_by_correlation(user, "S1").await.unwrap().unwrap();
        assert_eq!(session.id, id);
        let expires_at = session.expires_at.unwrap();
        assert!(expires_at >= before + Duration::minutes(5));
        assert!(expires_at <= after + Duration::minutes(5));
        assert!(session.is_active);
    }

    #[tokio::test]
    async fn test_register_rejects_empty_correlation_id() {
        let manager = manager_with(MemorySessionStore::new(), 15);
        let err = manager
            .register_session(Uuid::new_v4(), "", Duration::minutes(1), SessionMetadata::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, backoffice_core::error::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_register_is_not_idempotent() {
        let store = MemorySessionStore::new();
        let manager = manager_with(store.clone(), 15);
        let user = Uuid::new_v4();

        let a = manager
            .register_session(user, "S1", Duration::minutes(1), SessionMetadata::default())
            .await
            .unwrap();
        let b = manager
            .register_session(user, "S1", Duration::minutes(1), SessionMetadata::default())
            .await
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(store.all_sessions().await.len(), 2);
    }

    #[tokio::test]
    async fn test_attach_token_hash() {
        let store = MemorySessionStore::new();
        let manager = manager_with(store.clone(), 15);
        let user = Uuid::new_v4();
        let id = manager
            .register_session(user, "S1", Duration::minutes(1), SessionMetadata::default())
            .await
            .unwrap();

        manager.attach_token_hash(id, "access.jwt.token").await.unwrap();
        let session = store.find_by_correlation(user, "S1").await.unwrap().unwrap();
        let digest = session.token_hash.unwrap();
        assert!(manager.keys.verify_token("access.jwt.token", &digest));

        let missing = manager.attach_token_hash(Uuid::new_v4(), "t").await.unwrap_err();
        assert_eq!(missing.kind, backoffice_core::error::ErrorKind::NotFound);
    }
}
