//! In-memory session store using a Tokio mutex for single-node runs and
//! tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use backoffice_core::error::AppError;
use backoffice_core::result::AppResult;
use backoffice_entity::session::{NewRefreshToken, NewSession, RefreshToken, Session};

use crate::store::{RevocationOutcome, RotationOutcome, SessionStore};

/// Rows held by the memory store.
#[derive(Debug, Clone, Default)]
struct InnerState {
    sessions: Vec<Session>,
    refresh_tokens: Vec<RefreshToken>,
}

impl InnerState {
    fn insert_session(&mut self, data: &NewSession, now: DateTime<Utc>) -> Session {
        let session = data.clone().into_session(Uuid::new_v4(), now);
        self.sessions.push(session.clone());
        session
    }

    fn revoke_tokens(&mut self, jwt_ids: &[String], only_unrevoked: bool) -> u64 {
        let mut count = 0;
        for token in self
            .refresh_tokens
            .iter_mut()
            .filter(|t| jwt_ids.contains(&t.jwt_id))
            .filter(|t| !only_unrevoked || !t.is_revoked)
        {
            token.is_revoked = true;
            token.is_used = true;
            count += 1;
        }
        count
    }

    /// Deactivate matching sessions. Returns how many were deactivated and
    /// their non-empty correlation ids.
    fn deactivate_sessions<F>(
        &mut self,
        revoked_at: DateTime<Utc>,
        predicate: F,
    ) -> (u64, Vec<String>)
    where
        F: Fn(&Session) -> bool,
    {
        let mut count = 0;
        let mut jwt_ids = Vec::new();
        for session in self
            .sessions
            .iter_mut()
            .filter(|s| s.is_active && predicate(s))
        {
            session.is_active = false;
            session.revoked_at = Some(revoked_at);
            count += 1;
            if !session.jwt_id.is_empty() {
                jwt_ids.push(session.jwt_id.clone());
            }
        }
        (count, jwt_ids)
    }
}

/// In-memory [`SessionStore`].
///
/// Every operation runs under one lock acquisition. Multi-step operations
/// work on a staged copy and only publish it once every step succeeded.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    state: Arc<Mutex<InnerState>>,
    fail_inserts: Arc<AtomicBool>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent session inserts fail with a database error, including
    /// the insert step of `rotate_sessions`.
    pub fn set_insert_failure(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of every stored session, active or not.
    pub async fn all_sessions(&self) -> Vec<Session> {
        self.state.lock().await.sessions.clone()
    }

    /// Snapshot of every stored refresh token.
    pub async fn all_refresh_tokens(&self) -> Vec<RefreshToken> {
        self.state.lock().await.refresh_tokens.clone()
    }

    /// Insert a fully specified session row, bypassing the usual defaults.
    pub async fn seed_session(&self, session: Session) {
        self.state.lock().await.sessions.push(session);
    }

    fn check_insert(&self) -> AppResult<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(AppError::database("Failed to insert session"));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn find_by_correlation(
        &self,
        user_id: Uuid,
        jwt_id: &str,
    ) -> AppResult<Option<Session>> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .iter()
            .find(|s| s.user_id == user_id && s.jwt_id == jwt_id)
            .cloned())
    }

    async fn find_active_by_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Session>> {
        let state = self.state.lock().await;
        let mut sessions: Vec<Session> = state
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id && s.is_valid_at(now))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn has_active_session(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .iter()
            .any(|s| s.user_id == user_id && s.is_valid_at(now)))
    }

    async fn insert(&self, data: &NewSession) -> AppResult<Session> {
        self.check_insert()?;
        let mut state = self.state.lock().await;
        Ok(state.insert_session(data, Utc::now()))
    }

    async fn renew(
        &self,
        user_id: Uuid,
        jwt_id: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state
            .sessions
            .iter_mut()
            .find(|s| s.user_id == user_id && s.jwt_id == jwt_id)
        {
            Some(session) => {
                session.expires_at = Some(expires_at);
                session.is_active = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_token_hash(&self, session_id: Uuid, token_hash: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.sessions.iter_mut().find(|s| s.id == session_id) {
            Some(session) => {
                session.token_hash = Some(token_hash.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn rotate_sessions(
        &self,
        user_id: Uuid,
        current_jwt_id: &str,
        revoked_at: DateTime<Utc>,
        data: &NewSession,
    ) -> AppResult<RotationOutcome> {
        let mut state = self.state.lock().await;
        let mut staged = state.clone();

        let (revoked_sessions, revoked_ids) = staged.deactivate_sessions(revoked_at, |s| {
            s.user_id == user_id && s.jwt_id != current_jwt_id
        });
        let revoked_tokens = staged.revoke_tokens(&revoked_ids, false);

        let existing = staged
            .sessions
            .iter()
            .find(|s| s.user_id == user_id && s.jwt_id == current_jwt_id)
            .map(|s| s.id);

        let (session_id, reused) = match existing {
            Some(id) => (id, true),
            None => {
                self.check_insert()?;
                (staged.insert_session(data, revoked_at).id, false)
            }
        };

        *state = staged;
        debug!(
            user_id = %user_id,
            revoked_sessions = revoked_sessions,
            revoked_tokens = revoked_tokens,
            "Rotated sessions"
        );

        Ok(RotationOutcome {
            session_id,
            reused,
            revoked_sessions,
            revoked_tokens,
        })
    }

    async fn revoke_user_sessions(
        &self,
        user_id: Uuid,
        revoked_at: DateTime<Utc>,
    ) -> AppResult<RevocationOutcome> {
        let mut state = self.state.lock().await;
        let (revoked_sessions, revoked_ids) =
            state.deactivate_sessions(revoked_at, |s| s.user_id == user_id);
        let revoked_tokens = state.revoke_tokens(&revoked_ids, true);

        Ok(RevocationOutcome {
            revoked_sessions,
            revoked_tokens,
        })
    }

    async fn find_stale(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Session>> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .iter()
            .filter(|s| s.is_stale(cutoff))
            .cloned()
            .collect())
    }

    async fn delete_stale(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let reaped: Vec<(Uuid, String)> = state
            .sessions
            .iter()
            .filter(|s| s.is_stale(cutoff))
            .map(|s| (s.user_id, s.jwt_id.clone()))
            .collect();
        state.sessions.retain(|s| !s.is_stale(cutoff));

        let tokens_before = state.refresh_tokens.len();
        state.refresh_tokens.retain(|t| {
            t.expires_at >= cutoff
                && !reaped
                    .iter()
                    .any(|(user_id, jwt_id)| *user_id == t.user_id && *jwt_id == t.jwt_id)
        });

        debug!(
            sessions = reaped.len(),
            refresh_tokens = tokens_before - state.refresh_tokens.len(),
            "Stale rows deleted"
        );
        Ok(reaped.len() as u64)
    }

    async fn insert_refresh_token(&self, data: &NewRefreshToken) -> AppResult<RefreshToken> {
        let mut state = self.state.lock().await;
        let token = data.clone().into_record(Uuid::new_v4(), Utc::now());
        state.refresh_tokens.push(token.clone());
        Ok(token)
    }

    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> AppResult<Option<RefreshToken>> {
        let state = self.state.lock().await;
        Ok(state
            .refresh_tokens
            .iter()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn mark_refresh_token_used(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state
            .refresh_tokens
            .iter_mut()
            .find(|t| t.id == id && !t.is_used && !t.is_revoked)
        {
            Some(token) => {
                token.is_used = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_refresh_tokens(&self, jwt_ids: &[String]) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        Ok(state.revoke_tokens(jwt_ids, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_session(user_id: Uuid, jwt_id: &str, expires_at: DateTime<Utc>) -> NewSession {
        NewSession {
            user_id,
            jwt_id: jwt_id.to_string(),
            token_hash: None,
            device_info: None,
            ip_address: None,
            expires_at,
        }
    }

    fn new_token(user_id: Uuid, jwt_id: &str, hash: &str) -> NewRefreshToken {
        NewRefreshToken {
            user_id,
            jwt_id: jwt_id.to_string(),
            token_hash: hash.to_string(),
            expires_at: Utc::now() + Duration::hours(24),
        }
    }

    #[tokio::test]
    async fn test_rotate_revokes_others_and_inserts_current() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        let now = Utc::now();
        let expiry = now + Duration::minutes(15);

        for jti in ["a", "b", "c"] {
            store.insert(&new_session(user, jti, expiry)).await.unwrap();
            store
                .insert_refresh_token(&new_token(user, jti, &format!("H-{jti}")))
                .await
                .unwrap();
        }

        let outcome = store
            .rotate_sessions(user, "d", now, &new_session(user, "d", expiry))
            .await
            .unwrap();

        assert!(!outcome.reused);
        assert_eq!(outcome.revoked_sessions, 3);
        assert_eq!(outcome.revoked_tokens, 3);

        let active = store.find_active_by_user(user, now).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].jwt_id, "d");
        assert_eq!(active[0].id, outcome.session_id);

        let tokens = store.all_refresh_tokens().await;
        assert!(tokens.iter().all(|t| t.is_revoked && t.is_used));
    }

    #[tokio::test]
    async fn test_rotate_reuses_existing_current_session() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        let now = Utc::now();
        let expiry = now + Duration::minutes(15);

        let current = store.insert(&new_session(user, "cur", expiry)).await.unwrap();
        let outcome = store
            .rotate_sessions(user, "cur", now, &new_session(user, "cur", expiry))
            .await
            .unwrap();

        assert!(outcome.reused);
        assert_eq!(outcome.session_id, current.id);
        assert_eq!(store.all_sessions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_rotate_failure_leaves_state_untouched() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        let now = Utc::now();
        let expiry = now + Duration::minutes(15);

        store.insert(&new_session(user, "old", expiry)).await.unwrap();
        store
            .insert_refresh_token(&new_token(user, "old", "H-old"))
            .await
            .unwrap();

        store.set_insert_failure(true);
        let result = store
            .rotate_sessions(user, "new", now, &new_session(user, "new", expiry))
            .await;
        assert!(result.is_err());

        let sessions = store.all_sessions().await;
        assert_eq!(sessions.len(), 1);
        assert!(sessions[0].is_active);
        assert!(sessions[0].revoked_at.is_none());
        let tokens = store.all_refresh_tokens().await;
        assert!(!tokens[0].is_revoked);
    }

    #[tokio::test]
    async fn test_mark_used_is_compare_and_set() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        let token = store
            .insert_refresh_token(&new_token(user, "j", "H"))
            .await
            .unwrap();

        assert!(store.mark_refresh_token_used(token.id).await.unwrap());
        assert!(!store.mark_refresh_token_used(token.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_user_sessions_skips_already_revoked_tokens() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        let expiry = Utc::now() + Duration::minutes(15);

        store.insert(&new_session(user, "j1", expiry)).await.unwrap();
        store.insert_refresh_token(&new_token(user, "j1", "H1")).await.unwrap();
        store.insert_refresh_token(&new_token(user, "j1", "H2")).await.unwrap();
        store.revoke_refresh_tokens(&["j1".to_string()]).await.unwrap();
        store.insert_refresh_token(&new_token(user, "j1", "H3")).await.unwrap();

        let outcome = store.revoke_user_sessions(user, Utc::now()).await.unwrap();
        assert_eq!(outcome.revoked_sessions, 1);
        assert_eq!(outcome.revoked_tokens, 1);
        assert!(!store.has_active_session(user, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_revocation_counts_include_sessions_without_correlation_id() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        let now = Utc::now();
        let expiry = now + Duration::minutes(15);

        store.insert(&new_session(user, "", expiry)).await.unwrap();
        store.insert(&new_session(user, "a", expiry)).await.unwrap();
        let rotated = store
            .rotate_sessions(user, "b", now, &new_session(user, "b", expiry))
            .await
            .unwrap();
        assert_eq!(rotated.revoked_sessions, 2);

        store.insert(&new_session(user, "", expiry)).await.unwrap();
        let revoked = store.revoke_user_sessions(user, now).await.unwrap();
        assert_eq!(revoked.revoked_sessions, 2);
    }

    #[tokio::test]
    async fn test_delete_stale_reaps_refresh_tokens() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        let now = Utc::now();
        let cutoff = now - Duration::days(7);

        store
            .insert(&new_session(user, "old", now - Duration::days(8)))
            .await
            .unwrap();
        store
            .insert(&new_session(user, "live", now + Duration::minutes(15)))
            .await
            .unwrap();
        store.insert_refresh_token(&new_token(user, "old", "H-old")).await.unwrap();
        store.insert_refresh_token(&new_token(user, "live", "H-live")).await.unwrap();
        store
            .insert_refresh_token(&NewRefreshToken {
                expires_at: now - Duration::days(9),
                ..new_token(user, "live", "H-lapsed")
            })
            .await
            .unwrap();

        let stale = store.find_stale(cutoff).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].jwt_id, "old");

        assert_eq!(store.delete_stale(cutoff).await.unwrap(), 1);

        let tokens = store.all_refresh_tokens().await;
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token_hash, "H-live");
        assert_eq!(store.all_sessions().await.len(), 1);
    }
}
