//! PostgreSQL session store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use backoffice_core::error::{AppError, ErrorKind};
use backoffice_core::result::AppResult;
use backoffice_entity::session::{NewRefreshToken, NewSession, RefreshToken, Session};

use crate::store::{RevocationOutcome, RotationOutcome, SessionStore};

const STALE_PREDICATE: &str = "(expires_at IS NOT NULL AND expires_at < $1) \
     OR (is_active = FALSE AND revoked_at IS NOT NULL AND revoked_at < $1)";

/// Session and refresh-token storage backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Create a new PostgreSQL session store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(message: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Database, message, e)
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn find_by_correlation(
        &self,
        user_id: Uuid,
        jwt_id: &str,
    ) -> AppResult<Option<Session>> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM user_sessions WHERE user_id = $1 AND jwt_id = $2 LIMIT 1",
        )
        .bind(user_id)
        .bind(jwt_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to find session"))
    }

    async fn find_active_by_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Session>> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM user_sessions \
             WHERE user_id = $1 AND is_active AND expires_at IS NOT NULL AND expires_at > $2 \
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to find active sessions"))
    }

    async fn has_active_session(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM user_sessions \
             WHERE user_id = $1 AND is_active AND expires_at IS NOT NULL AND expires_at > $2)",
        )
        .bind(user_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("Failed to check active sessions"))
    }

    async fn insert(&self, data: &NewSession) -> AppResult<Session> {
        sqlx::query_as::<_, Session>(
            "INSERT INTO user_sessions (user_id, jwt_id, token_hash, device_info, ip_address, expires_at, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6, TRUE) RETURNING *",
        )
        .bind(data.user_id)
        .bind(&data.jwt_id)
        .bind(&data.token_hash)
        .bind(&data.device_info)
        .bind(&data.ip_address)
        .bind(data.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("Failed to create session"))
    }

    async fn renew(
        &self,
        user_id: Uuid,
        jwt_id: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE user_sessions SET expires_at = $3, is_active = TRUE \
             WHERE user_id = $1 AND jwt_id = $2",
        )
        .bind(user_id)
        .bind(jwt_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to renew session"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_token_hash(&self, session_id: Uuid, token_hash: &str) -> AppResult<bool> {
        let result = sqlx::query("UPDATE user_sessions SET token_hash = $2 WHERE id = $1")
            .bind(session_id)
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to store session token hash"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn rotate_sessions(
        &self,
        user_id: Uuid,
        current_jwt_id: &str,
        revoked_at: DateTime<Utc>,
        data: &NewSession,
    ) -> AppResult<RotationOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin transaction"))?;

        let revoked_ids: Vec<String> = sqlx::query_scalar(
            "UPDATE user_sessions SET is_active = FALSE, revoked_at = $3 \
             WHERE user_id = $1 AND jwt_id <> $2 AND is_active \
             RETURNING jwt_id",
        )
        .bind(user_id)
        .bind(current_jwt_id)
        .bind(revoked_at)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err("Failed to deactivate previous sessions"))?;

        let revoked_sessions = revoked_ids.len() as u64;
        let revoked_ids: Vec<String> = revoked_ids.into_iter().filter(|j| !j.is_empty()).collect();

        let revoked_tokens = sqlx::query(
            "UPDATE refresh_tokens SET is_revoked = TRUE, is_used = TRUE WHERE jwt_id = ANY($1)",
        )
        .bind(&revoked_ids)
        .execute(&mut *tx)
        .await
        .map_err(db_err("Failed to revoke refresh tokens"))?
        .rows_affected();

        let existing: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM user_sessions WHERE user_id = $1 AND jwt_id = $2 LIMIT 1",
        )
        .bind(user_id)
        .bind(current_jwt_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err("Failed to find current session"))?;

        let (session_id, reused) = match existing {
            Some(id) => (id, true),
            None => {
                let id: Uuid = sqlx::query_scalar(
                    "INSERT INTO user_sessions (user_id, jwt_id, token_hash, device_info, ip_address, expires_at, is_active) \
                     VALUES ($1, $2, $3, $4, $5, $6, TRUE) RETURNING id",
                )
                .bind(data.user_id)
                .bind(&data.jwt_id)
                .bind(&data.token_hash)
                .bind(&data.device_info)
                .bind(&data.ip_address)
                .bind(data.expires_at)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_err("Failed to register current session"))?;
                (id, false)
            }
        };

        tx.commit()
            .await
            .map_err(db_err("Failed to commit session rotation"))?;

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
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin transaction"))?;

        let revoked_ids: Vec<String> = sqlx::query_scalar(
            "UPDATE user_sessions SET is_active = FALSE, revoked_at = $2 \
             WHERE user_id = $1 AND is_active RETURNING jwt_id",
        )
        .bind(user_id)
        .bind(revoked_at)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err("Failed to revoke sessions"))?;

        let revoked_sessions = revoked_ids.len() as u64;
        let revoked_ids: Vec<String> = revoked_ids.into_iter().filter(|j| !j.is_empty()).collect();

        let revoked_tokens = sqlx::query(
            "UPDATE refresh_tokens SET is_revoked = TRUE, is_used = TRUE \
             WHERE jwt_id = ANY($1) AND is_revoked = FALSE",
        )
        .bind(&revoked_ids)
        .execute(&mut *tx)
        .await
        .map_err(db_err("Failed to revoke refresh tokens"))?
        .rows_affected();

        tx.commit()
            .await
            .map_err(db_err("Failed to commit session revocation"))?;

        Ok(RevocationOutcome {
            revoked_sessions,
            revoked_tokens,
        })
    }

    async fn find_stale(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Session>> {
        sqlx::query_as::<_, Session>(&format!(
            "SELECT * FROM user_sessions WHERE {STALE_PREDICATE}"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to find stale sessions"))
    }

    async fn delete_stale(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin transaction"))?;

        let stale: Vec<Uuid> = sqlx::query_scalar(&format!(
            "SELECT id FROM user_sessions WHERE {STALE_PREDICATE} FOR UPDATE"
        ))
        .bind(cutoff)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err("Failed to select stale sessions"))?;

        let deleted_tokens = sqlx::query(
            "DELETE FROM refresh_tokens t WHERE t.expires_at < $1 \
             OR EXISTS (SELECT 1 FROM user_sessions s \
                        WHERE s.id = ANY($2) AND s.user_id = t.user_id AND s.jwt_id = t.jwt_id)",
        )
        .bind(cutoff)
        .bind(&stale)
        .execute(&mut *tx)
        .await
        .map_err(db_err("Failed to delete stale refresh tokens"))?
        .rows_affected();

        let deleted = if stale.is_empty() {
            0
        } else {
            sqlx::query("DELETE FROM user_sessions WHERE id = ANY($1)")
                .bind(&stale)
                .execute(&mut *tx)
                .await
                .map_err(db_err("Failed to delete stale sessions"))?
                .rows_affected()
        };

        tx.commit()
            .await
            .map_err(db_err("Failed to commit stale session cleanup"))?;

        debug!(sessions = deleted, refresh_tokens = deleted_tokens, "Stale rows deleted");
        Ok(deleted)
    }

    async fn insert_refresh_token(&self, data: &NewRefreshToken) -> AppResult<RefreshToken> {
        sqlx::query_as::<_, RefreshToken>(
            "INSERT INTO refresh_tokens (user_id, jwt_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(data.user_id)
        .bind(&data.jwt_id)
        .bind(&data.token_hash)
        .bind(data.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("Failed to store refresh token"))
    }

    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> AppResult<Option<RefreshToken>> {
        sqlx::query_as::<_, RefreshToken>("SELECT * FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to find refresh token"))
    }

    async fn mark_refresh_token_used(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET is_used = TRUE \
             WHERE id = $1 AND is_used = FALSE AND is_revoked = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to mark refresh token used"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_refresh_tokens(&self, jwt_ids: &[String]) -> AppResult<u64> {
        if jwt_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE refresh_tokens SET is_revoked = TRUE, is_used = TRUE WHERE jwt_id = ANY($1)",
        )
        .bind(jwt_ids)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to revoke refresh tokens"))?;
        Ok(result.rows_affected())
    }
}
