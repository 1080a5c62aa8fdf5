//! Session sweeper loop tests. Time is paused so intervals elapse instantly.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use backoffice_auth::session::SessionCleanup;
use backoffice_core::error::AppError;
use backoffice_core::result::AppResult;
use backoffice_database::MemorySessionStore;
use backoffice_database::store::{RevocationOutcome, RotationOutcome, SessionStore};
use backoffice_entity::session::{NewRefreshToken, NewSession, RefreshToken, Session};
use backoffice_worker::{SessionSweeper, SweeperState};

const HOUR: Duration = Duration::from_secs(3600);

fn expired_session(days_ago: i64) -> Session {
    let expires_at = Utc::now() - chrono::Duration::days(days_ago);
    Session {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        jwt_id: Uuid::new_v4().to_string(),
        token_hash: None,
        device_info: None,
        ip_address: None,
        created_at: expires_at - chrono::Duration::minutes(15),
        expires_at: Some(expires_at),
        is_active: true,
        revoked_at: None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_deletes_rows_past_retention() {
    let store = MemorySessionStore::new();
    let old = expired_session(8);
    let recent = expired_session(6);
    let recent_id = recent.id;
    store.seed_session(old).await;
    store.seed_session(recent).await;

    let cleanup = SessionCleanup::new(Arc::new(store.clone()), 7);
    let sweeper = Arc::new(SessionSweeper::new(cleanup, HOUR));
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn({
        let sweeper = sweeper.clone();
        async move { sweeper.run(rx).await }
    });

    tokio::time::sleep(HOUR + Duration::from_secs(1)).await;

    let remaining = store.all_sessions().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, recent_id);
    assert_eq!(sweeper.state(), SweeperState::Running);

    tx.send(true).unwrap();
    handle.await.unwrap();
    assert_eq!(sweeper.state(), SweeperState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_the_wait() {
    let store = MemorySessionStore::new();
    let cleanup = SessionCleanup::new(Arc::new(store), 7);
    let sweeper = Arc::new(SessionSweeper::new(cleanup, HOUR));
    let (tx, rx) = watch::channel(false);
    let mut state = sweeper.subscribe();

    let handle = tokio::spawn({
        let sweeper = sweeper.clone();
        async move { sweeper.run(rx).await }
    });

    state
        .wait_for(|s| *s == SweeperState::Running)
        .await
        .unwrap();
    tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("sweeper did not stop promptly")
        .unwrap();
    assert_eq!(sweeper.state(), SweeperState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_sender_stops_the_sweeper() {
    let cleanup = SessionCleanup::new(Arc::new(MemorySessionStore::new()), 7);
    let sweeper = SessionSweeper::new(cleanup, HOUR);
    let (tx, rx) = watch::channel(false);
    drop(tx);

    tokio::time::timeout(Duration::from_secs(1), sweeper.run(rx))
        .await
        .expect("sweeper did not stop after the sender was dropped");
}

/// Fails the first delete, then succeeds. Nothing else is called by the
/// cleanup cycle.
#[derive(Default)]
struct FlakyStore {
    calls: AtomicU32,
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn delete_stale(&self, _: DateTime<Utc>) -> AppResult<u64> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(AppError::database("connection reset"))
        } else {
            Ok(2)
        }
    }

    async fn find_by_correlation(&self, _: Uuid, _: &str) -> AppResult<Option<Session>> {
        unreachable!()
    }
    async fn find_active_by_user(&self, _: Uuid, _: DateTime<Utc>) -> AppResult<Vec<Session>> {
        unreachable!()
    }
    async fn has_active_session(&self, _: Uuid, _: DateTime<Utc>) -> AppResult<bool> {
        unreachable!()
    }
    async fn insert(&self, _: &NewSession) -> AppResult<Session> {
        unreachable!()
    }
    async fn renew(&self, _: Uuid, _: &str, _: DateTime<Utc>) -> AppResult<bool> {
        unreachable!()
    }
    async fn set_token_hash(&self, _: Uuid, _: &str) -> AppResult<bool> {
        unreachable!()
    }
    async fn rotate_sessions(
        &self,
        _: Uuid,
        _: &str,
        _: DateTime<Utc>,
        _: &NewSession,
    ) -> AppResult<RotationOutcome> {
        unreachable!()
    }
    async fn revoke_user_sessions(&self, _: Uuid, _: DateTime<Utc>) -> AppResult<RevocationOutcome> {
        unreachable!()
    }
    async fn find_stale(&self, _: DateTime<Utc>) -> AppResult<Vec<Session>> {
        unreachable!()
    }
    async fn insert_refresh_token(&self, _: &NewRefreshToken) -> AppResult<RefreshToken> {
        unreachable!()
    }
    async fn find_refresh_token_by_hash(&self, _: &str) -> AppResult<Option<RefreshToken>> {
        unreachable!()
    }
    async fn mark_refresh_token_used(&self, _: Uuid) -> AppResult<bool> {
        unreachable!()
    }
    async fn revoke_refresh_tokens(&self, _: &[String]) -> AppResult<u64> {
        unreachable!()
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_cycle_does_not_stop_the_loop() {
    let store = Arc::new(FlakyStore::default());
    let cleanup = SessionCleanup::new(store.clone(), 7);
    let sweeper = Arc::new(SessionSweeper::new(cleanup, HOUR));
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn({
        let sweeper = sweeper.clone();
        async move { sweeper.run(rx).await }
    });

    tokio::time::sleep(HOUR * 2 + Duration::from_secs(1)).await;
    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    assert_eq!(sweeper.state(), SweeperState::Running);

    tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_run_once_reports_errors_as_none() {
    let cleanup = SessionCleanup::new(Arc::new(FlakyStore::default()), 7);
    let sweeper = SessionSweeper::new(cleanup, HOUR);
    assert_eq!(sweeper.run_once().await, None);
    assert_eq!(sweeper.run_once().await, Some(2));
}
