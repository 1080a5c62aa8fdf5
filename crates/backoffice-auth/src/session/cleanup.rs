//! Retention cleanup of expired and revoked sessions.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use backoffice_core::error::AppError;
use backoffice_database::store::SessionStore;

/// Deletes session rows that have been expired or revoked for longer than
/// the retention window.
#[derive(Clone)]
pub struct SessionCleanup {
    store: Arc<dyn SessionStore>,
    retention: Duration,
}

impl std::fmt::Debug for SessionCleanup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCleanup")
            .field("retention", &self.retention)
            .finish()
    }
}

impl SessionCleanup {
    /// Creates a new cleanup handler keeping rows for `retention_days`.
    pub fn new(store: Arc<dyn SessionStore>, retention_days: u64) -> Self {
        let retention = i64::try_from(retention_days)
            .ok()
            .and_then(Duration::try_days)
            .unwrap_or(Duration::MAX);
        Self { store, retention }
    }

    /// Runs one cleanup cycle against the current time.
    ///
    /// Returns the number of sessions deleted.
    pub async fn run_cleanup(&self) -> Result<u64, AppError> {
        self.run_cleanup_at(Utc::now()).await
    }

    /// Runs one cleanup cycle as if the current time were `now`.
    ///
    /// The delete happens in a single store transaction; on error nothing is
    /// removed and the batch is picked up by the next cycle.
    pub async fn run_cleanup_at(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let cutoff = now
            .checked_sub_signed(self.retention)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let deleted = self.store.delete_stale(cutoff).await?;
        if deleted > 0 {
            info!(count = deleted, cutoff = %cutoff, "Deleted stale sessions");
        } else {
            debug!(cutoff = %cutoff, "No stale sessions to delete");
        }
        Ok(deleted)
    }
}
