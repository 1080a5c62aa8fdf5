//! Session sweeper: periodic retention cleanup loop.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use backoffice_auth::session::SessionCleanup;
use backoffice_core::config::session::SessionConfig;

/// Lifecycle state of a sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweeperState {
    /// Not running (before start or after shutdown).
    Stopped,
    /// Inside the sweep loop.
    Running,
}

/// Runs a [`SessionCleanup`] cycle on a fixed interval until shut down.
#[derive(Debug)]
pub struct SessionSweeper {
    /// Cleanup cycle
    cleanup: SessionCleanup,
    /// Time between cycles
    interval: Duration,
    /// Published lifecycle state
    state: watch::Sender<SweeperState>,
}

impl SessionSweeper {
    /// Create a sweeper running `cleanup` every `interval`.
    pub fn new(cleanup: SessionCleanup, interval: Duration) -> Self {
        let (state, _) = watch::channel(SweeperState::Stopped);
        Self {
            cleanup,
            interval,
            state,
        }
    }

    /// Create a sweeper using the configured cleanup interval.
    pub fn from_config(cleanup: SessionCleanup, config: &SessionConfig) -> Self {
        Self::new(cleanup, config.cleanup_interval())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SweeperState {
        *self.state.borrow()
    }

    /// Subscribe to lifecycle state changes.
    pub fn subscribe(&self) -> watch::Receiver<SweeperState> {
        self.state.subscribe()
    }

    /// Run until the cancel signal turns `true` or its sender is dropped.
    ///
    /// Shutdown interrupts the wait between cycles. A cycle that has already
    /// started runs to completion.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        if *cancel.borrow() {
            return;
        }

        self.state.send_replace(SweeperState::Running);
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Session sweeper started"
        );

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        tracing::info!("Session sweeper received shutdown signal");
                        break;
                    }
                }
                _ = time::sleep(self.interval) => {
                    self.run_once().await;
                }
            }
        }

        self.state.send_replace(SweeperState::Stopped);
        tracing::info!("Session sweeper stopped");
    }

    /// Run a single cycle, logging the outcome. Errors never escape.
    pub async fn run_once(&self) -> Option<u64> {
        match self.cleanup.run_cleanup().await {
            Ok(deleted) => {
                tracing::info!(count = deleted, "Session sweep completed");
                Some(deleted)
            }
            Err(e) => {
                tracing::error!(error = %e, "Session sweep failed");
                None
            }
        }
    }
}
