//! Session lifecycle and sweeper settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Session lifetime, retention and refresh-token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Upper bound on any session lifetime, in minutes. Requested durations
    /// longer than this are clamped.
    #[serde(default = "default_max_duration")]
    pub max_duration_minutes: u64,
    /// Minutes between sweeper cycles.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_minutes: u64,
    /// Days an expired or revoked row is kept before the sweeper deletes it.
    #[serde(default = "default_retention")]
    pub retention_days: u64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_hours: u64,
}

impl SessionConfig {
    /// Wall-clock wait between sweeper cycles.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_minutes.saturating_mul(60))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_duration_minutes: default_max_duration(),
            cleanup_interval_minutes: default_cleanup_interval(),
            retention_days: default_retention(),
            refresh_token_ttl_hours: default_refresh_ttl(),
        }
    }
}

/// Whether this process runs background tasks. Disable on all but one
/// replica when several share a database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_enabled")]
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_worker_enabled(),
        }
    }
}

fn default_max_duration() -> u64 {
    15
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_retention() -> u64 {
    7
}

fn default_refresh_ttl() -> u64 {
    24
}

fn default_worker_enabled() -> bool {
    true
}
