//! Configuration for the back-office server.
//!
//! Sources, later ones winning:
//! 1. `config/default.toml`
//! 2. `config/{env}.toml`
//! 3. `BACKOFFICE__SECTION__KEY` environment variables

pub mod app;
pub mod auth;
pub mod database;
pub mod gateway;
pub mod logging;
pub mod session;

use serde::{Deserialize, Serialize};

use self::app::ServerConfig;
use self::auth::AuthConfig;
use self::database::DatabaseConfig;
use self::gateway::GatewayConfig;
use self::logging::LoggingConfig;
use self::session::{SessionConfig, WorkerConfig};

use crate::error::AppError;

/// Root configuration. Only `database.url` has no default; the auth keys
/// default to empty and are rejected when the key provider is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Merge every source for environment `env`, then validate.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config: Self = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("BACKOFFICE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the session lifecycle or the gateway
    /// misbehave at runtime.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.session.max_duration_minutes == 0 {
            return Err(AppError::configuration(
                "session.max_duration_minutes must be greater than zero",
            ));
        }
        if self.session.cleanup_interval_minutes == 0 {
            return Err(AppError::configuration(
                "session.cleanup_interval_minutes must be greater than zero",
            ));
        }
        if self.session.refresh_token_ttl_hours == 0 {
            return Err(AppError::configuration(
                "session.refresh_token_ttl_hours must be greater than zero",
            ));
        }
        if self.gateway.timeout_seconds == 0 {
            return Err(AppError::configuration(
                "gateway.timeout_seconds must be greater than zero",
            ));
        }
        if let Some(route) = self.gateway.routes.iter().find(|r| !r.prefix.starts_with('/')) {
            return Err(AppError::configuration(format!(
                "gateway route prefix '{}' must start with '/'",
                route.prefix
            )));
        }
        Ok(())
    }
}
