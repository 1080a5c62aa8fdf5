//! Embedded schema migrations for `user_sessions` and `refresh_tokens`.

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::info;

use backoffice_core::error::{AppError, ErrorKind};

/// Migrations compiled in from the workspace `migrations/` directory.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Apply every pending migration. Already-applied ones are skipped.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    MIGRATOR.run(pool).await.map_err(|e| {
        AppError::with_source(ErrorKind::Database, format!("Migration failed: {e}"), e)
    })?;

    info!(known = MIGRATOR.iter().count(), "Schema is up to date");
    Ok(())
}
