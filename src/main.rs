//! Back-office server: session integrity services and the API gateway.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use backoffice_auth::{KeyProvider, SessionCleanup};
use backoffice_core::config::AppConfig;
use backoffice_core::config::logging::LogFormat;
use backoffice_core::error::AppError;
use backoffice_database::{DatabasePool, PgSessionStore, SessionStore};
use backoffice_gateway::{GatewayForwarder, GatewayState, ReqwestTransport};
use backoffice_server::{AppState, build_router};
use backoffice_worker::SessionSweeper;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Load configuration from files and environment.
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("BACKOFFICE_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting back-office server v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Key material (fail fast) ─────────────────────────
    let keys = Arc::new(KeyProvider::from_config(&config.auth)?);
    tracing::info!("Token keys loaded");

    // ── Step 2: Database connection + migrations ─────────────────
    let db_pool = DatabasePool::connect(&config.database).await?;
    if config.database.run_migrations {
        tracing::info!("Running database migrations...");
        backoffice_database::migration::run_migrations(db_pool.pool()).await?;
        tracing::info!("Database migrations complete");
    }

    // ── Step 3: Session store ────────────────────────────────────
    let store: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(db_pool.pool().clone()));
    tracing::info!(
        max_duration_minutes = config.session.max_duration_minutes,
        retention_days = config.session.retention_days,
        "Session store ready"
    );

    // ── Step 4: Gateway ──────────────────────────────────────────
    let transport = ReqwestTransport::new(Duration::from_secs(config.gateway.timeout_seconds))?;
    let forwarder = GatewayForwarder::new(Arc::new(transport), Arc::clone(&keys), &config.gateway)?;
    let gateway = GatewayState::new(Arc::new(forwarder), Arc::new(config.gateway.clone()));
    for route in &config.gateway.routes {
        match &route.base_url {
            Some(url) => tracing::info!(prefix = %route.prefix, target = %url, "Gateway route"),
            None => tracing::info!(prefix = %route.prefix, "Gateway route has no target, serving locally"),
        }
    }

    // ── Step 5: Background sweeper ───────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper_handle = if config.worker.enabled {
        let cleanup = SessionCleanup::new(Arc::clone(&store), config.session.retention_days);
        let sweeper = SessionSweeper::from_config(cleanup, &config.session);
        let cancel = shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            sweeper.run(cancel).await;
        });
        tracing::info!("Session sweeper started");
        Some(handle)
    } else {
        tracing::info!("Session sweeper disabled");
        None
    };

    // ── Step 6: Build and start HTTP server ──────────────────────
    let app_state = AppState {
        db_pool: Some(db_pool.clone()),
        gateway,
    };
    let app = build_router(app_state);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!(address = %addr, "Back-office server listening");

    // ── Step 7: Graceful shutdown ────────────────────────────────
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
    });

    server
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    // ── Step 8: Wait for background tasks ────────────────────────
    if let Some(handle) = sweeper_handle {
        if tokio::time::timeout(config.server.shutdown_grace(), handle).await.is_err() {
            tracing::warn!("Session sweeper did not stop within the grace period");
        }
    }

    db_pool.close().await;
    tracing::info!("Back-office server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
