//! HTTP router construction.

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::warn;

use backoffice_gateway::gateway_middleware;

use crate::state::AppState;

/// Build the router: local routes first, then the gateway in front of them.
pub fn build_router(state: AppState) -> Router {
    let gateway = state.gateway.clone();

    Router::new()
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(state)
        .layer(from_fn_with_state(gateway, gateway_middleware))
        .layer(TraceLayer::new_for_http())
}

/// GET /health
async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database = match &state.db_pool {
        None => "not_configured",
        Some(pool) => match pool.health_check().await {
            Ok(true) => "connected",
            Ok(false) => "unexpected_response",
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                "unreachable"
            }
        },
    };

    let healthy = matches!(database, "connected" | "not_configured");
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "ok" } else { "degraded" },
            "version": env!("CARGO_PKG_VERSION"),
            "database": database,
        })),
    )
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Resource not found" })),
    )
}
