//! Gateway middleware routing service-prefixed requests downstream.

use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde_json::json;
use tracing::{error, warn};

use backoffice_core::config::gateway::GatewayConfig;

use crate::forwarder::{GatewayForwarder, bearer_token};

/// Shared state for [`gateway_middleware`].
#[derive(Debug, Clone)]
pub struct GatewayState {
    forwarder: Arc<GatewayForwarder>,
    config: Arc<GatewayConfig>,
}

impl GatewayState {
    /// Creates the middleware state.
    pub fn new(forwarder: Arc<GatewayForwarder>, config: Arc<GatewayConfig>) -> Self {
        Self { forwarder, config }
    }
}

/// Routes a request before it reaches the local handlers.
///
/// - blocked prefixes answer `410 Gone`
/// - non-public service paths without a bearer credential answer `401`
/// - service paths with a configured base URL are forwarded, path unchanged
/// - everything else continues down the pipeline
pub async fn gateway_middleware(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if state.config.is_blocked(&path) {
        warn!(path = %path, "Request to retired hub endpoint");
        return (
            StatusCode::GONE,
            Json(json!({
                "error": "Hub endpoints moved to the hub service. Connect to it directly."
            })),
        )
            .into_response();
    }

    let Some(route) = state.config.route_for(&path) else {
        return next.run(request).await;
    };

    if !state.config.is_public(&path) && bearer_token(request.headers()).is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Authentication is required to access this endpoint."
            })),
        )
            .into_response();
    }

    let Some(base_url) = route
        .base_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
    else {
        return next.run(request).await;
    };

    match state.forwarder.forward(&mut request, base_url, &path).await {
        Ok(response) => relay(response),
        Err(e) => {
            error!(path = %path, prefix = %route.prefix, error = %e, "Forwarding failed");
            e.into_response()
        }
    }
}

/// Convert a downstream response for the caller. Framing headers are dropped
/// and recomputed from the buffered body.
fn relay(response: axum::http::Response<Bytes>) -> Response {
    let (mut parts, body) = response.into_parts();
    for name in [TRANSFER_ENCODING, CONNECTION, CONTENT_LENGTH] {
        parts.headers.remove(name);
    }
    Response::from_parts(parts, Body::from(body))
}
