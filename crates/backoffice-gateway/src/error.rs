//! Gateway-specific error types.

use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use backoffice_core::error::AppError;

/// Failures while forwarding a request downstream.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The joined target URL could not be parsed.
    #[error("Invalid forwarding target: {0}")]
    InvalidTarget(String),

    /// The inbound body could not be buffered.
    #[error("Failed to read request body: {0}")]
    Body(String),

    /// Connecting to or talking with the downstream service failed.
    #[error("Forwarding request failed: {0}")]
    Transport(String),

    /// The downstream service did not answer in time.
    #[error("Forwarding request timed out after {0:?}")]
    Timeout(Duration),

    /// The caller went away before the downstream service answered.
    #[error("Forwarding request was cancelled")]
    Cancelled,
}

impl GatewayError {
    /// HTTP status returned to the caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::InvalidTarget(_) | Self::Transport(_) | Self::Cancelled => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    /// Caller-facing message. Never contains downstream addresses.
    fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidTarget(_) => "Downstream service is misconfigured",
            Self::Body(_) => "Request body could not be read",
            Self::Transport(_) => "Downstream service is unavailable",
            Self::Timeout(_) => "Downstream service did not respond in time",
            Self::Cancelled => "Request was cancelled",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": "Error forwarding request",
            "message": self.public_message(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Body(_) => AppError::validation(err.to_string()),
            _ => AppError::external_service(err.to_string()),
        }
    }
}
