//! Outbound HTTP transport used by the forwarder.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{Request, Response};
use bytes::Bytes;
use tracing::debug;

use crate::error::GatewayError;

/// Sends one fully-buffered request and returns the fully-buffered response.
///
/// The forwarder only depends on this trait so tests can record requests
/// without opening sockets.
#[async_trait]
pub trait HttpTransport: Send + Sync + 'static {
    /// Send `request` and wait for the complete response.
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, GatewayError>;
}

/// [`HttpTransport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Build a transport whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }

    /// Wrap an existing client. `timeout` is only used to label timeout
    /// errors; the client enforces its own.
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn map_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else if err.is_connect() {
            GatewayError::Transport(format!("Failed to connect to target: {err}"))
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, GatewayError> {
        let (parts, body) = request.into_parts();

        let mut builder = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers);
        if !body.is_empty() {
            builder = builder.body(body);
        }

        let upstream = builder.send().await.map_err(|e| self.map_error(e))?;
        let status = upstream.status();
        let version = upstream.version();
        let headers = upstream.headers().clone();
        let body = upstream.bytes().await.map_err(|e| self.map_error(e))?;

        debug!(status = %status, bytes = body.len(), "Downstream response received");

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.version_mut() = version;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
