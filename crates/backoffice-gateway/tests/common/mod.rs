//! Shared fixtures for gateway tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, Request, Response, StatusCode};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use bytes::Bytes;

use backoffice_auth::KeyProvider;
use backoffice_core::config::gateway::GatewayConfig;
use backoffice_gateway::{GatewayError, GatewayForwarder, HttpTransport};

/// A request as seen by the transport.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Records outbound requests and answers with a canned response.
pub struct RecordingTransport {
    pub requests: Mutex<Vec<Recorded>>,
    pub status: StatusCode,
    pub body: &'static str,
    pub delay: Option<Duration>,
    pub fail: bool,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            status: StatusCode::OK,
            body: "downstream",
            delay: None,
            fail: false,
        }
    }
}

impl RecordingTransport {
    pub fn recorded(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, GatewayError> {
        let (parts, body) = request.into_parts();
        self.requests.lock().unwrap().push(Recorded {
            method: parts.method,
            uri: parts.uri.to_string(),
            headers: parts.headers,
            body,
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(GatewayError::Transport("connection refused".into()));
        }

        let mut response = Response::new(Bytes::from_static(self.body.as_bytes()));
        *response.status_mut() = self.status;
        response
            .headers_mut()
            .insert("transfer-encoding", "chunked".parse().unwrap());
        response
            .headers_mut()
            .insert("x-downstream", "hrm".parse().unwrap());
        Ok(response)
    }
}

pub fn keys() -> Arc<KeyProvider> {
    Arc::new(KeyProvider::new(b"gateway-test-hmac", &[7u8; 32]).unwrap())
}

pub fn forwarder(
    transport: Arc<RecordingTransport>,
    keys: Arc<KeyProvider>,
    config: &GatewayConfig,
) -> GatewayForwarder {
    GatewayForwarder::new(transport, keys, config).unwrap()
}

pub fn sample_jwt() -> String {
    format!(
        "{}.{}.c2lnbmF0dXJl",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(r#"{"sub":"7f1c","jti":"abc"}"#)
    )
}
