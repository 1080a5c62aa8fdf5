//! Forwards inbound requests to a downstream service.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_LENGTH, HOST};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, Uri};
use bytes::Bytes;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use backoffice_auth::crypto::KeyProvider;
use backoffice_core::config::gateway::GatewayConfig;
use backoffice_core::error::AppError;
use backoffice_core::result::AppResult;

use crate::error::GatewayError;
use crate::jwt::is_well_formed_jwt;
use crate::transport::HttpTransport;

/// Header naming the gateway that forwarded the request.
pub const GATEWAY_SOURCE_HEADER: HeaderName = HeaderName::from_static("x-gateway-source");

/// Header carrying the decrypted bearer credential. Only the gateway sets
/// it; a client-supplied value is never forwarded.
pub const FORWARDED_AUTH_HEADER: HeaderName = HeaderName::from_static("x-forwarded-auth");

/// Forwards requests downstream, normalizing encrypted bearer credentials.
#[derive(Clone)]
pub struct GatewayForwarder {
    transport: Arc<dyn HttpTransport>,
    keys: Arc<KeyProvider>,
    source: HeaderValue,
    timeout: Duration,
    max_body_bytes: usize,
}

impl std::fmt::Debug for GatewayForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayForwarder")
            .field("source", &self.source)
            .field("timeout", &self.timeout)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish_non_exhaustive()
    }
}

impl GatewayForwarder {
    /// Creates a new forwarder.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        keys: Arc<KeyProvider>,
        config: &GatewayConfig,
    ) -> AppResult<Self> {
        let source = HeaderValue::from_str(&config.source).map_err(|e| {
            AppError::configuration(format!("Invalid gateway source header value: {e}"))
        })?;

        Ok(Self {
            transport,
            keys,
            source,
            timeout: Duration::from_secs(config.timeout_seconds),
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// Forward `request` to `base_url` joined with `path_suffix`.
    ///
    /// A buffered body is put back into `request` so later layers can read
    /// it again. After a [`GatewayError::Body`] the inbound body has been
    /// consumed and `request` is left with an empty body.
    pub async fn forward(
        &self,
        request: &mut Request<Body>,
        base_url: &str,
        path_suffix: &str,
    ) -> Result<Response<Bytes>, GatewayError> {
        let outbound = self.build_request(request, base_url, path_suffix).await?;
        let method = outbound.method().clone();
        let uri = outbound.uri().clone();

        let response = match time::timeout(self.timeout, self.transport.send(outbound)).await {
            Ok(result) => result?,
            Err(_) => return Err(GatewayError::Timeout(self.timeout)),
        };

        info!(
            method = %method,
            target = %uri,
            status = %response.status(),
            "Request forwarded"
        );
        Ok(response)
    }

    /// Like [`GatewayForwarder::forward`] but aborts as soon as `cancel`
    /// fires.
    pub async fn forward_with_cancellation(
        &self,
        request: &mut Request<Body>,
        base_url: &str,
        path_suffix: &str,
        cancel: &CancellationToken,
    ) -> Result<Response<Bytes>, GatewayError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            result = self.forward(request, base_url, path_suffix) => result,
        }
    }

    async fn build_request(
        &self,
        request: &mut Request<Body>,
        base_url: &str,
        path_suffix: &str,
    ) -> Result<Request<Bytes>, GatewayError> {
        let target = target_url(base_url, path_suffix, request.uri().query());
        let uri: Uri = target
            .parse()
            .map_err(|e| GatewayError::InvalidTarget(format!("{target}: {e}")))?;

        let mut headers = HeaderMap::with_capacity(request.headers().len() + 2);
        for (name, value) in request.headers() {
            if name == HOST || name == CONTENT_LENGTH || name == FORWARDED_AUTH_HEADER {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }
        headers.insert(GATEWAY_SOURCE_HEADER, self.source.clone());
        self.normalize_credentials(&mut headers);

        let body = if carries_body(request) {
            self.buffer_body(request).await?
        } else {
            Bytes::new()
        };

        let mut outbound = Request::new(body);
        *outbound.method_mut() = request.method().clone();
        *outbound.uri_mut() = uri;
        *outbound.headers_mut() = headers;
        Ok(outbound)
    }

    /// Replace an encrypted bearer credential with the JWT it wraps.
    fn normalize_credentials(&self, headers: &mut HeaderMap) {
        let Some(token) = bearer_token(headers).map(str::to_owned) else {
            return;
        };
        if is_well_formed_jwt(&token) {
            return;
        }

        match self.keys.decrypt_token(&token) {
            Ok(plain) if is_well_formed_jwt(&plain) => {
                match HeaderValue::from_str(&format!("Bearer {plain}")) {
                    Ok(value) => {
                        headers.insert(AUTHORIZATION, value.clone());
                        headers.insert(FORWARDED_AUTH_HEADER, value);
                        debug!("Encrypted bearer credential unwrapped");
                    }
                    Err(_) => warn!("Decrypted credential is not a valid header value"),
                }
            }
            Ok(_) => warn!("Decrypted credential is not a JWT, forwarding unchanged"),
            Err(e) => warn!(error = %e, "Bearer credential could not be decrypted, forwarding unchanged"),
        }
    }

    async fn buffer_body(&self, request: &mut Request<Body>) -> Result<Bytes, GatewayError> {
        let body = std::mem::take(request.body_mut());
        let bytes = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| GatewayError::Body(e.to_string()))?;
        *request.body_mut() = Body::from(bytes.clone());
        Ok(bytes)
    }
}

/// Join a base URL, a path suffix and an optional query string with exactly
/// one slash between base and suffix.
pub fn target_url(base_url: &str, path_suffix: &str, query: Option<&str>) -> String {
    let mut url = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path_suffix.trim_start_matches('/')
    );
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// Extract the credential from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn carries_body<B>(request: &Request<B>) -> bool {
    if matches!(*request.method(), Method::POST | Method::PUT | Method::PATCH) {
        return true;
    }
    request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .is_some_and(|len| len > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_url_joins_with_one_slash() {
        assert_eq!(
            target_url("http://hrm:5000/", "/api/hrm/employees", None),
            "http://hrm:5000/api/hrm/employees"
        );
        assert_eq!(
            target_url("http://hrm:5000", "api/hrm", Some("page=2&size=10")),
            "http://hrm:5000/api/hrm?page=2&size=10"
        );
        assert_eq!(target_url("http://hrm:5000", "/x", Some("")), "http://hrm:5000/x");
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer  token "));
        assert_eq!(bearer_token(&headers), Some("token"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_carries_body() {
        let post = Request::builder().method(Method::POST).body(()).unwrap();
        assert!(carries_body(&post));

        let get = Request::builder().method(Method::GET).body(()).unwrap();
        assert!(!carries_body(&get));

        let delete = Request::builder()
            .method(Method::DELETE)
            .header(CONTENT_LENGTH, "12")
            .body(())
            .unwrap();
        assert!(carries_body(&delete));

        let empty = Request::builder()
            .method(Method::DELETE)
            .header(CONTENT_LENGTH, "0")
            .body(())
            .unwrap();
        assert!(!carries_body(&empty));
    }
}
