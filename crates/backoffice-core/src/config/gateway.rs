//! API gateway forwarding configuration.

use serde::{Deserialize, Serialize};

/// A downstream service reachable through the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRoute {
    /// Path prefix owned by the service, e.g. `/api/hrm`. Matched
    /// case-insensitively.
    pub prefix: String,
    /// Base URL of the service. When absent the prefix is still treated as a
    /// service path for authentication, but requests fall through to the
    /// local pipeline.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ServiceRoute {
    /// Whether `path` falls under this route's prefix.
    pub fn matches(&self, path: &str) -> bool {
        starts_with_ignore_case(path, &self.prefix)
    }
}

/// API gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Value of the `X-Gateway-Source` header added to forwarded requests.
    #[serde(default = "default_source")]
    pub source: String,
    /// Timeout for a single forwarded request in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Maximum inbound body size buffered for forwarding, in bytes.
    #[serde(default = "default_max_body")]
    pub max_body_bytes: usize,
    /// Downstream services, checked in order.
    #[serde(default = "default_routes")]
    pub routes: Vec<ServiceRoute>,
    /// Path prefixes answered with `410 Gone`.
    #[serde(default = "default_blocked_prefixes")]
    pub blocked_prefixes: Vec<String>,
    /// Path fragments that mark a service endpoint as public.
    #[serde(default = "default_public_markers")]
    pub public_markers: Vec<String>,
}

impl GatewayConfig {
    /// Find the first route owning `path`.
    pub fn route_for(&self, path: &str) -> Option<&ServiceRoute> {
        self.routes.iter().find(|r| r.matches(path))
    }

    /// Whether `path` is under a blocked prefix.
    pub fn is_blocked(&self, path: &str) -> bool {
        self.blocked_prefixes
            .iter()
            .any(|p| starts_with_ignore_case(path, p))
    }

    /// Whether `path` contains a public marker.
    pub fn is_public(&self, path: &str) -> bool {
        let lower = path.to_ascii_lowercase();
        self.public_markers
            .iter()
            .any(|m| lower.contains(&m.to_ascii_lowercase()))
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            timeout_seconds: default_timeout(),
            max_body_bytes: default_max_body(),
            routes: default_routes(),
            blocked_prefixes: default_blocked_prefixes(),
            public_markers: default_public_markers(),
        }
    }
}

fn starts_with_ignore_case(path: &str, prefix: &str) -> bool {
    path.len() >= prefix.len()
        && path.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

fn default_source() -> String {
    "AuditBackend".to_string()
}

fn default_timeout() -> u64 {
    100
}

fn default_max_body() -> usize {
    10 * 1024 * 1024
}

fn default_routes() -> Vec<ServiceRoute> {
    ["/api/task", "/api/hrm", "/api/audit", "/api/accounting", "/api/crm"]
        .into_iter()
        .map(|prefix| ServiceRoute {
            prefix: prefix.to_string(),
            base_url: None,
        })
        .collect()
}

fn default_blocked_prefixes() -> Vec<String> {
    vec!["/api/task/hubs/".to_string()]
}

fn default_public_markers() -> Vec<String> {
    vec![
        "WeatherForecast".to_string(),
        "/swagger".to_string(),
        "/health".to_string(),
    ]
}
