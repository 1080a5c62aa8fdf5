//! Structural JWT check. No signature verification happens here.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::Value;

/// Whether `token` looks like a compact JWS: three dot-separated base64url
/// segments whose first segment decodes to a JSON object.
pub fn is_well_formed_jwt(token: &str) -> bool {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return false;
    };

    if header.is_empty() || payload.is_empty() {
        return false;
    }
    if ![header, payload, signature].into_iter().all(is_base64url) {
        return false;
    }

    URL_SAFE_NO_PAD
        .decode(header)
        .ok()
        .and_then(|raw| serde_json::from_slice::<Value>(&raw).ok())
        .is_some_and(|v| v.is_object())
}

fn is_base64url(segment: &str) -> bool {
    segment
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
