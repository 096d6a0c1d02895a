//! API-key authentication middleware.
//!
//! The key set is static, loaded from configuration at startup. Keys are
//! accepted as `Authorization: Bearer <key>` or `X-API-Key: <key>`; the SSE
//! stream additionally accepts `?api_key=` because EventSource cannot set
//! headers.

use std::collections::HashSet;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::models::ErrorResponse;
use crate::server::ServerState;

/// Static API-key check.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    enabled: bool,
    api_keys: HashSet<String>,
}

impl AuthState {
    pub fn new(enabled: bool, api_keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            enabled,
            api_keys: api_keys.into_iter().collect(),
        }
    }

    /// Auth disabled always passes; otherwise the key must be known.
    pub fn check(&self, key: Option<&str>) -> bool {
        if !self.enabled {
            return true;
        }
        key.map_or(false, |k| self.api_keys.contains(k))
    }
}

/// Pull the API key out of the request headers.
pub fn key_from_headers(headers: &HeaderMap) -> Option<&str> {
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(bearer) = auth.strip_prefix("Bearer ") {
            return Some(bearer.trim());
        }
    }
    headers.get("x-api-key").and_then(|v| v.to_str().ok())
}

/// Middleware guarding the protected route groups.
pub async fn require_api_key(
    State(state): State<ServerState>,
    request: Request,
    next: Next,
) -> Result<Response, ErrorResponse> {
    let key = key_from_headers(request.headers());
    if !state.auth.check(key) {
        return Err(ErrorResponse::unauthorized("missing or invalid API key"));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_disabled_auth_passes_everything() {
        let auth = AuthState::new(false, []);
        assert!(auth.check(None));
        assert!(auth.check(Some("anything")));
    }

    #[test]
    fn test_enabled_auth_requires_known_key() {
        let auth = AuthState::new(true, ["secret".to_string()]);
        assert!(!auth.check(None));
        assert!(!auth.check(Some("wrong")));
        assert!(auth.check(Some("secret")));
    }

    #[test]
    fn test_key_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(key_from_headers(&headers), Some("abc"));

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("xyz"));
        assert_eq!(key_from_headers(&headers), Some("xyz"));

        assert_eq!(key_from_headers(&HeaderMap::new()), None);
    }
}
