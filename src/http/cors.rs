//! CORS decoration and preflight handling.
//!
//! # Responsibilities
//! - Answer every `OPTIONS` request with an empty 204 preflight
//! - Add the allow-methods / allow-headers pair to every response
//! - Echo `Origin` back only when it is on the allow-list
//! - Force `Content-Type: application/json` on non-preflight responses
//!
//! # Design Decisions
//! - Unknown origins get no `Access-Control-Allow-Origin` at all; the browser
//!   then blocks the read, which is the intended outcome
//! - The allow-list is swapped atomically on config reload

use std::collections::HashSet;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::CorsConfig;
use crate::http::server::AppState;

pub const ALLOW_METHODS: &str = "GET,POST,PUT,DELETE,OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type";

/// The set of browser origins allowed to read responses.
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    allowed_origins: HashSet<String>,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Self {
        Self {
            allowed_origins: config.allowed_origins.iter().cloned().collect(),
        }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.contains(origin)
    }

    /// Set the access-control headers for a request carrying `origin`.
    pub fn decorate(&self, origin: Option<&HeaderValue>, headers: &mut HeaderMap) {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );

        let allowed = origin.filter(|o| o.to_str().map(|o| self.is_allowed(o)).unwrap_or(false));
        match allowed {
            Some(origin) => {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            }
            None => {
                headers.remove(header::ACCESS_CONTROL_ALLOW_ORIGIN);
            }
        }
    }
}

/// Preflight short-circuit plus header decoration for everything else.
pub async fn cors_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let policy = state.cors.load_full();
    let origin = request.headers().get(header::ORIGIN).cloned();

    if request.method() == Method::OPTIONS {
        tracing::debug!(origin = ?origin, path = %request.uri().path(), "Preflight");
        let mut response = StatusCode::NO_CONTENT.into_response();
        policy.decorate(origin.as_ref(), response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    policy.decorate(origin.as_ref(), headers);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CorsPolicy {
        CorsPolicy::from_config(&CorsConfig::default())
    }

    #[test]
    fn test_allowed_origin_is_echoed() {
        let mut headers = HeaderMap::new();
        let origin = HeaderValue::from_static("http://localhost:5173");
        policy().decorate(Some(&origin), &mut headers);

        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:5173"
        );
        assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(), ALLOW_METHODS);
        assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(), ALLOW_HEADERS);
    }

    #[test]
    fn test_unknown_origin_is_omitted() {
        let mut headers = HeaderMap::new();
        let origin = HeaderValue::from_static("http://evil.example");
        policy().decorate(Some(&origin), &mut headers);
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());

        let mut headers = HeaderMap::new();
        policy().decorate(None, &mut headers);
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).is_some());
    }

    #[test]
    fn test_origin_match_is_exact() {
        let policy = policy();
        assert!(policy.is_allowed("https://nta1210.github.io"));
        assert!(!policy.is_allowed("https://nta1210.github.io/"));
        assert!(!policy.is_allowed("http://localhost:5174"));
    }
}
