//! `/bypass-cors` relay.
//!
//! # Responsibilities
//! - Resolve the `url` query parameter into an absolute target
//! - Forward method, headers and (for POST/PUT) the buffered body
//! - Wrap the upstream answer in the envelope: parsed JSON, or `{"raw": text}`
//!
//! # Design Decisions
//! - The envelope status is 200 whenever the upstream answered, whatever its
//!   own status was; callers rely on that
//! - Transport failures (DNS, connect, timeout) become a 500 envelope
//! - Every outbound call is bounded by the configured timeout
//! - An optional host allow-list limits where the relay may reach

use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderName, Method, Uri},
};
use serde_json::{json, Value};
use url::Url;

use crate::config::RelayConfig;
use crate::http::envelope::{ApiError, Envelope};
use crate::http::request::{query_params, read_body, X_REQUEST_ID};
use crate::http::server::AppState;
use crate::observability::metrics;

/// Request headers never copied to the upstream call. The request id is
/// internal to this service and stays here.
static SKIPPED_HEADERS: [HeaderName; 11] = [
    header::HOST,
    header::CONTENT_LENGTH,
    header::ACCEPT_ENCODING,
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    X_REQUEST_ID,
];

/// Outbound HTTP client plus the policy it runs under.
#[derive(Debug, Clone)]
pub struct Relay {
    client: reqwest::Client,
    allowed_hosts: Vec<String>,
}

impl Relay {
    pub fn from_config(config: &RelayConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            allowed_hosts: config
                .allowed_hosts
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
        })
    }

    /// Normalize, parse and authorize a caller-supplied target.
    pub fn resolve_target(&self, raw: &str) -> Result<Url, ApiError> {
        let normalized = normalize_target(raw);
        let url = Url::parse(&normalized).map_err(|e| {
            ApiError::BadRequest(format!("Invalid relay target '{}': {}", raw, e))
        })?;

        if !self.allowed_hosts.is_empty() {
            let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
            if !self.allowed_hosts.contains(&host) {
                return Err(ApiError::Forbidden(format!(
                    "Relay target host '{}' is not allowed",
                    host
                )));
            }
        }
        Ok(url)
    }

    /// Issue the outbound call and turn its body into envelope data.
    pub async fn forward(
        &self,
        method: Method,
        target: Url,
        inbound: &HeaderMap,
        body: Option<Bytes>,
    ) -> Result<Value, ApiError> {
        let mut request = self
            .client
            .request(method.clone(), target.clone())
            .headers(forwarded_headers(inbound));
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(upstream_error)?;
        let status = response.status();
        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.to_ascii_lowercase().contains("json"))
            .unwrap_or(false);
        let bytes = response.bytes().await.map_err(upstream_error)?;

        tracing::info!(
            method = %method,
            target = %target,
            upstream_status = %status,
            bytes = bytes.len(),
            json = is_json,
            "Relay call completed"
        );
        Ok(classify_body(is_json, &bytes))
    }
}

/// Prefix `https://` unless the target already names http or https.
pub fn normalize_target(raw: &str) -> String {
    let raw = raw.trim();
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    }
}

/// Parsed JSON when the upstream declared it and it parses; the text otherwise.
pub fn classify_body(is_json: bool, bytes: &[u8]) -> Value {
    if is_json {
        match serde_json::from_slice(bytes) {
            Ok(value) => {
                metrics::record_relay("json");
                return value;
            }
            Err(e) => tracing::warn!(error = %e, "Upstream declared JSON but body did not parse"),
        }
    }
    metrics::record_relay("raw");
    json!({ "raw": String::from_utf8_lossy(bytes) })
}

fn forwarded_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = inbound.clone();
    for name in SKIPPED_HEADERS.iter() {
        headers.remove(name);
    }
    headers
}

fn upstream_error(err: reqwest::Error) -> ApiError {
    metrics::record_relay("error");
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    tracing::warn!(error = %message, timeout = err.is_timeout(), "Relay call failed");
    ApiError::Upstream(message)
}

/// `GET|POST|PUT|DELETE /bypass-cors?url=..`
pub async fn relay_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Result<Envelope, ApiError> {
    let relay = state.relay.load_full();
    let raw = query_params(uri.query())
        .remove("url")
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing required query parameter 'url'".to_string()))?;

    let target = relay.resolve_target(&raw).inspect_err(|_| metrics::record_relay("rejected"))?;

    let body = if method == Method::POST || method == Method::PUT {
        Some(read_body(body, state.max_body_size).await?)
    } else {
        None
    };

    let data = relay.forward(method, target, &headers, body).await?;
    Ok(Envelope::ok(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn relay(allowed_hosts: &[&str]) -> Relay {
        Relay::from_config(&RelayConfig {
            allowed_hosts: allowed_hosts.iter().map(|h| h.to_string()).collect(),
            ..RelayConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_normalize_target() {
        assert_eq!(
            normalize_target("example.com/data.json"),
            "https://example.com/data.json"
        );
        assert_eq!(normalize_target("http://example.com"), "http://example.com");
        assert_eq!(normalize_target("HTTPS://example.com"), "HTTPS://example.com");
        assert_eq!(normalize_target(" example.com "), "https://example.com");
    }

    #[test]
    fn test_resolve_target() {
        let url = relay(&[]).resolve_target("example.com/data.json").unwrap();
        assert_eq!(url.as_str(), "https://example.com/data.json");

        assert!(matches!(
            relay(&[]).resolve_target("http://"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_host_allow_list() {
        let relay = relay(&["API.example.com"]);
        assert!(relay.resolve_target("api.example.com/x").is_ok());
        assert!(matches!(
            relay.resolve_target("http://169.254.169.254/latest/meta-data"),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_classify_body() {
        assert_eq!(classify_body(true, br#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(classify_body(false, b"<html>hi</html>"), json!({"raw": "<html>hi</html>"}));
        assert_eq!(classify_body(true, b"not json"), json!({"raw": "not json"}));
    }

    #[test]
    fn test_forwarded_headers_drop_hop_by_hop() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::HOST, HeaderValue::from_static("localhost:3000"));
        inbound.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        inbound.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        inbound.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        inbound.insert("x-api-key", HeaderValue::from_static("secret"));
        inbound.insert(X_REQUEST_ID, HeaderValue::from_static("9b1c"));
        inbound.insert(header::ORIGIN, HeaderValue::from_static("http://localhost:5173"));

        let headers = forwarded_headers(&inbound);
        assert!(headers.get(header::HOST).is_none());
        assert!(headers.get(header::CONTENT_LENGTH).is_none());
        assert!(headers.get(header::CONNECTION).is_none());
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(headers.get("x-api-key").unwrap(), "secret");
        assert!(headers.get(X_REQUEST_ID).is_none());
        assert_eq!(headers.get(header::ORIGIN).unwrap(), "http://localhost:5173");
    }
}
