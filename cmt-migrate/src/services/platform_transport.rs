//! Target platform transport
//!
//! [`PlatformTransport`] performs exactly one HTTP round-trip and reports the
//! raw status; it never retries. Pacing and retry live in
//! [`RateLimitedClient`](super::rate_limited_client::RateLimitedClient).
//!
//! [`ShopifyTransport`] is the production implementation against a
//! Shopify-style admin REST API.

use crate::error::TransportError;
use async_trait::async_trait;
use cmt_common::time::secs_f64_to_duration;
use serde_json::Value;
use std::time::Duration;

const USER_AGENT: &str = concat!("cmt-migrate/", env!("CARGO_PKG_VERSION"));
const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

/// One logical request, relative to the platform API root
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformRequest {
    pub method: HttpMethod,
    /// Path plus optional query, e.g. `products.json?handle=x`
    pub path: String,
    pub body: Option<Value>,
    /// Overrides the transport default when set
    pub timeout: Option<Duration>,
}

impl PlatformRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            body: None,
            timeout: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            body: Some(body),
            timeout: None,
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Put,
            path: path.into(),
            body: Some(body),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Raw platform response
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformResponse {
    pub status: u16,
    /// Parsed `Retry-After` header
    pub retry_after: Option<Duration>,
    /// JSON body, `Value::Null` when empty or not JSON
    pub body: Value,
}

impl PlatformResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            retry_after: None,
            body,
        }
    }

    pub fn throttled(retry_after: Option<Duration>) -> Self {
        Self {
            status: 429,
            retry_after,
            body: Value::Null,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_throttle(&self) -> bool {
        self.status == 429
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    /// Short, single-line description of the body for error messages
    pub fn error_text(&self) -> String {
        let text = match &self.body {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Object(map) => match map.get("errors") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => self.body.to_string(),
            },
            other => other.to_string(),
        };
        truncate(&text, 200)
    }
}

/// One HTTP round-trip to the target platform
#[async_trait]
pub trait PlatformTransport: Send + Sync {
    async fn send(&self, request: &PlatformRequest) -> Result<PlatformResponse, TransportError>;
}

/// Connection settings for [`ShopifyTransport`]
#[derive(Debug, Clone)]
pub struct ShopifyConnection {
    /// Store host, e.g. `my-shop.myshopify.com`
    pub store: String,
    pub api_version: String,
    pub access_token: String,
    pub request_timeout: Duration,
}

/// reqwest-backed transport for a Shopify-style admin REST API
pub struct ShopifyTransport {
    http_client: reqwest::Client,
    base_url: String,
    access_token: String,
    default_timeout: Duration,
}

impl ShopifyTransport {
    pub fn new(connection: ShopifyConnection) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let store = connection.store.trim_end_matches('/');
        let base_url = if store.starts_with("http://") || store.starts_with("https://") {
            format!("{}/admin/api/{}", store, connection.api_version)
        } else {
            format!("https://{}/admin/api/{}", store, connection.api_version)
        };

        Ok(Self {
            http_client,
            base_url,
            access_token: connection.access_token,
            default_timeout: connection.request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl PlatformTransport for ShopifyTransport {
    async fn send(&self, request: &PlatformRequest) -> Result<PlatformResponse, TransportError> {
        let url = format!("{}/{}", self.base_url, request.path.trim_start_matches('/'));
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let builder = match request.method {
            HttpMethod::Get => self.http_client.get(&url),
            HttpMethod::Post => self.http_client.post(&url),
            HttpMethod::Put => self.http_client.put(&url),
        };
        let mut builder = builder
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .timeout(timeout);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        tracing::debug!(method = ?request.method, url = %url, "Sending platform request");

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(timeout)
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);

        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(timeout)
            } else {
                TransportError::Network(e.to_string())
            }
        })?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(PlatformResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// Parse a `Retry-After` header given in (possibly fractional) seconds
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(secs_f64_to_duration)
}

fn truncate(text: &str, max_chars: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max_chars {
        single_line
    } else {
        let cut: String = single_line.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("2"), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after(" 1.5 "), Some(Duration::from_millis(1500)));
        assert_eq!(parse_retry_after("soon"), None);
        assert_eq!(parse_retry_after("-3"), None);
    }

    #[test]
    fn test_response_classification() {
        assert!(PlatformResponse::new(201, Value::Null).is_success());
        assert!(PlatformResponse::throttled(None).is_throttle());
        assert!(PlatformResponse::new(502, Value::Null).is_server_error());
        let rejected = PlatformResponse::new(422, Value::Null);
        assert!(!rejected.is_success() && !rejected.is_throttle() && !rejected.is_server_error());
    }

    #[test]
    fn test_error_text_prefers_errors_field() {
        let response = PlatformResponse::new(422, json!({"errors": {"title": ["can't be blank"]}}));
        assert_eq!(response.error_text(), r#"{"title":["can't be blank"]}"#);

        let response = PlatformResponse::new(400, json!({"errors": "Bad Request"}));
        assert_eq!(response.error_text(), "Bad Request");
    }

    #[test]
    fn test_error_text_truncates_long_bodies() {
        let response = PlatformResponse::new(500, Value::String("x".repeat(500)));
        let text = response.error_text();
        assert!(text.ends_with("..."));
        assert_eq!(text.chars().count(), 203);
    }

    #[test]
    fn test_base_url_from_store_host() {
        let transport = ShopifyTransport::new(ShopifyConnection {
            store: "demo.myshopify.com".to_string(),
            api_version: "2024-01".to_string(),
            access_token: "token".to_string(),
            request_timeout: Duration::from_secs(30),
        })
        .unwrap();
        assert_eq!(
            transport.base_url(),
            "https://demo.myshopify.com/admin/api/2024-01"
        );
    }

    #[test]
    fn test_request_builders() {
        let request = PlatformRequest::post("products.json", json!({"product": {}}))
            .with_timeout(Duration::from_secs(60));
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.timeout, Some(Duration::from_secs(60)));
        assert!(PlatformRequest::get("products.json").body.is_none());
    }
}
