//! Request and response enrichers.
//!
//! Enrichers transform requests before dispatch and responses before they
//! are handed back. Client-level request enrichers run once per logical
//! request; response enrichers run once per attempt, after the transport.

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue};
use tracing::debug;

use crate::request::Request;
use crate::response::Response;
use crate::Result;

/// Transforms a request before it is dispatched.
#[async_trait]
pub trait RequestEnricher: Send + Sync {
    /// Produce the enriched request.
    async fn enrich(&self, request: Request) -> Result<Request>;
}

/// Transforms a response received from the transport.
#[async_trait]
pub trait ResponseEnricher: Send + Sync {
    /// Produce the enriched response.
    async fn enrich(&self, response: Response) -> Result<Response>;
}

/// Adds a fixed set of headers to every request.
pub struct HeaderEnricher {
    headers: HeaderMap,
}

impl HeaderEnricher {
    /// Create an enricher adding the given headers, replacing per name.
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }
}

#[async_trait]
impl RequestEnricher for HeaderEnricher {
    async fn enrich(&self, request: Request) -> Result<Request> {
        Ok(request.update_headers(self.headers.clone()))
    }
}

/// Adds a bearer token to every request.
pub struct BearerAuthEnricher {
    value: String,
}

impl BearerAuthEnricher {
    /// Create an enricher for the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            value: format!("Bearer {}", token.into()),
        }
    }
}

#[async_trait]
impl RequestEnricher for BearerAuthEnricher {
    async fn enrich(&self, request: Request) -> Result<Request> {
        Ok(request.with_header(http::header::AUTHORIZATION.as_str(), &self.value))
    }
}

/// Adds basic authentication to every request.
pub struct BasicAuthEnricher {
    value: String,
}

impl BasicAuthEnricher {
    /// Create an enricher for the given credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        use base64::Engine;
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", username.into(), password.into()));
        Self {
            value: format!("Basic {}", credentials),
        }
    }
}

#[async_trait]
impl RequestEnricher for BasicAuthEnricher {
    async fn enrich(&self, request: Request) -> Result<Request> {
        Ok(request.with_header(http::header::AUTHORIZATION.as_str(), &self.value))
    }
}

/// Logs every received response at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingResponseEnricher;

#[async_trait]
impl ResponseEnricher for LoggingResponseEnricher {
    async fn enrich(&self, response: Response) -> Result<Response> {
        debug!(status = %response.status(), "received HTTP response");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_header_enricher_replaces() {
        let mut headers = HeaderMap::new();
        headers.insert("x-service-name", HeaderValue::from_static("billing"));
        let enricher = HeaderEnricher::new(headers);

        let request = Request::get("users").with_header("x-service-name", "legacy");
        let request = enricher.enrich(request).await.unwrap();
        assert_eq!(request.headers()["x-service-name"], "billing");
    }

    #[tokio::test]
    async fn test_bearer_auth() {
        let request = BearerAuthEnricher::new("token-123")
            .enrich(Request::get("users"))
            .await
            .unwrap();
        assert_eq!(request.headers()["authorization"], "Bearer token-123");
    }

    #[tokio::test]
    async fn test_basic_auth() {
        let request = BasicAuthEnricher::new("user", "pass")
            .enrich(Request::get("users"))
            .await
            .unwrap();
        // base64("user:pass")
        assert_eq!(request.headers()["authorization"], "Basic dXNlcjpwYXNz");
    }
}
