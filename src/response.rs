//! Immutable response value object.

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;

use crate::headers::{X_CIRCUIT_BREAKER, X_DO_NOT_RETRY};
use crate::{HttpClientError, Result};

/// An immutable HTTP response.
///
/// The body is fully owned; whatever underlying transport resource produced
/// it has already been returned to the driver. Dropping the response
/// releases the body, so scoped ownership gives release on every exit
/// path, including losers of a hedged race.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// Create a response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Create a response with no headers and an empty body.
    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, HeaderMap::new(), Bytes::new())
    }

    /// Synthetic response for an attempt whose deadline budget ran out
    /// before the transport was invoked. Strategies never retry it.
    pub(crate) fn low_timeout() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(X_DO_NOT_RETRY, HeaderValue::from_static("1"));
        Self::new(StatusCode::REQUEST_TIMEOUT, headers, Bytes::new())
    }

    /// Synthetic fallback response for a short-circuited request.
    pub(crate) fn circuit_open(status: StatusCode) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(X_DO_NOT_RETRY, HeaderValue::from_static("1"));
        headers.insert(X_CIRCUIT_BREAKER, HeaderValue::from_static("1"));
        Self::new(status, headers, Bytes::new())
    }

    /// The status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Check if the response was successful (2xx).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check if the response is a throttling response (429).
    pub fn is_throttling(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS
    }

    /// Check if the response was a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a specific header value as a string.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// The content type, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.header(http::header::CONTENT_TYPE.as_str())
    }

    /// Check whether the content type indicates a JSON payload
    /// (`application/json` or any `application/*+json` subtype).
    pub fn is_json(&self) -> bool {
        let Some(content_type) = self.content_type() else {
            return false;
        };
        let subtype = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match subtype.strip_prefix("application/") {
            Some(rest) => rest == "json" || rest.ends_with("+json"),
            None => false,
        }
    }

    /// Whether this response is marked as not retryable.
    pub fn is_do_not_retry(&self) -> bool {
        self.headers.contains_key(X_DO_NOT_RETRY)
    }

    /// The response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume the response and return the body.
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// The response body as text.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| HttpClientError::Json(e.to_string()))
    }

    /// Parse the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| HttpClientError::Json(e.to_string()))
    }
}
