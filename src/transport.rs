//! Abstract single-shot HTTP send.
//!
//! The core never talks to the network directly; it invokes a [`Transport`]
//! driver. A driver must honor the deadline (return a timeout error no later
//! than `deadline.remaining()`) and must be cancel-safe: dropping the send
//! future aborts in-flight I/O and releases whatever the driver had acquired.

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::deadline::Deadline;
use crate::request::Request;
use crate::response::Response;
use crate::{HttpClientError, Result};

/// A single-shot HTTP transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` against `endpoint`, bounded by `deadline`.
    ///
    /// Any received status code is a successful send; errors are reserved
    /// for timeouts and network-level failures.
    async fn send(&self, endpoint: &Url, request: &Request, deadline: Deadline)
    -> Result<Response>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(
        &self,
        endpoint: &Url,
        request: &Request,
        deadline: Deadline,
    ) -> Result<Response> {
        (**self).send(endpoint, request, deadline).await
    }
}

/// [`Transport`] driver backed by [`reqwest`].
#[derive(Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a default [`reqwest::Client`].
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::new(),
        }
    }

    /// Create a transport around an existing [`reqwest::Client`], keeping
    /// its pooling and TLS configuration.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { inner: client }
    }

    fn build_url(endpoint: &Url, request: &Request) -> Result<Url> {
        let mut url = endpoint
            .join(&request.substituted_url())
            .map_err(|e| HttpClientError::InvalidUrl(e.to_string()))?;
        if !request.query_parameters().is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in request.query_parameters() {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        endpoint: &Url,
        request: &Request,
        deadline: Deadline,
    ) -> Result<Response> {
        if deadline.expired() {
            return Err(HttpClientError::Timeout);
        }

        let url = Self::build_url(endpoint, request)?;
        let mut builder = self
            .inner
            .request(request.method().clone(), url)
            .headers(request.headers().clone())
            .timeout(deadline.remaining());
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(map_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_error)?;

        Ok(Response::new(status, headers, body))
    }
}

fn map_error(error: reqwest::Error) -> HttpClientError {
    if error.is_timeout() {
        HttpClientError::Timeout
    } else if error.is_connect() {
        HttpClientError::Connect(error.to_string())
    } else {
        HttpClientError::Transport(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_joins_endpoint() {
        let endpoint = Url::parse("https://api.example.com/v1/").unwrap();
        let request = Request::get("users/{id}").with_path_parameter("id", "42");

        let url = ReqwestTransport::build_url(&endpoint, &request).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/users/42");
    }

    #[test]
    fn test_build_url_appends_query() {
        let endpoint = Url::parse("https://api.example.com/").unwrap();
        let request = Request::get("search")
            .with_query("q", "rust")
            .with_query("page", "2");

        let url = ReqwestTransport::build_url(&endpoint, &request).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/search?q=rust&page=2");
    }

    #[tokio::test]
    async fn test_expired_deadline_short_circuits() {
        let transport = ReqwestTransport::new();
        let endpoint = Url::parse("https://api.example.com/").unwrap();
        let deadline = Deadline::from_secs_f64(0.0);

        // No network I/O happens: the error is immediate.
        let result = transport
            .send(&endpoint, &Request::get("users"), deadline)
            .await;
        assert!(matches!(result, Err(HttpClientError::Timeout)));
    }
}
