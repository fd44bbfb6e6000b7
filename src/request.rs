//! Immutable request value object.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;

use crate::{HttpClientError, Result};

/// An immutable HTTP request.
///
/// The URL is relative to the client's endpoint and may contain `{name}`
/// path placeholders. Derivation operators (`update_headers`, `with_body`,
/// ...) consume the request and return a new one; a constructed request is
/// never mutated in place.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    path_parameters: Vec<(String, String)>,
    query_parameters: Vec<(String, String)>,
}

impl Request {
    /// Create a request with the given method and relative URL.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            path_parameters: Vec::new(),
            query_parameters: Vec::new(),
        }
    }

    /// Create a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Create a PUT request.
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    /// Create a PATCH request.
    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    /// Create a DELETE request.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Create a HEAD request.
    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::HEAD, url)
    }

    /// Create an OPTIONS request.
    pub fn options(url: impl Into<String>) -> Self {
        Self::new(Method::OPTIONS, url)
    }

    /// Create a POST request with a JSON body.
    pub fn post_json<T: Serialize>(url: impl Into<String>, body: &T) -> Result<Self> {
        Self::post(url).with_json(body)
    }

    /// Create a PUT request with a JSON body.
    pub fn put_json<T: Serialize>(url: impl Into<String>, body: &T) -> Result<Self> {
        Self::put(url).with_json(body)
    }

    /// Create a PATCH request with a JSON body.
    pub fn patch_json<T: Serialize>(url: impl Into<String>, body: &T) -> Result<Self> {
        Self::patch(url).with_json(body)
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The relative URL, placeholders unsubstituted.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The request body, if any.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Path placeholder substitutions, in insertion order.
    pub fn path_parameters(&self) -> &[(String, String)] {
        &self.path_parameters
    }

    /// Query parameters, in insertion order.
    pub fn query_parameters(&self) -> &[(String, String)] {
        &self.query_parameters
    }

    /// Return a request with a single header added, replacing existing
    /// values for that name. Invalid names or values are skipped.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_ref()),
            HeaderValue::try_from(value.as_ref()),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Return a request with `headers` merged in, replacing existing values
    /// for every name present in `headers`.
    pub fn update_headers(mut self, headers: HeaderMap) -> Self {
        let mut last: Option<HeaderName> = None;
        for (name, value) in headers {
            match name {
                Some(name) => {
                    self.headers.insert(name.clone(), value);
                    last = Some(name);
                }
                None => {
                    if let Some(name) = &last {
                        self.headers.append(name.clone(), value);
                    }
                }
            }
        }
        self
    }

    /// Return a request with `headers` appended, keeping existing values.
    pub fn extend_headers(mut self, headers: HeaderMap) -> Self {
        let mut last: Option<HeaderName> = None;
        for (name, value) in headers {
            if let Some(name) = name {
                last = Some(name);
            }
            if let Some(name) = &last {
                self.headers.append(name.clone(), value);
            }
        }
        self
    }

    /// Return a request with the given raw body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Return a request with a JSON body and `application/json` content type.
    pub fn with_json<T: Serialize>(self, body: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(body).map_err(|e| HttpClientError::Json(e.to_string()))?;
        Ok(self
            .with_header(http::header::CONTENT_TYPE.as_str(), "application/json")
            .with_body(bytes))
    }

    /// Return a request with a form-encoded body.
    pub fn with_form<T: Serialize>(self, form: &T) -> Result<Self> {
        let encoded = serde_urlencoded::to_string(form)
            .map_err(|e| HttpClientError::Json(e.to_string()))?;
        Ok(self
            .with_header(
                http::header::CONTENT_TYPE.as_str(),
                "application/x-www-form-urlencoded",
            )
            .with_body(encoded.into_bytes()))
    }

    /// Return a request with a query parameter appended.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_parameters.push((key.into(), value.into()));
        self
    }

    /// Return a request with a `{name}` path placeholder substitution.
    ///
    /// Values are substituted verbatim; URL-encoding is the caller's
    /// responsibility.
    pub fn with_path_parameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.path_parameters.push((name.into(), value.into()));
        self
    }

    /// The URL with path placeholders substituted.
    pub(crate) fn substituted_url(&self) -> String {
        let mut url = self.url.clone();
        for (name, value) in &self.path_parameters {
            url = url.replace(&format!("{{{}}}", name), value);
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_does_not_touch_original() {
        let original = Request::get("users/{id}").with_header("accept", "application/json");
        let derived = original
            .clone()
            .with_header("accept", "text/plain")
            .with_query("page", "2")
            .with_body("payload");

        assert_eq!(original.headers()["accept"], "application/json");
        assert!(original.body().is_none());
        assert!(original.query_parameters().is_empty());

        assert_eq!(derived.headers()["accept"], "text/plain");
        assert_eq!(derived.body().unwrap().as_ref(), b"payload");
        assert_eq!(derived.query_parameters().len(), 1);
    }

    #[test]
    fn test_update_headers_replaces() {
        let mut headers = HeaderMap::new();
        headers.append("x-tag", HeaderValue::from_static("b"));
        headers.append("x-tag", HeaderValue::from_static("c"));

        let request = Request::get("users")
            .with_header("x-tag", "a")
            .update_headers(headers);

        let values: Vec<_> = request.headers().get_all("x-tag").iter().collect();
        assert_eq!(values, vec!["b", "c"]);
    }

    #[test]
    fn test_extend_headers_appends() {
        let mut headers = HeaderMap::new();
        headers.append("x-tag", HeaderValue::from_static("b"));

        let request = Request::get("users")
            .with_header("x-tag", "a")
            .extend_headers(headers);

        let values: Vec<_> = request.headers().get_all("x-tag").iter().collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let request = Request::get("users").with_header("X-Service-Name", "billing");
        assert_eq!(request.headers()["x-service-name"], "billing");
    }

    #[test]
    fn test_json_body_sets_content_type() {
        #[derive(Serialize)]
        struct Order {
            item: String,
        }

        let request = Request::post_json(
            "orders",
            &Order {
                item: "widget".to_string(),
            },
        )
        .unwrap();

        assert_eq!(request.headers()["content-type"], "application/json");
        assert_eq!(request.body().unwrap().as_ref(), br#"{"item":"widget"}"#);
    }

    #[test]
    fn test_path_parameters_substituted_verbatim() {
        let request = Request::get("users/{id}/posts/{post}")
            .with_path_parameter("id", "42")
            .with_path_parameter("post", "a b");

        // No URL-encoding: the caller decides.
        assert_eq!(request.substituted_url(), "users/42/posts/a b");
    }

    #[test]
    fn test_query_parameters_keep_order() {
        let request = Request::get("search")
            .with_query("q", "rust")
            .with_query("page", "1")
            .with_query("q", "http");

        assert_eq!(
            request.query_parameters(),
            &[
                ("q".to_string(), "rust".to_string()),
                ("page".to_string(), "1".to_string()),
                ("q".to_string(), "http".to_string()),
            ]
        );
    }
}
