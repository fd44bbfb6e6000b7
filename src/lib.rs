//! # Girder HTTP Client
//!
//! A resilient inter-service HTTP client built around pluggable request
//! strategies, deadline propagation and a rolling-window circuit breaker.
//!
//! ## Features
//!
//! - **Request strategies**: single-attempt, sequential retry, parallel
//!   (hedged) dispatch, and per-method routing between them
//! - **Deadlines**: monotonic time budgets, split across attempts and
//!   propagated downstream via the `x-request-deadline-at` header
//! - **Priorities**: opaque levels propagated via `x-request-priority`
//! - **Circuit Breaker**: failure-ratio accounting over a rolling window,
//!   keyed per endpoint and method, with half-open probing
//! - **Enrichers**: request/response transformation hooks (auth headers,
//!   logging, static headers)
//! - **Metrics**: pluggable sink fed by every attempt and breaker transition
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use girder_http_client::{Client, Request};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder()
//!         .endpoint("https://api.example.com")
//!         .build()?;
//!
//!     let response = client
//!         .request(Request::get("users/{id}").with_path_parameter("id", "42"))
//!         .await?;
//!
//!     println!("status: {}", response.status());
//!     Ok(())
//! }
//! ```
//!
//! ## Hedged Reads, Sequential Writes
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use girder_http_client::{
//!     CircuitBreaker, CircuitBreakerConfig, Client, ConstantDelays, Method,
//!     MethodBasedStrategy, ParallelStrategy, Request, SequentialStrategy,
//!     SingleAttemptStrategy,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let strategy = MethodBasedStrategy::new()
//!         .with_strategy(Method::GET, ParallelStrategy::new(3))
//!         .with_strategy(
//!             Method::POST,
//!             SequentialStrategy::new(3)
//!                 .with_delays(ConstantDelays::new(Duration::from_millis(50))),
//!         )
//!         .with_default(SingleAttemptStrategy);
//!
//!     let client = Client::builder()
//!         .endpoint("https://api.example.com")
//!         .default_strategy(strategy)
//!         .circuit_breaker(CircuitBreaker::new(CircuitBreakerConfig::default()))
//!         .build()?;
//!
//!     let response = client.request(Request::get("orders")).await?;
//!     println!("status: {}", response.status());
//!     Ok(())
//! }
//! ```

mod circuit_breaker;
mod classifier;
mod client;
mod deadline;
mod delays;
mod enrich;
mod error;
pub mod headers;
mod metrics;
mod priority;
mod request;
mod response;
mod strategy;
mod transport;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, KeyFn};
pub use classifier::{AttemptOutcome, DefaultResponseClassifier, ResponseClassifier, Verdict};
pub use client::{Client, ClientBuilder, RequestOptions};
pub use deadline::{Deadline, DeadlineProvider, PassThrough, SplitBetweenAttempts};
pub use delays::{ConstantDelays, DelaysProvider, LinearDelays, PercentileDelays};
pub use enrich::{
    BasicAuthEnricher, BearerAuthEnricher, HeaderEnricher, LoggingResponseEnricher,
    RequestEnricher, ResponseEnricher,
};
pub use error::{HttpClientError, Result};
pub use metrics::{
    MetricsSink, NoopMetricsSink, ObservedOutcome, RequestObservation, TransportMetrics,
};
pub use priority::Priority;
pub use request::Request;
pub use response::Response;
pub use strategy::{
    AttemptSender, MethodBasedStrategy, ParallelStrategy, RequestStrategy,
    RetryUntilDeadlineExpired, SendOutcome, SequentialStrategy, SingleAttemptStrategy,
};
pub use transport::{ReqwestTransport, Transport};

// Re-export common types
pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
pub use url::Url;

/// Prelude for common imports.
///
/// ```
/// use girder_http_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    pub use crate::classifier::{DefaultResponseClassifier, ResponseClassifier, Verdict};
    pub use crate::client::{Client, ClientBuilder, RequestOptions};
    pub use crate::deadline::{Deadline, DeadlineProvider, SplitBetweenAttempts};
    pub use crate::delays::{ConstantDelays, DelaysProvider, LinearDelays, PercentileDelays};
    pub use crate::error::{HttpClientError, Result};
    pub use crate::metrics::{MetricsSink, NoopMetricsSink, TransportMetrics};
    pub use crate::priority::Priority;
    pub use crate::request::Request;
    pub use crate::response::Response;
    pub use crate::strategy::{
        MethodBasedStrategy, ParallelStrategy, RequestStrategy, SequentialStrategy,
        SingleAttemptStrategy,
    };
    pub use crate::transport::{ReqwestTransport, Transport};
    pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
}
