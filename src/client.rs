//! Client wiring the strategy, breaker, transport and enrichers together.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue};
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::circuit_breaker::CircuitBreaker;
use crate::classifier::{DefaultResponseClassifier, ResponseClassifier, Verdict};
use crate::deadline::Deadline;
use crate::enrich::{RequestEnricher, ResponseEnricher};
use crate::headers::{X_REQUEST_DEADLINE_AT, X_REQUEST_PRIORITY};
use crate::metrics::{MetricsSink, NoopMetricsSink, ObservedOutcome, RequestObservation};
use crate::priority::Priority;
use crate::request::Request;
use crate::response::Response;
use crate::strategy::{AttemptSender, RequestStrategy, SendOutcome, SingleAttemptStrategy};
use crate::transport::{ReqwestTransport, Transport};
use crate::{HttpClientError, Result};

/// Per-request overrides for [`Client::request_with`].
#[derive(Clone, Default)]
pub struct RequestOptions {
    deadline: Option<Deadline>,
    priority: Option<Priority>,
    strategy: Option<Arc<dyn RequestStrategy>>,
}

impl RequestOptions {
    /// Create empty options; the client's defaults apply.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the request under this deadline instead of the default timeout.
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Propagate this priority instead of the client default.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Execute with this strategy instead of the client default.
    pub fn with_strategy(mut self, strategy: impl RequestStrategy + 'static) -> Self {
        self.strategy = Some(Arc::new(strategy));
        self
    }
}

/// Inter-service HTTP client.
///
/// A client owns an endpoint, a transport, a default strategy and the
/// ambient pieces around them: enrichers, a response classifier, a metrics
/// sink and optionally a circuit breaker. Cloning is cheap and shares all
/// of it.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    endpoint: Url,
    transport: Arc<dyn Transport>,
    default_strategy: Arc<dyn RequestStrategy>,
    circuit_breaker: Option<CircuitBreaker>,
    request_enrichers: Vec<Arc<dyn RequestEnricher>>,
    response_enrichers: Vec<Arc<dyn ResponseEnricher>>,
    classifier: Arc<dyn ResponseClassifier>,
    metrics: Arc<dyn MetricsSink>,
    default_timeout: Duration,
    default_priority: Priority,
    min_attempt_timeout: Duration,
    emit_system_headers: bool,
}

impl Client {
    /// Create a configuration builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The endpoint requests are sent against.
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// Execute a request with the client's default deadline, priority and
    /// strategy.
    pub async fn request(&self, request: Request) -> Result<Response> {
        self.request_with(request, RequestOptions::default()).await
    }

    /// Execute a request with per-request overrides.
    pub async fn request_with(&self, request: Request, options: RequestOptions) -> Result<Response> {
        let inner = &*self.inner;
        let deadline = options
            .deadline
            .unwrap_or_else(|| Deadline::from_timeout(inner.default_timeout));
        let priority = options.priority.unwrap_or(inner.default_priority);

        let mut request = request;
        for enricher in &inner.request_enrichers {
            request = enricher.enrich(request).await?;
        }

        let breaker_key = inner
            .circuit_breaker
            .as_ref()
            .map(|breaker| breaker.key_for(&inner.endpoint, &request));

        if let (Some(breaker), Some(key)) = (&inner.circuit_breaker, &breaker_key)
            && !breaker.try_acquire(key)
        {
            debug!(key, "request short-circuited by circuit breaker");
            return match breaker.fallback_status() {
                Some(status) => Ok(Response::circuit_open(status)),
                None => Err(HttpClientError::CircuitOpen),
            };
        }

        let sender = PipelineSender {
            inner,
            breaker_key,
        };
        let strategy = options
            .strategy
            .as_deref()
            .unwrap_or(inner.default_strategy.as_ref());
        strategy
            .execute(&sender, &request, deadline, priority)
            .await
            .outcome
    }
}

/// The per-attempt pipeline handed to strategies.
///
/// Each attempt re-reads the remaining deadline, so the propagated
/// `x-request-deadline-at` always reflects the budget left *now*, not the
/// one the caller started with.
struct PipelineSender<'a> {
    inner: &'a ClientInner,
    breaker_key: Option<String>,
}

#[async_trait]
impl AttemptSender for PipelineSender<'_> {
    async fn send_attempt(
        &self,
        request: &Request,
        deadline: Deadline,
        priority: Priority,
    ) -> SendOutcome {
        let inner = self.inner;

        if deadline.expired() || deadline.remaining() < inner.min_attempt_timeout {
            debug!("attempt budget below minimum, skipping dispatch");
            let outcome = Ok(Response::low_timeout());
            let verdict = inner.classifier.classify(&outcome);
            return SendOutcome::new(outcome, verdict);
        }

        let request = if inner.emit_system_headers {
            let mut headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::try_from(deadline.to_header_value()) {
                headers.insert(X_REQUEST_DEADLINE_AT, value);
            }
            if let Ok(value) = HeaderValue::try_from(priority.to_string()) {
                headers.insert(X_REQUEST_PRIORITY, value);
            }
            request.clone().update_headers(headers)
        } else {
            request.clone()
        };

        let started = Instant::now();
        let mut outcome = inner
            .transport
            .send(&inner.endpoint, &request, deadline)
            .await;
        for enricher in &inner.response_enrichers {
            outcome = match outcome {
                Ok(response) => enricher.enrich(response).await,
                Err(error) => Err(error),
            };
        }

        let observed = match &outcome {
            Ok(response) => ObservedOutcome::Status(response.status()),
            Err(error) => ObservedOutcome::from_error(error),
        };
        inner.metrics.record_request(&RequestObservation {
            endpoint: inner.endpoint.clone(),
            method: request.method().clone(),
            path: request.url().to_string(),
            outcome: observed,
            latency: started.elapsed(),
        });

        let verdict = inner.classifier.classify(&outcome);
        if let (Some(breaker), Some(key)) = (&inner.circuit_breaker, &self.breaker_key) {
            breaker.record(key, verdict == Verdict::Accept);
        }

        SendOutcome::new(outcome, verdict)
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    endpoint: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    default_strategy: Arc<dyn RequestStrategy>,
    circuit_breaker: Option<CircuitBreaker>,
    request_enrichers: Vec<Arc<dyn RequestEnricher>>,
    response_enrichers: Vec<Arc<dyn ResponseEnricher>>,
    classifier: Arc<dyn ResponseClassifier>,
    metrics: Arc<dyn MetricsSink>,
    default_timeout: Duration,
    default_priority: Priority,
    min_attempt_timeout: Duration,
    emit_system_headers: bool,
}

impl ClientBuilder {
    /// Create a builder with single-attempt dispatch and a 20 second
    /// default timeout.
    pub fn new() -> Self {
        Self {
            endpoint: None,
            transport: None,
            default_strategy: Arc::new(SingleAttemptStrategy),
            circuit_breaker: None,
            request_enrichers: Vec::new(),
            response_enrichers: Vec::new(),
            classifier: Arc::new(DefaultResponseClassifier),
            metrics: Arc::new(NoopMetricsSink),
            default_timeout: Duration::from_secs(20),
            default_priority: Priority::NORMAL,
            min_attempt_timeout: Duration::from_millis(5),
            emit_system_headers: true,
        }
    }

    /// Set the base URL requests are sent against. Required.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the transport driver. Defaults to [`ReqwestTransport`].
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Set the strategy used when a request carries no override.
    pub fn default_strategy(mut self, strategy: impl RequestStrategy + 'static) -> Self {
        self.default_strategy = Arc::new(strategy);
        self
    }

    /// Gate the pipeline with a circuit breaker.
    ///
    /// The breaker's state transitions are reported to this client's
    /// metrics sink.
    pub fn circuit_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    /// Append a request enricher; enrichers run in insertion order.
    pub fn request_enricher(mut self, enricher: impl RequestEnricher + 'static) -> Self {
        self.request_enrichers.push(Arc::new(enricher));
        self
    }

    /// Append a response enricher; enrichers run in insertion order.
    pub fn response_enricher(mut self, enricher: impl ResponseEnricher + 'static) -> Self {
        self.response_enrichers.push(Arc::new(enricher));
        self
    }

    /// Replace the default response classifier.
    pub fn response_classifier(mut self, classifier: impl ResponseClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Set the metrics sink observations are emitted to.
    pub fn metrics(mut self, metrics: impl MetricsSink + 'static) -> Self {
        self.metrics = Arc::new(metrics);
        self
    }

    /// Set the deadline applied when a request carries none.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the priority applied when a request carries none.
    pub fn default_priority(mut self, priority: Priority) -> Self {
        self.default_priority = priority;
        self
    }

    /// Set the smallest per-attempt budget worth dispatching; attempts
    /// below it receive a synthetic timeout response instead.
    pub fn min_attempt_timeout(mut self, min_attempt_timeout: Duration) -> Self {
        self.min_attempt_timeout = min_attempt_timeout;
        self
    }

    /// Control emission of the `x-request-deadline-at` and
    /// `x-request-priority` headers. On by default.
    pub fn emit_system_headers(mut self, emit: bool) -> Self {
        self.emit_system_headers = emit;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<Client> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| HttpClientError::Configuration("endpoint is required".to_string()))?;
        let endpoint =
            Url::parse(&endpoint).map_err(|e| HttpClientError::InvalidUrl(e.to_string()))?;
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));
        let circuit_breaker = self
            .circuit_breaker
            .map(|breaker| breaker.with_metrics(self.metrics.clone()));

        Ok(Client {
            inner: Arc::new(ClientInner {
                endpoint,
                transport,
                default_strategy: self.default_strategy,
                circuit_breaker,
                request_enrichers: self.request_enrichers,
                response_enrichers: self.response_enrichers,
                classifier: self.classifier,
                metrics: self.metrics,
                default_timeout: self.default_timeout,
                default_priority: self.default_priority,
                min_attempt_timeout: self.min_attempt_timeout,
                emit_system_headers: self.emit_system_headers,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_endpoint() {
        let result = Client::builder().build();
        assert!(matches!(result, Err(HttpClientError::Configuration(_))));
    }

    #[test]
    fn test_build_rejects_invalid_endpoint() {
        let result = Client::builder().endpoint("not a url").build();
        assert!(matches!(result, Err(HttpClientError::InvalidUrl(_))));
    }

    #[test]
    fn test_build_with_defaults() {
        let client = Client::builder()
            .endpoint("https://api.example.com")
            .build()
            .unwrap();
        assert_eq!(client.endpoint().as_str(), "https://api.example.com/");
    }
}
