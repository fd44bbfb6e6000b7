//! Metric observations emitted by the pipeline.
//!
//! Every transport attempt produces a [`RequestObservation`] and every
//! circuit breaker transition is reported, whether or not anyone listens;
//! the default sink is a no-op.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode};
use parking_lot::Mutex;
use tokio::time::Instant;
use url::Url;

use crate::HttpClientError;
use crate::circuit_breaker::CircuitState;

/// The terminal outcome of one transport attempt, as observed for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedOutcome {
    /// A response was received with this status.
    Status(StatusCode),
    /// The attempt timed out.
    Timeout,
    /// TCP/DNS failure before the HTTP exchange.
    ConnectError,
    /// Any other transport failure.
    TransportError,
}

impl ObservedOutcome {
    pub(crate) fn from_error(error: &HttpClientError) -> Self {
        match error {
            HttpClientError::Timeout => Self::Timeout,
            HttpClientError::Connect(_) => Self::ConnectError,
            _ => Self::TransportError,
        }
    }
}

impl fmt::Display for ObservedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "{}", status.as_u16()),
            Self::Timeout => write!(f, "timeout"),
            Self::ConnectError => write!(f, "connect_error"),
            Self::TransportError => write!(f, "transport_error"),
        }
    }
}

/// One transport attempt, labeled the way dashboards want it.
#[derive(Debug, Clone)]
pub struct RequestObservation {
    /// The endpoint the attempt was sent to.
    pub endpoint: Url,
    /// The request method.
    pub method: Method,
    /// The relative request URL, placeholders unsubstituted.
    pub path: String,
    /// Status code or error kind.
    pub outcome: ObservedOutcome,
    /// Wall time spent in the transport.
    pub latency: Duration,
}

/// Pluggable sink for pipeline observations.
///
/// Both methods default to doing nothing, so a sink only implements what it
/// cares about.
pub trait MetricsSink: Send + Sync {
    /// Record a completed transport attempt.
    fn record_request(&self, observation: &RequestObservation) {
        let _ = observation;
    }

    /// Record a circuit breaker state transition.
    fn record_breaker_transition(&self, key: &str, from: CircuitState, to: CircuitState) {
        let _ = (key, from, to);
    }
}

impl<T: MetricsSink + ?Sized> MetricsSink for Arc<T> {
    fn record_request(&self, observation: &RequestObservation) {
        (**self).record_request(observation);
    }

    fn record_breaker_transition(&self, key: &str, from: CircuitState, to: CircuitState) {
        (**self).record_breaker_transition(key, from, to);
    }
}

/// Sink that drops every observation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {}

/// Rolling window of observed transport latencies.
///
/// Samples land in every live bucket, so the oldest bucket approximates the
/// distribution over the whole window; expired buckets fall off the front.
/// Only successful responses are sampled since error latencies would skew
/// the hedging delay. Share one instance between the client (as its metrics
/// sink) and a percentile-based delays provider.
pub struct TransportMetrics {
    bucket_width: Duration,
    bucket_ttl: Duration,
    buckets: Mutex<VecDeque<LatencyBucket>>,
}

struct LatencyBucket {
    started_at: Instant,
    samples: Vec<f64>,
}

impl TransportMetrics {
    /// Create a tracker with a 5 minute window over 2 buckets.
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(5 * 60), 2)
    }

    /// Create a tracker with a custom window.
    ///
    /// # Panics
    ///
    /// Panics if the window is zero or `buckets_count` is zero.
    pub fn with_window(window: Duration, buckets_count: usize) -> Self {
        assert!(!window.is_zero(), "Window must be non-zero");
        assert!(buckets_count > 0, "Buckets count must be greater than 0");

        let bucket_width = window / buckets_count as u32;
        Self {
            bucket_width,
            bucket_ttl: window + bucket_width,
            buckets: Mutex::new(VecDeque::new()),
        }
    }

    /// Record one observed latency.
    pub fn record(&self, latency: Duration) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        Self::prune(&mut buckets, now, self.bucket_ttl);

        let start_new = match buckets.back() {
            Some(last) => now.saturating_duration_since(last.started_at) >= self.bucket_width,
            None => true,
        };
        if start_new {
            buckets.push_back(LatencyBucket {
                started_at: now,
                samples: Vec::new(),
            });
        }

        for bucket in buckets.iter_mut() {
            bucket.samples.push(latency.as_secs_f64());
        }
    }

    /// The latency at `percentile` (in `(0, 1)`) over the current window,
    /// or `None` when nothing has been observed yet.
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();
        Self::prune(&mut buckets, now, self.bucket_ttl);

        let oldest = buckets.front()?;
        if oldest.samples.is_empty() {
            return None;
        }

        let mut samples = oldest.samples.clone();
        samples.sort_by(|a, b| a.total_cmp(b));
        let rank = ((samples.len() as f64 * percentile).ceil() as usize)
            .clamp(1, samples.len())
            - 1;
        Some(Duration::from_secs_f64(samples[rank]))
    }

    fn prune(buckets: &mut VecDeque<LatencyBucket>, now: Instant, ttl: Duration) {
        while let Some(front) = buckets.front() {
            if now.saturating_duration_since(front.started_at) > ttl {
                buckets.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for TransportMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for TransportMetrics {
    fn record_request(&self, observation: &RequestObservation) {
        if let ObservedOutcome::Status(status) = observation.outcome
            && status.is_success()
        {
            self.record(observation.latency);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(outcome: ObservedOutcome, latency: Duration) -> RequestObservation {
        RequestObservation {
            endpoint: Url::parse("https://api.example.com/").unwrap(),
            method: Method::GET,
            path: "users".to_string(),
            outcome,
            latency,
        }
    }

    #[test]
    fn test_percentile_empty() {
        let metrics = TransportMetrics::new();
        assert_eq!(metrics.percentile(0.95), None);
    }

    #[test]
    fn test_percentile_ranks() {
        let metrics = TransportMetrics::new();
        for ms in [10, 20, 30, 40, 50, 60, 70, 80, 90, 100] {
            metrics.record(Duration::from_millis(ms));
        }

        assert_eq!(metrics.percentile(0.5), Some(Duration::from_millis(50)));
        assert_eq!(metrics.percentile(0.95), Some(Duration::from_millis(100)));
        assert_eq!(metrics.percentile(0.01), Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_only_successes_are_sampled() {
        let metrics = TransportMetrics::new();
        metrics.record_request(&observation(
            ObservedOutcome::Status(StatusCode::OK),
            Duration::from_millis(10),
        ));
        metrics.record_request(&observation(
            ObservedOutcome::Status(StatusCode::BAD_GATEWAY),
            Duration::from_secs(9),
        ));
        metrics.record_request(&observation(ObservedOutcome::Timeout, Duration::from_secs(9)));

        assert_eq!(metrics.percentile(0.99), Some(Duration::from_millis(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expiry() {
        let metrics = TransportMetrics::with_window(Duration::from_secs(10), 2);
        metrics.record(Duration::from_millis(500));

        tokio::time::advance(Duration::from_secs(16)).await;
        assert_eq!(metrics.percentile(0.95), None);

        metrics.record(Duration::from_millis(20));
        assert_eq!(metrics.percentile(0.95), Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(ObservedOutcome::Status(StatusCode::OK).to_string(), "200");
        assert_eq!(ObservedOutcome::Timeout.to_string(), "timeout");
        assert_eq!(ObservedOutcome::ConnectError.to_string(), "connect_error");
    }
}
