//! Rolling-window circuit breaker keyed per endpoint and method.
//!
//! Failure accounting uses a fixed-resolution ring of buckets spanning the
//! sampling window: each observation lands in the bucket for the current
//! time slice, stale buckets are zeroed before the failure ratio is summed.
//! State transitions follow the classic closed / open / half-open machine;
//! in half-open exactly one probe is admitted while everyone else keeps
//! short-circuiting.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use http::StatusCode;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::metrics::{MetricsSink, NoopMetricsSink};
use crate::request::Request;

/// Key function deriving the breaker scope from a request.
pub type KeyFn = Arc<dyn Fn(&Url, &Request) -> String + Send + Sync>;

/// Circuit breaker state, as observed from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests pass; outcomes feed the rolling window.
    Closed,
    /// Requests short-circuit until the break duration elapses.
    Open,
    /// One probe is in flight; its outcome decides the next state.
    HalfOpen,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// How long the circuit stays open before admitting a probe.
    pub break_duration: Duration,
    /// Width of the rolling window failure ratios are assessed over.
    pub sampling_duration: Duration,
    /// Observations required in the window before the circuit may open.
    pub minimum_throughput: u32,
    /// Failure ratio in `(0, 1]` at which the circuit opens.
    pub failure_threshold: f64,
    /// Number of buckets the sampling window is divided into.
    pub windows_count: usize,
    /// Status of the synthetic fallback response returned while open;
    /// `None` surfaces a `CircuitOpen` error instead.
    pub fallback_status: Option<StatusCode>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            break_duration: Duration::from_secs(30),
            sampling_duration: Duration::from_secs(60),
            minimum_throughput: 10,
            failure_threshold: 0.5,
            windows_count: 10,
            fallback_status: Some(StatusCode::SERVICE_UNAVAILABLE),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a config with the given break duration and failure threshold.
    pub fn new(break_duration: Duration, failure_threshold: f64) -> Self {
        Self {
            break_duration,
            failure_threshold,
            ..Default::default()
        }
    }

    /// Set the sampling window width.
    pub fn with_sampling_duration(mut self, duration: Duration) -> Self {
        self.sampling_duration = duration;
        self
    }

    /// Set the minimum observations before the circuit may open.
    pub fn with_minimum_throughput(mut self, throughput: u32) -> Self {
        self.minimum_throughput = throughput;
        self
    }

    /// Set the number of buckets in the sampling window.
    pub fn with_windows_count(mut self, count: usize) -> Self {
        self.windows_count = count;
        self
    }

    /// Set the fallback status, or `None` to surface an error instead.
    pub fn with_fallback_status(mut self, status: Option<StatusCode>) -> Self {
        self.fallback_status = status;
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    era: u64,
    total: u32,
    failures: u32,
}

#[derive(Debug, Clone, Copy)]
enum CellState {
    Closed,
    Open { until: Instant },
    HalfOpen { until: Instant },
}

impl CellState {
    fn observed(&self) -> CircuitState {
        match self {
            Self::Closed => CircuitState::Closed,
            Self::Open { .. } => CircuitState::Open,
            Self::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

struct BreakerCell {
    state: CellState,
    buckets: Vec<Bucket>,
}

impl BreakerCell {
    fn new(windows_count: usize) -> Self {
        Self {
            state: CellState::Closed,
            buckets: vec![Bucket::default(); windows_count],
        }
    }

    fn observe(&mut self, era: u64, failure: bool) {
        let slot = (era % self.buckets.len() as u64) as usize;
        let bucket = &mut self.buckets[slot];
        if bucket.era != era {
            *bucket = Bucket {
                era,
                total: 0,
                failures: 0,
            };
        }
        bucket.total += 1;
        if failure {
            bucket.failures += 1;
        }
    }

    /// Sum `(total, failures)` over buckets still inside the window.
    fn totals(&self, era: u64) -> (u32, u32) {
        let window = self.buckets.len() as u64;
        self.buckets
            .iter()
            .filter(|b| b.total > 0 && era.saturating_sub(b.era) < window)
            .fold((0, 0), |(total, failures), b| {
                (total + b.total, failures + b.failures)
            })
    }

    fn reset_window(&mut self) {
        for bucket in &mut self.buckets {
            *bucket = Bucket::default();
        }
    }
}

/// Keyed circuit breaker over a rolling failure window.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    bucket_width: Duration,
    started_at: Instant,
    cells: DashMap<String, BreakerCell>,
    key_fn: KeyFn,
    metrics: Arc<dyn MetricsSink>,
}

impl CircuitBreaker {
    /// Create a breaker; per-key state is allocated lazily on first use.
    ///
    /// # Panics
    ///
    /// Panics if any config parameter is out of range.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        assert!(
            !config.break_duration.is_zero(),
            "Break duration must be positive"
        );
        assert!(
            !config.sampling_duration.is_zero(),
            "Sampling duration must be positive"
        );
        assert!(
            config.minimum_throughput > 0,
            "Minimum throughput must be positive"
        );
        assert!(
            config.failure_threshold > 0.0 && config.failure_threshold <= 1.0,
            "Failure threshold must be within (0, 1]"
        );
        assert!(config.windows_count > 0, "Windows count must be positive");

        let bucket_width = config.sampling_duration / config.windows_count as u32;
        Self {
            bucket_width,
            started_at: Instant::now(),
            cells: DashMap::new(),
            key_fn: Arc::new(|endpoint, request| format!("{} {}", request.method(), endpoint)),
            metrics: Arc::new(NoopMetricsSink),
            config,
        }
    }

    /// Replace the default `"{method} {endpoint}"` key function.
    pub fn with_key_fn(
        mut self,
        key_fn: impl Fn(&Url, &Request) -> String + Send + Sync + 'static,
    ) -> Self {
        self.key_fn = Arc::new(key_fn);
        self
    }

    /// Report state transitions to the given sink.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The fallback status configured for short-circuited requests.
    pub fn fallback_status(&self) -> Option<StatusCode> {
        self.config.fallback_status
    }

    /// Derive the breaker key for a request.
    pub fn key_for(&self, endpoint: &Url, request: &Request) -> String {
        (self.key_fn)(endpoint, request)
    }

    /// The currently observed state for a key.
    pub fn state(&self, key: &str) -> CircuitState {
        self.cells
            .get(key)
            .map(|cell| cell.state.observed())
            .unwrap_or(CircuitState::Closed)
    }

    /// Check whether a request may pass.
    ///
    /// While open, returns `false` until the break duration elapses; the
    /// first caller after that wins the probe slot and flips the circuit to
    /// half-open, which keeps rejecting everyone else until the probe's
    /// outcome is recorded.
    pub fn try_acquire(&self, key: &str) -> bool {
        let mut cell = self
            .cells
            .entry(key.to_string())
            .or_insert_with(|| BreakerCell::new(self.config.windows_count));

        let until = match cell.state {
            CellState::Closed => return true,
            CellState::Open { until } | CellState::HalfOpen { until } => until,
        };

        let now = Instant::now();
        if now < until {
            return false;
        }

        let from = cell.state.observed();
        cell.state = CellState::HalfOpen {
            until: now + self.config.break_duration,
        };
        debug!(key, "circuit breaker admitting probe");
        self.metrics
            .record_breaker_transition(key, from, CircuitState::HalfOpen);
        true
    }

    /// Record an attempt outcome for a key.
    pub fn record(&self, key: &str, success: bool) {
        let mut cell = self
            .cells
            .entry(key.to_string())
            .or_insert_with(|| BreakerCell::new(self.config.windows_count));
        let era = self.current_era();

        if success {
            if matches!(cell.state, CellState::HalfOpen { .. }) {
                info!(key, "circuit breaker closing");
                cell.state = CellState::Closed;
                cell.reset_window();
                self.metrics.record_breaker_transition(
                    key,
                    CircuitState::HalfOpen,
                    CircuitState::Closed,
                );
            }
            cell.observe(era, false);
            return;
        }

        match cell.state {
            CellState::Closed => {
                cell.observe(era, true);
                let (total, failures) = cell.totals(era);
                if total >= self.config.minimum_throughput
                    && failures as f64 / total as f64 >= self.config.failure_threshold
                {
                    self.open(&mut cell, key, CircuitState::Closed);
                }
            }
            CellState::Open { .. } => {
                cell.observe(era, true);
            }
            CellState::HalfOpen { .. } => {
                // Probe failed; no need to count it against the fresh window.
                self.open(&mut cell, key, CircuitState::HalfOpen);
            }
        }
    }

    fn open(&self, cell: &mut BreakerCell, key: &str, from: CircuitState) {
        warn!(key, "circuit breaker opening");
        cell.state = CellState::Open {
            until: Instant::now() + self.config.break_duration,
        };
        self.metrics
            .record_breaker_transition(key, from, CircuitState::Open);
    }

    fn current_era(&self) -> u64 {
        let elapsed = Instant::now().saturating_duration_since(self.started_at);
        (elapsed.as_nanos() / self.bucket_width.as_nanos().max(1)) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(minimum_throughput: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            CircuitBreakerConfig::new(Duration::from_secs(1), 0.5)
                .with_sampling_duration(Duration::from_secs(1))
                .with_minimum_throughput(minimum_throughput),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_at_failure_threshold() {
        let cb = breaker(2);

        assert!(cb.try_acquire("orders"));
        cb.record("orders", false);
        assert_eq!(cb.state("orders"), CircuitState::Closed);

        assert!(cb.try_acquire("orders"));
        cb.record("orders", false);
        assert_eq!(cb.state("orders"), CircuitState::Open);
        assert!(!cb.try_acquire("orders"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stays_closed_below_minimum_throughput() {
        let cb = breaker(10);

        for _ in 0..5 {
            cb.record("orders", false);
        }
        assert_eq!(cb.state("orders"), CircuitState::Closed);
        assert!(cb.try_acquire("orders"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_successes_keep_ratio_below_threshold() {
        let cb = breaker(2);

        cb.record("orders", true);
        cb.record("orders", true);
        cb.record("orders", false);
        // 1 failure out of 3 is below the 0.5 threshold.
        assert_eq!(cb.state("orders"), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_single_probe() {
        let cb = breaker(2);
        cb.record("orders", false);
        cb.record("orders", false);
        assert!(!cb.try_acquire("orders"));

        tokio::time::advance(Duration::from_millis(1100)).await;

        assert!(cb.try_acquire("orders"));
        assert_eq!(cb.state("orders"), CircuitState::HalfOpen);
        assert!(!cb.try_acquire("orders"));
        assert!(!cb.try_acquire("orders"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_success_closes_and_resets() {
        let cb = breaker(2);
        cb.record("orders", false);
        cb.record("orders", false);

        tokio::time::advance(Duration::from_millis(1100)).await;
        assert!(cb.try_acquire("orders"));
        cb.record("orders", true);

        assert_eq!(cb.state("orders"), CircuitState::Closed);
        // The window was reset: one more failure is not enough to reopen.
        cb.record("orders", false);
        assert_eq!(cb.state("orders"), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failure_reopens() {
        let cb = breaker(2);
        cb.record("orders", false);
        cb.record("orders", false);

        tokio::time::advance(Duration::from_millis(1100)).await;
        assert!(cb.try_acquire("orders"));
        cb.record("orders", false);

        assert_eq!(cb.state("orders"), CircuitState::Open);
        assert!(!cb.try_acquire("orders"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expiry_forgets_failures() {
        let cb = breaker(3);
        cb.record("orders", false);
        cb.record("orders", false);

        // Old failures fall out of the 1s sampling window.
        tokio::time::advance(Duration::from_secs(2)).await;

        cb.record("orders", false);
        assert_eq!(cb.state("orders"), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let cb = breaker(2);
        cb.record("orders", false);
        cb.record("orders", false);

        assert!(!cb.try_acquire("orders"));
        assert!(cb.try_acquire("users"));
        assert_eq!(cb.state("users"), CircuitState::Closed);
    }

    #[test]
    fn test_default_key_fn() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
        let endpoint = Url::parse("https://api.example.com/").unwrap();
        let key = cb.key_for(&endpoint, &Request::get("users"));
        assert_eq!(key, "GET https://api.example.com/");
    }

    #[test]
    #[should_panic(expected = "Failure threshold must be within (0, 1]")]
    fn test_rejects_zero_threshold() {
        CircuitBreaker::new(CircuitBreakerConfig::new(Duration::from_secs(1), 0.0));
    }
}
