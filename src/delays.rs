//! Inter-attempt delay providers.
//!
//! A delays provider maps an attempt index to the time to wait before that
//! attempt is issued. Index 0 is the first attempt and usually maps to zero.

use std::sync::Arc;
use std::time::Duration;

use crate::metrics::TransportMetrics;

/// Maps an attempt index to the delay before issuing that attempt.
pub trait DelaysProvider: Send + Sync {
    /// The delay before attempt `attempt` (0-based).
    fn delay(&self, attempt: usize) -> Duration;
}

/// The same delay before every attempt.
#[derive(Debug, Clone, Copy)]
pub struct ConstantDelays {
    delay: Duration,
}

impl ConstantDelays {
    /// Create a provider with a fixed delay.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl DelaysProvider for ConstantDelays {
    fn delay(&self, _attempt: usize) -> Duration {
        self.delay
    }
}

/// Linearly growing delay: `min_delay + multiplier * attempt`.
#[derive(Debug, Clone, Copy)]
pub struct LinearDelays {
    min_delay: Duration,
    multiplier: Duration,
}

impl LinearDelays {
    /// Create a provider growing by `multiplier` per attempt.
    pub fn new(min_delay: Duration, multiplier: Duration) -> Self {
        Self {
            min_delay,
            multiplier,
        }
    }
}

impl Default for LinearDelays {
    fn default() -> Self {
        Self {
            min_delay: Duration::ZERO,
            multiplier: Duration::from_millis(50),
        }
    }
}

impl DelaysProvider for LinearDelays {
    fn delay(&self, attempt: usize) -> Duration {
        self.min_delay + self.multiplier.saturating_mul(attempt as u32)
    }
}

/// Delay derived from observed transport latencies.
///
/// Reads a shared [`TransportMetrics`] window and waits for the latency at
/// the chosen percentile, scaled by the attempt index. A parallel strategy
/// configured with this provider hedges exactly at that tail: the second
/// attempt launches once the first has been in flight longer than the
/// chosen share of requests take. Falls back to `min_delay` while the
/// window is still empty.
pub struct PercentileDelays {
    metrics: Arc<TransportMetrics>,
    percentile: f64,
    min_delay: Duration,
    max_delay: Duration,
}

impl PercentileDelays {
    /// Create a provider hedging at `percentile` (in `(0, 1)`).
    ///
    /// # Panics
    ///
    /// Panics if `percentile` is outside `(0, 1)`.
    pub fn new(metrics: Arc<TransportMetrics>, percentile: f64) -> Self {
        assert!(
            percentile > 0.0 && percentile < 1.0,
            "Percentile must be within (0, 1)"
        );
        Self {
            metrics,
            percentile,
            min_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(10),
        }
    }

    /// Set the delay used while no latencies have been observed, and the
    /// lower clamp for observed ones.
    pub fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// Set the upper clamp for observed latencies.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }
}

impl DelaysProvider for PercentileDelays {
    fn delay(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base = self
            .metrics
            .percentile(self.percentile)
            .unwrap_or(self.min_delay)
            .clamp(self.min_delay, self.max_delay);
        base.saturating_mul(attempt as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_delays() {
        let delays = ConstantDelays::new(Duration::from_millis(100));
        assert_eq!(delays.delay(0), Duration::from_millis(100));
        assert_eq!(delays.delay(1), Duration::from_millis(100));
        assert_eq!(delays.delay(5), Duration::from_millis(100));
    }

    #[test]
    fn test_linear_delays() {
        let delays = LinearDelays::new(Duration::from_millis(10), Duration::from_millis(50));
        assert_eq!(delays.delay(0), Duration::from_millis(10));
        assert_eq!(delays.delay(1), Duration::from_millis(60));
        assert_eq!(delays.delay(3), Duration::from_millis(160));
    }

    #[test]
    fn test_percentile_delays_fall_back_to_min() {
        let metrics = Arc::new(TransportMetrics::new());
        let delays = PercentileDelays::new(metrics, 0.95);

        assert_eq!(delays.delay(0), Duration::ZERO);
        assert_eq!(delays.delay(1), Duration::from_millis(50));
        assert_eq!(delays.delay(2), Duration::from_millis(100));
    }

    #[test]
    fn test_percentile_delays_track_observations() {
        let metrics = Arc::new(TransportMetrics::new());
        for ms in [100, 200, 300, 400] {
            metrics.record(Duration::from_millis(ms));
        }

        let delays = PercentileDelays::new(metrics, 0.75).with_min_delay(Duration::ZERO);
        assert_eq!(delays.delay(1), Duration::from_millis(300));
        assert_eq!(delays.delay(2), Duration::from_millis(600));
    }

    #[test]
    fn test_percentile_delays_clamp() {
        let metrics = Arc::new(TransportMetrics::new());
        metrics.record(Duration::from_secs(60));

        let delays = PercentileDelays::new(metrics, 0.5).with_max_delay(Duration::from_secs(2));
        assert_eq!(delays.delay(1), Duration::from_secs(2));
    }

    #[test]
    #[should_panic(expected = "Percentile must be within (0, 1)")]
    fn test_percentile_out_of_range() {
        PercentileDelays::new(Arc::new(TransportMetrics::new()), 1.5);
    }
}
