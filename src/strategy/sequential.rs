//! Sequential retry strategy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{AttemptSender, RequestStrategy, SendOutcome};
use crate::deadline::{Deadline, DeadlineProvider, SplitBetweenAttempts};
use crate::delays::{DelaysProvider, LinearDelays};
use crate::priority::Priority;
use crate::request::Request;

/// Issues attempts one after another until one is accepted.
///
/// Each attempt runs under a derived deadline so a slow attempt cannot eat
/// the entire budget; the deadline provider re-reads the remaining time, so
/// fast failures leave more budget for later attempts. An attempt whose
/// derived budget falls below `min_attempt_timeout` is not launched at
/// all; it would be doomed to time out.
pub struct SequentialStrategy {
    attempts_count: usize,
    delays_provider: Arc<dyn DelaysProvider>,
    deadline_provider: Arc<dyn DeadlineProvider>,
    min_attempt_timeout: Duration,
}

impl SequentialStrategy {
    /// Create a strategy with linear delays and an even deadline split.
    ///
    /// # Panics
    ///
    /// Panics if `attempts_count` is zero.
    pub fn new(attempts_count: usize) -> Self {
        assert!(attempts_count >= 1, "Attempts count must be >= 1");
        Self {
            attempts_count,
            delays_provider: Arc::new(LinearDelays::default()),
            deadline_provider: Arc::new(SplitBetweenAttempts::default()),
            min_attempt_timeout: Duration::from_millis(5),
        }
    }

    /// Set the inter-attempt delays provider.
    pub fn with_delays(mut self, delays_provider: impl DelaysProvider + 'static) -> Self {
        self.delays_provider = Arc::new(delays_provider);
        self
    }

    /// Set the per-attempt deadline provider.
    pub fn with_deadline_provider(
        mut self,
        deadline_provider: impl DeadlineProvider + 'static,
    ) -> Self {
        self.deadline_provider = Arc::new(deadline_provider);
        self
    }

    /// Set the smallest per-attempt budget worth launching.
    pub fn with_min_attempt_timeout(mut self, min_attempt_timeout: Duration) -> Self {
        self.min_attempt_timeout = min_attempt_timeout;
        self
    }
}

#[async_trait]
impl RequestStrategy for SequentialStrategy {
    async fn execute(
        &self,
        sender: &dyn AttemptSender,
        request: &Request,
        deadline: Deadline,
        priority: Priority,
    ) -> SendOutcome {
        let mut last: Option<SendOutcome> = None;

        for attempt in 0..self.attempts_count {
            if deadline.expired() {
                break;
            }

            let delay = self.delays_provider.delay(attempt);
            if !delay.is_zero() {
                if deadline.remaining() < delay {
                    break;
                }
                tokio::time::sleep(delay).await;
            }

            let attempt_deadline =
                self.deadline_provider
                    .attempt_deadline(deadline, attempt, self.attempts_count);
            if attempt_deadline.remaining() < self.min_attempt_timeout {
                debug!(attempt, "remaining budget below minimum, giving up");
                break;
            }

            let result = sender
                .send_attempt(request, attempt_deadline, priority)
                .await;
            let accepted = result.is_accepted();
            // Replacing the previous rejected outcome releases its response.
            last = Some(result);
            if accepted {
                break;
            }
            debug!(attempt, "attempt rejected");
        }

        last.unwrap_or_else(SendOutcome::timed_out)
    }
}
