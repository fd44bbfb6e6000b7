//! Parallel (hedged) strategy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tracing::debug;

use super::{AttemptSender, RequestStrategy, SendOutcome};
use crate::deadline::Deadline;
use crate::delays::{DelaysProvider, LinearDelays};
use crate::priority::Priority;
use crate::request::Request;

/// Races hedged attempts; the first accepted outcome wins.
///
/// Attempt 0 launches immediately, attempt `i` after `delays_provider(i)`
/// from the start, unless an earlier attempt has already been accepted, in
/// which case the pending attempts are dropped before they reach the
/// transport. The winner's siblings are cancelled by dropping their
/// futures; a sibling that already produced a response has that response
/// dropped here rather than leaked to the caller.
pub struct ParallelStrategy {
    attempts_count: usize,
    delays_provider: Arc<dyn DelaysProvider>,
}

impl ParallelStrategy {
    /// Create a strategy with linear hedging delays.
    ///
    /// # Panics
    ///
    /// Panics if `attempts_count` is zero.
    pub fn new(attempts_count: usize) -> Self {
        assert!(attempts_count >= 1, "Attempts count must be >= 1");
        Self {
            attempts_count,
            delays_provider: Arc::new(LinearDelays::default()),
        }
    }

    /// Set the hedging delays provider.
    pub fn with_delays(mut self, delays_provider: impl DelaysProvider + 'static) -> Self {
        self.delays_provider = Arc::new(delays_provider);
        self
    }
}

#[async_trait]
impl RequestStrategy for ParallelStrategy {
    async fn execute(
        &self,
        sender: &dyn AttemptSender,
        request: &Request,
        deadline: Deadline,
        priority: Priority,
    ) -> SendOutcome {
        let mut attempts = FuturesUnordered::new();
        for attempt in 0..self.attempts_count {
            let delay = if attempt == 0 {
                Duration::ZERO
            } else {
                self.delays_provider.delay(attempt).min(deadline.remaining())
            };
            attempts.push(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if deadline.expired() {
                    return SendOutcome::timed_out();
                }
                sender.send_attempt(request, deadline, priority).await
            });
        }

        let mut last_rejected: Option<SendOutcome> = None;
        while let Some(result) = attempts.next().await {
            if result.is_accepted() {
                // Dropping the stream cancels the still-pending attempts
                // and releases any responses they already produced.
                drop(attempts);
                return result;
            }
            debug!("hedged attempt rejected");
            last_rejected = Some(result);
        }

        last_rejected.unwrap_or_else(SendOutcome::timed_out)
    }
}
