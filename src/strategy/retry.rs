//! Retry-until-deadline wrapper strategy.

use std::sync::Arc;

use async_trait::async_trait;

use super::{AttemptSender, RequestStrategy, SendOutcome};
use crate::deadline::Deadline;
use crate::delays::{DelaysProvider, LinearDelays};
use crate::priority::Priority;
use crate::request::Request;

/// Re-runs an inner strategy until it is accepted or the deadline expires.
///
/// Useful around a sequential strategy whose attempt budget is sized for
/// the common case: when the whole budget is rejected, the wrapper waits
/// and runs the inner strategy again for as long as the deadline allows.
pub struct RetryUntilDeadlineExpired {
    inner: Arc<dyn RequestStrategy>,
    delays_provider: Arc<dyn DelaysProvider>,
}

impl RetryUntilDeadlineExpired {
    /// Wrap a strategy with linear inter-iteration delays.
    pub fn new(inner: impl RequestStrategy + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
            delays_provider: Arc::new(LinearDelays::default()),
        }
    }

    /// Set the inter-iteration delays provider.
    pub fn with_delays(mut self, delays_provider: impl DelaysProvider + 'static) -> Self {
        self.delays_provider = Arc::new(delays_provider);
        self
    }
}

#[async_trait]
impl RequestStrategy for RetryUntilDeadlineExpired {
    async fn execute(
        &self,
        sender: &dyn AttemptSender,
        request: &Request,
        deadline: Deadline,
        priority: Priority,
    ) -> SendOutcome {
        let mut iteration = 0;
        loop {
            let result = self
                .inner
                .execute(sender, request, deadline, priority)
                .await;
            if result.is_accepted() || deadline.expired() {
                return result;
            }

            iteration += 1;
            let delay = self
                .delays_provider
                .delay(iteration)
                .min(deadline.remaining());
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}
