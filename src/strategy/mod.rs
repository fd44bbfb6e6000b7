//! Request strategies orchestrating transport attempts under a deadline.
//!
//! A strategy turns one logical request into one or more attempts and
//! returns exactly one outcome to the caller. Attempts are performed by an
//! [`AttemptSender`] (the client's per-attempt pipeline) which hands back
//! the outcome already classified, so strategies only decide *when* to
//! launch attempts and *which* outcome wins.
//!
//! Non-final responses never leak: a strategy drops every response it does
//! not return, and dropping a pending attempt future cancels its in-flight
//! I/O.

mod method;
mod parallel;
mod retry;
mod sequential;
mod single;

pub use method::MethodBasedStrategy;
pub use parallel::ParallelStrategy;
pub use retry::RetryUntilDeadlineExpired;
pub use sequential::SequentialStrategy;
pub use single::SingleAttemptStrategy;

use async_trait::async_trait;

use crate::classifier::{AttemptOutcome, Verdict};
use crate::deadline::Deadline;
use crate::priority::Priority;
use crate::request::Request;
use crate::HttpClientError;

/// A classified attempt outcome.
#[derive(Debug)]
pub struct SendOutcome {
    /// The response or transport error.
    pub outcome: AttemptOutcome,
    /// The classifier's decision for it.
    pub verdict: Verdict,
}

impl SendOutcome {
    /// Pair an outcome with its verdict.
    pub fn new(outcome: AttemptOutcome, verdict: Verdict) -> Self {
        Self { outcome, verdict }
    }

    /// A rejected timeout, for attempts that never reached the transport.
    pub(crate) fn timed_out() -> Self {
        Self::new(Err(HttpClientError::Timeout), Verdict::Reject)
    }

    /// Whether the verdict terminates the strategy.
    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Accept
    }
}

/// Performs one classified transport attempt.
#[async_trait]
pub trait AttemptSender: Send + Sync {
    /// Send one attempt bounded by `deadline` and classify the outcome.
    async fn send_attempt(
        &self,
        request: &Request,
        deadline: Deadline,
        priority: Priority,
    ) -> SendOutcome;
}

/// Orchestrates attempts for one logical request.
#[async_trait]
pub trait RequestStrategy: Send + Sync {
    /// Execute the request, returning the accepted outcome or, once the
    /// attempt budget or deadline is exhausted, the last rejected one.
    async fn execute(
        &self,
        sender: &dyn AttemptSender,
        request: &Request,
        deadline: Deadline,
        priority: Priority,
    ) -> SendOutcome;
}
