//! One attempt, returned verbatim.

use async_trait::async_trait;

use super::{AttemptSender, RequestStrategy, SendOutcome};
use crate::deadline::Deadline;
use crate::priority::Priority;
use crate::request::Request;

/// Issues exactly one attempt and returns its outcome, accepted or not.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleAttemptStrategy;

#[async_trait]
impl RequestStrategy for SingleAttemptStrategy {
    async fn execute(
        &self,
        sender: &dyn AttemptSender,
        request: &Request,
        deadline: Deadline,
        priority: Priority,
    ) -> SendOutcome {
        sender.send_attempt(request, deadline, priority).await
    }
}
