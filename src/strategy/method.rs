//! Strategy dispatch by HTTP method.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use http::Method;

use super::{AttemptSender, RequestStrategy, SendOutcome};
use crate::classifier::Verdict;
use crate::deadline::Deadline;
use crate::priority::Priority;
use crate::request::Request;
use crate::HttpClientError;

/// Routes each request to a strategy chosen by its method.
///
/// The usual split is hedged reads and sequential writes: parallel attempts
/// are safe for idempotent methods while unsafe methods must never be in
/// flight twice. A method without a mapping falls back to the configured
/// default; without one the request fails with a configuration error.
#[derive(Default)]
pub struct MethodBasedStrategy {
    by_method: HashMap<Method, Arc<dyn RequestStrategy>>,
    default: Option<Arc<dyn RequestStrategy>>,
}

impl MethodBasedStrategy {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a method to a strategy.
    pub fn with_strategy(
        mut self,
        method: Method,
        strategy: impl RequestStrategy + 'static,
    ) -> Self {
        self.by_method.insert(method, Arc::new(strategy));
        self
    }

    /// Set the fallback strategy for unmapped methods.
    pub fn with_default(mut self, strategy: impl RequestStrategy + 'static) -> Self {
        self.default = Some(Arc::new(strategy));
        self
    }
}

#[async_trait]
impl RequestStrategy for MethodBasedStrategy {
    async fn execute(
        &self,
        sender: &dyn AttemptSender,
        request: &Request,
        deadline: Deadline,
        priority: Priority,
    ) -> SendOutcome {
        let strategy = self
            .by_method
            .get(request.method())
            .or(self.default.as_ref());
        match strategy {
            Some(strategy) => strategy.execute(sender, request, deadline, priority).await,
            None => SendOutcome::new(
                Err(HttpClientError::Configuration(format!(
                    "no strategy configured for method {}",
                    request.method()
                ))),
                Verdict::Reject,
            ),
        }
    }
}
