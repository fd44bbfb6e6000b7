//! Attempt outcome classification.
//!
//! A classifier decides whether an attempt's outcome terminates the strategy
//! (`Accept`) or is eligible for another attempt (`Reject`). A verdict is a
//! decision, not an error: a rejected response is still a real response and
//! is returned to the caller when it is the last one.

use http::StatusCode;

use crate::Result;
use crate::response::Response;

/// The outcome of a single transport attempt.
pub type AttemptOutcome = Result<Response>;

/// A classifier's decision for an attempt outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The outcome terminates the strategy and is returned to the caller.
    Accept,
    /// The outcome is a retryable failure.
    Reject,
}

/// Decides accept / reject for an attempt outcome.
pub trait ResponseClassifier: Send + Sync {
    /// Classify an attempt outcome.
    fn classify(&self, outcome: &AttemptOutcome) -> Verdict;
}

/// Default classification policy.
///
/// Rejects transport errors, 5xx, 429 and 408; accepts everything else
/// (2xx, 3xx and the remaining 4xx: a well-formed client error will not
/// get better by retrying). A response marked `x-do-not-retry` is always
/// accepted, which keeps strategies from retrying synthetic low-deadline
/// and circuit-breaker responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResponseClassifier;

impl ResponseClassifier for DefaultResponseClassifier {
    fn classify(&self, outcome: &AttemptOutcome) -> Verdict {
        let response = match outcome {
            Ok(response) => response,
            Err(_) => return Verdict::Reject,
        };

        if response.is_do_not_retry() {
            return Verdict::Accept;
        }
        if response.is_server_error()
            || response.is_throttling()
            || response.status() == StatusCode::REQUEST_TIMEOUT
        {
            return Verdict::Reject;
        }
        Verdict::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpClientError;

    fn classify_status(status: StatusCode) -> Verdict {
        DefaultResponseClassifier.classify(&Ok(Response::empty(status)))
    }

    #[test]
    fn test_accepted_statuses() {
        assert_eq!(classify_status(StatusCode::OK), Verdict::Accept);
        assert_eq!(classify_status(StatusCode::CREATED), Verdict::Accept);
        assert_eq!(classify_status(StatusCode::MOVED_PERMANENTLY), Verdict::Accept);
        assert_eq!(classify_status(StatusCode::NOT_FOUND), Verdict::Accept);
        assert_eq!(classify_status(StatusCode::FORBIDDEN), Verdict::Accept);
    }

    #[test]
    fn test_rejected_statuses() {
        assert_eq!(classify_status(StatusCode::INTERNAL_SERVER_ERROR), Verdict::Reject);
        assert_eq!(classify_status(StatusCode::SERVICE_UNAVAILABLE), Verdict::Reject);
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), Verdict::Reject);
        assert_eq!(classify_status(StatusCode::REQUEST_TIMEOUT), Verdict::Reject);
    }

    #[test]
    fn test_errors_are_rejected() {
        let classifier = DefaultResponseClassifier;
        assert_eq!(classifier.classify(&Err(HttpClientError::Timeout)), Verdict::Reject);
        assert_eq!(
            classifier.classify(&Err(HttpClientError::Connect("refused".to_string()))),
            Verdict::Reject
        );
        assert_eq!(
            classifier.classify(&Err(HttpClientError::Transport("reset".to_string()))),
            Verdict::Reject
        );
    }

    #[test]
    fn test_do_not_retry_overrides_status() {
        let outcome = Ok(Response::low_timeout());
        assert_eq!(DefaultResponseClassifier.classify(&outcome), Verdict::Accept);
    }
}
