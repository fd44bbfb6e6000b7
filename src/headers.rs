//! Propagation and marker header names.
//!
//! `x-request-deadline-at` and `x-request-priority` carry the deadline and
//! priority to downstream services; receivers that do not understand them
//! must ignore them. The remaining headers mark synthetic responses produced
//! inside the pipeline so that strategies do not retry them.

use http::HeaderName;

/// Remaining deadline, in seconds, at the moment the attempt was sent.
pub const X_REQUEST_DEADLINE_AT: HeaderName = HeaderName::from_static("x-request-deadline-at");

/// Request priority; a smaller integer means a higher priority.
pub const X_REQUEST_PRIORITY: HeaderName = HeaderName::from_static("x-request-priority");

/// Marks a response that must not be retried by any strategy.
pub const X_DO_NOT_RETRY: HeaderName = HeaderName::from_static("x-do-not-retry");

/// Marks a fallback response produced by an open circuit breaker.
pub const X_CIRCUIT_BREAKER: HeaderName = HeaderName::from_static("x-circuit-breaker");
