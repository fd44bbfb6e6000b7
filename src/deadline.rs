//! Monotonic time budgets with propagation and splitting.
//!
//! A [`Deadline`] is an absolute point on the monotonic clock before which an
//! operation must complete. Deadlines are immutable; deriving a child via
//! [`Deadline::split`] never produces a point past the parent's. The wire
//! form transmits the *remaining* seconds rather than absolute wall time, so
//! the receiver reconstructs the deadline against its own clock.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// An absolute monotonic point in time before which an operation must complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline {
    deadline_at: Instant,
}

impl Deadline {
    /// Create a deadline expiring after the given timeout.
    pub fn from_timeout(timeout: Duration) -> Self {
        Self {
            deadline_at: Instant::now() + timeout,
        }
    }

    /// Create a deadline from fractional seconds, clamping negatives to zero.
    pub fn from_secs_f64(seconds: f64) -> Self {
        let seconds = if seconds.is_finite() && seconds > 0.0 {
            seconds
        } else {
            0.0
        };
        Self::from_timeout(Duration::from_secs_f64(seconds))
    }

    /// Create a deadline at an absolute monotonic point.
    pub fn at(deadline_at: Instant) -> Self {
        Self { deadline_at }
    }

    /// The absolute monotonic point this deadline expires at.
    pub fn instant(&self) -> Instant {
        self.deadline_at
    }

    /// Time left until expiry; never negative.
    pub fn remaining(&self) -> Duration {
        self.deadline_at.saturating_duration_since(Instant::now())
    }

    /// Remaining time as fractional seconds.
    pub fn remaining_secs_f64(&self) -> f64 {
        self.remaining().as_secs_f64()
    }

    /// Check whether the deadline has passed.
    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Derive a child deadline holding a share of the remaining budget.
    ///
    /// The child's timeout is `min(remaining, remaining / parts * factor)`:
    /// `parts` is how many ways the budget is divided and `factor >= 1.0`
    /// caps how much of the total one share may consume. The child's
    /// absolute point never exceeds this deadline's.
    pub fn split(&self, parts: u32, factor: f64) -> Deadline {
        let parts = parts.max(1);
        let factor = factor.max(1.0);
        let now = Instant::now();
        let remaining = self.deadline_at.saturating_duration_since(now);
        let share = remaining.div_f64(parts as f64).mul_f64(factor);
        let timeout = share.min(remaining);
        Deadline {
            deadline_at: (now + timeout).min(self.deadline_at),
        }
    }

    /// Encode the remaining seconds for the `x-request-deadline-at` header.
    pub fn to_header_value(&self) -> String {
        format!("{:.6}", self.remaining_secs_f64())
    }

    /// Parse a propagated header value into a deadline on the local clock.
    ///
    /// A value of zero or less produces an already-expired deadline.
    pub fn try_parse(value: &str) -> Option<Deadline> {
        let seconds: f64 = value.trim().parse().ok()?;
        Some(Self::from_secs_f64(seconds))
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.expired() {
            write!(f, "<Deadline [expired]>")
        } else {
            write!(f, "<Deadline [timeout={:?}]>", self.remaining())
        }
    }
}

/// Derives the deadline a single attempt is allowed to consume.
pub trait DeadlineProvider: Send + Sync {
    /// Produce the deadline for `attempt` (0-based) out of `attempts_count`.
    fn attempt_deadline(&self, deadline: Deadline, attempt: usize, attempts_count: usize)
    -> Deadline;
}

/// Splits the remaining budget evenly across the attempts still to run.
///
/// With 3 attempts and a 9 second budget, each attempt nominally receives
/// 3 seconds; if the first two return quickly the last attempt receives the
/// redistributed remainder, because each derivation re-reads the remaining
/// time. `factor` caps how much of the nominal share a single attempt may
/// take (`2.0` lets one attempt consume twice its even share).
#[derive(Debug, Clone, Copy)]
pub struct SplitBetweenAttempts {
    factor: f64,
}

impl SplitBetweenAttempts {
    /// Create a provider with the given share factor.
    ///
    /// # Panics
    ///
    /// Panics if `factor` is below 1.0.
    pub fn new(factor: f64) -> Self {
        assert!(factor >= 1.0, "Factor must be >= 1.0");
        Self { factor }
    }
}

impl Default for SplitBetweenAttempts {
    fn default() -> Self {
        Self { factor: 2.0 }
    }
}

impl DeadlineProvider for SplitBetweenAttempts {
    fn attempt_deadline(
        &self,
        deadline: Deadline,
        attempt: usize,
        attempts_count: usize,
    ) -> Deadline {
        if deadline.expired() {
            return deadline;
        }
        let attempts_left = attempts_count.saturating_sub(attempt);
        if attempts_left <= 1 {
            return deadline;
        }
        deadline.split(attempts_left as u32, self.factor)
    }
}

/// Hands the full remaining deadline to every attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl DeadlineProvider for PassThrough {
    fn attempt_deadline(
        &self,
        deadline: Deadline,
        _attempt: usize,
        _attempts_count: usize,
    ) -> Deadline {
        deadline
    }
}
