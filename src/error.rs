//! HTTP client error types.

use thiserror::Error;

/// Result type for HTTP client operations.
pub type Result<T> = std::result::Result<T, HttpClientError>;

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// The deadline expired before a response was obtained.
    #[error("deadline expired before a response was obtained")]
    Timeout,

    /// TCP/DNS level failure prior to the HTTP exchange.
    #[error("connect error: {0}")]
    Connect(String),

    /// Any other network or protocol failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Circuit breaker is open, rejecting requests.
    #[error("circuit breaker is open, request rejected")]
    CircuitOpen,

    /// Invalid strategy or client configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invalid URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Body serialization/deserialization error.
    #[error("serialization error: {0}")]
    Json(String),
}

impl HttpClientError {
    /// Check if this error is retryable by the default classification policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Connect(_) | Self::Transport(_)
        )
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Check if this is a connection error.
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(HttpClientError::Timeout.is_retryable());
        assert!(HttpClientError::Connect("refused".to_string()).is_retryable());
        assert!(HttpClientError::Transport("reset".to_string()).is_retryable());

        assert!(!HttpClientError::CircuitOpen.is_retryable());
        assert!(!HttpClientError::Configuration("bad".to_string()).is_retryable());
        assert!(!HttpClientError::InvalidUrl("::".to_string()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = HttpClientError::Connect("connection refused".to_string());
        assert!(format!("{}", err).contains("connection refused"));

        let err = HttpClientError::CircuitOpen;
        assert!(format!("{}", err).contains("circuit breaker"));
    }
}
