//! Error types for the CRPT API client.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for CRPT API operations.
#[derive(Error, Debug)]
pub enum CrptError {
    /// Constructor arguments were rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// The current window has no admissions left
    #[error("Too many requests: limit of {limit} per {window:?} reached")]
    RateLimitExceeded {
        limit: u64,
        window: Duration,
    },

    /// A blocking admission did not complete before the caller's deadline
    #[error("Timed out after {0:?} waiting for rate limit admission")]
    AcquireTimeout(Duration),

    /// The rate limiter has been shut down
    #[error("Rate limiter is closed")]
    Closed,

    /// Document (de)serialization errors
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Network or connection errors
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote service answered with a non-OK status
    #[error("Remote service rejected the document: {status}")]
    RemoteRejected { status: StatusCode },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrptError {
    /// Whether this error comes from local throttling rather than the remote side.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            CrptError::RateLimitExceeded { .. } | CrptError::AcquireTimeout(_)
        )
    }

    /// Whether repeating the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CrptError::RateLimitExceeded { .. }
            | CrptError::AcquireTimeout(_)
            | CrptError::Transport(_) => true,
            CrptError::RemoteRejected { status } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}

/// Result type alias for CRPT API operations.
pub type Result<T> = std::result::Result<T, CrptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_classification() {
        let exceeded = CrptError::RateLimitExceeded {
            limit: 3,
            window: Duration::from_secs(1),
        };
        assert!(exceeded.is_rate_limited());
        assert!(exceeded.is_retryable());

        assert!(CrptError::AcquireTimeout(Duration::from_millis(10)).is_rate_limited());
        assert!(!CrptError::Closed.is_rate_limited());
        assert!(!CrptError::Closed.is_retryable());
    }

    #[test]
    fn test_remote_rejection_retryable_by_status() {
        let server_error = CrptError::RemoteRejected {
            status: StatusCode::INTERNAL_SERVER_ERROR,
        };
        let throttled = CrptError::RemoteRejected {
            status: StatusCode::TOO_MANY_REQUESTS,
        };
        let bad_request = CrptError::RemoteRejected {
            status: StatusCode::BAD_REQUEST,
        };

        assert!(server_error.is_retryable());
        assert!(throttled.is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(!bad_request.is_rate_limited());
    }

    #[test]
    fn test_error_messages() {
        let err = CrptError::RemoteRejected {
            status: StatusCode::INTERNAL_SERVER_ERROR,
        };
        assert_eq!(
            err.to_string(),
            "Remote service rejected the document: 500 Internal Server Error"
        );
        assert_eq!(CrptError::Closed.to_string(), "Rate limiter is closed");
    }
}
