//! Error types for proref.

use thiserror::Error;

/// Result type alias using proref's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for proref operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Persistence layer failed (wraps sqlx::Error). Never retried.
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Issue tracker call failed
    #[error("Tracker error: {0}")]
    Tracker(String),

    /// Remote service answered with a non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// HTTP/network request failed before a response was received
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a retry has a reasonable chance of succeeding.
    ///
    /// Network failures, rate limiting (429) and server errors (5xx) are
    /// transient. Storage failures are not: retry is reserved for
    /// network-bound work.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Request(_) => true,
            Error::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Error::Serialization(e.to_string());
        }
        match e.status() {
            Some(status) => Error::Http {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None => Error::Request(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_storage() {
        let err = Error::Storage(sqlx::Error::PoolTimedOut);
        assert!(err.to_string().starts_with("Storage error:"));
    }

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("ticket PROJ-1".to_string());
        assert_eq!(err.to_string(), "Not found: ticket PROJ-1");
    }

    #[test]
    fn test_error_display_http() {
        let err = Error::Http {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: unavailable");
    }

    #[test]
    fn test_error_display_tracker() {
        let err = Error::Tracker("all endpoints failed".to_string());
        assert_eq!(err.to_string(), "Tracker error: all endpoints failed");
    }

    #[test]
    fn test_transient_request() {
        assert!(Error::Request("connection reset".to_string()).is_transient());
    }

    #[test]
    fn test_transient_rate_limit_and_server_errors() {
        let rate_limited = Error::Http {
            status: 429,
            message: String::new(),
        };
        let bad_gateway = Error::Http {
            status: 502,
            message: String::new(),
        };
        assert!(rate_limited.is_transient());
        assert!(bad_gateway.is_transient());
    }

    #[test]
    fn test_not_transient_client_errors() {
        let unauthorized = Error::Http {
            status: 401,
            message: String::new(),
        };
        assert!(!unauthorized.is_transient());
        assert!(!Error::InvalidInput("bad".to_string()).is_transient());
        assert!(!Error::Config("missing key".to_string()).is_transient());
    }

    #[test]
    fn test_storage_is_never_transient() {
        assert!(!Error::Storage(sqlx::Error::PoolTimedOut).is_transient());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
