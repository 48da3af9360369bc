//! Error types for the durable log store client.

use std::fmt;

/// Result type using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while talking to the durable log store.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum StoreError {
    /// The store could not be reached (connection failure or timeout).
    Connection {
        /// Connection failure details.
        details: String,
    },

    /// A store operation failed after the connection was established.
    Query {
        /// The operation that failed (e.g. "put_if_absent", "migrate").
        operation: String,
        /// Error details.
        details: String,
    },

    /// A persisted record could not be decoded.
    Corrupt {
        /// The key holding the undecodable value.
        key: String,
        /// Decode failure details.
        details: String,
    },
}

impl StoreError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "STORE_UNAVAILABLE",
            Self::Query { .. } => "STORE_QUERY_FAILED",
            Self::Corrupt { .. } => "RECORD_CORRUPT",
        }
    }

    /// True if the operation may succeed when retried (connectivity-class errors).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection { details } => {
                write!(f, "durable store unavailable: {}", details)
            }
            Self::Query { operation, details } => {
                write!(f, "store error during '{}': {}", operation, details)
            }
            Self::Corrupt { key, details } => {
                write!(f, "corrupt record at '{}': {}", key, details)
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(e) => StoreError::Connection {
                details: e.to_string(),
            },
            sqlx::Error::PoolTimedOut => StoreError::Connection {
                details: "connection pool timed out".to_string(),
            },
            other => StoreError::Query {
                operation: "query".to_string(),
                details: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let cases = vec![
            (
                StoreError::Connection {
                    details: "refused".to_string(),
                },
                "STORE_UNAVAILABLE",
            ),
            (
                StoreError::Query {
                    operation: "read".to_string(),
                    details: "disk full".to_string(),
                },
                "STORE_QUERY_FAILED",
            ),
            (
                StoreError::Corrupt {
                    key: "instance/abc".to_string(),
                    details: "invalid json".to_string(),
                },
                "RECORD_CORRUPT",
            ),
        ];

        for (error, expected_code) in cases {
            assert_eq!(error.error_code(), expected_code, "for {:?}", error);
        }
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::Connection {
            details: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "durable store unavailable: connection refused"
        );

        let err = StoreError::Query {
            operation: "put_if_absent".to_string(),
            details: "disk full".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "store error during 'put_if_absent': disk full"
        );

        let err = StoreError::Corrupt {
            key: "step/abc/00000001".to_string(),
            details: "expected value at line 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "corrupt record at 'step/abc/00000001': expected value at line 1"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(
            StoreError::Connection {
                details: "timeout".to_string()
            }
            .is_retryable()
        );
        assert!(
            !StoreError::Query {
                operation: "read".to_string(),
                details: "x".to_string()
            }
            .is_retryable()
        );
    }
}
