use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse error classes surfaced to the UI and used for status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Refused, unreachable, or authentication failures.
    Connection,
    /// Server-selection or socket timeouts. Callers may retry deliberately.
    Timeout,
    /// Query or update execution failures, including permission errors.
    Operation,
    /// Malformed query documents, unsupported kinds, export format mismatches.
    Validation,
    /// The connection pool has no room for another endpoint.
    ResourceExhausted,
}

impl ErrorCategory {
    pub fn label(self) -> &'static str {
        match self {
            ErrorCategory::Connection => "ConnectionError",
            ErrorCategory::Timeout => "TimeoutError",
            ErrorCategory::Operation => "OperationError",
            ErrorCategory::Validation => "ValidationError",
            ErrorCategory::ResourceExhausted => "ResourceExhaustedError",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Application-wide error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Not connected to database")]
    NotConnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Connection(_) | Error::NotConnected => ErrorCategory::Connection,
            Error::Timeout(_) => ErrorCategory::Timeout,
            Error::Validation(_) => ErrorCategory::Validation,
            Error::ResourceExhausted(_) => ErrorCategory::ResourceExhausted,
            Error::Operation(_) | Error::Io(_) | Error::Json(_) | Error::Csv(_) => {
                ErrorCategory::Operation
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    /// Collapse anything that is not already a connection or timeout failure into
    /// a connection failure. Used where a failed probe means "cannot connect".
    pub(crate) fn into_connection_error(self) -> Self {
        match self {
            Error::Timeout(_) | Error::Connection(_) => self,
            other => Error::Connection(other.to_string()),
        }
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        let message = err.to_string();
        match err.kind.as_ref() {
            ErrorKind::ServerSelection { .. } => Error::Timeout(message),
            ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => {
                Error::Timeout(message)
            }
            ErrorKind::Io(_)
            | ErrorKind::ConnectionPoolCleared { .. }
            | ErrorKind::Authentication { .. }
            | ErrorKind::DnsResolve { .. } => Error::Connection(message),
            ErrorKind::InvalidArgument { .. } => Error::Validation(message),
            _ => Error::Operation(message),
        }
    }
}

/// Convenience Result type using our Error
pub type Result<T> = std::result::Result<T, Error>;
