//! Executor error types
//!
//! Fatal configuration problems surface before any I/O; execution failures
//! fail the whole query with no partial results. Per-record problems are
//! never errors here — they are logged and the record excluded.

use thiserror::Error;

/// Result type for executor operations.
pub type FederationResult<T> = Result<T, FederationError>;

/// Errors that fail a federated query.
#[derive(Debug, Clone, Error)]
pub enum FederationError {
    /// No backend registered for a referenced schema. Raised before I/O.
    #[error("no backend registered for schema '{0}'")]
    NoBackend(String),

    /// A native call (aggregation, connection) failed.
    #[error("execution failed: {0}")]
    Execution(String),

    /// A worker task panicked or was cancelled.
    #[error("worker task failed: {0}")]
    TaskPanic(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FederationError::NoBackend("accounts".into());
        assert_eq!(
            err.to_string(),
            "no backend registered for schema 'accounts'"
        );

        let err = FederationError::Execution("connection refused".into());
        assert!(err.to_string().contains("connection refused"));
    }
}
