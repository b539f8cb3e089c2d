//! Error types for txlink core.

use crate::types::TransactionId;
use thiserror::Error;
use txlink_driver::DriverError;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in txlink core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The transaction was aborted, or a connection was requested against
    /// an already-aborted transaction.
    #[error("transaction aborted: {reason}")]
    TransactionAborted {
        /// Reason for abort.
        reason: String,
    },

    /// The transaction already committed and accepts no more work.
    #[error("transaction {id} already completed")]
    TransactionCompleted {
        /// The completed transaction.
        id: TransactionId,
    },

    /// The connection factory could not open a connection.
    #[error("cannot open connection to {target}")]
    ConnectionOpenFailed {
        /// Target the connection was requested for.
        target: String,
        /// Driver error.
        #[source]
        source: DriverError,
    },

    /// A batch round trip failed.
    #[error("batch {batch_index} failed")]
    BatchExecutionFailed {
        /// Index of the failed batch.
        batch_index: usize,
        /// Driver error.
        #[source]
        source: DriverError,
    },

    /// A single command failed.
    #[error("command failed")]
    CommandFailed(#[source] DriverError),

    /// Closing a connection on an explicit release failed.
    #[error("connection close failed")]
    ConnectionCloseFailed(#[source] DriverError),

    /// Batch size must be positive.
    #[error("invalid batch size: {size}")]
    InvalidBatchSize {
        /// The rejected size.
        size: usize,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// Any other driver error.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
}

impl CoreError {
    /// Creates a transaction aborted error.
    pub fn transaction_aborted(reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a connection open error for `target`.
    pub fn connection_open_failed(target: impl Into<String>, source: DriverError) -> Self {
        Self::ConnectionOpenFailed {
            target: target.into(),
            source,
        }
    }

    /// Returns true if the error means the transaction can no longer be used.
    #[must_use]
    pub fn is_transaction_fatal(&self) -> bool {
        matches!(
            self,
            Self::TransactionAborted { .. } | Self::TransactionCompleted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn error_display() {
        let err = CoreError::transaction_aborted("timeout");
        assert_eq!(err.to_string(), "transaction aborted: timeout");

        let err = CoreError::TransactionCompleted {
            id: TransactionId::new(7),
        };
        assert_eq!(err.to_string(), "transaction txn:7 already completed");
    }

    #[test]
    fn batch_failure_keeps_driver_source() {
        let err = CoreError::BatchExecutionFailed {
            batch_index: 2,
            source: DriverError::execution("deadlock"),
        };
        assert_eq!(err.to_string(), "batch 2 failed");
        assert!(err.source().unwrap().to_string().contains("deadlock"));
    }

    #[test]
    fn fatal_errors() {
        assert!(CoreError::transaction_aborted("x").is_transaction_fatal());
        assert!(!CoreError::InvalidBatchSize { size: 0 }.is_transaction_fatal());
    }
}
