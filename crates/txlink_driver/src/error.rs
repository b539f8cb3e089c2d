//! Error types for driver operations.

use std::io;
use thiserror::Error;

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors reported by a database driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A connection to the target could not be opened.
    #[error("cannot open connection to {target}: {message}")]
    OpenFailed {
        /// The target the connection was requested for.
        target: String,
        /// Description of the failure.
        message: String,
    },

    /// The server rejected or failed a command.
    #[error("execution failed: {0}")]
    Execution(String),

    /// The connection is closed.
    #[error("connection is closed")]
    Closed,

    /// Closing the connection failed.
    #[error("close failed: {0}")]
    CloseFailed(String),
}

impl DriverError {
    /// Creates an open failure for `target`.
    pub fn open_failed(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::OpenFailed {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Creates an execution failure.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }
}
