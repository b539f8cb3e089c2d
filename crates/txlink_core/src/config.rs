//! Context configuration.

use crate::transaction::TransactionOptions;
use std::time::Duration;

/// Default number of commands sent per round trip.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Configuration for a [`crate::DbContext`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of commands per batch when neither the call nor the
    /// query batch overrides it.
    pub batch_size: usize,

    /// Options for transactions the context begins itself.
    pub transaction_options: TransactionOptions,

    /// Timeout for single commands (`None` = wait indefinitely).
    /// Batches always run without a timeout.
    pub command_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            transaction_options: TransactionOptions::default(),
            command_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default batch size.
    #[must_use]
    pub const fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets the options for new transactions.
    #[must_use]
    pub const fn transaction_options(mut self, options: TransactionOptions) -> Self {
        self.transaction_options = options;
        self
    }

    /// Sets the single-command timeout.
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }
}
