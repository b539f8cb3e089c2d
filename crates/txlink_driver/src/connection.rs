//! Connection and connection factory traits.

use crate::command::CommandSet;
use crate::error::DriverResult;

/// A live, driver-level connection to a database.
///
/// A connection is used by one caller at a time; txlink serializes access
/// to a shared connection before calling into it.
///
/// # Invariants
///
/// - `execute_set` returns the driver-reported affected-row count, which
///   may be negative for statements that report none
/// - After `close` succeeds, `is_open` returns false and further commands
///   fail with [`crate::DriverError::Closed`]
pub trait Connection: Send {
    /// Executes every command of `set` in one round trip, honoring the
    /// set's timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or any command of the
    /// set fails.
    fn execute_set(&mut self, set: &CommandSet) -> DriverResult<i64>;

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails to shut the connection down.
    fn close(&mut self) -> DriverResult<()>;

    /// Returns true until the connection is closed.
    fn is_open(&self) -> bool;
}

/// Opens connections for a target descriptor such as a connection string.
pub trait ConnectionFactory: Send + Sync {
    /// Opens a new connection to `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    fn open(&self, target: &str) -> DriverResult<Box<dyn Connection>>;
}

impl<F> ConnectionFactory for F
where
    F: Fn(&str) -> DriverResult<Box<dyn Connection>> + Send + Sync,
{
    fn open(&self, target: &str) -> DriverResult<Box<dyn Connection>> {
        self(target)
    }
}
