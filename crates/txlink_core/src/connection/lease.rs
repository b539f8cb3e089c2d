//! A caller's claim on a connection handle.

use crate::connection::handle::ConnectionHandle;
use crate::error::CoreResult;
use std::sync::Arc;
use txlink_driver::{CommandSet, DriverResult};

/// One retained reference to a [`ConnectionHandle`].
///
/// Every lease accounts for exactly one use of its handle. Call
/// [`ConnectionLease::release`] to give it back and see close errors; a
/// lease that is dropped instead releases itself and only logs them.
#[derive(Debug)]
#[must_use = "dropping a lease releases the connection immediately"]
pub struct ConnectionLease {
    handle: Arc<ConnectionHandle>,
    released: bool,
}

impl ConnectionLease {
    /// Wraps a handle the caller has already retained.
    pub(crate) fn new(handle: Arc<ConnectionHandle>) -> Self {
        Self {
            handle,
            released: false,
        }
    }

    /// Returns the shared handle.
    #[must_use]
    pub fn handle(&self) -> &Arc<ConnectionHandle> {
        &self.handle
    }

    /// Returns the target the connection was opened for.
    #[must_use]
    pub fn target(&self) -> &str {
        self.handle.target()
    }

    /// Returns true if both leases point at the same connection.
    #[must_use]
    pub fn shares_connection_with(&self, other: &ConnectionLease) -> bool {
        Arc::ptr_eq(&self.handle, &other.handle)
    }

    /// Runs a command set as one round trip.
    pub fn execute_set(&self, set: &CommandSet) -> DriverResult<i64> {
        self.handle.execute_set(set)
    }

    /// Releases the lease.
    ///
    /// Returns true if this release closed the connection.
    ///
    /// # Errors
    ///
    /// Returns the close error if this was the last user and closing failed.
    pub fn release(mut self) -> CoreResult<bool> {
        self.released = true;
        self.handle.release()
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.handle.release() {
            tracing::warn!(connection = %self.handle.target(), error = %err, "implicit connection release failed");
        }
    }
}
