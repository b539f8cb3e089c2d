//! Reference-counted connection handle.

use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use txlink_driver::{CommandSet, Connection, DriverError, DriverResult};

/// One physical connection shared by every caller that retained it.
///
/// A handle starts with a use count of one. [`ConnectionHandle::retain`]
/// adds a user, [`ConnectionHandle::release`] removes one, and the release
/// that takes the count from one to zero closes the connection. The count
/// is atomic, so exactly one of several racing releasers performs the close.
pub struct ConnectionHandle {
    target: String,
    use_count: AtomicUsize,
    connection: Mutex<Option<Box<dyn Connection>>>,
}

impl ConnectionHandle {
    /// Wraps an open connection with a use count of one.
    pub fn new(target: impl Into<String>, connection: Box<dyn Connection>) -> Self {
        Self {
            target: target.into(),
            use_count: AtomicUsize::new(1),
            connection: Mutex::new(Some(connection)),
        }
    }

    /// Returns the target this connection was opened for.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the current number of users.
    #[must_use]
    pub fn use_count(&self) -> usize {
        self.use_count.load(Ordering::Acquire)
    }

    /// Returns true once the underlying connection has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.connection.lock().is_none()
    }

    /// Adds a user.
    pub fn retain(&self) {
        self.use_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Removes a user, closing the connection if it was the last one.
    ///
    /// Returns true if this call closed the connection.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the handle has no users left, and
    /// `ConnectionCloseFailed` if closing the connection failed. The
    /// connection is considered closed either way.
    pub fn release(&self) -> CoreResult<bool> {
        let previous = self
            .use_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            })
            .map_err(|_| {
                CoreError::invalid_operation(format!(
                    "connection handle for {} released more often than retained",
                    self.target
                ))
            })?;

        if previous != 1 {
            return Ok(false);
        }

        let connection = self.connection.lock().take();
        if let Some(mut connection) = connection {
            connection
                .close()
                .map_err(CoreError::ConnectionCloseFailed)?;
        }
        Ok(true)
    }

    /// Runs a command set on the connection.
    ///
    /// Access is serialized: concurrent users of the same handle wait for
    /// each other's round trips.
    pub fn execute_set(&self, set: &CommandSet) -> DriverResult<i64> {
        let mut guard = self.connection.lock();
        match guard.as_mut() {
            Some(connection) => connection.execute_set(set),
            None => Err(DriverError::Closed),
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("target", &self.target)
            .field("use_count", &self.use_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
