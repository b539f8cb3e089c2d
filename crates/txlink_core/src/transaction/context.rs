//! Transaction context.

use crate::error::{CoreError, CoreResult};
use crate::types::{IsolationLevel, TransactionId};
use parking_lot::Mutex;
use std::fmt;
use std::time::{Duration, Instant};

/// Default lifetime of a transaction before commit turns into abort.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(90);

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

/// How a transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// The transaction committed.
    Committed,
    /// The transaction aborted.
    Aborted,
}

/// Options for a newly started transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    /// Isolation level.
    pub isolation_level: IsolationLevel,
    /// Maximum lifetime; a commit attempted later aborts instead.
    pub timeout: Duration,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            isolation_level: IsolationLevel::ReadCommitted,
            timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }
}

impl TransactionOptions {
    /// Sets the isolation level.
    #[must_use]
    pub const fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = level;
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Callback fired once when a transaction completes.
pub type CompletionHandler = Box<dyn FnOnce(TransactionId, TransactionOutcome) + Send>;

struct ContextInner {
    state: TransactionState,
    abort_reason: Option<String>,
    handlers: Vec<CompletionHandler>,
}

/// A transaction passed explicitly along a call chain.
///
/// Contexts are shared through `Arc`. Everything that joins the transaction
/// sees the same identity, and every completion handler registered on it
/// runs exactly once, when the transaction commits or aborts. A context
/// still active when its last reference is dropped aborts.
pub struct TransactionContext {
    id: TransactionId,
    isolation_level: IsolationLevel,
    timeout: Duration,
    started: Instant,
    inner: Mutex<ContextInner>,
}

impl TransactionContext {
    pub(crate) fn new(id: TransactionId, options: TransactionOptions) -> Self {
        Self {
            id,
            isolation_level: options.isolation_level,
            timeout: options.timeout,
            started: Instant::now(),
            inner: Mutex::new(ContextInner {
                state: TransactionState::Active,
                abort_reason: None,
                handlers: Vec::new(),
            }),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the isolation level.
    #[must_use]
    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.inner.lock().state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == TransactionState::Active
    }

    /// Checks if the transaction has been aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.state() == TransactionState::Aborted
    }

    /// Returns why the transaction aborted, if it did.
    #[must_use]
    pub fn abort_reason(&self) -> Option<String> {
        self.inner.lock().abort_reason.clone()
    }

    /// Returns true once the transaction outlived its timeout.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.started.elapsed() > self.timeout
    }

    /// Ensures the transaction is active.
    ///
    /// # Errors
    ///
    /// Returns `TransactionAborted` or `TransactionCompleted` otherwise.
    pub fn ensure_active(&self) -> CoreResult<()> {
        let inner = self.inner.lock();
        self.check_active(&inner)
    }

    fn check_active(&self, inner: &ContextInner) -> CoreResult<()> {
        match inner.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => Err(CoreError::TransactionCompleted { id: self.id }),
            TransactionState::Aborted => Err(CoreError::transaction_aborted(
                inner
                    .abort_reason
                    .clone()
                    .unwrap_or_else(|| format!("{} was aborted", self.id)),
            )),
        }
    }

    /// Registers a handler to run when the transaction completes.
    ///
    /// # Errors
    ///
    /// Fails if the transaction already completed; the handler is dropped
    /// without running.
    pub fn on_completed<F>(&self, handler: F) -> CoreResult<()>
    where
        F: FnOnce(TransactionId, TransactionOutcome) + Send + 'static,
    {
        let mut inner = self.inner.lock();
        self.check_active(&inner)?;
        inner.handlers.push(Box::new(handler));
        Ok(())
    }

    /// Commits the transaction and runs the completion handlers.
    ///
    /// # Errors
    ///
    /// Returns `TransactionAborted` if the transaction was aborted or has
    /// expired (it is aborted in that case), and `InvalidOperation` if it
    /// already committed.
    pub fn commit(&self) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            TransactionState::Active => {}
            TransactionState::Committed => {
                return Err(CoreError::invalid_operation("transaction already committed"));
            }
            TransactionState::Aborted => return self.check_active(&inner),
        }

        if self.is_expired() {
            let reason = format!("{} timed out after {:?}", self.id, self.timeout);
            inner.state = TransactionState::Aborted;
            inner.abort_reason = Some(reason.clone());
            let handlers = std::mem::take(&mut inner.handlers);
            drop(inner);
            self.fire(handlers, TransactionOutcome::Aborted);
            return Err(CoreError::transaction_aborted(reason));
        }

        inner.state = TransactionState::Committed;
        let handlers = std::mem::take(&mut inner.handlers);
        drop(inner);
        self.fire(handlers, TransactionOutcome::Committed);
        Ok(())
    }

    /// Aborts the transaction and runs the completion handlers.
    ///
    /// Does nothing if the transaction already completed.
    pub fn abort(&self, reason: impl Into<String>) {
        let mut inner = self.inner.lock();
        if inner.state != TransactionState::Active {
            return;
        }
        inner.state = TransactionState::Aborted;
        inner.abort_reason = Some(reason.into());
        let handlers = std::mem::take(&mut inner.handlers);
        drop(inner);
        self.fire(handlers, TransactionOutcome::Aborted);
    }

    fn fire(&self, handlers: Vec<CompletionHandler>, outcome: TransactionOutcome) {
        tracing::debug!(txn = %self.id, ?outcome, handlers = handlers.len(), "transaction completed");
        for handler in handlers {
            handler(self.id, outcome);
        }
    }
}

impl Drop for TransactionContext {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.state != TransactionState::Active {
            return;
        }
        inner.state = TransactionState::Aborted;
        inner.abort_reason = Some("transaction dropped without completion".to_owned());
        let handlers = std::mem::take(&mut inner.handlers);
        self.fire(handlers, TransactionOutcome::Aborted);
    }
}

impl fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionContext")
            .field("id", &self.id)
            .field("isolation_level", &self.isolation_level)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
