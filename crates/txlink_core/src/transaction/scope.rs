//! Transaction scopes.

use crate::error::CoreResult;
use crate::transaction::context::{TransactionContext, TransactionOptions};
use crate::transaction::manager::TransactionManager;
use std::sync::Arc;

/// How a scope relates to the transaction passed in by its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeOption {
    /// Join the caller's transaction, or start one if there is none.
    #[default]
    Required,
    /// Always start a new, independent transaction.
    RequiresNew,
    /// Run without any transaction.
    Suppress,
}

/// A unit of work inside a transaction.
///
/// A scope either owns a transaction it started or joins one it was given.
/// Calling [`TransactionScope::complete`] commits an owned transaction and
/// is a vote to commit for a joined one. A scope dropped without completion
/// aborts its transaction, whether owned or joined.
///
/// # Example
///
/// ```rust
/// use txlink_core::{ScopeOption, TransactionManager, TransactionOptions, TransactionScope};
///
/// let tm = TransactionManager::new();
/// let outer = TransactionScope::new(&tm, ScopeOption::Required, None, TransactionOptions::default())?;
/// {
///     let inner = TransactionScope::new(
///         &tm,
///         ScopeOption::Required,
///         outer.transaction(),
///         TransactionOptions::default(),
///     )?;
///     assert_eq!(inner.transaction().map(|t| t.id()), outer.transaction().map(|t| t.id()));
///     inner.complete()?;
/// }
/// outer.complete()?;
/// # Ok::<(), txlink_core::CoreError>(())
/// ```
#[derive(Debug)]
#[must_use = "a scope dropped without `complete` aborts its transaction"]
pub struct TransactionScope {
    transaction: Option<Arc<TransactionContext>>,
    owned: bool,
    completed: bool,
}

impl TransactionScope {
    /// Opens a scope.
    ///
    /// When joining an ambient transaction, `options` is ignored and the
    /// ambient isolation level is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if a new transaction cannot be started.
    pub fn new(
        manager: &TransactionManager,
        option: ScopeOption,
        ambient: Option<&Arc<TransactionContext>>,
        options: TransactionOptions,
    ) -> CoreResult<Self> {
        let (transaction, owned) = match (option, ambient) {
            (ScopeOption::Suppress, _) => (None, false),
            (ScopeOption::Required, Some(ambient)) => (Some(Arc::clone(ambient)), false),
            (ScopeOption::Required, None) | (ScopeOption::RequiresNew, _) => {
                (Some(manager.begin(options)?), true)
            }
        };

        Ok(Self {
            transaction,
            owned,
            completed: false,
        })
    }

    /// Returns the transaction this scope runs in, if any.
    #[must_use]
    pub fn transaction(&self) -> Option<&Arc<TransactionContext>> {
        self.transaction.as_ref()
    }

    /// Returns true if this scope started its transaction.
    #[must_use]
    pub fn is_owner(&self) -> bool {
        self.owned
    }

    /// Completes the scope.
    ///
    /// # Errors
    ///
    /// For an owned transaction, returns the commit error (the transaction
    /// is aborted or expired).
    pub fn complete(mut self) -> CoreResult<()> {
        self.completed = true;
        match (&self.transaction, self.owned) {
            (Some(transaction), true) => transaction.commit(),
            _ => Ok(()),
        }
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        if let Some(transaction) = &self.transaction {
            transaction.abort("scope ended without completion");
        }
    }
}
