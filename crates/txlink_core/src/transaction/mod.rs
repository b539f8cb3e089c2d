//! Explicit transaction contexts.
//!
//! Transactions are passed along call chains as values rather than picked
//! up from ambient state:
//! - [`TransactionManager`] starts transactions and tracks live ones
//! - [`TransactionContext`] carries identity and state, and notifies
//!   registered observers exactly once on commit or abort
//! - [`TransactionScope`] joins or starts a transaction and aborts it
//!   unless completed

mod context;
mod manager;
mod scope;

pub use context::{
    CompletionHandler, TransactionContext, TransactionOptions, TransactionOutcome,
    TransactionState, DEFAULT_TRANSACTION_TIMEOUT,
};
pub use manager::TransactionManager;
pub use scope::{ScopeOption, TransactionScope};
