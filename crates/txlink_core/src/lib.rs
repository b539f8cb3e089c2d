//! # txlink core
//!
//! Transaction-scoped connection affinity and batched command execution.
//!
//! This crate provides:
//! - Explicit transaction contexts and scopes
//! - A reference-counted connection handle
//! - A cache that gives every transaction one shared connection per target
//! - Deterministic partitioning of command lists into round trips
//! - Batched execution over the shared connection, with cooperative
//!   cancellation between batches
//!
//! ## Design Principles
//!
//! - Transactions are passed explicitly; nothing is looked up from ambient
//!   thread state
//! - The cache observes transaction completion through a registered
//!   handler and never drives commit or abort itself
//! - Unrelated transactions never contend on a shared lock
//! - A connection closes exactly once, when its last user lets go
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use txlink_core::{
//!     CancellationToken, ConnectionAffinityCache, DbContext, QueryBatch, TransactionManager,
//! };
//! use txlink_driver::InMemoryDriver;
//!
//! let driver = InMemoryDriver::new();
//! let db = DbContext::new("db", driver.clone())
//!     .with_cache(Arc::new(ConnectionAffinityCache::new()))
//!     .with_transactions(Arc::new(TransactionManager::new()));
//!
//! let batch: QueryBatch = (0..70).map(|i| txlink_driver::Command::new(format!("select {i}"))).collect();
//! let txn = db.begin()?;
//! db.commit_query_batch(&batch, 50, Some(&txn), &CancellationToken::new())?;
//! db.commit_query_batch(&batch, 50, Some(&txn), &CancellationToken::new())?;
//! txn.commit()?;
//!
//! assert_eq!(driver.set_sizes(), vec![50, 20, 50, 20]);
//! assert_eq!(driver.opened_count("db"), 1);
//! assert_eq!(driver.closed_count("db"), 1);
//! # Ok::<(), txlink_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod cancel;
mod config;
mod connection;
mod context;
mod error;
mod identity;
mod stats;
mod transaction;
mod types;

pub use batch::{
    assign_batches, batch_sizes, partition, short_batch_size, Batch, BatchExecutor, QueryBatch,
};
pub use cancel::CancellationToken;
pub use config::{Config, DEFAULT_BATCH_SIZE};
pub use connection::{ConnectionAffinityCache, ConnectionHandle, ConnectionLease, RegistryState};
pub use context::{CallerIdentityProvider, DbContext};
pub use error::{CoreError, CoreResult};
pub use identity::CallerIdentity;
pub use stats::{CacheStats, CacheStatsSnapshot};
pub use transaction::{
    CompletionHandler, ScopeOption, TransactionContext, TransactionManager, TransactionOptions,
    TransactionOutcome, TransactionScope, TransactionState, DEFAULT_TRANSACTION_TIMEOUT,
};
pub use types::{IsolationLevel, TransactionId};
