//! Transaction-scoped connection affinity.

use crate::connection::handle::ConnectionHandle;
use crate::connection::lease::ConnectionLease;
use crate::error::{CoreError, CoreResult};
use crate::stats::{CacheStats, CacheStatsSnapshot};
use crate::transaction::{TransactionContext, TransactionOutcome};
use crate::types::TransactionId;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};
use txlink_driver::ConnectionFactory;

type Store = DashMap<TransactionId, Arc<TransactionRegistry>>;

/// Shape of a transaction's registry, for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryState {
    /// No connection yet.
    Empty,
    /// One target, stored inline.
    Single(String),
    /// Several targets (sorted).
    Multi(Vec<String>),
}

/// Target → handle associations of one transaction.
///
/// Grows empty → single → multi and never shrinks while the transaction
/// runs. The common case of one target per transaction needs no map.
#[derive(Debug)]
enum Entries {
    Empty,
    Single(String, Arc<ConnectionHandle>),
    Multi(HashMap<String, Arc<ConnectionHandle>>),
}

impl Entries {
    fn state(&self) -> RegistryState {
        match self {
            Entries::Empty => RegistryState::Empty,
            Entries::Single(target, _) => RegistryState::Single(target.clone()),
            Entries::Multi(map) => {
                let mut targets: Vec<String> = map.keys().cloned().collect();
                targets.sort();
                RegistryState::Multi(targets)
            }
        }
    }

    fn insert(&mut self, target: &str, handle: Arc<ConnectionHandle>) {
        *self = match std::mem::replace(self, Entries::Empty) {
            Entries::Empty => Entries::Single(target.to_owned(), handle),
            Entries::Single(existing, existing_handle) => {
                let mut map = HashMap::with_capacity(2);
                map.insert(existing, existing_handle);
                map.insert(target.to_owned(), handle);
                Entries::Multi(map)
            }
            Entries::Multi(mut map) => {
                map.insert(target.to_owned(), handle);
                Entries::Multi(map)
            }
        };
    }

    fn into_handles(self) -> Vec<Arc<ConnectionHandle>> {
        match self {
            Entries::Empty => Vec::new(),
            Entries::Single(_, handle) => vec![handle],
            Entries::Multi(map) => map.into_values().collect(),
        }
    }
}

#[derive(Debug)]
struct RegistryInner {
    entries: Entries,
    /// Set once completion drained the registry.
    closed: bool,
    /// Set when the registry was dropped from the store before use.
    detached: bool,
}

#[derive(Debug)]
struct TransactionRegistry {
    inner: Mutex<RegistryInner>,
}

impl TransactionRegistry {
    fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                entries: Entries::Empty,
                closed: false,
                detached: false,
            }),
        }
    }
}

/// Hands out one shared connection per (transaction, target) pair.
///
/// Within one transaction, every request for the same target gets the same
/// [`ConnectionHandle`], retained once per request. When the transaction
/// commits or aborts, the cache drops its own reference to every handle of
/// that transaction; each connection closes once its last lease is
/// released.
///
/// Requests outside a transaction always get a fresh, unshared connection.
///
/// # Concurrency
///
/// The store is a concurrent map keyed by transaction. Each transaction's
/// registry has its own lock, so unrelated transactions never contend.
/// Connections for a new target are opened under that lock, which only
/// callers of the same transaction can wait on.
///
/// # Example
///
/// ```rust
/// use txlink_core::{ConnectionAffinityCache, TransactionManager, TransactionOptions};
/// use txlink_driver::InMemoryDriver;
///
/// let cache = ConnectionAffinityCache::new();
/// let driver = InMemoryDriver::new();
/// let tm = TransactionManager::new();
/// let txn = tm.begin(TransactionOptions::default())?;
///
/// let a = cache.acquire(Some(&txn), "db", &driver)?;
/// let b = cache.acquire(Some(&txn), "db", &driver)?;
/// assert!(a.shares_connection_with(&b));
/// assert_eq!(driver.opened_count("db"), 1);
///
/// a.release()?;
/// b.release()?;
/// txn.commit()?;
/// assert_eq!(driver.closed_count("db"), 1);
/// # Ok::<(), txlink_core::CoreError>(())
/// ```
#[derive(Debug, Default)]
pub struct ConnectionAffinityCache {
    store: Arc<Store>,
    stats: Arc<CacheStats>,
}

impl ConnectionAffinityCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide cache.
    pub fn global() -> Arc<ConnectionAffinityCache> {
        static GLOBAL: OnceLock<Arc<ConnectionAffinityCache>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ConnectionAffinityCache::new())))
    }

    /// Acquires a connection to `target` for `transaction`.
    ///
    /// # Errors
    ///
    /// - `TransactionAborted` if the transaction was already aborted; no
    ///   connection is opened
    /// - `TransactionCompleted` if it already committed
    /// - `ConnectionOpenFailed` if the factory fails
    pub fn acquire(
        &self,
        transaction: Option<&Arc<TransactionContext>>,
        target: &str,
        factory: &dyn ConnectionFactory,
    ) -> CoreResult<ConnectionLease> {
        let Some(transaction) = transaction else {
            let handle = open_handle(target, factory)?;
            self.stats.record_unshared();
            debug!(connection = %target, "opened unshared connection");
            return Ok(ConnectionLease::new(handle));
        };

        if transaction.is_aborted() {
            return Err(CoreError::transaction_aborted(format!(
                "connection requested on already-aborted {}",
                transaction.id()
            )));
        }
        transaction.ensure_active()?;

        let id = transaction.id();
        loop {
            let registry = Arc::clone(
                self.store
                    .entry(id)
                    .or_insert_with(|| {
                        self.stats.record_registry_created();
                        debug!(txn = %id, "created connection registry");
                        Arc::new(TransactionRegistry::new())
                    })
                    .value(),
            );
            if let Some(lease) = self.acquire_from(&registry, transaction, target, factory)? {
                return Ok(lease);
            }
        }
    }

    /// Serves a request from `registry`, or returns `None` if the registry
    /// was detached while the caller waited for its lock.
    fn acquire_from(
        &self,
        registry: &Arc<TransactionRegistry>,
        transaction: &Arc<TransactionContext>,
        target: &str,
        factory: &dyn ConnectionFactory,
    ) -> CoreResult<Option<ConnectionLease>> {
        let id = transaction.id();
        let mut inner = registry.inner.lock();
        if inner.detached {
            return Ok(None);
        }
        if inner.closed {
            drop(inner);
            return Err(transaction.ensure_active().err().unwrap_or(
                CoreError::TransactionCompleted { id },
            ));
        }

        let existing = match &inner.entries {
            Entries::Single(existing, handle) if existing.as_str() == target => {
                Some(Arc::clone(handle))
            }
            Entries::Multi(map) => map.get(target).cloned(),
            _ => None,
        };

        let handle = match existing {
            Some(handle) => {
                self.stats.record_reused();
                handle
            }
            None => {
                let first = matches!(inner.entries, Entries::Empty);
                let handle = match open_handle(target, factory) {
                    Ok(handle) => handle,
                    Err(err) => {
                        if first {
                            // Waiters on this registry retry against a fresh one.
                            inner.detached = true;
                            self.store.remove_if(&id, |_, r| Arc::ptr_eq(r, registry));
                        }
                        return Err(err);
                    }
                };

                if first {
                    let store = Arc::clone(&self.store);
                    let stats = Arc::clone(&self.stats);
                    let completed = Arc::clone(registry);
                    let subscribed = transaction.on_completed(move |id, outcome| {
                        on_transaction_completed(&store, &stats, &completed, id, outcome);
                    });
                    if let Err(err) = subscribed {
                        inner.closed = true;
                        self.store.remove_if(&id, |_, r| Arc::ptr_eq(r, registry));
                        drop(inner);
                        if let Err(close_err) = handle.release() {
                            warn!(txn = %id, error = %close_err, "failed to close connection of completed transaction");
                        }
                        return Err(err);
                    }
                }

                self.stats.record_opened();
                inner.entries.insert(target, Arc::clone(&handle));
                handle
            }
        };

        handle.retain();
        drop(inner);

        debug!(txn = %id, connection = %target, use_count = handle.use_count(), "leased transaction connection");
        Ok(Some(ConnectionLease::new(handle)))
    }

    /// Returns the number of transactions with a live registry.
    #[must_use]
    pub fn registry_count(&self) -> usize {
        self.store.len()
    }

    /// Returns the registry shape for a transaction, or `None` if it has
    /// none (never used the cache, or already completed).
    #[must_use]
    pub fn registry_state(&self, id: TransactionId) -> Option<RegistryState> {
        let registry = self.store.get(&id).map(|r| Arc::clone(r.value()))?;
        let inner = registry.inner.lock();
        Some(inner.entries.state())
    }

    /// Returns a copy of the cache counters.
    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    pub(crate) fn record_batch(&self) {
        self.stats.record_batch();
    }
}

fn open_handle(target: &str, factory: &dyn ConnectionFactory) -> CoreResult<Arc<ConnectionHandle>> {
    let connection = factory
        .open(target)
        .map_err(|source| CoreError::connection_open_failed(target, source))?;
    Ok(Arc::new(ConnectionHandle::new(target, connection)))
}

/// Drops the registry's reference to every handle of a finished transaction.
///
/// Close failures are logged and counted, never raised: one bad connection
/// must not keep its siblings open.
fn on_transaction_completed(
    store: &Store,
    stats: &CacheStats,
    registry: &Arc<TransactionRegistry>,
    id: TransactionId,
    outcome: TransactionOutcome,
) {
    store.remove_if(&id, |_, r| Arc::ptr_eq(r, registry));

    let handles = {
        let mut inner = registry.inner.lock();
        inner.closed = true;
        std::mem::replace(&mut inner.entries, Entries::Empty).into_handles()
    };

    debug!(txn = %id, ?outcome, connections = handles.len(), "releasing transaction connections");
    for handle in handles {
        if let Err(err) = handle.release() {
            stats.record_cleanup_failure();
            warn!(txn = %id, connection = %handle.target(), error = %err, "suppressed connection cleanup failure");
        }
    }
    stats.record_registry_completed();
}
