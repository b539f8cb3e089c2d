//! Connection cache statistics.
//!
//! Counters are atomic and can be read while acquisitions and batches are in
//! flight.
//!
//! # Usage
//!
//! ```rust
//! use txlink_core::ConnectionAffinityCache;
//!
//! let cache = ConnectionAffinityCache::new();
//! let stats = cache.stats();
//! assert_eq!(stats.connections_opened, 0);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Connection cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Connections opened for a transaction registry.
    connections_opened: AtomicU64,
    /// Requests served by an existing registry entry.
    connections_reused: AtomicU64,
    /// Connections opened outside any transaction.
    unshared_connections: AtomicU64,
    /// Registries created (one per transaction that used the cache).
    registries_created: AtomicU64,
    /// Registries drained on transaction completion.
    registries_completed: AtomicU64,
    /// Close failures swallowed during completion cleanup.
    cleanup_failures: AtomicU64,
    /// Batches executed through the cache's connections.
    batches_executed: AtomicU64,
}

impl CacheStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reused(&self) {
        self.connections_reused.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unshared(&self) {
        self.unshared_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_registry_created(&self) {
        self.registries_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_registry_completed(&self) {
        self.registries_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cleanup_failure(&self) {
        self.cleanup_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self) {
        self.batches_executed.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_reused: self.connections_reused.load(Ordering::Relaxed),
            unshared_connections: self.unshared_connections.load(Ordering::Relaxed),
            registries_created: self.registries_created.load(Ordering::Relaxed),
            registries_completed: self.registries_completed.load(Ordering::Relaxed),
            cleanup_failures: self.cleanup_failures.load(Ordering::Relaxed),
            batches_executed: self.batches_executed.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    /// Connections opened for a transaction registry.
    pub connections_opened: u64,
    /// Requests served by an existing registry entry.
    pub connections_reused: u64,
    /// Connections opened outside any transaction.
    pub unshared_connections: u64,
    /// Registries created.
    pub registries_created: u64,
    /// Registries drained on transaction completion.
    pub registries_completed: u64,
    /// Close failures swallowed during completion cleanup.
    pub cleanup_failures: u64,
    /// Batches executed.
    pub batches_executed: u64,
}
