//! Transaction manager.

use crate::error::CoreResult;
use crate::transaction::context::{TransactionContext, TransactionOptions, TransactionOutcome};
use crate::types::TransactionId;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Transaction IDs key the process-wide affinity store, so they are
/// allocated process-wide rather than per manager.
static NEXT_TXID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct Tracking {
    active: RwLock<Vec<TransactionId>>,
    committed: AtomicU64,
    aborted: AtomicU64,
}

/// Begins transactions and keeps track of the ones still running.
///
/// The manager observes completion through the same handler mechanism
/// the connection cache uses, so it never needs to be told explicitly
/// that a transaction ended.
#[derive(Debug, Default)]
pub struct TransactionManager {
    tracking: Arc<Tracking>,
}

impl TransactionManager {
    /// Creates a new transaction manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide manager.
    pub fn global() -> Arc<TransactionManager> {
        static GLOBAL: OnceLock<Arc<TransactionManager>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(TransactionManager::new())))
    }

    /// Begins a new transaction.
    pub fn begin(&self, options: TransactionOptions) -> CoreResult<Arc<TransactionContext>> {
        let id = TransactionId::new(NEXT_TXID.fetch_add(1, Ordering::SeqCst));
        let ctx = Arc::new(TransactionContext::new(id, options));

        self.tracking.active.write().push(id);

        let tracking = Arc::clone(&self.tracking);
        ctx.on_completed(move |id, outcome| {
            tracking.active.write().retain(|&active| active != id);
            match outcome {
                TransactionOutcome::Committed => tracking.committed.fetch_add(1, Ordering::Relaxed),
                TransactionOutcome::Aborted => tracking.aborted.fetch_add(1, Ordering::Relaxed),
            };
        })?;

        tracing::debug!(txn = %id, isolation = ?options.isolation_level, "transaction started");
        Ok(ctx)
    }

    /// Returns the number of active transactions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.tracking.active.read().len()
    }

    /// Returns true if `id` is still running.
    #[must_use]
    pub fn is_active(&self, id: TransactionId) -> bool {
        self.tracking.active.read().contains(&id)
    }

    /// Returns the number of committed transactions.
    #[must_use]
    pub fn committed_count(&self) -> u64 {
        self.tracking.committed.load(Ordering::Relaxed)
    }

    /// Returns the number of aborted transactions.
    #[must_use]
    pub fn aborted_count(&self) -> u64 {
        self.tracking.aborted.load(Ordering::Relaxed)
    }
}
