//! Batched execution over one shared connection.

use crate::batch::assembler::{partition, Batch};
use crate::cancel::CancellationToken;
use crate::connection::{ConnectionAffinityCache, ConnectionLease};
use crate::error::{CoreError, CoreResult};
use crate::transaction::{
    ScopeOption, TransactionContext, TransactionManager, TransactionOptions, TransactionScope,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use txlink_driver::{Command, CommandSet, ConnectionFactory};

/// Runs command lists in batches inside one transaction scope.
///
/// Each call opens a scope (joining the caller's transaction if one is
/// given), leases a single connection from the cache, and sends each batch
/// as one round trip. The lease is released and the scope closed on every
/// exit path. A failed batch leaves the scope uncompleted, which aborts the
/// transaction it ran in.
pub struct BatchExecutor<'a> {
    cache: &'a ConnectionAffinityCache,
    transactions: &'a TransactionManager,
    factory: &'a dyn ConnectionFactory,
    target: &'a str,
    options: TransactionOptions,
}

impl<'a> BatchExecutor<'a> {
    /// Creates an executor for `target`.
    pub fn new(
        cache: &'a ConnectionAffinityCache,
        transactions: &'a TransactionManager,
        factory: &'a dyn ConnectionFactory,
        target: &'a str,
    ) -> Self {
        Self {
            cache,
            transactions,
            factory,
            target,
            options: TransactionOptions::default(),
        }
    }

    /// Sets the options used when the executor starts its own transaction.
    #[must_use]
    pub fn transaction_options(mut self, options: TransactionOptions) -> Self {
        self.options = options;
        self
    }

    /// Executes `commands` in batches of `batch_size` and returns the sum of
    /// the affected-row counts reported for each batch.
    ///
    /// `cancel` is checked after each batch, so the first batch is always
    /// sent. Once it is set, no further batch is sent and the total so far
    /// is returned; batches already sent stay part of the transaction.
    /// Totals saturate at the `i64` bounds.
    ///
    /// # Errors
    ///
    /// - `InvalidBatchSize` if `batch_size` is zero; nothing is opened
    /// - `TransactionAborted` if `ambient` was already aborted
    /// - `ConnectionOpenFailed` if no connection could be opened
    /// - `BatchExecutionFailed` for the first failing batch; the partial
    ///   total is discarded
    pub fn execute_all(
        &self,
        commands: Vec<Command>,
        batch_size: usize,
        ambient: Option<&Arc<TransactionContext>>,
        cancel: &CancellationToken,
    ) -> CoreResult<i64> {
        let batches = partition(commands, batch_size)?;
        if batches.is_empty() {
            return Ok(0);
        }

        let scope = TransactionScope::new(self.transactions, ScopeOption::Required, ambient, self.options)?;
        let lease = self.cache.acquire(scope.transaction(), self.target, self.factory)?;

        match self.run(&lease, batches, cancel) {
            Ok(total) => {
                lease.release()?;
                scope.complete()?;
                Ok(total)
            }
            Err(err) => {
                if let Err(release_err) = lease.release() {
                    warn!(connection = %self.target, error = %release_err, "connection release failed after batch error");
                }
                drop(scope);
                Err(err)
            }
        }
    }

    fn run(
        &self,
        lease: &ConnectionLease,
        batches: Vec<Batch<Command>>,
        cancel: &CancellationToken,
    ) -> CoreResult<i64> {
        let count = batches.len();
        let mut total: i64 = 0;

        for batch in batches {
            let index = batch.index;
            let size = batch.len();
            let mut set: CommandSet = batch.items.into_iter().collect();
            set.set_timeout(None);

            let affected = lease
                .execute_set(&set)
                .map_err(|source| CoreError::BatchExecutionFailed {
                    batch_index: index,
                    source,
                })?;
            self.cache.record_batch();
            debug!(connection = %self.target, batch = index, commands = size, affected, "executed batch");
            total = total.saturating_add(affected);

            let remaining = count - index - 1;
            if remaining > 0 && cancel.is_cancelled() {
                debug!(connection = %self.target, executed = index + 1, remaining, "batch run cancelled");
                break;
            }
        }

        Ok(total)
    }
}

impl fmt::Debug for BatchExecutor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("target", &self.target)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionState;
    use txlink_driver::InMemoryDriver;

    struct Fixture {
        cache: ConnectionAffinityCache,
        tm: TransactionManager,
        driver: InMemoryDriver,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                cache: ConnectionAffinityCache::new(),
                tm: TransactionManager::new(),
                driver: InMemoryDriver::new(),
            }
        }

        fn executor(&self) -> BatchExecutor<'_> {
            BatchExecutor::new(&self.cache, &self.tm, &self.driver, "db")
        }
    }

    fn selects(n: usize) -> Vec<Command> {
        (0..n).map(|i| Command::new(format!("select {i}"))).collect()
    }

    #[test]
    fn one_round_trip_per_batch() {
        let fx = Fixture::new();
        let total = fx
            .executor()
            .execute_all(selects(70), 50, None, &CancellationToken::new())
            .unwrap();

        assert_eq!(total, -2);
        assert_eq!(fx.driver.set_sizes(), vec![50, 20]);
        assert_eq!(fx.driver.opened_count("db"), 1);
        assert_eq!(fx.driver.closed_count("db"), 1);
        assert_eq!(fx.cache.stats().batches_executed, 2);
        assert_eq!(fx.tm.committed_count(), 1);
    }

    #[test]
    fn batches_run_without_timeout() {
        let fx = Fixture::new();
        fx.executor()
            .execute_all(selects(3), 50, None, &CancellationToken::new())
            .unwrap();

        let journal = fx.driver.journal();
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].timeout, None);
    }

    #[test]
    fn empty_list_opens_nothing() {
        let fx = Fixture::new();
        let total = fx
            .executor()
            .execute_all(Vec::new(), 50, None, &CancellationToken::new())
            .unwrap();
        assert_eq!(total, 0);
        assert_eq!(fx.driver.total_opened(), 0);
    }

    #[test]
    fn zero_batch_size_fails_before_opening() {
        let fx = Fixture::new();
        let result = fx
            .executor()
            .execute_all(selects(5), 0, None, &CancellationToken::new());
        assert!(matches!(result, Err(CoreError::InvalidBatchSize { size: 0 })));
        assert_eq!(fx.driver.total_opened(), 0);
        assert_eq!(fx.tm.active_count(), 0);
    }

    #[test]
    fn cancelled_up_front_still_sends_first_batch() {
        let fx = Fixture::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let total = fx.executor().execute_all(selects(120), 50, None, &cancel).unwrap();
        assert_eq!(total, -1);
        assert_eq!(fx.driver.set_sizes(), vec![50]);
        assert_eq!(fx.driver.closed_count("db"), 1);
        assert_eq!(fx.tm.committed_count(), 1);
    }

    #[test]
    fn cancel_after_last_batch_changes_nothing() {
        let fx = Fixture::new();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        fx.driver.observe_sets(move |n| {
            if n == 2 {
                trigger.cancel();
            }
        });

        fx.executor().execute_all(selects(70), 50, None, &cancel).unwrap();
        assert_eq!(fx.driver.set_sizes(), vec![50, 20]);
        assert_eq!(fx.tm.committed_count(), 1);
    }

    #[test]
    fn huge_counts_saturate() {
        let fx = Fixture::new();
        fx.driver.set_affected_rows("bulk", i64::MAX);
        let commands = vec![Command::new("bulk"); 3];

        let total = fx
            .executor()
            .execute_all(commands, 1, None, &CancellationToken::new())
            .unwrap();

        assert_eq!(fx.driver.set_sizes(), vec![1, 2]);
        assert_eq!(total, i64::MAX);
    }

    #[test]
    fn failed_batch_aborts_and_releases() {
        let fx = Fixture::new();
        fx.driver.fail_set(2);

        let result = fx
            .executor()
            .execute_all(selects(120), 50, None, &CancellationToken::new());

        assert!(matches!(
            result,
            Err(CoreError::BatchExecutionFailed { batch_index: 1, .. })
        ));
        assert_eq!(fx.driver.set_sizes(), vec![50]);
        assert_eq!(fx.driver.closed_count("db"), 1);
        assert_eq!(fx.tm.aborted_count(), 1);
    }

    #[test]
    fn joins_ambient_transaction() {
        let fx = Fixture::new();
        let txn = fx.tm.begin(TransactionOptions::default()).unwrap();
        let cancel = CancellationToken::new();

        fx.executor().execute_all(selects(10), 50, Some(&txn), &cancel).unwrap();
        fx.executor().execute_all(selects(10), 50, Some(&txn), &cancel).unwrap();

        assert_eq!(txn.state(), TransactionState::Active);
        assert_eq!(fx.driver.opened_count("db"), 1);
        assert_eq!(fx.driver.closed_count("db"), 0);

        txn.commit().unwrap();
        assert_eq!(fx.driver.closed_count("db"), 1);
    }

    #[test]
    fn failure_dooms_ambient_transaction() {
        let fx = Fixture::new();
        let txn = fx.tm.begin(TransactionOptions::default()).unwrap();
        fx.driver.fail_set(1);

        let result = fx
            .executor()
            .execute_all(selects(3), 50, Some(&txn), &CancellationToken::new());
        assert!(result.is_err());
        assert!(txn.is_aborted());

        let again = fx.cache.acquire(Some(&txn), "db", &fx.driver);
        assert!(matches!(again, Err(CoreError::TransactionAborted { .. })));
        assert_eq!(fx.driver.closed_count("db"), 1);
    }
}
