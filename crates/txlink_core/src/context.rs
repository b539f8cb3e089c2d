//! Caller-facing data access context.

use crate::batch::{BatchExecutor, QueryBatch};
use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::connection::{ConnectionAffinityCache, ConnectionLease};
use crate::error::{CoreError, CoreResult};
use crate::identity::CallerIdentity;
use crate::transaction::{ScopeOption, TransactionContext, TransactionManager, TransactionScope};
use parking_lot::RwLock;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use tracing::{debug, warn};
use txlink_driver::{Command, CommandMeta, CommandSet, ConnectionFactory};

/// Returns the identity commands are attributed to.
pub type CallerIdentityProvider = Arc<dyn Fn() -> CallerIdentity + Send + Sync>;

/// Entry point for running commands against one target.
///
/// A context binds a target (connection string) to a connection factory.
/// Every operation takes an optional ambient transaction: when one is
/// given, all work of that transaction against this target goes over a
/// single shared connection; when none is given, each operation runs in a
/// transaction of its own.
///
/// By default contexts use the process-wide [`ConnectionAffinityCache`] and
/// [`TransactionManager`], so separate contexts for the same target share
/// connections inside one transaction.
///
/// # Example
///
/// ```rust
/// use txlink_core::{CancellationToken, DbContext, QueryBatch};
/// use txlink_driver::InMemoryDriver;
///
/// let driver = InMemoryDriver::new();
/// let db = DbContext::new("server=local;db=app", driver.clone());
///
/// let batch = QueryBatch::new()
///     .add_query("create table t (id int)")
///     .add_query("drop table t");
/// let affected = db.commit_query_batch(&batch, 0, None, &CancellationToken::new())?;
///
/// assert_eq!(affected, -1);
/// assert_eq!(driver.set_sizes(), vec![2]);
/// # Ok::<(), txlink_core::CoreError>(())
/// ```
pub struct DbContext {
    target: String,
    factory: Arc<dyn ConnectionFactory>,
    cache: Arc<ConnectionAffinityCache>,
    transactions: Arc<TransactionManager>,
    config: Config,
    caller_identity: RwLock<CallerIdentityProvider>,
}

impl DbContext {
    /// Creates a context with the default configuration.
    pub fn new<F>(target: impl Into<String>, factory: F) -> Self
    where
        F: ConnectionFactory + 'static,
    {
        let anonymous: CallerIdentityProvider = Arc::new(CallerIdentity::default);
        Self {
            target: target.into(),
            factory: Arc::new(factory),
            cache: ConnectionAffinityCache::global(),
            transactions: TransactionManager::global(),
            config: Config::default(),
            caller_identity: RwLock::new(anonymous),
        }
    }

    /// Uses `cache` instead of the process-wide cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ConnectionAffinityCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Uses `transactions` instead of the process-wide manager.
    #[must_use]
    pub fn with_transactions(mut self, transactions: Arc<TransactionManager>) -> Self {
        self.transactions = transactions;
        self
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Returns the target.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the connection cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<ConnectionAffinityCache> {
        &self.cache
    }

    /// Returns the transaction manager.
    #[must_use]
    pub fn transactions(&self) -> &Arc<TransactionManager> {
        &self.transactions
    }

    /// Returns the default batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    /// Sets the default batch size.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBatchSize` for zero.
    pub fn set_batch_size(&mut self, batch_size: usize) -> CoreResult<()> {
        if batch_size == 0 {
            return Err(CoreError::InvalidBatchSize { size: batch_size });
        }
        self.config.batch_size = batch_size;
        Ok(())
    }

    /// Sets the provider of the caller identity stamped on every command.
    pub fn set_caller_identity_provider<F>(&self, provider: F)
    where
        F: Fn() -> CallerIdentity + Send + Sync + 'static,
    {
        *self.caller_identity.write() = Arc::new(provider);
    }

    /// Returns the current caller identity.
    #[must_use]
    pub fn caller_identity(&self) -> CallerIdentity {
        let provider = self.caller_identity.read().clone();
        provider()
    }

    /// Starts a transaction with the configured options.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started.
    pub fn begin(&self) -> CoreResult<Arc<TransactionContext>> {
        self.transactions.begin(self.config.transaction_options)
    }

    /// Opens a transaction scope with the configured options.
    ///
    /// # Errors
    ///
    /// Returns an error if a new transaction cannot be started.
    pub fn begin_scope(
        &self,
        option: ScopeOption,
        ambient: Option<&Arc<TransactionContext>>,
    ) -> CoreResult<TransactionScope> {
        TransactionScope::new(
            &self.transactions,
            option,
            ambient,
            self.config.transaction_options,
        )
    }

    /// Runs `f` in a new transaction.
    ///
    /// The transaction commits if `f` returns `Ok` and aborts otherwise.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or the commit error.
    pub fn transaction<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&Arc<TransactionContext>) -> CoreResult<T>,
    {
        let scope = self.begin_scope(ScopeOption::RequiresNew, None)?;
        let transaction = scope
            .transaction()
            .map(Arc::clone)
            .ok_or_else(|| CoreError::invalid_operation("scope started without a transaction"))?;

        let value = f(&transaction)?;
        scope.complete()?;
        Ok(value)
    }

    /// Acquires a connection to this context's target.
    ///
    /// Inside a transaction the connection is shared with every other
    /// acquisition of the same transaction and target.
    ///
    /// # Errors
    ///
    /// Returns `TransactionAborted` for an aborted transaction and
    /// `ConnectionOpenFailed` if the factory fails.
    pub fn acquire_connection(
        &self,
        ambient: Option<&Arc<TransactionContext>>,
    ) -> CoreResult<ConnectionLease> {
        self.cache.acquire(ambient, &self.target, self.factory.as_ref())
    }

    /// Runs a single command and returns its affected-row count.
    ///
    /// The command is sent with the configured command timeout.
    ///
    /// # Errors
    ///
    /// Returns `CommandFailed` if the driver rejects the command, after the
    /// connection is released and the scope closed.
    #[track_caller]
    pub fn execute(
        &self,
        command: Command,
        ambient: Option<&Arc<TransactionContext>>,
    ) -> CoreResult<i64> {
        let meta = self.command_meta(Location::caller());

        let scope = self.begin_scope(ScopeOption::Required, ambient)?;
        let lease = self.acquire_connection(scope.transaction())?;

        let mut set: CommandSet = std::iter::once(command.with_meta(meta)).collect();
        set.set_timeout(self.config.command_timeout);

        match lease.execute_set(&set) {
            Ok(affected) => {
                lease.release()?;
                scope.complete()?;
                Ok(affected)
            }
            Err(source) => {
                if let Err(release_err) = lease.release() {
                    warn!(connection = %self.target, error = %release_err, "connection release failed after command error");
                }
                drop(scope);
                Err(CoreError::CommandFailed(source))
            }
        }
    }

    /// Runs every command of `batch` in batches and returns the sum of the
    /// affected-row counts.
    ///
    /// The batch size is `batch_size` if non-zero, else the batch's own
    /// override, else the configured default. `cancel` is checked after
    /// each batch; a cancelled run returns the total so far.
    ///
    /// # Errors
    ///
    /// See [`BatchExecutor::execute_all`].
    #[track_caller]
    pub fn commit_query_batch(
        &self,
        batch: &QueryBatch,
        batch_size: usize,
        ambient: Option<&Arc<TransactionContext>>,
        cancel: &CancellationToken,
    ) -> CoreResult<i64> {
        let meta = self.command_meta(Location::caller());
        let batch_size = self.effective_batch_size(batch, batch_size);

        let commands: Vec<Command> = batch
            .commands()
            .iter()
            .map(|command| command.clone().with_meta(meta.clone()))
            .collect();

        debug!(connection = %self.target, commands = commands.len(), batch_size, "committing query batch");
        BatchExecutor::new(&self.cache, &self.transactions, self.factory.as_ref(), &self.target)
            .transaction_options(self.config.transaction_options)
            .execute_all(commands, batch_size, ambient, cancel)
    }

    /// Returns the batch size `commit_query_batch` would use.
    #[must_use]
    pub fn effective_batch_size(&self, batch: &QueryBatch, batch_size: usize) -> usize {
        if batch_size > 0 {
            batch_size
        } else {
            batch.batch_size().unwrap_or(self.config.batch_size)
        }
    }

    fn command_meta(&self, location: &Location<'_>) -> CommandMeta {
        CommandMeta {
            caller_id: self.caller_identity().to_bytes(),
            file: location.file().to_owned(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Debug for DbContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbContext")
            .field("target", &self.target)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
