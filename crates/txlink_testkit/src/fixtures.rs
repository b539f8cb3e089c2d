//! Test fixtures and context helpers.
//!
//! Provides isolated contexts, an instrumented connection factory, and
//! command script files for the CLI.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;
use txlink_core::{ConnectionAffinityCache, DbContext, TransactionManager};
use txlink_driver::{Command, Connection, ConnectionFactory, DriverResult, InMemoryDriver};

/// A context over the in-memory driver with its own cache and manager.
pub struct TestContext {
    /// The context under test.
    pub ctx: DbContext,
    /// Driver shared with `ctx`, for inspection.
    pub driver: InMemoryDriver,
    /// Cache used by `ctx`.
    pub cache: Arc<ConnectionAffinityCache>,
    /// Transaction manager used by `ctx`.
    pub transactions: Arc<TransactionManager>,
}

impl TestContext {
    /// Creates a context for target `"test"`.
    pub fn memory() -> Self {
        Self::for_target("test")
    }

    /// Creates a context for `target`.
    pub fn for_target(target: &str) -> Self {
        let driver = InMemoryDriver::new();
        let cache = Arc::new(ConnectionAffinityCache::new());
        let transactions = Arc::new(TransactionManager::new());
        let ctx = DbContext::new(target, driver.clone())
            .with_cache(Arc::clone(&cache))
            .with_transactions(Arc::clone(&transactions));

        Self {
            ctx,
            driver,
            cache,
            transactions,
        }
    }

    /// Creates another context for `target` sharing this one's driver,
    /// cache and manager.
    pub fn sibling(&self, target: &str) -> DbContext {
        DbContext::new(target, self.driver.clone())
            .with_cache(Arc::clone(&self.cache))
            .with_transactions(Arc::clone(&self.transactions))
    }
}

impl std::ops::Deref for TestContext {
    type Target = DbContext;

    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

impl std::ops::DerefMut for TestContext {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ctx
    }
}

/// Runs a test with a fresh in-memory context.
///
/// # Example
///
/// ```rust
/// use txlink_testkit::with_test_context;
///
/// with_test_context(|ctx| {
///     let lease = ctx.acquire_connection(None).unwrap();
///     assert_eq!(lease.target(), "test");
/// });
/// ```
pub fn with_test_context<F, R>(f: F) -> R
where
    F: FnOnce(&TestContext) -> R,
{
    let ctx = TestContext::memory();
    f(&ctx)
}

#[derive(Debug, Default)]
struct Gate {
    held: bool,
    waiting: usize,
}

#[derive(Debug, Default)]
struct CountingState {
    attempts: Mutex<HashMap<String, usize>>,
    gate: Mutex<Gate>,
    released: Condvar,
    in_flight: AtomicUsize,
}

/// A connection factory that counts open attempts and can hold them back.
///
/// While held, every `open` blocks until [`CountingFactory::release_opens`]
/// is called. Tests use this to pile several callers up on the same
/// registry before letting the first open complete.
#[derive(Debug, Clone, Default)]
pub struct CountingFactory {
    driver: InMemoryDriver,
    state: Arc<CountingState>,
}

impl CountingFactory {
    /// Creates a factory over a fresh in-memory driver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a factory over `driver`.
    pub fn with_driver(driver: InMemoryDriver) -> Self {
        Self {
            driver,
            state: Arc::default(),
        }
    }

    /// Returns the underlying driver.
    pub fn driver(&self) -> &InMemoryDriver {
        &self.driver
    }

    /// Makes future opens block.
    pub fn hold_opens(&self) {
        self.state.gate.lock().held = true;
    }

    /// Unblocks waiting and future opens.
    pub fn release_opens(&self) {
        self.state.gate.lock().held = false;
        self.state.released.notify_all();
    }

    /// Returns how many opens are blocked right now.
    pub fn waiting(&self) -> usize {
        self.state.gate.lock().waiting
    }

    /// Returns how many opens are between start and return.
    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    /// Returns how many times `open` was called for `target`, including
    /// failed attempts.
    pub fn attempts(&self, target: &str) -> usize {
        self.state.attempts.lock().get(target).copied().unwrap_or(0)
    }

    /// Returns the total number of open attempts.
    pub fn total_attempts(&self) -> usize {
        self.state.attempts.lock().values().sum()
    }
}

impl ConnectionFactory for CountingFactory {
    fn open(&self, target: &str) -> DriverResult<Box<dyn Connection>> {
        *self
            .state
            .attempts
            .lock()
            .entry(target.to_owned())
            .or_default() += 1;
        self.state.in_flight.fetch_add(1, Ordering::SeqCst);

        {
            let mut gate = self.state.gate.lock();
            gate.waiting += 1;
            while gate.held {
                self.state.released.wait(&mut gate);
            }
            gate.waiting -= 1;
        }

        let result = self.driver.open(target);
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Writes a command script for `txlink run` to a temporary file.
///
/// The file is removed when the returned handle is dropped.
pub fn write_script(commands: &[Command], batch_size: Option<usize>) -> NamedTempFile {
    let script = serde_json::json!({
        "batch_size": batch_size,
        "commands": commands,
    });

    let mut file = NamedTempFile::new().expect("Failed to create script file");
    serde_json::to_writer_pretty(&mut file, &script).expect("Failed to write script");
    file.flush().expect("Failed to flush script");
    file
}

/// Returns `n` parameterless select commands.
pub fn select_commands(n: usize) -> Vec<Command> {
    (0..n).map(|i| Command::new(format!("select {i}"))).collect()
}
