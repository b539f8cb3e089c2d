//! In-memory driver for testing.

use crate::command::{Command, CommandSet};
use crate::connection::{Connection, ConnectionFactory};
use crate::error::{DriverError, DriverResult};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Callback run after each successful command set with its 1-based number.
type SetObserver = Arc<dyn Fn(usize) + Send + Sync>;

/// A command set as it reached the in-memory server.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedSet {
    /// Id of the connection that ran the set.
    pub connection_id: u64,
    /// Target the connection was opened for.
    pub target: String,
    /// The commands, in execution order.
    pub commands: Vec<Command>,
    /// Timeout the set was sent with.
    pub timeout: Option<Duration>,
}

#[derive(Default)]
struct DriverState {
    opened: HashMap<String, usize>,
    closed: HashMap<String, usize>,
    journal: Vec<ExecutedSet>,
    affected: HashMap<String, i64>,
    failing_targets: HashSet<String>,
    fail_close: bool,
    fail_set_number: Option<usize>,
    sets_seen: usize,
    observer: Option<SetObserver>,
}

impl std::fmt::Debug for DriverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverState")
            .field("opened", &self.opened)
            .field("closed", &self.closed)
            .field("sets_seen", &self.sets_seen)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<DriverState>,
    next_connection_id: AtomicU64,
}

/// A driver that executes nothing and records everything.
///
/// This driver is suitable for:
/// - Unit and integration tests
/// - Dry runs that only need to see what would be sent
///
/// Every statement reports `-1` affected rows (the "no count" sentinel)
/// unless an explicit count was registered with
/// [`InMemoryDriver::set_affected_rows`]. A command set reports the sum of
/// its non-negative counts (saturating), or `-1` when no command reported
/// one.
///
/// # Thread Safety
///
/// Clones share state, so a test can keep one clone for inspection and hand
/// another to the code under test.
///
/// # Example
///
/// ```rust
/// use txlink_driver::{Command, CommandSet, ConnectionFactory, InMemoryDriver};
///
/// let driver = InMemoryDriver::new();
/// driver.set_affected_rows("insert t values (1), (2)", 2);
///
/// let mut conn = driver.open("db").unwrap();
/// let set: CommandSet = std::iter::once(Command::new("insert t values (1), (2)")).collect();
/// assert_eq!(conn.execute_set(&set).unwrap(), 2);
/// conn.close().unwrap();
/// assert_eq!(driver.closed_count("db"), 1);
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryDriver {
    shared: Arc<Shared>,
}

impl Default for InMemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDriver {
    /// Creates a driver with no faults configured.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(DriverState::default()),
                next_connection_id: AtomicU64::new(1),
            }),
        }
    }

    /// Registers the affected-row count reported for `sql`.
    pub fn set_affected_rows(&self, sql: impl Into<String>, rows: i64) {
        self.shared.state.lock().affected.insert(sql.into(), rows);
    }

    /// Makes every future `open` for `target` fail.
    pub fn fail_open(&self, target: impl Into<String>) {
        self.shared.state.lock().failing_targets.insert(target.into());
    }

    /// Makes every future `close` fail (the connection still ends up closed).
    pub fn fail_close(&self, value: bool) {
        self.shared.state.lock().fail_close = value;
    }

    /// Makes the `n`-th command set (1-based, counted across all
    /// connections) fail.
    pub fn fail_set(&self, n: usize) {
        self.shared.state.lock().fail_set_number = Some(n);
    }

    /// Runs `observer` after every successful command set, outside the
    /// driver's lock. Replaces any previous observer.
    pub fn observe_sets<F>(&self, observer: F)
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.shared.state.lock().observer = Some(Arc::new(observer));
    }

    /// Returns how many connections were opened for `target`.
    #[must_use]
    pub fn opened_count(&self, target: &str) -> usize {
        self.shared.state.lock().opened.get(target).copied().unwrap_or(0)
    }

    /// Returns how many connections were closed for `target`.
    #[must_use]
    pub fn closed_count(&self, target: &str) -> usize {
        self.shared.state.lock().closed.get(target).copied().unwrap_or(0)
    }

    /// Returns the total number of connections opened.
    #[must_use]
    pub fn total_opened(&self) -> usize {
        self.shared.state.lock().opened.values().sum()
    }

    /// Returns the total number of connections closed.
    #[must_use]
    pub fn total_closed(&self) -> usize {
        self.shared.state.lock().closed.values().sum()
    }

    /// Returns a copy of every command set executed so far.
    #[must_use]
    pub fn journal(&self) -> Vec<ExecutedSet> {
        self.shared.state.lock().journal.clone()
    }

    /// Returns the sizes of the executed command sets, in order.
    #[must_use]
    pub fn set_sizes(&self) -> Vec<usize> {
        self.shared
            .state
            .lock()
            .journal
            .iter()
            .map(|set| set.commands.len())
            .collect()
    }

    fn rows_for(state: &DriverState, command: &Command) -> i64 {
        state.affected.get(&command.sql).copied().unwrap_or(-1)
    }

    fn record(&self, connection_id: u64, target: &str, set: &CommandSet) -> DriverResult<i64> {
        let mut state = self.shared.state.lock();
        state.sets_seen += 1;
        if state.fail_set_number == Some(state.sets_seen) {
            return Err(DriverError::execution(format!(
                "injected failure on command set {}",
                state.sets_seen
            )));
        }

        let rows = set
            .commands()
            .iter()
            .map(|c| Self::rows_for(&state, c))
            .filter(|rows| *rows >= 0)
            .fold(None, |sum: Option<i64>, rows| {
                Some(sum.map_or(rows, |sum| sum.saturating_add(rows)))
            })
            .unwrap_or(-1);

        state.journal.push(ExecutedSet {
            connection_id,
            target: target.to_owned(),
            commands: set.commands().to_vec(),
            timeout: set.timeout(),
        });
        let number = state.sets_seen;
        let observer = state.observer.clone();
        drop(state);

        if let Some(observer) = observer {
            observer(number);
        }
        Ok(rows)
    }
}

impl ConnectionFactory for InMemoryDriver {
    fn open(&self, target: &str) -> DriverResult<Box<dyn Connection>> {
        {
            let mut state = self.shared.state.lock();
            if state.failing_targets.contains(target) {
                return Err(DriverError::open_failed(target, "injected open failure"));
            }
            *state.opened.entry(target.to_owned()).or_default() += 1;
        }

        let id = self.shared.next_connection_id.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryConnection {
            id,
            target: target.to_owned(),
            open: true,
            driver: self.clone(),
        }))
    }
}

#[derive(Debug)]
struct InMemoryConnection {
    id: u64,
    target: String,
    open: bool,
    driver: InMemoryDriver,
}

impl Connection for InMemoryConnection {
    fn execute_set(&mut self, set: &CommandSet) -> DriverResult<i64> {
        if !self.open {
            return Err(DriverError::Closed);
        }
        self.driver.record(self.id, &self.target, set)
    }

    fn close(&mut self) -> DriverResult<()> {
        if !self.open {
            return Err(DriverError::Closed);
        }
        self.open = false;

        let mut state = self.driver.shared.state.lock();
        *state.closed.entry(self.target.clone()).or_default() += 1;
        if state.fail_close {
            return Err(DriverError::CloseFailed("injected close failure".into()));
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
