//! Shared helpers for core integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use txlink_core::{ConnectionAffinityCache, DbContext, TransactionManager};
use txlink_driver::{Command, Connection, ConnectionFactory, DriverResult, InMemoryDriver};

/// A context with its own cache and manager, so tests never share state
/// through the process-wide instances.
pub struct Harness {
    pub driver: InMemoryDriver,
    pub cache: Arc<ConnectionAffinityCache>,
    pub transactions: Arc<TransactionManager>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            driver: InMemoryDriver::new(),
            cache: Arc::new(ConnectionAffinityCache::new()),
            transactions: Arc::new(TransactionManager::new()),
        }
    }

    pub fn context(&self, target: &str) -> DbContext {
        DbContext::new(target, self.driver.clone())
            .with_cache(Arc::clone(&self.cache))
            .with_transactions(Arc::clone(&self.transactions))
    }
}

/// Opens through the in-memory driver after a delay, widening race windows.
pub struct SlowFactory {
    pub driver: InMemoryDriver,
    pub delay: Duration,
}

impl ConnectionFactory for SlowFactory {
    fn open(&self, target: &str) -> DriverResult<Box<dyn Connection>> {
        thread::sleep(self.delay);
        self.driver.open(target)
    }
}

pub fn selects(n: usize) -> Vec<Command> {
    (0..n).map(|i| Command::new(format!("select {i}"))).collect()
}

/// Fails its first open after a delay, then opens normally.
pub struct FlakyFactory {
    pub driver: InMemoryDriver,
    pub delay: Duration,
    pub failed: std::sync::atomic::AtomicBool,
}

impl ConnectionFactory for FlakyFactory {
    fn open(&self, target: &str) -> DriverResult<Box<dyn Connection>> {
        use std::sync::atomic::Ordering;

        if !self.failed.swap(true, Ordering::SeqCst) {
            thread::sleep(self.delay);
            return Err(txlink_driver::DriverError::open_failed(target, "first open fails"));
        }
        self.driver.open(target)
    }
}
