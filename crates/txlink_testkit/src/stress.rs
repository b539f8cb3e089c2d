//! Stress tests for the affinity cache.
//!
//! These runs drive many threads through shared transactions and check
//! that connection counts still add up afterwards.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use txlink_core::{
    ConnectionAffinityCache, CoreError, CoreResult, TransactionManager, TransactionOptions,
};
use txlink_driver::InMemoryDriver;

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Connections the driver opened.
    pub connections_opened: usize,
    /// Connections the driver closed.
    pub connections_closed: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    fn new(successful: usize, failed: usize, driver: &InMemoryDriver, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            connections_opened: driver.total_opened(),
            connections_closed: driver.total_closed(),
            duration,
            ops_per_second,
        }
    }

    /// Returns true if every opened connection was closed.
    pub fn is_balanced(&self) -> bool {
        self.connections_opened == self.connections_closed
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!(
            "Connections: {} opened, {} closed",
            self.connections_opened, self.connections_closed
        );
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of transactions to run.
    pub transactions: usize,
    /// Threads sharing each transaction.
    pub threads: usize,
    /// Acquisitions per thread per transaction.
    pub acquires_per_thread: usize,
    /// Distinct targets acquired round-robin.
    pub targets: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            transactions: 100,
            threads: 4,
            acquires_per_thread: 8,
            targets: 3,
        }
    }
}

impl StressConfig {
    /// Checks that the run has at least one thread and one target.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` naming the zero field.
    pub fn validate(&self) -> CoreResult<()> {
        if self.threads == 0 {
            return Err(CoreError::invalid_operation("stress run needs at least one thread"));
        }
        if self.targets == 0 {
            return Err(CoreError::invalid_operation("stress run needs at least one target"));
        }
        Ok(())
    }
}

/// Runs transactions whose acquisitions are spread over several threads.
///
/// Every transaction should open exactly one connection per target it
/// touched, and close all of them on completion.
///
/// # Errors
///
/// Returns an error if `config` has zero threads or targets.
pub fn stress_shared_transactions(config: &StressConfig) -> CoreResult<StressTestResult> {
    config.validate()?;
    let cache = Arc::new(ConnectionAffinityCache::new());
    let tm = TransactionManager::new();
    let driver = InMemoryDriver::new();
    let targets: Arc<Vec<String>> = Arc::new((0..config.targets).map(|t| format!("db{t}")).collect());

    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    for _ in 0..config.transactions {
        let txn = match tm.begin(TransactionOptions::default()) {
            Ok(txn) => txn,
            Err(_) => {
                failed.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };
        let barrier = Arc::new(Barrier::new(config.threads));

        let handles: Vec<_> = (0..config.threads)
            .map(|t| {
                let cache = Arc::clone(&cache);
                let driver = driver.clone();
                let txn = Arc::clone(&txn);
                let targets = Arc::clone(&targets);
                let barrier = Arc::clone(&barrier);
                let successful = Arc::clone(&successful);
                let failed = Arc::clone(&failed);
                let acquires = config.acquires_per_thread;

                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..acquires {
                        let target = &targets[(t + i) % targets.len()];
                        match cache.acquire(Some(&txn), target, &driver) {
                            Ok(lease) => match lease.release() {
                                Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
                                Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                            },
                            Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                        };
                    }
                })
            })
            .collect();

        for handle in handles {
            if handle.join().is_err() {
                failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        if txn.commit().is_err() {
            failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    Ok(StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        &driver,
        start.elapsed(),
    ))
}

/// Runs independent transactions concurrently, one per thread, all on the
/// same target.
///
/// # Errors
///
/// Returns an error if `config` has zero threads or targets.
pub fn stress_independent_transactions(config: &StressConfig) -> CoreResult<StressTestResult> {
    config.validate()?;
    let cache = Arc::new(ConnectionAffinityCache::new());
    let tm = Arc::new(TransactionManager::new());
    let driver = InMemoryDriver::new();
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let per_thread = config.transactions / config.threads;

    let start = Instant::now();
    let handles: Vec<_> = (0..config.threads)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let tm = Arc::clone(&tm);
            let driver = driver.clone();
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let acquires = config.acquires_per_thread;

            thread::spawn(move || {
                for _ in 0..per_thread {
                    let Ok(txn) = tm.begin(TransactionOptions::default()) else {
                        failed.fetch_add(1, Ordering::Relaxed);
                        continue;
                    };
                    let leases: Vec<_> = (0..acquires)
                        .filter_map(|_| cache.acquire(Some(&txn), "db", &driver).ok())
                        .collect();
                    let ok = leases.len() == acquires
                        && leases.iter().all(|l| l.shares_connection_with(&leases[0]));
                    drop(leases);

                    if ok && txn.commit().is_ok() {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        txn.abort("stress check failed");
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    Ok(StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        &driver,
        start.elapsed(),
    ))
}
