//! Connection affinity across transactions, targets and threads.

mod common;

use common::{FlakyFactory, Harness, SlowFactory};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use txlink_core::{
    ConnectionAffinityCache, CoreError, RegistryState, ScopeOption, TransactionManager,
    TransactionOptions,
};
use txlink_driver::InMemoryDriver;

#[test]
fn concurrent_acquires_share_one_connection() {
    const THREADS: usize = 16;

    let cache = Arc::new(ConnectionAffinityCache::new());
    let tm = TransactionManager::new();
    let driver = InMemoryDriver::new();
    let factory = Arc::new(SlowFactory {
        driver: driver.clone(),
        delay: Duration::from_millis(5),
    });
    let txn = tm.begin(TransactionOptions::default()).unwrap();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let factory = Arc::clone(&factory);
            let txn = Arc::clone(&txn);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.acquire(Some(&txn), "db", factory.as_ref()).unwrap()
            })
        })
        .collect();
    let leases: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(driver.opened_count("db"), 1);
    assert!(leases.iter().all(|l| l.shares_connection_with(&leases[0])));
    // One reference per lease plus the registry's own.
    assert_eq!(leases[0].handle().use_count(), THREADS + 1);

    for lease in leases {
        assert!(!lease.release().unwrap());
    }
    txn.commit().unwrap();
    assert_eq!(driver.closed_count("db"), 1);
}

#[test]
fn concurrent_transactions_stay_isolated() {
    const THREADS: usize = 8;

    let cache = Arc::new(ConnectionAffinityCache::new());
    let tm = Arc::new(TransactionManager::new());
    let driver = InMemoryDriver::new();

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let tm = Arc::clone(&tm);
            let driver = driver.clone();
            thread::spawn(move || {
                let txn = tm.begin(TransactionOptions::default()).unwrap();
                let a = cache.acquire(Some(&txn), "db", &driver).unwrap();
                let b = cache.acquire(Some(&txn), "db", &driver).unwrap();
                assert!(a.shares_connection_with(&b));
                drop(a);
                drop(b);
                txn.commit().unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(driver.opened_count("db"), THREADS);
    assert_eq!(driver.closed_count("db"), THREADS);
    assert_eq!(cache.registry_count(), 0);
    assert_eq!(cache.stats().registries_completed, THREADS as u64);
}

#[test]
fn close_happens_once_after_last_release() {
    let h = Harness::new();
    let db = h.context("db");
    let txn = db.begin().unwrap();

    let leases: Vec<_> = (0..5)
        .map(|_| db.acquire_connection(Some(&txn)).unwrap())
        .collect();
    let extra = Arc::clone(leases[0].handle());
    extra.retain();

    txn.commit().unwrap();
    for lease in leases {
        lease.release().unwrap();
    }
    assert_eq!(h.driver.closed_count("db"), 0);

    assert!(extra.release().unwrap());
    assert_eq!(h.driver.closed_count("db"), 1);
    assert!(extra.release().is_err());
    assert_eq!(h.driver.closed_count("db"), 1);
}

#[test]
fn registry_shape_follows_targets() {
    let h = Harness::new();
    let a = h.context("A");
    let b = h.context("B");
    let c = h.context("C");
    let txn = a.begin().unwrap();
    let id = txn.id();

    let first = a.acquire_connection(Some(&txn)).unwrap();
    assert_eq!(h.cache.registry_state(id), Some(RegistryState::Single("A".into())));

    let _b = b.acquire_connection(Some(&txn)).unwrap();
    assert_eq!(
        h.cache.registry_state(id),
        Some(RegistryState::Multi(vec!["A".into(), "B".into()]))
    );

    let _c = c.acquire_connection(Some(&txn)).unwrap();
    assert_eq!(
        h.cache.registry_state(id),
        Some(RegistryState::Multi(vec!["A".into(), "B".into(), "C".into()]))
    );

    let again = a.acquire_connection(Some(&txn)).unwrap();
    assert!(first.shares_connection_with(&again));
    assert_eq!(h.driver.total_opened(), 3);
}

#[test]
fn aborted_transaction_never_opens() {
    let h = Harness::new();
    let db = h.context("db");
    let txn = db.begin().unwrap();
    txn.abort("rolled back by caller");

    for _ in 0..3 {
        let result = db.acquire_connection(Some(&txn));
        assert!(matches!(result, Err(CoreError::TransactionAborted { .. })));
    }
    assert_eq!(h.driver.total_opened(), 0);
}

#[test]
fn suppressed_scope_gets_unshared_connections() {
    let h = Harness::new();
    let db = h.context("db");
    let outer = db.begin_scope(ScopeOption::Required, None).unwrap();
    let suppressed = db
        .begin_scope(ScopeOption::Suppress, outer.transaction())
        .unwrap();

    let a = db.acquire_connection(suppressed.transaction()).unwrap();
    let b = db.acquire_connection(suppressed.transaction()).unwrap();
    assert!(!a.shares_connection_with(&b));
    assert_eq!(h.cache.registry_count(), 0);

    drop(a);
    drop(b);
    suppressed.complete().unwrap();
    outer.complete().unwrap();
    assert_eq!(h.driver.closed_count("db"), 2);
}

#[test]
fn requires_new_gets_its_own_connection() {
    let h = Harness::new();
    let db = h.context("db");
    let outer = db.begin_scope(ScopeOption::Required, None).unwrap();
    let inner = db
        .begin_scope(ScopeOption::RequiresNew, outer.transaction())
        .unwrap();

    let a = db.acquire_connection(outer.transaction()).unwrap();
    let b = db.acquire_connection(inner.transaction()).unwrap();
    assert!(!a.shares_connection_with(&b));

    drop(b);
    inner.complete().unwrap();
    assert_eq!(h.driver.closed_count("db"), 1);

    drop(a);
    outer.complete().unwrap();
    assert_eq!(h.driver.closed_count("db"), 2);
}

#[test]
fn cleanup_failure_does_not_block_siblings() {
    let h = Harness::new();
    h.driver.fail_close(true);
    let txn = h.transactions.begin(TransactionOptions::default()).unwrap();

    for target in ["A", "B", "C", "D"] {
        let lease = h.cache.acquire(Some(&txn), target, &h.driver).unwrap();
        assert!(!lease.release().unwrap());
    }
    txn.commit().unwrap();

    assert_eq!(h.driver.total_closed(), 4);
    assert_eq!(h.cache.stats().cleanup_failures, 4);
    assert_eq!(h.cache.registry_count(), 0);
}

#[test]
fn expired_transaction_releases_connections() {
    let h = Harness::new();
    let txn = h
        .transactions
        .begin(TransactionOptions::default().timeout(Duration::ZERO))
        .unwrap();
    let lease = h.cache.acquire(Some(&txn), "db", &h.driver).unwrap();
    lease.release().unwrap();

    thread::sleep(Duration::from_millis(2));
    assert!(matches!(txn.commit(), Err(CoreError::TransactionAborted { .. })));
    assert_eq!(h.driver.closed_count("db"), 1);
    assert_eq!(h.transactions.aborted_count(), 1);
}

#[test]
fn waiter_behind_failed_first_open_keeps_affinity() {
    let cache = Arc::new(ConnectionAffinityCache::new());
    let tm = TransactionManager::new();
    let txn = tm.begin(TransactionOptions::default()).unwrap();
    let factory = Arc::new(FlakyFactory {
        driver: InMemoryDriver::new(),
        delay: Duration::from_millis(50),
        failed: Default::default(),
    });

    let failing = {
        let (cache, txn, factory) = (Arc::clone(&cache), Arc::clone(&txn), Arc::clone(&factory));
        thread::spawn(move || cache.acquire(Some(&txn), "db", &*factory).map(|_| ()))
    };
    thread::sleep(Duration::from_millis(10));
    let waiting = {
        let (cache, txn, factory) = (Arc::clone(&cache), Arc::clone(&txn), Arc::clone(&factory));
        thread::spawn(move || cache.acquire(Some(&txn), "db", &*factory).unwrap())
    };

    assert!(matches!(
        failing.join().unwrap(),
        Err(CoreError::ConnectionOpenFailed { .. })
    ));
    let lease = waiting.join().unwrap();
    let again = cache.acquire(Some(&txn), "db", &*factory).unwrap();

    assert!(lease.shares_connection_with(&again));
    assert_eq!(factory.driver.opened_count("db"), 1);
    assert_eq!(cache.registry_count(), 1);

    drop(lease);
    drop(again);
    txn.commit().unwrap();
    assert_eq!(factory.driver.closed_count("db"), 1);
}

#[test]
fn dropped_transaction_closes_its_connection() {
    let h = Harness::new();
    let txn = h.transactions.begin(TransactionOptions::default()).unwrap();
    let lease = h.cache.acquire(Some(&txn), "db", &h.driver).unwrap();
    lease.release().unwrap();

    drop(txn);

    assert_eq!(h.driver.opened_count("db"), 1);
    assert_eq!(h.driver.closed_count("db"), 1);
    assert_eq!(h.cache.registry_count(), 0);
    assert_eq!(h.transactions.active_count(), 0);
    assert_eq!(h.transactions.aborted_count(), 1);
}

#[test]
fn early_return_after_begin_does_not_leak() {
    fn work(db: &txlink_core::DbContext) -> Result<(), CoreError> {
        let txn = db.begin()?;
        let _lease = db.acquire_connection(Some(&txn))?;
        Err(CoreError::invalid_operation("bail out"))
    }

    let h = Harness::new();
    let db = h.context("db");
    assert!(work(&db).is_err());

    assert_eq!(h.driver.closed_count("db"), 1);
    assert_eq!(h.cache.registry_count(), 0);
}
