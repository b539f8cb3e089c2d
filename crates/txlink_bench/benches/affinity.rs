//! Affinity cache and batched execution benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use txlink_bench::{random_commands, random_target_order, targets, NullFactory};
use txlink_core::{
    CancellationToken, ConnectionAffinityCache, DbContext, QueryBatch, TransactionManager,
    TransactionOptions,
};

/// Benchmark repeated acquisition inside one transaction.
fn bench_acquire(c: &mut Criterion) {
    let mut group = c.benchmark_group("acquire");

    for target_count in [1, 2, 8].iter() {
        group.throughput(Throughput::Elements(100));
        group.bench_with_input(
            BenchmarkId::new("targets", target_count),
            target_count,
            |b, &target_count| {
                let cache = ConnectionAffinityCache::new();
                let tm = TransactionManager::new();
                let driver = NullFactory;
                let names = targets(target_count);
                let order = random_target_order(100, target_count);

                b.iter(|| {
                    let txn = tm.begin(TransactionOptions::default()).unwrap();
                    for &i in &order {
                        let lease = cache.acquire(Some(&txn), &names[i], &driver).unwrap();
                        black_box(lease.release().unwrap());
                    }
                    txn.commit().unwrap();
                });
            },
        );
    }

    group.bench_function("unshared", |b| {
        let cache = ConnectionAffinityCache::new();
        let driver = NullFactory;
        b.iter(|| {
            let lease = cache.acquire(None, "db", &driver).unwrap();
            black_box(lease.release().unwrap());
        });
    });
    group.finish();
}

/// Benchmark a full batched run through the context.
fn bench_commit_query_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_query_batch");

    for len in [50, 500, 5_000].iter() {
        group.throughput(Throughput::Elements(*len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), len, |b, &len| {
            let db = DbContext::new("db", NullFactory)
                .with_cache(Arc::new(ConnectionAffinityCache::new()))
                .with_transactions(Arc::new(TransactionManager::new()));
            let batch: QueryBatch = random_commands(len).into_iter().collect();
            let cancel = CancellationToken::new();

            b.iter(|| {
                let affected = db.commit_query_batch(black_box(&batch), 0, None, &cancel).unwrap();
                black_box(affected);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_acquire, bench_commit_query_batch);
criterion_main!(benches);
