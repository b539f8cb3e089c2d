//! Batch partitioning benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use txlink_bench::random_commands;
use txlink_core::{assign_batches, partition};

/// Benchmark batch number assignment alone.
fn bench_assign(c: &mut Criterion) {
    let mut group = c.benchmark_group("assign_batches");

    for len in [50, 1_000, 100_000].iter() {
        group.throughput(Throughput::Elements(*len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), len, |b, &len| {
            b.iter(|| {
                let result = assign_batches(black_box(len), black_box(50)).unwrap();
                black_box(result);
            });
        });
    }
    group.finish();
}

/// Benchmark partitioning real commands at several batch sizes.
fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");
    let commands = random_commands(10_000);
    group.throughput(Throughput::Elements(commands.len() as u64));

    for batch_size in [10, 50, 500].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                b.iter(|| {
                    let batches = partition(black_box(commands.clone()), batch_size).unwrap();
                    black_box(batches);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_assign, bench_partition);
criterion_main!(benches);
