use criterion::{criterion_group, criterion_main, Criterion, BenchmarkId, Throughput};
use worker_pool::pool::{WorkerPool, Config as PoolConfig};
use std::hint::black_box;

// Benchmark 1: Spawn overhead
fn bench_spawn_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_overhead");

    for size in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(size as u64));

        // one lock per task
        group.bench_with_input(
            BenchmarkId::new("spawn", size),
            &size,
            |b, &size| {
                let pool = WorkerPool::with_config(PoolConfig::cpu_bound()).unwrap();

                b.iter(|| {
                    let handles: Vec<_> = (0..size)
                        .map(|i| pool.spawn(move || black_box(i)).unwrap())
                        .collect();

                    for handle in handles {
                        black_box(handle.wait().unwrap());
                    }
                });
            },
        );

        // one lock per batch
        group.bench_with_input(
            BenchmarkId::new("spawn_batch", size),
            &size,
            |b, &size| {
                let pool = WorkerPool::with_config(PoolConfig::cpu_bound()).unwrap();

                b.iter(|| {
                    let handles = pool.spawn_batch(0..size, |i| black_box(i)).unwrap();
                    for handle in handles {
                        black_box(handle.wait().unwrap());
                    }
                });
            },
        );

        // std baseline
        group.bench_with_input(
            BenchmarkId::new("std_thread_spawn", size),
            &size,
            |b, &size| {
                b.iter(|| {
                    let handles: Vec<_> = (0..size.min(1000))
                        .map(|i| std::thread::spawn(move || black_box(i)))
                        .collect();

                    for handle in handles {
                        black_box(handle.join().unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

// Benchmark 2: Thread scaling for CPU-bound work
fn bench_thread_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("thread_scaling");
    group.sample_size(20);

    let tasks = 1000u64;
    group.throughput(Throughput::Elements(tasks));

    for threads in [1, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("threads", threads),
            &threads,
            |b, &threads| {
                let pool = WorkerPool::new(threads);

                b.iter(|| {
                    let handles = pool
                        .spawn_batch(0..tasks, |i| (0..1_000u64).fold(i, |acc, x| acc ^ x.wrapping_mul(31)))
                        .unwrap();
                    for handle in handles {
                        black_box(handle.wait().unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_spawn_overhead,
    bench_thread_scaling,
);

criterion_main!(benches);
