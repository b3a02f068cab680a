//! Synchronization primitive benchmarks.
//!
//! Measures the uncontended fast paths and a contended accumulator.

use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use thread_harness::sync::{atomic_notify32, atomic_wait32, Accumulator, Semaphore, WordMutex};

fn bench_wait_notify(c: &mut Criterion) {
    let mut group = c.benchmark_group("futex");
    let word = AtomicU32::new(1);

    group.throughput(Throughput::Elements(1));
    group.bench_function("wait_value_mismatch", |b| {
        b.iter(|| atomic_wait32(black_box(&word), 0, 0))
    });
    group.bench_function("notify_no_waiters", |b| {
        b.iter(|| atomic_notify32(black_box(&word), 1))
    });

    group.finish();
}

fn bench_uncontended(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended");
    let mutex = WordMutex::new(0u64);
    let sem = Semaphore::new(0);

    group.throughput(Throughput::Elements(1));
    group.bench_function("mutex_lock_unlock", |b| {
        b.iter(|| {
            *mutex.lock() += 1;
        })
    });
    group.bench_function("semaphore_post_try_wait", |b| {
        b.iter(|| {
            sem.post();
            black_box(sem.try_wait())
        })
    });

    group.finish();
}

fn bench_contended_accumulator(c: &mut Criterion) {
    let mut group = c.benchmark_group("accumulator_contended");
    const ITERATIONS: u64 = 1_000;

    for threads in [1usize, 2, 4, 8] {
        group.throughput(Throughput::Elements(threads as u64 * ITERATIONS));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let acc = Arc::new(Accumulator::new());
                let workers: Vec<_> = (0..threads)
                    .map(|_| {
                        let acc = acc.clone();
                        thread::spawn(move || {
                            for _ in 0..ITERATIONS {
                                acc.increment();
                            }
                        })
                    })
                    .collect();
                for w in workers {
                    let _ = w.join();
                }
                black_box(acc.value())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_wait_notify, bench_uncontended, bench_contended_accumulator);
criterion_main!(benches);
