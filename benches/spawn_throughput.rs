//! Spawn governor benchmarks.

use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use thread_harness::scenario::{self, MutexConfig};
use thread_harness::spawn::{SpawnGovernor, SpawnGovernorConfig};
use thread_harness::sync::{await_nonzero, signal};

fn bench_spawn_reclaim(c: &mut Criterion) {
    let governor = SpawnGovernor::new(SpawnGovernorConfig::default());

    c.bench_function("spawn_await_reclaim", |b| {
        b.iter(|| {
            let done = Arc::new(AtomicU32::new(0));
            let handle = governor
                .spawn(done.clone(), |_, done| {
                    signal(&done);
                })
                .expect("spawn");
            await_nonzero(&done, "done", Duration::from_secs(5)).expect("worker finished");
            black_box(handle.reclaim().expect("reclaim"))
        })
    });
}

fn bench_rejected_spawn(c: &mut Criterion) {
    let governor = SpawnGovernor::new(SpawnGovernorConfig {
        max_threads: 0,
        ..Default::default()
    });

    c.bench_function("spawn_rejected_at_capacity", |b| {
        b.iter(|| black_box(governor.spawn(Arc::new(()), |_, _| {}).is_err()))
    });
}

fn bench_mutex_scenario(c: &mut Criterion) {
    let governor = SpawnGovernor::new(SpawnGovernorConfig::default());
    let config = MutexConfig::default();

    c.bench_function("mutex_scenario_default", |b| {
        b.iter(|| black_box(scenario::accumulator::run(&governor, &config).expect("scenario")))
    });
}

criterion_group!(benches, bench_spawn_reclaim, bench_rejected_spawn, bench_mutex_scenario);
criterion_main!(benches);
