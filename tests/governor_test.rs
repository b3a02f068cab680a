//! TDD-Light tests for the spawn governor and thread handles.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thread_harness::spawn::{SpawnGovernor, SpawnGovernorConfig, StackOwnership, ThreadState};
use thread_harness::sync::{await_nonzero, signal};
use thread_harness::HarnessError;

#[derive(Default)]
struct Gate {
    ready: AtomicU32,
    release: AtomicU32,
    done: AtomicU32,
}

fn gated_worker(_id: thread_harness::spawn::ThreadId, gate: Arc<Gate>) {
    signal(&gate.ready);
    await_nonzero(&gate.release, "release", Duration::from_secs(10)).unwrap();
    signal(&gate.done);
}

fn ready_of(gate: &Gate) -> &AtomicU32 {
    &gate.ready
}

fn governor(max_threads: usize) -> SpawnGovernor {
    SpawnGovernor::new(SpawnGovernorConfig {
        max_threads,
        ..Default::default()
    })
}

#[test]
fn capacity_spawns_succeed_then_next_is_rejected() {
    let gov = governor(5);
    let gates: Vec<Arc<Gate>> = (0..5).map(|_| Arc::new(Gate::default())).collect();

    let handles: Vec<_> = gates
        .iter()
        .map(|g| {
            gov.spawn_and_await_ready(g.clone(), gated_worker, ready_of, Duration::from_secs(5))
                .unwrap()
        })
        .collect();

    let mut ids: Vec<i32> = handles.iter().map(|h| h.id().get()).collect();
    assert!(ids.iter().all(|&id| id > 0));
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 5, "ids must be distinct");
    assert_eq!(gov.live(), 5);

    let extra = gov.spawn(Arc::new(Gate::default()), gated_worker);
    let err = extra.unwrap_err();
    assert!(matches!(err, HarnessError::SpawnCapacityExceeded { live: 5, max: 5 }));
    assert!(err.spawn_sentinel() < 0);

    for g in &gates {
        signal(&g.release);
    }
    for (h, g) in handles.into_iter().zip(&gates) {
        await_nonzero(&g.done, "done", Duration::from_secs(5)).unwrap();
        h.reclaim().unwrap();
    }
    assert_eq!(gov.live(), 0);
}

#[test]
fn handle_tracks_lifecycle_and_ownership() {
    let gov = governor(1);
    let gate = Arc::new(Gate::default());
    let handle = gov
        .spawn_and_await_ready(gate.clone(), gated_worker, ready_of, Duration::from_secs(5))
        .unwrap();

    assert_eq!(handle.state(), ThreadState::ReadySignaled);
    assert_eq!(handle.ownership(), StackOwnership::OwnedPendingJoin);
    assert_eq!(handle.stack_len(), 128);
    assert!(Arc::ptr_eq(handle.argument().unwrap(), &gate));

    signal(&gate.release);
    await_nonzero(&gate.done, "done", Duration::from_secs(5)).unwrap();
    let id = handle.reclaim().unwrap();
    assert!(id.get() > 0);
}

#[test]
fn slot_is_released_when_worker_returns() {
    let gov = governor(1);
    for _ in 0..3 {
        let finished = Arc::new(AtomicU32::new(0));
        let handle = gov
            .spawn(finished.clone(), |_, flag| {
                signal(&flag);
            })
            .unwrap();
        await_nonzero(&finished, "finished", Duration::from_secs(5)).unwrap();
        handle.reclaim().unwrap();
        assert_eq!(gov.live(), 0);
    }
    assert_eq!(gov.stats().spawned, 3);
    assert_eq!(gov.stats().peak_live, 1);
    assert_eq!(gov.issued_ids(), vec![1, 2, 3]);
}

#[test]
fn ready_timeout_is_reported() {
    let gov = governor(1);
    let gate = Arc::new(Gate::default());
    // Worker never signals ready; it just waits for release.
    let result = gov.spawn_and_await_ready(
        gate.clone(),
        |_, gate: Arc<Gate>| {
            await_nonzero(&gate.release, "release", Duration::from_secs(10)).ok();
        },
        ready_of,
        Duration::from_millis(30),
    );
    assert!(matches!(result, Err(HarnessError::WaitTimedOut { .. })));
    signal(&gate.release);
}

#[test]
fn entry_receives_the_same_argument_block() {
    let gov = governor(2);
    let block = Arc::new(AtomicU32::new(0));
    let handle = gov
        .spawn(block.clone(), |id, block| {
            block.store(id.get() as u32, Ordering::SeqCst);
        })
        .unwrap();
    let id = handle.id();
    assert_eq!(handle.reclaim().unwrap(), id);
    assert_eq!(block.load(Ordering::SeqCst), id.get() as u32);
}
