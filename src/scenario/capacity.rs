//! Capacity scenario: fill the governor, prove the next spawn is refused,
//! then drain and repeat with fire-and-forget workers.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};

use super::{await_and_reclaim, elapsed_ms, ensure_distinct_ids, ScenarioKind, ScenarioReport, SharedState};
use crate::error::HarnessError;
use crate::spawn::{spawn_with_retry, RetryPolicy, SpawnGovernor, ThreadId};
use crate::sync::futex::coarse_sleep;

#[derive(Debug, Clone)]
pub struct CapacityConfig {
    /// Atomic increments per worker once released.
    pub iterations: u64,
    pub wait_timeout: Duration,
    pub retry: RetryPolicy,
    /// How long each fire-and-forget worker keeps its slot.
    pub detached_hold: Duration,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            iterations: 30,
            wait_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            detached_hold: Duration::from_secs(2),
        }
    }
}

struct CapacityShared {
    flags: SharedState,
    counter: AtomicU64,
    iterations: u64,
    wait_timeout: Duration,
}

struct CapacityWorker {
    shared: Arc<CapacityShared>,
    slot: usize,
}

fn ready_flag(worker: &CapacityWorker) -> &AtomicU32 {
    &worker.shared.flags.flags(worker.slot).ready
}

fn capacity_worker(id: ThreadId, worker: Arc<CapacityWorker>) {
    let shared = &worker.shared;
    let flags = shared.flags.flags(worker.slot);

    flags.signal_ready();
    if let Err(e) = flags.await_proceed(shared.wait_timeout) {
        // Leave `done` unset so the spawner reports the stall.
        error!(thread_id = id.get(), error = %e, "Worker never released");
        return;
    }

    for _ in 0..shared.iterations {
        shared.counter.fetch_add(1, Ordering::SeqCst);
    }
    flags.signal_done();
}

fn noop_worker(_id: ThreadId, hold: Arc<Duration>) {
    coarse_sleep(*hold);
}

/// Run the capacity scenario against `governor`, which must start idle.
pub fn run(governor: &SpawnGovernor, config: &CapacityConfig) -> Result<ScenarioReport, HarnessError> {
    let start = Instant::now();
    let capacity = governor.max_threads();
    let shared = Arc::new(CapacityShared {
        flags: SharedState::new(capacity),
        counter: AtomicU64::new(0),
        iterations: config.iterations,
        wait_timeout: config.wait_timeout,
    });

    let mut handles = Vec::with_capacity(capacity);
    for slot in 0..capacity {
        let worker = Arc::new(CapacityWorker {
            shared: shared.clone(),
            slot,
        });
        match governor.spawn_and_await_ready(worker, capacity_worker, ready_flag, config.wait_timeout) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                release_all(&shared.flags);
                return Err(e);
            }
        }
    }

    let mut ids: Vec<i32> = handles.iter().map(|h| h.id().get()).collect();
    if let Err(e) = ensure_distinct_ids(&ids) {
        release_all(&shared.flags);
        return Err(e);
    }

    info!(live = governor.live(), "Attempt to create thread when not possible");
    let rejected_spawn = match governor.spawn(Arc::new(()), |_, _| {}) {
        Ok(unexpected) => {
            let id = unexpected.reclaim()?;
            release_all(&shared.flags);
            return Err(HarnessError::invariant(
                "spawn beyond capacity",
                "SpawnCapacityExceeded",
                format!("thread {id}"),
            ));
        }
        Err(e @ HarnessError::SpawnCapacityExceeded { .. }) => e.to_string(),
        Err(other) => {
            release_all(&shared.flags);
            return Err(other);
        }
    };

    info!("Unlock created threads");
    release_all(&shared.flags);
    await_and_reclaim(handles, &shared.flags, config.wait_timeout)?;

    let expected_total = capacity as u64 * config.iterations;
    let observed_total = shared.counter.load(Ordering::SeqCst);
    info!(observed_total, expected_total, "Value of count after update");

    info!("Create new threads without waiting for them to finish");
    let hold = Arc::new(config.detached_hold);
    let mut detached_ids = Vec::with_capacity(capacity);
    for _ in 0..capacity {
        let id = spawn_with_retry(governor, hold.clone(), noop_worker, &config.retry)?;
        detached_ids.push(id.get());
    }

    ids.extend_from_slice(&detached_ids);
    ensure_distinct_ids(&ids)?;
    ids.truncate(capacity);

    let report = ScenarioReport {
        scenario: ScenarioKind::Capacity,
        thread_ids: ids,
        detached_ids,
        rejected_spawn: Some(rejected_spawn),
        expected_total,
        observed_total,
        elapsed_ms: elapsed_ms(start),
    };
    report.verify()?;
    Ok(report)
}

fn release_all(flags: &SharedState) {
    for worker in flags.iter() {
        worker.signal_proceed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawn::SpawnGovernorConfig;

    fn quick_config() -> CapacityConfig {
        CapacityConfig {
            iterations: 5,
            wait_timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                max_attempts: 5,
                backoff: Duration::from_millis(20),
            },
            detached_hold: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_capacity_scenario_passes() {
        let governor = SpawnGovernor::new(SpawnGovernorConfig {
            max_threads: 3,
            ..Default::default()
        });
        let report = run(&governor, &quick_config()).unwrap();
        assert!(report.passed());
        assert_eq!(report.expected_total, 15);
        assert_eq!(report.thread_ids.len(), 3);
        assert_eq!(report.detached_ids.len(), 3);
        assert!(report.rejected_spawn.is_some());
        assert_eq!(governor.stats().rejected, 1);
    }
}
