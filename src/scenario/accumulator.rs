//! Mutex scenario: many workers bump one counter through [`Accumulator`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info};

use super::{await_and_reclaim, elapsed_ms, ensure_distinct_ids, ScenarioKind, ScenarioReport, SharedState};
use crate::error::HarnessError;
use crate::spawn::{SpawnGovernor, ThreadId};
use crate::sync::{Accumulator, MutexStats};

#[derive(Debug, Clone)]
pub struct MutexConfig {
    pub threads: usize,
    /// Locked increments per worker.
    pub iterations: u64,
    pub wait_timeout: Duration,
}

impl Default for MutexConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            iterations: 10,
            wait_timeout: Duration::from_secs(10),
        }
    }
}

struct MutexShared {
    flags: SharedState,
    accumulator: Accumulator,
    iterations: u64,
}

struct MutexWorker {
    shared: Arc<MutexShared>,
    slot: usize,
}

fn mutex_worker(_id: ThreadId, worker: Arc<MutexWorker>) {
    let shared = &worker.shared;
    for _ in 0..shared.iterations {
        shared.accumulator.increment();
    }
    shared.flags.flags(worker.slot).signal_done();
}

/// Run one round and return its report along with the lock's counters.
pub fn run_with_stats(
    governor: &SpawnGovernor,
    config: &MutexConfig,
) -> Result<(ScenarioReport, MutexStats), HarnessError> {
    if config.threads > governor.max_threads() {
        return Err(HarnessError::InvalidConfig(format!(
            "mutex scenario needs {} threads but capacity is {}",
            config.threads,
            governor.max_threads()
        )));
    }

    let start = Instant::now();
    let shared = Arc::new(MutexShared {
        flags: SharedState::new(config.threads),
        accumulator: Accumulator::new(),
        iterations: config.iterations,
    });

    let mut handles = Vec::with_capacity(config.threads);
    for slot in 0..config.threads {
        let worker = Arc::new(MutexWorker {
            shared: shared.clone(),
            slot,
        });
        handles.push(governor.spawn(worker, mutex_worker)?);
    }

    info!(threads = config.threads, "Wait for threads to finish");
    let ids = await_and_reclaim(handles, &shared.flags, config.wait_timeout)?;
    ensure_distinct_ids(&ids)?;

    let stats = shared.accumulator.lock_stats();
    let report = ScenarioReport {
        scenario: ScenarioKind::Mutex,
        thread_ids: ids,
        detached_ids: Vec::new(),
        rejected_spawn: None,
        expected_total: config.threads as u64 * config.iterations,
        observed_total: shared.accumulator.value(),
        elapsed_ms: elapsed_ms(start),
    };
    info!(
        observed_total = report.observed_total,
        contended = stats.contended_acquisitions,
        "Value of count after update"
    );
    report.verify()?;
    Ok((report, stats))
}

pub fn run(governor: &SpawnGovernor, config: &MutexConfig) -> Result<ScenarioReport, HarnessError> {
    run_with_stats(governor, config).map(|(report, _)| report)
}

/// Repeat the scenario `rounds` times with random thread and iteration
/// counts drawn from `1..=max_threads` and `1..=config.iterations`.
pub fn run_randomized<R: Rng + ?Sized>(
    governor: &SpawnGovernor,
    config: &MutexConfig,
    rounds: usize,
    rng: &mut R,
) -> Result<Vec<ScenarioReport>, HarnessError> {
    let max_threads = governor.max_threads().max(1);
    let max_iterations = config.iterations.max(1);
    let mut reports = Vec::with_capacity(rounds);

    for round in 0..rounds {
        let round_config = MutexConfig {
            threads: rng.gen_range(1..=max_threads),
            iterations: rng.gen_range(1..=max_iterations),
            wait_timeout: config.wait_timeout,
        };
        debug!(
            round,
            threads = round_config.threads,
            iterations = round_config.iterations,
            "Randomized mutex round"
        );
        reports.push(run(governor, &round_config)?);
    }
    Ok(reports)
}
