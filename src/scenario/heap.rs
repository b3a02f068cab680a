//! Heap scenario: workers share a heap-allocated counter and each publish
//! a freshly boxed value the main thread reads back after they finish.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::{await_and_reclaim, elapsed_ms, ensure_distinct_ids, ScenarioKind, ScenarioReport, SharedState};
use crate::error::HarnessError;
use crate::spawn::{SpawnGovernor, ThreadId};
use crate::sync::WordMutex;

#[derive(Debug, Clone)]
pub struct HeapConfig {
    pub threads: usize,
    pub iterations: u64,
    pub wait_timeout: Duration,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            threads: 5,
            iterations: 30,
            wait_timeout: Duration::from_secs(10),
        }
    }
}

struct HeapShared {
    flags: SharedState,
    published: Box<[WordMutex<Option<Box<usize>>>]>,
}

struct HeapWorker {
    shared: Arc<HeapShared>,
    count: Arc<AtomicU64>,
    iterations: u64,
    slot: usize,
}

fn heap_worker(_id: ThreadId, worker: Arc<HeapWorker>) {
    for _ in 0..worker.iterations {
        worker.count.fetch_add(1, Ordering::SeqCst);
    }
    *worker.shared.published[worker.slot].lock() = Some(Box::new(worker.slot));
    worker.shared.flags.flags(worker.slot).signal_done();
}

pub fn run(governor: &SpawnGovernor, config: &HeapConfig) -> Result<ScenarioReport, HarnessError> {
    if config.threads > governor.max_threads() {
        return Err(HarnessError::InvalidConfig(format!(
            "heap scenario needs {} threads but capacity is {}",
            config.threads,
            governor.max_threads()
        )));
    }

    let start = Instant::now();
    let count = Arc::new(AtomicU64::new(0));
    let shared = Arc::new(HeapShared {
        flags: SharedState::new(config.threads),
        published: (0..config.threads).map(|_| WordMutex::new(None)).collect(),
    });

    let mut handles = Vec::with_capacity(config.threads);
    for slot in 0..config.threads {
        let worker = Arc::new(HeapWorker {
            shared: shared.clone(),
            count: count.clone(),
            iterations: config.iterations,
            slot,
        });
        handles.push(governor.spawn(worker, heap_worker)?);
    }

    info!(threads = config.threads, "Wait for threads to finish");
    let ids = await_and_reclaim(handles, &shared.flags, config.wait_timeout)?;
    ensure_distinct_ids(&ids)?;

    let report = ScenarioReport {
        scenario: ScenarioKind::Heap,
        thread_ids: ids,
        detached_ids: Vec::new(),
        rejected_spawn: None,
        expected_total: config.threads as u64 * config.iterations,
        observed_total: count.load(Ordering::SeqCst),
        elapsed_ms: elapsed_ms(start),
    };
    report.verify()?;

    for (slot, cell) in shared.published.iter().enumerate() {
        match cell.lock().take() {
            Some(value) if *value == slot => debug!(slot, value = *value, "Published value"),
            Some(value) => return Err(HarnessError::invariant(format!("published value {slot}"), slot, *value)),
            None => return Err(HarnessError::invariant(format!("published value {slot}"), slot, "nothing")),
        }
    }

    Ok(report)
}
