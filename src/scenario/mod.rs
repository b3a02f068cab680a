//! Harness scenarios.
//!
//! Each scenario owns its shared state explicitly, hands it to every
//! worker through an argument block, and verifies its invariants before
//! returning a [`ScenarioReport`].

pub mod accumulator;
pub mod capacity;
pub mod heap;
pub mod shared;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::error::HarnessError;
use crate::spawn::ThreadHandle;

pub use accumulator::MutexConfig;
pub use capacity::CapacityConfig;
pub use heap::HeapConfig;
pub use shared::{SharedState, WorkerFlags};

/// Scenarios that complete normally (termination runs end the process).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioKind {
    Capacity,
    Mutex,
    Heap,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 3] = [Self::Capacity, Self::Mutex, Self::Heap];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Capacity => "capacity",
            Self::Mutex => "mutex",
            Self::Heap => "heap",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| HarnessError::InvalidConfig(format!("unknown scenario: {s}")))
    }
}

/// Outcome of a completed scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: ScenarioKind,
    /// Ids of joined workers, in spawn order.
    pub thread_ids: Vec<i32>,
    /// Ids of fire-and-forget workers.
    pub detached_ids: Vec<i32>,
    /// Error returned by the spawn attempted beyond capacity, if any.
    pub rejected_spawn: Option<String>,
    pub expected_total: u64,
    pub observed_total: u64,
    pub elapsed_ms: u64,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.expected_total == self.observed_total
    }

    pub fn verify(&self) -> Result<(), HarnessError> {
        if self.passed() {
            Ok(())
        } else {
            Err(HarnessError::invariant(
                format!("{} final count", self.scenario),
                self.expected_total,
                self.observed_total,
            ))
        }
    }
}

/// Every id strictly positive and pairwise distinct.
pub(crate) fn ensure_distinct_ids(ids: &[i32]) -> Result<(), HarnessError> {
    let mut seen = HashSet::with_capacity(ids.len());
    for &id in ids {
        if id <= 0 {
            return Err(HarnessError::invariant("thread id sign", "> 0", id));
        }
        if !seen.insert(id) {
            return Err(HarnessError::DuplicateIdentifier(id));
        }
    }
    Ok(())
}

/// Wait for each worker's `done` flag, then reclaim it. Handle `i` owns slot `i`.
pub(crate) fn await_and_reclaim<A>(
    handles: Vec<ThreadHandle<A>>,
    state: &SharedState,
    timeout: Duration,
) -> Result<Vec<i32>, HarnessError> {
    let mut ids = Vec::with_capacity(handles.len());
    for (slot, handle) in handles.into_iter().enumerate() {
        state.flags(slot).await_done(timeout)?;
        ids.push(handle.reclaim()?.get());
    }
    debug!(reclaimed = ids.len(), "All workers reclaimed");
    Ok(ids)
}

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
