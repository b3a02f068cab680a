//! Thread Harness
//!
//! A conformance harness for OS-thread spawning, futex-style wait/notify and
//! whole-process termination semantics.
//!
//! # Layers
//!
//! - [`sync`]: wait/notify on 32-bit words, and the mutex, semaphore and
//!   rendezvous built on it
//! - [`spawn`]: capacity-bounded worker creation with positive, unique ids
//!   and fire-and-forget spawning with bounded retry
//! - [`scenario`]: capacity, mutex and heap scenarios that check their own
//!   invariants
//! - [`termination`]: rendezvous followed by a trap or status-coded exit that
//!   ends every thread at once
//!
//! Every scenario builds its own governor and shared state; nothing about a
//! run lives in module-level globals except the futex wait table.

pub mod cli;
pub mod config;
pub mod error;
pub mod scenario;
pub mod spawn;
pub mod sync;
pub mod telemetry;
pub mod termination;

use std::convert::Infallible;

use tracing::{error, info};

pub use config::HarnessConfig;
pub use error::HarnessError;
pub use scenario::{ScenarioKind, ScenarioReport};

use spawn::SpawnGovernor;
use telemetry::{ScenarioSpan, SpanExt};
use termination::{BlockingTask, Initiator, TerminationMode};

/// Entry point tying configuration, governors and scenarios together.
#[derive(Debug, Clone, Default)]
pub struct Harness {
    config: HarnessConfig,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Harness configured from `THREAD_HARNESS_*` environment variables.
    pub fn from_env() -> Self {
        Self::new(config::load())
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// A fresh, idle governor. Scenarios never share one, so detached
    /// workers from an earlier run cannot hold slots in a later one.
    pub fn governor(&self) -> SpawnGovernor {
        SpawnGovernor::new(self.config.governor.clone())
    }

    /// Run one scenario inside its own span.
    pub fn run_scenario(&self, kind: ScenarioKind) -> Result<ScenarioReport, HarnessError> {
        let governor = self.governor();
        let span = ScenarioSpan::new(kind, governor.max_threads());
        let _enter = span.enter();
        info!("Scenario started");

        let result = match kind {
            ScenarioKind::Capacity => scenario::capacity::run(&governor, &self.config.capacity),
            ScenarioKind::Mutex => scenario::accumulator::run(&governor, &self.config.mutex),
            ScenarioKind::Heap => scenario::heap::run(&governor, &self.config.heap),
        };

        span.record_result(&result);
        match &result {
            Ok(report) => {
                span.record_report(report);
                info!(stats = ?governor.stats(), "Scenario passed");
            }
            Err(e) => error!(error = %e, "Scenario failed"),
        }
        result
    }

    /// Run every scenario in order, stopping after the first failure.
    pub fn run_all(&self) -> Vec<Result<ScenarioReport, HarnessError>> {
        let mut results = Vec::with_capacity(ScenarioKind::ALL.len());
        for kind in ScenarioKind::ALL {
            let result = self.run_scenario(kind);
            let failed = result.is_err();
            results.push(result);
            if failed {
                break;
            }
        }
        results
    }

    /// Run a termination scenario. Returns only if setup fails; otherwise
    /// the process ends with the mode's status.
    pub fn terminate(
        &self,
        mode: TerminationMode,
        initiator: Initiator,
        task: BlockingTask,
    ) -> Result<Infallible, HarnessError> {
        let plan = self.config.termination.plan(mode, initiator, task);
        let span = ScenarioSpan::termination(mode.as_str(), initiator.as_str(), task.as_str());
        let _enter = span.enter();
        termination::run(&self.governor(), &plan)
    }
}
