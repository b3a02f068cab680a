//! Process-wide termination coordination.
//!
//! A set of participants (spawned workers plus the main thread) rendezvous
//! before exactly one of them ends the whole process, either with a
//! fault-like trap or with a status-coded exit. Every other participant is
//! parked in a long-running blocking task at that moment; if it ever
//! resumes, it hits [`unreachable_checkpoint`] and the run is reported as a
//! violation through [`UNREACHABLE_STATUS`].

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info};

use crate::error::HarnessError;
use crate::spawn::{SpawnGovernor, ThreadId};
use crate::sync::futex::coarse_sleep;
use crate::sync::Rendezvous;

/// Exit status reported when a participant resumes after termination began.
pub const UNREACHABLE_STATUS: i32 = 86;
/// Exit status reported when the rendezvous itself times out.
pub const RENDEZVOUS_FAILURE_STATUS: i32 = 3;
/// Marker written to stderr by [`unreachable_checkpoint`].
pub const UNREACHABLE_MARKER: &str = "UNREACHABLE CHECKPOINT REACHED";

/// Interchangeable ways of keeping a participant suspended, not finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlockingTask {
    BusyWait,
    AtomicWait,
    Sleep,
}

impl BlockingTask {
    pub const ALL: [BlockingTask; 3] = [Self::BusyWait, Self::AtomicWait, Self::Sleep];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BusyWait => "busy-wait",
            Self::AtomicWait => "atomic-wait",
            Self::Sleep => "sleep",
        }
    }

    /// Block the calling thread for at most `duration`.
    pub fn run(self, duration: Duration) {
        match self {
            Self::BusyWait => {
                let deadline = Instant::now() + duration;
                while Instant::now() < deadline {
                    std::hint::spin_loop();
                }
            }
            Self::AtomicWait => coarse_sleep(duration),
            Self::Sleep => std::thread::sleep(duration),
        }
    }
}

impl fmt::Display for BlockingTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockingTask {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "busy-wait" | "busy" => Ok(Self::BusyWait),
            "atomic-wait" | "atomic" => Ok(Self::AtomicWait),
            "sleep" => Ok(Self::Sleep),
            other => Err(HarnessError::InvalidConfig(format!("unknown blocking task: {other}"))),
        }
    }
}

/// How the coordinator ends the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TerminationMode {
    /// Fault-like abort; no status code is observable.
    Trap,
    /// Graceful exit with a caller-chosen status.
    Exit { status: i32 },
}

impl TerminationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trap => "trap",
            Self::Exit { .. } => "exit",
        }
    }

    /// Parse `trap` or `exit`; `exit` uses `exit_status`.
    pub fn parse(s: &str, exit_status: i32) -> Result<Self, HarnessError> {
        match s {
            "trap" => Ok(Self::Trap),
            "exit" => Ok(Self::Exit {
                status: exit_status,
            }),
            other => Err(HarnessError::InvalidConfig(format!("unknown termination mode: {other}"))),
        }
    }

    /// End the whole process, all threads included. Never returns.
    pub fn execute(self) -> ! {
        match self {
            Self::Trap => std::process::abort(),
            Self::Exit { status } => std::process::exit(status),
        }
    }
}

/// Which participant performs the termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Initiator {
    /// The first spawned worker.
    Worker,
    MainThread,
}

impl Initiator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::MainThread => "main",
        }
    }
}

impl FromStr for Initiator {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "worker" => Ok(Self::Worker),
            "main" | "main-thread" => Ok(Self::MainThread),
            other => Err(HarnessError::InvalidConfig(format!("unknown initiator: {other}"))),
        }
    }
}

/// Tunables shared by every termination run.
#[derive(Debug, Clone)]
pub struct TerminationConfig {
    /// Workers spawned besides the main thread.
    pub workers: usize,
    pub exit_status: i32,
    /// Upper bound on each blocking task.
    pub blocking_timeout: Duration,
    pub rendezvous_timeout: Duration,
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            exit_status: 33,
            blocking_timeout: Duration::from_secs(10),
            rendezvous_timeout: Duration::from_secs(10),
        }
    }
}

impl TerminationConfig {
    pub fn plan(&self, mode: TerminationMode, initiator: Initiator, task: BlockingTask) -> TerminationPlan {
        TerminationPlan {
            mode,
            initiator,
            task,
            workers: self.workers,
            blocking_timeout: self.blocking_timeout,
            rendezvous_timeout: self.rendezvous_timeout,
        }
    }
}

/// One fully specified termination run.
#[derive(Debug, Clone)]
pub struct TerminationPlan {
    pub mode: TerminationMode,
    pub initiator: Initiator,
    pub task: BlockingTask,
    pub workers: usize,
    pub blocking_timeout: Duration,
    pub rendezvous_timeout: Duration,
}

/// Gates the terminator on every other participant's arrival.
///
/// With `workers` spawned threads plus the main thread, the terminator
/// waits for exactly `workers` arrivals: everyone except itself.
pub struct TerminationCoordinator {
    rendezvous: Rendezvous,
    mode: TerminationMode,
    rendezvous_timeout: Duration,
}

impl TerminationCoordinator {
    pub fn new(plan: &TerminationPlan) -> Self {
        Self {
            rendezvous: Rendezvous::new(plan.workers),
            mode: plan.mode,
            rendezvous_timeout: plan.rendezvous_timeout,
        }
    }

    pub fn arrive(&self) {
        self.rendezvous.arrive();
    }

    pub fn mode(&self) -> TerminationMode {
        self.mode
    }

    /// Wait for all other participants, then end the process.
    pub fn terminate(&self) -> ! {
        info!(parties = self.rendezvous.parties(), "Waiting before terminating");
        if let Err(e) = self.rendezvous.await_all(self.rendezvous_timeout) {
            error!(error = %e, "Rendezvous failed before termination");
            std::process::exit(RENDEZVOUS_FAILURE_STATUS);
        }
        info!(mode = ?self.mode, "Force termination");
        self.mode.execute()
    }
}

/// Argument block for one termination participant.
struct ParticipantBlock {
    coordinator: Arc<TerminationCoordinator>,
    terminates: bool,
    task: BlockingTask,
    blocking_timeout: Duration,
}

fn participant_entry(id: ThreadId, block: Arc<ParticipantBlock>) {
    if block.terminates {
        info!(thread_id = id.get(), "Worker initiating termination");
        block.coordinator.terminate();
    }
    info!(thread_id = id.get(), "Thread running");
    start_job(&block)
}

fn start_job(block: &ParticipantBlock) -> ! {
    block.coordinator.arrive();
    block.task.run(block.blocking_timeout);
    unreachable_checkpoint()
}

/// Reached only if a participant outlives process termination.
pub fn unreachable_checkpoint() -> ! {
    error!("Participant resumed after termination was requested");
    eprintln!("{UNREACHABLE_MARKER}");
    std::process::exit(UNREACHABLE_STATUS)
}

/// Run one termination scenario. Only returns on a setup failure.
pub fn run(governor: &SpawnGovernor, plan: &TerminationPlan) -> Result<Infallible, HarnessError> {
    if plan.workers == 0 {
        return Err(HarnessError::InvalidConfig(
            "termination needs at least one worker".to_string(),
        ));
    }

    let coordinator = Arc::new(TerminationCoordinator::new(plan));
    info!(
        mode = ?plan.mode,
        initiator = ?plan.initiator,
        task = %plan.task,
        workers = plan.workers,
        "Starting termination scenario"
    );

    for index in 0..plan.workers {
        let block = Arc::new(ParticipantBlock {
            coordinator: coordinator.clone(),
            terminates: index == 0 && plan.initiator == Initiator::Worker,
            task: plan.task,
            blocking_timeout: plan.blocking_timeout,
        });
        // No graceful reclaim: the process ends before any worker returns.
        governor.spawn(block, participant_entry)?.detach();
    }

    match plan.initiator {
        Initiator::MainThread => {
            info!("Force termination (main thread)");
            coordinator.terminate()
        }
        Initiator::Worker => {
            info!("Main thread running");
            start_job(&ParticipantBlock {
                coordinator,
                terminates: false,
                task: plan.task,
                blocking_timeout: plan.blocking_timeout,
            })
        }
    }
}
