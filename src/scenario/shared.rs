//! Per-scenario shared state: one block of flag words per worker.
//!
//! Each flag has exactly one writer. Readers either load it or block on it
//! through the futex primitive.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::error::HarnessError;
use crate::sync::futex::{await_nonzero, signal};

/// Handshake words for a single worker.
#[derive(Debug, Default)]
pub struct WorkerFlags {
    /// Written by the worker once it is running.
    pub ready: AtomicU32,
    /// Written by the spawner to let the worker continue.
    pub proceed: AtomicU32,
    /// Written by the worker as its last action.
    pub done: AtomicU32,
}

impl WorkerFlags {
    pub fn signal_ready(&self) {
        signal(&self.ready);
    }

    pub fn signal_proceed(&self) {
        signal(&self.proceed);
    }

    pub fn signal_done(&self) {
        signal(&self.done);
    }

    pub fn await_ready(&self, timeout: Duration) -> Result<(), HarnessError> {
        await_nonzero(&self.ready, "ready", timeout)
    }

    pub fn await_proceed(&self, timeout: Duration) -> Result<(), HarnessError> {
        await_nonzero(&self.proceed, "continue", timeout)
    }

    pub fn await_done(&self, timeout: Duration) -> Result<(), HarnessError> {
        await_nonzero(&self.done, "done", timeout)
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire) != 0
    }
}

/// Fixed-size, ordered flag blocks for every worker in a scenario.
#[derive(Debug)]
pub struct SharedState {
    workers: Box<[WorkerFlags]>,
}

impl SharedState {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: (0..workers).map(|_| WorkerFlags::default()).collect(),
        }
    }

    /// Flags for worker `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is out of range; slots are assigned by the scenario.
    pub fn flags(&self, slot: usize) -> &WorkerFlags {
        &self.workers[slot]
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerFlags> {
        self.workers.iter()
    }

    pub fn all_done(&self) -> bool {
        self.workers.iter().all(WorkerFlags::is_done)
    }
}
