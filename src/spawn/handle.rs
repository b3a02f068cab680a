//! Thread handles: identity, lifecycle and stack ownership.

use std::fmt;
use std::num::NonZeroI32;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::HarnessError;

/// Strictly positive thread identifier issued by the spawn governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ThreadId(NonZeroI32);

impl ThreadId {
    /// Returns `None` unless `raw` is strictly positive.
    pub fn new(raw: i32) -> Option<Self> {
        if raw > 0 {
            NonZeroI32::new(raw).map(Self)
        } else {
            None
        }
    }

    pub fn get(self) -> i32 {
        self.0.get()
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of one spawn request. Forward-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[repr(u8)]
pub enum ThreadState {
    Requested = 0,
    Running = 1,
    ReadySignaled = 2,
    Done = 3,
    /// Terminal; only reachable from `Requested`.
    Failed = 4,
}

impl ThreadState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Requested,
            1 => Self::Running,
            2 => Self::ReadySignaled,
            3 => Self::Done,
            _ => Self::Failed,
        }
    }
}

/// Shared lifecycle cell, written by both the spawner and the worker.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: AtomicU8,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(ThreadState::Requested as u8),
        }
    }

    /// Move forward to `to`; never moves backward.
    pub(crate) fn advance(&self, to: ThreadState) {
        debug_assert!(to != ThreadState::Failed, "use fail() for the failed state");
        self.state.fetch_max(to as u8, Ordering::AcqRel);
    }

    /// `Requested -> Failed`. Returns false if the request had already started.
    pub(crate) fn fail(&self) -> bool {
        self.state
            .compare_exchange(
                ThreadState::Requested as u8,
                ThreadState::Failed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn get(&self) -> ThreadState {
        ThreadState::from_u8(self.state.load(Ordering::Acquire))
    }
}

/// Who is responsible for the stack region backing a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StackOwnership {
    /// Owned by the spawner until the worker is joined.
    OwnedPendingJoin,
    /// Freed after a join-equivalent signal.
    Reclaimed,
    /// Intentionally never freed (fire-and-forget).
    DeliberatelyDetached,
}

/// Fixed-size memory block handed to a worker alongside its argument block.
#[derive(Debug)]
pub struct StackRegion {
    bytes: Box<[u8]>,
}

impl StackRegion {
    pub fn allocate(size: usize) -> Result<Self, HarnessError> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size)
            .map_err(|e| HarnessError::AllocationFailure(format!("stack region of {size} bytes: {e}")))?;
        bytes.resize(size, 0);
        Ok(Self {
            bytes: bytes.into_boxed_slice(),
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A spawned worker as seen by its spawner.
pub struct ThreadHandle<A> {
    id: ThreadId,
    argument: Option<Arc<A>>,
    stack: Option<StackRegion>,
    ownership: StackOwnership,
    lifecycle: Arc<Lifecycle>,
    join: Option<JoinHandle<()>>,
}

impl<A> ThreadHandle<A> {
    pub(crate) fn new(
        id: ThreadId,
        argument: Arc<A>,
        stack: StackRegion,
        lifecycle: Arc<Lifecycle>,
        join: JoinHandle<()>,
    ) -> Self {
        Self {
            id,
            argument: Some(argument),
            stack: Some(stack),
            ownership: StackOwnership::OwnedPendingJoin,
            lifecycle,
            join: Some(join),
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn state(&self) -> ThreadState {
        self.lifecycle.get()
    }

    pub fn ownership(&self) -> StackOwnership {
        self.ownership
    }

    /// The argument block shared with the worker.
    pub fn argument(&self) -> Option<&Arc<A>> {
        self.argument.as_ref()
    }

    pub fn stack_len(&self) -> usize {
        self.stack.as_ref().map(StackRegion::len).unwrap_or(0)
    }

    /// True once the worker's entry function has returned.
    pub fn is_finished(&self) -> bool {
        self.state() == ThreadState::Done
    }

    pub(crate) fn mark_ready(&self) {
        self.lifecycle.advance(ThreadState::ReadySignaled);
    }

    /// Join the worker and free its stack region and argument block.
    ///
    /// Call after observing the worker's `done` flag; joining only waits
    /// for the last few instructions of the entry function.
    pub fn reclaim(mut self) -> Result<ThreadId, HarnessError> {
        if let Some(join) = self.join.take() {
            join.join().map_err(|_| {
                HarnessError::invariant(format!("worker {} exit", self.id), "clean return", "panic")
            })?;
        }
        self.lifecycle.advance(ThreadState::Done);
        self.stack = None;
        self.argument = None;
        self.ownership = StackOwnership::Reclaimed;
        debug!(thread_id = self.id.get(), "Worker reclaimed");
        Ok(self.id)
    }

    /// Give up the worker: never joined, stack region and argument block leaked.
    pub fn detach(mut self) -> ThreadId {
        // Dropping a JoinHandle detaches the OS thread.
        drop(self.join.take());
        if let Some(stack) = self.stack.take() {
            std::mem::forget(stack);
        }
        if let Some(argument) = self.argument.take() {
            std::mem::forget(argument);
        }
        self.ownership = StackOwnership::DeliberatelyDetached;
        debug!(thread_id = self.id.get(), "Worker detached");
        self.id
    }
}

impl<A> fmt::Debug for ThreadHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("ownership", &self.ownership)
            .finish()
    }
}

impl<A> Drop for ThreadHandle<A> {
    fn drop(&mut self) {
        if self.ownership == StackOwnership::OwnedPendingJoin {
            warn!(
                thread_id = self.id.get(),
                state = ?self.state(),
                "Thread handle dropped without reclaim or detach"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_id_rejects_non_positive() {
        assert!(ThreadId::new(0).is_none());
        assert!(ThreadId::new(-11).is_none());
        assert_eq!(ThreadId::new(7).map(ThreadId::get), Some(7));
    }

    #[test]
    fn test_lifecycle_is_forward_only() {
        let lc = Lifecycle::new();
        lc.advance(ThreadState::Done);
        lc.advance(ThreadState::Running);
        assert_eq!(lc.get(), ThreadState::Done);
        assert!(!lc.fail(), "started request cannot fail");
    }

    #[test]
    fn test_lifecycle_fail_from_requested() {
        let lc = Lifecycle::new();
        assert!(lc.fail());
        assert_eq!(lc.get(), ThreadState::Failed);
    }

    #[test]
    fn test_stack_region_size() {
        let region = StackRegion::allocate(128).unwrap();
        assert_eq!(region.len(), 128);
        assert!(!region.is_empty());
    }
}
