//! Bounded worker creation.
//!
//! At most `max_threads` workers are live at once. A live slot is reserved
//! before the OS thread exists and released by an RAII guard owned by the
//! worker, so it frees exactly when the entry function returns.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::handle::{Lifecycle, StackRegion, ThreadHandle, ThreadId, ThreadState};
use crate::error::HarnessError;
use crate::sync::futex::await_nonzero;

/// Configuration for the spawn governor.
#[derive(Debug, Clone)]
pub struct SpawnGovernorConfig {
    /// Maximum concurrently live workers.
    pub max_threads: usize,
    /// Size of the stack region allocated per worker (bytes).
    pub stack_region_bytes: usize,
    /// OS thread stack size in bytes (0 = platform default).
    pub thread_stack_size: usize,
    /// Thread name prefix.
    pub thread_name_prefix: String,
}

impl Default for SpawnGovernorConfig {
    fn default() -> Self {
        Self {
            max_threads: 5,
            stack_region_bytes: 128,
            thread_stack_size: 0,
            thread_name_prefix: "harness-worker".to_string(),
        }
    }
}

/// Point-in-time governor counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GovernorStats {
    pub live: usize,
    pub peak_live: usize,
    pub spawned: u64,
    pub rejected: u64,
    pub failed: u64,
    pub max_threads: usize,
}

struct GovernorInner {
    config: SpawnGovernorConfig,
    live: AtomicUsize,
    peak_live: AtomicUsize,
    next_id: AtomicI32,
    issued: Mutex<HashSet<i32>>,
    spawned: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

/// Creates worker threads up to a fixed capacity.
#[derive(Clone)]
pub struct SpawnGovernor {
    inner: Arc<GovernorInner>,
}

/// Releases a live slot when dropped.
struct SlotGuard {
    inner: Arc<GovernorInner>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.inner.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SpawnGovernor {
    pub fn new(config: SpawnGovernorConfig) -> Self {
        Self {
            inner: Arc::new(GovernorInner {
                config,
                live: AtomicUsize::new(0),
                peak_live: AtomicUsize::new(0),
                next_id: AtomicI32::new(1),
                issued: Mutex::new(HashSet::new()),
                spawned: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &SpawnGovernorConfig {
        &self.inner.config
    }

    /// Reserve a live slot, or report capacity exhaustion without blocking.
    fn try_reserve(&self) -> Result<SlotGuard, HarnessError> {
        let inner = &self.inner;
        let prev = inner.live.fetch_add(1, Ordering::SeqCst);
        if prev >= inner.config.max_threads {
            inner.live.fetch_sub(1, Ordering::SeqCst);
            return Err(HarnessError::SpawnCapacityExceeded {
                live: prev,
                max: inner.config.max_threads,
            });
        }
        inner.peak_live.fetch_max(prev + 1, Ordering::Relaxed);
        Ok(SlotGuard {
            inner: self.inner.clone(),
        })
    }

    fn issue_id(&self) -> Result<ThreadId, HarnessError> {
        let raw = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let id = ThreadId::new(raw).ok_or_else(|| {
            HarnessError::AllocationFailure(format!("thread id space exhausted at {raw}"))
        })?;
        if !self.inner.issued.lock().insert(raw) {
            return Err(HarnessError::DuplicateIdentifier(raw));
        }
        Ok(id)
    }

    /// Spawn a worker running `entry(id, argument)`.
    ///
    /// Fails with `SpawnCapacityExceeded` once `max_threads` workers are
    /// live. A failed spawn leaves no worker behind.
    pub fn spawn<A, F>(&self, argument: Arc<A>, entry: F) -> Result<ThreadHandle<A>, HarnessError>
    where
        A: Send + Sync + 'static,
        F: FnOnce(ThreadId, Arc<A>) + Send + 'static,
    {
        let lifecycle = Arc::new(Lifecycle::new());
        let result = self.spawn_inner(argument, entry, lifecycle.clone());
        match &result {
            Ok(handle) => {
                self.inner.spawned.fetch_add(1, Ordering::Relaxed);
                info!(
                    thread_id = handle.id().get(),
                    live = self.live(),
                    "Thread created"
                );
            }
            Err(e) => {
                lifecycle.fail();
                if matches!(e, HarnessError::SpawnCapacityExceeded { .. }) {
                    self.inner.rejected.fetch_add(1, Ordering::Relaxed);
                    debug!(error = %e, "Spawn rejected");
                } else {
                    self.inner.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "Spawn failed");
                }
            }
        }
        result
    }

    fn spawn_inner<A, F>(
        &self,
        argument: Arc<A>,
        entry: F,
        lifecycle: Arc<Lifecycle>,
    ) -> Result<ThreadHandle<A>, HarnessError>
    where
        A: Send + Sync + 'static,
        F: FnOnce(ThreadId, Arc<A>) + Send + 'static,
    {
        let slot = self.try_reserve()?;
        let stack = StackRegion::allocate(self.inner.config.stack_region_bytes)?;
        let id = self.issue_id()?;

        let worker_argument = argument.clone();
        let worker_lifecycle = lifecycle.clone();

        let mut builder = thread::Builder::new()
            .name(format!("{}-{}", self.inner.config.thread_name_prefix, id));
        if self.inner.config.thread_stack_size > 0 {
            builder = builder.stack_size(self.inner.config.thread_stack_size);
        }

        // On failure std drops the closure, and the slot guard with it.
        let join = builder
            .spawn(move || {
                let _slot = slot;
                worker_lifecycle.advance(ThreadState::Running);
                entry(id, worker_argument);
                worker_lifecycle.advance(ThreadState::Done);
            })
            .map_err(|e| HarnessError::SpawnTransientFailure {
                attempts: 1,
                reason: e.to_string(),
            })?;

        lifecycle.advance(ThreadState::Running);
        Ok(ThreadHandle::new(id, argument, stack, lifecycle, join))
    }

    /// Spawn, then block until the worker publishes its `ready` word.
    ///
    /// `ready` selects the flag inside the argument block. The next spawn
    /// is only issued after this returns, so capacity tests see a
    /// deterministic order.
    pub fn spawn_and_await_ready<A, F, R>(
        &self,
        argument: Arc<A>,
        entry: F,
        ready: R,
        timeout: Duration,
    ) -> Result<ThreadHandle<A>, HarnessError>
    where
        A: Send + Sync + 'static,
        F: FnOnce(ThreadId, Arc<A>) + Send + 'static,
        R: Fn(&A) -> &AtomicU32,
    {
        let handle = self.spawn(argument, entry)?;
        if let Some(argument) = handle.argument() {
            await_nonzero(ready(&**argument), &format!("ready flag of thread {}", handle.id()), timeout)?;
        }
        handle.mark_ready();
        debug!(thread_id = handle.id().get(), "Worker signaled ready");
        Ok(handle)
    }

    /// Currently live (not yet returned) workers.
    pub fn live(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }

    pub fn max_threads(&self) -> usize {
        self.inner.config.max_threads
    }

    /// Every id issued so far, in ascending order.
    pub fn issued_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self.inner.issued.lock().iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn stats(&self) -> GovernorStats {
        GovernorStats {
            live: self.live(),
            peak_live: self.inner.peak_live.load(Ordering::Relaxed),
            spawned: self.inner.spawned.load(Ordering::Relaxed),
            rejected: self.inner.rejected.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            max_threads: self.inner.config.max_threads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn governor(max_threads: usize) -> SpawnGovernor {
        SpawnGovernor::new(SpawnGovernorConfig {
            max_threads,
            ..Default::default()
        })
    }

    #[test]
    fn test_reserve_respects_capacity() {
        let gov = governor(2);
        let a = gov.try_reserve().unwrap();
        let _b = gov.try_reserve().unwrap();
        assert!(matches!(
            gov.try_reserve(),
            Err(HarnessError::SpawnCapacityExceeded { live: 2, max: 2 })
        ));
        drop(a);
        assert_eq!(gov.live(), 1);
        assert!(gov.try_reserve().is_ok());
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let gov = governor(1);
        assert_eq!(gov.issue_id().unwrap().get(), 1);
        assert_eq!(gov.issue_id().unwrap().get(), 2);
        assert_eq!(gov.issued_ids(), vec![1, 2]);
    }

    #[test]
    fn test_duplicate_id_is_detected() {
        let gov = governor(1);
        gov.inner.issued.lock().insert(1);
        assert_eq!(gov.issue_id(), Err(HarnessError::DuplicateIdentifier(1)));
    }

    #[test]
    fn test_zero_capacity_rejects_everything() {
        let gov = governor(0);
        let result = gov.spawn(Arc::new(()), |_, _| {});
        assert!(matches!(result, Err(HarnessError::SpawnCapacityExceeded { .. })));
        assert_eq!(gov.stats().rejected, 1);
        assert_eq!(gov.live(), 0);
    }
}
