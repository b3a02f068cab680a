//! Counting semaphore on the futex primitive.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::futex::{atomic_notify32, atomic_wait32, duration_nanos};
use crate::error::HarnessError;

/// Non-negative counter with an implicit wait queue.
///
/// Completed waits never exceed the initial value plus completed posts.
#[derive(Debug)]
pub struct Semaphore {
    count: AtomicU32,
    initial: u32,
    posts: AtomicU64,
    waits: AtomicU64,
}

impl Semaphore {
    pub fn new(initial: u32) -> Self {
        Self {
            count: AtomicU32::new(initial),
            initial,
            posts: AtomicU64::new(0),
            waits: AtomicU64::new(0),
        }
    }

    /// Increment the counter and wake one blocked waiter, if any.
    pub fn post(&self) {
        self.count.fetch_add(1, Ordering::Release);
        self.posts.fetch_add(1, Ordering::Relaxed);
        atomic_notify32(&self.count, 1);
    }

    /// Decrement without blocking. Returns false if the counter is zero.
    pub fn try_wait(&self) -> bool {
        let mut current = self.count.load(Ordering::Acquire);
        while current > 0 {
            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.waits.fetch_add(1, Ordering::Relaxed);
                    return true;
                }
                Err(observed) => current = observed,
            }
        }
        false
    }

    /// Block until the counter is positive, then decrement it.
    pub fn wait(&self, timeout: Duration) -> Result<(), HarnessError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.try_wait() {
                return Ok(());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(HarnessError::timed_out("semaphore", timeout));
            }
            atomic_wait32(&self.count, 0, duration_nanos(remaining));
        }
    }

    pub fn value(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    pub fn posts(&self) -> u64 {
        self.posts.load(Ordering::Relaxed)
    }

    pub fn completed_waits(&self) -> u64 {
        self.waits.load(Ordering::Relaxed)
    }

    pub fn initial(&self) -> u32 {
        self.initial
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new(0)
    }
}
