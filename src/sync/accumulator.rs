//! Mutex-guarded shared counter.

use super::mutex::{MutexStats, WordMutex};

/// A shared integer mutated only inside the [`WordMutex`] critical section.
#[derive(Debug, Default)]
pub struct Accumulator {
    value: WordMutex<u64>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one inside the critical section. Returns the new value.
    pub fn increment(&self) -> u64 {
        self.add(1)
    }

    pub fn add(&self, n: u64) -> u64 {
        let mut value = self.value.lock();
        // Non-atomic read-modify-write; only the lock keeps it exact.
        let current = *value;
        *value = current + n;
        *value
    }

    pub fn value(&self) -> u64 {
        *self.value.lock()
    }

    pub fn lock_stats(&self) -> MutexStats {
        self.value.stats()
    }
}
