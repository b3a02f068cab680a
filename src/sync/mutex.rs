//! Word-sized mutual exclusion lock parked on the futex primitive.
//!
//! Classic three-state lock word: 0 unlocked, 1 locked, 2 locked with
//! (possible) waiters. Unlock only issues a notify when the word was 2.
//! No fairness: a releasing thread may re-acquire before a woken waiter.

use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use super::futex::{atomic_notify32, atomic_wait32, duration_nanos};

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;
const CONTENDED: u32 = 2;

/// Upper bound on a single park before the lock word is re-examined.
const PARK_SLICE: Duration = Duration::from_millis(100);

/// Lock contention counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MutexStats {
    /// Acquisitions that succeeded on the first compare-exchange.
    pub fast_acquisitions: u64,
    /// Acquisitions that had to park at least once.
    pub contended_acquisitions: u64,
    /// Unlocks that issued a notify.
    pub wakes: u64,
}

/// A mutex protecting `T`, built on [`atomic_wait32`]/[`atomic_notify32`].
pub struct WordMutex<T: ?Sized> {
    state: AtomicU32,
    fast: AtomicU64,
    contended: AtomicU64,
    wakes: AtomicU64,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is serialized by the lock word.
unsafe impl<T: ?Sized + Send> Send for WordMutex<T> {}
// SAFETY: a guard is only handed to one thread at a time.
unsafe impl<T: ?Sized + Send> Sync for WordMutex<T> {}

impl<T> WordMutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            state: AtomicU32::new(UNLOCKED),
            fast: AtomicU64::new(0),
            contended: AtomicU64::new(0),
            wakes: AtomicU64::new(0),
            data: UnsafeCell::new(value),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> WordMutex<T> {
    /// Acquire the lock, parking while another thread holds it.
    pub fn lock(&self) -> WordMutexGuard<'_, T> {
        if self
            .state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            self.fast.fetch_add(1, Ordering::Relaxed);
            return WordMutexGuard { mutex: self };
        }
        self.lock_contended();
        self.contended.fetch_add(1, Ordering::Relaxed);
        WordMutexGuard { mutex: self }
    }

    fn lock_contended(&self) {
        // Once we have parked we must leave the word at CONTENDED so the
        // holder knows to notify on unlock.
        let mut observed = self.state.swap(CONTENDED, Ordering::Acquire);
        while observed != UNLOCKED {
            atomic_wait32(&self.state, CONTENDED, duration_nanos(PARK_SLICE));
            observed = self.state.swap(CONTENDED, Ordering::Acquire);
        }
    }

    /// Acquire the lock only if it is free right now.
    pub fn try_lock(&self) -> Option<WordMutexGuard<'_, T>> {
        self.state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| {
                self.fast.fetch_add(1, Ordering::Relaxed);
                WordMutexGuard { mutex: self }
            })
    }

    fn unlock(&self) {
        if self.state.swap(UNLOCKED, Ordering::Release) == CONTENDED {
            self.wakes.fetch_add(1, Ordering::Relaxed);
            atomic_notify32(&self.state, 1);
        }
    }

    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) != UNLOCKED
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub fn stats(&self) -> MutexStats {
        MutexStats {
            fast_acquisitions: self.fast.load(Ordering::Relaxed),
            contended_acquisitions: self.contended.load(Ordering::Relaxed),
            wakes: self.wakes.load(Ordering::Relaxed),
        }
    }
}

impl<T: Default> Default for WordMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> fmt::Debug for WordMutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WordMutex")
            .field("locked", &self.is_locked())
            .finish_non_exhaustive()
    }
}

/// RAII guard; the lock is released when it is dropped.
pub struct WordMutexGuard<'a, T: ?Sized> {
    mutex: &'a WordMutex<T>,
}

impl<T: ?Sized> Deref for WordMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard proves exclusive ownership of the lock.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized> DerefMut for WordMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves exclusive ownership of the lock.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized> Drop for WordMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lock_and_try_lock() {
        let mutex = WordMutex::new(0u32);
        let guard = mutex.lock();
        assert!(mutex.is_locked());
        assert!(mutex.try_lock().is_none());
        drop(guard);
        assert!(!mutex.is_locked());
        assert!(mutex.try_lock().is_some());
    }

    #[test]
    fn test_contended_unlock_wakes_waiter() {
        let mutex = Arc::new(WordMutex::new(Vec::new()));
        let guard = mutex.lock();

        let contender = {
            let mutex = mutex.clone();
            thread::spawn(move || mutex.lock().push("contender"))
        };

        while mutex.state.load(Ordering::Relaxed) != CONTENDED {
            thread::yield_now();
        }
        drop(guard);
        contender.join().unwrap();

        assert_eq!(*mutex.lock(), vec!["contender"]);
        let stats = mutex.stats();
        assert_eq!(stats.contended_acquisitions, 1);
        assert!(stats.wakes >= 1);
    }

    #[test]
    fn test_into_inner_and_get_mut() {
        let mut mutex = WordMutex::new(5);
        *mutex.get_mut() += 1;
        assert_eq!(mutex.into_inner(), 6);
    }
}
