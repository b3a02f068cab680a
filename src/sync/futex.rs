//! Futex-style wait/notify on 32-bit words.
//!
//! Waiters are parked in a process-wide table keyed by word address. The
//! value comparison and the enqueue happen under the bucket lock, and a
//! notifier takes the same lock after writing the word, so a wake can never
//! slip between a waiter's check and its sleep.
//!
//! The primitive never writes the target word. Callers own the
//! write-then-notify protocol (see [`signal`] and [`await_nonzero`]).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use crate::error::HarnessError;

/// Outcome of [`atomic_wait32`], numbered as the runtime reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u32)]
pub enum WaitOutcome {
    /// A matching notify arrived before the deadline.
    Woken = 0,
    /// The word did not hold the expected value at call time.
    ValueMismatch = 1,
    /// The deadline passed without a notify.
    TimedOut = 2,
}

impl WaitOutcome {
    /// Numeric code (0 woken, 1 mismatch, 2 timed out).
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Woken),
            1 => Some(Self::ValueMismatch),
            2 => Some(Self::TimedOut),
            _ => None,
        }
    }
}

/// A single blocked thread.
struct Parker {
    notified: Mutex<bool>,
    cvar: Condvar,
}

impl Parker {
    fn new() -> Self {
        Self {
            notified: Mutex::new(false),
            cvar: Condvar::new(),
        }
    }

    fn unpark(&self) {
        let mut notified = self.notified.lock();
        *notified = true;
        self.cvar.notify_one();
    }

    /// Sleep until unparked or `deadline`. Returns true if unparked.
    fn park(&self, deadline: Option<Instant>) -> bool {
        let mut notified = self.notified.lock();
        while !*notified {
            match deadline {
                Some(deadline) => {
                    if self.cvar.wait_until(&mut notified, deadline).timed_out() {
                        break;
                    }
                }
                None => self.cvar.wait(&mut notified),
            }
        }
        *notified
    }
}

/// Address-keyed FIFO queues of parked threads.
struct WaitTable {
    queues: DashMap<usize, VecDeque<Arc<Parker>>>,
}

impl WaitTable {
    fn global() -> &'static WaitTable {
        static TABLE: OnceLock<WaitTable> = OnceLock::new();
        TABLE.get_or_init(|| WaitTable {
            queues: DashMap::new(),
        })
    }

    fn prune(&self, key: usize) {
        self.queues.remove_if(&key, |_, queue| queue.is_empty());
    }

    fn wait(&self, word: &AtomicU32, expected: u32, timeout_ns: u64) -> WaitOutcome {
        let key = word_key(word);
        let parker = Arc::new(Parker::new());

        {
            let mut queue = self.queues.entry(key).or_default();
            if word.load(Ordering::SeqCst) != expected {
                let empty = queue.is_empty();
                drop(queue);
                if empty {
                    self.prune(key);
                }
                return WaitOutcome::ValueMismatch;
            }
            if timeout_ns == 0 {
                let empty = queue.is_empty();
                drop(queue);
                if empty {
                    self.prune(key);
                }
                return WaitOutcome::TimedOut;
            }
            queue.push_back(parker.clone());
        }

        let deadline = Instant::now().checked_add(Duration::from_nanos(timeout_ns));
        if parker.park(deadline) {
            return WaitOutcome::Woken;
        }

        // Deadline passed. A notifier may have dequeued us concurrently, in
        // which case its wake counted us and we report it as such.
        let removed = match self.queues.get_mut(&key) {
            Some(mut queue) => match queue.iter().position(|p| Arc::ptr_eq(p, &parker)) {
                Some(pos) => {
                    queue.remove(pos);
                    true
                }
                None => false,
            },
            None => false,
        };
        self.prune(key);

        if removed {
            WaitOutcome::TimedOut
        } else {
            WaitOutcome::Woken
        }
    }

    fn notify(&self, word: &AtomicU32, count: u32) -> u32 {
        let key = word_key(word);
        let mut woken = 0;
        if let Some(mut queue) = self.queues.get_mut(&key) {
            while woken < count {
                match queue.pop_front() {
                    Some(parker) => {
                        parker.unpark();
                        woken += 1;
                    }
                    None => break,
                }
            }
        }
        self.prune(key);
        woken
    }

    fn waiters(&self, word: &AtomicU32) -> usize {
        self.queues
            .get(&word_key(word))
            .map(|queue| queue.len())
            .unwrap_or(0)
    }
}

fn word_key(word: &AtomicU32) -> usize {
    word as *const AtomicU32 as usize
}

/// Block while `*word == expected`, for at most `timeout_ns` nanoseconds.
///
/// A zero timeout polls without blocking. `u64::MAX` (or any timeout that
/// overflows the clock) waits without a deadline.
pub fn atomic_wait32(word: &AtomicU32, expected: u32, timeout_ns: u64) -> WaitOutcome {
    WaitTable::global().wait(word, expected, timeout_ns)
}

/// Wake up to `count` threads blocked on `word`. Returns how many woke.
pub fn atomic_notify32(word: &AtomicU32, count: u32) -> u32 {
    WaitTable::global().notify(word, count)
}

/// Number of threads currently parked on `word`.
pub fn waiter_count(word: &AtomicU32) -> usize {
    WaitTable::global().waiters(word)
}

fn assert_word_aligned(addr: *const u32) {
    assert!(
        !addr.is_null() && (addr as usize) % 4 == 0,
        "atomic wait/notify on misaligned or null address {addr:p}"
    );
}

/// Raw-address form of [`atomic_wait32`].
///
/// # Panics
///
/// Panics if `addr` is null or not 4-byte aligned.
///
/// # Safety
///
/// `addr` must point to a live `u32` that is only accessed atomically for
/// the duration of the call.
pub unsafe fn atomic_wait32_at(addr: *const u32, expected: u32, timeout_ns: u64) -> WaitOutcome {
    assert_word_aligned(addr);
    // SAFETY: aligned and live per the caller contract.
    let word = unsafe { AtomicU32::from_ptr(addr as *mut u32) };
    atomic_wait32(word, expected, timeout_ns)
}

/// Raw-address form of [`atomic_notify32`].
///
/// # Panics
///
/// Panics if `addr` is null or not 4-byte aligned.
///
/// # Safety
///
/// Same contract as [`atomic_wait32_at`].
pub unsafe fn atomic_notify32_at(addr: *const u32, count: u32) -> u32 {
    assert_word_aligned(addr);
    // SAFETY: aligned and live per the caller contract.
    let word = unsafe { AtomicU32::from_ptr(addr as *mut u32) };
    atomic_notify32(word, count)
}

/// Publish a flag: store 1, then wake one waiter.
pub fn signal(word: &AtomicU32) -> u32 {
    word.store(1, Ordering::Release);
    atomic_notify32(word, 1)
}

/// Wait until `word` becomes non-zero or `timeout` elapses.
pub fn await_nonzero(word: &AtomicU32, what: &str, timeout: Duration) -> Result<(), HarnessError> {
    let deadline = Instant::now() + timeout;
    loop {
        if word.load(Ordering::Acquire) != 0 {
            return Ok(());
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(HarnessError::timed_out(what, timeout));
        }
        // Woken and ValueMismatch both re-check the word.
        if atomic_wait32(word, 0, duration_nanos(remaining)) == WaitOutcome::TimedOut
            && word.load(Ordering::Acquire) == 0
        {
            return Err(HarnessError::timed_out(what, timeout));
        }
    }
}

/// Coarse sleep: a timed wait on a private word nobody notifies.
pub fn coarse_sleep(duration: Duration) {
    let idle = AtomicU32::new(0);
    let deadline = Instant::now() + duration;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        atomic_wait32(&idle, 0, duration_nanos(remaining));
    }
}

pub(crate) fn duration_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_outcome_codes() {
        assert_eq!(WaitOutcome::Woken.code(), 0);
        assert_eq!(WaitOutcome::ValueMismatch.code(), 1);
        assert_eq!(WaitOutcome::TimedOut.code(), 2);
        assert_eq!(WaitOutcome::from_code(2), Some(WaitOutcome::TimedOut));
        assert_eq!(WaitOutcome::from_code(7), None);
    }

    #[test]
    fn test_mismatch_leaves_no_queue() {
        let word = AtomicU32::new(3);
        assert_eq!(atomic_wait32(&word, 0, 1_000_000), WaitOutcome::ValueMismatch);
        assert_eq!(waiter_count(&word), 0);
    }

    #[test]
    fn test_timed_out_waiter_is_removed() {
        let word = AtomicU32::new(0);
        assert_eq!(atomic_wait32(&word, 0, 5_000_000), WaitOutcome::TimedOut);
        assert_eq!(waiter_count(&word), 0);
        assert_eq!(atomic_notify32(&word, 1), 0);
    }

    #[test]
    fn test_signal_wakes_parked_thread() {
        let word = Arc::new(AtomicU32::new(0));
        let waiter = {
            let word = word.clone();
            thread::spawn(move || await_nonzero(&word, "flag", Duration::from_secs(10)))
        };
        while waiter_count(&word) == 0 {
            thread::yield_now();
        }
        assert_eq!(signal(&word), 1);
        assert!(waiter.join().unwrap().is_ok());
    }

    #[test]
    fn test_await_nonzero_times_out() {
        let word = AtomicU32::new(0);
        let err = await_nonzero(&word, "never", Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, HarnessError::WaitTimedOut { .. }));
    }

    #[test]
    fn test_coarse_sleep_waits_at_least_duration() {
        let start = Instant::now();
        coarse_sleep(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
