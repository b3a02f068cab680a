//! Synchronization primitives for the harness.
//!
//! Everything here is layered on the 32-bit futex-style wait/notify in
//! [`futex`]: the word mutex, the counting semaphore and the rendezvous.

pub mod accumulator;
pub mod futex;
pub mod mutex;
pub mod rendezvous;
pub mod semaphore;

pub use accumulator::Accumulator;
pub use futex::{
    atomic_notify32, atomic_notify32_at, atomic_wait32, atomic_wait32_at, await_nonzero,
    coarse_sleep, signal, waiter_count, WaitOutcome,
};
pub use mutex::{MutexStats, WordMutex, WordMutexGuard};
pub use rendezvous::Rendezvous;
pub use semaphore::Semaphore;
