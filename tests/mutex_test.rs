//! TDD-Light tests for the futex mutex and the accumulator built on it.

use std::sync::Arc;
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use thread_harness::sync::{Accumulator, WordMutex};

fn hammer(threads: usize, iterations: u64) -> u64 {
    let acc = Arc::new(Accumulator::new());
    let workers: Vec<_> = (0..threads)
        .map(|_| {
            let acc = acc.clone();
            thread::spawn(move || {
                for _ in 0..iterations {
                    acc.increment();
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }
    acc.value()
}

#[test]
fn four_threads_ten_iterations() {
    assert_eq!(hammer(4, 10), 40);
}

#[test]
fn randomized_runs_never_lose_updates() {
    let mut rng = StdRng::seed_from_u64(0x7e57);
    for _ in 0..20 {
        let threads = rng.gen_range(1..=8);
        let iterations = rng.gen_range(1..=2_000);
        assert_eq!(hammer(threads, iterations), threads as u64 * iterations);
    }
}

#[test]
fn contended_lock_records_wakes() {
    let mutex = Arc::new(WordMutex::new(0u64));
    let guard = mutex.lock();

    let waiter = {
        let mutex = mutex.clone();
        thread::spawn(move || {
            *mutex.lock() += 1;
        })
    };

    // Give the waiter time to mark the lock contended.
    thread::sleep(std::time::Duration::from_millis(100));
    drop(guard);
    waiter.join().unwrap();

    assert_eq!(*mutex.lock(), 1);
    let stats = mutex.stats();
    assert!(stats.contended_acquisitions >= 1);
    assert!(stats.wakes >= 1);
}

#[test]
fn try_lock_fails_while_held() {
    let mutex = WordMutex::new(());
    let guard = mutex.lock();
    assert!(mutex.is_locked());
    assert!(mutex.try_lock().is_none());
    drop(guard);
    assert!(mutex.try_lock().is_some());
}
