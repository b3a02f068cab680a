//! N-party rendezvous built on [`Semaphore`].
//!
//! Every arriving participant posts once. The single coordinator performs
//! `parties` waits and is released only after exactly that many posts.

use std::time::{Duration, Instant};

use tracing::debug;

use super::semaphore::Semaphore;
use crate::error::HarnessError;

#[derive(Debug)]
pub struct Rendezvous {
    sem: Semaphore,
    parties: usize,
}

impl Rendezvous {
    pub fn new(parties: usize) -> Self {
        Self {
            sem: Semaphore::new(0),
            parties,
        }
    }

    /// Mark the calling participant as having reached its checkpoint.
    pub fn arrive(&self) {
        self.sem.post();
    }

    /// Block until all `parties` have arrived.
    ///
    /// `timeout` bounds the whole rendezvous, not each individual wait.
    pub fn await_all(&self, timeout: Duration) -> Result<(), HarnessError> {
        let deadline = Instant::now() + timeout;
        for arrived in 0..self.parties {
            let remaining = deadline.saturating_duration_since(Instant::now());
            self.sem.wait(remaining).map_err(|_| {
                HarnessError::timed_out(
                    format!("rendezvous ({arrived}/{} arrived)", self.parties),
                    timeout,
                )
            })?;
            debug!(arrived = arrived + 1, parties = self.parties, "Participant arrived");
        }
        Ok(())
    }

    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Arrivals not yet consumed by the coordinator.
    pub fn pending_arrivals(&self) -> u32 {
        self.sem.value()
    }
}
