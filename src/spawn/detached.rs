//! Fire-and-forget spawning with bounded retry.
//!
//! Workers spawned here are never joined and their stack regions and
//! argument blocks are never freed. That leak is the behavior under test.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::governor::SpawnGovernor;
use super::handle::ThreadId;
use crate::error::HarnessError;
use crate::sync::futex::coarse_sleep;

/// Bounded attempts with a fixed, coarse backoff between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Spawn a detached worker, retrying retryable failures per `policy`.
///
/// Returns the first successful id. Exhausting the attempts yields
/// `SpawnTransientFailure` carrying the last failure; non-retryable errors
/// return immediately.
pub fn spawn_with_retry<A, F>(
    governor: &SpawnGovernor,
    argument: Arc<A>,
    entry: F,
    policy: &RetryPolicy,
) -> Result<ThreadId, HarnessError>
where
    A: Send + Sync + 'static,
    F: FnOnce(ThreadId, Arc<A>) + Clone + Send + 'static,
{
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        match governor.spawn(argument.clone(), entry.clone()) {
            Ok(handle) => {
                let id = handle.detach();
                info!(thread_id = id.get(), attempt, "Detached thread created");
                return Ok(id);
            }
            Err(e) if e.is_retryable() => {
                debug!(attempt, error = %e, "Spawn attempt failed, backing off");
                last_error = Some(e);
                if attempt < policy.max_attempts {
                    coarse_sleep(policy.backoff);
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(HarnessError::SpawnTransientFailure {
        attempts: policy.max_attempts,
        reason: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts allowed".to_string()),
    })
}
