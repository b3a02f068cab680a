//! Harness error types.
//!
//! Primitive-level failures surface as explicit values; the harness treats
//! any violated invariant as fatal and reports it immediately.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the spawn governor, the wait primitives and scenarios.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HarnessError {
    #[error("Spawn capacity exceeded: {live}/{max} live workers")]
    SpawnCapacityExceeded { live: usize, max: usize },

    #[error("Spawn failed after {attempts} attempt(s): {reason}")]
    SpawnTransientFailure { attempts: u32, reason: String },

    #[error("Wait on {what} timed out after {}ms", timeout.as_millis())]
    WaitTimedOut { what: String, timeout: Duration },

    #[error("Allocation failed: {0}")]
    AllocationFailure(String),

    #[error("Duplicate thread identifier issued: {0}")]
    DuplicateIdentifier(i32),

    #[error("Invariant violated ({what}): expected {expected}, observed {observed}")]
    InvariantViolation {
        what: String,
        expected: String,
        observed: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl HarnessError {
    /// Returns true if a bounded retry may clear the condition.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SpawnCapacityExceeded { .. } | Self::SpawnTransientFailure { .. }
        )
    }

    /// Returns true if the error must halt the running scenario.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AllocationFailure(_)
                | Self::DuplicateIdentifier(_)
                | Self::InvariantViolation { .. }
                | Self::InvalidConfig(_)
        )
    }

    /// Negative value a raw `spawn` call reports in place of a thread id.
    ///
    /// Non-spawn errors map to the generic `-1`.
    pub fn spawn_sentinel(&self) -> i32 {
        match self {
            Self::SpawnCapacityExceeded { .. } => -11, // EAGAIN
            Self::AllocationFailure(_) => -12,         // ENOMEM
            _ => -1,
        }
    }

    pub(crate) fn timed_out(what: impl Into<String>, timeout: Duration) -> Self {
        Self::WaitTimedOut {
            what: what.into(),
            timeout,
        }
    }

    pub(crate) fn invariant(
        what: impl Into<String>,
        expected: impl ToString,
        observed: impl ToString,
    ) -> Self {
        Self::InvariantViolation {
            what: what.into(),
            expected: expected.to_string(),
            observed: observed.to_string(),
        }
    }
}
