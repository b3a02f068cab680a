//! Worker thread creation.
//!
//! The governor bounds live workers and hands out identifiers; the detached
//! spawner layers bounded retry on top for fire-and-forget workers.

pub mod detached;
pub mod governor;
pub mod handle;

pub use detached::{spawn_with_retry, RetryPolicy};
pub use governor::{GovernorStats, SpawnGovernor, SpawnGovernorConfig};
pub use handle::{StackOwnership, StackRegion, ThreadHandle, ThreadId, ThreadState};
