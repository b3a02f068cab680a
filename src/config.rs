//! Harness configuration loading from environment variables.
//!
//! Values come from `THREAD_HARNESS_*` environment variables, optionally
//! layered over a TOML file, with built-in defaults underneath. Invalid
//! values fall back to the next layer without crashing; floors and
//! capacity clamps are applied last.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `THREAD_HARNESS_MAX_THREADS` | 5 | Governor capacity (live workers) |
//! | `THREAD_HARNESS_CAPACITY_ITERATIONS` | 30 | Increments per capacity worker |
//! | `THREAD_HARNESS_MUTEX_THREADS` | 4 | Mutex scenario workers |
//! | `THREAD_HARNESS_MUTEX_ITERATIONS` | 10 | Locked increments per worker |
//! | `THREAD_HARNESS_HEAP_THREADS` | 5 | Heap scenario workers |
//! | `THREAD_HARNESS_HEAP_ITERATIONS` | 30 | Increments per heap worker |
//! | `THREAD_HARNESS_WAIT_TIMEOUT_MS` | 10000 | Handshake and rendezvous timeout |
//! | `THREAD_HARNESS_RETRY_ATTEMPTS` | 5 | Fire-and-forget spawn attempts |
//! | `THREAD_HARNESS_RETRY_BACKOFF_MS` | 1000 | Sleep between attempts |
//! | `THREAD_HARNESS_DETACHED_HOLD_MS` | 2000 | Lifetime of a fire-and-forget worker |
//! | `THREAD_HARNESS_TERMINATION_WORKERS` | 3 | Workers besides the main thread |
//! | `THREAD_HARNESS_EXIT_STATUS` | 33 | Status used by exit-mode termination |
//! | `THREAD_HARNESS_BLOCKING_TIMEOUT_MS` | 10000 | Upper bound of a blocking task |
//! | `THREAD_HARNESS_STACK_REGION_BYTES` | 128 | Stack region per worker |

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scenario::{CapacityConfig, HeapConfig, MutexConfig};
use crate::spawn::{RetryPolicy, SpawnGovernorConfig};
use crate::termination::{TerminationConfig, RENDEZVOUS_FAILURE_STATUS, UNREACHABLE_STATUS};

const DEFAULT_MAX_THREADS: usize = 5;
const MAX_THREADS_CEILING: usize = 4096;
const DEFAULT_CAPACITY_ITERATIONS: u64 = 30;
const DEFAULT_MUTEX_THREADS: usize = 4;
const DEFAULT_MUTEX_ITERATIONS: u64 = 10;
const DEFAULT_HEAP_THREADS: usize = 5;
const DEFAULT_HEAP_ITERATIONS: u64 = 30;
const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 1_000;
const DEFAULT_DETACHED_HOLD_MS: u64 = 2_000;
const DEFAULT_TERMINATION_WORKERS: usize = 3;
const DEFAULT_EXIT_STATUS: i32 = 33;
const DEFAULT_BLOCKING_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_STACK_REGION_BYTES: usize = 128;
const MIN_STACK_REGION_BYTES: usize = 16;

/// Errors reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("invalid config file {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// Optional TOML layer; every key mirrors an environment variable.
///
/// ```toml
/// max_threads = 8
/// wait_timeout_ms = 2000
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub max_threads: Option<usize>,
    pub capacity_iterations: Option<u64>,
    pub mutex_threads: Option<usize>,
    pub mutex_iterations: Option<u64>,
    pub heap_threads: Option<usize>,
    pub heap_iterations: Option<u64>,
    pub wait_timeout_ms: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub detached_hold_ms: Option<u64>,
    pub termination_workers: Option<usize>,
    pub exit_status: Option<i32>,
    pub blocking_timeout_ms: Option<u64>,
    pub stack_region_bytes: Option<usize>,
}

impl FileConfig {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Everything a harness run needs, one sub-config per component.
#[derive(Debug, Clone, Default)]
pub struct HarnessConfig {
    pub governor: SpawnGovernorConfig,
    pub capacity: CapacityConfig,
    pub mutex: MutexConfig,
    pub heap: HeapConfig,
    pub termination: TerminationConfig,
}

/// Flat, serializable summary of the effective values.
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub max_threads: usize,
    pub capacity_iterations: u64,
    pub mutex_threads: usize,
    pub mutex_iterations: u64,
    pub heap_threads: usize,
    pub heap_iterations: u64,
    pub wait_timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub detached_hold_ms: u64,
    pub termination_workers: usize,
    pub exit_status: i32,
    pub blocking_timeout_ms: u64,
    pub stack_region_bytes: usize,
    pub available_cpus: usize,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u32` env var, returning `default` on missing or invalid.
fn parse_u32(key: &str, default: u32) -> u32 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u32>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse an `i32` env var, returning `default` on missing or invalid.
fn parse_i32(key: &str, default: i32) -> i32 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<i32>().unwrap_or(default),
        Err(_) => default,
    }
}

fn load_governor_config(file: &FileConfig) -> SpawnGovernorConfig {
    let max_threads = parse_usize(
        "THREAD_HARNESS_MAX_THREADS",
        file.max_threads.unwrap_or(DEFAULT_MAX_THREADS),
    );
    let stack_region_bytes = parse_usize(
        "THREAD_HARNESS_STACK_REGION_BYTES",
        file.stack_region_bytes.unwrap_or(DEFAULT_STACK_REGION_BYTES),
    );
    SpawnGovernorConfig {
        max_threads: max_threads.clamp(1, MAX_THREADS_CEILING),
        stack_region_bytes: stack_region_bytes.max(MIN_STACK_REGION_BYTES),
        ..Default::default()
    }
}

fn load_capacity_config(file: &FileConfig, wait_timeout: Duration) -> CapacityConfig {
    let iterations = parse_u64(
        "THREAD_HARNESS_CAPACITY_ITERATIONS",
        file.capacity_iterations.unwrap_or(DEFAULT_CAPACITY_ITERATIONS),
    );
    let max_attempts = parse_u32(
        "THREAD_HARNESS_RETRY_ATTEMPTS",
        file.retry_attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS),
    );
    let backoff_ms = parse_u64(
        "THREAD_HARNESS_RETRY_BACKOFF_MS",
        file.retry_backoff_ms.unwrap_or(DEFAULT_RETRY_BACKOFF_MS),
    );
    let hold_ms = parse_u64(
        "THREAD_HARNESS_DETACHED_HOLD_MS",
        file.detached_hold_ms.unwrap_or(DEFAULT_DETACHED_HOLD_MS),
    );
    CapacityConfig {
        iterations: iterations.max(1),
        wait_timeout,
        retry: RetryPolicy {
            max_attempts: max_attempts.max(1),
            backoff: Duration::from_millis(backoff_ms),
        },
        detached_hold: Duration::from_millis(hold_ms),
    }
}

fn load_mutex_config(file: &FileConfig, max_threads: usize, wait_timeout: Duration) -> MutexConfig {
    let threads = parse_usize(
        "THREAD_HARNESS_MUTEX_THREADS",
        file.mutex_threads.unwrap_or(DEFAULT_MUTEX_THREADS),
    );
    let iterations = parse_u64(
        "THREAD_HARNESS_MUTEX_ITERATIONS",
        file.mutex_iterations.unwrap_or(DEFAULT_MUTEX_ITERATIONS),
    );
    MutexConfig {
        threads: threads.clamp(1, max_threads),
        iterations: iterations.max(1),
        wait_timeout,
    }
}

fn load_heap_config(file: &FileConfig, max_threads: usize, wait_timeout: Duration) -> HeapConfig {
    let threads = parse_usize(
        "THREAD_HARNESS_HEAP_THREADS",
        file.heap_threads.unwrap_or(DEFAULT_HEAP_THREADS),
    );
    let iterations = parse_u64(
        "THREAD_HARNESS_HEAP_ITERATIONS",
        file.heap_iterations.unwrap_or(DEFAULT_HEAP_ITERATIONS),
    );
    HeapConfig {
        threads: threads.clamp(1, max_threads),
        iterations: iterations.max(1),
        wait_timeout,
    }
}

fn load_termination_config(
    file: &FileConfig,
    max_threads: usize,
    wait_timeout: Duration,
) -> TerminationConfig {
    let workers = parse_usize(
        "THREAD_HARNESS_TERMINATION_WORKERS",
        file.termination_workers.unwrap_or(DEFAULT_TERMINATION_WORKERS),
    );
    let exit_status = parse_i32(
        "THREAD_HARNESS_EXIT_STATUS",
        file.exit_status.unwrap_or(DEFAULT_EXIT_STATUS),
    );
    let blocking_ms = parse_u64(
        "THREAD_HARNESS_BLOCKING_TIMEOUT_MS",
        file.blocking_timeout_ms.unwrap_or(DEFAULT_BLOCKING_TIMEOUT_MS),
    );
    // Portable exit statuses are a single byte.
    let exit_status = if (0..=255).contains(&exit_status) {
        exit_status
    } else {
        DEFAULT_EXIT_STATUS
    };
    TerminationConfig {
        workers: workers.clamp(1, max_threads),
        exit_status,
        blocking_timeout: Duration::from_millis(blocking_ms.max(1)),
        rendezvous_timeout: wait_timeout,
    }
}

/// Environment over `file` over defaults.
pub fn load_layered(file: &FileConfig) -> HarnessConfig {
    let governor = load_governor_config(file);
    let max_threads = governor.max_threads;
    let wait_ms = parse_u64(
        "THREAD_HARNESS_WAIT_TIMEOUT_MS",
        file.wait_timeout_ms.unwrap_or(DEFAULT_WAIT_TIMEOUT_MS),
    );
    let wait_timeout = Duration::from_millis(wait_ms.max(1));

    HarnessConfig {
        capacity: load_capacity_config(file, wait_timeout),
        mutex: load_mutex_config(file, max_threads, wait_timeout),
        heap: load_heap_config(file, max_threads, wait_timeout),
        termination: load_termination_config(file, max_threads, wait_timeout),
        governor,
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> HarnessConfig {
    load_layered(&FileConfig::default())
}

/// Load `path` as the TOML layer beneath the environment.
pub fn load_from_file(path: &Path) -> Result<HarnessConfig, ConfigError> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: display.clone(),
        reason: e.to_string(),
    })?;
    let file = FileConfig::from_toml(&text).map_err(|e| ConfigError::Parse {
        path: display,
        reason: e.to_string(),
    })?;
    Ok(load_layered(&file))
}

impl HarnessConfig {
    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            max_threads: self.governor.max_threads,
            capacity_iterations: self.capacity.iterations,
            mutex_threads: self.mutex.threads,
            mutex_iterations: self.mutex.iterations,
            heap_threads: self.heap.threads,
            heap_iterations: self.heap.iterations,
            wait_timeout_ms: duration_ms(self.capacity.wait_timeout),
            retry_attempts: self.capacity.retry.max_attempts,
            retry_backoff_ms: duration_ms(self.capacity.retry.backoff),
            detached_hold_ms: duration_ms(self.capacity.detached_hold),
            termination_workers: self.termination.workers,
            exit_status: self.termination.exit_status,
            blocking_timeout_ms: duration_ms(self.termination.blocking_timeout),
            stack_region_bytes: self.governor.stack_region_bytes,
            available_cpus: num_cpus::get(),
        }
    }

    /// Settings that load fine but make a run misleading.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let status = self.termination.exit_status;

        if status == 0 {
            warnings.push("THREAD_HARNESS_EXIT_STATUS is 0; exit termination looks like success".to_string());
        }
        if status == UNREACHABLE_STATUS || status == RENDEZVOUS_FAILURE_STATUS {
            warnings.push(format!(
                "THREAD_HARNESS_EXIT_STATUS ({status}) collides with a reserved harness status"
            ));
        }
        if self.termination.blocking_timeout < self.termination.rendezvous_timeout {
            warnings.push(format!(
                "THREAD_HARNESS_BLOCKING_TIMEOUT_MS ({}) < THREAD_HARNESS_WAIT_TIMEOUT_MS ({}); \
                 blocked participants may resume before termination",
                duration_ms(self.termination.blocking_timeout),
                duration_ms(self.termination.rendezvous_timeout)
            ));
        }
        warnings
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
