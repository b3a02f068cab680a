// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.

use std::path::Path;

use super::{load_config, EXIT_FAILURE, EXIT_USAGE};
use crate::config::{EffectiveConfig, HarnessConfig};

/// Print effective config as key-value pairs (or JSON) to stdout.
pub fn run_show(config_path: Option<&Path>, json: bool) -> i32 {
    let cfg = match load_config(config_path) {
        Ok(cfg) => cfg.effective_config(),
        Err(e) => {
            eprintln!("Error: {e}");
            return e.exit_code();
        }
    };
    if json {
        match serde_json::to_string_pretty(&cfg) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Error: {e}");
                return EXIT_FAILURE;
            }
        }
    } else {
        print_config(&cfg);
    }
    0
}

/// Print built-in defaults, ignoring the environment.
pub fn run_defaults() {
    print_config(&HarnessConfig::default().effective_config());
}

/// Validate configuration for misleading settings.
///
/// Returns 0 if valid, 1 if any warnings are found, 2 if it cannot load.
pub fn run_validate(config_path: Option<&Path>) -> i32 {
    let cfg = match load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: {e}");
            return EXIT_USAGE;
        }
    };

    let warnings = cfg.warnings();
    for warning in &warnings {
        eprintln!("WARNING: {warning}");
    }

    if warnings.is_empty() {
        println!("Configuration is valid.");
        0
    } else {
        EXIT_FAILURE
    }
}

fn print_config(cfg: &EffectiveConfig) {
    println!("THREAD_HARNESS_MAX_THREADS={}", cfg.max_threads);
    println!("THREAD_HARNESS_CAPACITY_ITERATIONS={}", cfg.capacity_iterations);
    println!("THREAD_HARNESS_MUTEX_THREADS={}", cfg.mutex_threads);
    println!("THREAD_HARNESS_MUTEX_ITERATIONS={}", cfg.mutex_iterations);
    println!("THREAD_HARNESS_HEAP_THREADS={}", cfg.heap_threads);
    println!("THREAD_HARNESS_HEAP_ITERATIONS={}", cfg.heap_iterations);
    println!("THREAD_HARNESS_WAIT_TIMEOUT_MS={}", cfg.wait_timeout_ms);
    println!("THREAD_HARNESS_RETRY_ATTEMPTS={}", cfg.retry_attempts);
    println!("THREAD_HARNESS_RETRY_BACKOFF_MS={}", cfg.retry_backoff_ms);
    println!("THREAD_HARNESS_DETACHED_HOLD_MS={}", cfg.detached_hold_ms);
    println!("THREAD_HARNESS_TERMINATION_WORKERS={}", cfg.termination_workers);
    println!("THREAD_HARNESS_EXIT_STATUS={}", cfg.exit_status);
    println!("THREAD_HARNESS_BLOCKING_TIMEOUT_MS={}", cfg.blocking_timeout_ms);
    println!("THREAD_HARNESS_STACK_REGION_BYTES={}", cfg.stack_region_bytes);
    println!("# available cpus: {}", cfg.available_cpus);
}
