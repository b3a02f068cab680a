//! TDD-Light tests for the harness scenarios.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use thread_harness::scenario::{self, CapacityConfig, MutexConfig, ScenarioKind};
use thread_harness::spawn::{RetryPolicy, SpawnGovernor, SpawnGovernorConfig};
use thread_harness::{Harness, HarnessConfig};

fn quick_config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.capacity = CapacityConfig {
        iterations: 30,
        wait_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: 5,
            backoff: Duration::from_millis(50),
        },
        detached_hold: Duration::from_millis(20),
    };
    config
}

#[test]
fn run_all_passes_with_defaults() {
    let harness = Harness::new(quick_config());
    let results = harness.run_all();
    assert_eq!(results.len(), ScenarioKind::ALL.len());

    for (kind, result) in ScenarioKind::ALL.into_iter().zip(results) {
        let report = result.unwrap_or_else(|e| panic!("{kind} failed: {e}"));
        assert_eq!(report.scenario, kind);
        assert!(report.passed());
    }
}

#[test]
fn capacity_report_matches_limits() {
    let harness = Harness::new(quick_config());
    let report = harness.run_scenario(ScenarioKind::Capacity).unwrap();

    assert_eq!(report.thread_ids.len(), 5);
    assert_eq!(report.detached_ids.len(), 5);
    assert_eq!(report.expected_total, 150);
    assert_eq!(report.observed_total, 150);
    assert!(report
        .rejected_spawn
        .as_deref()
        .is_some_and(|r| r.contains("capacity")));

    let mut all: Vec<i32> = report.thread_ids.iter().chain(&report.detached_ids).copied().collect();
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), 10, "every id in a run must be distinct");
}

#[test]
fn mutex_rounds_are_exact_under_random_shapes() {
    let governor = SpawnGovernor::new(SpawnGovernorConfig {
        max_threads: 8,
        ..Default::default()
    });
    let config = MutexConfig {
        threads: 8,
        iterations: 500,
        wait_timeout: Duration::from_secs(10),
    };
    let mut rng = StdRng::seed_from_u64(42);

    let reports = scenario::accumulator::run_randomized(&governor, &config, 10, &mut rng).unwrap();
    assert_eq!(reports.len(), 10);
    for report in reports {
        assert_eq!(report.observed_total, report.expected_total);
        assert!(!report.thread_ids.is_empty());
    }
    assert_eq!(governor.live(), 0);
}

#[test]
fn heap_scenario_publishes_every_slot() {
    let harness = Harness::new(quick_config());
    let report = harness.run_scenario(ScenarioKind::Heap).unwrap();
    assert_eq!(report.thread_ids.len(), 5);
    assert_eq!(report.observed_total, 150);
}

#[test]
fn report_serializes_for_json_output() {
    let harness = Harness::new(quick_config());
    let report = harness.run_scenario(ScenarioKind::Mutex).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["scenario"], "mutex");
    assert_eq!(json["expected_total"], 40);
    assert_eq!(json["thread_ids"].as_array().map(Vec::len), Some(4));
}
