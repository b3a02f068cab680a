//! TDD-Light tests for the harness binary's command surface.

use std::io::Write;
use std::process::Command;

const BIN: &str = env!("CARGO_BIN_EXE_thread-harness");

fn harness() -> Command {
    let mut cmd = Command::new(BIN);
    cmd.env("THREAD_HARNESS_LOG", "warn");
    cmd
}

#[test]
fn run_json_reports_success() {
    let output = harness().args(["run", "mutex", "--json"]).output().unwrap();
    assert_eq!(output.status.code(), Some(0));

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["passed"], true);
    assert_eq!(summary["reports"][0]["scenario"], "mutex");
    assert_eq!(summary["reports"][0]["observed_total"], 40);
}

#[test]
fn config_file_feeds_the_run() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "mutex_threads = 2\nmutex_iterations = 7").unwrap();

    let output = harness()
        .args(["run", "mutex", "--json", "--config"])
        .arg(file.path())
        .output()
        .unwrap();
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["reports"][0]["expected_total"], 14);
}

#[test]
fn unknown_scenario_is_a_usage_error() {
    let output = harness().args(["run", "nonsense"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn config_defaults_lists_every_variable() {
    let output = harness().args(["config", "defaults"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("THREAD_HARNESS_MAX_THREADS=5"));
    assert!(stdout.contains("THREAD_HARNESS_EXIT_STATUS=33"));
    assert!(stdout.contains("THREAD_HARNESS_STACK_REGION_BYTES=128"));
}

#[test]
fn config_validate_flags_reserved_status() {
    let output = harness()
        .args(["config", "validate"])
        .env("THREAD_HARNESS_EXIT_STATUS", "3")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn version_prints_package_version() {
    let output = harness().arg("version").output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}
