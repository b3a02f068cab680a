//! TDD-Light tests for whole-process termination.
//!
//! Each case re-launches the harness binary, since a passing run ends the
//! process that performs it.

use std::process::{Command, Output};

use thread_harness::termination::{BlockingTask, UNREACHABLE_MARKER, UNREACHABLE_STATUS};

const BIN: &str = env!("CARGO_BIN_EXE_thread-harness");

fn terminate(mode: &str, initiator: &str, task: BlockingTask, extra_env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(BIN);
    cmd.args(["terminate", "--mode", mode, "--initiator", initiator, "--task", task.as_str()])
        .env("THREAD_HARNESS_LOG", "warn")
        .env("THREAD_HARNESS_BLOCKING_TIMEOUT_MS", "10000")
        .env("THREAD_HARNESS_WAIT_TIMEOUT_MS", "10000");
    for (key, value) in extra_env {
        cmd.env(key, value);
    }
    cmd.output().expect("failed to launch harness binary")
}

fn assert_no_checkpoint(output: &Output, label: &str) {
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains(UNREACHABLE_MARKER), "{label}: checkpoint ran\n{stderr}");
    assert_ne!(output.status.code(), Some(UNREACHABLE_STATUS), "{label}");
}

#[test]
fn exit_mode_uses_configured_status() {
    for initiator in ["worker", "main"] {
        for task in BlockingTask::ALL {
            let label = format!("exit/{initiator}/{task}");
            let output = terminate("exit", initiator, task, &[]);
            assert_no_checkpoint(&output, &label);
            assert_eq!(output.status.code(), Some(33), "{label}");
        }
    }
}

#[test]
fn exit_status_follows_environment() {
    let output = terminate("exit", "main", BlockingTask::Sleep, &[("THREAD_HARNESS_EXIT_STATUS", "42")]);
    assert_no_checkpoint(&output, "exit/main/sleep status 42");
    assert_eq!(output.status.code(), Some(42));
}

#[cfg(unix)]
#[test]
fn trap_mode_aborts_the_process() {
    use std::os::unix::process::ExitStatusExt;
    const SIGABRT: i32 = 6;

    for initiator in ["worker", "main"] {
        for task in BlockingTask::ALL {
            let label = format!("trap/{initiator}/{task}");
            let output = terminate("trap", initiator, task, &[]);
            assert_no_checkpoint(&output, &label);
            assert_eq!(output.status.code(), None, "{label}: trap must not exit normally");
            assert_eq!(output.status.signal(), Some(SIGABRT), "{label}");
        }
    }
}

#[test]
fn unknown_mode_is_a_usage_error() {
    let output = Command::new(BIN)
        .args(["terminate", "--mode", "explode"])
        .output()
        .expect("failed to launch harness binary");
    assert_eq!(output.status.code(), Some(2));
}
