//! Thread Harness entry point.
//!
//! ## CLI Subcommands
//!
//! - `thread-harness run [capacity|mutex|heap|all]` - run scenarios (default: all)
//! - `thread-harness terminate --mode trap|exit` - whole-process termination run
//! - `thread-harness config show|defaults|validate` - inspect configuration

use std::path::PathBuf;
use std::process::ExitCode;

use thread_harness::cli::{config_cmd, run_cmd, split_config_flag, terminate_cmd, EXIT_USAGE};
use thread_harness::telemetry::{init_logging, LogConfig};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("run");
    let rest = args.get(2..).unwrap_or(&[]);

    let code = match command {
        "run" => with_logging(|| run_cmd::run(rest)),
        "terminate" => with_logging(|| terminate_cmd::run(rest)),
        "config" => run_config(rest),
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = rest.first() {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            0
        }
        "version" | "--version" | "-V" => {
            println!("thread-harness {}", env!("CARGO_PKG_VERSION"));
            0
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            EXIT_USAGE
        }
    };

    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn with_logging(command: impl FnOnce() -> i32) -> i32 {
    if let Err(e) = init_logging(&LogConfig::from_env()) {
        eprintln!("Logging setup failed: {}", e);
        return EXIT_USAGE;
    }
    command()
}

fn run_config(args: &[String]) -> i32 {
    let (config_path, rest): (Option<PathBuf>, Vec<String>) = match split_config_flag(args) {
        Ok(split) => split,
        Err(e) => {
            eprintln!("{}", e);
            return e.exit_code();
        }
    };
    let subcommand = rest.first().map(|s| s.as_str()).unwrap_or("show");
    let json = rest.iter().any(|a| a == "--json");

    match subcommand {
        "show" => config_cmd::run_show(config_path.as_deref(), json),
        "defaults" => {
            config_cmd::run_defaults();
            0
        }
        "validate" => config_cmd::run_validate(config_path.as_deref()),
        _ => {
            eprintln!("Unknown config subcommand: {}", subcommand);
            print_command_help("config");
            EXIT_USAGE
        }
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "thread-harness - thread spawning and termination conformance harness v{}

USAGE:
    thread-harness [COMMAND] [OPTIONS]

COMMANDS:
    run          Run scenarios (default when no command given)
    terminate    Terminate the whole process from one participant
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

OPTIONS:
    -h, --help       Show help for command
    -V, --version    Show version information
    --config FILE    Layer a TOML file beneath the environment

EXAMPLES:
    thread-harness run all --json
    thread-harness run capacity
    thread-harness terminate --mode exit --initiator main --task busy-wait
    thread-harness config validate --config harness.toml

ENVIRONMENT:
    THREAD_HARNESS_*           Scenario tunables (see `config defaults`)
    THREAD_HARNESS_LOG         Log filter (default: info)
    THREAD_HARNESS_LOG_FORMAT  json or pretty (default: json)
    THREAD_HARNESS_LOG_FILE    Write logs to a file instead of stderr

EXIT CODES:
    0   Success
    1   Scenario or invariant failure
    2   Usage or configuration error
    3   Termination rendezvous timed out
    86  A participant resumed after termination began
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "run" => {
            eprintln!(
                "thread-harness run - Run scenarios

USAGE:
    thread-harness run [capacity|mutex|heap|all] [--json] [--config FILE]

DESCRIPTION:
    capacity  Fill the spawn governor, check the extra spawn is refused,
              then spawn fire-and-forget workers with retry
    mutex     Workers increment one counter through the futex mutex
    heap      Workers share a heap counter and publish boxed values

    `all` runs them in that order and stops at the first failure.

EXIT CODES:
    0  Every scenario passed
    1  A scenario failed
    2  Usage or configuration error
"
            );
        }
        "terminate" => {
            eprintln!(
                "thread-harness terminate - Whole-process termination

USAGE:
    thread-harness terminate --mode trap|exit [--initiator worker|main]
                             [--task busy-wait|atomic-wait|sleep] [--config FILE]

DESCRIPTION:
    Spawns THREAD_HARNESS_TERMINATION_WORKERS workers. Every participant
    except the initiator arrives at a rendezvous and then blocks in the
    chosen task. The initiator waits for all arrivals and ends the process.

EXIT STATUS:
    trap  Killed by SIGABRT
    exit  THREAD_HARNESS_EXIT_STATUS (default 33)
    86    A blocked participant resumed (violation)
    3     Rendezvous timed out
"
            );
        }
        "config" => {
            eprintln!(
                "thread-harness config - Inspect configuration

USAGE:
    thread-harness config <SUBCOMMAND> [--config FILE] [--json]

SUBCOMMANDS:
    show           Show effective configuration
    defaults       Show built-in defaults
    validate       Warn about misleading settings (exit 1 on warnings)
"
            );
        }
        _ => {
            eprintln!(
                "No detailed help available for '{}'. Use 'thread-harness help' for general usage.",
                command
            );
        }
    }
}
