// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! `terminate` subcommand: end this process from one participant while
//! the others are blocked.
//!
//! On success this never returns; the caller observes SIGABRT (trap) or
//! the configured exit status (exit).

use super::{load_config, split_config_flag, take_value, CliError};
use crate::termination::{BlockingTask, Initiator, TerminationMode};
use crate::Harness;

/// Parsed `terminate` arguments. The mode is resolved once the exit
/// status is known from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminateArgs {
    pub mode: String,
    pub initiator: Initiator,
    pub task: BlockingTask,
    pub config_path: Option<std::path::PathBuf>,
}

pub fn parse(args: &[String]) -> Result<TerminateArgs, CliError> {
    let (config_path, rest) = split_config_flag(args)?;
    let mut mode = None;
    let mut initiator = Initiator::Worker;
    let mut task = BlockingTask::Sleep;

    let mut i = 0;
    while i < rest.len() {
        match rest[i].as_str() {
            "--mode" => mode = Some(take_value(&rest, &mut i, "--mode")?),
            "--initiator" => initiator = take_value(&rest, &mut i, "--initiator")?.parse()?,
            "--task" => task = take_value(&rest, &mut i, "--task")?.parse()?,
            other => return Err(CliError::Usage(format!("Unknown argument: {other}"))),
        }
    }

    let mode = mode.ok_or_else(|| {
        CliError::Usage(
            "Usage: thread-harness terminate --mode trap|exit [--initiator worker|main] [--task busy-wait|atomic-wait|sleep]"
                .to_string(),
        )
    })?;

    Ok(TerminateArgs {
        mode,
        initiator,
        task,
        config_path,
    })
}

/// Returns an exit code only when the run could not start.
pub fn run(args: &[String]) -> i32 {
    let err = match execute(args) {
        Ok(never) => match never {},
        Err(e) => e,
    };
    eprintln!("Error: {err}");
    err.exit_code()
}

fn execute(args: &[String]) -> Result<std::convert::Infallible, CliError> {
    let args = parse(args)?;
    let config = load_config(args.config_path.as_deref())?;
    let mode = TerminationMode::parse(&args.mode, config.termination.exit_status)?;
    let harness = Harness::new(config);
    Ok(harness.terminate(mode, args.initiator, args.task)?)
}
