// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommands for the harness binary.
//!
//! ## Usage
//!
//! ```bash
//! thread-harness run all --json          # every scenario, JSON report
//! thread-harness run capacity            # one scenario
//! thread-harness terminate --mode trap --initiator worker --task sleep
//! thread-harness config show             # effective configuration
//! ```

pub mod config_cmd;
pub mod run_cmd;
pub mod terminate_cmd;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{self, ConfigError, HarnessConfig};
use crate::error::HarnessError;

/// Exit status for a failed scenario or invariant.
pub const EXIT_FAILURE: i32 = 1;
/// Exit status for bad arguments or configuration.
pub const EXIT_USAGE: i32 = 2;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Harness(#[from] HarnessError),

    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) | Self::Config(_) => EXIT_USAGE,
            Self::Harness(HarnessError::InvalidConfig(_)) => EXIT_USAGE,
            Self::Harness(_) | Self::Encode(_) => EXIT_FAILURE,
        }
    }
}

/// Value following `flag` at `args[*i + 1]`; advances `i` past both.
pub(crate) fn take_value(args: &[String], i: &mut usize, flag: &str) -> Result<String, CliError> {
    match args.get(*i + 1) {
        Some(value) if !value.starts_with("--") => {
            *i += 2;
            Ok(value.clone())
        }
        _ => Err(CliError::Usage(format!("Missing value for {flag}"))),
    }
}

/// Environment over the optional TOML file over defaults.
pub fn load_config(path: Option<&Path>) -> Result<HarnessConfig, CliError> {
    match path {
        Some(path) => Ok(config::load_from_file(path)?),
        None => Ok(config::load()),
    }
}

/// Pull `--config FILE` out of `args`, returning the rest.
pub fn split_config_flag(args: &[String]) -> Result<(Option<PathBuf>, Vec<String>), CliError> {
    let mut path = None;
    let mut rest = Vec::with_capacity(args.len());
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--config" {
            path = Some(PathBuf::from(take_value(args, &mut i, "--config")?));
        } else {
            rest.push(args[i].clone());
            i += 1;
        }
    }
    Ok((path, rest))
}
