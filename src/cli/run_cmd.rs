// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! `run` subcommand: execute scenarios and report.

use serde::Serialize;

use super::{load_config, split_config_flag, CliError};
use crate::scenario::{ScenarioKind, ScenarioReport};
use crate::Harness;

/// Parsed `run` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    /// `None` runs every scenario.
    pub scenario: Option<ScenarioKind>,
    pub json: bool,
    pub config_path: Option<std::path::PathBuf>,
}

/// JSON document printed by `run --json`.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub passed: bool,
    pub reports: Vec<ScenarioReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_scenario: Option<ScenarioKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn parse(args: &[String]) -> Result<RunArgs, CliError> {
    let (config_path, rest) = split_config_flag(args)?;
    let mut scenario = None;
    let mut json = false;

    for arg in &rest {
        match arg.as_str() {
            "--json" => json = true,
            "all" => scenario = None,
            name if !name.starts_with('-') => scenario = Some(name.parse::<ScenarioKind>()?),
            other => return Err(CliError::Usage(format!("Unknown argument: {other}"))),
        }
    }

    Ok(RunArgs {
        scenario,
        json,
        config_path,
    })
}

/// Run the requested scenarios. Returns the process exit code.
pub fn run(args: &[String]) -> i32 {
    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            e.exit_code()
        }
    }
}

fn execute(args: &[String]) -> Result<i32, CliError> {
    let args = parse(args)?;
    let harness = Harness::new(load_config(args.config_path.as_deref())?);

    let kinds: Vec<ScenarioKind> = match args.scenario {
        Some(kind) => vec![kind],
        None => ScenarioKind::ALL.to_vec(),
    };
    let results = match args.scenario {
        Some(kind) => vec![harness.run_scenario(kind)],
        None => harness.run_all(),
    };

    let mut summary = RunSummary {
        passed: true,
        reports: Vec::with_capacity(results.len()),
        failed_scenario: None,
        error: None,
    };
    let mut failure = None;
    for (kind, result) in kinds.into_iter().zip(results) {
        match result {
            Ok(report) => summary.reports.push(report),
            Err(e) => {
                summary.passed = false;
                summary.failed_scenario = Some(kind);
                summary.error = Some(e.to_string());
                failure = Some(CliError::from(e));
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(failure.map(|e| e.exit_code()).unwrap_or(0))
}

fn print_summary(summary: &RunSummary) {
    for report in &summary.reports {
        println!(
            "{:<9} ok    total={}/{} threads={:?} detached={:?} elapsed={}ms",
            report.scenario.as_str(),
            report.observed_total,
            report.expected_total,
            report.thread_ids,
            report.detached_ids,
            report.elapsed_ms
        );
        if let Some(rejected) = &report.rejected_spawn {
            println!("          rejected spawn: {rejected}");
        }
    }
    if let (Some(kind), Some(error)) = (summary.failed_scenario, &summary.error) {
        println!("{:<9} FAIL  {error}", kind.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_defaults_to_all() {
        let parsed = parse(&[]).unwrap();
        assert_eq!(parsed.scenario, None);
        assert!(!parsed.json);
    }

    #[test]
    fn test_parse_scenario_and_flags() {
        let parsed = parse(&args(&["mutex", "--json", "--config", "x.toml"])).unwrap();
        assert_eq!(parsed.scenario, Some(ScenarioKind::Mutex));
        assert!(parsed.json);
        assert_eq!(parsed.config_path.unwrap().to_str(), Some("x.toml"));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(parse(&args(&["spin"])).is_err());
        assert!(matches!(parse(&args(&["--fast"])), Err(CliError::Usage(_))));
    }
}
