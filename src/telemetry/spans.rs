//! Span helpers for scenario runs.

use tracing::{info_span, Span};

use crate::scenario::{ScenarioKind, ScenarioReport};

/// Extension trait for recording outcomes into spans.
pub trait SpanExt {
    /// Record `status` and, on failure, `error.message`.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;

    /// Record the totals and timing of a finished scenario.
    fn record_report(&self, report: &ScenarioReport);
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }

    fn record_report(&self, report: &ScenarioReport) {
        self.record("threads", report.thread_ids.len());
        self.record("observed_total", report.observed_total);
        self.record("elapsed_ms", report.elapsed_ms);
    }
}

/// Factory for scenario spans.
pub struct ScenarioSpan;

impl ScenarioSpan {
    /// `status`, `error.message`, `threads`, `observed_total` and
    /// `elapsed_ms` start empty and are filled in through [`SpanExt`].
    pub fn new(kind: ScenarioKind, max_threads: usize) -> Span {
        info_span!(
            "scenario",
            name = %kind,
            max_threads,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            threads = tracing::field::Empty,
            observed_total = tracing::field::Empty,
            elapsed_ms = tracing::field::Empty,
        )
    }

    pub fn termination(mode: &str, initiator: &str, task: &str) -> Span {
        info_span!("termination", mode = %mode, initiator = %initiator, task = %task)
    }
}
