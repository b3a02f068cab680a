//! Structured logging and scenario spans.

mod logging;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use spans::{ScenarioSpan, SpanExt};
