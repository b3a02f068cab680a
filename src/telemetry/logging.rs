//! Logging configuration and initialization for the harness.
//!
//! Logs always go to stderr or a file so that reports printed on stdout
//! stay machine-readable.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logging.
    #[default]
    Json,
    /// Human-readable output for interactive runs.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(LogError::InvalidFormat(other.to_string())),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Filter directive (e.g. "info", "thread_harness::sync=debug").
    pub level: String,
    /// Optional file path for log output. If None, logs to stderr.
    pub output_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "info".to_string(),
            output_path: None,
        }
    }
}

impl LogConfig {
    /// Read `THREAD_HARNESS_LOG`, `THREAD_HARNESS_LOG_FORMAT` and
    /// `THREAD_HARNESS_LOG_FILE`. Unknown formats keep the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            format: std::env::var("THREAD_HARNESS_LOG_FORMAT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.format),
            level: std::env::var("THREAD_HARNESS_LOG").unwrap_or(defaults.level),
            output_path: std::env::var_os("THREAD_HARNESS_LOG_FILE").map(PathBuf::from),
        }
    }
}

/// Errors that can occur during logging initialization.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),
    #[error("Failed to open log file: {0}")]
    FileOpen(String),
    #[error("Subscriber already initialized")]
    AlreadyInitialized,
}

/// Install the global subscriber. Call once, before the first scenario.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| LogError::InvalidFilter(e.to_string()))?;
    let registry = tracing_subscriber::registry().with(filter);

    match (&config.output_path, config.format) {
        (Some(path), format) => {
            let file = std::fs::File::create(path)
                .map_err(|e| LogError::FileOpen(format!("{}: {e}", path.display())))?;
            let writer = std::sync::Mutex::new(file);
            match format {
                LogFormat::Json => registry
                    .with(fmt::layer().json().with_thread_names(true).with_writer(writer))
                    .try_init(),
                LogFormat::Pretty => registry
                    .with(fmt::layer().with_ansi(false).with_thread_names(true).with_writer(writer))
                    .try_init(),
            }
        }
        (None, LogFormat::Json) => registry
            .with(fmt::layer().json().with_thread_names(true).with_writer(std::io::stderr))
            .try_init(),
        (None, LogFormat::Pretty) => registry
            .with(fmt::layer().pretty().with_thread_names(true).with_writer(std::io::stderr))
            .try_init(),
    }
    .map_err(|_| LogError::AlreadyInitialized)
}
