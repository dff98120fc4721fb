/// Structured logging for the city weather pipeline
///
/// Every log line carries the pipeline stage that emitted it and, where it
/// applies, the city being processed. Output goes to the console and,
/// optionally, to a plain-text file in the configured log directory so the
/// retention housekeeping has something to prune.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt};

use crate::model::Absence;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Directive understood by `EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Source,
    Weather,
    Merge,
    Database,
    Cleanup,
    Notify,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Source => write!(f, "CSV"),
            Stage::Weather => write!(f, "OWM"),
            Stage::Merge => write!(f, "MERGE"),
            Stage::Database => write!(f, "DB"),
            Stage::Cleanup => write!(f, "CLEANUP"),
            Stage::Notify => write!(f, "NOTIFY"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the city is simply unknown to the weather service
    Expected,
    /// Unexpected failure - indicates service degradation or an API change
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Setup
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Failed to open log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to install log subscriber: {0}")]
    Init(String),
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `min_level`. When `log_file` is given its
/// parent directory is created and lines are appended without ANSI colours.
pub fn init_logger(min_level: LogLevel, log_file: Option<&Path>) -> Result<(), LoggerError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(min_level.as_filter()));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggerError::Init(e.to_string()))
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(stage: Stage, city: Option<&str>, message: &str) {
    tracing::info!(stage = %stage, city = city.unwrap_or("-"), "{}", message);
}

/// Log a warning message
pub fn warn(stage: Stage, city: Option<&str>, message: &str) {
    tracing::warn!(stage = %stage, city = city.unwrap_or("-"), "{}", message);
}

/// Log an error message
pub fn error(stage: Stage, city: Option<&str>, message: &str) {
    tracing::error!(stage = %stage, city = city.unwrap_or("-"), "{}", message);
}

/// Log a debug message
pub fn debug(stage: Stage, city: Option<&str>, message: &str) {
    tracing::debug!(stage = %stage, city = city.unwrap_or("-"), "{}", message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify why a weather lookup came back empty.
pub fn classify_absence(absence: &Absence) -> FailureType {
    match absence {
        Absence::NotFound => FailureType::Expected,
        // Throttling and server-side trouble point at the service, not the city
        Absence::HttpStatus(code) if *code == 429 || *code >= 500 => FailureType::Unexpected,
        Absence::HttpStatus(_) => FailureType::Unknown,
        Absence::Timeout | Absence::Connection(_) => FailureType::Unexpected,
        // Payload shape changed under us
        Absence::Malformed(_) => FailureType::Unexpected,
    }
}

/// Log a lookup absence with automatic classification
pub fn log_lookup_absence(city: &str, country: &str, absence: &Absence) {
    let failure_type = classify_absence(absence);
    let message = format!(
        "Weather lookup for {}, {} failed [{}]: {}",
        city,
        country,
        failure_type,
        absence
    );

    match failure_type {
        FailureType::Expected => info(Stage::Weather, Some(city), &message),
        FailureType::Unexpected | FailureType::Unknown => {
            warn(Stage::Weather, Some(city), &message)
        }
    }
}

// ---------------------------------------------------------------------------
// Stage Summary Logging
// ---------------------------------------------------------------------------

/// Log a count-based summary of a stage
pub fn log_stage_summary(stage: Stage, total: usize, successful: usize, failed: usize) {
    let message = format!(
        "Stage complete: {}/{} successful, {} failed",
        successful,
        total,
        failed
    );

    if failed == 0 {
        info(stage, None, &message);
    } else if successful == 0 {
        error(stage, None, &message);
    } else {
        warn(stage, None, &message);
    }
}
