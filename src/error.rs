//! Error types for the city weather pipeline.
//!
//! One enum per stage. Fatal stage errors are collected into `PipelineError`;
//! per-city lookup absences are not errors and live in `model::Absence`.

use std::path::PathBuf;

use thiserror::Error;

/// Loading or parsing the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Reading the city reference list.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("City source {path} is unreadable: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("City source is missing required column '{0}'")]
    MissingColumn(&'static str),
}

/// Fatal weather API errors. Per-city failures are `model::Absence` instead.
#[derive(Error, Debug)]
pub enum WeatherError {
    /// HTTP 401: the credential is broken for every city, not just one.
    #[error("Weather API authentication failed. Check the API key.")]
    Unauthorized,

    #[error("No cities to look up")]
    NoCities,

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Contract violations of the merge step.
#[derive(Error, Debug, PartialEq)]
pub enum MergeError {
    #[error("Missing data for merge operation: no city records")]
    NoCities,

    #[error("Missing data for merge operation: no weather records")]
    NoWeather,
}

/// Writing to or reading from the destination table.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("No merged data to load")]
    NothingToLoad,

    #[error("Invalid table name '{0}'")]
    InvalidTable(String),

    #[error("Population {value} for {city} does not fit the INTEGER column")]
    PopulationOutOfRange { city: String, value: i64 },

    #[error("Database error: {0}")]
    Postgres(#[from] postgres::Error),
}

/// Sending the completion notification. Never fatal.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification endpoint returned HTTP {0}")]
    Status(u16),
}

/// A stage failure that ends the run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Loading cities failed: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Weather lookup failed: {0}")]
    Weather(#[from] WeatherError),

    #[error("Merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("Database load failed: {0}")]
    Persist(#[from] PersistError),
}
