//! Pipeline configuration.
//!
//! Loaded once at process start from a TOML file, overlaid with secrets from
//! the environment, validated, and then passed by reference to every stage.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::logging::LogLevel;

pub const ENV_API_KEY: &str = "OPENWEATHER_API_KEY";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_OUTPUT_PATH: &str = "CITYWEATHER_OUTPUT_PATH";

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// `@hourly`, `@daily`, `@weekly` or `<n>s|m|h|d`.
    #[serde(default = "default_schedule")]
    pub schedule: String,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_table")]
    pub table: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_units")]
    pub units: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    /// File name inside `dir`. Empty disables file logging.
    #[serde(default = "default_log_file")]
    pub file: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default = "default_subject")]
    pub subject: String,
    /// `{execution_date}` is replaced with the run's completion time.
    #[serde(default = "default_body_template")]
    pub body_template: String,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn default_schedule() -> String {
    "@daily".into()
}
fn default_csv_path() -> PathBuf {
    PathBuf::from("cities.csv")
}
fn default_database_url() -> String {
    "postgres://localhost/weather".into()
}
fn default_table() -> String {
    "weather_data".into()
}
fn default_api_url() -> String {
    "http://api.openweathermap.org/data/2.5/weather".into()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_units() -> String {
    "metric".into()
}
fn default_output_path() -> PathBuf {
    PathBuf::from("final_output.csv")
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}
fn default_log_file() -> String {
    "pipeline.log".into()
}
fn default_retention_days() -> u64 {
    7
}
fn default_subject() -> String {
    "Weather Data Pipeline - Execution Complete".into()
}
fn default_body_template() -> String {
    "<h3>Weather Data Pipeline Execution Summary</h3>\n\
     <p>The weather data pipeline has completed successfully.</p>\n\
     <ul>\n    <li><strong>Execution Date: </strong> {execution_date}</li>\n</ul>\n\
     <p>Weather data has been successfully loaded into the database.</p>\n"
        .into()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            table: default_table(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
            units: default_units(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: default_log_dir(),
            file: default_log_file(),
            retention_days: default_retention_days(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            subject: default_subject(),
            body_template: default_body_template(),
            webhook_url: None,
        }
    }
}

impl PipelineConfig {
    /// Read, overlay the process environment, and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Overlay secrets and deployment paths. `lookup` is `std::env::var` in
    /// production and a map in tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.is_empty()) {
            self.weather.api_key = key;
        }
        if let Some(url) = lookup(ENV_DATABASE_URL).filter(|v| !v.is_empty()) {
            self.database.url = url;
        }
        if let Some(path) = lookup(ENV_OUTPUT_PATH).filter(|v| !v.is_empty()) {
            self.output.path = PathBuf::from(path);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.weather.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "weather.api_key is empty (set it in the config or {})",
                ENV_API_KEY
            )));
        }
        if self.weather.timeout_secs == 0 {
            return Err(ConfigError::Invalid("weather.timeout_secs must be > 0".into()));
        }
        if !is_sql_identifier(&self.database.table) {
            return Err(ConfigError::Invalid(format!(
                "database.table '{}' is not a plain SQL identifier",
                self.database.table
            )));
        }
        self.schedule_interval()?;
        self.log_level()?;
        Ok(())
    }

    pub fn schedule_interval(&self) -> Result<Duration, ConfigError> {
        parse_schedule(&self.schedule)
    }

    pub fn log_level(&self) -> Result<LogLevel, ConfigError> {
        self.logging.level.parse().map_err(ConfigError::Invalid)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.weather.timeout_secs)
    }

    /// Full path of the log file, or `None` when file logging is disabled.
    pub fn log_file_path(&self) -> Option<PathBuf> {
        if self.logging.file.trim().is_empty() {
            None
        } else {
            Some(self.logging.dir.join(&self.logging.file))
        }
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes (PostgreSQL's NAMEDATALEN - 1).
pub fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a schedule preset or a `<n><unit>` interval.
pub fn parse_schedule(schedule: &str) -> Result<Duration, ConfigError> {
    let s = schedule.trim();
    let secs = match s {
        "@hourly" => 3_600,
        "@daily" => 86_400,
        "@weekly" => 604_800,
        _ => {
            let invalid = || ConfigError::Invalid(format!("unrecognized schedule '{}'", schedule));
            let split = s.len().checked_sub(1).ok_or_else(invalid)?;
            if !s.is_char_boundary(split) {
                return Err(invalid());
            }
            let (count, unit) = s.split_at(split);
            let count: u64 = count.parse().map_err(|_| invalid())?;
            let multiplier = match unit {
                "s" => 1,
                "m" => 60,
                "h" => 3_600,
                "d" => 86_400,
                _ => return Err(invalid()),
            };
            if count == 0 {
                return Err(invalid());
            }
            count.checked_mul(multiplier).ok_or_else(invalid)?
        }
    };
    Ok(Duration::from_secs(secs))
}
