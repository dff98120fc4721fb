/// Core data types for the city weather ETL service.
///
/// This module defines the records that flow between pipeline stages.
/// It contains no I/O; only types, the identity key helper and the fixed
/// output column order.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Column order
// ---------------------------------------------------------------------------

/// Column order of the destination table, the CSV export and every
/// serialized `MergedRecord`. `MergedRecord`'s field declaration order must
/// match this list.
pub const COLUMN_ORDER: [&str; 5] = [
    "city",
    "country",
    "population",
    "temperature",
    "weather_description",
];

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// One row of the normalized city reference list.
///
/// `city` and `country` are trimmed and encoding-repaired; together they form
/// the identity key. `population` is `None` when the raw population cells
/// could not be reassembled into an integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityRecord {
    pub city: String,
    pub country: String, // ISO 3166 alpha-2, e.g. "BR"
    pub population: Option<i64>,
}

impl CityRecord {
    pub fn key(&self) -> (&str, &str) {
        (&self.city, &self.country)
    }
}

/// Current weather for one city, built only from a fully valid API response.
///
/// `city` and `country` carry the values that were queried rather than the
/// API's own spelling, so the record joins back to its `CityRecord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub city: String,
    pub country: String,
    pub temperature: f64, // degrees, in the configured units
    pub weather_description: String,
}

impl WeatherRecord {
    pub fn key(&self) -> (&str, &str) {
        (&self.city, &self.country)
    }
}

/// A city joined with its weather, in destination column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub city: String,
    pub country: String,
    pub population: Option<i64>,
    pub temperature: f64,
    pub weather_description: String,
}

/// Name of a city whose lookup yielded no weather. Reported at the end of a
/// run, never retried.
pub type FailedCity = String;

// ---------------------------------------------------------------------------
// Lookup outcomes
// ---------------------------------------------------------------------------

/// Why a single lookup produced no `WeatherRecord`.
#[derive(Debug, Clone, PartialEq)]
pub enum Absence {
    /// The API does not know the city (HTTP 404).
    NotFound,
    /// Any other non-success status besides 401.
    HttpStatus(u16),
    /// The request exceeded the configured timeout.
    Timeout,
    /// Connection refused, DNS failure, body read failure, etc.
    Connection(String),
    /// A 200 response whose payload lacked a required field.
    Malformed(String),
}

impl std::fmt::Display for Absence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Absence::NotFound => write!(f, "City not found"),
            Absence::HttpStatus(code) => write!(f, "HTTP error: {}", code),
            Absence::Timeout => write!(f, "Request timeout"),
            Absence::Connection(msg) => write!(f, "Connection error: {}", msg),
            Absence::Malformed(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

/// Result of one successful round trip to the weather API.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(WeatherRecord),
    Absent(Absence),
}

/// Output of the bulk lookup coordinator: successes and the names of the
/// cities that produced no weather, both in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkLookup {
    pub weather: Vec<WeatherRecord>,
    pub failed: Vec<FailedCity>,
}
