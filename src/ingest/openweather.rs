/// OpenWeatherMap current-weather client
///
/// Issues one time-bounded GET per city and maps the outcome to a validated
/// `WeatherRecord`, a classified `Absence`, or, for a rejected credential, a
/// fatal `WeatherError`. No retries.
///
/// API Documentation: https://openweathermap.org/current

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::WeatherConfig;
use crate::error::WeatherError;
use crate::logging::{self, Stage};
use crate::model::{Absence, Lookup, WeatherRecord};

// ============================================================================
// API Response Structures
// ============================================================================

/// The subset of the current-weather payload the pipeline needs. Every field
/// here is required; a payload missing any of them is rejected whole.
#[derive(Debug, Deserialize)]
pub struct OwmCurrentResponse {
    pub main: OwmMain,
    pub weather: Vec<OwmCondition>,
}

#[derive(Debug, Deserialize)]
pub struct OwmMain {
    pub temp: f64,
}

#[derive(Debug, Deserialize)]
pub struct OwmCondition {
    pub description: String,
}

// ============================================================================
// Lookup seam
// ============================================================================

/// Anything that can answer "what is the weather in this city right now".
pub trait WeatherLookup {
    /// `Ok(Lookup::Absent(_))` for every per-city failure; `Err` only when
    /// continuing with other cities is pointless.
    fn lookup(&self, city: &str, country: &str) -> Result<Lookup, WeatherError>;
}

// ============================================================================
// API Client
// ============================================================================

pub struct OpenWeatherClient {
    http: reqwest::blocking::Client,
    api_url: String,
    api_key: String,
    units: String,
}

impl OpenWeatherClient {
    pub fn new(
        api_url: &str,
        api_key: &str,
        units: &str,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            units: units.to_string(),
        })
    }

    pub fn from_config(config: &WeatherConfig) -> Result<Self, WeatherError> {
        Self::new(
            &config.api_url,
            &config.api_key,
            &config.units,
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Fetch current weather for one city.
    pub fn fetch_weather(&self, city: &str, country: &str) -> Result<Lookup, WeatherError> {
        let query = format!("{},{}", city, country);

        let response = self
            .http
            .get(&self.api_url)
            .query(&[
                ("q", query.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", self.units.as_str()),
            ])
            .header("Accept", "application/json")
            .send();

        let outcome = match response {
            Ok(response) => {
                let status = response.status();
                match response.text() {
                    Ok(body) => interpret_response(status, &body, city, country)?,
                    Err(e) => Lookup::Absent(transport_absence(&e)),
                }
            }
            Err(e) => Lookup::Absent(transport_absence(&e)),
        };

        match &outcome {
            Lookup::Found(_) => logging::debug(
                Stage::Weather,
                Some(city),
                &format!("Successfully retrieved weather for {}", city),
            ),
            Lookup::Absent(absence) => logging::log_lookup_absence(city, country, absence),
        }

        Ok(outcome)
    }
}

impl WeatherLookup for OpenWeatherClient {
    fn lookup(&self, city: &str, country: &str) -> Result<Lookup, WeatherError> {
        self.fetch_weather(city, country)
    }
}

// ============================================================================
// Response interpretation
// ============================================================================

/// Map an HTTP status and body to a lookup outcome.
///
/// 401 is the only fatal status: the credential is broken for every city.
pub fn interpret_response(
    status: StatusCode,
    body: &str,
    city: &str,
    country: &str,
) -> Result<Lookup, WeatherError> {
    match status.as_u16() {
        200 => Ok(match parse_weather(body, city, country) {
            Ok(record) => Lookup::Found(record),
            Err(msg) => Lookup::Absent(Absence::Malformed(msg)),
        }),
        404 => Ok(Lookup::Absent(Absence::NotFound)),
        401 => {
            logging::error(
                Stage::Weather,
                Some(city),
                "API authentication failed. Check your API key.",
            );
            Err(WeatherError::Unauthorized)
        }
        other => Ok(Lookup::Absent(Absence::HttpStatus(other))),
    }
}

/// Validate a 200 payload into a complete record, or explain why not.
pub fn parse_weather(body: &str, city: &str, country: &str) -> Result<WeatherRecord, String> {
    let response: OwmCurrentResponse = serde_json::from_str(body).map_err(|e| e.to_string())?;

    let condition = response
        .weather
        .into_iter()
        .next()
        .ok_or("weather array is empty")?;

    if !response.main.temp.is_finite() {
        return Err(format!("temperature is not finite: {}", response.main.temp));
    }

    Ok(WeatherRecord {
        city: city.to_string(),
        country: country.to_string(),
        temperature: response.main.temp,
        weather_description: condition.description,
    })
}

fn transport_absence(err: &reqwest::Error) -> Absence {
    if err.is_timeout() {
        Absence::Timeout
    } else {
        Absence::Connection(err.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
