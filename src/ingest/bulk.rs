/// Bulk weather lookup over the normalized city list
///
/// Cities are looked up one at a time, in input order. Successes and
/// failures are partitioned; only a fatal lookup error stops the loop.

use crate::error::WeatherError;
use crate::ingest::openweather::WeatherLookup;
use crate::logging::{self, Stage};
use crate::model::{BulkLookup, CityRecord, Lookup};

/// Look up every city and partition the results.
///
/// Returns `WeatherError::NoCities` for an empty list. An `Unauthorized`
/// error aborts immediately; cities after it are never requested.
pub fn fetch_weather_bulk(
    lookup: &dyn WeatherLookup,
    cities: &[CityRecord],
) -> Result<BulkLookup, WeatherError> {
    if cities.is_empty() {
        logging::error(Stage::Weather, None, "No cities data to look up");
        return Err(WeatherError::NoCities);
    }

    logging::info(
        Stage::Weather,
        None,
        &format!("Calling weather API for {} cities", cities.len()),
    );

    let mut result = BulkLookup::default();

    for city in cities {
        match lookup.lookup(&city.city, &city.country)? {
            Lookup::Found(record) => result.weather.push(record),
            Lookup::Absent(_) => result.failed.push(city.city.clone()),
        }
    }

    logging::log_stage_summary(
        Stage::Weather,
        cities.len(),
        result.weather.len(),
        result.failed.len(),
    );
    if !result.failed.is_empty() {
        logging::warn(
            Stage::Weather,
            None,
            &format!(
                "Failed to get weather for {} cities: {:?}",
                result.failed.len(),
                result.failed
            ),
        );
    }

    Ok(result)
}
