/// Joins the normalized city list with the weather lookups.
///
/// Inner join on (city, country). Cities without weather are dropped, as are
/// weather records without a city. Output rows follow the order in which
/// keys first appear in the city input, so repeated runs over the same
/// inputs produce identical tables.

use std::collections::{HashMap, HashSet};

use crate::error::MergeError;
use crate::logging::{self, Stage};
use crate::model::{CityRecord, MergedRecord, WeatherRecord};

/// Inner-join `cities` with `weather`.
///
/// Either input being empty is a contract violation: it means an upstream
/// stage produced nothing, which this pipeline treats as a failure rather
/// than a legitimately empty dataset.
pub fn merge_city_weather(
    cities: &[CityRecord],
    weather: &[WeatherRecord],
) -> Result<Vec<MergedRecord>, MergeError> {
    if cities.is_empty() {
        logging::error(Stage::Merge, None, "Missing city data for merge operation");
        return Err(MergeError::NoCities);
    }
    if weather.is_empty() {
        logging::error(Stage::Merge, None, "Missing weather data for merge operation");
        return Err(MergeError::NoWeather);
    }

    logging::info(
        Stage::Merge,
        None,
        &format!(
            "Merging {} cities with {} weather records",
            cities.len(),
            weather.len()
        ),
    );

    // First record wins if a key repeats
    let mut by_key: HashMap<(&str, &str), &WeatherRecord> = HashMap::with_capacity(weather.len());
    for record in weather {
        by_key.entry(record.key()).or_insert(record);
    }

    let mut emitted: HashSet<(&str, &str)> = HashSet::with_capacity(weather.len());
    let merged: Vec<MergedRecord> = cities
        .iter()
        .filter_map(|city| {
            let key = city.key();
            let w = by_key.get(&key)?;
            if !emitted.insert(key) {
                return None;
            }
            Some(MergedRecord {
                city: city.city.clone(),
                country: city.country.clone(),
                population: city.population,
                temperature: w.temperature,
                weather_description: w.weather_description.clone(),
            })
        })
        .collect();

    logging::info(
        Stage::Merge,
        None,
        &format!("Number of cities after merging: {}", merged.len()),
    );

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city(name: &str, country: &str, population: Option<i64>) -> CityRecord {
        CityRecord {
            city: name.to_string(),
            country: country.to_string(),
            population,
        }
    }

    fn weather(name: &str, country: &str, temperature: f64) -> WeatherRecord {
        WeatherRecord {
            city: name.to_string(),
            country: country.to_string(),
            temperature,
            weather_description: format!("weather in {}", name),
        }
    }

    #[test]
    fn test_seven_of_ten_cities_with_weather_yield_seven_rows() {
        let cities: Vec<CityRecord> = (0..10)
            .map(|i| city(&format!("City{}", i), "ZZ", Some(i * 1_000)))
            .collect();
        let weather: Vec<WeatherRecord> = [0, 1, 3, 4, 6, 8, 9]
            .iter()
            .map(|i| weather(&format!("City{}", i), "ZZ", *i as f64))
            .collect();

        let merged = merge_city_weather(&cities, &weather).unwrap();

        assert_eq!(merged.len(), 7);
        let names: Vec<&str> = merged.iter().map(|m| m.city.as_str()).collect();
        assert_eq!(
            names,
            vec!["City0", "City1", "City3", "City4", "City6", "City8", "City9"]
        );
    }

    #[test]
    fn test_join_requires_both_city_and_country_to_match() {
        let cities = vec![city("Portland", "US", Some(650_000)), city("Perth", "AU", None)];
        let weather = vec![weather("Portland", "GB", 9.0), weather("Perth", "AU", 31.0)];

        let merged = merge_city_weather(&cities, &weather).unwrap();

        assert_eq!(
            merged,
            vec![MergedRecord {
                city: "Perth".to_string(),
                country: "AU".to_string(),
                population: None,
                temperature: 31.0,
                weather_description: "weather in Perth".to_string(),
            }]
        );
    }

    #[test]
    fn test_weather_without_city_is_dropped() {
        let cities = vec![city("Accra", "GH", Some(2_500_000))];
        let weather = vec![weather("Accra", "GH", 28.0), weather("Kumasi", "GH", 26.0)];

        let merged = merge_city_weather(&cities, &weather).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].population, Some(2_500_000));
    }

    #[test]
    fn test_repeated_keys_produce_exactly_one_row() {
        let cities = vec![city("Doha", "QA", Some(1)), city("Doha", "QA", Some(2))];
        let weather = vec![weather("Doha", "QA", 35.0), weather("Doha", "QA", 99.0)];

        let merged = merge_city_weather(&cities, &weather).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].population, Some(1));
        assert_eq!(merged[0].temperature, 35.0);
    }

    #[test]
    fn test_merge_is_deterministic() {
        let cities = vec![city("B", "X", None), city("A", "X", None), city("C", "X", None)];
        let weather = vec![weather("C", "X", 1.0), weather("A", "X", 2.0), weather("B", "X", 3.0)];
        let first = merge_city_weather(&cities, &weather).unwrap();
        for _ in 0..5 {
            assert_eq!(merge_city_weather(&cities, &weather).unwrap(), first);
        }
    }

    #[test]
    fn test_empty_city_input_is_an_error() {
        let weather = vec![weather("Quito", "EC", 14.0)];
        assert_eq!(merge_city_weather(&[], &weather), Err(MergeError::NoCities));
    }

    // Zero weather successes (e.g. the API being down for every city) is
    // treated as a failed run, not as an empty table.
    #[test]
    fn test_empty_weather_input_is_an_error() {
        let cities = vec![city("Quito", "EC", Some(2_800_000))];
        assert_eq!(merge_city_weather(&cities, &[]), Err(MergeError::NoWeather));
    }

    #[test]
    fn test_disjoint_inputs_give_empty_output_not_error() {
        let cities = vec![city("Hanoi", "VN", None)];
        let weather = vec![weather("Hue", "VN", 25.0)];
        assert_eq!(merge_city_weather(&cities, &weather).unwrap(), vec![]);
    }
}
