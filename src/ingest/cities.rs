/// City reference list loader
///
/// Reads the raw city CSV, cleans the identity columns, repairs a fixed set
/// of known mis-encoded names, reassembles population figures that were
/// split across several columns, and drops duplicate (city, country) rows.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::NormalizeError;
use crate::logging::{self, Stage};
use crate::model::CityRecord;

const CITY_COLUMN: &str = "city";
const COUNTRY_COLUMN: &str = "country";

/// Literal replacements for city names that arrive UTF-8 encoded but were
/// decoded as Latin-1 somewhere upstream. Substring replacement, applied in
/// order.
pub const ENCODING_FIXES: &[(&str, &str)] = &[
    ("SÃ£o Paulo", "São Paulo"),
    ("BogotÃ¡", "Bogotá"),
    ("MÃ©xico", "México"),
    ("ZÃ¼rich", "Zürich"),
    ("KÃ¶ln", "Köln"),
];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load and normalize the city list at `path`.
///
/// A missing or unreadable file is fatal; there is no empty fallback.
pub fn load_cities(path: &Path) -> Result<Vec<CityRecord>, NormalizeError> {
    logging::info(
        Stage::Source,
        None,
        &format!("Loading CSV file from: {}", path.display()),
    );

    let file = File::open(path).map_err(|e| {
        logging::error(
            Stage::Source,
            None,
            &format!("CSV file not found at: {}", path.display()),
        );
        NormalizeError::Unreadable {
            path: path.to_path_buf(),
            source: e.into(),
        }
    })?;

    normalize_reader(file)
}

/// Normalize CSV text from any reader. The first row must be a header.
pub fn normalize_reader<R: Read>(reader: R) -> Result<Vec<CityRecord>, NormalizeError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // short rows read as empty trailing cells
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let city_idx = headers
        .iter()
        .position(|h| h == CITY_COLUMN)
        .ok_or(NormalizeError::MissingColumn(CITY_COLUMN))?;
    let country_idx = headers
        .iter()
        .position(|h| h == COUNTRY_COLUMN)
        .ok_or(NormalizeError::MissingColumn(COUNTRY_COLUMN))?;
    let population_idx: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| *h != CITY_COLUMN && *h != COUNTRY_COLUMN)
        .map(|(i, _)| i)
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let cell = |i: usize| record.get(i).unwrap_or("");

        let raw_population: String = population_idx.iter().map(|&i| cell(i)).collect();

        rows.push(CityRecord {
            city: repair_encoding(cell(city_idx).trim()),
            country: cell(country_idx).trim().to_string(),
            population: parse_population(&raw_population),
        });
    }

    logging::info(
        Stage::Source,
        None,
        &format!("Successfully loaded {} cities from CSV", rows.len()),
    );

    let distinct = dedupe_cities(rows);

    logging::info(
        Stage::Source,
        None,
        &format!("After removing duplicates: {} cities", distinct.len()),
    );

    Ok(distinct)
}

// ---------------------------------------------------------------------------
// Cleaning helpers
// ---------------------------------------------------------------------------

/// Apply `ENCODING_FIXES` to a city name.
pub fn repair_encoding(city: &str) -> String {
    ENCODING_FIXES
        .iter()
        .fold(city.to_string(), |name, (bad, good)| name.replace(bad, good))
}

/// Strip spaces, thousands separators and periods from the concatenated
/// population cells, then parse. Anything unparseable is `None`.
pub fn parse_population(raw: &str) -> Option<i64> {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | ',' | '.'))
        .collect();
    digits.parse().ok()
}

/// Keep the first row for each (city, country) key, preserving input order.
pub fn dedupe_cities(rows: Vec<CityRecord>) -> Vec<CityRecord> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert((row.city.clone(), row.country.clone())))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
