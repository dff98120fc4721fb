/// End-to-end tests for a full pipeline run
///
/// These tests drive `pipeline::run_with` with a scripted weather lookup, an
/// in-memory table and a recording notifier, so they need neither network
/// access nor a database. The city list and the CSV export live in a
/// temporary directory.
///
/// Run with: cargo test --test pipeline_integration

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use cityweather_service::config::PipelineConfig;
use cityweather_service::db::TableWriter;
use cityweather_service::error::{
    MergeError, NormalizeError, NotifyError, PersistError, PipelineError, WeatherError,
};
use cityweather_service::ingest::openweather::WeatherLookup;
use cityweather_service::model::{Absence, COLUMN_ORDER, Lookup, MergedRecord, WeatherRecord};
use cityweather_service::notify::{Notification, Notifier};
use cityweather_service::pipeline::run_with;
use cityweather_service::verify::VerificationStatus;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const CITIES_CSV: &str = "city,country,population,population_2\n\
    SÃ£o Paulo ,BR,\"12,325\",000\n\
    Lagos,NG,15 388 000,\n\
    Atlantis,GR,1,\n\
    Lagos,NG,1,\n\
    Toronto, CA ,2.794.356,\n\
    Springfield,US,unknown,\n";

/// Temperatures by city; cities not listed are reported as not found.
struct ScriptedLookup {
    known: Vec<(&'static str, f64)>,
    reject_key: bool,
    calls: RefCell<Vec<String>>,
}

impl ScriptedLookup {
    fn new(known: Vec<(&'static str, f64)>) -> Self {
        Self {
            known,
            reject_key: false,
            calls: RefCell::new(Vec::new()),
        }
    }

    fn rejecting_key() -> Self {
        Self {
            known: Vec::new(),
            reject_key: true,
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl WeatherLookup for ScriptedLookup {
    fn lookup(&self, city: &str, country: &str) -> Result<Lookup, WeatherError> {
        self.calls.borrow_mut().push(city.to_string());
        if self.reject_key {
            return Err(WeatherError::Unauthorized);
        }
        Ok(match self.known.iter().find(|(name, _)| *name == city) {
            Some((_, temperature)) => Lookup::Found(WeatherRecord {
                city: city.to_string(),
                country: country.to_string(),
                temperature: *temperature,
                weather_description: "broken clouds".to_string(),
            }),
            None => Lookup::Absent(Absence::NotFound),
        })
    }
}

#[derive(Default)]
struct MemoryTable {
    rows: Vec<MergedRecord>,
    replace_calls: usize,
    fail_write: bool,
    fail_read: bool,
}

impl TableWriter for MemoryTable {
    fn replace_table(&mut self, rows: &[MergedRecord]) -> Result<u64, PersistError> {
        self.replace_calls += 1;
        if self.fail_write {
            return Err(PersistError::InvalidTable("memory".to_string()));
        }
        self.rows = rows.to_vec();
        Ok(rows.len() as u64)
    }

    fn read_table(&mut self) -> Result<Vec<MergedRecord>, PersistError> {
        if self.fail_read {
            return Err(PersistError::InvalidTable("memory".to_string()));
        }
        Ok(self.rows.clone())
    }

    fn table_name(&self) -> &str {
        "weather_data"
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: RefCell<Vec<Notification>>,
    fail: bool,
}

impl Notifier for RecordingNotifier {
    fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Status(503));
        }
        self.sent.borrow_mut().push(notification.clone());
        Ok(())
    }
}

fn test_config(dir: &Path, csv: Option<&str>) -> PipelineConfig {
    let mut config = PipelineConfig::from_toml_str(
        r#"
        [weather]
        api_key = "test-key"

        [notification]
        recipients = ["ops@example.com"]
        body_template = "Completed at {execution_date}"
        "#,
    )
    .expect("test config should parse");

    let csv_path = dir.join("cities.csv");
    if let Some(text) = csv {
        fs::write(&csv_path, text).expect("write cities.csv");
    }
    config.source.csv_path = csv_path;
    config.output.path = dir.join("out").join("final_output.csv");
    config.logging.dir = dir.join("logs");
    config
}

fn setup(csv: Option<&str>) -> (TempDir, PipelineConfig) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = test_config(dir.path(), csv);
    (dir, config)
}

// ---------------------------------------------------------------------------
// Successful runs
// ---------------------------------------------------------------------------

#[test]
fn test_full_run_loads_only_cities_with_weather() {
    let (_dir, config) = setup(Some(CITIES_CSV));
    let lookup = ScriptedLookup::new(vec![
        ("São Paulo", 24.0),
        ("Lagos", 29.5),
        ("Toronto", -3.0),
        ("Springfield", 11.0),
    ]);
    let mut table = MemoryTable::default();
    let notifier = RecordingNotifier::default();

    let report = run_with(&config, &lookup, &mut table, &notifier).expect("run should succeed");

    // Duplicate Lagos row removed before lookups
    assert_eq!(report.cities_loaded, 5);
    assert_eq!(lookup.calls.borrow().len(), 5);
    assert_eq!(report.weather_found, 4);
    assert_eq!(report.failed_cities, vec!["Atlantis".to_string()]);
    assert_eq!(report.merged_rows, 4);
    assert_eq!(report.loaded_rows, 4);

    let by_city = |name: &str| table.rows.iter().find(|r| r.city == name).cloned();
    let sao_paulo = by_city("São Paulo").expect("encoding repaired before join");
    assert_eq!(sao_paulo.population, Some(12_325_000));
    assert_eq!(by_city("Lagos").unwrap().population, Some(15_388_000));
    assert_eq!(by_city("Toronto").unwrap().country, "CA");
    assert_eq!(by_city("Toronto").unwrap().population, Some(2_794_356));
    assert_eq!(by_city("Springfield").unwrap().population, None);
    assert!(by_city("Atlantis").is_none());

    let verification = report.verification.expect("read-back succeeded");
    assert_eq!(verification.status, VerificationStatus::Success);
    assert_eq!(verification.row_count, 4);
}

#[test]
fn test_run_writes_export_and_notifies() {
    let (_dir, config) = setup(Some(CITIES_CSV));
    let lookup = ScriptedLookup::new(vec![("Lagos", 29.5), ("Toronto", -3.0)]);
    let mut table = MemoryTable::default();
    let notifier = RecordingNotifier::default();

    let report = run_with(&config, &lookup, &mut table, &notifier).unwrap();

    let export = fs::read_to_string(&config.output.path).expect("export written");
    let mut lines = export.lines();
    assert_eq!(lines.next(), Some(COLUMN_ORDER.join(",").as_str()));
    assert_eq!(lines.count(), 2);

    let sent = notifier.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["ops@example.com".to_string()]);
    let expected_date = report.completed_at.format("%Y-%m-%d %H:%M:%S").to_string();
    assert_eq!(sent[0].body, format!("Completed at {}", expected_date));
}

#[test]
fn test_notification_failure_does_not_fail_run() {
    let (_dir, config) = setup(Some(CITIES_CSV));
    let lookup = ScriptedLookup::new(vec![("Lagos", 29.5)]);
    let mut table = MemoryTable::default();
    let notifier = RecordingNotifier {
        fail: true,
        ..Default::default()
    };

    let report = run_with(&config, &lookup, &mut table, &notifier);

    assert!(report.is_ok());
    assert_eq!(table.rows.len(), 1);
}

#[test]
fn test_read_back_failure_is_diagnostic_only() {
    let (_dir, config) = setup(Some(CITIES_CSV));
    let lookup = ScriptedLookup::new(vec![("Lagos", 29.5)]);
    let mut table = MemoryTable {
        fail_read: true,
        ..Default::default()
    };
    let notifier = RecordingNotifier::default();

    let report = run_with(&config, &lookup, &mut table, &notifier).expect("run should succeed");

    assert!(report.verification.is_none());
    assert!(!config.output.path.exists());
    assert_eq!(notifier.sent.borrow().len(), 1);
}

// ---------------------------------------------------------------------------
// Fatal stage failures
// ---------------------------------------------------------------------------

#[test]
fn test_missing_city_file_stops_before_any_lookup() {
    let (_dir, config) = setup(None);
    let lookup = ScriptedLookup::new(vec![("Lagos", 29.5)]);
    let mut table = MemoryTable::default();
    let notifier = RecordingNotifier::default();

    let err = run_with(&config, &lookup, &mut table, &notifier).unwrap_err();

    assert!(matches!(err, PipelineError::Normalize(NormalizeError::Unreadable { .. })));
    assert!(lookup.calls.borrow().is_empty());
    assert!(notifier.sent.borrow().is_empty());
}

#[test]
fn test_rejected_api_key_aborts_after_first_lookup() {
    let (_dir, config) = setup(Some(CITIES_CSV));
    let lookup = ScriptedLookup::rejecting_key();
    let mut table = MemoryTable::default();
    let notifier = RecordingNotifier::default();

    let err = run_with(&config, &lookup, &mut table, &notifier).unwrap_err();

    assert!(matches!(err, PipelineError::Weather(WeatherError::Unauthorized)));
    assert_eq!(lookup.calls.borrow().len(), 1);
    assert_eq!(table.replace_calls, 0);
    assert!(notifier.sent.borrow().is_empty());
}

// Strict behaviour kept on purpose: no weather at all fails the run at the
// merge step instead of loading an empty table.
#[test]
fn test_no_weather_for_any_city_fails_at_merge() {
    let (_dir, config) = setup(Some(CITIES_CSV));
    let lookup = ScriptedLookup::new(Vec::new());
    let mut table = MemoryTable::default();
    let notifier = RecordingNotifier::default();

    let err = run_with(&config, &lookup, &mut table, &notifier).unwrap_err();

    assert!(matches!(err, PipelineError::Merge(MergeError::NoWeather)));
    assert_eq!(lookup.calls.borrow().len(), 5);
    assert_eq!(table.replace_calls, 0);
}

#[test]
fn test_header_only_city_file_fails_at_lookup() {
    let (_dir, config) = setup(Some("city,country,population\n"));
    let lookup = ScriptedLookup::new(vec![("Lagos", 29.5)]);
    let mut table = MemoryTable::default();
    let notifier = RecordingNotifier::default();

    let err = run_with(&config, &lookup, &mut table, &notifier).unwrap_err();

    assert!(matches!(err, PipelineError::Weather(WeatherError::NoCities)));
}

#[test]
fn test_write_failure_is_fatal_and_skips_notification() {
    let (_dir, config) = setup(Some(CITIES_CSV));
    let lookup = ScriptedLookup::new(vec![("Lagos", 29.5)]);
    let mut table = MemoryTable {
        fail_write: true,
        ..Default::default()
    };
    let notifier = RecordingNotifier::default();

    let err = run_with(&config, &lookup, &mut table, &notifier).unwrap_err();

    assert!(matches!(err, PipelineError::Persist(_)));
    assert_eq!(table.replace_calls, 1);
    assert!(notifier.sent.borrow().is_empty());
}

#[test]
fn test_repeated_runs_produce_identical_tables() {
    let (_dir, config) = setup(Some(CITIES_CSV));
    let known = vec![("São Paulo", 24.0), ("Lagos", 29.5), ("Toronto", -3.0)];
    let notifier = RecordingNotifier::default();

    let mut first = MemoryTable::default();
    run_with(&config, &ScriptedLookup::new(known.clone()), &mut first, &notifier).unwrap();
    let mut second = MemoryTable::default();
    run_with(&config, &ScriptedLookup::new(known), &mut second, &notifier).unwrap();

    assert_eq!(first.rows, second.rows);
}
