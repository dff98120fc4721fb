/// Pipeline runner.
///
/// Runs the stages strictly in order, handing each stage's output to the
/// next as a typed value:
///
///   load cities → bulk weather lookup → merge → load table
///     → verify + export → cleanup → notify
///
/// The first four stages are fatal on error. Verification, export, cleanup
/// and notification only log their failures.

use std::time::Duration;

use chrono::{DateTime, Local};

use crate::config::PipelineConfig;
use crate::db::{self, PostgresWriter, TableWriter};
use crate::error::PipelineError;
use crate::export;
use crate::housekeeping;
use crate::ingest::bulk::fetch_weather_bulk;
use crate::ingest::cities::load_cities;
use crate::ingest::openweather::{OpenWeatherClient, WeatherLookup};
use crate::logging::{self, Stage};
use crate::merge::merge_city_weather;
use crate::model::FailedCity;
use crate::notify::{self, Notifier};
use crate::verify::{self, LoadVerification};

/// What one successful run did.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub cities_loaded: usize,
    pub weather_found: usize,
    pub failed_cities: Vec<FailedCity>,
    pub merged_rows: usize,
    pub loaded_rows: u64,
    /// `None` when the read-back itself failed.
    pub verification: Option<LoadVerification>,
    pub completed_at: DateTime<Local>,
}

/// Run once against the real collaborators named in `config`.
pub fn run(config: &PipelineConfig) -> Result<RunReport, PipelineError> {
    let client = OpenWeatherClient::from_config(&config.weather)?;
    let mut writer = PostgresWriter::from_config(&config.database)?;

    let notifier: Box<dyn Notifier> = match notify::notifier_from_config(
        &config.notification,
        config.api_timeout(),
    ) {
        Ok(notifier) => notifier,
        Err(e) => {
            logging::warn(
                Stage::Notify,
                None,
                &format!("Notifier unavailable, falling back to log: {}", e),
            );
            Box::new(notify::LogNotifier)
        }
    };

    run_with(config, &client, &mut writer, notifier.as_ref())
}

/// Run once with explicit collaborators.
pub fn run_with(
    config: &PipelineConfig,
    lookup: &dyn WeatherLookup,
    writer: &mut dyn TableWriter,
    notifier: &dyn Notifier,
) -> Result<RunReport, PipelineError> {
    logging::info(Stage::System, None, "Pipeline run started");

    let cities = load_cities(&config.source.csv_path)?;
    let bulk = fetch_weather_bulk(lookup, &cities)?;
    let merged = merge_city_weather(&cities, &bulk.weather)?;
    let loaded_rows = db::load_merged(writer, &merged)?;

    let verification = verify_and_export(config, writer, merged.len());

    cleanup(config, &bulk.failed);

    let completed_at = Local::now();
    send_notification(config, notifier, completed_at);

    logging::info(Stage::System, None, "Pipeline run completed");

    Ok(RunReport {
        cities_loaded: cities.len(),
        weather_found: bulk.weather.len(),
        failed_cities: bulk.failed,
        merged_rows: merged.len(),
        loaded_rows,
        verification,
        completed_at,
    })
}

/// Read the table back, log count + sample, and dump it to CSV.
fn verify_and_export(
    config: &PipelineConfig,
    writer: &mut dyn TableWriter,
    expected_rows: usize,
) -> Option<LoadVerification> {
    let table_rows = match writer.read_table() {
        Ok(rows) => rows,
        Err(e) => {
            logging::warn(
                Stage::Database,
                None,
                &format!("Read-back of {} failed: {}", writer.table_name(), e),
            );
            return None;
        }
    };

    let report = verify::verify_load(writer.table_name(), expected_rows, &table_rows);
    verify::log_verification(&report);

    if let Err(e) = export::write_table_csv(&config.output.path, &table_rows) {
        logging::warn(
            Stage::Database,
            None,
            &format!("Failed to write {}: {}", config.output.path.display(), e),
        );
    }

    Some(report)
}

fn cleanup(config: &PipelineConfig, failed: &[FailedCity]) {
    logging::info(Stage::Cleanup, None, "Starting cleanup operations");
    housekeeping::prune_logs(&config.logging.dir, config.logging.retention_days);
    housekeeping::report_failed_cities(failed);
}

fn send_notification(
    config: &PipelineConfig,
    notifier: &dyn Notifier,
    completed_at: DateTime<Local>,
) {
    let message = notify::render_notification(&config.notification, completed_at);
    if let Err(e) = notifier.send(&message) {
        logging::error(Stage::Notify, None, &format!("Error sending notification: {}", e));
    }
}

/// Run on `interval` forever. A failed run is logged and the loop waits for
/// the next slot.
pub fn run_forever(config: &PipelineConfig, interval: Duration) -> ! {
    loop {
        match run(config) {
            Ok(report) => logging::info(
                Stage::System,
                None,
                &format!(
                    "Loaded {} of {} cities ({} without weather)",
                    report.loaded_rows,
                    report.cities_loaded,
                    report.failed_cities.len()
                ),
            ),
            Err(e) => logging::error(Stage::System, None, &format!("Pipeline run failed: {}", e)),
        }

        logging::info(
            Stage::System,
            None,
            &format!("Next run in {} seconds", interval.as_secs()),
        );
        std::thread::sleep(interval);
    }
}
