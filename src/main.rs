//! `cityweather` - run the city weather pipeline once or on a schedule.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use cityweather_service::config::PipelineConfig;
use cityweather_service::logging::{self, Stage};
use cityweather_service::pipeline;

#[derive(Parser, Debug)]
#[command(name = "cityweather")]
#[command(about = "Enrich a city list with current weather and load it into PostgreSQL")]
#[command(version)]
struct Args {
    /// Pipeline configuration file (TOML)
    #[arg(short, long, default_value = "pipeline.toml", env = "CITYWEATHER_CONFIG")]
    config: PathBuf,

    /// Keep running, one pipeline run per configured schedule interval
    #[arg(long)]
    daemon: bool,
}

fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = PipelineConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let log_file = config.log_file_path();
    logging::init_logger(config.log_level()?, log_file.as_deref())
        .context("initializing logging")?;

    logging::info(
        Stage::System,
        None,
        &format!("Using configuration {}", args.config.display()),
    );

    if args.daemon {
        let interval = config.schedule_interval()?;
        pipeline::run_forever(&config, interval);
    }

    match pipeline::run(&config) {
        Ok(report) => {
            logging::info(
                Stage::System,
                None,
                &format!(
                    "Loaded {} records; {} of {} cities had no weather",
                    report.loaded_rows,
                    report.failed_cities.len(),
                    report.cities_loaded
                ),
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            logging::error(Stage::System, None, &format!("Pipeline failed: {}", e));
            Ok(ExitCode::FAILURE)
        }
    }
}
