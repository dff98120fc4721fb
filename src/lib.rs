//! City weather ETL service.
//!
//! Loads a city reference list, enriches each city with current weather from
//! OpenWeatherMap, joins the two, replaces a PostgreSQL table with the result
//! and announces completion.

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod housekeeping;
pub mod ingest;
pub mod logging;
pub mod merge;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod verify;
