//! Load Verification Module
//!
//! Diagnostics over the read-back of the destination table: how many rows
//! landed and what the first few look like. The result is reported, never
//! used to fail a run.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::logging::{self, Stage};
use crate::model::MergedRecord;

/// Rows kept in `LoadVerification::sample`.
pub const SAMPLE_SIZE: usize = 5;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoadVerification {
    pub checked_at: String,
    pub table: String,
    pub expected_rows: usize,
    pub row_count: usize,
    pub sample: Vec<MergedRecord>,
    pub status: VerificationStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    /// Every inserted row was read back.
    Success,
    /// Some rows came back, but not as many as were inserted.
    PartialSuccess,
    /// The table is empty after the load.
    Failed,
}

// ============================================================================
// Verification
// ============================================================================

pub fn verify_load(
    table: &str,
    expected_rows: usize,
    table_rows: &[MergedRecord],
) -> LoadVerification {
    let row_count = table_rows.len();
    let status = if row_count == 0 {
        VerificationStatus::Failed
    } else if row_count == expected_rows {
        VerificationStatus::Success
    } else {
        VerificationStatus::PartialSuccess
    };

    LoadVerification {
        checked_at: Utc::now().to_rfc3339(),
        table: table.to_string(),
        expected_rows,
        row_count,
        sample: table_rows.iter().take(SAMPLE_SIZE).cloned().collect(),
        status,
    }
}

/// Log the count and the sample rows.
pub fn log_verification(report: &LoadVerification) {
    let message = format!(
        "Total records in {}: {} (expected {}) [{:?}]",
        report.table, report.row_count, report.expected_rows, report.status
    );
    match report.status {
        VerificationStatus::Success => logging::info(Stage::Database, None, &message),
        VerificationStatus::PartialSuccess => logging::warn(Stage::Database, None, &message),
        VerificationStatus::Failed => logging::error(Stage::Database, None, &message),
    }

    logging::info(
        Stage::Database,
        None,
        &format!("First {} records in the database:", report.sample.len()),
    );
    for row in &report.sample {
        logging::info(Stage::Database, Some(&row.city), &format!("{:?}", row));
    }

    if let Ok(json) = serde_json::to_string(report) {
        logging::debug(Stage::Database, None, &json);
    }
}
