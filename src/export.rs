/// CSV export of the destination table.
///
/// Written after every load so the result can be checked without database
/// access. The header is `COLUMN_ORDER`; an absent population is an empty
/// cell.

use std::fs;
use std::path::Path;

use crate::logging::{self, Stage};
use crate::model::{COLUMN_ORDER, MergedRecord};

pub fn write_table_csv(path: &Path, rows: &[MergedRecord]) -> Result<(), csv::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    // serialize() only emits the header with the first row
    if rows.is_empty() {
        writer.write_record(COLUMN_ORDER)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    logging::info(
        Stage::Database,
        None,
        &format!("Wrote {} rows to {}", rows.len(), path.display()),
    );
    Ok(())
}
