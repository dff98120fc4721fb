/// PostgreSQL persistence for merged city weather rows.
///
/// The destination table is dropped and recreated on every load; there is
/// no migration path and no append history. Each call opens its own
/// connection and drops it before returning, whatever the outcome.

use postgres::types::ToSql;
use postgres::{Client, NoTls};

use crate::config::{DatabaseConfig, is_sql_identifier};
use crate::error::PersistError;
use crate::logging::{self, Stage};
use crate::model::{COLUMN_ORDER, MergedRecord};

/// Rows per INSERT statement. 5 parameters per row keeps each statement far
/// below PostgreSQL's 65535 bind-parameter limit.
pub const INSERT_BATCH_ROWS: usize = 1000;

/// SQL types matching `COLUMN_ORDER` one-to-one.
const COLUMN_TYPES: [&str; 5] = ["TEXT", "TEXT", "INTEGER", "REAL", "TEXT"];

// ---------------------------------------------------------------------------
// Writer seam
// ---------------------------------------------------------------------------

/// Destination for the merged dataset.
pub trait TableWriter {
    /// Replace the table contents with `rows`. Returns the number of rows
    /// inserted. Must be all-or-nothing.
    fn replace_table(&mut self, rows: &[MergedRecord]) -> Result<u64, PersistError>;

    /// Read every row back for verification and export.
    fn read_table(&mut self) -> Result<Vec<MergedRecord>, PersistError>;

    /// Name used in log messages.
    fn table_name(&self) -> &str;
}

/// Load `rows` into `writer`, rejecting an empty dataset before any
/// destructive statement runs.
pub fn load_merged(
    writer: &mut dyn TableWriter,
    rows: &[MergedRecord],
) -> Result<u64, PersistError> {
    if rows.is_empty() {
        logging::error(Stage::Database, None, "No merged data found for database loading");
        return Err(PersistError::NothingToLoad);
    }

    logging::info(
        Stage::Database,
        None,
        &format!("Loading {} records into {}", rows.len(), writer.table_name()),
    );

    let inserted = writer.replace_table(rows)?;

    logging::info(
        Stage::Database,
        None,
        &format!("Inserted {} records into {}", inserted, writer.table_name()),
    );
    Ok(inserted)
}

// ---------------------------------------------------------------------------
// SQL builders
// ---------------------------------------------------------------------------

/// `DROP TABLE IF EXISTS` + `CREATE TABLE` for the fixed schema.
pub fn create_table_sql(table: &str) -> String {
    let columns: Vec<String> = COLUMN_ORDER
        .iter()
        .zip(COLUMN_TYPES.iter())
        .map(|(name, ty)| format!("    {} {}", name, ty))
        .collect();

    format!(
        "DROP TABLE IF EXISTS {table};\nCREATE TABLE {table} (\n{}\n);",
        columns.join(",\n")
    )
}

/// Multi-row INSERT with `rows` placeholder tuples, `$1..$5` for the first
/// row, `$6..$10` for the second and so on.
pub fn insert_sql(table: &str, rows: usize) -> String {
    let width = COLUMN_ORDER.len();
    let tuples: Vec<String> = (0..rows)
        .map(|r| {
            let params: Vec<String> = (1..=width).map(|c| format!("${}", r * width + c)).collect();
            format!("({})", params.join(", "))
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        table,
        COLUMN_ORDER.join(", "),
        tuples.join(", ")
    )
}

/// Full read-back, ordered by identity key so exports are stable.
pub fn select_all_sql(table: &str) -> String {
    format!(
        "SELECT {} FROM {} ORDER BY city, country",
        COLUMN_ORDER.join(", "),
        table
    )
}

/// Convert population to the 32-bit INTEGER column.
fn population_column(record: &MergedRecord) -> Result<Option<i32>, PersistError> {
    record
        .population
        .map(|value| {
            i32::try_from(value).map_err(|_| PersistError::PopulationOutOfRange {
                city: record.city.clone(),
                value,
            })
        })
        .transpose()
}

/// Widen a REAL column value using its shortest decimal form, so 11.62
/// stored as f32 reads back as 11.62 rather than 11.619999885559082.
fn real_to_f64(value: f32) -> f64 {
    value.to_string().parse().unwrap_or(f64::from(value))
}

// ---------------------------------------------------------------------------
// PostgreSQL writer
// ---------------------------------------------------------------------------

pub struct PostgresWriter {
    database_url: String,
    table: String,
}

impl PostgresWriter {
    pub fn new(database_url: &str, table: &str) -> Result<Self, PersistError> {
        if !is_sql_identifier(table) {
            return Err(PersistError::InvalidTable(table.to_string()));
        }
        Ok(Self {
            database_url: database_url.to_string(),
            table: table.to_string(),
        })
    }

    pub fn from_config(config: &DatabaseConfig) -> Result<Self, PersistError> {
        Self::new(&config.url, &config.table)
    }

    fn connect(&self) -> Result<Client, PersistError> {
        Client::connect(&self.database_url, NoTls).map_err(|e| {
            logging::error(
                Stage::Database,
                None,
                &format!("Failed to connect to database: {}", e),
            );
            PersistError::Postgres(e)
        })
    }
}

impl TableWriter for PostgresWriter {
    fn replace_table(&mut self, rows: &[MergedRecord]) -> Result<u64, PersistError> {
        if rows.is_empty() {
            return Err(PersistError::NothingToLoad);
        }

        // Convert before touching the database so a bad value cannot leave
        // a dropped table behind.
        let populations: Vec<Option<i32>> = rows
            .iter()
            .map(population_column)
            .collect::<Result<_, _>>()?;
        let temperatures: Vec<f32> = rows.iter().map(|r| r.temperature as f32).collect();

        let mut client = self.connect()?;
        let mut tx = client.transaction()?;

        tx.batch_execute(&create_table_sql(&self.table))?;

        let mut inserted = 0;
        for (chunk_idx, chunk) in rows.chunks(INSERT_BATCH_ROWS).enumerate() {
            let offset = chunk_idx * INSERT_BATCH_ROWS;
            let mut params: Vec<&(dyn ToSql + Sync)> =
                Vec::with_capacity(chunk.len() * COLUMN_ORDER.len());
            for (i, record) in chunk.iter().enumerate() {
                params.push(&record.city);
                params.push(&record.country);
                params.push(&populations[offset + i]);
                params.push(&temperatures[offset + i]);
                params.push(&record.weather_description);
            }
            inserted += tx.execute(insert_sql(&self.table, chunk.len()).as_str(), &params)?;
        }

        tx.commit()?;
        Ok(inserted)
    }

    fn read_table(&mut self) -> Result<Vec<MergedRecord>, PersistError> {
        let mut client = self.connect()?;
        let rows = client.query(select_all_sql(&self.table).as_str(), &[])?;

        rows.iter()
            .map(|row| -> Result<MergedRecord, PersistError> {
                let population: Option<i32> = row.try_get(2)?;
                let temperature: f32 = row.try_get(3)?;
                Ok(MergedRecord {
                    city: row.try_get(0)?,
                    country: row.try_get(1)?,
                    population: population.map(i64::from),
                    temperature: real_to_f64(temperature),
                    weather_description: row.try_get(4)?,
                })
            })
            .collect()
    }

    fn table_name(&self) -> &str {
        &self.table
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
