//! SQLite persistence for daily weather rows.
//!
//! Every load fully replaces the `weather` table; nothing is merged or versioned.

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::{
    error::StoreError,
    model::{DailyWeatherRecord, WeatherTable},
};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS weather (
        date TEXT PRIMARY KEY,
        temperature_max REAL,
        temperature_min REAL,
        precipitation_sum REAL,
        snowfall_sum REAL
    )
"#;

// (name, declared type, primary key)
const COLUMNS: [(&str, &str, bool); 5] = [
    ("date", "TEXT", true),
    ("temperature_max", "REAL", false),
    ("temperature_min", "REAL", false),
    ("precipitation_sum", "REAL", false),
    ("snowfall_sum", "REAL", false),
];

/// One row of `PRAGMA table_info(weather)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub primary_key: bool,
}

/// How the previous contents are discarded before a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplaceMode {
    /// Keep the table, migrating it if its columns are wrong, and delete all rows.
    #[default]
    Truncate,
    /// Drop the table and create it again.
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadSummary {
    pub inserted: usize,
    pub duplicates_removed: usize,
}

pub struct WeatherStore {
    conn: Connection,
}

impl WeatherStore {
    /// Open (or create) the database file, creating parent directories as needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(parent.to_path_buf(), e))?;
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Replace the table contents with `table`.
    ///
    /// Rows sharing a date are collapsed to the first one. Reset, inserts and
    /// commit run in a single transaction, so a failure leaves the previous
    /// contents in place.
    pub fn load(&mut self, table: &WeatherTable, mode: ReplaceMode) -> Result<LoadSummary, StoreError> {
        let mut table = table.clone();
        let duplicates_removed = if table.has_duplicate_dates() {
            tracing::info!("Duplicates found in the data, removing them");
            table.dedup_by_date()
        } else {
            0
        };

        let tx = self.conn.transaction()?;

        match mode {
            ReplaceMode::Drop => {
                tracing::info!("Dropping existing weather table (if it exists)");
                tx.execute_batch("DROP TABLE IF EXISTS weather;")?;
                tx.execute_batch(CREATE_TABLE)?;
            }
            ReplaceMode::Truncate => {
                if !schema_matches(&tx)? {
                    tracing::warn!("Weather table has an unexpected schema, recreating it");
                    tx.execute_batch("DROP TABLE IF EXISTS weather;")?;
                }
                tx.execute_batch(CREATE_TABLE)?;
                let cleared = tx.execute("DELETE FROM weather", [])?;
                tracing::info!("Cleared {} existing weather rows", cleared);
            }
        }

        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO weather (date, temperature_max, temperature_min, precipitation_sum, snowfall_sum)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for row in table.rows() {
                stmt.execute(params![
                    row.date_key(),
                    row.temperature_max,
                    row.temperature_min,
                    row.precipitation_sum,
                    row.snowfall_sum,
                ])?;
                tracing::info!("Inserted weather data for {}", row.date);
                inserted += 1;
            }
        }

        tx.commit()?;
        tracing::info!("Weather data inserted into the database ({} rows)", inserted);

        Ok(LoadSummary { inserted, duplicates_removed })
    }

    /// All stored rows, oldest first.
    pub fn records(&self) -> Result<Vec<DailyWeatherRecord>, StoreError> {
        if !self.table_exists()? {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            "SELECT date, temperature_max, temperature_min, precipitation_sum, snowfall_sum
             FROM weather ORDER BY date",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<f64>>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, Option<f64>>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (date, temperature_max, temperature_min, precipitation_sum, snowfall_sum) = row?;
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|_| StoreError::InvalidDate(date.clone()))?;
            records.push(DailyWeatherRecord {
                date,
                temperature_max,
                temperature_min,
                precipitation_sum,
                snowfall_sum,
            });
        }
        Ok(records)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        if !self.table_exists()? {
            return Ok(0);
        }
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM weather", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Columns of the `weather` table, in order.
    pub fn columns(&self) -> Result<Vec<ColumnInfo>, StoreError> {
        table_columns(&self.conn)
    }

    fn table_exists(&self) -> Result<bool, StoreError> {
        table_exists(&self.conn)
    }
}

/// Open `path`, replace its weather data with `table`, and close it again.
pub fn load_into<P: AsRef<Path>>(
    path: P,
    table: &WeatherTable,
    mode: ReplaceMode,
) -> Result<LoadSummary, StoreError> {
    let mut store = WeatherStore::open(path)?;
    store.load(table, mode)
}

fn table_exists(conn: &Connection) -> Result<bool, StoreError> {
    let n: i32 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='weather'",
        [],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

fn table_columns(conn: &Connection) -> Result<Vec<ColumnInfo>, StoreError> {
    let columns = conn
        .prepare("PRAGMA table_info(weather)")?
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get(1)?,
                declared_type: row.get(2)?,
                primary_key: row.get::<_, i64>(5)? > 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// True when the table is absent (nothing to migrate) or has exactly the expected
/// columns, with `date` as its only primary key.
fn schema_matches(conn: &Connection) -> Result<bool, StoreError> {
    if !table_exists(conn)? {
        return Ok(true);
    }
    let columns = table_columns(conn)?;
    Ok(columns.len() == COLUMNS.len()
        && columns
            .iter()
            .zip(COLUMNS)
            .all(|(col, (name, ty, pk))| {
                col.name == name && col.declared_type.eq_ignore_ascii_case(ty) && col.primary_key == pk
            }))
}
