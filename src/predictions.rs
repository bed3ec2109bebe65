/// Forecast persistence.
///
/// The prediction table holds at most one row per `prediction_date`. The
/// PostgreSQL store enforces that with a unique index and writes with
/// `ON CONFLICT DO NOTHING`, so re-running a forecast (or two overlapping
/// runs) never duplicates a date; the first stored value wins.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use postgres::Client;
use serde::Serialize;

use crate::logging::{self, DataSource};
use crate::model::{ForecastPoint, Result};

/// Table name, created inside the configured schema.
pub const PREDICTION_TABLE: &str = "air_quality_predictions";

/// Storage contract for forecast rows.
pub trait PredictionStore {
    /// Creates the table (and its unique date index) if missing.
    fn ensure_schema(&mut self) -> Result<()>;

    /// Writes `point` unless a row for its date already exists.
    /// Returns `true` when a row was written.
    fn insert_if_absent(&mut self, point: &ForecastPoint) -> Result<bool>;
}

/// Outcome of one `store_forecast` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Persists forecast points idempotently.
///
/// Dates repeated within `points` are written once (first occurrence).
/// Dates already in the store are left as they are.
pub fn store_forecast<S: PredictionStore + ?Sized>(
    store: &mut S,
    points: &[ForecastPoint],
) -> Result<StoreSummary> {
    store.ensure_schema()?;

    let mut summary = StoreSummary::default();
    let mut seen: HashSet<NaiveDate> = HashSet::with_capacity(points.len());

    for point in points {
        let date = point.prediction_date;
        if seen.insert(date) && store.insert_if_absent(point)? {
            summary.inserted += 1;
        } else {
            logging::debug(
                DataSource::Database,
                Some(&date.to_string()),
                "prediction already stored, skipping",
            );
            summary.skipped += 1;
        }
    }

    Ok(summary)
}

// ---------------------------------------------------------------------------
// PostgreSQL store
// ---------------------------------------------------------------------------

pub struct PgPredictionStore<'a> {
    client: &'a mut Client,
    schema: String,
    table: String,
}

impl<'a> PgPredictionStore<'a> {
    /// `schema` must be a plain identifier; `Config` validates it on load.
    pub fn new(client: &'a mut Client, schema: &str) -> Self {
        Self {
            client,
            schema: schema.to_string(),
            table: format!("{}.{}", schema, PREDICTION_TABLE),
        }
    }
}

impl PredictionStore for PgPredictionStore<'_> {
    /// Tables written before the date index existed may repeat a date;
    /// only the earliest row per date survives the index build.
    fn ensure_schema(&mut self) -> Result<()> {
        let ddl = format!(
            "CREATE SCHEMA IF NOT EXISTS {schema};
             CREATE TABLE IF NOT EXISTS {table} (
                 id SERIAL PRIMARY KEY,
                 prediction_date DATE,
                 fire_event_timestamp TIMESTAMP,
                 predicted_aqi FLOAT,
                 created_at TIMESTAMP DEFAULT NOW()
             );",
            schema = self.schema,
            table = self.table,
        );
        self.client.batch_execute(&ddl)?;
        crate::db::ensure_unique_index(
            self.client,
            &self.table,
            "prediction_date",
            &format!("{}_date_key", PREDICTION_TABLE),
        )
    }

    fn insert_if_absent(&mut self, point: &ForecastPoint) -> Result<bool> {
        let sql = format!(
            "INSERT INTO {} (prediction_date, fire_event_timestamp, predicted_aqi)
             VALUES ($1, $2, $3)
             ON CONFLICT (prediction_date) DO NOTHING",
            self.table
        );
        let rows = self.client.execute(
            sql.as_str(),
            &[
                &point.prediction_date,
                &point.fire_event_timestamp,
                &point.predicted_aqi,
            ],
        )?;
        Ok(rows == 1)
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Store backed by a map; used by tests.
#[derive(Debug, Default)]
pub struct MemoryPredictionStore {
    rows: BTreeMap<NaiveDate, ForecastPoint>,
}

impl MemoryPredictionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> impl Iterator<Item = &ForecastPoint> {
        self.rows.values()
    }

    /// Stored prediction dates, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl PredictionStore for MemoryPredictionStore {
    fn ensure_schema(&mut self) -> Result<()> {
        Ok(())
    }

    fn insert_if_absent(&mut self, point: &ForecastPoint) -> Result<bool> {
        if self.rows.contains_key(&point.prediction_date) {
            return Ok(false);
        }
        self.rows.insert(point.prediction_date, point.clone());
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
