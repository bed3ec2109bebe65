/// PostgreSQL access for ingest tables and forecast history.
///
/// One `postgres::Client` is opened per invocation and borrowed by every
/// step; it is closed when the owner drops it, on success and error paths
/// alike.

use chrono::{NaiveDate, NaiveDateTime};
use postgres::{Client, NoTls};

use crate::config::DatabaseConfig;
use crate::ingest::airvisual::AirQualityRecord;
use crate::ingest::firms::FireRecord;
use crate::ingest::quakes::EarthquakeRecord;
use crate::logging::{self, DataSource};
use crate::model::{AqiReading, FireDetection, Result, ServiceError};

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Opens a connection using `config.url`.
pub fn connect(config: &DatabaseConfig) -> Result<Client> {
    if config.url.is_empty() {
        return Err(ServiceError::Config(
            "database.url is not set (config file or DATABASE_URL)".into(),
        ));
    }
    let client = Client::connect(&config.url, NoTls)?;
    logging::debug(DataSource::Database, None, "Connected to PostgreSQL");
    Ok(client)
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

const AIR_QUALITY_DDL: &str = "
    CREATE TABLE IF NOT EXISTS air_quality (
        id SERIAL PRIMARY KEY,
        city TEXT,
        state TEXT,
        country TEXT,
        latitude FLOAT,
        longitude FLOAT,
        pollution_ts TIMESTAMP,
        pollution_aqius INT,
        pollution_mainus TEXT,
        pollution_aqicn INT,
        pollution_maincn TEXT,
        weather_ts TIMESTAMP,
        weather_ic TEXT,
        weather_hu INT,
        weather_pr INT,
        weather_tp INT,
        weather_wd INT,
        weather_ws FLOAT,
        weather_heatIndex INT
    );";

const FIRES_DDL: &str = "
    CREATE TABLE IF NOT EXISTS fires (
        id SERIAL PRIMARY KEY,
        latitude FLOAT,
        longitude FLOAT,
        bright_ti4 FLOAT,
        scan FLOAT,
        track FLOAT,
        acq_date DATE,
        acq_time INT,
        satellite TEXT,
        instrument TEXT,
        confidence TEXT,
        version TEXT,
        bright_ti5 FLOAT,
        frp FLOAT,
        daynight TEXT
    );";

const EARTHQUAKES_DDL: &str = "
    CREATE TABLE IF NOT EXISTS earthquakes (
        id SERIAL PRIMARY KEY,
        event_id TEXT,
        title TEXT,
        magnitude FLOAT,
        place TEXT,
        time TIMESTAMP,
        latitude FLOAT,
        longitude FLOAT,
        depth FLOAT
    );";

pub fn ensure_air_quality_table(client: &mut Client) -> Result<()> {
    client.batch_execute(AIR_QUALITY_DDL)?;
    Ok(())
}

pub fn ensure_fires_table(client: &mut Client) -> Result<()> {
    client.batch_execute(FIRES_DDL)?;
    Ok(())
}

/// Creates `earthquakes` and its unique `event_id` index. Events stored
/// more than once by older runs are collapsed to their first row first.
pub fn ensure_earthquakes_table(client: &mut Client) -> Result<()> {
    client.batch_execute(EARTHQUAKES_DDL)?;
    ensure_unique_index(client, "earthquakes", "event_id", "earthquakes_event_id_key")
}

/// Creates the three ingest tables if they do not exist yet.
///
/// Each job only calls the step for its own table, so a problem with one
/// table never blocks ingest into the others.
pub fn ensure_ingest_tables(client: &mut Client) -> Result<()> {
    ensure_air_quality_table(client)?;
    ensure_fires_table(client)?;
    ensure_earthquakes_table(client)
}

/// Adds a unique index on `table (column)` unless `index` already exists.
///
/// Rows sharing a key are reduced to the one with the lowest `id` before
/// the index is built, inside the same transaction. `table` may be
/// schema-qualified; the index is looked up in the same schema. Names are
/// interpolated, so callers pass constants or validated identifiers.
pub fn ensure_unique_index(client: &mut Client, table: &str, column: &str, index: &str) -> Result<()> {
    let qualified_index = match table.rsplit_once('.') {
        Some((schema, _)) => format!("{}.{}", schema, index),
        None => index.to_string(),
    };
    let row = client.query_one("SELECT to_regclass($1::text) IS NOT NULL", &[&qualified_index])?;
    let exists: bool = row.get(0);
    if exists {
        return Ok(());
    }

    let mut tx = client.transaction()?;
    let removed = tx.execute(
        format!(
            "DELETE FROM {table} newer USING {table} older
             WHERE newer.{column} = older.{column} AND newer.id > older.id",
            table = table,
            column = column
        )
        .as_str(),
        &[],
    )?;
    tx.batch_execute(&format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
        index, table, column
    ))?;
    tx.commit()?;

    if removed > 0 {
        logging::warn(
            DataSource::Database,
            Some(table),
            &format!("Removed {} duplicate rows before indexing {}", removed, column),
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Inserts
// ---------------------------------------------------------------------------

pub fn insert_air_quality(client: &mut Client, r: &AirQualityRecord) -> Result<()> {
    client.execute(
        "INSERT INTO air_quality (
            city, state, country, latitude, longitude,
            pollution_ts, pollution_aqius, pollution_mainus, pollution_aqicn, pollution_maincn,
            weather_ts, weather_ic, weather_hu, weather_pr, weather_tp, weather_wd, weather_ws, weather_heatIndex
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        &[
            &r.city, &r.state, &r.country, &r.latitude, &r.longitude,
            &r.pollution_ts, &r.aqius, &r.mainus, &r.aqicn, &r.maincn,
            &r.weather_ts, &r.weather_ic, &r.humidity, &r.pressure, &r.temperature,
            &r.wind_direction, &r.wind_speed, &r.heat_index,
        ],
    )?;
    Ok(())
}

/// Inserts all detections in one transaction. Returns the row count.
pub fn insert_fires(client: &mut Client, records: &[FireRecord]) -> Result<usize> {
    let mut tx = client.transaction()?;
    let stmt = tx.prepare(
        "INSERT INTO fires (
            latitude, longitude, bright_ti4, scan, track, acq_date, acq_time,
            satellite, instrument, confidence, version, bright_ti5, frp, daynight
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )?;

    for r in records {
        tx.execute(
            &stmt,
            &[
                &r.latitude, &r.longitude, &r.bright_ti4, &r.scan, &r.track,
                &r.acq_date, &r.acq_time, &r.satellite, &r.instrument, &r.confidence,
                &r.version, &r.bright_ti5, &r.frp, &r.daynight,
            ],
        )?;
    }

    tx.commit()?;
    Ok(records.len())
}

/// Inserts events not already stored (by `event_id`). Returns rows written.
pub fn insert_earthquakes(client: &mut Client, records: &[EarthquakeRecord]) -> Result<usize> {
    let mut tx = client.transaction()?;
    let stmt = tx.prepare(
        "INSERT INTO earthquakes (event_id, title, magnitude, place, time, latitude, longitude, depth)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (event_id) DO NOTHING",
    )?;

    let mut written = 0;
    for r in records {
        written += tx.execute(
            &stmt,
            &[
                &r.event_id, &r.title, &r.magnitude, &r.place, &r.time,
                &r.latitude, &r.longitude, &r.depth_km,
            ],
        )? as usize;
    }

    tx.commit()?;
    Ok(written)
}

// ---------------------------------------------------------------------------
// History reads
// ---------------------------------------------------------------------------

/// Fire detections acquired on or after `since`, oldest first.
///
/// `acq_date` is compared as midnight of that day, so the boundary day is
/// only included when `since` falls exactly on midnight. Rows with a NULL
/// date or brightness are dropped.
pub fn fetch_fire_detections(client: &mut Client, since: NaiveDateTime) -> Result<Vec<FireDetection>> {
    let rows = client.query(
        "SELECT acq_date, bright_ti4
         FROM fires
         WHERE acq_date >= $1::timestamp
         ORDER BY acq_date",
        &[&since],
    )?;

    Ok(rows
        .iter()
        .filter_map(|row| {
            let acq_date: Option<NaiveDate> = row.get(0);
            let brightness: Option<f64> = row.get(1);
            Some(FireDetection { acq_date: acq_date?, brightness: brightness? })
        })
        .collect())
}

/// AQI readings observed at or after `since`, oldest first.
pub fn fetch_aqi_readings(client: &mut Client, since: NaiveDateTime) -> Result<Vec<AqiReading>> {
    let rows = client.query(
        "SELECT pollution_ts, pollution_aqius
         FROM air_quality
         WHERE pollution_ts >= $1
         ORDER BY pollution_ts",
        &[&since],
    )?;

    Ok(rows
        .iter()
        .filter_map(|row| {
            let observed_at: Option<NaiveDateTime> = row.get(0);
            let aqi: Option<i32> = row.get(1);
            Some(AqiReading { observed_at: observed_at?, aqi: f64::from(aqi?) })
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
