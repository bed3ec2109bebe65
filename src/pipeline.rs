/// One-shot jobs run by the `airwatch` binary.
///
/// Every job returns a `RunOutcome` instead of an error: failures are
/// logged, classified and reported in the outcome so the caller always gets
/// a structured answer on stdout.
///
/// - `run_ingest_air`: AirVisual city snapshot into `air_quality`
/// - `run_ingest_fires`: FIRMS detections into `fires`
/// - `run_ingest_quakes`: USGS events into `earthquakes`
/// - `run_forecast`: history → trend model → `air_quality_predictions`

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use postgres::Client;
use serde::Serialize;

use crate::analysis::features::{build_merged_series, daily_fire_intensity};
use crate::analysis::forecast::{self, FireContext, Forecast, ForecastMethod};
use crate::archive::{archive_key, RawArchive};
use crate::config::{Config, ForecastConfig};
use crate::db;
use crate::ingest::{airvisual, firms, quakes};
use crate::logging::{self, DataSource};
use crate::model::{AqiReading, FireDetection, Result};
use crate::predictions::{store_forecast, PgPredictionStore, PredictionStore, StoreSummary};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
}

/// Structured result of one job, printed as JSON by the binary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub message: String,
    pub forecast_dates: Vec<NaiveDate>,
    pub fallback: bool,
    pub inserted: usize,
    pub skipped: usize,
}

impl RunOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Success,
            message: message.into(),
            forecast_dates: Vec::new(),
            fallback: false,
            inserted: 0,
            skipped: 0,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failure,
            ..Self::success(message)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    fn with_counts(mut self, summary: StoreSummary) -> Self {
        self.inserted = summary.inserted;
        self.skipped = summary.skipped;
        self
    }
}

// ---------------------------------------------------------------------------
// Forecast job
// ---------------------------------------------------------------------------

/// Builds the merged series, forecasts and persists the points.
///
/// This is the store-agnostic core of `run_forecast`; history is passed in
/// already filtered to the trailing window.
pub fn forecast_and_store<S: PredictionStore + ?Sized>(
    readings: &[AqiReading],
    detections: &[FireDetection],
    store: &mut S,
    config: &ForecastConfig,
    now: NaiveDateTime,
) -> Result<(Forecast, StoreSummary)> {
    let series = build_merged_series(readings, detections);
    let fire = FireContext::from_daily(&daily_fire_intensity(detections), now);

    logging::debug(
        DataSource::Model,
        None,
        &format!(
            "{} readings, {} detections, {} merged days",
            readings.len(),
            detections.len(),
            series.len()
        ),
    );

    let mut rng = forecast::rng_from_config(config);
    let result = forecast::forecast(&series, &fire, config, &mut rng);

    match &result.method {
        ForecastMethod::Fallback { history_days } => logging::warn(
            DataSource::Model,
            None,
            &format!(
                "Only {} merged days (need {}); using fallback forecast",
                history_days, config.min_history_days
            ),
        ),
        ForecastMethod::Trend { weights, samples, .. } => logging::info(
            DataSource::Model,
            None,
            &format!(
                "Trained on {} samples: bias={:.4} aqi_coef={:.4} fire_coef={:.4}",
                samples, weights.bias, weights.aqi_coef, weights.fire_coef
            ),
        ),
    }

    let summary = store_forecast(store, &result.points)?;
    Ok((result, summary))
}

/// Message reported for a stored forecast.
pub fn forecast_message(result: &Forecast, horizon_days: u32) -> String {
    if result.is_fallback() {
        return "Fallback forecast stored (insufficient history).".to_string();
    }
    let dates: Vec<String> = result.dates().iter().map(|d| d.to_string()).collect();
    format!(
        "{}-day AQI time series forecast stored. Dates: {}",
        horizon_days,
        dates.join(", ")
    )
}

/// Reads the trailing history window, forecasts and writes predictions.
pub fn run_forecast(client: &mut Client, config: &Config, now: DateTime<Utc>) -> RunOutcome {
    match try_forecast(client, config, now) {
        Ok(outcome) => outcome,
        Err(e) => {
            logging::error(DataSource::Database, Some("forecast"), &e.to_string());
            RunOutcome::failure(e.to_string())
        }
    }
}

fn try_forecast(client: &mut Client, config: &Config, now: DateTime<Utc>) -> Result<RunOutcome> {
    let now = now.naive_utc();
    let since = now - Duration::days(config.forecast.history_days);

    let readings = db::fetch_aqi_readings(client, since)?;
    let detections = db::fetch_fire_detections(client, since)?;

    let mut store = PgPredictionStore::new(client, &config.database.prediction_schema);
    let (result, summary) =
        forecast_and_store(&readings, &detections, &mut store, &config.forecast, now)?;

    logging::log_job_summary(
        DataSource::Database,
        "forecast",
        result.points.len(),
        summary.inserted,
        summary.skipped,
    );

    Ok(RunOutcome {
        forecast_dates: result.dates(),
        fallback: result.is_fallback(),
        ..RunOutcome::success(forecast_message(&result, config.forecast.horizon_days))
    }
    .with_counts(summary))
}

// ---------------------------------------------------------------------------
// Ingest jobs
// ---------------------------------------------------------------------------

/// Archives the raw body, then parses it.
///
/// The archive write happens first so a body the parser rejects is still
/// kept.
pub fn stage_payload<T>(
    archive: &mut dyn RawArchive,
    key: &str,
    body: &str,
    parse: impl FnOnce(&str) -> Result<T>,
) -> Result<T> {
    archive.put(key, body.as_bytes())?;
    parse(body)
}

fn report(source: DataSource, job: &str, result: Result<RunOutcome>) -> RunOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            logging::log_fetch_failure(source, job, "ingest", &e);
            RunOutcome::failure(e.to_string())
        }
    }
}

/// Current air quality for the configured city.
pub fn run_ingest_air(
    http: &reqwest::blocking::Client,
    client: &mut Client,
    archive: &mut dyn RawArchive,
    config: &Config,
    now: DateTime<Utc>,
) -> RunOutcome {
    report(DataSource::AirVisual, "ingest-air", try_ingest_air(http, client, archive, config, now))
}

fn try_ingest_air(
    http: &reqwest::blocking::Client,
    client: &mut Client,
    archive: &mut dyn RawArchive,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<RunOutcome> {
    let body = airvisual::fetch_city(http, &config.airvisual)?;
    let label = format!("{}_air_quality", config.airvisual.city.to_lowercase());
    let key = archive_key(&config.archive.air_folder, &label, now, "json");
    let record = stage_payload(archive, &key, &body, airvisual::parse_city_response)?;

    db::ensure_air_quality_table(client)?;
    db::insert_air_quality(client, &record)?;
    logging::log_job_summary(DataSource::AirVisual, "ingest-air", 1, 1, 0);

    Ok(RunOutcome {
        inserted: 1,
        ..RunOutcome::success(format!(
            "Stored AQI {} for {} at {}",
            record.aqius, record.city, record.pollution_ts
        ))
    })
}

/// FIRMS detections for the configured area.
pub fn run_ingest_fires(
    http: &reqwest::blocking::Client,
    client: &mut Client,
    archive: &mut dyn RawArchive,
    config: &Config,
    now: DateTime<Utc>,
) -> RunOutcome {
    report(DataSource::Firms, "ingest-fires", try_ingest_fires(http, client, archive, config, now))
}

fn try_ingest_fires(
    http: &reqwest::blocking::Client,
    client: &mut Client,
    archive: &mut dyn RawArchive,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<RunOutcome> {
    let body = firms::fetch_area(http, &config.firms)?;
    let label = format!("{}_fires", config.firms.region);
    let key = archive_key(&config.archive.fire_folder, &label, now, "csv");
    let records = stage_payload(archive, &key, &body, firms::parse_area_csv)?;

    if records.is_empty() {
        logging::info(DataSource::Firms, None, "No detections in window");
        return Ok(RunOutcome::success("No fire detections in window."));
    }

    db::ensure_fires_table(client)?;
    let written = db::insert_fires(client, &records)?;
    logging::log_job_summary(DataSource::Firms, "ingest-fires", records.len(), written, 0);

    Ok(RunOutcome {
        inserted: written,
        ..RunOutcome::success(format!("Stored {} fire detections.", written))
    })
}

/// USGS events for the configured area and lookback window.
pub fn run_ingest_quakes(
    http: &reqwest::blocking::Client,
    client: &mut Client,
    archive: &mut dyn RawArchive,
    config: &Config,
    now: DateTime<Utc>,
) -> RunOutcome {
    report(DataSource::Usgs, "ingest-quakes", try_ingest_quakes(http, client, archive, config, now))
}

fn try_ingest_quakes(
    http: &reqwest::blocking::Client,
    client: &mut Client,
    archive: &mut dyn RawArchive,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<RunOutcome> {
    let body = quakes::fetch_events(http, &config.quakes, now)?;
    let label = format!("{}_earthquakes", config.quakes.region);
    let key = archive_key(&config.archive.quake_folder, &label, now, "json");
    let bbox = &config.quakes.bbox;
    let records = stage_payload(archive, &key, &body, |b| quakes::parse_events(b, bbox))?;

    if records.is_empty() {
        logging::info(DataSource::Usgs, None, "No events in window");
        return Ok(RunOutcome::success("No earthquakes in window."));
    }

    db::ensure_earthquakes_table(client)?;
    let written = db::insert_earthquakes(client, &records)?;
    let skipped = records.len() - written;
    logging::log_job_summary(DataSource::Usgs, "ingest-quakes", records.len(), written, skipped);

    Ok(RunOutcome {
        inserted: written,
        skipped,
        ..RunOutcome::success(format!(
            "Stored {} earthquakes ({} already known).",
            written, skipped
        ))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
