/// Core data types for the air-quality forecasting service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no logic and no I/O, only types and the service error.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Raw history rows
// ---------------------------------------------------------------------------

/// A single air-quality reading as stored in `air_quality`.
///
/// Only the two columns the forecaster needs are carried:
/// `pollution_ts` and `pollution_aqius`.
#[derive(Debug, Clone, PartialEq)]
pub struct AqiReading {
    pub observed_at: NaiveDateTime,
    pub aqi: f64,
}

/// A single satellite fire detection as stored in `fires`.
///
/// `brightness` is the VIIRS I-4 channel brightness temperature (`bright_ti4`),
/// in Kelvin, used as a proxy for fire intensity.
#[derive(Debug, Clone, PartialEq)]
pub struct FireDetection {
    pub acq_date: NaiveDate,
    pub brightness: f64,
}

// ---------------------------------------------------------------------------
// Daily series
// ---------------------------------------------------------------------------

/// Mean AQI for one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyObservation {
    pub date: NaiveDate,
    pub aqi_mean: f64,
}

/// Mean fire brightness for one calendar day with detections.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyFireIntensity {
    pub date: NaiveDate,
    pub intensity_mean: f64,
}

/// One row of the merged daily series.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedDay {
    pub date: NaiveDate,
    pub aqi: f64,
    /// 0.0 when no fire was detected that day.
    pub fire_intensity: f64,
}

/// Daily AQI left-joined with daily fire intensity, ascending by date.
pub type MergedSeries = Vec<MergedDay>;

/// Features of day t paired with the AQI observed on day t+1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSample {
    pub aqi: f64,
    pub fire: f64,
    pub next_aqi: f64,
}

// ---------------------------------------------------------------------------
// Model and forecast output
// ---------------------------------------------------------------------------

/// Parameters of the linear trend model:
///   next_aqi = bias + aqi_coef * aqi + fire_coef * fire
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelWeights {
    pub bias: f64,
    pub aqi_coef: f64,
    pub fire_coef: f64,
}

/// A single forecasted day, as written to `air_quality_predictions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub prediction_date: NaiveDate,
    /// The most recent fire acquisition used as forecast context.
    pub fire_event_timestamp: NaiveDateTime,
    pub predicted_aqi: f64,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise while ingesting, storing or forecasting.
#[derive(Debug)]
pub enum ServiceError {
    /// Configuration file missing, unreadable or invalid.
    Config(String),
    /// Any failure reported by PostgreSQL.
    Database(postgres::Error),
    /// Non-2xx HTTP response from an upstream API.
    Http(u16),
    /// The HTTP request itself failed (DNS, TLS, timeout...).
    Request(String),
    /// An upstream payload could not be parsed.
    Parse(String),
    /// Writing a raw payload to the archive failed.
    Archive(std::io::Error),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Config(msg) => write!(f, "Config error: {}", msg),
            ServiceError::Database(e) => write!(f, "Database error: {}", describe_db_error(e)),
            ServiceError::Http(code) => write!(f, "HTTP error: {}", code),
            ServiceError::Request(msg) => write!(f, "Request failed: {}", msg),
            ServiceError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ServiceError::Archive(e) => write!(f, "Archive error: {}", e),
        }
    }
}

/// Server-side errors carry their message, detail and SQLSTATE in the
/// `DbError`; client-side ones carry the underlying cause as `source`.
fn describe_db_error(e: &postgres::Error) -> String {
    if let Some(db) = e.as_db_error() {
        let mut text = format!("{} ({})", db.message(), db.code().code());
        if let Some(detail) = db.detail() {
            text.push_str(": ");
            text.push_str(detail);
        }
        return text;
    }

    let base = e.to_string();
    match std::error::Error::source(e) {
        Some(cause) => {
            let cause = cause.to_string();
            if base.contains(&cause) {
                base
            } else {
                format!("{}: {}", base, cause)
            }
        }
        None => base,
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Database(e) => Some(e),
            ServiceError::Archive(e) => Some(e),
            _ => None,
        }
    }
}

impl From<postgres::Error> for ServiceError {
    fn from(e: postgres::Error) -> Self {
        ServiceError::Database(e)
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ServiceError::Http(status.as_u16()),
            None => ServiceError::Request(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::Parse(e.to_string())
    }
}

impl From<toml::de::Error> for ServiceError {
    fn from(e: toml::de::Error) -> Self {
        ServiceError::Config(e.to_string())
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(e: std::io::Error) -> Self {
        ServiceError::Archive(e)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ServiceError>;
