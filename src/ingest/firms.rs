/// NASA FIRMS (Fire Information for Resource Management System) client
///
/// Retrieves near-real-time VIIRS active fire detections for a bounding box.
/// The area API answers with CSV, one detection per row.
///
/// API Documentation: https://firms.modaps.eosdis.nasa.gov/api/area/

use chrono::NaiveDate;

use crate::config::FirmsConfig;
use crate::model::{Result, ServiceError};

/// One detection, as stored in the `fires` table.
#[derive(Debug, Clone, PartialEq)]
pub struct FireRecord {
    pub latitude: f64,
    pub longitude: f64,
    /// I-4 channel brightness temperature, K
    pub bright_ti4: Option<f64>,
    pub scan: Option<f64>,
    pub track: Option<f64>,
    pub acq_date: NaiveDate,
    /// Acquisition time as HHMM, UTC
    pub acq_time: Option<i32>,
    pub satellite: Option<String>,
    pub instrument: Option<String>,
    /// "l" / "n" / "h" for VIIRS
    pub confidence: Option<String>,
    pub version: Option<String>,
    pub bright_ti5: Option<f64>,
    /// Fire radiative power, MW
    pub frp: Option<f64>,
    pub daynight: Option<String>,
}

/// Builds the area CSV URL: `{base}/{key}/{source}/{west,south,east,north}/{days}`.
pub fn build_area_url(config: &FirmsConfig) -> String {
    let b = &config.bbox;
    format!(
        "{}/{}/{}/{},{},{},{}/{}",
        config.base_url.trim_end_matches('/'),
        config.map_key,
        config.source,
        b.min_lon,
        b.min_lat,
        b.max_lon,
        b.max_lat,
        config.day_range
    )
}

/// Fetches the raw CSV body for the configured area.
pub fn fetch_area(client: &reqwest::blocking::Client, config: &FirmsConfig) -> Result<String> {
    if config.map_key.is_empty() {
        return Err(ServiceError::Config("firms.map_key is not set".into()));
    }
    super::fetch_body(client, &build_area_url(config))
}

/// Column positions resolved from the CSV header.
struct Columns {
    latitude: usize,
    longitude: usize,
    acq_date: usize,
    optional: Vec<(&'static str, Option<usize>)>,
}

impl Columns {
    fn from_header(header: &str) -> Result<Self> {
        let names: Vec<&str> = header.split(',').map(str::trim).collect();
        let find = |name: &str| names.iter().position(|n| *n == name);
        let required = |name: &str| {
            find(name).ok_or_else(|| ServiceError::Parse(format!("FIRMS CSV missing column {}", name)))
        };

        Ok(Self {
            latitude: required("latitude")?,
            longitude: required("longitude")?,
            acq_date: required("acq_date")?,
            optional: [
                "bright_ti4", "scan", "track", "acq_time", "satellite", "instrument",
                "confidence", "version", "bright_ti5", "frp", "daynight",
            ]
            .into_iter()
            .map(|name| (name, find(name)))
            .collect(),
        })
    }

    fn text<'a>(&self, fields: &[&'a str], name: &str) -> Option<&'a str> {
        self.optional
            .iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, idx)| *idx)
            .and_then(|idx| fields.get(idx).copied())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn number(&self, fields: &[&str], name: &str) -> Option<f64> {
        self.text(fields, name).and_then(|s| s.parse().ok())
    }
}

/// Parses a FIRMS area CSV response.
///
/// Rows without parseable coordinates or acquisition date are skipped; a
/// missing required column is an error. A body that is only a header (no
/// detections in the window) yields an empty vector.
pub fn parse_area_csv(csv: &str) -> Result<Vec<FireRecord>> {
    let mut lines = csv.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return Ok(Vec::new());
    };
    let cols = Columns::from_header(header)?;

    let mut records = Vec::new();
    for line in lines {
        let fields: Vec<&str> = line.split(',').collect();

        let coord = |idx: usize| fields.get(idx).and_then(|s| s.trim().parse::<f64>().ok());
        let (Some(latitude), Some(longitude)) = (coord(cols.latitude), coord(cols.longitude)) else {
            continue;
        };
        let Some(acq_date) = fields
            .get(cols.acq_date)
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
        else {
            continue;
        };

        let owned = |name: &str| cols.text(&fields, name).map(String::from);
        records.push(FireRecord {
            latitude,
            longitude,
            bright_ti4: cols.number(&fields, "bright_ti4"),
            scan: cols.number(&fields, "scan"),
            track: cols.number(&fields, "track"),
            acq_date,
            acq_time: cols.text(&fields, "acq_time").and_then(|s| s.parse().ok()),
            satellite: owned("satellite"),
            instrument: owned("instrument"),
            confidence: owned("confidence"),
            version: owned("version"),
            bright_ti5: cols.number(&fields, "bright_ti5"),
            frp: cols.number(&fields, "frp"),
            daynight: owned("daynight"),
        });
    }

    Ok(records)
}

// ============================================================================
// Tests
// ============================================================================
