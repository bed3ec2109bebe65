/// USGS FDSN Event Web Service client
///
/// Retrieves earthquake events inside a bounding box over a trailing
/// window, using the GeoJSON output format.
///
/// API Documentation: https://earthquake.usgs.gov/fdsnws/event/1/

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::config::{BoundingBox, QuakeConfig};
use crate::model::Result;

// ============================================================================
// GeoJSON Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
pub struct Feature {
    pub id: String,
    pub properties: Properties,
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
pub struct Properties {
    pub mag: Option<f64>,
    pub place: Option<String>,
    /// Milliseconds since the Unix epoch
    pub time: i64,
}

#[derive(Debug, Deserialize)]
pub struct Geometry {
    /// [longitude, latitude, depth_km]
    pub coordinates: Vec<f64>,
}

/// One event, as stored in the `earthquakes` table.
#[derive(Debug, Clone, PartialEq)]
pub struct EarthquakeRecord {
    pub event_id: String,
    pub title: String,
    pub magnitude: f64,
    pub place: String,
    pub time: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: f64,
}

// ============================================================================
// API Client Functions
// ============================================================================

/// Builds the event query URL for `[now - lookback_days, now]`.
pub fn build_query_url(config: &QuakeConfig, now: DateTime<Utc>) -> String {
    let start = now - Duration::days(config.lookback_days);
    let b = &config.bbox;
    format!(
        "{}?format=geojson&starttime={}&endtime={}&minlatitude={}&maxlatitude={}&minlongitude={}&maxlongitude={}",
        config.base_url,
        start.format("%Y-%m-%dT%H:%M:%S"),
        now.format("%Y-%m-%dT%H:%M:%S"),
        b.min_lat,
        b.max_lat,
        b.min_lon,
        b.max_lon
    )
}

/// Fetches the raw GeoJSON body.
pub fn fetch_events(
    client: &reqwest::blocking::Client,
    config: &QuakeConfig,
    now: DateTime<Utc>,
) -> Result<String> {
    super::fetch_body(client, &build_query_url(config, now))
}

/// Parses a GeoJSON body, keeping events inside `bbox`.
///
/// Events without coordinates, depth or magnitude are skipped, as are events
/// the server returned outside the box.
pub fn parse_events(body: &str, bbox: &BoundingBox) -> Result<Vec<EarthquakeRecord>> {
    let collection: FeatureCollection = serde_json::from_str(body)?;

    let records = collection
        .features
        .into_iter()
        .filter_map(|feature| {
            let coords = feature.geometry?.coordinates;
            let (longitude, latitude, depth_km) = match coords.as_slice() {
                [lon, lat, depth, ..] => (*lon, *lat, *depth),
                _ => return None,
            };
            if !bbox.contains(latitude, longitude) {
                return None;
            }

            let magnitude = feature.properties.mag?;
            let place = feature.properties.place.unwrap_or_default();
            let time = DateTime::<Utc>::from_timestamp_millis(feature.properties.time)?.naive_utc();

            Some(EarthquakeRecord {
                title: format!("M{} - {}", format_magnitude(magnitude), place),
                event_id: feature.id,
                magnitude,
                place,
                time,
                latitude,
                longitude,
                depth_km,
            })
        })
        .collect();

    Ok(records)
}

/// Whole magnitudes keep one decimal ("5.0"), the way the feed writes them.
fn format_magnitude(magnitude: f64) -> String {
    if magnitude.is_finite() && magnitude.fract() == 0.0 {
        format!("{:.1}", magnitude)
    } else {
        magnitude.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
