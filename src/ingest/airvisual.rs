/// IQAir AirVisual API client
///
/// Retrieves current air quality (US AQI and main pollutant) and weather
/// conditions for a single city.
///
/// API Documentation: https://api-docs.iqair.com/

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;

use crate::config::AirVisualConfig;
use crate::model::{Result, ServiceError};

// ============================================================================
// AirVisual API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CityResponse {
    pub status: String,
    pub data: CityData,
}

#[derive(Debug, Deserialize)]
pub struct CityData {
    pub city: String,
    pub state: String,
    pub country: String,
    pub location: Location,
    pub current: Current,
}

#[derive(Debug, Deserialize)]
pub struct Location {
    /// GeoJSON order: [longitude, latitude]
    pub coordinates: [f64; 2],
}

#[derive(Debug, Deserialize)]
pub struct Current {
    pub pollution: Pollution,
    pub weather: Weather,
}

#[derive(Debug, Deserialize)]
pub struct Pollution {
    pub ts: String,
    pub aqius: i32,
    pub mainus: String,
    pub aqicn: i32,
    pub maincn: String,
}

#[derive(Debug, Deserialize)]
pub struct Weather {
    pub ts: String,
    /// Weather icon code, e.g. "04d"
    pub ic: String,
    /// Humidity, %
    pub hu: i32,
    /// Pressure, hPa
    pub pr: i32,
    /// Temperature, °C
    pub tp: i32,
    /// Wind direction, degrees
    pub wd: i32,
    /// Wind speed, m/s
    pub ws: f64,
    #[serde(rename = "heatIndex")]
    pub heat_index: i32,
}

/// Flattened row for the `air_quality` table.
#[derive(Debug, Clone, PartialEq)]
pub struct AirQualityRecord {
    pub city: String,
    pub state: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub pollution_ts: NaiveDateTime,
    pub aqius: i32,
    pub mainus: String,
    pub aqicn: i32,
    pub maincn: String,
    pub weather_ts: NaiveDateTime,
    pub weather_ic: String,
    pub humidity: i32,
    pub pressure: i32,
    pub temperature: i32,
    pub wind_direction: i32,
    pub wind_speed: f64,
    pub heat_index: i32,
}

// ============================================================================
// API Client Functions
// ============================================================================

/// Builds the `/city` endpoint URL for the configured location.
pub fn build_city_url(config: &AirVisualConfig) -> String {
    format!(
        "{}/city?city={}&state={}&country={}&key={}",
        config.base_url.trim_end_matches('/'),
        config.city,
        config.state,
        config.country,
        config.api_key
    )
}

/// Fetches the raw JSON body for the configured city.
pub fn fetch_city(client: &reqwest::blocking::Client, config: &AirVisualConfig) -> Result<String> {
    if config.api_key.is_empty() {
        return Err(ServiceError::Config("airvisual.api_key is not set".into()));
    }
    super::fetch_body(client, &build_city_url(config))
}

/// Parses a `/city` response body into a table row.
pub fn parse_city_response(body: &str) -> Result<AirQualityRecord> {
    let response: CityResponse = serde_json::from_str(body)?;
    if response.status != "success" {
        return Err(ServiceError::Parse(format!("AirVisual status: {}", response.status)));
    }

    let data = response.data;
    let pollution = data.current.pollution;
    let weather = data.current.weather;

    Ok(AirQualityRecord {
        city: data.city,
        state: data.state,
        country: data.country,
        latitude: data.location.coordinates[1],
        longitude: data.location.coordinates[0],
        pollution_ts: parse_timestamp(&pollution.ts)?,
        aqius: pollution.aqius,
        mainus: pollution.mainus,
        aqicn: pollution.aqicn,
        maincn: pollution.maincn,
        weather_ts: parse_timestamp(&weather.ts)?,
        weather_ic: weather.ic,
        humidity: weather.hu,
        pressure: weather.pr,
        temperature: weather.tp,
        wind_direction: weather.wd,
        wind_speed: weather.ws,
        heat_index: weather.heat_index,
    })
}

/// RFC 3339 timestamp ("2025-11-03T07:00:00.000Z") to naive UTC.
fn parse_timestamp(ts: &str) -> Result<NaiveDateTime> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.naive_utc())
        .map_err(|e| ServiceError::Parse(format!("bad timestamp {:?}: {}", ts, e)))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SAMPLE: &str = r#"{
        "status": "success",
        "data": {
            "city": "Tokyo",
            "state": "Tokyo",
            "country": "Japan",
            "location": { "type": "Point", "coordinates": [139.6917, 35.6895] },
            "current": {
                "pollution": { "ts": "2025-11-03T07:00:00.000Z", "aqius": 42, "mainus": "p2", "aqicn": 15, "maincn": "p2" },
                "weather": { "ts": "2025-11-03T08:00:00.000Z", "ic": "04d", "hu": 61, "pr": 1016, "tp": 17, "wd": 30, "ws": 2.57, "heatIndex": 17 }
            }
        }
    }"#;

    #[test]
    fn test_parse_flattens_nested_payload() {
        let record = parse_city_response(SAMPLE).expect("sample should parse");
        assert_eq!(record.city, "Tokyo");
        assert_eq!(record.latitude, 35.6895);
        assert_eq!(record.longitude, 139.6917);
        assert_eq!(record.aqius, 42);
        assert_eq!(record.mainus, "p2");
        assert_eq!(record.wind_speed, 2.57);
        assert_eq!(record.heat_index, 17);
        assert_eq!(
            record.pollution_ts,
            NaiveDate::from_ymd_opt(2025, 11, 3).unwrap().and_hms_opt(7, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_failure_status_is_parse_error() {
        let body = r#"{"status":"fail","data":{"message":"city_not_found"}}"#;
        assert!(matches!(parse_city_response(body), Err(ServiceError::Parse(_))));
    }

    #[test]
    fn test_bad_timestamp_is_parse_error() {
        let body = SAMPLE.replace("2025-11-03T07:00:00.000Z", "yesterday");
        assert!(matches!(parse_city_response(&body), Err(ServiceError::Parse(_))));
    }

    #[test]
    fn test_city_url_contains_location_and_key() {
        let config = AirVisualConfig { api_key: "abc".into(), ..AirVisualConfig::default() };
        assert_eq!(
            build_city_url(&config),
            "http://api.airvisual.com/v2/city?city=Tokyo&state=Tokyo&country=Japan&key=abc"
        );
    }

    #[test]
    fn test_fetch_without_key_is_config_error() {
        let client = reqwest::blocking::Client::new();
        let result = fetch_city(&client, &AirVisualConfig::default());
        assert!(matches!(result, Err(ServiceError::Config(_))));
    }
}
