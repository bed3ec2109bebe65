/// Upstream feed clients.
///
/// Each submodule builds its request URL, fetches the raw body and parses
/// it into row structs ready for `db`. Parsing is kept separate from the
/// HTTP call so it can be tested against captured payloads.
///
/// - `airvisual`: current city air quality + weather (JSON)
/// - `firms`: NASA FIRMS VIIRS fire detections (CSV)
/// - `quakes`: USGS FDSN earthquake events (GeoJSON)

pub mod airvisual;
pub mod firms;
pub mod quakes;

use std::time::Duration;

use crate::model::{Result, ServiceError};

/// Per-request timeout applied by `http_client`.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Blocking client shared by all feeds within one invocation.
pub fn http_client() -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(concat!("airwatch_service/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ServiceError::Request(e.to_string()))
}

/// GETs `url` and returns the body, mapping non-2xx to `ServiceError::Http`.
pub(crate) fn fetch_body(client: &reqwest::blocking::Client, url: &str) -> Result<String> {
    let response = client.get(url).send()?;

    if !response.status().is_success() {
        return Err(ServiceError::Http(response.status().as_u16()));
    }

    Ok(response.text()?)
}
