//! Air quality ingest and short-horizon AQI forecasting service.
//!
//! Three feeds (AirVisual city AQI, NASA FIRMS fire detections, USGS
//! earthquakes) land in PostgreSQL with their raw payloads archived. The
//! forecast job merges daily AQI with daily fire intensity, trains a small
//! linear trend model and stores a few days of predicted AQI.

pub mod analysis;
pub mod archive;
pub mod config;
pub mod db;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod predictions;
