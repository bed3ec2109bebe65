/// Service configuration.
///
/// Loaded once per invocation from a TOML file and then passed explicitly
/// into each component. Secrets may be supplied through the environment
/// (or a `.env` file) instead of the TOML file:
///
///   DATABASE_URL, AIRVISUAL_API_KEY, FIRMS_MAP_KEY, ARCHIVE_ROOT
///
/// Every section has defaults, so an empty file is a valid configuration
/// as long as the required secrets come from the environment.

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{Result, ServiceError};

/// Environment variable naming the config file.
pub const CONFIG_PATH_VAR: &str = "AIRWATCH_CONFIG";

/// Config file used when `AIRWATCH_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "./airwatch.toml";

/// Upper bound for day-count windows; keeps date arithmetic in range.
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// FIRMS area queries accept 1 to 10 days.
const FIRMS_MAX_DAY_RANGE: u32 = 10;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub airvisual: AirVisualConfig,
    pub firms: FirmsConfig,
    pub quakes: QuakeConfig,
    pub archive: ArchiveConfig,
    pub forecast: ForecastConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// libpq-style connection string or `postgres://` URL.
    pub url: String,
    /// Schema holding `air_quality_predictions`.
    pub prediction_schema: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            prediction_schema: "dv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AirVisualConfig {
    pub base_url: String,
    pub api_key: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

impl Default for AirVisualConfig {
    fn default() -> Self {
        Self {
            base_url: "http://api.airvisual.com/v2".to_string(),
            api_key: String::new(),
            city: "Tokyo".to_string(),
            state: "Tokyo".to_string(),
            country: "Japan".to_string(),
        }
    }
}

/// Geographic bounding box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FirmsConfig {
    pub base_url: String,
    pub map_key: String,
    /// FIRMS product, e.g. "VIIRS_NOAA20_NRT".
    pub source: String,
    pub bbox: BoundingBox,
    /// Day range requested from the area API (1..=10).
    pub day_range: u32,
    /// Label used in archive keys.
    pub region: String,
}

impl Default for FirmsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://firms.modaps.eosdis.nasa.gov/api/area/csv".to_string(),
            map_key: String::new(),
            source: "VIIRS_NOAA20_NRT".to_string(),
            bbox: BoundingBox {
                min_lat: 35.4,
                max_lat: 36.0,
                min_lon: 139.5,
                max_lon: 140.0,
            },
            day_range: 5,
            region: "tokyo".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuakeConfig {
    pub base_url: String,
    pub bbox: BoundingBox,
    /// How far back the event query reaches, in days.
    pub lookback_days: i64,
    pub region: String,
}

impl Default for QuakeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://earthquake.usgs.gov/fdsnws/event/1/query".to_string(),
            bbox: BoundingBox {
                min_lat: 33.0,
                max_lat: 37.0,
                min_lon: 137.0,
                max_lon: 141.0,
            },
            lookback_days: 30,
            region: "tokyo".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub root: PathBuf,
    pub air_folder: String,
    pub fire_folder: String,
    pub quake_folder: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./raw_archive"),
            air_folder: "air_quality-backup".to_string(),
            fire_folder: "fire-backup".to_string(),
            quake_folder: "earthquake-backup".to_string(),
        }
    }
}

/// Forecasting knobs. The defaults are the values the production job runs
/// with; tests override `random_seed` to pin the SGD sample draws.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Trailing window of history read from the store.
    pub history_days: i64,
    pub horizon_days: u32,
    /// Below this many merged days the cold-start fallback is used.
    pub min_history_days: usize,
    pub fallback_fire_weight: f64,
    pub learning_rate: f64,
    pub steps: usize,
    pub random_seed: Option<u64>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            history_days: 90,
            horizon_days: 3,
            min_history_days: 5,
            fallback_fire_weight: 5.0,
            learning_rate: crate::analysis::trend::DEFAULT_LEARNING_RATE,
            steps: 4000,
            random_seed: None,
        }
    }
}

impl Config {
    /// Parse a config from TOML text without touching the environment.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.env`, read the TOML file at `path`, then apply environment
    /// overrides. A missing file is treated as an empty one.
    pub fn load(path: &Path) -> Result<Self> {
        dotenv::dotenv().ok();

        let text = if path.exists() {
            fs::read_to_string(path).map_err(|e| {
                ServiceError::Config(format!("cannot read {}: {}", path.display(), e))
            })?
        } else {
            String::new()
        };

        let mut config: Config = toml::from_str(&text)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from `AIRWATCH_CONFIG`, falling back to `./airwatch.toml`.
    pub fn load_default() -> Result<Self> {
        dotenv::dotenv().ok();
        let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(Path::new(&path))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(key) = env::var("AIRVISUAL_API_KEY") {
            self.airvisual.api_key = key;
        }
        if let Ok(key) = env::var("FIRMS_MAP_KEY") {
            self.firms.map_key = key;
        }
        if let Ok(root) = env::var("ARCHIVE_ROOT") {
            self.archive.root = PathBuf::from(root);
        }
    }

    fn validate(&self) -> Result<()> {
        let f = &self.forecast;
        if f.horizon_days == 0 || i64::from(f.horizon_days) > MAX_WINDOW_DAYS {
            return Err(ServiceError::Config(format!(
                "forecast.horizon_days must be between 1 and {}",
                MAX_WINDOW_DAYS
            )));
        }
        if f.min_history_days < 2 {
            return Err(ServiceError::Config(
                "forecast.min_history_days must be at least 2 to form a training pair".into(),
            ));
        }
        if !(f.learning_rate > 0.0 && f.learning_rate.is_finite()) {
            return Err(ServiceError::Config("forecast.learning_rate must be positive".into()));
        }
        if f.history_days <= 0 || f.history_days > MAX_WINDOW_DAYS {
            return Err(ServiceError::Config(format!(
                "forecast.history_days must be between 1 and {}",
                MAX_WINDOW_DAYS
            )));
        }
        if self.quakes.lookback_days <= 0 || self.quakes.lookback_days > MAX_WINDOW_DAYS {
            return Err(ServiceError::Config(format!(
                "quakes.lookback_days must be between 1 and {}",
                MAX_WINDOW_DAYS
            )));
        }
        if self.firms.day_range == 0 || self.firms.day_range > FIRMS_MAX_DAY_RANGE {
            return Err(ServiceError::Config(format!(
                "firms.day_range must be between 1 and {}",
                FIRMS_MAX_DAY_RANGE
            )));
        }
        let schema = &self.database.prediction_schema;
        if schema.is_empty() || !schema.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ServiceError::Config(format!(
                "database.prediction_schema {:?} is not a plain identifier",
                schema
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
