//! Short-horizon AQI forecasting.
//!
//! Two paths:
//!
//! - **Fallback** (fewer than `min_history_days` merged days): a flat
//!   forecast of `last fire intensity * fallback_fire_weight`, starting the
//!   day after the last fire observation. Low confidence; the trend model is
//!   not consulted.
//! - **Trend**: mean-scale the training pairs, fit the SGD model, map the
//!   weights back to original units and roll forward autoregressively,
//!   holding fire intensity at the seed day's value.
//!
//! # Clock injection
//! `FireContext::from_daily` takes `now` rather than calling `Utc::now()`,
//! so forecasts for series without fire data stay deterministic in tests.

use chrono::{Days, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::analysis::features::training_samples;
use crate::analysis::scaling::MeanScaler;
use crate::analysis::trend::TrendModel;
use crate::config::ForecastConfig;
use crate::model::{DailyFireIntensity, ForecastPoint, MergedDay, ModelWeights};

// ---------------------------------------------------------------------------
// Fire context
// ---------------------------------------------------------------------------

/// What the forecaster knows about recent fire activity.
#[derive(Debug, Clone, PartialEq)]
pub struct FireContext {
    /// Most recent day with detections, if any.
    pub last_fire_date: Option<NaiveDate>,
    /// Mean intensity on `last_fire_date`; 0.0 without fire data.
    pub last_intensity: f64,
    /// Stored alongside each forecast point: midnight of `last_fire_date`,
    /// or the invocation time when there is no fire data.
    pub fire_event_timestamp: NaiveDateTime,
    /// Anchor date used by the fallback path without fire data.
    pub today: NaiveDate,
}

impl FireContext {
    pub fn from_daily(daily_fire: &[DailyFireIntensity], now: NaiveDateTime) -> Self {
        match daily_fire.iter().max_by_key(|f| f.date) {
            Some(last) => Self {
                last_fire_date: Some(last.date),
                last_intensity: last.intensity_mean,
                fire_event_timestamp: last.date.and_time(chrono::NaiveTime::MIN),
                today: now.date(),
            },
            None => Self {
                last_fire_date: None,
                last_intensity: 0.0,
                fire_event_timestamp: now,
                today: now.date(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Forecast result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ForecastMethod {
    /// Not enough merged history; flat fire-weighted forecast.
    Fallback { history_days: usize },
    /// Trained trend model, weights in original units.
    Trend {
        weights: ModelWeights,
        mean_aqi: f64,
        mean_fire: f64,
        samples: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub method: ForecastMethod,
    pub points: Vec<ForecastPoint>,
}

impl Forecast {
    pub fn is_fallback(&self) -> bool {
        matches!(self.method, ForecastMethod::Fallback { .. })
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.prediction_date).collect()
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Builds the SGD random source: seeded when `random_seed` is set,
/// otherwise from OS entropy.
pub fn rng_from_config(config: &ForecastConfig) -> StdRng {
    match config.random_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Forecasts `config.horizon_days` days of AQI from the merged series.
pub fn forecast<R: Rng>(
    series: &[MergedDay],
    fire: &FireContext,
    config: &ForecastConfig,
    rng: &mut R,
) -> Forecast {
    // At least two days are needed for a single training pair.
    if series.len() < config.min_history_days.max(2) {
        return fallback_forecast(series.len(), fire, config);
    }

    let samples = training_samples(series);
    let scaler = MeanScaler::from_samples(&samples);
    let scaled = scaler.scale_samples(&samples);

    let mut model = TrendModel::new();
    model.fit(&scaled, config.learning_rate, config.steps, rng);
    let weights = scaler.unscale_weights(model.weights());

    let seed = seed_day(series, fire.last_fire_date);
    let last_day = series.last().map(|d| d.date).unwrap_or(seed.date);

    let points = rollout(
        &weights,
        seed.aqi,
        seed.fire_intensity,
        last_day,
        config.horizon_days,
        fire.fire_event_timestamp,
    );

    Forecast {
        method: ForecastMethod::Trend {
            weights,
            mean_aqi: scaler.mean_aqi,
            mean_fire: scaler.mean_fire,
            samples: samples.len(),
        },
        points,
    }
}

/// Flat cold-start forecast; see module docs.
pub fn fallback_forecast(
    history_days: usize,
    fire: &FireContext,
    config: &ForecastConfig,
) -> Forecast {
    let anchor = fire.last_fire_date.unwrap_or(fire.today);
    let predicted_aqi = fire.last_intensity * config.fallback_fire_weight;

    let points = (1..=config.horizon_days)
        .filter_map(|i| anchor.checked_add_days(Days::new(u64::from(i))))
        .map(|prediction_date| ForecastPoint {
            prediction_date,
            fire_event_timestamp: fire.fire_event_timestamp,
            predicted_aqi,
        })
        .collect();

    Forecast {
        method: ForecastMethod::Fallback { history_days },
        points,
    }
}

/// The last merged day on or before the most recent fire date.
///
/// Without fire data, or when every merged day is later than the last fire,
/// the last merged day is used. `series` must be non-empty.
fn seed_day(series: &[MergedDay], last_fire_date: Option<NaiveDate>) -> &MergedDay {
    let last = &series[series.len() - 1];
    match last_fire_date {
        Some(fire_date) => series
            .iter()
            .rev()
            .find(|d| d.date <= fire_date)
            .unwrap_or(last),
        None => last,
    }
}

/// Autoregressive rollout starting the day after `last_day`.
///
/// Each prediction is clamped to be non-negative and becomes the next day's
/// AQI input; fire intensity stays at `fire` for the whole horizon.
pub fn rollout(
    weights: &ModelWeights,
    seed_aqi: f64,
    fire: f64,
    last_day: NaiveDate,
    horizon_days: u32,
    fire_event_timestamp: NaiveDateTime,
) -> Vec<ForecastPoint> {
    let mut points = Vec::with_capacity(horizon_days as usize);
    let mut current_aqi = seed_aqi;

    for i in 1..=horizon_days {
        let Some(prediction_date) = last_day.checked_add_days(Days::new(u64::from(i))) else {
            break;
        };
        let predicted_aqi = weights.predict(current_aqi, fire).max(0.0);
        points.push(ForecastPoint {
            prediction_date,
            fire_event_timestamp,
            predicted_aqi,
        });
        current_aqi = predicted_aqi;
    }

    points
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn merged(d: u32, aqi: f64, fire_intensity: f64) -> MergedDay {
        MergedDay { date: day(d), aqi, fire_intensity }
    }

    /// A fixed "now" used across tests: 2025-02-01 08:30:00.
    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, 1).unwrap().and_hms_opt(8, 30, 0).unwrap()
    }

    fn seeded_config() -> ForecastConfig {
        ForecastConfig { random_seed: Some(42), ..ForecastConfig::default() }
    }

    fn scenario_series() -> Vec<MergedDay> {
        vec![
            merged(1, 50.0, 0.0),
            merged(2, 55.0, 0.0),
            merged(3, 52.0, 10.0),
            merged(4, 60.0, 10.0),
            merged(5, 58.0, 0.0),
        ]
    }

    fn scenario_fire() -> FireContext {
        let daily = vec![
            DailyFireIntensity { date: day(3), intensity_mean: 10.0 },
            DailyFireIntensity { date: day(4), intensity_mean: 10.0 },
        ];
        FireContext::from_daily(&daily, fixed_now())
    }

    // --- Fire context -------------------------------------------------------

    #[test]
    fn test_fire_context_uses_latest_day() {
        let daily = vec![
            DailyFireIntensity { date: day(9), intensity_mean: 320.0 },
            DailyFireIntensity { date: day(3), intensity_mean: 300.0 },
        ];
        let ctx = FireContext::from_daily(&daily, fixed_now());
        assert_eq!(ctx.last_fire_date, Some(day(9)));
        assert_eq!(ctx.last_intensity, 320.0);
        assert_eq!(ctx.fire_event_timestamp, day(9).and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn test_fire_context_without_fires_uses_now() {
        let ctx = FireContext::from_daily(&[], fixed_now());
        assert_eq!(ctx.last_fire_date, None);
        assert_eq!(ctx.last_intensity, 0.0);
        assert_eq!(ctx.fire_event_timestamp, fixed_now());
    }

    // --- Fallback -----------------------------------------------------------

    #[test]
    fn test_short_history_takes_fallback_after_last_fire_date() {
        let series = vec![merged(1, 40.0, 0.0), merged(2, 42.0, 12.0)];
        let daily = vec![DailyFireIntensity { date: day(2), intensity_mean: 12.0 }];
        let fire = FireContext::from_daily(&daily, fixed_now());

        let result = forecast(&series, &fire, &seeded_config(), &mut rng_from_config(&seeded_config()));

        assert!(result.is_fallback());
        assert_eq!(result.dates(), vec![day(3), day(4), day(5)]);
        assert!(result.points.iter().all(|p| p.predicted_aqi == 60.0));
    }

    #[test]
    fn test_fallback_without_fire_is_zero_from_today() {
        let fire = FireContext::from_daily(&[], fixed_now());
        let result = fallback_forecast(0, &fire, &ForecastConfig::default());

        let feb = |d| NaiveDate::from_ymd_opt(2025, 2, d).unwrap();
        assert_eq!(result.dates(), vec![feb(2), feb(3), feb(4)]);
        assert!(result.points.iter().all(|p| p.predicted_aqi == 0.0));
        assert!(result.points.iter().all(|p| p.fire_event_timestamp == fixed_now()));
    }

    #[test]
    fn test_empty_series_takes_fallback() {
        let result = forecast(&[], &scenario_fire(), &seeded_config(), &mut rng_from_config(&seeded_config()));
        assert_eq!(result.method, ForecastMethod::Fallback { history_days: 0 });
        assert_eq!(result.points.len(), 3);
    }

    // --- Trend path ---------------------------------------------------------

    #[test]
    fn test_scenario_forecasts_three_days_after_series() {
        let config = seeded_config();
        let result = forecast(&scenario_series(), &scenario_fire(), &config, &mut rng_from_config(&config));

        match &result.method {
            ForecastMethod::Trend { mean_aqi, mean_fire, samples, .. } => {
                assert_eq!(*samples, 4);
                assert_eq!(*mean_aqi, 54.25);
                assert_eq!(*mean_fire, 5.0);
            }
            other => panic!("expected trend forecast, got {:?}", other),
        }
        assert_eq!(result.dates(), vec![day(6), day(7), day(8)]);
        assert!(result.points.iter().all(|p| p.predicted_aqi >= 0.0));
        assert!(result.points.iter().all(|p| p.predicted_aqi.is_finite()));
        assert_eq!(
            result.points[0].fire_event_timestamp,
            day(4).and_hms_opt(0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_scenario_rollout_is_seeded_from_last_fire_day() {
        let config = seeded_config();
        let result = forecast(&scenario_series(), &scenario_fire(), &config, &mut rng_from_config(&config));
        let ForecastMethod::Trend { weights, .. } = result.method else {
            panic!("expected trend forecast");
        };

        // Day 4 is the seed: aqi 60, fire 10.
        let first = weights.predict(60.0, 10.0).max(0.0);
        assert!((result.points[0].predicted_aqi - first).abs() < 1e-9);
        let second = weights.predict(first, 10.0).max(0.0);
        assert!((result.points[1].predicted_aqi - second).abs() < 1e-9);
    }

    #[test]
    fn test_same_seed_same_forecast() {
        let config = seeded_config();
        let a = forecast(&scenario_series(), &scenario_fire(), &config, &mut rng_from_config(&config));
        let b = forecast(&scenario_series(), &scenario_fire(), &config, &mut rng_from_config(&config));
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_falls_back_to_last_day_without_fire() {
        let series = scenario_series();
        assert_eq!(seed_day(&series, None).date, day(5));
        assert_eq!(seed_day(&series, Some(day(3))).date, day(3));
        // Fire long before any AQI data.
        let early = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
        assert_eq!(seed_day(&series, Some(early)).date, day(5));
    }

    // --- Rollout ------------------------------------------------------------

    #[test]
    fn test_rollout_feeds_predictions_forward() {
        let weights = ModelWeights { bias: 2.0, aqi_coef: 0.5, fire_coef: 1.0 };
        let ts = fixed_now();
        let points = rollout(&weights, 40.0, 4.0, day(10), 3, ts);

        let values: Vec<f64> = points.iter().map(|p| p.predicted_aqi).collect();
        // 2 + 20 + 4 = 26; 2 + 13 + 4 = 19; 2 + 9.5 + 4 = 15.5
        assert_eq!(values, vec![26.0, 19.0, 15.5]);
        assert_eq!(points[2].prediction_date, day(13));
    }

    #[test]
    fn test_rollout_clamps_negative_and_feeds_zero() {
        // Day 1: -50 + 0.5*20 = -40 -> 0. Day 2 input is 0: -50 -> 0.
        let weights = ModelWeights { bias: -50.0, aqi_coef: 0.5, fire_coef: 0.0 };
        let points = rollout(&weights, 20.0, 0.0, day(1), 3, fixed_now());
        assert!(points.iter().all(|p| p.predicted_aqi == 0.0));

        // Recovers only through the bias once the input is clamped to 0.
        let weights = ModelWeights { bias: 5.0, aqi_coef: -2.0, fire_coef: 0.0 };
        let points = rollout(&weights, 10.0, 0.0, day(1), 3, fixed_now());
        let values: Vec<f64> = points.iter().map(|p| p.predicted_aqi).collect();
        // 5 - 20 = -15 -> 0; 5 - 0 = 5; 5 - 10 = -5 -> 0
        assert_eq!(values, vec![0.0, 5.0, 0.0]);
    }
}
