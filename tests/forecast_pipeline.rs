/// Integration tests for the forecast pipeline
///
/// These tests drive raw readings and fire detections through
/// `pipeline::forecast_and_store`:
/// 1. Five days of history train the trend model and roll out three days
/// 2. Short history falls back to the fire-weighted flat forecast
/// 3. Re-running over the same window never duplicates a prediction date
///
/// The in-memory store stands in for PostgreSQL, so these run offline.
/// The last test needs a live database and is ignored by default:
///
/// Run with: cargo test --test forecast_pipeline -- --ignored

use airwatch_service::analysis::forecast::ForecastMethod;
use airwatch_service::config::ForecastConfig;
use airwatch_service::model::{AqiReading, FireDetection};
use airwatch_service::pipeline::forecast_and_store;
use airwatch_service::predictions::MemoryPredictionStore;

use chrono::{NaiveDate, NaiveDateTime};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
}

fn now() -> NaiveDateTime {
    day(20).and_hms_opt(6, 30, 0).unwrap()
}

fn seeded(seed: u64) -> ForecastConfig {
    ForecastConfig { random_seed: Some(seed), ..ForecastConfig::default() }
}

/// Two readings per day whose mean is `aqi`.
fn readings_for(d: u32, aqi: f64) -> Vec<AqiReading> {
    vec![
        AqiReading { observed_at: day(d).and_hms_opt(3, 0, 0).unwrap(), aqi: aqi - 2.0 },
        AqiReading { observed_at: day(d).and_hms_opt(15, 0, 0).unwrap(), aqi: aqi + 2.0 },
    ]
}

/// Jan 1..5 with AQI 50, 55, 52, 60, 58 and fire intensity 10 on Jan 3-4.
fn five_day_history() -> (Vec<AqiReading>, Vec<FireDetection>) {
    let readings = [(1, 50.0), (2, 55.0), (3, 52.0), (4, 60.0), (5, 58.0)]
        .into_iter()
        .flat_map(|(d, aqi)| readings_for(d, aqi))
        .collect();
    let detections = vec![
        FireDetection { acq_date: day(3), brightness: 8.0 },
        FireDetection { acq_date: day(3), brightness: 12.0 },
        FireDetection { acq_date: day(4), brightness: 10.0 },
    ];
    (readings, detections)
}

// ---------------------------------------------------------------------------
// Trend path
// ---------------------------------------------------------------------------

#[test]
fn test_five_days_of_history_use_trend_model() {
    let (readings, detections) = five_day_history();
    let mut store = MemoryPredictionStore::new();

    let (result, summary) =
        forecast_and_store(&readings, &detections, &mut store, &seeded(42), now()).unwrap();

    match &result.method {
        ForecastMethod::Trend { mean_aqi, mean_fire, samples, .. } => {
            assert_eq!(*samples, 4);
            assert!((mean_aqi - 54.25).abs() < 1e-9);
            assert!((mean_fire - 5.0).abs() < 1e-9);
        }
        other => panic!("expected trend forecast, got {:?}", other),
    }

    assert_eq!(result.dates(), vec![day(6), day(7), day(8)]);
    assert_eq!(summary.inserted, 3);
    assert_eq!(summary.skipped, 0);

    let fire_ts = day(4).and_hms_opt(0, 0, 0).unwrap();
    for point in store.rows() {
        assert!(point.predicted_aqi >= 0.0);
        assert!(point.predicted_aqi.is_finite());
        assert_eq!(point.fire_event_timestamp, fire_ts);
    }
}

#[test]
fn test_same_seed_gives_same_forecast() {
    let (readings, detections) = five_day_history();

    let mut first = MemoryPredictionStore::new();
    let mut second = MemoryPredictionStore::new();
    let (a, _) = forecast_and_store(&readings, &detections, &mut first, &seeded(9), now()).unwrap();
    let (b, _) = forecast_and_store(&readings, &detections, &mut second, &seeded(9), now()).unwrap();

    assert_eq!(a, b);
}

// ---------------------------------------------------------------------------
// Fallback path
// ---------------------------------------------------------------------------

#[test]
fn test_short_history_falls_back_to_fire_weighted_forecast() {
    let readings: Vec<_> = [(1, 40.0), (2, 45.0)]
        .into_iter()
        .flat_map(|(d, aqi)| readings_for(d, aqi))
        .collect();
    let detections = vec![FireDetection { acq_date: day(3), brightness: 12.0 }];
    let mut store = MemoryPredictionStore::new();

    let (result, summary) =
        forecast_and_store(&readings, &detections, &mut store, &seeded(1), now()).unwrap();

    assert!(result.is_fallback());
    assert_eq!(result.dates(), vec![day(4), day(5), day(6)]);
    assert!(result.points.iter().all(|p| p.predicted_aqi == 60.0));
    assert_eq!(summary.inserted, 3);
}

#[test]
fn test_no_history_anchors_fallback_on_now() {
    let mut store = MemoryPredictionStore::new();

    let (result, _) = forecast_and_store(&[], &[], &mut store, &seeded(1), now()).unwrap();

    assert!(result.is_fallback());
    assert_eq!(result.dates(), vec![day(21), day(22), day(23)]);
    for point in &result.points {
        assert_eq!(point.predicted_aqi, 0.0);
        assert_eq!(point.fire_event_timestamp, now());
    }
}

// ---------------------------------------------------------------------------
// Idempotent persistence
// ---------------------------------------------------------------------------

#[test]
fn test_rerun_over_same_window_stores_each_date_once() {
    let (readings, detections) = five_day_history();
    let mut store = MemoryPredictionStore::new();

    let (first, _) =
        forecast_and_store(&readings, &detections, &mut store, &seeded(3), now()).unwrap();
    let (_, summary) =
        forecast_and_store(&readings, &detections, &mut store, &seeded(4), now()).unwrap();

    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.skipped, 3);
    assert_eq!(store.len(), 3);

    // The first run's values are kept.
    let stored: Vec<f64> = store.rows().map(|p| p.predicted_aqi).collect();
    let original: Vec<f64> = first.points.iter().map(|p| p.predicted_aqi).collect();
    assert_eq!(stored, original);
}

#[test]
fn test_new_day_of_history_adds_only_the_new_date() {
    let (mut readings, detections) = five_day_history();
    let mut store = MemoryPredictionStore::new();

    forecast_and_store(&readings, &detections, &mut store, &seeded(5), now()).unwrap();

    readings.extend(readings_for(6, 57.0));
    let (result, summary) =
        forecast_and_store(&readings, &detections, &mut store, &seeded(5), now()).unwrap();

    // Seed stays on the last fire day, dates move with the series.
    assert_eq!(result.dates(), vec![day(7), day(8), day(9)]);
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(store.len(), 4);
}

// ---------------------------------------------------------------------------
// PostgreSQL (requires DATABASE_URL)
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_run_forecast_against_live_database() {
    use airwatch_service::config::Config;
    use airwatch_service::db;
    use airwatch_service::pipeline::run_forecast;
    use chrono::Utc;

    dotenv::dotenv().ok();
    let mut config = Config::from_toml_str("[database]\nprediction_schema = \"airwatch_test\"\n")
        .expect("valid config");
    config.database.url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    config.forecast.random_seed = Some(11);

    let mut client = db::connect(&config.database).expect("connect");
    db::ensure_ingest_tables(&mut client).expect("ingest tables");

    let first = run_forecast(&mut client, &config, Utc::now());
    assert!(first.is_success(), "{}", first.message);
    assert_eq!(first.forecast_dates.len(), 3);

    let second = run_forecast(&mut client, &config, Utc::now());
    assert!(second.is_success(), "{}", second.message);
    assert_eq!(second.inserted, 0);

    client
        .batch_execute("DROP SCHEMA airwatch_test CASCADE")
        .expect("cleanup");
}
