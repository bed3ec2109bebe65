//! Daily feature construction.
//!
//! Raw AQI readings arrive at arbitrary timestamps and fire detections are
//! stamped by acquisition date. Both are collapsed to one mean per calendar
//! day, then the fire series is left-joined onto the AQI series.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::model::{
    AqiReading, DailyFireIntensity, DailyObservation, FireDetection, MergedDay, MergedSeries,
    TrainingSample,
};

/// Groups `(date, value)` pairs by date and averages each group.
/// The result is ascending by date.
fn daily_means<I>(values: I) -> Vec<(NaiveDate, f64)>
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    let mut groups: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for (date, value) in values {
        let entry = groups.entry(date).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    groups
        .into_iter()
        .map(|(date, (sum, count))| (date, sum / count as f64))
        .collect()
}

/// Mean AQI per calendar day of `observed_at`.
pub fn daily_aqi(readings: &[AqiReading]) -> Vec<DailyObservation> {
    daily_means(readings.iter().map(|r| (r.observed_at.date(), r.aqi)))
        .into_iter()
        .map(|(date, aqi_mean)| DailyObservation { date, aqi_mean })
        .collect()
}

/// Mean brightness per acquisition date.
pub fn daily_fire_intensity(detections: &[FireDetection]) -> Vec<DailyFireIntensity> {
    daily_means(detections.iter().map(|d| (d.acq_date, d.brightness)))
        .into_iter()
        .map(|(date, intensity_mean)| DailyFireIntensity { date, intensity_mean })
        .collect()
}

/// Left-joins the fire series onto the AQI series by date.
///
/// One row per AQI date, ascending. Days without a fire entry get 0.0.
/// An empty AQI series yields an empty result regardless of fire data.
pub fn merge_daily(aqi: &[DailyObservation], fire: &[DailyFireIntensity]) -> MergedSeries {
    let fire_by_date: HashMap<NaiveDate, f64> =
        fire.iter().map(|f| (f.date, f.intensity_mean)).collect();

    let mut merged: MergedSeries = aqi
        .iter()
        .map(|obs| MergedDay {
            date: obs.date,
            aqi: obs.aqi_mean,
            fire_intensity: fire_by_date.get(&obs.date).copied().unwrap_or(0.0),
        })
        .collect();

    merged.sort_by_key(|day| day.date);
    merged
}

/// Convenience wrapper: raw readings straight to the merged daily series.
pub fn build_merged_series(readings: &[AqiReading], detections: &[FireDetection]) -> MergedSeries {
    merge_daily(&daily_aqi(readings), &daily_fire_intensity(detections))
}

/// Pairs each day's features with the following day's AQI.
///
/// Yields `series.len() - 1` samples, or none for fewer than two days.
pub fn training_samples(series: &[MergedDay]) -> Vec<TrainingSample> {
    series
        .windows(2)
        .map(|pair| TrainingSample {
            aqi: pair[0].aqi,
            fire: pair[0].fire_intensity,
            next_aqi: pair[1].aqi,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
