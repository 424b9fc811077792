//! Per-country lagged, rolling and trend features with a one-step-ahead target.
//!
//! Shifts are positional within each country's time-sorted rows. Every
//! rolling window is taken over the series shifted by one, so a feature at
//! row t never sees the anomaly at t.

use std::{collections::BTreeMap, f64::consts::PI};

use super::climatology::AnomalyRecord;
use crate::{
    stats,
    table::{Column, Frame},
};

/// Months per unit of `trend_k_norm`.
const TREND_SCALE: f64 = 120.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub country: String,
    pub year: i64,
    pub month: u32,
    pub temp_c: f64,
    pub clim_temp_c: f64,
    pub anomaly_c: f64,
    pub mon_sin: f64,
    pub mon_cos: f64,
    pub anom_lag1: f64,
    pub anom_lag12: f64,
    pub anom_lag24: f64,
    pub roll_mean_3: f64,
    pub roll_std_3: f64,
    pub roll_mean_12: f64,
    pub trend_k_norm: f64,
    pub recent_trend_36: f64,
    pub target_anom_t_plus_1: f64,
}

impl FeatureRow {
    /// True when every feature a model cannot do without is present.
    pub fn is_complete(&self) -> bool {
        [
            self.anom_lag1,
            self.anom_lag12,
            self.roll_mean_3,
            self.roll_std_3,
            self.target_anom_t_plus_1,
        ]
        .iter()
        .all(|v| !v.is_nan())
    }
}

/// Features for every row, incomplete ones included. Countries come out in
/// name order, each sorted by time.
pub fn build_features(records: &[AnomalyRecord]) -> Vec<FeatureRow> {
    let keys: Vec<f64> = records.iter().map(|r| r.key() as f64).collect();
    let k_mean = stats::mean(&keys);

    let mut by_country: BTreeMap<&str, Vec<&AnomalyRecord>> = BTreeMap::new();
    for record in records {
        by_country
            .entry(record.country.as_str())
            .or_default()
            .push(record);
    }

    let mut rows = Vec::with_capacity(records.len());
    for mut group in by_country.into_values() {
        group.sort_by_key(|r| (r.year, r.month));
        rows.extend(country_features(&group, k_mean));
    }

    rows
}

fn country_features(group: &[&AnomalyRecord], k_mean: f64) -> Vec<FeatureRow> {
    let anomalies: Vec<f64> = group.iter().map(|r| r.anomaly_c).collect();
    let prior = stats::shift(&anomalies, 1);

    let lag12 = stats::shift(&anomalies, 12);
    let lag24 = stats::shift(&anomalies, 24);
    let roll_mean_3 = stats::rolling_mean(&prior, 3, 3);
    let roll_std_3 = stats::rolling_std(&prior, 3, 3, 0);
    let roll_mean_12 = stats::rolling_mean(&prior, 12, 12);
    let last_36 = stats::rolling_mean(&prior, 36, 12);
    let previous_36 = stats::rolling_mean(&stats::shift(&prior, 36), 36, 12);
    let target = stats::shift(&anomalies, -1);

    group
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let angle = 2.0 * PI * f64::from(record.month) / 12.0;
            FeatureRow {
                country: record.country.clone(),
                year: record.year,
                month: record.month,
                temp_c: record.temp_c,
                clim_temp_c: record.clim_temp_c,
                anomaly_c: record.anomaly_c,
                mon_sin: angle.sin(),
                mon_cos: angle.cos(),
                anom_lag1: prior[i],
                anom_lag12: lag12[i],
                anom_lag24: lag24[i],
                roll_mean_3: roll_mean_3[i],
                roll_std_3: roll_std_3[i],
                roll_mean_12: roll_mean_12[i],
                trend_k_norm: (record.key() as f64 - k_mean) / TREND_SCALE,
                recent_trend_36: last_36[i] - previous_36[i],
                target_anom_t_plus_1: target[i],
            }
        })
        .collect()
}

/// Output table; `include_optional` adds `anom_lag24` and `roll_mean_12`.
pub fn features_frame(rows: &[FeatureRow], include_optional: bool) -> Frame {
    let float = |get: fn(&FeatureRow) -> f64| Column::floats(rows.iter().map(get));

    let mut frame = Frame::new()
        .with_column("country", Column::text(rows.iter().map(|r| r.country.as_str())))
        .with_column("year", Column::ints(rows.iter().map(|r| r.year)))
        .with_column("month", Column::ints(rows.iter().map(|r| i64::from(r.month))))
        .with_column("temp_c", float(|r| r.temp_c))
        .with_column("clim_temp_c", float(|r| r.clim_temp_c))
        .with_column("anomaly_c", float(|r| r.anomaly_c))
        .with_column("mon_sin", float(|r| r.mon_sin))
        .with_column("mon_cos", float(|r| r.mon_cos))
        .with_column("anom_lag1", float(|r| r.anom_lag1))
        .with_column("anom_lag12", float(|r| r.anom_lag12))
        .with_column("roll_mean_3", float(|r| r.roll_mean_3))
        .with_column("roll_std_3", float(|r| r.roll_std_3))
        .with_column("trend_k_norm", float(|r| r.trend_k_norm))
        .with_column("recent_trend_36", float(|r| r.recent_trend_36))
        .with_column("target_anom_t_plus_1", float(|r| r.target_anom_t_plus_1));

    if include_optional {
        frame.push_column("anom_lag24", float(|r| r.anom_lag24));
        frame.push_column("roll_mean_12", float(|r| r.roll_mean_12));
    }

    frame
}

// -- Tests -------------------------------------------------------------------
