//! Walk-forward naive forecasts: climatology and lag-12.
//!
//! Every forecast is made at a cutoff for a target month `cutoff + horizon`.
//! A lag-12 forecast only reads the anomaly twelve months before its target,
//! and only when that month is at or before the cutoff.

use std::collections::{HashMap, HashSet};

use super::{climatology::AnomalyRecord, cutoffs::Cutoff};
use crate::{
    calendar,
    table::{Column, Frame},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Baseline {
    Climatology,
    Lag12,
}

impl Baseline {
    pub fn as_str(self) -> &'static str {
        match self {
            Baseline::Climatology => "climatology",
            Baseline::Lag12 => "lag12",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    pub country: String,
    pub target_key: i64,
    pub cutoff_key: i64,
    pub cutoff_ym: String,
    pub horizon: i64,
    pub pred_c: f64,
    pub truth_c: f64,
    pub baseline: Baseline,
    /// Month whose anomaly the forecast reads; lag-12 only.
    pub source_key: Option<i64>,
}

#[derive(Debug, Default)]
pub struct Forecasts {
    pub climatology: Vec<ForecastRow>,
    pub lag12: Vec<ForecastRow>,
}

/// Generates both baselines for every cutoff, country and horizon
/// `1..=horizons_max`. Targets without a finite climatology or truth are
/// skipped.
pub fn generate(records: &[AnomalyRecord], cutoffs: &[Cutoff], horizons_max: i64) -> Forecasts {
    let mut lookup: HashMap<(&str, i64), &AnomalyRecord> = HashMap::new();
    let mut countries: Vec<&str> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for record in records {
        lookup
            .entry((record.country.as_str(), record.key()))
            .or_insert(record);
        if seen.insert(record.country.as_str()) {
            countries.push(record.country.as_str());
        }
    }

    let mut forecasts = Forecasts::default();
    for cutoff in cutoffs {
        for &country in &countries {
            for horizon in 1..=horizons_max {
                let target_key = cutoff.key + horizon;
                let Some(target) = lookup.get(&(country, target_key)) else {
                    continue;
                };
                if !target.clim_temp_c.is_finite() || !target.temp_c.is_finite() {
                    continue;
                }

                let row = |baseline, pred_c, source_key| ForecastRow {
                    country: country.to_string(),
                    target_key,
                    cutoff_key: cutoff.key,
                    cutoff_ym: cutoff.ym.clone(),
                    horizon,
                    pred_c,
                    truth_c: target.temp_c,
                    baseline,
                    source_key,
                };

                forecasts
                    .climatology
                    .push(row(Baseline::Climatology, target.clim_temp_c, None));

                let source_key = target_key - 12;
                if source_key > cutoff.key {
                    continue;
                }
                if let Some(source) = lookup
                    .get(&(country, source_key))
                    .filter(|s| s.anomaly_c.is_finite())
                {
                    forecasts.lag12.push(row(
                        Baseline::Lag12,
                        source.anomaly_c + target.clim_temp_c,
                        Some(source_key),
                    ));
                }
            }
        }
    }

    forecasts
}

pub fn forecasts_frame(rows: &[ForecastRow]) -> Frame {
    let targets: Vec<(i64, u32)> = rows
        .iter()
        .map(|r| calendar::key_to_year_month(r.target_key))
        .collect();

    Frame::new()
        .with_column("country", Column::text(rows.iter().map(|r| r.country.as_str())))
        .with_column("year", Column::ints(targets.iter().map(|t| t.0)))
        .with_column("month", Column::ints(targets.iter().map(|t| i64::from(t.1))))
        .with_column("cutoff_ym", Column::text(rows.iter().map(|r| r.cutoff_ym.as_str())))
        .with_column("horizon", Column::ints(rows.iter().map(|r| r.horizon)))
        .with_column("pred_c", Column::floats(rows.iter().map(|r| r.pred_c)))
        .with_column("truth_c", Column::floats(rows.iter().map(|r| r.truth_c)))
        .with_column("baseline", Column::text(rows.iter().map(|r| r.baseline.as_str())))
}

// -- Tests -------------------------------------------------------------------
