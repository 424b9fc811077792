//! Monthly climatology and the anomaly table consumed by setup, baselines and
//! features.

use std::{collections::HashMap, path::Path};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use super::monthly::MonthlyObservation;
use crate::{
    calendar,
    table::{self, Column, Frame},
};

pub const ANOMALY_COLUMNS: [&str; 6] = [
    "country",
    "year",
    "month",
    "temp_c",
    "clim_temp_c",
    "anomaly_c",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClimatologyParams {
    pub ref_start: i64,
    pub ref_end: i64,
}

impl Default for ClimatologyParams {
    fn default() -> Self {
        Self {
            ref_start: 1991,
            ref_end: 2020,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyRecord {
    pub country: String,
    pub year: i64,
    pub month: u32,
    pub temp_c: f64,
    pub clim_temp_c: f64,
    pub anomaly_c: f64,
}

impl AnomalyRecord {
    pub fn key(&self) -> i64 {
        calendar::month_key(self.year, self.month)
    }
}

/// Mean temperature per (country, calendar month) over the reference years.
pub fn monthly_climatology(
    observations: &[MonthlyObservation],
    params: &ClimatologyParams,
) -> HashMap<(String, u32), f64> {
    let mut sums: HashMap<(String, u32), (f64, usize)> = HashMap::new();
    for obs in observations.iter().filter(|o| {
        !o.temp_c.is_nan() && (params.ref_start..=params.ref_end).contains(&o.year)
    }) {
        let entry = sums.entry((obs.country.clone(), obs.month)).or_default();
        entry.0 += obs.temp_c;
        entry.1 += 1;
    }

    sums.into_iter()
        .map(|(key, (sum, n))| (key, sum / n as f64))
        .collect()
}

/// Anomalies against the monthly climatology, sorted by (country, year, month).
///
/// Also returns how many observations were dropped for lacking a temperature
/// or a climatology value.
pub fn compute_anomalies(
    observations: &[MonthlyObservation],
    params: &ClimatologyParams,
) -> (Vec<AnomalyRecord>, usize) {
    let climatology = monthly_climatology(observations, params);

    let mut records: Vec<AnomalyRecord> = observations
        .iter()
        .filter(|obs| !obs.temp_c.is_nan())
        .filter_map(|obs| {
            let clim = *climatology.get(&(obs.country.clone(), obs.month))?;
            Some(AnomalyRecord {
                country: obs.country.clone(),
                year: obs.year,
                month: obs.month,
                temp_c: obs.temp_c,
                clim_temp_c: clim,
                anomaly_c: obs.temp_c - clim,
            })
        })
        .collect();
    records.sort_by(|a, b| {
        a.country
            .cmp(&b.country)
            .then(a.year.cmp(&b.year))
            .then(a.month.cmp(&b.month))
    });

    let dropped = observations.len() - records.len();
    (records, dropped)
}

pub fn to_frame(records: &[AnomalyRecord]) -> Frame {
    Frame::new()
        .with_column("country", Column::text(records.iter().map(|r| r.country.as_str())))
        .with_column("year", Column::ints(records.iter().map(|r| r.year)))
        .with_column("month", Column::ints(records.iter().map(|r| i64::from(r.month))))
        .with_column("temp_c", Column::floats(records.iter().map(|r| r.temp_c)))
        .with_column("clim_temp_c", Column::floats(records.iter().map(|r| r.clim_temp_c)))
        .with_column("anomaly_c", Column::floats(records.iter().map(|r| r.anomaly_c)))
}

/// Reads an anomaly table. Missing values become NaN; a row without country,
/// year or a valid month is an error.
pub fn read_anomalies(path: &Path) -> Result<Vec<AnomalyRecord>> {
    let frame =
        table::read_table(path).with_context(|| format!("cannot read {}", path.display()))?;
    frame
        .require(&ANOMALY_COLUMNS)
        .with_context(|| format!("missing columns in anomalies file {}", path.display()))?;

    let countries = frame.text("country")?;
    let years = frame.ints("year")?;
    let months = frame.ints("month")?;
    let temps = frame.floats("temp_c")?;
    let clims = frame.floats("clim_temp_c")?;
    let anomalies = frame.floats("anomaly_c")?;

    let mut records = Vec::with_capacity(frame.num_rows());
    for row in 0..frame.num_rows() {
        let (Some(country), Some(year), Some(month)) =
            (countries[row].clone(), years[row], months[row])
        else {
            return Err(anyhow!(
                "row {} of {} lacks country, year or month",
                row + 1,
                path.display()
            ));
        };
        if !(1..=12).contains(&month) {
            return Err(anyhow!("row {} of {} has month {}", row + 1, path.display(), month));
        }

        records.push(AnomalyRecord {
            country,
            year,
            month: month as u32,
            temp_c: temps[row].unwrap_or(f64::NAN),
            clim_temp_c: clims[row].unwrap_or(f64::NAN),
            anomaly_c: anomalies[row].unwrap_or(f64::NAN),
        });
    }

    Ok(records)
}

// -- Tests -------------------------------------------------------------------
