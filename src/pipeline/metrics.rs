//! Forecast error metrics by country and globally.
//!
//! The global figures are the unweighted mean of the per-country MAE and
//! RMSE, so every country counts once regardless of its number of forecasts.
//! This is not a pooled RMSE.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use anyhow::{anyhow, Context, Result};

use super::cutoffs::{bucket_name, HorizonBucket};
use crate::{
    stats,
    table::{self, Column, Frame},
};

pub const FORECAST_COLUMNS: [&str; 5] = ["country", "baseline", "horizon", "pred_c", "truth_c"];

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastOutcome {
    pub country: String,
    pub baseline: String,
    pub horizon: i64,
    pub pred_c: f64,
    pub truth_c: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountryMetrics {
    pub country: String,
    pub baseline: String,
    pub bucket: String,
    pub n: usize,
    pub mae: f64,
    pub rmse: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalMetrics {
    pub baseline: String,
    pub bucket: String,
    pub countries: usize,
    pub mae: f64,
    pub rmse: f64,
}

pub fn read_forecasts(path: &Path) -> Result<Vec<ForecastOutcome>> {
    let frame =
        table::read_table(path).with_context(|| format!("cannot read {}", path.display()))?;
    frame
        .require(&FORECAST_COLUMNS)
        .with_context(|| format!("missing columns in forecasts file {}", path.display()))?;

    let countries = frame.text("country")?;
    let baselines = frame.text("baseline")?;
    let horizons = frame.ints("horizon")?;
    let preds = frame.floats("pred_c")?;
    let truths = frame.floats("truth_c")?;

    (0..frame.num_rows())
        .map(|row| {
            let (Some(country), Some(baseline), Some(horizon)) =
                (countries[row].clone(), baselines[row].clone(), horizons[row])
            else {
                return Err(anyhow!(
                    "row {} of {} lacks country, baseline or horizon",
                    row + 1,
                    path.display()
                ));
            };
            Ok(ForecastOutcome {
                country,
                baseline,
                horizon,
                pred_c: preds[row].unwrap_or(f64::NAN),
                truth_c: truths[row].unwrap_or(f64::NAN),
            })
        })
        .collect()
}

#[derive(Default)]
struct ErrorSums {
    n: usize,
    abs: f64,
    squared: f64,
}

/// MAE and RMSE per (country, baseline, bucket), in key order. Rows with a
/// missing prediction or truth do not count towards `n`.
pub fn by_country(outcomes: &[ForecastOutcome], buckets: &[HorizonBucket]) -> Vec<CountryMetrics> {
    let mut groups: BTreeMap<(&str, &str, &str), ErrorSums> = BTreeMap::new();
    for outcome in outcomes {
        let key = (
            outcome.country.as_str(),
            outcome.baseline.as_str(),
            bucket_name(outcome.horizon, buckets),
        );
        let sums = groups.entry(key).or_default();

        let error = outcome.pred_c - outcome.truth_c;
        if error.is_finite() {
            sums.n += 1;
            sums.abs += error.abs();
            sums.squared += error * error;
        }
    }

    groups
        .into_iter()
        .map(|((country, baseline, bucket), sums)| {
            let n = sums.n as f64;
            CountryMetrics {
                country: country.to_string(),
                baseline: baseline.to_string(),
                bucket: bucket.to_string(),
                n: sums.n,
                mae: if sums.n > 0 { sums.abs / n } else { f64::NAN },
                rmse: if sums.n > 0 { (sums.squared / n).sqrt() } else { f64::NAN },
            }
        })
        .collect()
}

/// Per (baseline, bucket): distinct countries and the unweighted mean of the
/// country-level MAE and RMSE.
pub fn global(by_country: &[CountryMetrics]) -> Vec<GlobalMetrics> {
    let mut groups: BTreeMap<(&str, &str), (BTreeSet<&str>, Vec<f64>, Vec<f64>)> =
        BTreeMap::new();
    for row in by_country {
        let (countries, maes, rmses) = groups
            .entry((row.baseline.as_str(), row.bucket.as_str()))
            .or_default();
        countries.insert(row.country.as_str());
        maes.push(row.mae);
        rmses.push(row.rmse);
    }

    groups
        .into_iter()
        .map(|((baseline, bucket), (countries, maes, rmses))| GlobalMetrics {
            baseline: baseline.to_string(),
            bucket: bucket.to_string(),
            countries: countries.len(),
            mae: stats::mean(&maes),
            rmse: stats::mean(&rmses),
        })
        .collect()
}

pub fn by_country_frame(rows: &[CountryMetrics]) -> Frame {
    Frame::new()
        .with_column("country", Column::text(rows.iter().map(|r| r.country.as_str())))
        .with_column("baseline", Column::text(rows.iter().map(|r| r.baseline.as_str())))
        .with_column("bucket", Column::text(rows.iter().map(|r| r.bucket.as_str())))
        .with_column("n", Column::ints(rows.iter().map(|r| r.n as i64)))
        .with_column("MAE", Column::floats(rows.iter().map(|r| r.mae)))
        .with_column("RMSE", Column::floats(rows.iter().map(|r| r.rmse)))
}

pub fn global_frame(rows: &[GlobalMetrics]) -> Frame {
    Frame::new()
        .with_column("baseline", Column::text(rows.iter().map(|r| r.baseline.as_str())))
        .with_column("bucket", Column::text(rows.iter().map(|r| r.bucket.as_str())))
        .with_column("countries", Column::ints(rows.iter().map(|r| r.countries as i64)))
        .with_column("MAE", Column::floats(rows.iter().map(|r| r.mae)))
        .with_column("RMSE", Column::floats(rows.iter().map(|r| r.rmse)))
}

pub fn read_by_country(path: &Path) -> Result<Vec<CountryMetrics>> {
    let frame =
        table::read_table(path).with_context(|| format!("cannot read {}", path.display()))?;
    frame
        .require(&["country", "baseline", "bucket", "n", "MAE", "RMSE"])
        .with_context(|| format!("missing columns in {}", path.display()))?;

    let countries = frame.text("country")?;
    let baselines = frame.text("baseline")?;
    let buckets = frame.text("bucket")?;
    let ns = frame.ints("n")?;
    let maes = frame.floats("MAE")?;
    let rmses = frame.floats("RMSE")?;

    Ok((0..frame.num_rows())
        .map(|row| CountryMetrics {
            country: countries[row].clone().unwrap_or_default(),
            baseline: baselines[row].clone().unwrap_or_default(),
            bucket: buckets[row].clone().unwrap_or_default(),
            n: ns[row].unwrap_or(0).max(0) as usize,
            mae: maes[row].unwrap_or(f64::NAN),
            rmse: rmses[row].unwrap_or(f64::NAN),
        })
        .collect())
}

pub fn read_global(path: &Path) -> Result<Vec<GlobalMetrics>> {
    let frame =
        table::read_table(path).with_context(|| format!("cannot read {}", path.display()))?;
    frame
        .require(&["baseline", "bucket", "countries", "MAE", "RMSE"])
        .with_context(|| format!("missing columns in {}", path.display()))?;

    let baselines = frame.text("baseline")?;
    let buckets = frame.text("bucket")?;
    let countries = frame.ints("countries")?;
    let maes = frame.floats("MAE")?;
    let rmses = frame.floats("RMSE")?;

    Ok((0..frame.num_rows())
        .map(|row| GlobalMetrics {
            baseline: baselines[row].clone().unwrap_or_default(),
            bucket: buckets[row].clone().unwrap_or_default(),
            countries: countries[row].unwrap_or(0).max(0) as usize,
            mae: maes[row].unwrap_or(f64::NAN),
            rmse: rmses[row].unwrap_or(f64::NAN),
        })
        .collect())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::cutoffs::{horizon_buckets, UNBUCKETED};
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn outcome(country: &str, baseline: &str, horizon: i64, error: f64) -> ForecastOutcome {
        ForecastOutcome {
            country: country.into(),
            baseline: baseline.into(),
            horizon,
            pred_c: 10.0 + error,
            truth_c: 10.0,
        }
    }

    #[test]
    fn should_compute_mae_and_rmse_per_group() {
        let buckets = horizon_buckets(60).unwrap();
        let outcomes = vec![
            outcome("A", "lag12", 1, 3.0),
            outcome("A", "lag12", 2, -4.0),
            outcome("A", "lag12", 70, 1.0),
            outcome("A", "lag12", 3, f64::NAN),
        ];

        let rows = by_country(&outcomes, &buckets);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].bucket, "h01_03");
        assert_eq!(rows[0].n, 2);
        assert_relative_eq!(rows[0].mae, 3.5);
        assert_relative_eq!(rows[0].rmse, 12.5f64.sqrt());
        assert_eq!(rows[1].bucket, UNBUCKETED);
    }

    #[test]
    fn should_rank_lower_rmse_first_in_every_bucket() {
        let buckets = horizon_buckets(60).unwrap();
        let mut outcomes = Vec::new();
        for country in ["A", "B"] {
            for bucket in &buckets {
                outcomes.push(outcome(country, "lag12", bucket.h_start, 1.0));
                outcomes.push(outcome(country, "climatology", bucket.h_start, 2.0));
            }
        }

        let global = global(&by_country(&outcomes, &buckets));

        for bucket in &buckets {
            let mut rows: Vec<&GlobalMetrics> =
                global.iter().filter(|g| g.bucket == bucket.name).collect();
            rows.sort_by(|a, b| a.rmse.total_cmp(&b.rmse));

            assert_eq!(rows.len(), 2);
            assert_eq!(rows[0].baseline, "lag12");
            assert_relative_eq!(rows[0].rmse, 1.0);
            assert_relative_eq!(rows[1].rmse, 2.0);
            assert_eq!(rows[0].countries, 2);
        }
    }

    #[test]
    fn should_weight_countries_equally_in_rollup() {
        let buckets = horizon_buckets(60).unwrap();
        let mut outcomes = vec![outcome("A", "lag12", 1, 1.0)];
        outcomes.extend((0..9).map(|_| outcome("B", "lag12", 2, 3.0)));

        let global = global(&by_country(&outcomes, &buckets));

        assert_relative_eq!(global[0].rmse, 2.0);
        assert_relative_eq!(global[0].mae, 2.0);
    }

    #[test]
    fn should_read_back_written_metrics() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("by_country.csv");
        let buckets = horizon_buckets(60).unwrap();
        let rows = by_country(&[outcome("A", "climatology", 5, 0.5)], &buckets);
        table::write_table(&by_country_frame(&rows), &path).unwrap();

        let read = read_by_country(&path).unwrap();

        assert_eq!(read, rows);
    }
}
