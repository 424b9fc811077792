//! Outlier flags for monthly temperatures.
//!
//! Z-scores are computed within each (country, calendar month) group so that
//! seasonality does not dominate. The robust score uses the median and the
//! MAD scaled by 1.4826. Degenerate groups give NaN scores, which never flag.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::monthly::{ColumnNames, MonthlyObservation};
use crate::{
    stats,
    table::{Column, Frame},
};

const MAD_SCALE: f64 = 1.4826;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutlierParams {
    pub columns: ColumnNames,
    pub abs_temp_limit: f64,
    pub jump_threshold: f64,
    pub z_thresh: f64,
    pub zrob_thresh: f64,
}

impl Default for OutlierParams {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            abs_temp_limit: 60.0,
            jump_threshold: 15.0,
            z_thresh: 3.0,
            zrob_thresh: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlaggedObservation {
    pub observation: MonthlyObservation,
    pub z: f64,
    pub z_robust: f64,
    /// Previous row's temperature for the same country, NaN on the first row.
    pub temp_prev: f64,
    pub flag_abs_range: bool,
    pub flag_z_gt3: bool,
    pub flag_zrob_gt4: bool,
    pub flag_jump_gt15: bool,
    pub flag_any_outlier: bool,
}

pub fn classic_z(values: &[f64]) -> Vec<f64> {
    let mu = stats::mean(values);
    let sigma = stats::std_dev(values, 1);
    scale_scores(values, mu, sigma)
}

pub fn robust_z(values: &[f64]) -> Vec<f64> {
    let med = stats::median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    let mad = stats::median(&deviations);
    scale_scores(values, med, MAD_SCALE * mad)
}

fn scale_scores(values: &[f64], center: f64, scale: f64) -> Vec<f64> {
    values
        .iter()
        .map(|v| {
            if scale > 0.0 {
                (v - center) / scale
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Sorts by (country, year, month) and flags every observation.
pub fn flag_outliers(
    mut observations: Vec<MonthlyObservation>,
    params: &OutlierParams,
) -> Vec<FlaggedObservation> {
    observations.sort_by(|a, b| {
        a.country
            .cmp(&b.country)
            .then(a.year.cmp(&b.year))
            .then(a.month.cmp(&b.month))
    });

    let mut groups: HashMap<(&str, u32), Vec<usize>> = HashMap::new();
    for (idx, obs) in observations.iter().enumerate() {
        groups
            .entry((obs.country.as_str(), obs.month))
            .or_default()
            .push(idx);
    }

    let mut z = vec![f64::NAN; observations.len()];
    let mut z_robust = vec![f64::NAN; observations.len()];
    for indices in groups.values() {
        let values: Vec<f64> = indices.iter().map(|&i| observations[i].temp_c).collect();
        for ((&i, zc), zr) in indices.iter().zip(classic_z(&values)).zip(robust_z(&values)) {
            z[i] = zc;
            z_robust[i] = zr;
        }
    }

    let mut flagged = Vec::with_capacity(observations.len());
    for (idx, obs) in observations.iter().enumerate() {
        let temp_prev = match idx.checked_sub(1).map(|p| &observations[p]) {
            Some(prev) if prev.country == obs.country => prev.temp_c,
            _ => f64::NAN,
        };

        let flag_abs_range = obs.temp_c.abs() > params.abs_temp_limit;
        let flag_z_gt3 = z[idx].abs() > params.z_thresh;
        let flag_zrob_gt4 = z_robust[idx].abs() > params.zrob_thresh;
        let flag_jump_gt15 = (obs.temp_c - temp_prev).abs() > params.jump_threshold;

        flagged.push(FlaggedObservation {
            observation: obs.clone(),
            z: z[idx],
            z_robust: z_robust[idx],
            temp_prev,
            flag_abs_range,
            flag_z_gt3,
            flag_zrob_gt4,
            flag_jump_gt15,
            flag_any_outlier: flag_abs_range || flag_z_gt3 || flag_zrob_gt4 || flag_jump_gt15,
        });
    }

    flagged
}

#[derive(Debug, Clone, PartialEq)]
pub struct CountryFlagSummary {
    pub country: String,
    pub n_rows: usize,
    pub n_flagged: usize,
    /// Share of flagged rows, rounded to 4 places.
    pub pct_flagged: f64,
    pub flag_abs_range: usize,
    pub flag_jump_gt15: usize,
    pub flag_z_gt3: usize,
    pub flag_zrob_gt4: usize,
}

pub fn summarize(flagged: &[FlaggedObservation]) -> Vec<CountryFlagSummary> {
    let mut by_country: BTreeMap<&str, CountryFlagSummary> = BTreeMap::new();
    for row in flagged {
        let country = row.observation.country.as_str();
        let summary = by_country
            .entry(country)
            .or_insert_with(|| CountryFlagSummary {
                country: country.to_string(),
                n_rows: 0,
                n_flagged: 0,
                pct_flagged: 0.0,
                flag_abs_range: 0,
                flag_jump_gt15: 0,
                flag_z_gt3: 0,
                flag_zrob_gt4: 0,
            });

        summary.n_rows += 1;
        summary.n_flagged += usize::from(row.flag_any_outlier);
        summary.flag_abs_range += usize::from(row.flag_abs_range);
        summary.flag_jump_gt15 += usize::from(row.flag_jump_gt15);
        summary.flag_z_gt3 += usize::from(row.flag_z_gt3);
        summary.flag_zrob_gt4 += usize::from(row.flag_zrob_gt4);
    }

    by_country
        .into_values()
        .map(|mut summary| {
            summary.pct_flagged =
                stats::round_to(summary.n_flagged as f64 / summary.n_rows as f64, 4);
            summary
        })
        .collect()
}

/// Output table; identifying columns keep the configured input names.
pub fn flagged_frame(flagged: &[FlaggedObservation], names: &ColumnNames) -> Frame {
    let obs = || flagged.iter().map(|f| &f.observation);
    let flag = |get: fn(&FlaggedObservation) -> bool| Column::bools(flagged.iter().map(get));

    Frame::new()
        .with_column(names.country.as_str(), Column::text(obs().map(|o| o.country.as_str())))
        .with_column(names.year.as_str(), Column::ints(obs().map(|o| o.year)))
        .with_column(names.month.as_str(), Column::ints(obs().map(|o| i64::from(o.month))))
        .with_column(names.temp.as_str(), Column::floats(obs().map(|o| o.temp_c)))
        .with_column("flag_abs_range", flag(|f| f.flag_abs_range))
        .with_column("z", Column::floats(flagged.iter().map(|f| f.z)))
        .with_column("z_robust", Column::floats(flagged.iter().map(|f| f.z_robust)))
        .with_column("flag_z_gt3", flag(|f| f.flag_z_gt3))
        .with_column("flag_zrob_gt4", flag(|f| f.flag_zrob_gt4))
        .with_column("temp_prev", Column::floats(flagged.iter().map(|f| f.temp_prev)))
        .with_column("flag_jump_gt15", flag(|f| f.flag_jump_gt15))
        .with_column("flag_any_outlier", flag(|f| f.flag_any_outlier))
}

pub fn summary_frame(summaries: &[CountryFlagSummary], country_col: &str) -> Frame {
    let count = |get: fn(&CountryFlagSummary) -> usize| {
        Column::ints(summaries.iter().map(|s| get(s) as i64))
    };

    Frame::new()
        .with_column(country_col, Column::text(summaries.iter().map(|s| s.country.as_str())))
        .with_column("n_rows", count(|s| s.n_rows))
        .with_column("n_flagged", count(|s| s.n_flagged))
        .with_column("pct_flagged", Column::floats(summaries.iter().map(|s| s.pct_flagged)))
        .with_column("flag_abs_range", count(|s| s.flag_abs_range))
        .with_column("flag_jump_gt15", count(|s| s.flag_jump_gt15))
        .with_column("flag_z_gt3", count(|s| s.flag_z_gt3))
        .with_column("flag_zrob_gt4", count(|s| s.flag_zrob_gt4))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn series(country: &str, values: &[f64]) -> Vec<MonthlyObservation> {
        values
            .iter()
            .enumerate()
            .map(|(i, &temp_c)| MonthlyObservation {
                country: country.into(),
                year: 2000 + (i / 12) as i64,
                month: (i % 12) as u32 + 1,
                temp_c,
            })
            .collect()
    }

    #[test]
    fn should_not_flag_constant_series() {
        let flagged = flag_outliers(series("A", &[12.0; 48]), &OutlierParams::default());

        assert!(flagged.iter().all(|f| f.z.is_nan() && f.z_robust.is_nan()));
        assert!(flagged.iter().all(|f| !f.flag_z_gt3 && !f.flag_zrob_gt4));
        assert!(flagged.iter().all(|f| !f.flag_any_outlier));
    }

    #[test]
    fn should_flag_jump_on_month_37() {
        let mut values = vec![10.0; 36];
        values.push(100.0);
        let flagged = flag_outliers(series("A", &values), &OutlierParams::default());

        let jumps: Vec<usize> = flagged
            .iter()
            .enumerate()
            .filter(|(_, f)| f.flag_jump_gt15)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(jumps, vec![36]);
        assert!(flagged[36].flag_abs_range);
        assert!(flagged[36].flag_any_outlier);
        assert_relative_eq!(flagged[36].temp_prev, 10.0);
    }

    #[test]
    fn should_reset_previous_temperature_per_country() {
        let mut observations = series("A", &[30.0, 31.0]);
        observations.extend(series("B", &[-5.0]));
        let flagged = flag_outliers(observations, &OutlierParams::default());

        assert!(flagged[2].temp_prev.is_nan());
        assert!(!flagged[2].flag_jump_gt15);
    }

    #[test]
    fn should_score_within_calendar_month_groups() {
        let scores = classic_z(&[1.0, 2.0, 3.0]);
        assert_relative_eq!(scores[0], -1.0);
        assert_relative_eq!(scores[2], 1.0);

        let robust = robust_z(&[1.0, 2.0, 3.0, 4.0, 100.0]);
        assert_relative_eq!(robust[4], 97.0 / MAD_SCALE, epsilon = 1e-9);
    }

    #[test]
    fn should_summarize_per_country() {
        let mut values = vec![10.0; 36];
        values.push(100.0);
        let mut observations = series("B", &values);
        observations.extend(series("A", &[5.0; 4]));

        let summaries = summarize(&flag_outliers(observations, &OutlierParams::default()));

        assert_eq!(summaries[0].country, "A");
        assert_eq!(summaries[0].n_flagged, 0);
        assert_eq!(summaries[1].n_rows, 37);
        assert_eq!(summaries[1].n_flagged, 1);
        assert_relative_eq!(summaries[1].pct_flagged, 0.027);
    }

    #[test]
    fn should_use_configured_column_names_in_output() {
        let names = ColumnNames {
            country: "entity".into(),
            ..ColumnNames::default()
        };
        let flagged = flag_outliers(series("A", &[1.0]), &OutlierParams::default());
        let frame = flagged_frame(&flagged, &names);

        assert_eq!(frame.names()[0], "entity");
        assert_eq!(frame.names().len(), 12);
    }
}
