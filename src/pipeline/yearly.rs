//! Yearly means from monthly observations, with an anomaly against a
//! per-country reference-period baseline.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::monthly::MonthlyObservation;
use crate::table::{Column, Frame};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct YearlyParams {
    /// Years with fewer observed months are dropped.
    pub min_months: usize,
    pub ref_start: i64,
    pub ref_end: i64,
}

impl Default for YearlyParams {
    fn default() -> Self {
        Self {
            min_months: 10,
            ref_start: 1991,
            ref_end: 2024,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearlyMean {
    pub country: String,
    pub year: i64,
    pub temp_c: f64,
    pub n_months: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearlyAnomaly {
    pub country: String,
    pub year: i64,
    pub temp_c: f64,
    /// NaN when the country has no year inside the reference window.
    pub base: f64,
    pub anom: f64,
}

/// Means per (country, year), keeping only years with at least `min_months`
/// observed values. Sorted by (country, year).
pub fn yearly_means(observations: &[MonthlyObservation], min_months: usize) -> Vec<YearlyMean> {
    let mut groups: BTreeMap<(&str, i64), (f64, usize)> = BTreeMap::new();
    for obs in observations.iter().filter(|o| !o.temp_c.is_nan()) {
        let entry = groups.entry((obs.country.as_str(), obs.year)).or_default();
        entry.0 += obs.temp_c;
        entry.1 += 1;
    }

    groups
        .into_iter()
        .filter(|(_, (_, n))| *n >= min_months)
        .map(|((country, year), (sum, n))| YearlyMean {
            country: country.to_string(),
            year,
            temp_c: sum / n as f64,
            n_months: n,
        })
        .collect()
}

/// Attaches the per-country mean over `[ref_start, ref_end]` and the anomaly
/// against it.
pub fn with_baseline(means: Vec<YearlyMean>, ref_start: i64, ref_end: i64) -> Vec<YearlyAnomaly> {
    let mut sums: HashMap<String, (f64, usize)> = HashMap::new();
    for mean in means
        .iter()
        .filter(|m| (ref_start..=ref_end).contains(&m.year))
    {
        let entry = sums.entry(mean.country.clone()).or_default();
        entry.0 += mean.temp_c;
        entry.1 += 1;
    }

    let mut rows: Vec<YearlyAnomaly> = means
        .into_iter()
        .map(|mean| {
            let base = sums
                .get(&mean.country)
                .map_or(f64::NAN, |(sum, n)| sum / *n as f64);
            YearlyAnomaly {
                anom: mean.temp_c - base,
                base,
                country: mean.country,
                year: mean.year,
                temp_c: mean.temp_c,
            }
        })
        .collect();
    rows.sort_by(|a, b| a.country.cmp(&b.country).then(a.year.cmp(&b.year)));

    rows
}

pub fn to_frame(rows: &[YearlyAnomaly]) -> Frame {
    Frame::new()
        .with_column("country", Column::text(rows.iter().map(|r| r.country.as_str())))
        .with_column("year", Column::ints(rows.iter().map(|r| r.year)))
        .with_column("temp_c", Column::floats(rows.iter().map(|r| r.temp_c)))
        .with_column("base", Column::floats(rows.iter().map(|r| r.base)))
        .with_column("anom", Column::floats(rows.iter().map(|r| r.anom)))
}

pub fn country_file_name(country: &str) -> String {
    format!("{}.csv", country.replace(' ', "_"))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn months(country: &str, year: i64, count: u32, temp: f64) -> Vec<MonthlyObservation> {
        (1..=count)
            .map(|month| MonthlyObservation {
                country: country.into(),
                year,
                month,
                temp_c: temp,
            })
            .collect()
    }

    #[test]
    fn should_drop_years_below_minimum_coverage() {
        let mut observations = months("A", 2000, 12, 10.0);
        observations.extend(months("A", 2001, 9, 11.0));
        observations.extend(months("A", 2002, 10, 12.0));

        let means = yearly_means(&observations, 10);

        let years: Vec<i64> = means.iter().map(|m| m.year).collect();
        assert_eq!(years, vec![2000, 2002]);
        assert_eq!(means[1].n_months, 10);
    }

    #[test]
    fn should_ignore_missing_temperatures_when_counting() {
        let mut observations = months("A", 2000, 10, 10.0);
        observations[0].temp_c = f64::NAN;

        assert!(yearly_means(&observations, 10).is_empty());
    }

    #[test]
    fn should_compute_baseline_over_reference_window() {
        let mut observations = months("B", 1990, 12, 5.0);
        observations.extend(months("B", 1991, 12, 10.0));
        observations.extend(months("B", 1992, 12, 12.0));
        observations.extend(months("A", 1991, 12, 1.0));

        let rows = with_baseline(yearly_means(&observations, 10), 1991, 2024);

        assert_eq!(rows[0].country, "A");
        let b_1990 = rows.iter().find(|r| r.country == "B" && r.year == 1990).unwrap();
        assert_relative_eq!(b_1990.base, 11.0);
        assert_relative_eq!(b_1990.anom, -6.0);
    }

    #[test]
    fn should_leave_baseline_undefined_without_reference_years() {
        let rows = with_baseline(yearly_means(&months("C", 1950, 12, 3.0), 10), 1991, 2024);

        assert!(rows[0].base.is_nan());
        assert!(rows[0].anom.is_nan());
    }

    #[test]
    fn should_name_per_country_files() {
        assert_eq!(country_file_name("South Africa"), "South_Africa.csv");
    }
}
