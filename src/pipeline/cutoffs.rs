//! Forecast-origin cutoffs and horizon buckets.

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::climatology::AnomalyRecord;
use crate::{
    calendar,
    table::{self, Column, Frame},
};

/// Name given to a horizon outside every bucket.
pub const UNBUCKETED: &str = "h_na";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CutoffFreq {
    Yearly,
    Quarterly,
}

impl CutoffFreq {
    /// Months between consecutive candidate cutoffs.
    pub fn step(self) -> usize {
        match self {
            CutoffFreq::Yearly => 12,
            CutoffFreq::Quarterly => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SetupParams {
    pub cutoff_freq: CutoffFreq,
    pub horizons_max: i64,
    pub min_history_months: i64,
}

impl Default for SetupParams {
    fn default() -> Self {
        Self {
            cutoff_freq: CutoffFreq::Yearly,
            horizons_max: 60,
            min_history_months: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorizonBucket {
    pub name: String,
    pub h_start: i64,
    pub h_end: i64,
}

impl HorizonBucket {
    fn new(name: &str, h_start: i64, h_end: i64) -> Self {
        Self {
            name: name.to_string(),
            h_start,
            h_end,
        }
    }

    pub fn contains(&self, horizon: i64) -> bool {
        (self.h_start..=self.h_end).contains(&horizon)
    }
}

/// The fixed five-way partition of `1..=horizons_max`.
pub fn horizon_buckets(horizons_max: i64) -> Result<Vec<HorizonBucket>> {
    if horizons_max < 25 {
        return Err(anyhow!(
            "horizons_max must be at least 25 to fill every bucket, got {}",
            horizons_max
        ));
    }

    Ok(vec![
        HorizonBucket::new("h01_03", 1, 3),
        HorizonBucket::new("h04_06", 4, 6),
        HorizonBucket::new("h07_12", 7, 12),
        HorizonBucket::new("h13_24", 13, 24),
        HorizonBucket::new("h25_60", 25, horizons_max),
    ])
}

pub fn bucket_name(horizon: i64, buckets: &[HorizonBucket]) -> &str {
    buckets
        .iter()
        .find(|b| b.contains(horizon))
        .map_or(UNBUCKETED, |b| b.name.as_str())
}

#[derive(Debug, Clone, PartialEq)]
pub struct CutoffCandidate {
    pub cutoff_key: i64,
    pub countries_total: usize,
    pub share_with_history_ok: f64,
    pub share_with_future_ok: f64,
    pub share_with_both_ok: f64,
}

/// Candidate cutoffs between `kmin + min_history_months` and
/// `kmax - horizons_max`, annotated with how many countries have enough
/// history before and enough future after each one.
pub fn candidate_cutoffs(records: &[AnomalyRecord], params: &SetupParams) -> Vec<CutoffCandidate> {
    let mut spans: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
    for record in records {
        let key = record.key();
        let span = spans
            .entry(record.country.as_str())
            .or_insert((key, key));
        span.0 = span.0.min(key);
        span.1 = span.1.max(key);
    }

    let (Some(kmin), Some(kmax)) = (
        spans.values().map(|s| s.0).min(),
        spans.values().map(|s| s.1).max(),
    ) else {
        return Vec::new();
    };

    let first = kmin + params.min_history_months;
    let last = kmax - params.horizons_max;
    if first > last {
        return Vec::new();
    }

    let total = spans.len();
    let share = |count: usize| count as f64 / total as f64;

    (first..=last)
        .step_by(params.cutoff_freq.step())
        .map(|k| {
            let mut history = 0;
            let mut future = 0;
            let mut both = 0;
            for &(start, end) in spans.values() {
                let history_ok = k - start >= params.min_history_months;
                let future_ok = end - k >= params.horizons_max;
                history += usize::from(history_ok);
                future += usize::from(future_ok);
                both += usize::from(history_ok && future_ok);
            }

            CutoffCandidate {
                cutoff_key: k,
                countries_total: total,
                share_with_history_ok: share(history),
                share_with_future_ok: share(future),
                share_with_both_ok: share(both),
            }
        })
        .collect()
}

pub fn cutoffs_frame(candidates: &[CutoffCandidate]) -> Frame {
    let share = |get: fn(&CutoffCandidate) -> f64| Column::floats(candidates.iter().map(get));

    Frame::new()
        .with_column(
            "cutoff_ym",
            Column::text(candidates.iter().map(|c| calendar::format_year_month(c.cutoff_key))),
        )
        .with_column("cutoff_key", Column::ints(candidates.iter().map(|c| c.cutoff_key)))
        .with_column(
            "countries_total",
            Column::ints(candidates.iter().map(|c| c.countries_total as i64)),
        )
        .with_column("share_with_history_ok", share(|c| c.share_with_history_ok))
        .with_column("share_with_future_ok", share(|c| c.share_with_future_ok))
        .with_column("share_with_both_ok", share(|c| c.share_with_both_ok))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cutoff {
    pub key: i64,
    pub ym: String,
}

/// Reads `cutoff_key` and `cutoff_ym` from a cutoffs table.
pub fn read_cutoffs(path: &Path) -> Result<Vec<Cutoff>> {
    let frame =
        table::read_table(path).with_context(|| format!("cannot read {}", path.display()))?;
    frame
        .require(&["cutoff_key", "cutoff_ym"])
        .with_context(|| format!("missing columns in cutoffs file {}", path.display()))?;

    let keys = frame.ints("cutoff_key")?;
    let yms = frame.text("cutoff_ym")?;

    keys.into_iter()
        .zip(yms)
        .enumerate()
        .map(|(row, pair)| match pair {
            (Some(key), Some(ym)) => Ok(Cutoff { key, ym }),
            _ => Err(anyhow!("row {} of {} has no cutoff", row + 1, path.display())),
        })
        .collect()
}

/// Setup metadata shared by the baseline and metrics stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupMetadata {
    pub timestamp: String,
    pub anomalies: String,
    pub cutoff_freq: CutoffFreq,
    pub horizons_max: i64,
    pub min_history_months: i64,
    pub buckets: Vec<HorizonBucket>,
    #[serde(default)]
    pub note: String,
}

impl SetupMetadata {
    pub fn read(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid setup JSON {}", path.display()))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn record(country: &str, key: i64) -> AnomalyRecord {
        let (year, month) = calendar::key_to_year_month(key);
        AnomalyRecord {
            country: country.into(),
            year,
            month,
            temp_c: 1.0,
            clim_temp_c: 1.0,
            anomaly_c: 0.0,
        }
    }

    fn span(country: &str, from: i64, to: i64) -> Vec<AnomalyRecord> {
        (from..=to).map(|k| record(country, k)).collect()
    }

    #[test]
    fn should_partition_horizons_into_five_buckets() {
        let buckets = horizon_buckets(60).unwrap();

        assert_eq!(buckets.len(), 5);
        assert_eq!(bucket_name(1, &buckets), "h01_03");
        assert_eq!(bucket_name(12, &buckets), "h07_12");
        assert_eq!(bucket_name(60, &buckets), "h25_60");
        assert_eq!(bucket_name(61, &buckets), UNBUCKETED);
        assert_eq!(bucket_name(0, &buckets), UNBUCKETED);
    }

    #[test]
    fn should_reject_short_horizon_range() {
        assert!(horizon_buckets(24).is_err());
        assert_eq!(horizon_buckets(25).unwrap()[4].h_end, 25);
    }

    #[test]
    fn should_step_candidates_by_frequency() {
        let records = span("A", 0, 119);
        let params = SetupParams {
            cutoff_freq: CutoffFreq::Quarterly,
            horizons_max: 36,
            min_history_months: 24,
        };

        let candidates = candidate_cutoffs(&records, &params);
        let keys: Vec<i64> = candidates.iter().map(|c| c.cutoff_key).collect();

        assert_eq!(keys.first(), Some(&24));
        assert_eq!(keys.last(), Some(&81));
        assert!(keys.windows(2).all(|w| w[1] - w[0] == 3));
    }

    #[test]
    fn should_annotate_shares_per_country() {
        let mut records = span("A", 0, 119);
        records.extend(span("B", 60, 119));
        let params = SetupParams {
            horizons_max: 36,
            ..SetupParams::default()
        };

        let candidates = candidate_cutoffs(&records, &params);

        let first = &candidates[0];
        assert_eq!(first.cutoff_key, 24);
        assert_eq!(first.countries_total, 2);
        assert_relative_eq!(first.share_with_history_ok, 0.5);
        assert_relative_eq!(first.share_with_future_ok, 1.0);
        assert_relative_eq!(first.share_with_both_ok, 0.5);
    }

    #[test]
    fn should_return_nothing_when_series_too_short() {
        let records = span("A", 0, 50);
        assert!(candidate_cutoffs(&records, &SetupParams::default()).is_empty());
        assert!(candidate_cutoffs(&[], &SetupParams::default()).is_empty());
    }

    #[test]
    fn should_write_and_read_setup_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("setup.json");
        let meta = SetupMetadata {
            timestamp: "2024-01-01T00:00:00Z".into(),
            anomalies: "anom.csv".into(),
            cutoff_freq: CutoffFreq::Quarterly,
            horizons_max: 60,
            min_history_months: 24,
            buckets: horizon_buckets(60).unwrap(),
            note: String::new(),
        };
        meta.write(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"cutoff_freq\": \"quarterly\""));
        assert_eq!(SetupMetadata::read(&path).unwrap(), meta);
    }
}
