use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::{SecondsFormat, Utc};
use clap::Args;
use tracing::info;

use crate::{
    cli::create_spinner,
    pipeline::{
        climatology::read_anomalies,
        cutoffs::{self, CutoffFreq, SetupMetadata, SetupParams},
    },
    settings::Settings,
};

use super::save_table;

const NOTE: &str = "Pick cutoffs where share_with_both_ok >= 0.7 as a rule of thumb.";

#[derive(Debug, Args)]
pub struct SetupArgs {
    /// Monthly anomaly table
    #[arg(long)]
    pub anomalies: PathBuf,

    /// Spacing of candidate cutoffs [default: yearly]
    #[arg(long, value_enum)]
    pub cutoff_freq: Option<CutoffFreq>,

    /// Longest forecast horizon in months [default: 60]
    #[arg(long)]
    pub horizons_max: Option<i64>,

    /// Months of history a country needs before a cutoff [default: 24]
    #[arg(long)]
    pub min_history_months: Option<i64>,

    /// Candidate cutoffs table
    #[arg(long)]
    pub output_cutoffs: PathBuf,

    /// Setup metadata JSON
    #[arg(long)]
    pub output_json: PathBuf,
}

pub fn setup(args: &SetupArgs, settings: &Settings) -> Result<String> {
    let defaults = &settings.setup;
    let params = SetupParams {
        cutoff_freq: args.cutoff_freq.unwrap_or(defaults.cutoff_freq),
        horizons_max: args.horizons_max.unwrap_or(defaults.horizons_max),
        min_history_months: args.min_history_months.unwrap_or(defaults.min_history_months),
    };
    let buckets = cutoffs::horizon_buckets(params.horizons_max)?;

    let bar = create_spinner("Reading anomalies...".to_string());
    let records = read_anomalies(&args.anomalies)?;
    bar.finish_with_message(format!("Read {} anomaly rows", records.len()));
    if records.is_empty() {
        return Err(anyhow!("{} holds no anomalies", args.anomalies.display()));
    }

    let candidates = cutoffs::candidate_cutoffs(&records, &params);
    save_table(&cutoffs::cutoffs_frame(&candidates), &args.output_cutoffs)?;

    let metadata = SetupMetadata {
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        anomalies: args.anomalies.display().to_string(),
        cutoff_freq: params.cutoff_freq,
        horizons_max: params.horizons_max,
        min_history_months: params.min_history_months,
        buckets,
        note: NOTE.to_string(),
    };
    metadata.write(&args.output_json)?;
    info!(candidates = candidates.len(), "setup complete");

    Ok(format!(
        "{} candidate cutoff(s) saved to `{}`",
        candidates.len(),
        args.output_cutoffs.display()
    ))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{climatology::AnomalyRecord, climatology::to_frame, cutoffs::read_cutoffs};
    use crate::table::write_table;
    use tempfile::TempDir;

    #[test]
    fn should_write_cutoffs_and_metadata() {
        let dir = TempDir::new().unwrap();
        let anomalies = dir.path().join("anomalies.csv");
        let records: Vec<AnomalyRecord> = (0..120)
            .map(|i| AnomalyRecord {
                country: "A".into(),
                year: 2000 + i / 12,
                month: (i % 12 + 1) as u32,
                temp_c: 10.0,
                clim_temp_c: 10.0,
                anomaly_c: 0.0,
            })
            .collect();
        write_table(&to_frame(&records), &anomalies).unwrap();

        let args = SetupArgs {
            anomalies,
            cutoff_freq: Some(CutoffFreq::Quarterly),
            horizons_max: Some(36),
            min_history_months: None,
            output_cutoffs: dir.path().join("cutoffs.csv"),
            output_json: dir.path().join("setup.json"),
        };
        setup(&args, &Settings::default()).unwrap();

        let cutoffs = read_cutoffs(&args.output_cutoffs).unwrap();
        // keys 24..=83 of the series, every third month
        assert_eq!(cutoffs.len(), 20);
        assert_eq!(cutoffs[0].ym, "2002-01");

        let metadata = SetupMetadata::read(&args.output_json).unwrap();
        assert_eq!(metadata.cutoff_freq, CutoffFreq::Quarterly);
        assert_eq!(metadata.horizons_max, 36);
        assert_eq!(metadata.buckets.len(), 5);
    }

    #[test]
    fn should_reject_short_horizon() {
        let dir = TempDir::new().unwrap();
        let args = SetupArgs {
            anomalies: dir.path().join("missing.csv"),
            cutoff_freq: None,
            horizons_max: Some(12),
            min_history_months: None,
            output_cutoffs: dir.path().join("cutoffs.csv"),
            output_json: dir.path().join("setup.json"),
        };

        assert!(setup(&args, &Settings::default()).is_err());
        assert!(!args.output_json.exists());
    }
}
