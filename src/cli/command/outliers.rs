use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{ArgGroup, Args};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    cli::create_spinner,
    pipeline::{
        monthly::{self, ColumnNames, Source, StemCountry},
        outliers::{self, OutlierParams},
    },
    settings::Settings,
};

use super::save_table;

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("source").required(true).args(["input", "input_dir"])))]
pub struct OutliersArgs {
    /// Single monthly table (.csv or .parquet)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Directory with one file per country; the country is the file stem
    /// when there is no country column
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    /// Flagged table (.csv or .parquet)
    #[arg(long)]
    pub output: PathBuf,

    /// Per-country flag counts
    #[arg(long)]
    pub summary_csv: PathBuf,

    /// Run metadata
    #[arg(long)]
    pub summary_json: PathBuf,

    #[arg(long)]
    pub country_col: Option<String>,
    #[arg(long)]
    pub year_col: Option<String>,
    #[arg(long)]
    pub month_col: Option<String>,
    #[arg(long)]
    pub temp_col: Option<String>,

    /// Largest plausible absolute temperature [default: 60]
    #[arg(long)]
    pub abs_temp_limit: Option<f64>,
    /// Largest plausible month-to-month change [default: 15]
    #[arg(long)]
    pub jump_threshold: Option<f64>,
    /// Classical z-score limit [default: 3]
    #[arg(long)]
    pub z_thresh: Option<f64>,
    /// Robust z-score limit [default: 4]
    #[arg(long)]
    pub zrob_thresh: Option<f64>,
}

impl OutliersArgs {
    fn params(&self, defaults: &OutlierParams) -> OutlierParams {
        let pick = |arg: &Option<String>, default: &String| {
            arg.clone().unwrap_or_else(|| default.clone())
        };

        OutlierParams {
            columns: ColumnNames {
                country: pick(&self.country_col, &defaults.columns.country),
                year: pick(&self.year_col, &defaults.columns.year),
                month: pick(&self.month_col, &defaults.columns.month),
                temp: pick(&self.temp_col, &defaults.columns.temp),
            },
            abs_temp_limit: self.abs_temp_limit.unwrap_or(defaults.abs_temp_limit),
            jump_threshold: self.jump_threshold.unwrap_or(defaults.jump_threshold),
            z_thresh: self.z_thresh.unwrap_or(defaults.z_thresh),
            zrob_thresh: self.zrob_thresh.unwrap_or(defaults.zrob_thresh),
        }
    }
}

#[derive(Debug, Serialize)]
struct RunMetadata {
    timestamp: String,
    input: String,
    output: String,
    summary_csv: String,
    params: OutlierParams,
    rowcount_input: usize,
    rowcount_output: usize,
    rows_skipped: usize,
    n_flagged_total: usize,
}

pub fn outliers(args: &OutliersArgs, settings: &Settings) -> Result<String> {
    let params = args.params(&settings.outliers);
    let source = Source::from_args(args.input.as_deref(), args.input_dir.as_deref())?;

    let bar = create_spinner(format!("Loading {}...", source.display()));
    let loaded = monthly::load(&source, &params.columns, StemCountry::Verbatim)?;
    bar.finish_with_message(format!("Loaded {} rows", loaded.observations.len()));
    if loaded.files_skipped > 0 || loaded.rows_skipped > 0 {
        warn!(
            files = loaded.files_skipped,
            rows = loaded.rows_skipped,
            "skipped unreadable input"
        );
    }

    let rowcount_input = loaded.observations.len();
    let flagged = outliers::flag_outliers(loaded.observations, &params);
    let summaries = outliers::summarize(&flagged);
    let n_flagged_total = flagged.iter().filter(|f| f.flag_any_outlier).count();

    save_table(&outliers::flagged_frame(&flagged, &params.columns), &args.output)?;
    save_table(
        &outliers::summary_frame(&summaries, &params.columns.country),
        &args.summary_csv,
    )?;

    let meta = RunMetadata {
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        input: source.display(),
        output: args.output.display().to_string(),
        summary_csv: args.summary_csv.display().to_string(),
        params,
        rowcount_input,
        rowcount_output: flagged.len(),
        rows_skipped: loaded.rows_skipped,
        n_flagged_total,
    };
    if let Some(parent) = args.summary_json.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&args.summary_json, serde_json::to_string_pretty(&meta)?)
        .with_context(|| format!("cannot write {}", args.summary_json.display()))?;
    info!(rows = meta.rowcount_output, flagged = n_flagged_total, "outlier flagging complete");

    Ok(format!(
        "Flags saved to `{}` ({} of {} rows flagged)",
        args.output.display(),
        n_flagged_total,
        meta.rowcount_output
    ))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::fmt::Write as _;
    use tempfile::TempDir;

    #[test]
    fn should_flag_jump_and_write_metadata() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("monthly");
        fs::create_dir(&input).unwrap();

        let mut csv = String::from("date,temp_c\n");
        for i in 0..37 {
            let (year, month) = (2000 + i / 12, i % 12 + 1);
            let temp = if i < 36 { 10.0 } else { 100.0 };
            writeln!(csv, "{year}-{month:02}-01,{temp}").unwrap();
        }
        writeln!(csv, "not a date,5.0").unwrap();
        fs::write(input.join("A.csv"), csv).unwrap();

        let args = OutliersArgs {
            input: None,
            input_dir: Some(input),
            output: dir.path().join("flags.parquet"),
            summary_csv: dir.path().join("summary.csv"),
            summary_json: dir.path().join("meta").join("run.json"),
            country_col: None,
            year_col: None,
            month_col: None,
            temp_col: None,
            abs_temp_limit: None,
            jump_threshold: None,
            z_thresh: None,
            zrob_thresh: None,
        };
        outliers(&args, &Settings::default()).unwrap();

        let meta: Value =
            serde_json::from_str(&fs::read_to_string(&args.summary_json).unwrap()).unwrap();
        assert_eq!(meta["rowcount_input"], 37);
        assert_eq!(meta["rows_skipped"], 1);
        assert_eq!(meta["params"]["jump_threshold"], 15.0);
        assert!(meta["n_flagged_total"].as_u64().unwrap() >= 1);

        let summary = fs::read_to_string(&args.summary_csv).unwrap();
        assert!(summary.starts_with("country,n_rows,n_flagged,pct_flagged"));
        assert!(args.output.is_file());
    }
}
