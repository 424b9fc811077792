use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{ArgGroup, Args};
use tracing::{info, warn};

use crate::{
    cli::create_spinner,
    pipeline::{
        climatology::{self, ClimatologyParams},
        monthly::{self, ColumnNames, Source, StemCountry},
    },
    settings::Settings,
};

use super::save_table;

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("source").required(true).args(["input", "input_dir"])))]
pub struct AnomaliesArgs {
    /// Monthly table with country, year, month and temp_c columns
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Directory of monthly per-country files
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    /// Anomaly table (.csv or .parquet)
    #[arg(long)]
    pub output: PathBuf,

    /// First year of the climatology window [default: 1991]
    #[arg(long)]
    pub ref_start: Option<i64>,

    /// Last year of the climatology window [default: 2020]
    #[arg(long)]
    pub ref_end: Option<i64>,
}

pub fn anomalies(args: &AnomaliesArgs, settings: &Settings) -> Result<String> {
    let params = ClimatologyParams {
        ref_start: args.ref_start.unwrap_or(settings.anomalies.ref_start),
        ref_end: args.ref_end.unwrap_or(settings.anomalies.ref_end),
    };
    let source = Source::from_args(args.input.as_deref(), args.input_dir.as_deref())?;

    let bar = create_spinner(format!("Loading {}...", source.display()));
    let loaded = monthly::load(&source, &ColumnNames::default(), StemCountry::Spaced)?;
    bar.finish_with_message(format!("Loaded {} observations", loaded.observations.len()));
    if loaded.rows_skipped > 0 {
        warn!(rows = loaded.rows_skipped, "skipped rows without a usable year and month");
    }

    let (records, dropped) = climatology::compute_anomalies(&loaded.observations, &params);
    if records.is_empty() {
        return Err(anyhow!(
            "no anomalies: no observation falls in {}..={}",
            params.ref_start,
            params.ref_end
        ));
    }
    if dropped > 0 {
        warn!(rows = dropped, "dropped rows without temperature or climatology");
    }

    save_table(&climatology::to_frame(&records), &args.output)?;
    info!(rows = records.len(), dropped, "anomalies complete");

    Ok(format!("Anomalies saved to `{}`", args.output.display()))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::climatology::read_anomalies;
    use approx::assert_relative_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn should_write_anomalies_for_directory() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("monthly");
        fs::create_dir(&input).unwrap();
        fs::write(
            input.join("New_Zealand.csv"),
            "year,month,temp_c\n1991,1,10.0\n1992,1,12.0\n2021,1,14.0\n2021,2,9.0\n",
        )
        .unwrap();
        let output = dir.path().join("anomalies.csv");

        let args = AnomaliesArgs {
            input: None,
            input_dir: Some(input),
            output: output.clone(),
            ref_start: None,
            ref_end: None,
        };
        anomalies(&args, &Settings::default()).unwrap();

        let records = read_anomalies(&output).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].country, "New Zealand");
        assert_relative_eq!(records[0].clim_temp_c, 11.0);
        assert_relative_eq!(records[2].anomaly_c, 3.0);
    }
}
