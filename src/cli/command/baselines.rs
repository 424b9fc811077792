use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Args;
use tracing::info;

use crate::{
    cli::create_spinner,
    pipeline::{
        baselines::{self, forecasts_frame},
        climatology::read_anomalies,
        cutoffs::{read_cutoffs, SetupMetadata},
    },
};

use super::save_table;

#[derive(Debug, Args)]
pub struct BaselinesArgs {
    /// Monthly anomaly table
    #[arg(long)]
    pub anomalies: PathBuf,

    /// Cutoffs table written by `setup`
    #[arg(long)]
    pub cutoffs_csv: PathBuf,

    /// Setup metadata written by `setup`
    #[arg(long)]
    pub setup_json: PathBuf,

    #[arg(long)]
    pub out_climatology: PathBuf,

    #[arg(long)]
    pub out_lag12: PathBuf,
}

pub fn baselines(args: &BaselinesArgs) -> Result<String> {
    let setup = SetupMetadata::read(&args.setup_json)?;
    let cutoffs = read_cutoffs(&args.cutoffs_csv)?;
    if cutoffs.is_empty() {
        return Err(anyhow!("{} lists no cutoffs", args.cutoffs_csv.display()));
    }
    let records = read_anomalies(&args.anomalies)?;

    let bar = create_spinner(format!("Generating baselines for {} cutoff(s)...", cutoffs.len()));
    let forecasts = baselines::generate(&records, &cutoffs, setup.horizons_max);
    bar.finish_with_message(format!(
        "Generated {} climatology and {} lag-12 forecasts",
        forecasts.climatology.len(),
        forecasts.lag12.len()
    ));

    save_table(&forecasts_frame(&forecasts.climatology), &args.out_climatology)?;
    save_table(&forecasts_frame(&forecasts.lag12), &args.out_lag12)?;
    info!(
        climatology = forecasts.climatology.len(),
        lag12 = forecasts.lag12.len(),
        "baselines complete"
    );

    Ok(format!(
        "Baselines saved to `{}` and `{}`",
        args.out_climatology.display(),
        args.out_lag12.display()
    ))
}

// -- Tests -------------------------------------------------------------------
