use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::{
    cli::create_spinner,
    pipeline::{
        cutoffs::SetupMetadata,
        metrics::{self, read_forecasts},
    },
};

use super::save_table;

#[derive(Debug, Args)]
pub struct MetricsArgs {
    /// Setup metadata with the horizon buckets
    #[arg(long)]
    pub setup_json: PathBuf,

    /// Forecast tables to score
    #[arg(long, num_args = 1.., required = true)]
    pub forecasts: Vec<PathBuf>,

    #[arg(long)]
    pub out_by_country: PathBuf,

    #[arg(long)]
    pub out_global: PathBuf,
}

pub fn metrics(args: &MetricsArgs) -> Result<String> {
    let setup = SetupMetadata::read(&args.setup_json)?;

    let bar = create_spinner("Reading forecasts...".to_string());
    let mut outcomes = Vec::new();
    for path in &args.forecasts {
        outcomes.extend(read_forecasts(path)?);
    }
    bar.finish_with_message(format!("Read {} forecasts", outcomes.len()));

    let by_country = metrics::by_country(&outcomes, &setup.buckets);
    let global = metrics::global(&by_country);

    save_table(&metrics::by_country_frame(&by_country), &args.out_by_country)?;
    save_table(&metrics::global_frame(&global), &args.out_global)?;
    info!(groups = by_country.len(), global = global.len(), "metrics complete");

    Ok(format!(
        "Metrics saved to `{}` and `{}`",
        args.out_by_country.display(),
        args.out_global.display()
    ))
}

// -- Tests -------------------------------------------------------------------
