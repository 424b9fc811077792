use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::{
    cli::create_spinner,
    pipeline::{
        climatology::read_anomalies,
        features::{build_features, features_frame, FeatureRow},
    },
};

use super::save_table;

#[derive(Debug, Args)]
pub struct FeaturesArgs {
    /// Monthly anomaly table
    #[arg(long)]
    pub anomalies: PathBuf,

    /// Feature table (.csv or .parquet)
    #[arg(long)]
    pub out_features: PathBuf,

    /// Leave out anom_lag24 and roll_mean_12
    #[arg(long)]
    pub drop_optional: bool,
}

pub fn features(args: &FeaturesArgs) -> Result<String> {
    let records = read_anomalies(&args.anomalies)?;

    let bar = create_spinner("Building features...".to_string());
    let rows: Vec<FeatureRow> = build_features(&records)
        .into_iter()
        .filter(FeatureRow::is_complete)
        .collect();
    bar.finish_with_message(format!("Built {} complete feature rows", rows.len()));
    info!(input = records.len(), output = rows.len(), "features complete");

    save_table(&features_frame(&rows, !args.drop_optional), &args.out_features)?;

    Ok(format!("Features saved to `{}`", args.out_features.display()))
}

// -- Tests -------------------------------------------------------------------
