//! Command line interface.

pub mod command;

use std::{path::PathBuf, time::Duration};

use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Data preparation stages for country-level temperature anomaly forecasting
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Settings file (default: <config dir>/climwiz/climwiz.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download the emissions dataset and unpack it
    Fetch(command::fetch::FetchArgs),
    /// Split a combined emissions table into one CSV per country
    Split(command::split::SplitArgs),
    /// Aggregate monthly temperatures into yearly means and anomalies
    Yearly(command::yearly::YearlyArgs),
    /// Compute monthly anomalies against a reference climatology
    Anomalies(command::anomalies::AnomaliesArgs),
    /// Flag suspicious monthly temperatures
    Outliers(command::outliers::OutliersArgs),
    /// Choose candidate forecast cutoffs and horizon buckets
    Setup(command::setup::SetupArgs),
    /// Generate climatology and lag-12 baseline forecasts
    Baselines(command::baselines::BaselinesArgs),
    /// Build leakage-free model features
    Features(command::features::FeaturesArgs),
    /// Score baseline forecasts per country and horizon bucket
    Metrics(command::metrics::MetricsArgs),
    /// Write a markdown summary of the baseline metrics
    Summary(command::summary::SummaryArgs),
    /// Remove rows after a cutoff month from per-country files
    Trim(command::trim::TrimArgs),
    /// Build the globe payload and page from yearly anomalies
    Globe(command::globe::GlobeArgs),
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

/// Creates a progress bar.
pub fn create_progress_bar(size: u64, message: String) -> ProgressBar {
    let style = ProgressStyle::with_template("[{eta_precise}] {bar:40.cyan/blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

    ProgressBar::new(size).with_message(message).with_style(style)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn should_have_valid_command_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn should_accept_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "climwiz",
            "trim",
            "--country-dir",
            "data",
            "--cutoff-ym",
            "2020-06",
            "-vv",
            "--config",
            "my.toml",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("my.toml")));
        assert!(matches!(cli.command, Commands::Trim(_)));
    }

    #[test]
    fn should_reject_both_input_forms() {
        let result = Cli::try_parse_from([
            "climwiz",
            "outliers",
            "--input",
            "a.csv",
            "--input-dir",
            "dir",
            "--output",
            "out.csv",
            "--summary-csv",
            "summary.csv",
            "--summary-json",
            "meta.json",
        ]);
        assert!(result.is_err());
    }
}
