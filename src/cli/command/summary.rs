use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use tracing::info;

use crate::pipeline::{
    metrics::{read_by_country, read_global},
    report::{lag12_wins, render_markdown},
};

#[derive(Debug, Args)]
pub struct SummaryArgs {
    /// Per-country metrics written by `metrics`
    #[arg(long)]
    pub by_country: PathBuf,

    /// Global metrics written by `metrics`
    #[arg(long)]
    pub global: PathBuf,

    /// Markdown report
    #[arg(long)]
    pub output: PathBuf,
}

pub fn summary(args: &SummaryArgs) -> Result<String> {
    let by_country = read_by_country(&args.by_country)?;
    let global = read_global(&args.global)?;

    let wins = lag12_wins(&by_country);
    let markdown = render_markdown(&global, &wins, Utc::now());

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&args.output, markdown)
        .with_context(|| format!("cannot write {}", args.output.display()))?;
    info!(buckets = wins.len(), "summary complete");

    Ok(format!("Summary saved to `{}`", args.output.display()))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::metrics::{by_country_frame, global, global_frame, CountryMetrics};
    use crate::table::write_table;
    use tempfile::TempDir;

    fn metric(country: &str, baseline: &str, rmse: f64) -> CountryMetrics {
        CountryMetrics {
            country: country.into(),
            baseline: baseline.into(),
            bucket: "h01_03".into(),
            n: 3,
            mae: rmse,
            rmse,
        }
    }

    #[test]
    fn should_write_markdown_report() {
        let dir = TempDir::new().unwrap();
        let rows = vec![
            metric("A", "climatology", 2.0),
            metric("A", "lag12", 1.0),
            metric("B", "climatology", 1.0),
            metric("B", "lag12", 3.0),
        ];
        let by_country = dir.path().join("by_country.csv");
        let global_path = dir.path().join("global.csv");
        write_table(&by_country_frame(&rows), &by_country).unwrap();
        write_table(&global_frame(&global(&rows)), &global_path).unwrap();

        let args = SummaryArgs {
            by_country,
            global: global_path,
            output: dir.path().join("reports").join("summary.md"),
        };
        summary(&args).unwrap();

        let markdown = fs::read_to_string(&args.output).unwrap();
        assert!(markdown.starts_with("# Baseline forecast summary"));
        assert!(markdown.contains("| h01_03 | lag12 | 2 | 2.000 | 2.000 |"));
        assert!(markdown.contains("| h01_03 | 2 | 50.0% |"));
    }
}
