use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use clap::Args;
use tracing::{info, warn};

use crate::{
    cli::create_progress_bar,
    pipeline::trim::{cutoff_key, trim_file, TrimCounts, TrimMode},
};

#[derive(Debug, Args)]
pub struct TrimArgs {
    /// Folder with per-country CSVs
    #[arg(long)]
    pub country_dir: PathBuf,

    /// Last month to keep, as YYYY-MM
    #[arg(long)]
    pub cutoff_ym: String,

    /// Output folder; may be the input folder to trim in place
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Drop the cutoff month as well
    #[arg(long)]
    pub drop_from_cutoff: bool,

    /// Report only, write nothing
    #[arg(long)]
    pub dry_run: bool,
}

fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("cannot read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e.eq_ignore_ascii_case("csv")))
        .collect();
    files.sort();

    Ok(files)
}

pub fn trim(args: &TrimArgs) -> Result<String> {
    let cutoff = cutoff_key(&args.cutoff_ym)?;
    let mode = if args.drop_from_cutoff {
        TrimMode::DropFromCutoff
    } else {
        TrimMode::KeepCutoff
    };
    let out_dir = match (&args.out_dir, args.dry_run) {
        (_, true) => None,
        (Some(dir), false) => Some(dir.as_path()),
        (None, false) => return Err(anyhow!("--out-dir is required unless --dry-run is set")),
    };
    if let Some(dir) = out_dir {
        fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    }

    let files = csv_files(&args.country_dir)?;
    if files.is_empty() {
        return Err(anyhow!("no *.csv found in {}", args.country_dir.display()));
    }

    let bar = create_progress_bar(files.len() as u64, format!("Trimming at {}", args.cutoff_ym));
    let mut totals = TrimCounts::default();
    let mut skipped = 0;
    let mut report = Vec::new();
    for path in &files {
        let output = out_dir.zip(path.file_name()).map(|(dir, name)| dir.join(name));
        match trim_file(path, output.as_deref(), cutoff, mode) {
            Ok(counts) => {
                info!(
                    file = %path.display(),
                    kept = counts.kept,
                    dropped = counts.dropped,
                    "trimmed"
                );
                report.push(format!(
                    "{}: dropped {}, kept {}",
                    path.file_name().unwrap_or_default().to_string_lossy(),
                    counts.dropped,
                    counts.kept
                ));
                totals.kept += counts.kept;
                totals.dropped += counts.dropped;
            }
            Err(e) => {
                warn!(file = %path.display(), error = %format!("{e:#}"), "skipping file");
                skipped += 1;
            }
        }
        bar.inc(1);
    }
    bar.finish_with_message(format!("Trimmed {} file(s)", files.len() - skipped));

    let verb = if args.dry_run { "Would drop" } else { "Dropped" };
    report.push(format!(
        "{} {} row(s), kept {} across {} file(s) ({} skipped)",
        verb,
        totals.dropped,
        totals.kept,
        files.len() - skipped,
        skipped
    ));

    Ok(report.join("\n"))
}

// -- Tests -------------------------------------------------------------------
