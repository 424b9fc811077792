use std::{
    fs::File,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Args;
use csv::ReaderBuilder;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::{
    cli::create_spinner,
    download::{download_with_progress, extract_tar_with_progress, extract_zip, PayloadKind},
    settings::Settings,
};

const PREVIEW_ROWS: usize = 3;

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Dataset URL [default: Carbon Monitor full dataset]
    #[arg(long)]
    pub url: Option<String>,

    /// Directory the download and its contents go to [default: dataset_emission]
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Print the shape and first rows of every CSV obtained
    #[arg(long)]
    pub preview: bool,
}

pub async fn fetch(args: &FetchArgs, settings: &Settings) -> Result<String> {
    let url = args.url.as_deref().unwrap_or(&settings.fetch.url);
    let out_dir = args.out.as_deref().unwrap_or(&settings.fetch.out_dir);
    let timeout = Duration::from_secs(settings.fetch.timeout_secs);

    let bar = create_spinner("Downloading dataset...".to_string());
    let file_path = download_with_progress(url, out_dir, timeout, bar.clone())
        .await
        .with_context(|| format!("download of {url} failed"))?;
    bar.finish_with_message(format!("Downloaded {}", file_path.display()));

    let csv_files = unpack(&file_path, out_dir)?;
    info!(files = csv_files.len(), "csv files available");

    if args.preview {
        for path in &csv_files {
            match preview(path) {
                Ok(text) => println!("{text}"),
                Err(e) => warn!(file = %path.display(), error = %format!("{e:#}"), "cannot preview"),
            }
        }
    }

    Ok(format!(
        "Saved `{}` ({} CSV file(s) in `{}`)",
        file_path.display(),
        csv_files.len(),
        out_dir.display()
    ))
}

/// Unpacks the download if it is an archive and returns the CSV files it yields.
fn unpack(file_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let files = match PayloadKind::from_path(file_path) {
        PayloadKind::Zip => {
            let bar = create_spinner("Unpacking zip archive...".to_string());
            let files = extract_zip(file_path, out_dir)?;
            bar.finish_with_message(format!("Unpacked {} file(s)", files.len()));
            files
        }
        PayloadKind::TarGz => {
            let bar = create_spinner("Unpacking tarball...".to_string());
            extract_tar_with_progress(file_path, out_dir, bar.clone())?;
            bar.finish_with_message("Tarball unpacked");
            csv_files_under(out_dir)?
        }
        PayloadKind::Csv => vec![file_path.to_path_buf()],
        PayloadKind::Unknown => {
            warn!(file = %file_path.display(), "unknown format, left as downloaded");
            Vec::new()
        }
    };

    Ok(files
        .into_iter()
        .filter(|p| PayloadKind::from_path(p) == PayloadKind::Csv)
        .collect())
}

fn csv_files_under(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && PayloadKind::from_path(e.path()) == PayloadKind::Csv)
        .map(|e| e.into_path())
        .collect();
    files.sort();

    Ok(files)
}

/// Row count, column count and the first rows of a CSV.
fn preview(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(file);
    let headers = rdr.headers()?.clone();

    let mut rows = 0usize;
    let mut head = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if head.len() < PREVIEW_ROWS {
            head.push(record.iter().collect::<Vec<_>>().join(" | "));
        }
        rows += 1;
    }

    let mut lines = vec![
        format!("{}: {} rows x {} columns", path.display(), rows, headers.len()),
        headers.iter().collect::<Vec<_>>().join(" | "),
    ];
    lines.extend(head);

    Ok(lines.join("\n"))
}

// -- Tests -------------------------------------------------------------------
