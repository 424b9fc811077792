use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Args;
use tracing::{info, warn};

use crate::{
    cli::create_spinner,
    pipeline::split::{sort_directory, SplitInput, Splitter},
};

#[derive(Debug, Args)]
pub struct SplitArgs {
    /// Directory of CSVs, a single CSV, or a zip archive
    #[arg(long, default_value = "dataset_emission")]
    pub input: PathBuf,

    /// Directory for the per-country files
    #[arg(long, default_value = "emission_per_country")]
    pub out: PathBuf,

    /// Rows buffered before they are appended to disk
    #[arg(long, default_value_t = 200_000)]
    pub chunk_size: usize,

    /// Sort every CSV in the output directory by date afterwards
    #[arg(long)]
    pub sort: bool,

    /// Field delimiter; sniffed from the data when omitted
    #[arg(long)]
    pub sep: Option<String>,
}

fn parse_sep(sep: &str) -> Result<u8> {
    match sep {
        "\\t" | "tab" => Ok(b'\t'),
        s if s.len() == 1 => Ok(s.as_bytes()[0]),
        s => Err(anyhow!("separator must be a single character, got '{s}'")),
    }
}

pub fn split(args: &SplitArgs) -> Result<String> {
    let input = SplitInput::from_path(&args.input)?;
    let delimiter = args.sep.as_deref().map(parse_sep).transpose()?;
    let mut splitter = Splitter::new(&args.out, args.chunk_size, delimiter)?;

    let bar = create_spinner("Splitting by country...".to_string());
    splitter.split_input(&input, |source| {
        bar.set_message(format!("Splitting {source}..."));
    })?;
    let (stats, _) = splitter.finish()?;
    bar.finish_with_message(format!("Split {} source(s)", stats.sources));

    if stats.rows_malformed > 0 {
        warn!(rows = stats.rows_malformed, "skipped rows with a wrong field count");
    }
    info!(
        rows = stats.rows_written,
        incomplete = stats.rows_incomplete,
        files = stats.files_written,
        "split complete"
    );

    if args.sort {
        let bar = create_spinner("Sorting by date...".to_string());
        let (sorted, failed) = sort_directory(&args.out)?;
        bar.finish_with_message(format!("Sorted {sorted} file(s), {failed} failed"));
    }

    Ok(format!(
        "Wrote {} rows into {} file(s) in `{}`",
        stats.rows_written,
        stats.files_written,
        args.out.display()
    ))
}

// -- Tests -------------------------------------------------------------------
