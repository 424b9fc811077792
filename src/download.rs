//! Streams a remote dataset to disk and unpacks the archive formats it ships in.

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Error, Result};
use flate2::read::GzDecoder;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{HeaderName, CONTENT_DISPOSITION, CONTENT_TYPE};
use tar::Archive;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use zip::ZipArchive;

const DEFAULT_STEM: &str = "carbon_monitor_download";

/// What a downloaded file turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Zip,
    TarGz,
    Csv,
    Unknown,
}

impl PayloadKind {
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name.ends_with(".zip") {
            PayloadKind::Zip
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            PayloadKind::TarGz
        } else if name.ends_with(".csv") {
            PayloadKind::Csv
        } else {
            PayloadKind::Unknown
        }
    }
}

fn disposition_file_name(content_disposition: &str) -> Option<String> {
    let start = content_disposition.find("filename=")? + "filename=".len();
    let raw = content_disposition[start..]
        .split(';')
        .next()?
        .trim()
        .trim_matches('"');

    // Only the last path component, never a directory the server chose.
    Path::new(raw)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
}

/// Picks the local file name for a download from its response headers.
pub fn file_name_for(
    content_disposition: Option<&str>,
    content_type: Option<&str>,
    url: &str,
) -> String {
    if let Some(name) = content_disposition.and_then(disposition_file_name) {
        return name;
    }

    let content_type = content_type.unwrap_or_default().to_lowercase();
    if content_type.contains("zip") {
        format!("{DEFAULT_STEM}.zip")
    } else if content_type.contains("csv") || content_type.contains("text/plain") {
        format!("{DEFAULT_STEM}.csv")
    } else if content_type.contains("gzip") {
        format!("{DEFAULT_STEM}.tar.gz")
    } else {
        url.split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .filter(|name| !name.is_empty() && !name.contains(':'))
            .map(str::to_string)
            .unwrap_or_else(|| format!("{DEFAULT_STEM}.bin"))
    }
}

/// Downloads `url` into `out_dir`, streaming into a temporary file that is
/// only moved to its final name once the body is complete.
pub async fn download_with_progress(
    url: &str,
    out_dir: &Path,
    timeout: Duration,
    progress_bar: ProgressBar,
) -> Result<PathBuf, Error> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("cannot create {}", out_dir.display()))?;

    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::msg(format!("Failed to download file: {}", e)))?;

    if !response.status().is_success() {
        return Err(Error::msg(format!(
            "Failed to download file: {}",
            response.status()
        )));
    }

    let header = |name: HeaderName| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let file_name = file_name_for(
        header(CONTENT_DISPOSITION).as_deref(),
        header(CONTENT_TYPE).as_deref(),
        url,
    );
    debug!(file_name = %file_name, "resolved download file name");

    // Switch the spinner to a byte bar when the size is known
    let total_size = response.content_length().unwrap_or(0);
    if total_size > 0 {
        progress_bar.set_length(total_size);
        if let Ok(style) = ProgressStyle::with_template(
            "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {eta}",
        ) {
            progress_bar.set_style(style.progress_chars("=> "));
        }
    }

    let mut tmp = NamedTempFile::new_in(out_dir)?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| Error::msg(format!("Error reading chunk: {}", e)))?;
        tmp.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        progress_bar.set_position(downloaded);
    }
    tmp.flush()?;

    let file_path = out_dir.join(&file_name);
    tmp.persist(&file_path)
        .with_context(|| format!("cannot save {}", file_path.display()))?;
    info!(bytes = downloaded, path = %file_path.display(), "download complete");

    Ok(file_path)
}

/// Extracts every file of a zip archive under `out_dir`. Members whose path
/// would escape `out_dir` are skipped.
pub fn extract_zip(zip_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let file =
        File::open(zip_path).with_context(|| format!("cannot open {}", zip_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("cannot read zip {}", zip_path.display()))?;

    let mut extracted = Vec::new();
    for i in 0..archive.len() {
        let mut member = archive.by_index(i)?;
        if member.is_dir() {
            continue;
        }
        let Some(relative) = member.enclosed_name() else {
            warn!(member = member.name(), "skipping zip member with unsafe path");
            continue;
        };

        let target = out_dir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)
            .with_context(|| format!("cannot create {}", target.display()))?;
        io::copy(&mut member, &mut out)?;
        extracted.push(target);
    }

    Ok(extracted)
}

/// Extracts the tarball with progress tracking by counting entries.
pub fn extract_tar_with_progress(
    tar_gz_path: &Path,
    working_dir: &Path,
    progress_bar: ProgressBar,
) -> Result<()> {
    // First pass: count entries
    let tar = GzDecoder::new(File::open(tar_gz_path)?);
    let total_files = Archive::new(tar).entries()?.count() as u64;

    progress_bar.set_length(total_files);
    if let Ok(style) = ProgressStyle::with_template(
        "{msg} [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {eta}",
    ) {
        progress_bar.set_style(style.progress_chars("=> "));
    }

    // Second pass: extract
    let tar = GzDecoder::new(File::open(tar_gz_path)?);
    let mut archive = Archive::new(tar);

    let mut count = 0u64;
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.unpack_in(working_dir)? {
            warn!(path = ?entry.path().ok(), "skipping tar entry with unsafe path");
        }
        count += 1;
        progress_bar.set_position(count);
    }

    if count == 0 {
        return Err(anyhow!("{} holds no entries", tar_gz_path.display()));
    }

    Ok(())
}

// -- Tests -------------------------------------------------------------------
