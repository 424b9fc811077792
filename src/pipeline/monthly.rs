//! Monthly temperature observations and the loaders shared by the stages that
//! read them, either from one table or from a directory of per-country files.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    calendar,
    table::{self, Frame, TableError, TableFormat},
};

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyObservation {
    pub country: String,
    pub year: i64,
    pub month: u32,
    /// NaN when the source value is missing.
    pub temp_c: f64,
}

impl MonthlyObservation {
    pub fn key(&self) -> i64 {
        calendar::month_key(self.year, self.month)
    }
}

/// Names of the columns holding each observation field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnNames {
    pub country: String,
    pub year: String,
    pub month: String,
    pub temp: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            country: "country".into(),
            year: "year".into(),
            month: "month".into(),
            temp: "temp_c".into(),
        }
    }
}

/// How a file stem becomes a country name when the file has no country column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StemCountry {
    Verbatim,
    /// Underscores become spaces.
    Spaced,
}

impl StemCountry {
    pub fn country(self, path: &Path) -> String {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        match self {
            StemCountry::Verbatim => stem,
            StemCountry::Spaced => stem.replace('_', " ").trim().to_string(),
        }
    }
}

/// Where observations come from.
#[derive(Debug, Clone)]
pub enum Source {
    File(PathBuf),
    Directory(PathBuf),
}

impl Source {
    pub fn from_args(input: Option<&Path>, input_dir: Option<&Path>) -> Result<Self> {
        match (input, input_dir) {
            (Some(file), None) => Ok(Source::File(file.to_path_buf())),
            (None, Some(dir)) => Ok(Source::Directory(dir.to_path_buf())),
            _ => Err(anyhow!("exactly one of an input file or an input directory is required")),
        }
    }

    pub fn display(&self) -> String {
        match self {
            Source::File(path) | Source::Directory(path) => path.display().to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Loaded {
    pub observations: Vec<MonthlyObservation>,
    pub files_read: usize,
    pub files_skipped: usize,
    /// Rows dropped because their country, year or month could not be determined.
    pub rows_skipped: usize,
}

/// Extracts observations from a frame.
///
/// Without a country column, `fallback_country` is used for every row. Year
/// and month come from their own columns when both exist, else from a `date`
/// column; `prefer_date` reverses that order. A missing temperature becomes NaN.
pub fn observations_from_frame(
    frame: &Frame,
    names: &ColumnNames,
    fallback_country: Option<&str>,
    prefer_date: bool,
) -> Result<Loaded, TableError> {
    let n = frame.num_rows();
    let has_year_month = frame.has_column(&names.year) && frame.has_column(&names.month);
    let has_date = frame.has_column("date");

    let countries = match fallback_country {
        Some(country) if !frame.has_column(&names.country) => vec![Some(country.to_string()); n],
        _ => frame.text(&names.country)?,
    };
    let temps = frame.floats(&names.temp)?;

    let year_months: Vec<Option<(i64, u32)>> =
        if has_year_month && !(prefer_date && has_date) {
            let years = frame.ints(&names.year)?;
            let months = frame.ints(&names.month)?;
            years
                .into_iter()
                .zip(months)
                .map(|(year, month)| match (year, month) {
                    (Some(year), Some(month)) if (1..=12).contains(&month) => {
                        Some((year, month as u32))
                    }
                    _ => None,
                })
                .collect()
        } else if has_date {
            frame
                .text("date")?
                .iter()
                .map(|d| d.as_deref().and_then(calendar::parse_date))
                .collect()
        } else {
            let missing = [names.year.as_str(), names.month.as_str(), "date"]
                .into_iter()
                .filter(|name| !frame.has_column(name))
                .map(str::to_string)
                .collect();
            return Err(TableError::MissingColumns {
                missing,
                available: frame.names().to_vec(),
            });
        };

    let mut loaded = Loaded::default();
    for ((country, year_month), temp) in countries.into_iter().zip(year_months).zip(temps) {
        match (country, year_month) {
            (Some(country), Some((year, month))) => loaded.observations.push(MonthlyObservation {
                country,
                year,
                month,
                temp_c: temp.unwrap_or(f64::NAN),
            }),
            _ => loaded.rows_skipped += 1,
        }
    }

    Ok(loaded)
}

/// Table files (`.csv`, `.parquet`) directly inside `dir`, sorted by name.
pub fn table_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("cannot read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && TableFormat::from_path(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();

    Ok(files)
}

/// Loads observations from a single table or a directory of per-country tables.
///
/// Unreadable files in a directory are skipped with a warning; a file that
/// lacks required columns aborts the load.
pub fn load(source: &Source, names: &ColumnNames, stem: StemCountry) -> Result<Loaded> {
    match source {
        Source::File(path) => {
            let frame = table::read_table(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            let mut loaded = observations_from_frame(&frame, names, None, false)
                .with_context(|| format!("required columns missing in {}", path.display()))?;
            loaded.files_read = 1;
            Ok(loaded)
        }
        Source::Directory(dir) => load_directory(dir, names, stem),
    }
}

fn load_directory(dir: &Path, names: &ColumnNames, stem: StemCountry) -> Result<Loaded> {
    let files = table_files(dir)?;
    if files.is_empty() {
        return Err(anyhow!("no data files found in {}", dir.display()));
    }

    let mut loaded = Loaded::default();
    for path in files {
        let frame = match table::read_table(&path) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unreadable file");
                loaded.files_skipped += 1;
                continue;
            }
        };

        let country = stem.country(&path);
        let file_loaded = observations_from_frame(&frame, names, Some(&country), false)
            .with_context(|| format!("required columns missing in {}", path.display()))?;

        if file_loaded.rows_skipped > 0 {
            warn!(
                file = %path.display(),
                rows = file_loaded.rows_skipped,
                "skipping rows without a usable year and month"
            );
        }
        debug!(file = %path.display(), rows = file_loaded.observations.len(), "loaded");

        loaded.files_read += 1;
        loaded.rows_skipped += file_loaded.rows_skipped;
        loaded.observations.extend(file_loaded.observations);
    }

    Ok(loaded)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;
    use tempfile::TempDir;

    #[test]
    fn should_derive_country_from_stem() {
        let path = Path::new("/data/United_States.csv");
        assert_eq!(StemCountry::Verbatim.country(path), "United_States");
        assert_eq!(StemCountry::Spaced.country(path), "United States");
    }

    #[test]
    fn should_fall_back_to_date_column() {
        let frame = Frame::new()
            .with_column("date", Column::text(["2001-01-01", "garbage", "2001-03-01"]))
            .with_column("temp_c", Column::floats([1.0, 2.0, f64::NAN]));

        let loaded =
            observations_from_frame(&frame, &ColumnNames::default(), Some("Chad"), false).unwrap();

        assert_eq!(loaded.rows_skipped, 1);
        assert_eq!(loaded.observations.len(), 2);
        assert_eq!(loaded.observations[0].country, "Chad");
        assert_eq!(loaded.observations[1].month, 3);
        assert!(loaded.observations[1].temp_c.is_nan());
    }

    #[test]
    fn should_fail_without_year_month_or_date() {
        let frame = Frame::new()
            .with_column("country", Column::text(["A"]))
            .with_column("temp_c", Column::floats([1.0]));

        let err =
            observations_from_frame(&frame, &ColumnNames::default(), None, false).unwrap_err();
        match err {
            TableError::MissingColumns { missing, .. } => {
                assert_eq!(missing, vec!["year", "month", "date"])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn should_skip_unreadable_files_in_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Peru.csv"),
            "year,month,temp_c\n2000,1,20.5\n2000,2,21.0\n",
        )
        .unwrap();
        fs::write(dir.path().join("Broken.csv"), "year,month,temp_c\n2000,1\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let source = Source::Directory(dir.path().to_path_buf());
        let loaded = load(&source, &ColumnNames::default(), StemCountry::Verbatim).unwrap();

        assert_eq!(loaded.files_read, 1);
        assert_eq!(loaded.files_skipped, 1);
        assert_eq!(loaded.observations.len(), 2);
        assert_eq!(loaded.observations[0].country, "Peru");
    }

    #[test]
    fn should_abort_on_missing_temperature_column() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Peru.csv"), "year,month,value\n2000,1,20.5\n").unwrap();

        let source = Source::Directory(dir.path().to_path_buf());
        assert!(load(&source, &ColumnNames::default(), StemCountry::Verbatim).is_err());
    }
}
