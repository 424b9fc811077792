//! Removes rows after (or from) a cutoff month in per-country CSVs.

use std::{io::BufWriter, path::Path};

use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tempfile::NamedTempFile;

use crate::calendar;

pub const REQUIRED_COLUMNS: [&str; 5] = ["date", "year", "month", "temp_c", "country"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimMode {
    /// Keep rows up to and including the cutoff month.
    KeepCutoff,
    /// Drop the cutoff month as well.
    DropFromCutoff,
}

impl TrimMode {
    pub fn keeps(self, key: i64, cutoff_key: i64) -> bool {
        match self {
            TrimMode::KeepCutoff => key <= cutoff_key,
            TrimMode::DropFromCutoff => key < cutoff_key,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrimCounts {
    pub kept: usize,
    pub dropped: usize,
}

fn parse_int(field: &str) -> Option<i64> {
    let field = field.trim();
    field.parse::<i64>().ok().or_else(|| {
        field
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| v as i64)
    })
}

/// Trims one file, writing the kept rows to `output` unless it is `None`.
/// Every column is carried over unchanged. A file without data rows is not
/// written.
pub fn trim_file(
    input: &Path,
    output: Option<&Path>,
    cutoff_key: i64,
    mode: TrimMode,
) -> Result<TrimCounts> {
    let mut rdr = ReaderBuilder::new()
        .from_path(input)
        .with_context(|| format!("cannot read {}", input.display()))?;
    let headers = rdr.headers()?.clone();

    let position = |name: &str| headers.iter().position(|h| h == name);
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .into_iter()
        .filter(|name| position(name).is_none())
        .collect();
    let (year_idx, month_idx) = match (position("year"), position("month")) {
        (Some(year), Some(month)) if missing.is_empty() => (year, month),
        _ => return Err(anyhow!("unexpected schema, missing {:?}", missing)),
    };

    let mut kept: Vec<StringRecord> = Vec::new();
    let mut counts = TrimCounts::default();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let year = record.get(year_idx).and_then(parse_int);
        let month = record.get(month_idx).and_then(parse_int);
        let (Some(year), Some(month)) = (year, month) else {
            return Err(anyhow!("row {} has no valid year and month", row + 1));
        };

        if mode.keeps(year * 12 + month - 1, cutoff_key) {
            kept.push(record);
            counts.kept += 1;
        } else {
            counts.dropped += 1;
        }
    }

    if let Some(output) = output.filter(|_| counts.kept + counts.dropped > 0) {
        write_records(output, &headers, &kept)?;
    }

    Ok(counts)
}

/// Writes through a temporary file in the target directory so an in-place
/// trim never leaves a half-written file.
fn write_records(path: &Path, headers: &StringRecord, records: &[StringRecord]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("cannot create a temporary file in {}", dir.display()))?;

    {
        let mut wtr = WriterBuilder::new().from_writer(BufWriter::new(tmp.as_file()));
        wtr.write_record(headers)?;
        for record in records {
            wtr.write_record(record)?;
        }
        wtr.flush()?;
    }

    tmp.persist(path)
        .with_context(|| format!("cannot write {}", path.display()))?;

    Ok(())
}

/// Month key for a `YYYY-MM` cutoff.
pub fn cutoff_key(cutoff_ym: &str) -> Result<i64> {
    calendar::parse_year_month(cutoff_ym)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const DATA: &str = "date,year,month,temp_c,country,station\n\
                        2024-11-01,2024,11,10.5,Peru,x\n\
                        2024-12-01,2024,12,11.0,Peru,y\n\
                        2025-01-01,2025,1,12.0,Peru,z\n";

    fn fixture(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("Peru.csv");
        fs::write(&path, DATA).unwrap();
        path
    }

    #[test]
    fn should_keep_cutoff_month_by_default() {
        let dir = TempDir::new().unwrap();
        let input = fixture(&dir);
        let output = dir.path().join("out").join("Peru.csv");
        fs::create_dir(dir.path().join("out")).unwrap();

        let counts = trim_file(
            &input,
            Some(&output),
            cutoff_key("2024-12").unwrap(),
            TrimMode::KeepCutoff,
        )
        .unwrap();

        assert_eq!(counts, TrimCounts { kept: 2, dropped: 1 });
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "date,year,month,temp_c,country,station\n\
             2024-11-01,2024,11,10.5,Peru,x\n\
             2024-12-01,2024,12,11.0,Peru,y\n"
        );
    }

    #[test]
    fn should_drop_from_cutoff_in_place() {
        let dir = TempDir::new().unwrap();
        let input = fixture(&dir);

        let counts = trim_file(
            &input,
            Some(&input),
            cutoff_key("2024-12").unwrap(),
            TrimMode::DropFromCutoff,
        )
        .unwrap();

        assert_eq!(counts, TrimCounts { kept: 1, dropped: 2 });
        assert_eq!(fs::read_to_string(&input).unwrap().lines().count(), 2);
    }

    #[test]
    fn should_write_nothing_on_dry_run() {
        let dir = TempDir::new().unwrap();
        let input = fixture(&dir);

        let counts = trim_file(&input, None, cutoff_key("2000-01").unwrap(), TrimMode::KeepCutoff)
            .unwrap();

        assert_eq!(counts.dropped, 3);
        assert_eq!(fs::read_to_string(&input).unwrap(), DATA);
    }

    #[test]
    fn should_reject_unexpected_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Chad.csv");
        fs::write(&path, "year,month,temp_c\n2024,1,30.0\n").unwrap();

        let err = trim_file(&path, None, 0, TrimMode::KeepCutoff).unwrap_err();
        assert!(err.to_string().contains("country"));
    }
}
