//! Splits a combined country/date/value dataset into one CSV per country.

use std::{
    collections::{HashMap, HashSet},
    fs::{self, File, OpenOptions},
    io::{BufWriter, Cursor, Read},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use csv::{ByteRecord, ReaderBuilder, WriterBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

/// Bytes read from the start of each source to guess its delimiter.
pub const SNIFF_BYTES: u64 = 200_000;

const CANDIDATE_DELIMITERS: [u8; 5] = [b',', b';', b'\t', b'|', b':'];
const OUTPUT_HEADER: [&str; 3] = ["country", "date", "value"];

/// File-system safe name for a country: runs of characters other than
/// alphanumerics, `_` and `-` become a single `_`.
pub fn safe_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        let keep = c.is_alphanumeric() || c == '_' || c == '-';
        if keep && c != '_' {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Guesses the field delimiter of a delimited-text sample.
///
/// A candidate that occurs the same non-zero number of times on every line
/// wins, the highest such count first. Otherwise the most frequent candidate
/// is used, and `,` when none occurs at all.
pub fn sniff_delimiter(sample: &[u8]) -> u8 {
    let text = String::from_utf8_lossy(sample);
    let mut lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    // The last line of a truncated sample is usually cut short.
    if sample.len() as u64 >= SNIFF_BYTES && !text.ends_with('\n') && lines.len() > 1 {
        lines.pop();
    }

    let count = |line: &str, d: u8| line.bytes().filter(|&b| b == d).count();

    let consistent = CANDIDATE_DELIMITERS
        .iter()
        .filter_map(|&d| {
            let first = count(lines.first()?, d);
            (first > 0 && lines.iter().all(|l| count(l, d) == first)).then_some((d, first))
        })
        .fold(None, |best: Option<(u8, usize)>, (d, n)| match best {
            Some((_, best_n)) if best_n >= n => best,
            _ => Some((d, n)),
        });
    if let Some((d, _)) = consistent {
        return d;
    }

    CANDIDATE_DELIMITERS
        .iter()
        .map(|&d| (d, sample.iter().filter(|&&b| b == d).count()))
        .fold(None, |best: Option<(u8, usize)>, (d, n)| match best {
            Some((_, best_n)) if best_n >= n => best,
            _ if n > 0 => Some((d, n)),
            _ => best,
        })
        .map_or(b',', |(d, _)| d)
}

/// Where the combined data comes from.
#[derive(Debug, Clone)]
pub enum SplitInput {
    Directory(PathBuf),
    Csv(PathBuf),
    Zip(PathBuf),
}

impl SplitInput {
    pub fn from_path(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Ok(SplitInput::Directory(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(anyhow!("input not found: {}", path.display()));
        }

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Ok(SplitInput::Csv(path.to_path_buf())),
            "zip" => Ok(SplitInput::Zip(path.to_path_buf())),
            other => Err(anyhow!(
                "unsupported input type '.{}' for {}",
                other,
                path.display()
            )),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SplitStats {
    pub sources: usize,
    pub rows_written: usize,
    /// Rows whose field count does not match the header.
    pub rows_malformed: usize,
    /// Rows with an empty country, date or value.
    pub rows_incomplete: usize,
    pub files_written: usize,
}

/// Buffers rows per country and appends them to `<out_dir>/<safe_name>.csv`.
pub struct Splitter {
    out_dir: PathBuf,
    chunk_size: usize,
    delimiter: Option<u8>,
    buffers: HashMap<String, Vec<[String; 3]>>,
    buffered: usize,
    written: HashSet<PathBuf>,
    stats: SplitStats,
}

impl Splitter {
    /// `delimiter` overrides sniffing when set.
    pub fn new(out_dir: &Path, chunk_size: usize, delimiter: Option<u8>) -> Result<Self> {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("cannot create {}", out_dir.display()))?;

        Ok(Self {
            out_dir: out_dir.to_path_buf(),
            chunk_size: chunk_size.max(1),
            delimiter,
            buffers: HashMap::new(),
            buffered: 0,
            written: HashSet::new(),
            stats: SplitStats::default(),
        })
    }

    /// Feeds every CSV of `input`, calling `on_source` with each source's name.
    pub fn split_input(&mut self, input: &SplitInput, mut on_source: impl FnMut(&str)) -> Result<()> {
        match input {
            SplitInput::Csv(path) => {
                on_source(&path.display().to_string());
                self.split_file(path)?;
            }
            SplitInput::Directory(dir) => {
                let mut files: Vec<PathBuf> = fs::read_dir(dir)
                    .with_context(|| format!("cannot read {}", dir.display()))?
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|p| p.is_file() && has_csv_extension(&p.to_string_lossy()))
                    .collect();
                files.sort();
                if files.is_empty() {
                    return Err(anyhow!("no *.csv found in {}", dir.display()));
                }

                for path in files {
                    on_source(&path.display().to_string());
                    self.split_file(&path)?;
                }
            }
            SplitInput::Zip(path) => {
                let file = File::open(path)
                    .with_context(|| format!("cannot open {}", path.display()))?;
                let mut archive = ZipArchive::new(file)
                    .with_context(|| format!("cannot read zip {}", path.display()))?;

                let members: Vec<String> = archive
                    .file_names()
                    .filter(|name| !name.ends_with('/') && has_csv_extension(name))
                    .map(str::to_string)
                    .collect();
                if members.is_empty() {
                    return Err(anyhow!("no CSV members found in {}", path.display()));
                }

                for name in members {
                    on_source(&name);
                    let member = archive
                        .by_name(&name)
                        .with_context(|| format!("cannot read {} in {}", name, path.display()))?;
                    self.split_reader(member, &name)?;
                }
            }
        }

        Ok(())
    }

    fn split_file(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        self.split_reader(file, &path.display().to_string())
    }

    /// Splits one delimited source whose header names `country`, `date` and
    /// `value` in any letter case.
    pub fn split_reader<R: Read>(&mut self, mut reader: R, label: &str) -> Result<()> {
        let mut sample = Vec::new();
        reader
            .by_ref()
            .take(SNIFF_BYTES)
            .read_to_end(&mut sample)
            .with_context(|| format!("cannot read {}", label))?;
        let delimiter = self.delimiter.unwrap_or_else(|| sniff_delimiter(&sample));
        debug!(source = label, delimiter = %(delimiter as char).escape_default(), "splitting");

        let mut rdr = ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(Cursor::new(sample).chain(reader));

        let headers = rdr
            .byte_headers()
            .with_context(|| format!("cannot read header of {}", label))?
            .clone();
        let position = |wanted: &str| {
            headers
                .iter()
                .position(|h| String::from_utf8_lossy(h).trim().eq_ignore_ascii_case(wanted))
        };
        let (Some(country_idx), Some(date_idx), Some(value_idx)) =
            (position("country"), position("date"), position("value"))
        else {
            return Err(anyhow!(
                "{} must have country, date and value columns, found {:?}",
                label,
                headers
                    .iter()
                    .map(|h| String::from_utf8_lossy(h).to_string())
                    .collect::<Vec<_>>()
            ));
        };

        let mut record = ByteRecord::new();
        while rdr
            .read_byte_record(&mut record)
            .with_context(|| format!("cannot read {}", label))?
        {
            if record.len() != headers.len() {
                self.stats.rows_malformed += 1;
                continue;
            }

            let field = |idx: usize| String::from_utf8_lossy(&record[idx]).to_string();
            let row = [field(country_idx), field(date_idx), field(value_idx)];
            if row.iter().any(|f| f.trim().is_empty()) {
                self.stats.rows_incomplete += 1;
                continue;
            }

            self.buffers.entry(safe_name(&row[0])).or_default().push(row);
            self.buffered += 1;
            if self.buffered >= self.chunk_size {
                self.flush()?;
            }
        }

        self.stats.sources += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for (name, rows) in self.buffers.drain() {
            let path = self.out_dir.join(format!("{name}.csv"));
            let is_new = !path.exists();

            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("cannot open {}", path.display()))?;
            let mut wtr = WriterBuilder::new().from_writer(BufWriter::new(file));
            if is_new {
                wtr.write_record(OUTPUT_HEADER)?;
            }
            for row in &rows {
                wtr.write_record(row)?;
            }
            wtr.flush()?;

            self.stats.rows_written += rows.len();
            self.written.insert(path);
        }
        self.buffered = 0;

        Ok(())
    }

    /// Flushes what is left and returns the run's counts and output files.
    pub fn finish(mut self) -> Result<(SplitStats, Vec<PathBuf>)> {
        self.flush()?;
        if self.stats.sources == 0 {
            return Err(anyhow!("no CSV data found in the input"));
        }

        let mut files: Vec<PathBuf> = self.written.into_iter().collect();
        files.sort();
        self.stats.files_written = files.len();

        Ok((self.stats, files))
    }
}

fn has_csv_extension(name: &str) -> bool {
    name.to_lowercase().ends_with(".csv")
}

/// Rewrites a per-country file sorted by its date column (as text).
pub fn sort_by_date(path: &Path) -> Result<()> {
    let mut rdr = ReaderBuilder::new()
        .from_path(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let headers = rdr.headers()?.clone();
    let date_idx = headers
        .iter()
        .position(|h| h == "date")
        .ok_or_else(|| anyhow!("{} has no date column", path.display()))?;

    let mut records = rdr.records().collect::<Result<Vec<_>, _>>()?;
    records.sort_by(|a, b| a.get(date_idx).cmp(&b.get(date_idx)));

    let mut wtr = WriterBuilder::new().from_path(path)?;
    wtr.write_record(&headers)?;
    for record in &records {
        wtr.write_record(record)?;
    }
    wtr.flush()?;

    Ok(())
}

/// Sorts every `*.csv` directly under `dir`, including files left by earlier
/// runs. Files that fail are warned about and counted; returns
/// `(sorted, failed)`.
pub fn sort_directory(dir: &Path) -> Result<(usize, usize)> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && has_csv_extension(&e.file_name().to_string_lossy()))
        .map(|e| e.into_path())
        .collect();
    files.sort();

    let mut failed = 0;
    for path in &files {
        if let Err(e) = sort_by_date(path) {
            warn!(file = %path.display(), error = %format!("{e:#}"), "could not sort");
            failed += 1;
        }
    }

    Ok((files.len() - failed, failed))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn should_make_safe_file_names() {
        assert_eq!(safe_name("  United States "), "United_States");
        assert_eq!(safe_name("Côte d'Ivoire"), "Côte_d_Ivoire");
        assert_eq!(safe_name("a__b"), "a_b");
        assert_eq!(safe_name("Guinea-Bissau"), "Guinea-Bissau");
        assert_eq!(safe_name("!!!"), "unknown");
        assert_eq!(safe_name(""), "unknown");
    }

    #[test]
    fn should_sniff_consistent_delimiter() {
        assert_eq!(sniff_delimiter(b"country;date;value\nA;01/01/2019;1,5\n"), b';');
        assert_eq!(sniff_delimiter(b"country\tdate\tvalue\nA\t2019\t1\n"), b'\t');
        assert_eq!(sniff_delimiter(b"country,date,value\nA,2019-01-01,1.5\n"), b',');
        assert_eq!(sniff_delimiter(b"no delimiters here\n"), b',');
    }

    #[test]
    fn should_fall_back_to_most_frequent_delimiter() {
        assert_eq!(sniff_delimiter(b"a|b|c\nd|e\n"), b'|');
    }

    #[test]
    fn should_split_rows_per_country() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("all.csv");
        fs::write(
            &input,
            "Country;Date;Sector;Value\n\
             France;02/01/2019;Power;1.5\n\
             France;01/01/2019;Power;2.5\n\
             United States;01/01/2019;Power;3.0\n\
             Chad;01/01/2019;Power\n\
             Chad;01/01/2019;Power;\n",
        )
        .unwrap();
        let out = dir.path().join("out");

        let mut splitter = Splitter::new(&out, 2, None).unwrap();
        splitter
            .split_input(&SplitInput::from_path(&input).unwrap(), |_| {})
            .unwrap();
        let (stats, files) = splitter.finish().unwrap();

        assert_eq!(stats.rows_written, 3);
        assert_eq!(stats.rows_malformed, 1);
        assert_eq!(stats.rows_incomplete, 1);
        assert_eq!(files.len(), 2);
        assert_eq!(
            fs::read_to_string(out.join("France.csv")).unwrap(),
            "country,date,value\nFrance,02/01/2019,1.5\nFrance,01/01/2019,2.5\n"
        );
        assert!(out.join("United_States.csv").exists());

        fs::write(out.join("Old.csv"), "country,date,value\nOld,2019-02,1\nOld,2019-01,2\n").unwrap();
        fs::write(out.join("notes.csv"), "no date here\n").unwrap();
        assert_eq!(sort_directory(&out).unwrap(), (3, 1));
        assert_eq!(
            fs::read_to_string(out.join("Old.csv")).unwrap(),
            "country,date,value\nOld,2019-01,2\nOld,2019-02,1\n"
        );
        assert_eq!(
            fs::read_to_string(out.join("France.csv")).unwrap(),
            "country,date,value\nFrance,01/01/2019,2.5\nFrance,02/01/2019,1.5\n"
        );
    }

    #[test]
    fn should_append_without_repeating_header() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");

        for value in ["1", "2"] {
            let mut splitter = Splitter::new(&out, 100, Some(b',')).unwrap();
            let data = format!("country,date,value\nPeru,2019-01-01,{value}\n");
            splitter.split_reader(data.as_bytes(), "inline").unwrap();
            splitter.finish().unwrap();
        }

        assert_eq!(
            fs::read_to_string(out.join("Peru.csv")).unwrap(),
            "country,date,value\nPeru,2019-01-01,1\nPeru,2019-01-01,2\n"
        );
    }

    #[test]
    fn should_read_csv_members_of_zip() {
        let dir = TempDir::new().unwrap();
        let zip_path = dir.path().join("data.zip");
        {
            let file = File::create(&zip_path).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("carbon.csv", options).unwrap();
            zip.write_all(b"country,date,value\nIndia,2019-01-01,4.2\n").unwrap();
            zip.start_file("readme.txt", options).unwrap();
            zip.write_all(b"ignored").unwrap();
            zip.finish().unwrap();
        }
        let out = dir.path().join("out");

        let mut splitter = Splitter::new(&out, 10, None).unwrap();
        let mut seen = Vec::new();
        splitter
            .split_input(&SplitInput::from_path(&zip_path).unwrap(), |name| {
                seen.push(name.to_string())
            })
            .unwrap();
        let (stats, _) = splitter.finish().unwrap();

        assert_eq!(seen, vec!["carbon.csv"]);
        assert_eq!(stats.rows_written, 1);
        assert!(out.join("India.csv").exists());
    }

    #[test]
    fn should_reject_missing_columns_and_unsupported_input() {
        let dir = TempDir::new().unwrap();
        let mut splitter = Splitter::new(dir.path(), 10, None).unwrap();
        assert!(splitter
            .split_reader("country,when,value\nA,1,2\n".as_bytes(), "inline")
            .is_err());

        let other = dir.path().join("data.json");
        fs::write(&other, "{}").unwrap();
        assert!(SplitInput::from_path(&other).is_err());

        let empty = dir.path().join("empty");
        fs::create_dir(&empty).unwrap();
        let mut splitter = Splitter::new(&dir.path().join("out"), 10, None).unwrap();
        assert!(splitter
            .split_input(&SplitInput::Directory(empty), |_| {})
            .is_err());
    }
}
