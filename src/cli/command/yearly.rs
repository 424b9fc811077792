use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use clap::Args;
use tracing::{debug, info, warn};

use crate::{
    cli::create_progress_bar,
    pipeline::{
        monthly::{observations_from_frame, table_files, ColumnNames, MonthlyObservation, StemCountry},
        yearly::{self, YearlyAnomaly, YearlyParams},
    },
    settings::Settings,
    table,
};

use super::save_table;

#[derive(Debug, Args)]
pub struct YearlyArgs {
    /// Directory of monthly per-country files
    #[arg(long, default_value = "temp_per_country")]
    pub input_dir: PathBuf,

    /// Combined yearly table
    #[arg(long, default_value = "temp_per_country/yearly_temp_aggregated/country_year.csv")]
    pub out_master: PathBuf,

    /// Directory for one yearly file per country
    #[arg(long, default_value = "temp_per_country/yearly_temp_per_country")]
    pub out_per_country: PathBuf,

    /// Months a year needs to be kept [default: 10]
    #[arg(long)]
    pub min_months: Option<usize>,

    /// First year of the reference period [default: 1991]
    #[arg(long)]
    pub ref_start: Option<i64>,

    /// Last year of the reference period [default: 2024]
    #[arg(long)]
    pub ref_end: Option<i64>,
}

impl YearlyArgs {
    fn params(&self, defaults: &YearlyParams) -> YearlyParams {
        YearlyParams {
            min_months: self.min_months.unwrap_or(defaults.min_months),
            ref_start: self.ref_start.unwrap_or(defaults.ref_start),
            ref_end: self.ref_end.unwrap_or(defaults.ref_end),
        }
    }
}

pub fn yearly(args: &YearlyArgs, settings: &Settings) -> Result<String> {
    let params = args.params(&settings.yearly);
    let files = table_files(&args.input_dir)?;
    if files.is_empty() {
        return Err(anyhow!("no data files found in {}", args.input_dir.display()));
    }

    let bar = create_progress_bar(files.len() as u64, "Reading monthly files".to_string());
    let mut means = Vec::new();
    let mut skipped = 0;
    for path in &files {
        match read_monthly(path) {
            Ok(rows) => {
                let file_means = yearly::yearly_means(&rows, params.min_months);
                if file_means.is_empty() {
                    warn!(
                        file = %path.display(),
                        min_months = params.min_months,
                        "skipping file without a complete year"
                    );
                    skipped += 1;
                } else {
                    means.extend(file_means);
                }
            }
            Err(e) => {
                warn!(file = %path.display(), error = %format!("{e:#}"), "skipping file");
                skipped += 1;
            }
        }
        bar.inc(1);
    }
    bar.finish_with_message(format!("Read {} file(s), skipped {}", files.len() - skipped, skipped));

    if means.is_empty() {
        return Err(anyhow!(
            "no country has a year with at least {} months",
            params.min_months
        ));
    }
    let rows = yearly::with_baseline(means, params.ref_start, params.ref_end);

    save_table(&yearly::to_frame(&rows), &args.out_master)?;
    let countries = write_per_country(&rows, &args.out_per_country)?;
    info!(countries, years = rows.len(), skipped, "yearly aggregation complete");

    Ok(format!(
        "Master saved to `{}` ({} countries, {} skipped file(s))",
        args.out_master.display(),
        countries,
        skipped
    ))
}

/// Monthly rows of one file; the file stem names the country when the file
/// has no country column.
fn read_monthly(path: &Path) -> Result<Vec<MonthlyObservation>> {
    let frame = table::read_table(path)?;
    let country = StemCountry::Spaced.country(path);
    let loaded = observations_from_frame(&frame, &ColumnNames::default(), Some(&country), true)?;
    if loaded.rows_skipped > 0 {
        debug!(file = %path.display(), rows = loaded.rows_skipped, "dropped rows without a date");
    }

    Ok(loaded.observations)
}

fn write_per_country(rows: &[YearlyAnomaly], out_dir: &Path) -> Result<usize> {
    let mut by_country: BTreeMap<&str, Vec<YearlyAnomaly>> = BTreeMap::new();
    for row in rows {
        by_country.entry(row.country.as_str()).or_default().push(row.clone());
    }

    for (country, rows) in &by_country {
        let path = out_dir.join(yearly::country_file_name(country));
        table::write_table(&yearly::to_frame(rows), &path)
            .with_context(|| format!("cannot write {}", path.display()))?;
    }

    Ok(by_country.len())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fmt::Write as _, fs};
    use tempfile::TempDir;

    fn args(dir: &Path) -> YearlyArgs {
        YearlyArgs {
            input_dir: dir.join("monthly"),
            out_master: dir.join("agg").join("country_year.csv"),
            out_per_country: dir.join("per"),
            min_months: None,
            ref_start: Some(2000),
            ref_end: Some(2003),
        }
    }

    #[test]
    fn should_drop_short_years_from_master() {
        let dir = TempDir::new().unwrap();
        let monthly = dir.path().join("monthly");
        fs::create_dir(&monthly).unwrap();

        // 36 months at 10.0, then 9 months at 100.0
        let mut csv = String::from("date,temp_c\n");
        for i in 0..45 {
            let (year, month) = (2000 + i / 12, i % 12 + 1);
            let temp = if i < 36 { 10.0 } else { 100.0 };
            writeln!(csv, "{year}-{month:02}-01,{temp}").unwrap();
        }
        fs::write(monthly.join("Country_A.csv"), csv).unwrap();
        fs::write(monthly.join("broken.csv"), "year,month\n2000,1\n").unwrap();

        let message = yearly(&args(dir.path()), &Settings::default()).unwrap();
        assert!(message.contains("1 countries, 1 skipped"));

        let master = fs::read_to_string(dir.path().join("agg").join("country_year.csv")).unwrap();
        let lines: Vec<&str> = master.lines().collect();
        assert_eq!(lines[0], "country,year,temp_c,base,anom");
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("Country A,2000,10"));
        assert!(!master.contains("2003"));

        assert!(dir.path().join("per").join("Country_A.csv").is_file());
    }

    #[test]
    fn should_fail_without_yearly_data() {
        let dir = TempDir::new().unwrap();
        let monthly = dir.path().join("monthly");
        fs::create_dir(&monthly).unwrap();
        fs::write(monthly.join("A.csv"), "date,temp_c\n2000-01-01,1.0\n").unwrap();

        assert!(yearly(&args(dir.path()), &Settings::default()).is_err());
    }

    #[test]
    fn should_count_files_without_complete_year_as_skipped() {
        let dir = TempDir::new().unwrap();
        let monthly = dir.path().join("monthly");
        fs::create_dir(&monthly).unwrap();

        let mut full = String::from("date,temp_c\n");
        for month in 1..=12 {
            writeln!(full, "2001-{month:02}-01,10.0").unwrap();
        }
        let mut short = String::from("date,temp_c\n");
        for month in 1..=9 {
            writeln!(short, "2001-{month:02}-01,20.0").unwrap();
        }
        fs::write(monthly.join("A.csv"), full).unwrap();
        fs::write(monthly.join("B.csv"), short).unwrap();

        let message = yearly(&args(dir.path()), &Settings::default()).unwrap();

        assert!(message.contains("1 countries, 1 skipped"));
        assert!(!dir.path().join("per").join("B.csv").exists());
    }
}
