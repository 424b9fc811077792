//! Month keys (`year * 12 + month - 1`) and date parsing.

use anyhow::{anyhow, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

pub fn month_key(year: i64, month: u32) -> i64 {
    year * 12 + i64::from(month) - 1
}

pub fn key_to_year_month(key: i64) -> (i64, u32) {
    (key.div_euclid(12), key.rem_euclid(12) as u32 + 1)
}

pub fn format_year_month(key: i64) -> String {
    let (year, month) = key_to_year_month(key);
    format!("{:04}-{:02}", year, month)
}

/// Parses `YYYY-MM` into a month key.
pub fn parse_year_month(s: &str) -> Result<i64> {
    let (year, month) = s
        .trim()
        .split_once('-')
        .ok_or_else(|| anyhow!("expected YYYY-MM, got '{}'", s))?;
    let year: i64 = year
        .parse()
        .map_err(|_| anyhow!("invalid year in '{}'", s))?;
    let month: u32 = month
        .parse()
        .map_err(|_| anyhow!("invalid month in '{}'", s))?;

    if !(1..=12).contains(&month) {
        return Err(anyhow!("month must be 1..=12, got {} in '{}'", month, s));
    }

    Ok(month_key(year, month))
}

/// Extracts (year, month) from a date or timestamp string.
///
/// Day-first is assumed for slash-separated dates, which is how the emissions
/// dataset writes them.
pub fn parse_date(s: &str) -> Option<(i64, u32)> {
    let s = s.trim();

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some((i64::from(date.year()), date.month()));
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(s, format) {
            return Some((i64::from(datetime.year()), datetime.month()));
        }
    }

    // Bare year-month
    NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
        .ok()
        .map(|date| (i64::from(date.year()), date.month()))
}

// -- Tests -------------------------------------------------------------------
