//! Markdown summary of the baseline metrics.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use super::{
    baselines::Baseline,
    metrics::{CountryMetrics, GlobalMetrics},
};

#[derive(Debug, Clone, PartialEq)]
pub struct BucketWins {
    pub bucket: String,
    pub countries: usize,
    /// Share of the bucket's countries where lag-12 beats climatology on RMSE.
    pub share_lag12_better: f64,
}

/// Head-to-head lag-12 vs climatology per bucket. Buckets lacking either
/// baseline are left out.
pub fn lag12_wins(by_country: &[CountryMetrics]) -> Vec<BucketWins> {
    let lag12 = Baseline::Lag12.as_str();
    let climatology = Baseline::Climatology.as_str();

    let mut buckets: BTreeMap<&str, BTreeMap<&str, HashMap<&str, f64>>> = BTreeMap::new();
    for row in by_country {
        buckets
            .entry(row.bucket.as_str())
            .or_default()
            .entry(row.country.as_str())
            .or_default()
            .entry(row.baseline.as_str())
            .or_insert(row.rmse);
    }

    buckets
        .into_iter()
        .filter(|(_, countries)| {
            let has = |name: &str| countries.values().any(|b| b.contains_key(name));
            has(lag12) && has(climatology)
        })
        .map(|(bucket, countries)| {
            let wins = countries
                .values()
                .filter(|b| match (b.get(lag12), b.get(climatology)) {
                    (Some(l), Some(c)) => l < c,
                    _ => false,
                })
                .count();
            BucketWins {
                bucket: bucket.to_string(),
                countries: countries.len(),
                share_lag12_better: wins as f64 / countries.len() as f64,
            }
        })
        .collect()
}

fn number(value: f64, decimals: usize) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{:.*}", decimals, value)
    }
}

pub fn render_markdown(
    global: &[GlobalMetrics],
    wins: &[BucketWins],
    generated_at: DateTime<Utc>,
) -> String {
    let mut topline: Vec<&GlobalMetrics> = global.iter().collect();
    topline.sort_by(|a, b| a.bucket.cmp(&b.bucket).then(a.baseline.cmp(&b.baseline)));

    let mut lines = vec![
        "# Baseline forecast summary".to_string(),
        String::new(),
        format!("Generated: {} UTC", generated_at.format("%Y-%m-%d")),
        String::new(),
        "## Global metrics by bucket".to_string(),
        String::new(),
        "| bucket | baseline | countries | MAE | RMSE |".to_string(),
        "|---|---|---:|---:|---:|".to_string(),
    ];
    lines.extend(topline.iter().map(|row| {
        format!(
            "| {} | {} | {} | {} | {} |",
            row.bucket,
            row.baseline,
            row.countries,
            number(row.mae, 3),
            number(row.rmse, 3)
        )
    }));

    lines.push(String::new());
    lines.push("## Lag-12 vs climatology (share of countries with lower RMSE)".to_string());
    lines.push(String::new());
    if wins.is_empty() {
        lines.push("No bucket has both baselines.".to_string());
    } else {
        lines.push("| bucket | countries | lag12 better |".to_string());
        lines.push("|---|---:|---:|".to_string());
        lines.extend(wins.iter().map(|row| {
            format!(
                "| {} | {} | {}% |",
                row.bucket,
                row.countries,
                number(row.share_lag12_better * 100.0, 1)
            )
        }));
    }

    let mut md = lines.join("\n");
    md.push('\n');
    md
}

// -- Tests -------------------------------------------------------------------
