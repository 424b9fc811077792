//! Per-year country values for the globe page, and the page itself.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{stats, table};

const TEMPLATE: &str = include_str!("../../assets/globe.html");

pub const YEARLY_COLUMNS: [&str; 5] = ["country", "year", "temp_c", "base", "anom"];
pub const ANOM_CLIP: (f64, f64) = (-3.0, 3.0);

/// Natural Earth polygon names that differ from the dataset's country names.
/// `None` marks polygons that have no dataset counterpart.
pub const COUNTRY_ALIASES: &[(&str, Option<&str>)] = &[
    ("United States of America", Some("USA")),
    ("W. Sahara", Some("Western Sahara")),
    ("Dem. Rep. Congo", Some("DR Congo")),
    ("Dominican Rep.", Some("Dominican Republic")),
    ("Falkland Is.", Some("Falkland Isl")),
    ("Fr. S. Antarctic Lands", Some("French Southern Territories")),
    ("Timor-Leste", Some("East Timor")),
    ("Puerto Rico", Some("Puerto Rico")),
    ("Côte d'Ivoire", Some("Ivory Coast")),
    ("Central African Rep.", Some("Central African Rep")),
    ("Eq. Guinea", Some("Equatorial Guinea")),
    ("eSwatini", Some("Swaziland")),
    ("Palestine", Some("Palestine")),
    ("Vanuatu", Some("Vanatu")),
    ("Solomon Is.", Some("Solomon Isl")),
    ("Taiwan", Some("Taiwan")),
    ("Czechia", Some("Czech Republic")),
    ("Bosnia and Herz.", Some("Bosnia-Herzegovinia")),
    ("North Macedonia", Some("Macedonia")),
    ("S. Sudan", Some("South Sudan")),
    ("Antarctica", None),
    ("N. Cyprus", None),
    ("Somaliland", None),
    ("French Southern Territories", None),
];

#[derive(Debug, Clone, PartialEq)]
pub struct YearlyValue {
    pub country: String,
    pub year: i64,
    pub temp_c: f64,
    pub anom: f64,
}

/// year -> country -> value
pub type YearValues = BTreeMap<String, BTreeMap<String, f64>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValues {
    pub anom: YearValues,
    pub abs: YearValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricClips {
    pub anom: (f64, f64),
    pub abs: (f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricUnits {
    pub anom: String,
    pub abs: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobePayload {
    pub years: Vec<String>,
    pub values: MetricValues,
    pub clips: MetricClips,
    pub units: MetricUnits,
    pub default_metric: String,
}

/// Reads the master yearly table. Rows without a country or year are ignored.
pub fn read_yearly(path: &Path) -> Result<Vec<YearlyValue>> {
    let frame =
        table::read_table(path).with_context(|| format!("cannot read {}", path.display()))?;
    frame
        .require(&YEARLY_COLUMNS)
        .with_context(|| format!("missing columns in {}", path.display()))?;

    let countries = frame.text("country")?;
    let years = frame.ints("year")?;
    let temps = frame.floats("temp_c")?;
    let anoms = frame.floats("anom")?;

    Ok((0..frame.num_rows())
        .filter_map(|row| {
            Some(YearlyValue {
                country: countries[row].clone()?,
                year: years[row]?,
                temp_c: temps[row].unwrap_or(f64::NAN),
                anom: anoms[row].unwrap_or(f64::NAN),
            })
        })
        .collect())
}

fn display_name(country: &str) -> String {
    country.replace('_', " ").trim().to_string()
}

pub fn build_payload(rows: &[YearlyValue]) -> GlobePayload {
    let years: BTreeSet<i64> = rows.iter().map(|r| r.year).collect();

    let mut anom = YearValues::new();
    let mut abs = YearValues::new();
    for row in rows {
        let year = row.year.to_string();
        let country = display_name(&row.country);
        if row.anom.is_finite() {
            anom.entry(year.clone())
                .or_default()
                .insert(country.clone(), stats::round_to(row.anom, 3));
        }
        if row.temp_c.is_finite() {
            abs.entry(year)
                .or_default()
                .insert(country, stats::round_to(row.temp_c, 2));
        }
    }

    let temps: Vec<f64> = rows.iter().map(|r| r.temp_c).filter(|t| t.is_finite()).collect();
    let abs_clip = (
        stats::round_to(stats::quantile(&temps, 0.01), 1),
        stats::round_to(stats::quantile(&temps, 0.99), 1),
    );

    GlobePayload {
        years: years.iter().map(i64::to_string).collect(),
        values: MetricValues { anom, abs },
        clips: MetricClips {
            anom: ANOM_CLIP,
            abs: abs_clip,
        },
        units: MetricUnits {
            anom: "ΔT (°C vs 1991–2020)".to_string(),
            abs: "Temperature (°C)".to_string(),
        },
        default_metric: "anom".to_string(),
    }
}

fn aliases_json() -> Value {
    let map: Map<String, Value> = COUNTRY_ALIASES
        .iter()
        .map(|(polygon, dataset)| {
            let value = dataset.map_or(Value::Null, |name| Value::String(name.to_string()));
            (polygon.to_string(), value)
        })
        .collect();
    Value::Object(map)
}

/// JSON safe to embed inside a `<script>` element.
fn script_json(value: &impl Serialize) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

/// Renders the self-contained globe page with the payload embedded.
pub fn render_html(payload: &GlobePayload) -> Result<String> {
    let (min, max) = payload.clips.anom;
    let max_index = payload.years.len().saturating_sub(1);

    Ok(TEMPLATE
        .replace("{{PAYLOAD}}", &script_json(payload)?)
        .replace("{{ALIASES}}", &script_json(&aliases_json())?)
        .replace("{{UNIT}}", &payload.units.anom)
        .replace("{{MIN}}", &min.to_string())
        .replace("{{MAX}}", &max.to_string())
        .replace("{{MAX_INDEX}}", &max_index.to_string()))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn value(country: &str, year: i64, temp_c: f64, anom: f64) -> YearlyValue {
        YearlyValue {
            country: country.into(),
            year,
            temp_c,
            anom,
        }
    }

    #[test]
    fn should_round_and_key_values_by_year_and_country() {
        let rows = vec![
            value("South_Africa ", 2001, 18.456, 0.12345),
            value("Chad", 2000, 28.0, f64::NAN),
            value("Chad", 2001, f64::NAN, 0.5),
        ];

        let payload = build_payload(&rows);

        assert_eq!(payload.years, vec!["2000", "2001"]);
        assert_relative_eq!(payload.values.anom["2001"]["South Africa"], 0.123);
        assert_relative_eq!(payload.values.abs["2001"]["South Africa"], 18.46);
        assert!(!payload.values.anom.contains_key("2000"));
        assert!(!payload.values.abs["2001"].contains_key("Chad"));
        assert_eq!(payload.default_metric, "anom");
    }

    #[test]
    fn should_clip_absolute_values_at_percentiles() {
        let rows: Vec<YearlyValue> = (0..=100)
            .map(|i| value("A", 1900 + i, f64::from(i as i32), 0.0))
            .collect();

        let payload = build_payload(&rows);

        assert_eq!(payload.clips.anom, (-3.0, 3.0));
        assert_relative_eq!(payload.clips.abs.0, 1.0);
        assert_relative_eq!(payload.clips.abs.1, 99.0);
    }

    #[test]
    fn should_serialize_clips_as_pairs() {
        let payload = build_payload(&[value("A", 2000, 10.0, 0.1)]);
        let json: Value = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["clips"]["anom"], serde_json::json!([-3.0, 3.0]));
        assert_eq!(json["units"]["abs"], "Temperature (°C)");
    }

    #[test]
    fn should_embed_payload_and_aliases_in_page() {
        let payload = build_payload(&[value("A", 2000, 10.0, 0.1), value("A", 2001, 11.0, 0.2)]);

        let html = render_html(&payload).unwrap();

        assert!(!html.contains("{{"));
        assert!(html.contains("\"default_metric\":\"anom\""));
        assert!(html.contains("\"Antarctica\":null"));
        assert!(html.contains("max=\"1\""));
    }
}
