//! Optional TOML settings with per-stage defaults.
//!
//! Looked up at `--config` or `<config_dir>/climwiz/climwiz.toml`. Command
//! line flags win over file values, which win over the built-in defaults.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::pipeline::{
    climatology::ClimatologyParams, cutoffs::SetupParams, outliers::OutlierParams,
    yearly::YearlyParams,
};

pub const DEFAULT_FETCH_URL: &str =
    "https://datas.carbonmonitor.org/API/downloadFullDataset.php?source=carbon_global";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub fetch: FetchSettings,
    pub yearly: YearlyParams,
    pub anomalies: ClimatologyParams,
    pub outliers: OutlierParams,
    pub setup: SetupParams,
    pub globe: GlobeSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSettings {
    pub url: String,
    pub out_dir: PathBuf,
    pub timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_FETCH_URL.to_string(),
            out_dir: PathBuf::from("dataset_emission"),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobeSettings {
    /// Master yearly table read when `--input` is not given.
    pub input: PathBuf,
    pub out_json: PathBuf,
}

impl Default for GlobeSettings {
    fn default() -> Self {
        Self {
            input: PathBuf::from("temp_per_country/yearly_temp_aggregated/country_year.csv"),
            out_json: PathBuf::from("globe_payload.json"),
        }
    }
}

impl Settings {
    /// Loads `explicit` if given (it must exist), else the default location
    /// if a file is there, else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match default_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading settings");
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read settings file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid settings file {}", path.display()))
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("climwiz").join("climwiz.toml"))
}

// -- Tests -------------------------------------------------------------------
