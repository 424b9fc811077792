use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use clap::Args;
use tracing::info;

use crate::{
    cli::create_spinner,
    pipeline::globe::{build_payload, read_yearly, render_html},
    settings::Settings,
};

#[derive(Debug, Args)]
pub struct GlobeArgs {
    /// Master yearly table written by `yearly`
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Payload JSON [default: globe_payload.json]
    #[arg(long)]
    pub out_json: Option<PathBuf>,

    /// Self-contained globe page
    #[arg(long)]
    pub out_html: Option<PathBuf>,
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text).with_context(|| format!("cannot write {}", path.display()))
}

pub fn globe(args: &GlobeArgs, settings: &Settings) -> Result<String> {
    let input = args.input.as_ref().unwrap_or(&settings.globe.input);
    let out_json = args.out_json.as_ref().unwrap_or(&settings.globe.out_json);

    let bar = create_spinner("Building globe payload...".to_string());
    let rows = read_yearly(input)?;
    if rows.is_empty() {
        return Err(anyhow!("{} holds no yearly rows", input.display()));
    }
    let payload = build_payload(&rows);
    bar.finish_with_message(format!("Payload covers {} year(s)", payload.years.len()));

    write_text(out_json, &serde_json::to_string(&payload)?)?;
    info!(path = %out_json.display(), "payload saved");

    if let Some(out_html) = &args.out_html {
        write_text(out_html, &render_html(&payload)?)?;
        info!(path = %out_html.display(), "page saved");
        return Ok(format!(
            "Globe saved to `{}` and `{}`",
            out_json.display(),
            out_html.display()
        ));
    }

    Ok(format!("Globe payload saved to `{}`", out_json.display()))
}

// -- Tests -------------------------------------------------------------------
