//! `cas export`: write the merged timeline as a dataset file.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;

use super::context::Workspace;
use crate::output::{self, OutputMode, pretty_kv, render};

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output JSON path (defaults to stdout).
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportSummary {
    path: String,
    items: usize,
    last_updated: String,
}

pub fn run_export(
    args: &ExportArgs,
    config_path: Option<&Path>,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let ws = Workspace::load(config_path, project_root, output)?;
    let today = chrono::Local::now().date_naive();
    let payload = ws
        .session
        .export(today)
        .map_err(|err| output::fail(output, err))?;
    let json = payload
        .to_pretty_json()
        .context("failed to serialize timeline export")?;

    let Some(path) = args.out.as_ref() else {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "{json}")?;
        return Ok(());
    };

    let file = File::create(path)
        .with_context(|| format!("failed to create output file {}", path.display()))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "{json}")?;
    out.flush()
        .with_context(|| format!("failed to write {}", path.display()))?;

    let summary = ExportSummary {
        path: path.display().to_string(),
        items: payload.items.len(),
        last_updated: payload.last_updated,
    };
    render(output, &summary, |s, w| {
        pretty_kv(w, "exported", &s.path)?;
        pretty_kv(w, "items", s.items.to_string())?;
        pretty_kv(w, "updated", &s.last_updated)
    })
}
