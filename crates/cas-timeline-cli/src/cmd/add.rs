//! `cas add`: author a new timeline event.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use cas_timeline_core::authoring::DraftInput;
use cas_timeline_core::{Category, Outcome};
use clap::Args;
use serde::Serialize;

use super::context::Workspace;
use crate::output::{self, OutputMode, pretty_kv, render};

#[derive(Args, Debug)]
pub struct AddArgs {
    #[arg(long)]
    pub title: String,

    /// Event date as YYYY-MM-DD.
    #[arg(long)]
    pub date: String,

    #[arg(long)]
    pub summary: String,

    #[arg(long)]
    pub details: String,

    /// Category; repeat for several.
    #[arg(short, long = "category", required = true)]
    pub categories: Vec<Category>,

    /// Image URLs, comma- or newline-separated.
    #[arg(long, default_value = "")]
    pub images: String,

    /// Image file to upload; repeat for several.
    #[arg(long = "image-file")]
    pub image_files: Vec<PathBuf>,

    /// Video URLs, comma- or newline-separated.
    #[arg(long, default_value = "")]
    pub videos: String,

    /// Link as `label | url`; repeat for several.
    #[arg(long = "link")]
    pub links: Vec<String>,

    /// Keywords, comma-separated.
    #[arg(long, default_value = "")]
    pub keywords: String,

    /// Editing password.
    #[arg(long, env = "CAS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl AddArgs {
    fn draft(&self, uploaded_images: Vec<String>) -> DraftInput {
        DraftInput {
            title: self.title.clone(),
            date: self.date.clone(),
            summary: self.summary.clone(),
            details: self.details.clone(),
            categories: self.categories.clone(),
            images: self.images.clone(),
            videos: self.videos.clone(),
            links: self.links.join("\n"),
            keywords: self.keywords.clone(),
            uploaded_images,
        }
    }
}

#[derive(Debug, Serialize)]
struct AddOutput {
    ok: bool,
    id: Option<String>,
    title: String,
    pending_publish: bool,
}

pub fn run_add(
    args: &AddArgs,
    config_path: Option<&Path>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let mut ws = Workspace::load(config_path, project_root, output)?;
    ws.unlock(args.password.as_deref(), output)?;

    let mut uploaded = Vec::with_capacity(args.image_files.len());
    for path in &args.image_files {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
        let url = ws
            .session
            .upload_image(&bytes, &filename)
            .map_err(|err| output::fail(output, err))?;
        uploaded.push(url);
    }

    let (outcome, item) = ws
        .session
        .create_event(&args.draft(uploaded))
        .map_err(|err| output::fail(output, err))?;

    let payload = AddOutput {
        ok: true,
        id: item.map(|i| i.id),
        title: args.title.trim().to_string(),
        pending_publish: outcome == Outcome::Updated,
    };
    render(output, &payload, |p, w| {
        pretty_kv(w, "added", &p.title)?;
        if let Some(id) = &p.id {
            pretty_kv(w, "id", id)?;
        }
        if p.pending_publish {
            pretty_kv(w, "note", "Saved on this device. Publish to update the public site.")?;
        }
        Ok(())
    })
}
