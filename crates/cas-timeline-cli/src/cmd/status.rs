//! `cas status`: where the timeline comes from and what is waiting to be
//! published.

use std::io::Write;
use std::path::Path;

use clap::Args;
use serde::Serialize;

use super::context::Workspace;
use crate::output::{OutputMode, pretty_kv, pretty_section, render};

/// Arguments for `cas status`.
#[derive(Args, Debug, Default)]
pub struct StatusArgs {
    /// Editing password; checks that it unlocks editing.
    #[arg(long, env = "CAS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PendingCounts {
    added: usize,
    deleted: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusOutput {
    mode: &'static str,
    source: String,
    school: String,
    last_updated: String,
    signature: Option<String>,
    items: usize,
    pending: PendingCounts,
    authorized: bool,
    publish_configured: bool,
    href: String,
}

fn write_pretty(s: &StatusOutput, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &s.school)?;
    pretty_kv(w, "mode", s.mode)?;
    pretty_kv(w, "source", &s.source)?;
    pretty_kv(w, "updated", if s.last_updated.is_empty() { "-" } else { &s.last_updated })?;
    pretty_kv(w, "signature", s.signature.as_deref().unwrap_or("-"))?;
    pretty_kv(w, "events", s.items.to_string())?;
    writeln!(w)?;
    pretty_section(w, "Editing")?;
    pretty_kv(w, "unlocked", if s.authorized { "yes" } else { "no" })?;
    pretty_kv(
        w,
        "pending",
        format!("{} added, {} deleted", s.pending.added, s.pending.deleted),
    )?;
    pretty_kv(
        w,
        "publish",
        if s.publish_configured { "configured" } else { "not configured" },
    )?;
    pretty_kv(w, "link", &s.href)
}

/// Execute `cas status`.
pub fn run_status(
    args: &StatusArgs,
    config_path: Option<&Path>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let mut ws = Workspace::load(config_path, project_root, output)?;
    ws.unlock(args.password.as_deref(), output)?;

    let session = &ws.session;
    let pending = session.pending_edits();
    let payload = StatusOutput {
        mode: session.store_mode().as_str(),
        source: ws.source.describe(),
        school: session.meta().school.clone(),
        last_updated: session.meta().last_updated.clone(),
        signature: session.reconciler().current().map(ToString::to_string),
        items: session.view().state().items.len(),
        pending: PendingCounts {
            added: pending.custom.len(),
            deleted: pending.deleted.len(),
        },
        authorized: session.is_authorized(),
        publish_configured: ws.publisher.is_some(),
        href: session.view().href(),
    };
    render(output, &payload, write_pretty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_status_has_sections() {
        let status = StatusOutput {
            mode: "local",
            source: "assets/timeline-data.json".into(),
            school: "King's College Murcia".into(),
            last_updated: String::new(),
            signature: Some("|0".into()),
            items: 0,
            pending: PendingCounts { added: 1, deleted: 2 },
            authorized: false,
            publish_configured: false,
            href: "https://cas-timeline.local/".into(),
        };
        let mut buf = Vec::new();
        write_pretty(&status, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("King's College Murcia\n"));
        assert!(text.contains("updated:     -\n"));
        assert!(text.contains("1 added, 2 deleted"));
        assert!(text.contains("not configured"));
    }
}
