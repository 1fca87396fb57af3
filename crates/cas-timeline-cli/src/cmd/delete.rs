//! `cas delete`: remove an event from the timeline.
//!
//! In local mode a base event is tombstoned and an event authored on this
//! device is dropped; both wait for the next publish. In server mode the
//! server applies the deletion directly.

use std::io::{IsTerminal, Write};
use std::path::Path;

use cas_timeline_core::{Outcome, TimelineError};
use clap::Args;
use serde::Serialize;

use super::context::Workspace;
use crate::output::{self, OutputMode, pretty_kv, render};

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Id of the event to delete.
    pub id: String,

    /// Skip the interactive confirmation prompt.
    #[arg(long)]
    pub force: bool,

    /// Editing password.
    #[arg(long, env = "CAS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeleteOutput {
    id: String,
    ok: bool,
    pending_publish: bool,
}

fn confirm_delete(id: &str, title: &str) -> anyhow::Result<bool> {
    if !std::io::stdin().is_terminal() || !std::io::stdout().is_terminal() {
        return Ok(true);
    }

    eprint!("Delete {id} '{title}'? [y/N] ");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let answer = input.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

pub fn run_delete(
    args: &DeleteArgs,
    config_path: Option<&Path>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let mut ws = Workspace::load(config_path, project_root, output)?;
    ws.unlock(args.password.as_deref(), output)?;

    let id = args.id.trim();
    let title = match ws.session.find_item(id) {
        Some(item) => item.title.clone(),
        None => return Err(output::fail(output, TimelineError::NotFound(id.to_string()))),
    };

    if !args.force && !output.is_json() && !confirm_delete(id, &title)? {
        anyhow::bail!("deletion of '{id}' cancelled");
    }

    let outcome = ws
        .session
        .delete_event(id)
        .map_err(|err| output::fail(output, err))?;

    let payload = DeleteOutput {
        id: id.to_string(),
        ok: true,
        pending_publish: outcome == Outcome::Updated,
    };
    render(output, &payload, |p, w| {
        pretty_kv(w, "deleted", &p.id)?;
        if p.pending_publish {
            pretty_kv(w, "note", "Removed on this device. Publish to update the public site.")?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: DeleteArgs,
    }

    #[test]
    fn delete_args_parse() {
        let w = Wrapper::parse_from(["cas", "evt-1", "--force", "--password", "admin"]);
        assert_eq!(w.args.id, "evt-1");
        assert!(w.args.force);
        assert_eq!(w.args.password.as_deref(), Some("admin"));
    }
}
