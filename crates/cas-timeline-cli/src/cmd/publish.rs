//! `cas publish`: push the merged timeline to the public site.
//!
//! On success local edits are cleared. With `--wait` the command then polls
//! the public dataset until its signature matches what was sent.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use cas_timeline_core::TimelineError;
use cas_timeline_core::backend::DatasetSource;
use cas_timeline_core::reconcile::{PollSettings, PublishPoll, Signature};
use clap::Args;
use serde::Serialize;
use tracing::{debug, warn};

use super::context::Workspace;
use crate::output::{self, OutputMode, pretty_kv, render};

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Publish password.
    #[arg(long, env = "CAS_PUBLISH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Wait until the public site serves the published data.
    #[arg(long)]
    pub wait: bool,
}

#[derive(Debug, Serialize)]
struct PublishOutput {
    ok: bool,
    items: usize,
    signature: String,
    /// `None` unless `--wait` was given.
    #[serde(skip_serializing_if = "Option::is_none")]
    live: Option<bool>,
}

pub fn run_publish(
    args: &PublishArgs,
    config_path: Option<&Path>,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let mut ws = Workspace::load(config_path, project_root, output)?;
    let Some(publisher) = ws.publisher.clone() else {
        return Err(output::fail(output, TimelineError::PublishNotConfigured));
    };
    let password = args.password.as_deref().map(str::trim).unwrap_or_default();
    if password.is_empty() {
        return Err(output::fail(
            output,
            TimelineError::ValidationFailure("Enter the publish password.".to_string()),
        ));
    }

    let today = chrono::Local::now().date_naive();
    let payload = ws
        .session
        .export(today)
        .map_err(|err| output::fail(output, err))?;
    publisher
        .publish(&payload, password)
        .map_err(|err| output::fail(output, err))?;

    let settings = ws.config.poll.settings();
    ws.session
        .confirm_published(&payload, settings.publish_attempts)
        .map_err(|err| output::fail(output, err))?;

    let live = if args.wait {
        let source = Arc::clone(&ws.public_source);
        Some(wait_until_live(&mut ws, &source, settings))
    } else {
        None
    };

    let out = PublishOutput {
        ok: true,
        items: payload.items.len(),
        signature: payload.signature().to_string(),
        live,
    };
    render(output, &out, |p, w| {
        pretty_kv(w, "published", format!("{} event(s)", p.items))?;
        pretty_kv(w, "signature", &p.signature)?;
        match p.live {
            Some(true) => pretty_kv(w, "live", "Public site updated."),
            Some(false) => pretty_kv(w, "live", "Not visible yet. Check again later."),
            None => Ok(()),
        }
    })
}

/// Poll the public dataset until it matches or attempts run out.
fn wait_until_live(
    ws: &mut Workspace,
    source: &Arc<dyn DatasetSource>,
    settings: PollSettings,
) -> bool {
    loop {
        std::thread::sleep(settings.publish_interval);
        let fetched = match source.fetch_dataset() {
            Ok(dataset) => Some(Signature::of(&dataset)),
            Err(err) => {
                warn!(error = %err, "publish poll failed");
                None
            }
        };
        match ws.session.reconciler_mut().on_publish_poll(fetched.as_ref()) {
            PublishPoll::Continue => debug!("public site not updated yet"),
            PublishPoll::Matched { notice } => {
                debug!(notice, "publish visible");
                return true;
            }
            PublishPoll::Exhausted => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: PublishArgs,
    }

    #[test]
    fn publish_args_parse() {
        let w = Wrapper::parse_from(["cas", "--password", "pw", "--wait"]);
        assert_eq!(w.args.password.as_deref(), Some("pw"));
        assert!(w.args.wait);
    }
}
