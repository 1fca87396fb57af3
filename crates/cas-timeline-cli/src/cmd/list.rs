//! `cas list`: print the filtered, searched and sorted timeline.

use std::io::Write;
use std::path::Path;

use cas_timeline_core::render::{Card, MediaChip, RenderedTimeline};
use cas_timeline_core::state::StatePatch;
use cas_timeline_core::{Filter, SortOrder};
use clap::Args;
use serde::Serialize;

use super::context::Workspace;
use crate::output::{OutputMode, pretty_rule, render_mode};

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Category filter: All, Sustainability, Achievements, Community,
    /// Facilities, Academics or Creativity.
    #[arg(short, long)]
    pub filter: Option<Filter>,

    /// Case-insensitive search over title, summary, details and keywords.
    #[arg(short, long)]
    pub query: Option<String>,

    /// Chronological order: oldest or newest.
    #[arg(short, long)]
    pub sort: Option<SortOrder>,

    /// Shareable link (or bare `#fragment`) to open the view from. Explicit
    /// flags are applied on top.
    #[arg(long)]
    pub link: Option<String>,
}

#[derive(Debug, Serialize)]
struct ListOutput<'a> {
    href: String,
    filter: &'static str,
    sort: &'static str,
    query: &'a str,
    count: usize,
    groups: Vec<GroupOutput<'a>>,
}

#[derive(Debug, Serialize)]
struct GroupOutput<'a> {
    year: &'a str,
    items: Vec<CardOutput<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CardOutput<'a> {
    id: &'a str,
    date: &'a str,
    title: &'a str,
    summary: &'a str,
    categories: &'a [String],
    sustainability: bool,
    media: Vec<&'a str>,
    media_overflow: usize,
}

impl<'a> From<&'a Card> for CardOutput<'a> {
    fn from(card: &'a Card) -> Self {
        Self {
            id: &card.id,
            date: &card.date_label,
            title: &card.title,
            summary: &card.summary,
            categories: &card.categories,
            sustainability: card.sustainability,
            media: card.media.iter().map(|m: &MediaChip| m.label.as_str()).collect(),
            media_overflow: card.media_overflow,
        }
    }
}

fn build_output<'a>(
    rendered: &'a RenderedTimeline,
    href: String,
    filter: Filter,
    sort: SortOrder,
    query: &'a str,
) -> ListOutput<'a> {
    ListOutput {
        href,
        filter: filter.as_str(),
        sort: sort.as_str(),
        query,
        count: rendered.card_count(),
        groups: rendered
            .groups
            .iter()
            .map(|g| GroupOutput {
                year: &g.label,
                items: g.cards.iter().map(CardOutput::from).collect(),
            })
            .collect(),
    }
}

fn write_text(out: &ListOutput<'_>, w: &mut dyn Write) -> std::io::Result<()> {
    for group in &out.groups {
        for card in &group.items {
            writeln!(
                w,
                "{}\t{}\t{}\t{}",
                card.id,
                card.date,
                card.title,
                card.categories.join(",")
            )?;
        }
    }
    Ok(())
}

fn write_pretty(out: &ListOutput<'_>, w: &mut dyn Write) -> std::io::Result<()> {
    if out.groups.is_empty() {
        writeln!(w, "No matching events.")?;
        writeln!(w, "{}", out.href)?;
        return Ok(());
    }
    for group in &out.groups {
        writeln!(w, "{}", group.year)?;
        pretty_rule(w)?;
        for card in &group.items {
            let leaf = if card.sustainability { " 🌱" } else { "" };
            writeln!(w, "  {}{leaf}  ({})", card.title, card.date)?;
            if !card.summary.is_empty() {
                writeln!(w, "    {}", card.summary)?;
            }
            let mut chips = card.categories.join(" · ");
            for label in &card.media {
                chips.push_str(&format!("  [{label}]"));
            }
            if card.media_overflow > 0 {
                chips.push_str(&format!("  [+{}]", card.media_overflow));
            }
            writeln!(w, "    {chips}")?;
            writeln!(w, "    id: {}", card.id)?;
        }
        writeln!(w)?;
    }
    writeln!(w, "{} event(s)  {}", out.count, out.href)
}

pub fn run_list(
    args: &ListArgs,
    config_path: Option<&Path>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let mut ws = Workspace::load(config_path, project_root, output)?;
    apply_view_args(&mut ws, args);

    let rendered = ws.session.render();
    let state = ws.session.view().state();
    let payload = build_output(
        &rendered,
        ws.session.view().href(),
        state.filter,
        state.sort,
        &state.query,
    );
    render_mode(output, &payload, write_text, write_pretty)
}

/// Hydrate from `--link`, then apply explicit flags through the normal
/// update path.
pub fn apply_view_args(ws: &mut Workspace, args: &ListArgs) {
    let view = ws.session.view_mut();
    if let Some(link) = &args.link {
        view.navigate(link);
    }
    if let Some(filter) = args.filter {
        view.update(StatePatch::filter(filter));
    }
    if let Some(query) = &args.query {
        view.update(StatePatch::query(query.clone()));
    }
    if let Some(sort) = args.sort {
        view.update(StatePatch::sort(sort));
    }
}
