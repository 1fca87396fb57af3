//! Interactive timeline browser.
//!
//! One loop owns the session. Dataset fetches and publishes run on worker
//! threads and report back as [`NetEvent`]s; the scroll-spy reports over its
//! own channel. Both are drained at the top of every iteration, then due
//! timers run, then at most one render is presented.
//!
//! Key bindings: `/` search, `f`/`F` filter, `s` sort, `c` clear, `j`/`k`
//! move, `g` open by id, `L` paste a link, `a` add, `d` delete, `u` unlock,
//! `e` export, `p` publish, `m` motion, `r` retry, `q` quit.

use std::io::{self, Stdout};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Instant;

use anyhow::{Context as _, Result};
use cas_timeline_core::backend::{DatasetSource, Publisher};
use cas_timeline_core::config::Config;
use cas_timeline_core::export::ExportDataset;
use cas_timeline_core::model::{Dataset, Rgb};
use cas_timeline_core::reconcile::{PublishPoll, Signature, Verdict};
use cas_timeline_core::render::{RenderedTimeline, Screen, Transition};
use cas_timeline_core::schedule::{Scheduler, Task};
use cas_timeline_core::spy::{self, HeaderPosition, SpyEvent, Viewport, YearObserver};
use cas_timeline_core::state::StatePatch;
use cas_timeline_core::{Filter, Outcome, TimelineError, TimelineSession};
use clap::Args;
use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use tracing::{debug, info, warn};

use super::add_dialog::{AddDialog, AddSubmission, DialogAction};
use crate::cmd::context::Workspace;

/// File name used by the export key.
const EXPORT_FILE: &str = "timeline-data.json";
/// Rows per card, excluding the separator.
const CARD_HEIGHT: usize = 3;

/// Arguments for `cas browse`.
#[derive(Args, Debug, Default)]
pub struct BrowseArgs {
    /// Shareable link (or bare `#fragment`) to open.
    #[arg(long)]
    pub link: Option<String>,

    /// Swap views without the cross-fade.
    #[arg(long)]
    pub reduce_motion: bool,
}

// ---------------------------------------------------------------------------
// Messages and modes
// ---------------------------------------------------------------------------

/// Results coming back from worker threads.
#[derive(Debug)]
enum NetEvent {
    Loaded(Result<Dataset, TimelineError>),
    UpdateCheck(Result<Dataset, TimelineError>),
    PublishPoll(Result<Dataset, TimelineError>),
    Published {
        payload: ExportDataset,
        result: Result<(), TimelineError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptKind {
    Link,
    OpenId,
    Unlock,
    Publish,
}

impl PromptKind {
    const fn label(self) -> &'static str {
        match self {
            Self::Link => "Open link",
            Self::OpenId => "Go to id",
            Self::Unlock => "Teacher password",
            Self::Publish => "Publish password",
        }
    }

    const fn masked(self) -> bool {
        matches!(self, Self::Unlock | Self::Publish)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Prompt {
    kind: PromptKind,
    value: String,
}

#[derive(Debug)]
enum Mode {
    Browse,
    Search,
    Prompt(Prompt),
    ConfirmDelete { id: String, title: String },
    Add(Box<AddDialog>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StatusLine {
    text: String,
    tone: Tone,
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Where a card starts in the laid-out content.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CardSpan {
    id: String,
    line: usize,
}

impl CardSpan {
    const fn rows(&self) -> Range<usize> {
        self.line..self.line + CARD_HEIGHT
    }
}

/// The shown timeline flattened into terminal lines.
#[derive(Debug, Default)]
struct TimelineLayout {
    lines: Vec<Line<'static>>,
    headers: Vec<HeaderPosition>,
    cards: Vec<CardSpan>,
}

const fn accent(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

fn layout_timeline(timeline: &RenderedTimeline) -> TimelineLayout {
    let mut out = TimelineLayout::default();
    for group in &timeline.groups {
        out.headers.push(HeaderPosition {
            label: group.label.clone(),
            line: out.lines.len(),
        });
        out.lines.push(Line::from(Span::styled(
            format!("── {} ──", group.label),
            Style::default().add_modifier(Modifier::BOLD),
        )));

        for card in &group.cards {
            out.cards.push(CardSpan {
                id: card.id.clone(),
                line: out.lines.len(),
            });
            let color = accent(card.accent);

            let mut title = vec![
                Span::raw("  "),
                Span::styled(
                    card.title.clone(),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
            ];
            if card.sustainability {
                title.push(Span::raw(" 🌱"));
            }
            title.push(Span::styled(
                format!("  {}", card.date_label),
                Style::default().fg(Color::Gray),
            ));
            out.lines.push(Line::from(title));

            out.lines
                .push(Line::from(vec![Span::raw("  "), Span::raw(card.summary.clone())]));

            let mut chips = vec![
                Span::raw("  "),
                Span::styled(card.categories.join(" · "), Style::default().fg(color)),
            ];
            for chip in &card.media {
                chips.push(Span::styled(
                    format!("  [{}]", chip.label),
                    Style::default().fg(Color::Cyan),
                ));
            }
            if card.media_overflow > 0 {
                chips.push(Span::styled(
                    format!("  [+{}]", card.media_overflow),
                    Style::default().fg(Color::Cyan),
                ));
            }
            if card.deletable {
                chips.push(Span::styled("  d: delete", Style::default().fg(Color::DarkGray)));
            }
            out.lines.push(Line::from(chips));
            out.lines.push(Line::default());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    session: TimelineSession,
    source: Arc<dyn DatasetSource>,
    public_source: Arc<dyn DatasetSource>,
    publisher: Option<Arc<dyn Publisher>>,
    config: Config,
    export_dir: PathBuf,
    screen: Screen,
    layout: TimelineLayout,
    observer: YearObserver,
    spy_rx: Receiver<SpyEvent>,
    net_tx: Sender<NetEvent>,
    net_rx: Receiver<NetEvent>,
    scheduler: Scheduler,
    mode: Mode,
    search_input: String,
    scroll: usize,
    viewport_height: usize,
    cursor: usize,
    loading: bool,
    status: Option<StatusLine>,
    needs_redraw: bool,
    quit: bool,
}

impl App {
    fn new(ws: Workspace, reduce_motion: bool, export_dir: PathBuf) -> Self {
        let (observer, spy_rx) = spy::channel();
        let (net_tx, net_rx) = mpsc::channel();
        let screen = Screen::new(reduce_motion, ws.config.ui.transition());
        Self {
            session: ws.session,
            source: ws.source,
            public_source: ws.public_source,
            publisher: ws.publisher,
            config: ws.config,
            export_dir,
            screen,
            layout: TimelineLayout::default(),
            observer,
            spy_rx,
            net_tx,
            net_rx,
            scheduler: Scheduler::new(),
            mode: Mode::Browse,
            search_input: String::new(),
            scroll: 0,
            viewport_height: 0,
            cursor: 0,
            loading: false,
            status: None,
            needs_redraw: true,
            quit: false,
        }
    }

    /// Hydrate from `link` (or the empty location) and start the first load.
    fn start(&mut self, link: Option<&str>) {
        self.session.refresh_authorization();
        match link {
            Some(link) => self.session.view_mut().navigate(link),
            None => self.session.view_mut().hydrate_from_location(false),
        }
        self.search_input = self.session.view().state().query.clone();
        self.request_load();
    }

    fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enable raw mode")?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let tick = self.config.ui.tick();
        loop {
            self.step(Instant::now());

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }
            if self.quit {
                break;
            }

            let timeout = self
                .scheduler
                .next_delay(Instant::now())
                .map_or(tick, |delay| delay.min(tick));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        self.handle_key(key, Instant::now());
                    }
                    Event::Resize(..) => self.needs_redraw = true,
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// One loop iteration minus input: drain channels, run due timers and
    /// present the coalesced render.
    fn step(&mut self, now: Instant) {
        while let Ok(message) = self.net_rx.try_recv() {
            self.handle_net(message, now);
        }
        while let Ok(SpyEvent::YearVisible(year)) = self.spy_rx.try_recv() {
            if self.session.view_mut().set_anchor_from_spy(&year) {
                debug!(%year, "year anchor moved");
                self.needs_redraw = true;
            }
        }
        for task in self.scheduler.take_due(now) {
            self.run_task(task, now);
        }
        self.flush_render(now);
    }

    // -----------------------------------------------------------------------
    // Workers
    // -----------------------------------------------------------------------

    fn spawn_fetch(
        &self,
        source: &Arc<dyn DatasetSource>,
        wrap: fn(Result<Dataset, TimelineError>) -> NetEvent,
    ) {
        let tx = self.net_tx.clone();
        let source = Arc::clone(source);
        thread::spawn(move || {
            // The loop may have exited.
            let _ = tx.send(wrap(source.fetch_dataset()));
        });
    }

    fn request_load(&mut self) {
        self.loading = true;
        self.needs_redraw = true;
        self.spawn_fetch(&self.source, NetEvent::Loaded);
    }

    fn handle_net(&mut self, message: NetEvent, now: Instant) {
        let settings = self.config.poll.settings();
        self.needs_redraw = true;
        match message {
            NetEvent::Loaded(Ok(dataset)) => {
                self.loading = false;
                self.session.apply_dataset(dataset);
                if self.session.store_mode().polls_for_updates() {
                    self.scheduler
                        .schedule_if_idle(Task::UpdatePoll, settings.update_interval, now);
                }
            }
            NetEvent::Loaded(Err(err)) => {
                self.loading = false;
                self.session.apply_fetch_failure(&err);
                self.set_status(error_text(&err), Tone::Error, now);
            }
            NetEvent::UpdateCheck(result) => {
                match result {
                    Ok(dataset) => {
                        let verdict = self
                            .session
                            .reconciler()
                            .on_update_check(&Signature::of(&dataset), self.session.has_local_edits());
                        if let Verdict::Reload { notice } = verdict {
                            self.set_status(notice, Tone::Info, now);
                            self.scheduler.schedule(Task::Reload, settings.reload_delay, now);
                        }
                    }
                    Err(err) => warn!(%err, "update check failed"),
                }
                self.scheduler
                    .schedule(Task::UpdatePoll, settings.update_interval, now);
            }
            NetEvent::PublishPoll(result) => {
                let fetched = match result {
                    Ok(dataset) => Some(Signature::of(&dataset)),
                    Err(err) => {
                        warn!(%err, "publish poll failed");
                        None
                    }
                };
                match self.session.reconciler_mut().on_publish_poll(fetched.as_ref()) {
                    PublishPoll::Continue => {
                        self.scheduler
                            .schedule(Task::PublishPoll, settings.publish_interval, now);
                    }
                    PublishPoll::Matched { notice } => {
                        self.set_status(notice, Tone::Success, now);
                        self.scheduler.schedule(Task::Reload, settings.reload_delay, now);
                    }
                    PublishPoll::Exhausted => self.set_status(
                        "Published, but the public site has not updated yet.",
                        Tone::Info,
                        now,
                    ),
                }
            }
            NetEvent::Published { payload, result } => match result.and_then(|()| {
                self.session
                    .confirm_published(&payload, settings.publish_attempts)
            }) {
                Ok(()) => {
                    info!(items = payload.items.len(), "timeline published");
                    self.set_status(
                        "Published. Waiting for the public site to update…",
                        Tone::Success,
                        now,
                    );
                    self.scheduler
                        .schedule(Task::PublishPoll, settings.publish_interval, now);
                }
                Err(err) => self.set_status(error_text(&err), Tone::Error, now),
            },
        }
    }

    fn run_task(&mut self, task: Task, now: Instant) {
        match task {
            Task::SearchDebounce => self.apply_search(),
            Task::TransitionSwap => {
                if self.screen.complete_swap() {
                    self.after_swap();
                }
            }
            Task::UpdatePoll => {
                let loaded = self.session.view().state().loaded;
                if self.session.store_mode().polls_for_updates()
                    && self
                        .session
                        .reconciler()
                        .should_check_updates(loaded, self.session.has_local_edits())
                {
                    self.spawn_fetch(&self.source, NetEvent::UpdateCheck);
                } else {
                    let interval = self.config.poll.settings().update_interval;
                    self.scheduler.schedule(Task::UpdatePoll, interval, now);
                }
            }
            Task::PublishPoll => {
                if self.session.reconciler().publish_poll_active() {
                    self.spawn_fetch(&self.public_source, NetEvent::PublishPoll);
                }
            }
            Task::Reload => self.request_load(),
            Task::StatusExpire => {
                self.status = None;
                self.needs_redraw = true;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Rendering pipeline
    // -----------------------------------------------------------------------

    fn flush_render(&mut self, now: Instant) {
        let Some(request) = self.session.view_mut().take_render_request() else {
            return;
        };
        let next = self.session.render();
        match self.screen.present(next, request.is_immediate()) {
            Transition::Immediate => {
                self.scheduler.cancel(Task::TransitionSwap);
                self.after_swap();
            }
            Transition::CrossFade(duration) => {
                self.observer.disconnect();
                self.scheduler.schedule(Task::TransitionSwap, duration, now);
            }
        }
        self.needs_redraw = true;
    }

    /// The shown view changed: lay it out, re-attach the spy and honor a
    /// pending year scroll.
    fn after_swap(&mut self) {
        self.layout = layout_timeline(self.screen.shown());
        if self.layout.headers.is_empty() {
            self.observer.disconnect();
        } else {
            self.observer.observe(self.layout.headers.clone());
        }

        if self.session.view().state().loaded {
            if let Some(year) = self.session.view_mut().take_pending_year_scroll() {
                if let Some(line) = self.observer.line_of(&year) {
                    debug!(%year, line, "scrolling to linked year");
                    self.scroll = line;
                }
            }
        }
        self.clamp_scroll();
        self.sync_cursor_to_scroll();
        self.notify_viewport();
        self.needs_redraw = true;
    }

    fn max_scroll(&self) -> usize {
        self.layout.lines.len().saturating_sub(self.viewport_height.max(1))
    }

    fn clamp_scroll(&mut self) {
        self.scroll = self.scroll.min(self.max_scroll());
    }

    fn notify_viewport(&mut self) {
        self.observer.on_viewport(Viewport {
            offset: self.scroll,
            height: self.viewport_height,
        });
    }

    /// Put the cursor on the first card at or below the top of the view.
    fn sync_cursor_to_scroll(&mut self) {
        let cards = &self.layout.cards;
        self.cursor = cards
            .iter()
            .position(|c| c.line >= self.scroll)
            .unwrap_or_else(|| cards.len().saturating_sub(1));
    }

    fn ensure_cursor_visible(&mut self) {
        let Some(rows) = self.layout.cards.get(self.cursor).map(CardSpan::rows) else {
            return;
        };
        let height = self.viewport_height.max(1);
        if rows.start < self.scroll {
            // Keep the year header above the first card of a group in view.
            self.scroll = rows.start.saturating_sub(1);
        } else if rows.end > self.scroll + height {
            self.scroll = rows.end.saturating_sub(height);
        }
        self.clamp_scroll();
    }

    fn scroll_to(&mut self, offset: usize) {
        self.scroll = offset;
        self.clamp_scroll();
        self.sync_cursor_to_scroll();
        self.notify_viewport();
    }

    fn move_cursor(&mut self, forward: bool) {
        let len = self.layout.cards.len();
        if len == 0 {
            return;
        }
        self.cursor = if forward {
            (self.cursor + 1).min(len - 1)
        } else {
            self.cursor.saturating_sub(1)
        };
        self.ensure_cursor_visible();
        self.notify_viewport();
    }

    fn set_status(&mut self, text: impl Into<String>, tone: Tone, now: Instant) {
        self.status = Some(StatusLine {
            text: text.into(),
            tone,
        });
        self.scheduler
            .schedule(Task::StatusExpire, self.config.ui.status_ttl(), now);
        self.needs_redraw = true;
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit = true;
            return;
        }
        self.needs_redraw = true;
        match std::mem::replace(&mut self.mode, Mode::Browse) {
            Mode::Browse => self.handle_browse_key(key, now),
            Mode::Search => self.handle_search_key(key, now),
            Mode::Prompt(prompt) => self.handle_prompt_key(prompt, key, now),
            Mode::ConfirmDelete { id, title } => self.handle_confirm_key(&id, &title, key, now),
            Mode::Add(dialog) => self.handle_add_key(dialog, key, now),
        }
    }

    fn handle_browse_key(&mut self, key: KeyEvent, now: Instant) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
            KeyCode::Char('/') => self.mode = Mode::Search,
            KeyCode::Char('f') => {
                let next = self.session.view().state().filter.next();
                self.session.view_mut().update(StatePatch::filter(next));
            }
            KeyCode::Char('F') => {
                let prev = self.session.view().state().filter.prev();
                self.session.view_mut().update(StatePatch::filter(prev));
            }
            KeyCode::Char('s') => {
                let sort = self.session.view().state().sort.toggle();
                self.session.view_mut().update(StatePatch::sort(sort));
            }
            KeyCode::Char('c') => self.clear_filters(now),
            KeyCode::Char('r') => self.retry(now),
            KeyCode::Char('L') => self.open_prompt(PromptKind::Link),
            KeyCode::Char('g') => self.open_prompt(PromptKind::OpenId),
            KeyCode::Char('a') => self.open_add(now),
            KeyCode::Char('d') => self.confirm_delete(now),
            KeyCode::Char('e') => self.export(now),
            KeyCode::Char('p') => self.open_publish(now),
            KeyCode::Char('u') => self.toggle_unlock(now),
            KeyCode::Char('m') => self.toggle_motion(now),
            KeyCode::Char('j') | KeyCode::Down => self.move_cursor(true),
            KeyCode::Char('k') | KeyCode::Up => self.move_cursor(false),
            KeyCode::PageDown | KeyCode::Char(' ') => {
                self.scroll_to(self.scroll + self.viewport_height.max(1));
            }
            KeyCode::PageUp => {
                self.scroll_to(self.scroll.saturating_sub(self.viewport_height.max(1)));
            }
            KeyCode::Home => self.scroll_to(0),
            KeyCode::End => self.scroll_to(self.max_scroll()),
            _ => {}
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent, now: Instant) {
        let debounce = self.config.ui.search_debounce();
        match key.code {
            KeyCode::Enter => {
                self.scheduler.cancel(Task::SearchDebounce);
                self.apply_search();
            }
            // Leaves the field; a pending debounce still fires.
            KeyCode::Esc => {}
            KeyCode::Backspace => {
                self.search_input.pop();
                self.scheduler.schedule(Task::SearchDebounce, debounce, now);
                self.mode = Mode::Search;
            }
            KeyCode::Char(c) => {
                self.search_input.push(c);
                self.scheduler.schedule(Task::SearchDebounce, debounce, now);
                self.mode = Mode::Search;
            }
            _ => self.mode = Mode::Search,
        }
    }

    fn apply_search(&mut self) {
        if self.session.view().state().query == self.search_input {
            return;
        }
        self.session
            .view_mut()
            .update(StatePatch::query(self.search_input.clone()));
    }

    fn open_prompt(&mut self, kind: PromptKind) {
        self.mode = Mode::Prompt(Prompt {
            kind,
            value: String::new(),
        });
    }

    fn handle_prompt_key(&mut self, mut prompt: Prompt, key: KeyEvent, now: Instant) {
        match key.code {
            KeyCode::Esc => {}
            KeyCode::Enter => self.submit_prompt(prompt, now),
            KeyCode::Backspace => {
                prompt.value.pop();
                self.mode = Mode::Prompt(prompt);
            }
            KeyCode::Char(c) => {
                prompt.value.push(c);
                self.mode = Mode::Prompt(prompt);
            }
            _ => self.mode = Mode::Prompt(prompt),
        }
    }

    fn submit_prompt(&mut self, prompt: Prompt, now: Instant) {
        let value = prompt.value.trim();
        match prompt.kind {
            PromptKind::Link => {
                if value.is_empty() {
                    return;
                }
                self.scheduler.cancel(Task::SearchDebounce);
                self.session.view_mut().navigate(value);
                self.search_input = self.session.view().state().query.clone();
                self.set_status("Opened shared view.", Tone::Info, now);
            }
            PromptKind::OpenId => self.open_by_id(value, now),
            PromptKind::Unlock => match self.session.login(value) {
                Ok(()) => self.set_status("Editing unlocked.", Tone::Success, now),
                Err(err) => self.set_status(error_text(&err), Tone::Error, now),
            },
            PromptKind::Publish => self.start_publish(value, now),
        }
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    fn clear_filters(&mut self, now: Instant) {
        self.scheduler.cancel(Task::SearchDebounce);
        self.search_input.clear();
        self.session.view_mut().reset();
        self.set_status("Filters cleared.", Tone::Info, now);
    }

    fn retry(&mut self, now: Instant) {
        if self.loading {
            return;
        }
        self.set_status("Reloading…", Tone::Info, now);
        self.request_load();
    }

    fn open_by_id(&mut self, id: &str, now: Instant) {
        if id.is_empty() {
            return;
        }
        if let Some(idx) = self.layout.cards.iter().position(|c| c.id == id) {
            self.cursor = idx;
            self.ensure_cursor_visible();
            self.notify_viewport();
        } else if self.session.find_item(id).is_some() {
            self.set_status(
                "That event is hidden by the current filter or search.",
                Tone::Info,
                now,
            );
        } else {
            self.set_status(format!("No event with id '{id}'."), Tone::Error, now);
        }
    }

    fn require_unlocked(&mut self, now: Instant) -> bool {
        if self.session.is_authorized() {
            return true;
        }
        self.set_status("Unlock editing first (press u).", Tone::Error, now);
        false
    }

    fn toggle_unlock(&mut self, now: Instant) {
        if self.session.is_authorized() {
            self.session.logout();
            self.set_status("Editing locked.", Tone::Info, now);
        } else {
            self.open_prompt(PromptKind::Unlock);
        }
    }

    fn toggle_motion(&mut self, now: Instant) {
        let reduce = !self.screen.reduces_motion();
        self.screen.set_reduce_motion(reduce);
        let text = if reduce {
            "Reduced motion on."
        } else {
            "Reduced motion off."
        };
        self.set_status(text, Tone::Info, now);
    }

    fn open_add(&mut self, now: Instant) {
        if self.require_unlocked(now) {
            self.mode = Mode::Add(Box::new(AddDialog::new()));
        }
    }

    fn handle_add_key(&mut self, mut dialog: Box<AddDialog>, key: KeyEvent, now: Instant) {
        match dialog.handle_key(key) {
            None => self.mode = Mode::Add(dialog),
            Some(DialogAction::Cancel) => {}
            Some(DialogAction::Submit(submission)) => {
                if let Err(message) = self.submit_event(submission, now) {
                    dialog.set_error(message);
                    self.mode = Mode::Add(dialog);
                }
            }
        }
    }

    /// Upload attached files, then create the event. Returns the message to
    /// show in the dialog on failure.
    fn submit_event(&mut self, submission: AddSubmission, now: Instant) -> Result<(), String> {
        let mut input = submission.input;
        input.validate().map_err(|err| err.to_string())?;

        for path in &submission.image_files {
            let bytes = std::fs::read(path)
                .map_err(|err| format!("Cannot read {}: {err}", path.display()))?;
            let filename = path
                .file_name()
                .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
            let url = self
                .session
                .upload_image(&bytes, &filename)
                .map_err(|err| err.to_string())?;
            input.uploaded_images.push(url);
        }

        let (outcome, _) = self
            .session
            .create_event(&input)
            .map_err(|err| err.to_string())?;
        self.after_edit(&outcome, "Event added.", now);
        Ok(())
    }

    fn confirm_delete(&mut self, now: Instant) {
        if !self.require_unlocked(now) {
            return;
        }
        let Some(span) = self.layout.cards.get(self.cursor) else {
            return;
        };
        let title = self
            .session
            .find_item(&span.id)
            .map(|item| item.title.clone())
            .unwrap_or_default();
        self.mode = Mode::ConfirmDelete {
            id: span.id.clone(),
            title,
        };
    }

    fn handle_confirm_key(&mut self, id: &str, title: &str, key: KeyEvent, now: Instant) {
        if !matches!(key.code, KeyCode::Char('y' | 'Y')) {
            self.set_status("Delete cancelled.", Tone::Info, now);
            return;
        }
        match self.session.delete_event(id) {
            Ok(outcome) => self.after_edit(&outcome, &format!("Deleted '{title}'."), now),
            Err(err) => self.set_status(error_text(&err), Tone::Error, now),
        }
    }

    fn after_edit(&mut self, outcome: &Outcome, done: &str, now: Instant) {
        match outcome {
            Outcome::Updated => self.set_status(
                format!("{done} Publish to update the public site."),
                Tone::Success,
                now,
            ),
            Outcome::ReloadRequired => {
                self.set_status(done, Tone::Success, now);
                self.request_load();
            }
        }
    }

    fn export(&mut self, now: Instant) {
        let today = chrono::Local::now().date_naive();
        let path = self.export_dir.join(EXPORT_FILE);
        let result = self
            .session
            .export(today)
            .map_err(|err| error_text(&err))
            .and_then(|payload| {
                let json = payload.to_pretty_json().map_err(|err| err.to_string())?;
                std::fs::write(&path, json + "\n")
                    .map_err(|err| format!("Cannot write {}: {err}", path.display()))?;
                Ok(payload.items.len())
            });
        match result {
            Ok(count) => {
                info!(path = %path.display(), count, "timeline exported");
                self.set_status(
                    format!("Exported {count} event(s) to {}.", path.display()),
                    Tone::Success,
                    now,
                );
            }
            Err(message) => self.set_status(message, Tone::Error, now),
        }
    }

    fn open_publish(&mut self, now: Instant) {
        if self.publisher.is_none() {
            self.set_status(error_text(&TimelineError::PublishNotConfigured), Tone::Error, now);
            return;
        }
        self.open_prompt(PromptKind::Publish);
    }

    fn start_publish(&mut self, password: &str, now: Instant) {
        let Some(publisher) = self.publisher.clone() else {
            return;
        };
        if password.is_empty() {
            self.set_status("Enter the publish password.", Tone::Error, now);
            return;
        }
        let payload = match self.session.export(chrono::Local::now().date_naive()) {
            Ok(payload) => payload,
            Err(err) => {
                self.set_status(error_text(&err), Tone::Error, now);
                return;
            }
        };
        self.set_status("Publishing…", Tone::Info, now);
        let tx = self.net_tx.clone();
        let password = password.to_string();
        thread::spawn(move || {
            let result = publisher.publish(&payload, &password);
            let _ = tx.send(NetEvent::Published { payload, result });
        });
    }

    // -----------------------------------------------------------------------
    // Drawing
    // -----------------------------------------------------------------------

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let area = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);

        frame.render_widget(Paragraph::new(self.title_line()), chunks[0]);
        frame.render_widget(Paragraph::new(self.chips_line()), chunks[1]);

        let height = usize::from(chunks[2].height);
        if height != self.viewport_height {
            self.viewport_height = height;
            self.clamp_scroll();
            self.notify_viewport();
        }
        self.draw_timeline(frame, chunks[2]);

        frame.render_widget(Paragraph::new(self.status_line()), chunks[3]);
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                "/ search  f filter  s sort  c clear  g go to  L link  a add  d delete  u unlock  e export  p publish  q quit",
                Style::default().fg(Color::DarkGray),
            ))),
            chunks[4],
        );

        if let Mode::Add(dialog) = &self.mode {
            dialog.render(frame, area);
        }
    }

    fn title_line(&self) -> Line<'static> {
        let pending = self.session.pending_edits();
        let mut spans = vec![
            Span::styled(
                format!(" {} · CAS Timeline ", self.session.meta().school),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" {} ", self.session.store_mode().as_str()),
                Style::default().fg(Color::Gray),
            ),
        ];
        if self.session.is_authorized() {
            spans.push(Span::styled(" unlocked ", Style::default().fg(Color::Green)));
        }
        if !pending.is_empty() {
            spans.push(Span::styled(
                format!(
                    " {} added, {} deleted, unpublished ",
                    pending.custom.len(),
                    pending.deleted.len()
                ),
                Style::default().fg(Color::Yellow),
            ));
        }
        if self.loading {
            spans.push(Span::styled(" loading… ", Style::default().fg(Color::Cyan)));
        }
        Line::from(spans)
    }

    fn chips_line(&self) -> Line<'static> {
        let state = self.session.view().state();
        let mut spans = vec![Span::raw(" ")];
        for choice in Filter::CHOICES {
            let style = if choice == state.filter {
                Style::default().add_modifier(Modifier::REVERSED | Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            spans.push(Span::styled(format!(" {} ", choice.as_str()), style));
        }
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            state.sort.label().to_string(),
            Style::default().fg(Color::Magenta),
        ));
        if !state.query.trim().is_empty() {
            spans.push(Span::styled(
                format!("  search: {}", state.query),
                Style::default().fg(Color::Cyan),
            ));
        }
        Line::from(spans)
    }

    fn status_line(&self) -> Line<'static> {
        match &self.mode {
            Mode::Search => {
                return Line::from(format!(" / {}_", self.search_input));
            }
            Mode::Prompt(prompt) => {
                let shown = if prompt.kind.masked() {
                    "*".repeat(prompt.value.chars().count())
                } else {
                    prompt.value.clone()
                };
                return Line::from(format!(" {}: {shown}_", prompt.kind.label()));
            }
            Mode::ConfirmDelete { id, title } => {
                return Line::from(Span::styled(
                    format!(" Delete '{title}' ({id})? y/N"),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ));
            }
            Mode::Browse | Mode::Add(_) => {}
        }

        if let Some(status) = &self.status {
            let color = match status.tone {
                Tone::Info => Color::Cyan,
                Tone::Success => Color::Green,
                Tone::Error => Color::Red,
            };
            return Line::from(Span::styled(
                format!(" {}", status.text),
                Style::default().fg(color),
            ));
        }
        Line::from(Span::styled(
            format!(" {}", self.session.view().href()),
            Style::default().fg(Color::DarkGray),
        ))
    }

    fn draw_timeline(&self, frame: &mut Frame<'_>, area: Rect) {
        let state = self.session.view().state();
        if !state.loaded {
            let text = if state.error {
                Line::from(Span::styled(
                    " Failed to load the timeline. Press r to retry.",
                    Style::default().fg(Color::Red),
                ))
            } else {
                Line::from(" Loading timeline…")
            };
            frame.render_widget(Paragraph::new(text), area);
            return;
        }
        if self.screen.shown().is_empty() && !self.screen.is_fading() {
            frame.render_widget(
                Paragraph::new(vec![
                    Line::from(" No events match the current filters."),
                    Line::from(Span::styled(
                        " Press c to clear filters.",
                        Style::default().fg(Color::DarkGray),
                    )),
                ]),
                area,
            );
            return;
        }

        let cursor_rows = self
            .layout
            .cards
            .get(self.cursor)
            .map_or(0..0, CardSpan::rows);
        let end = (self.scroll + usize::from(area.height)).min(self.layout.lines.len());
        let visible: Vec<Line<'static>> = (self.scroll.min(end)..end)
            .map(|idx| {
                let mut line = self.layout.lines[idx].clone();
                if cursor_rows.contains(&idx) {
                    if let Some(gutter) = line.spans.first_mut() {
                        *gutter = Span::styled("▌ ", Style::default().fg(Color::Yellow));
                    }
                }
                line
            })
            .collect();

        let mut body = Paragraph::new(visible);
        if self.screen.is_fading() {
            body = body.style(Style::default().add_modifier(Modifier::DIM));
        }
        frame.render_widget(body, area);
    }
}

/// Error message with its remediation hint, for the status bar.
fn error_text(err: &TimelineError) -> String {
    match err.hint() {
        Some(hint) => format!("{err}. {hint}"),
        None => err.to_string(),
    }
}

/// Execute `cas browse`.
///
/// # Errors
///
/// Returns an error when configuration fails or the terminal cannot be set
/// up.
pub fn run_browse(args: &BrowseArgs, config_path: Option<&Path>, project_root: &Path) -> Result<()> {
    let ws = Workspace::open(config_path, project_root)?;
    let reduce_motion = args.reduce_motion || ws.config.ui.reduce_motion;
    let mut app = App::new(ws, reduce_motion, project_root.to_path_buf());
    app.start(args.link.as_deref());
    info!(href = %app.session.view().href(), "browser started");
    app.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cas_timeline_core::Category;
    use cas_timeline_core::backend::{FileDatasetSource, LocalEventStore};
    use cas_timeline_core::location::MemoryLocation;
    use cas_timeline_core::model::TimelineItem;
    use cas_timeline_core::render::{RenderOptions, render};
    use cas_timeline_core::store::LocalEditStore;
    use std::time::Duration;

    fn item(id: &str, date: &str, cats: &[&str], keywords: &[&str]) -> TimelineItem {
        TimelineItem {
            id: id.into(),
            date: date.into(),
            year: None,
            title: format!("Title {id}"),
            summary: format!("Summary {id}"),
            details: String::new(),
            categories: cats.iter().map(|c| (*c).to_string()).collect(),
            images: vec![],
            videos: vec![],
            links: vec![],
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
        }
    }

    fn dataset() -> Dataset {
        Dataset {
            school: "King's College Murcia".into(),
            last_updated: "2024-05-01".into(),
            items: vec![
                item("evt-1", "2022-10-03", &["Sustainability"], &[]),
                item("evt-2", "2023-02-14", &["Community"], &["Robotics"]),
                item("evt-3", "2023-09-01", &["Academics"], &[]),
                item("evt-4", "2024-04-22", &["Sustainability", "Community"], &[]),
            ],
        }
    }

    fn app_with(reduce_motion: bool, export_dir: PathBuf) -> App {
        let source: Arc<dyn DatasetSource> =
            Arc::new(FileDatasetSource::new("/nonexistent/timeline.json"));
        let ws = Workspace {
            config: Config::default(),
            source: Arc::clone(&source),
            public_source: source,
            publisher: None,
            session: TimelineSession::new(
                MemoryLocation::default(),
                Box::new(LocalEventStore::new(LocalEditStore::in_memory(), "admin")),
            ),
        };
        let mut app = App::new(ws, reduce_motion, export_dir);
        app.viewport_height = 4;
        app
    }

    fn loaded_app(reduce_motion: bool) -> (App, Instant) {
        let mut app = app_with(reduce_motion, std::env::temp_dir());
        let now = Instant::now();
        app.handle_net(NetEvent::Loaded(Ok(dataset())), now);
        app.step(now);
        (app, now)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn press(app: &mut App, code: KeyCode, now: Instant) {
        app.handle_key(key(code), now);
    }

    fn type_str(app: &mut App, s: &str, now: Instant) {
        for c in s.chars() {
            press(app, KeyCode::Char(c), now);
        }
    }

    fn shown_ids(app: &App) -> Vec<String> {
        app.screen.shown().cards().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn layout_tracks_headers_and_cards() {
        let rendered = render(&dataset().items, RenderOptions::default());
        let layout = layout_timeline(&rendered);
        let years: Vec<&str> = layout.headers.iter().map(|h| h.label.as_str()).collect();
        assert_eq!(years, ["2022", "2023", "2024"]);
        assert_eq!(layout.headers[0].line, 0);
        assert_eq!(layout.cards[0].line, 1);
        // Header, one card and its separator.
        assert_eq!(layout.headers[1].line, 1 + CARD_HEIGHT + 1);
        assert_eq!(layout.cards.len(), 4);
    }

    #[test]
    fn load_renders_immediately() {
        let (app, _) = loaded_app(false);
        assert_eq!(shown_ids(&app), ["evt-1", "evt-2", "evt-3", "evt-4"]);
        assert!(!app.screen.is_fading());
        assert!(app.observer.is_connected());
    }

    #[test]
    fn filter_change_cross_fades() {
        let (mut app, now) = loaded_app(false);
        press(&mut app, KeyCode::Char('f'), now);
        app.step(now);
        assert!(app.screen.is_fading());
        assert_eq!(shown_ids(&app).len(), 4);

        app.step(now + Duration::from_millis(250));
        assert!(!app.screen.is_fading());
        assert_eq!(shown_ids(&app), ["evt-1", "evt-4"]);
        assert!(app.session.view().href().contains("filter=Sustainability"));
    }

    #[test]
    fn search_is_debounced() {
        let (mut app, now) = loaded_app(true);
        press(&mut app, KeyCode::Char('/'), now);
        type_str(&mut app, "robot", now);
        app.step(now + Duration::from_millis(100));
        assert!(app.session.view().state().query.is_empty());

        app.step(now + Duration::from_millis(150));
        assert_eq!(app.session.view().state().query, "robot");
        assert_eq!(shown_ids(&app), ["evt-2"]);
    }

    #[test]
    fn clear_resets_view_and_search_box() {
        let (mut app, now) = loaded_app(true);
        press(&mut app, KeyCode::Char('s'), now);
        press(&mut app, KeyCode::Char('/'), now);
        type_str(&mut app, "zzz", now);
        press(&mut app, KeyCode::Enter, now);
        app.step(now);
        assert!(app.screen.shown().is_empty());

        press(&mut app, KeyCode::Char('c'), now);
        app.step(now);
        assert!(app.search_input.is_empty());
        assert_eq!(shown_ids(&app).len(), 4);
        let state = app.session.view().state();
        assert_eq!(state.filter, Filter::All);
        assert_eq!(state.sort, cas_timeline_core::SortOrder::Oldest);
        assert!(state.query.is_empty());
    }

    #[test]
    fn delete_requires_unlock_and_confirmation() {
        let (mut app, now) = loaded_app(true);
        press(&mut app, KeyCode::Char('d'), now);
        assert!(matches!(app.mode, Mode::Browse));
        assert_eq!(app.status.as_ref().map(|s| s.tone), Some(Tone::Error));

        press(&mut app, KeyCode::Char('u'), now);
        type_str(&mut app, "admin", now);
        press(&mut app, KeyCode::Enter, now);
        assert!(app.session.is_authorized());

        press(&mut app, KeyCode::Char('d'), now);
        assert!(matches!(app.mode, Mode::ConfirmDelete { ref id, .. } if id == "evt-1"));
        press(&mut app, KeyCode::Char('y'), now);
        app.step(now);
        assert_eq!(shown_ids(&app), ["evt-2", "evt-3", "evt-4"]);
        assert_eq!(app.session.pending_edits().deleted, ["evt-1"]);
    }

    #[test]
    fn declining_confirmation_keeps_item() {
        let (mut app, now) = loaded_app(true);
        app.session.login("admin").unwrap();
        press(&mut app, KeyCode::Char('d'), now);
        press(&mut app, KeyCode::Char('n'), now);
        app.step(now);
        assert_eq!(shown_ids(&app).len(), 4);
    }

    #[test]
    fn add_dialog_reports_validation_inline() {
        let (mut app, now) = loaded_app(true);
        app.session.login("admin").unwrap();
        press(&mut app, KeyCode::Char('a'), now);
        type_str(&mut app, "Robotics final", now);
        press(&mut app, KeyCode::Enter, now);
        assert!(matches!(app.mode, Mode::Add(_)));
        assert!(app.session.pending_edits().custom.is_empty());
    }

    #[test]
    fn add_dialog_creates_event() {
        let (mut app, now) = loaded_app(true);
        app.session.login("admin").unwrap();
        let submission = AddSubmission {
            input: cas_timeline_core::authoring::DraftInput {
                title: "Beach clean".into(),
                date: "2024-06-01".into(),
                summary: "s".into(),
                details: "d".into(),
                categories: vec![Category::Sustainability],
                ..Default::default()
            },
            image_files: vec![],
        };
        app.submit_event(submission, now).unwrap();
        app.step(now);
        assert_eq!(shown_ids(&app).len(), 5);
        assert_eq!(app.status.as_ref().map(|s| s.tone), Some(Tone::Success));
    }

    #[test]
    fn open_by_id_moves_cursor() {
        let (mut app, now) = loaded_app(true);
        app.viewport_height = 5;
        press(&mut app, KeyCode::Char('g'), now);
        type_str(&mut app, "evt-4", now);
        press(&mut app, KeyCode::Enter, now);
        assert_eq!(app.cursor, 3);
        let line = app.layout.cards[3].line;
        assert!(app.scroll <= line && line < app.scroll + 5);
    }

    #[test]
    fn open_by_id_reports_hidden_and_unknown() {
        let (mut app, now) = loaded_app(true);
        app.session
            .view_mut()
            .update(StatePatch::filter(Filter::Only(Category::Academics)));
        app.step(now);
        app.open_by_id("evt-1", now);
        assert_eq!(app.status.as_ref().map(|s| s.tone), Some(Tone::Info));
        app.open_by_id("evt-99", now);
        assert_eq!(app.status.as_ref().map(|s| s.tone), Some(Tone::Error));
    }

    #[test]
    fn pasted_link_hydrates_and_scrolls_to_year() {
        let (mut app, now) = loaded_app(true);
        press(&mut app, KeyCode::Char('L'), now);
        type_str(&mut app, "https://example.org/#year=2024&sort=newest", now);
        press(&mut app, KeyCode::Enter, now);
        app.step(now);
        assert_eq!(shown_ids(&app)[0], "evt-4");
        let line = app.observer.line_of("2024");
        assert_eq!(line, Some(0));
        assert_eq!(app.scroll, 0);
    }

    #[test]
    fn scrolling_moves_year_anchor() {
        let (mut app, now) = loaded_app(true);
        app.step(now);
        assert_eq!(app.session.view().state().year_anchor, "2022");
        let target = app.observer.line_of("2024").unwrap();
        app.scroll_to(target);
        app.step(now);
        assert_eq!(app.session.view().state().year_anchor, "2024");
        assert!(app.session.view().href().contains("year=2024"));
    }

    #[test]
    fn update_check_skips_reload_with_local_edits() {
        let (mut app, now) = loaded_app(true);
        app.session.login("admin").unwrap();
        app.session.delete_event("evt-2").unwrap();
        let mut newer = dataset();
        newer.last_updated = "2024-06-01".into();
        app.handle_net(NetEvent::UpdateCheck(Ok(newer.clone())), now);
        assert!(!app.scheduler.is_pending(Task::Reload));

        let (mut clean, now) = loaded_app(true);
        clean.handle_net(NetEvent::UpdateCheck(Ok(newer)), now);
        assert!(clean.scheduler.is_pending(Task::Reload));
        assert!(clean.scheduler.is_pending(Task::UpdatePoll));
    }

    #[test]
    fn failed_load_keeps_items_and_flags_error() {
        let (mut app, now) = loaded_app(true);
        app.handle_net(
            NetEvent::Loaded(Err(TimelineError::NetworkFailure {
                code: cas_timeline_core::ErrorCode::DatasetFetchFailed,
                message: "offline".into(),
            })),
            now,
        );
        app.step(now);
        assert!(app.session.view().state().error);
        assert_eq!(shown_ids(&app).len(), 4);
        assert_eq!(app.status.as_ref().map(|s| s.tone), Some(Tone::Error));
    }

    #[test]
    fn publish_without_endpoint_reports_error() {
        let (mut app, now) = loaded_app(true);
        press(&mut app, KeyCode::Char('p'), now);
        assert!(matches!(app.mode, Mode::Browse));
        let status = app.status.clone().unwrap();
        assert_eq!(status.tone, Tone::Error);
        assert!(status.text.contains("CAS_PUBLISH_ENDPOINT"));
    }

    #[test]
    fn successful_publish_starts_polling_and_keeps_view() {
        let (mut app, now) = loaded_app(true);
        app.session
            .view_mut()
            .update(StatePatch::filter(Filter::Only(Category::Community)));
        app.session.login("admin").unwrap();
        app.session.delete_event("evt-1").unwrap();
        let payload = app
            .session
            .export(chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
            .unwrap();
        app.handle_net(
            NetEvent::Published {
                payload,
                result: Ok(()),
            },
            now,
        );
        app.step(now);
        assert!(!app.session.has_local_edits());
        assert!(app.scheduler.is_pending(Task::PublishPoll));
        assert_eq!(
            app.session.view().state().filter,
            Filter::Only(Category::Community)
        );
    }

    #[test]
    fn export_writes_dataset_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(true, dir.path().to_path_buf());
        let now = Instant::now();
        app.handle_net(NetEvent::Loaded(Ok(dataset())), now);
        press(&mut app, KeyCode::Char('e'), now);
        let raw = std::fs::read_to_string(dir.path().join(EXPORT_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["items"].as_array().map(Vec::len), Some(4));
    }

    #[test]
    fn motion_toggle_skips_fade() {
        let (mut app, now) = loaded_app(false);
        press(&mut app, KeyCode::Char('m'), now);
        press(&mut app, KeyCode::Char('f'), now);
        app.step(now);
        assert!(!app.screen.is_fading());
        assert_eq!(shown_ids(&app), ["evt-1", "evt-4"]);
    }

    #[test]
    fn status_expires() {
        let (mut app, now) = loaded_app(true);
        app.set_status("hello", Tone::Info, now);
        app.step(now + app.config.ui.status_ttl() + Duration::from_millis(1));
        assert!(app.status.is_none());
    }
}
