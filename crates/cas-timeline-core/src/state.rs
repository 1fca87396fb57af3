//! The view state machine.
//!
//! All user-driven mutations go through [`ViewStateMachine::update`], which
//! rewrites the fragment and asks for a coalesced render. Hydration from the
//! fragment runs under a guard that turns `update` and outbound fragment
//! writes into no-ops until it finishes.

use tracing::debug;

use crate::fragment::{self, FragmentParams};
use crate::location::{Location, MemoryLocation};
use crate::model::{Filter, SortOrder, TimelineItem};
use crate::pipeline;

/// Canonical view state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewState {
    /// Merged set (base + custom − tombstones), before filter/search/sort.
    pub items: Vec<TimelineItem>,
    pub filter: Filter,
    pub query: String,
    pub sort: SortOrder,
    /// Year label the reader is looking at; empty when unset.
    pub year_anchor: String,
    pub loaded: bool,
    pub error: bool,
}

impl ViewState {
    /// Fragment-carried part of the state.
    #[must_use]
    pub fn fragment_params(&self) -> FragmentParams {
        FragmentParams {
            filter: self.filter,
            sort: self.sort,
            query: self.query.clone(),
            year: self.year_anchor.clone(),
        }
    }
}

/// Partial update merged by [`ViewStateMachine::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatePatch {
    pub filter: Option<Filter>,
    pub query: Option<String>,
    pub sort: Option<SortOrder>,
    pub year_anchor: Option<String>,
}

impl StatePatch {
    #[must_use]
    pub fn filter(filter: Filter) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn sort(sort: SortOrder) -> Self {
        Self {
            sort: Some(sort),
            ..Self::default()
        }
    }
}

/// Pending render, coalesced until the owner takes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderRequest {
    /// Next frame; may animate.
    Frame,
    /// Right away, skipping any transition.
    Immediate,
}

impl RenderRequest {
    /// Combine two requests; an immediate one absorbs a frame one.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Frame, Self::Frame) => Self::Frame,
            _ => Self::Immediate,
        }
    }

    #[must_use]
    pub const fn is_immediate(self) -> bool {
        matches!(self, Self::Immediate)
    }
}

/// Owner of [`ViewState`], the location and the render queue.
#[derive(Debug)]
pub struct ViewStateMachine<L: Location = MemoryLocation> {
    state: ViewState,
    location: L,
    hydrating: bool,
    render: Option<RenderRequest>,
    pending_year_scroll: Option<String>,
}

impl<L: Location> ViewStateMachine<L> {
    pub fn new(location: L) -> Self {
        Self {
            state: ViewState::default(),
            location,
            hydrating: false,
            render: None,
            pending_year_scroll: None,
        }
    }

    pub const fn state(&self) -> &ViewState {
        &self.state
    }

    pub const fn location(&self) -> &L {
        &self.location
    }

    /// Merge `patch`, rewrite the fragment and request a frame render.
    ///
    /// Returns `false` when suppressed by an in-progress hydration.
    pub fn update(&mut self, patch: StatePatch) -> bool {
        if self.hydrating {
            debug!("state update suppressed during hydration");
            return false;
        }
        if let Some(filter) = patch.filter {
            self.state.filter = filter;
        }
        if let Some(query) = patch.query {
            self.state.query = query;
        }
        if let Some(sort) = patch.sort {
            self.state.sort = sort;
        }
        if let Some(anchor) = patch.year_anchor {
            self.state.year_anchor = anchor;
        }
        debug!(
            filter = %self.state.filter,
            sort = %self.state.sort,
            query = %self.state.query,
            "view state updated"
        );
        self.sync_fragment();
        self.request_render(RenderRequest::Frame);
        true
    }

    /// Back to filter All, empty query, oldest first, no anchor.
    pub fn reset(&mut self) {
        self.state.filter = Filter::All;
        self.state.query.clear();
        self.state.sort = SortOrder::Oldest;
        self.state.year_anchor.clear();
        self.sync_fragment();
        self.request_render(RenderRequest::Immediate);
    }

    /// Record the year header the reader scrolled to. Rewrites the fragment
    /// but does not render. Returns whether the anchor changed.
    pub fn set_anchor_from_spy(&mut self, year: &str) -> bool {
        if year.is_empty() || self.state.year_anchor == year {
            return false;
        }
        self.state.year_anchor = year.to_string();
        self.sync_fragment();
        true
    }

    /// Replace the merged set and render immediately.
    pub fn set_items(&mut self, items: Vec<TimelineItem>) {
        self.state.items = items;
        self.request_render(RenderRequest::Immediate);
    }

    pub fn mark_loaded(&mut self) {
        self.state.loaded = true;
        self.state.error = false;
        self.request_render(RenderRequest::Immediate);
    }

    /// Flag a failed load; the last good items stay in place.
    pub const fn mark_error(&mut self) {
        self.state.error = true;
    }

    /// Queue a render, coalescing with any pending one.
    pub fn request_render(&mut self, request: RenderRequest) {
        self.render = Some(match self.render {
            Some(pending) => pending.merge(request),
            None => request,
        });
    }

    /// Take the coalesced render request, if any.
    pub const fn take_render_request(&mut self) -> Option<RenderRequest> {
        self.render.take()
    }

    /// Year to scroll to once the next render lands.
    pub const fn take_pending_year_scroll(&mut self) -> Option<String> {
        self.pending_year_scroll.take()
    }

    /// Filtered, searched and sorted items; empty until loaded.
    #[must_use]
    pub fn visible_items(&self) -> Vec<TimelineItem> {
        if !self.state.loaded {
            return Vec::new();
        }
        pipeline::refine(
            &self.state.items,
            self.state.filter,
            &self.state.query,
            self.state.sort,
        )
    }

    /// Current shareable link.
    pub fn href(&self) -> String {
        self.location.href()
    }

    // -----------------------------------------------------------------------
    // Hydration
    // -----------------------------------------------------------------------

    /// Apply the location's fragment to the state.
    ///
    /// Every fragment-carried field is reset first. With `from_event` set and
    /// an empty fragment, the reset view is rendered right away; otherwise an
    /// immediate render is requested only once data is loaded.
    pub fn hydrate_from_location(&mut self, from_event: bool) {
        self.begin_hydration();
        let raw = self.location.fragment().to_string();
        self.state.filter = Filter::All;
        self.state.sort = SortOrder::Oldest;
        self.state.query.clear();
        self.state.year_anchor.clear();
        self.pending_year_scroll = None;

        if raw.is_empty() {
            self.end_hydration();
            if from_event {
                self.request_render(RenderRequest::Immediate);
            }
            return;
        }

        let params = fragment::parse(&raw);
        self.state.filter = params.filter;
        self.state.sort = params.sort;
        self.state.query = params.query;
        if !params.year.is_empty() {
            self.pending_year_scroll = Some(params.year.clone());
            self.state.year_anchor = params.year;
        }
        debug!(fragment = %raw, "hydrated view state from fragment");
        self.end_hydration();
        if self.state.loaded {
            self.request_render(RenderRequest::Immediate);
        }
    }

    /// External navigation (a pasted link or `--link`): behaves like a
    /// hash-change event. Ignored while a hydration is already running.
    pub fn navigate(&mut self, link: &str)
    where
        L: Navigable,
    {
        if self.hydrating {
            return;
        }
        self.location.navigate_to(link);
        self.hydrate_from_location(true);
    }

    const fn begin_hydration(&mut self) {
        self.hydrating = true;
    }

    const fn end_hydration(&mut self) {
        self.hydrating = false;
    }

    fn sync_fragment(&mut self) {
        if self.hydrating {
            return;
        }
        let next = fragment::serialize(&self.state.fragment_params());
        if next != self.location.fragment() {
            self.location.replace_fragment(&next);
        }
    }
}

/// Locations that can follow a pasted link.
pub trait Navigable {
    fn navigate_to(&mut self, link: &str);
}

impl Navigable for MemoryLocation {
    fn navigate_to(&mut self, link: &str) {
        self.navigate(link);
    }
}
