//! One viewer session: view state plus the active event store.
//!
//! [`TimelineSession`] is the single owner of everything the timeline
//! mutates. Callers feed it dataset loads and user actions; it keeps the
//! merged set, the reconciler and the authorization flag consistent.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::authoring::DraftInput;
use crate::backend::{EventStore, PendingEdits, Refresh, StoreMode};
use crate::error::TimelineError;
use crate::export::{self, ExportDataset};
use crate::location::{Location, MemoryLocation};
use crate::model::{Dataset, DatasetMeta, TimelineItem};
use crate::pipeline;
use crate::reconcile::{Reconciler, Signature};
use crate::render::{self, RenderOptions, RenderedTimeline};
use crate::state::ViewStateMachine;

/// What a mutation asks the caller to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The merged set was rebuilt in place.
    Updated,
    /// The dataset must be fetched again before the change shows.
    ReloadRequired,
}

impl From<Refresh> for Outcome {
    fn from(refresh: Refresh) -> Self {
        match refresh {
            Refresh::Remerge => Self::Updated,
            Refresh::Reload => Self::ReloadRequired,
        }
    }
}

pub struct TimelineSession<L: Location = MemoryLocation> {
    view: ViewStateMachine<L>,
    store: Box<dyn EventStore>,
    meta: DatasetMeta,
    base: Vec<TimelineItem>,
    reconciler: Reconciler,
    authorized: bool,
}

impl<L: Location + std::fmt::Debug> std::fmt::Debug for TimelineSession<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineSession")
            .field("view", &self.view)
            .field("mode", &self.store.mode())
            .field("base", &self.base.len())
            .field("authorized", &self.authorized)
            .finish_non_exhaustive()
    }
}

impl<L: Location> TimelineSession<L> {
    pub fn new(location: L, store: Box<dyn EventStore>) -> Self {
        Self {
            view: ViewStateMachine::new(location),
            store,
            meta: DatasetMeta::default(),
            base: Vec::new(),
            reconciler: Reconciler::new(),
            authorized: false,
        }
    }

    pub const fn view(&self) -> &ViewStateMachine<L> {
        &self.view
    }

    pub const fn view_mut(&mut self) -> &mut ViewStateMachine<L> {
        &mut self.view
    }

    pub fn store_mode(&self) -> StoreMode {
        self.store.mode()
    }

    pub const fn meta(&self) -> &DatasetMeta {
        &self.meta
    }

    pub const fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub const fn reconciler_mut(&mut self) -> &mut Reconciler {
        &mut self.reconciler
    }

    pub const fn is_authorized(&self) -> bool {
        self.authorized
    }

    /// Ask the store whether this session may edit. A failed check counts
    /// as locked.
    pub fn refresh_authorization(&mut self) -> bool {
        self.authorized = match self.store.is_authorized() {
            Ok(authorized) => authorized,
            Err(err) => {
                warn!(%err, "authorization check failed");
                false
            }
        };
        self.authorized
    }

    /// Install a freshly fetched dataset and render it.
    pub fn apply_dataset(&mut self, dataset: Dataset) {
        self.store.reload_pending();
        self.meta.absorb(&dataset);
        self.reconciler.record_load(Signature::of(&dataset));
        info!(
            items = dataset.items.len(),
            school = %self.meta.school,
            "timeline loaded"
        );
        self.base = dataset.items;
        self.rebuild_items();
        self.view.mark_loaded();
    }

    /// Keep whatever is on screen and flag the failure.
    pub fn apply_fetch_failure(&mut self, err: &TimelineError) {
        warn!(%err, "timeline load failed");
        self.view.mark_error();
    }

    /// Re-merge base data with the store's pending edits.
    pub fn rebuild_items(&mut self) {
        let pending = self.store.pending_edits();
        let merged = pipeline::merge(&self.base, pending.custom, pending.deleted);
        debug!(merged = merged.len(), "rebuilt merged set");
        self.view.set_items(merged);
    }

    pub fn has_local_edits(&self) -> bool {
        !self.store.pending_edits().is_empty()
    }

    /// Edits waiting for the next publish.
    pub fn pending_edits(&self) -> PendingEdits<'_> {
        self.store.pending_edits()
    }

    /// Unlock editing.
    ///
    /// # Errors
    ///
    /// Returns the store's rejection, e.g. a wrong password.
    pub fn login(&mut self, password: &str) -> Result<(), TimelineError> {
        self.store.login(password)?;
        self.authorized = true;
        self.view.request_render(crate::state::RenderRequest::Immediate);
        Ok(())
    }

    pub fn logout(&mut self) {
        self.store.logout();
        self.authorized = false;
        self.view.request_render(crate::state::RenderRequest::Immediate);
    }

    /// Validate `input` and store it as a new event. Returns the stored
    /// item when the store reports it.
    ///
    /// # Errors
    ///
    /// Returns a validation failure for incomplete input, an authorization
    /// failure when locked, or the store's write failure.
    pub fn create_event(
        &mut self,
        input: &DraftInput,
    ) -> Result<(Outcome, Option<TimelineItem>), TimelineError> {
        let draft = input.validate()?;
        let created = self.store.create_event(draft)?;
        if let Some(item) = &created.item {
            info!(id = %item.id, title = %item.title, "event added");
        }
        Ok((self.after_mutation(created.refresh), created.item))
    }

    /// Remove `id` from the timeline.
    ///
    /// # Errors
    ///
    /// Returns an authorization failure when locked or the store's write
    /// failure.
    pub fn delete_event(&mut self, id: &str) -> Result<Outcome, TimelineError> {
        let refresh = self.store.delete_event(id)?;
        info!(id, "event deleted");
        Ok(self.after_mutation(refresh))
    }

    fn after_mutation(&mut self, refresh: Refresh) -> Outcome {
        if refresh == Refresh::Remerge {
            self.rebuild_items();
        }
        refresh.into()
    }

    /// Store an image file and return the URL to reference it by.
    ///
    /// # Errors
    ///
    /// Returns a validation failure for non-image files.
    pub fn upload_image(&mut self, bytes: &[u8], filename: &str) -> Result<String, TimelineError> {
        self.store.upload_image(bytes, filename)
    }

    /// Payload of the merged set, oldest first, stamped `today`.
    ///
    /// # Errors
    ///
    /// Returns a validation failure before the first successful load.
    pub fn export(&self, today: NaiveDate) -> Result<ExportDataset, TimelineError> {
        if !self.view.state().loaded {
            return Err(TimelineError::ValidationFailure(
                "Load the timeline before exporting.".to_string(),
            ));
        }
        Ok(export::build_export(&self.meta, &self.view.state().items, today))
    }

    /// The publish endpoint accepted `payload`: drop local edits, show base
    /// data again and start waiting for the public copy to match.
    ///
    /// # Errors
    ///
    /// Returns a storage failure when the cleared edits cannot be written.
    pub fn confirm_published(
        &mut self,
        payload: &ExportDataset,
        attempts: u32,
    ) -> Result<(), TimelineError> {
        self.store.clear_pending()?;
        self.rebuild_items();
        let base = Signature::new(&self.meta.last_updated, self.base.len());
        self.reconciler
            .on_publish_succeeded(base, payload.signature(), attempts);
        Ok(())
    }

    /// Filtered, searched and sorted items.
    pub fn visible_items(&self) -> Vec<TimelineItem> {
        self.view.visible_items()
    }

    /// View model of the visible items.
    pub fn render(&self) -> RenderedTimeline {
        render::render(
            &self.visible_items(),
            RenderOptions {
                deletable: self.authorized,
            },
        )
    }

    /// Look up an item in the merged set.
    pub fn find_item(&self, id: &str) -> Option<&TimelineItem> {
        self.view.state().items.iter().find(|item| item.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalEventStore;
    use crate::model::{Category, Filter};
    use crate::state::StatePatch;
    use crate::store::LocalEditStore;

    fn item(id: &str, date: &str, categories: &[&str]) -> TimelineItem {
        TimelineItem {
            id: id.into(),
            date: date.into(),
            year: None,
            title: format!("Title {id}"),
            summary: String::new(),
            details: String::new(),
            categories: categories.iter().map(|c| (*c).to_string()).collect(),
            images: vec![],
            videos: vec![],
            links: vec![],
            keywords: vec![],
        }
    }

    fn dataset() -> Dataset {
        Dataset {
            school: "KCM".into(),
            last_updated: "2024-01-01".into(),
            items: vec![
                item("evt-1", "2023-09-01", &["Community"]),
                item("evt-2", "2024-02-01", &["Sustainability"]),
            ],
        }
    }

    fn session() -> TimelineSession {
        let store = LocalEventStore::new(LocalEditStore::in_memory(), "admin");
        TimelineSession::new(MemoryLocation::default(), Box::new(store))
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn dataset_load_renders_groups() {
        let mut s = session();
        assert!(s.visible_items().is_empty());
        s.apply_dataset(dataset());
        assert!(s.view().state().loaded);
        let rendered = s.render();
        assert_eq!(rendered.year_labels().collect::<Vec<_>>(), ["2023", "2024"]);
        assert_eq!(
            s.reconciler().current().map(Signature::as_str),
            Some("2024-01-01|2")
        );
    }

    #[test]
    fn local_delete_requires_unlock_then_hides_item() {
        let mut s = session();
        s.apply_dataset(dataset());
        assert!(s.delete_event("evt-1").is_err());

        s.login("admin").unwrap();
        assert!(s.render().cards().all(|c| c.deletable));
        assert_eq!(s.delete_event("evt-1").unwrap(), Outcome::Updated);
        assert!(s.find_item("evt-1").is_none());
        assert!(s.has_local_edits());
        assert_eq!(s.visible_items().len(), 1);
    }

    #[test]
    fn create_validates_before_storing() {
        let mut s = session();
        s.apply_dataset(dataset());
        s.login("admin").unwrap();
        assert!(s.create_event(&DraftInput::default()).is_err());
        assert!(!s.has_local_edits());

        let input = DraftInput {
            title: "Robotics cup".into(),
            date: "2024-05-01".into(),
            summary: "s".into(),
            details: "d".into(),
            categories: vec![Category::Achievements],
            ..DraftInput::default()
        };
        let (outcome, item) = s.create_event(&input).unwrap();
        assert_eq!(outcome, Outcome::Updated);
        let id = item.unwrap().id;
        assert!(s.find_item(&id).is_some());
        assert_eq!(s.view().state().items.len(), 3);
    }

    #[test]
    fn export_requires_a_load() {
        let mut s = session();
        assert!(s.export(today()).is_err());
        s.apply_dataset(dataset());
        let out = s.export(today()).unwrap();
        assert_eq!(out.items.len(), 2);
        assert_eq!(out.school, "KCM");
    }

    #[test]
    fn failed_fetch_keeps_items() {
        let mut s = session();
        s.apply_dataset(dataset());
        s.apply_fetch_failure(&TimelineError::network("offline"));
        assert!(s.view().state().error);
        assert_eq!(s.visible_items().len(), 2);
    }

    #[test]
    fn publish_clears_edits_but_keeps_view() {
        let mut s = session();
        s.apply_dataset(dataset());
        s.login("admin").unwrap();
        s.delete_event("evt-1").unwrap();
        s.view_mut().update(StatePatch::filter(Filter::Only(Category::Sustainability)));
        s.view_mut().update(StatePatch::query("title"));
        s.view_mut().set_anchor_from_spy("2024");

        let payload = s.export(today()).unwrap();
        s.confirm_published(&payload, 12).unwrap();

        assert!(!s.has_local_edits());
        assert!(s.find_item("evt-1").is_some());
        let state = s.view().state();
        assert_eq!(state.filter, Filter::Only(Category::Sustainability));
        assert_eq!(state.query, "title");
        assert_eq!(state.year_anchor, "2024");
        assert!(s.reconciler().publish_poll_active());
        assert_eq!(
            s.reconciler().published().map(Signature::as_str),
            Some("2024-06-01|1")
        );
    }
}
