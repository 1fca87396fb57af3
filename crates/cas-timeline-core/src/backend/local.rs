//! Event store for static deployments: edits land in the device-local
//! [`LocalEditStore`] and wait there until published.

use tracing::{debug, info};

use super::{Created, EventStore, PendingEdits, Refresh, StoreMode};
use crate::authoring::{self, EventDraft};
use crate::error::TimelineError;
use crate::model::TimelineItem;
use crate::store::{KeyValueStore, LocalEditStore, MemoryKeyValueStore, TEACHER_UNLOCKED_KEY};

pub struct LocalEventStore {
    edits: LocalEditStore,
    password: String,
    /// Session-scoped flags; never persisted.
    session: MemoryKeyValueStore,
    clock: fn() -> i64,
}

impl std::fmt::Debug for LocalEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEventStore")
            .field("edits", &self.edits)
            .field("unlocked", &self.unlocked())
            .finish_non_exhaustive()
    }
}

impl LocalEventStore {
    #[must_use]
    pub fn new(edits: LocalEditStore, password: &str) -> Self {
        Self {
            edits,
            password: password.to_string(),
            session: MemoryKeyValueStore::new(),
            clock: now_millis,
        }
    }

    fn unlocked(&self) -> bool {
        matches!(self.session.get(TEACHER_UNLOCKED_KEY), Ok(Some(v)) if v == "true")
    }

    fn set_unlocked(&mut self, unlocked: bool) {
        // The in-memory session store cannot fail.
        let _ = self
            .session
            .set(TEACHER_UNLOCKED_KEY, if unlocked { "true" } else { "false" });
    }

    fn require_unlocked(&self) -> Result<(), TimelineError> {
        if self.unlocked() {
            Ok(())
        } else {
            Err(TimelineError::unauthorized("unlock editing first"))
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl EventStore for LocalEventStore {
    fn mode(&self) -> StoreMode {
        StoreMode::Local
    }

    fn is_authorized(&mut self) -> Result<bool, TimelineError> {
        Ok(self.unlocked())
    }

    fn login(&mut self, password: &str) -> Result<(), TimelineError> {
        if password.trim() == self.password {
            self.set_unlocked(true);
            info!("local editing unlocked");
            Ok(())
        } else {
            Err(TimelineError::login_rejected())
        }
    }

    fn logout(&mut self) {
        self.set_unlocked(false);
    }

    fn create_event(&mut self, draft: EventDraft) -> Result<Created, TimelineError> {
        self.require_unlocked()?;
        let item = draft.into_item(authoring::new_custom_id((self.clock)()));
        debug!(id = %item.id, "adding local event");
        self.edits.add_item(item.clone())?;
        Ok(Created {
            item: Some(item),
            refresh: Refresh::Remerge,
        })
    }

    fn delete_event(&mut self, id: &str) -> Result<Refresh, TimelineError> {
        self.require_unlocked()?;
        let removal = self.edits.remove(id)?;
        debug!(id, ?removal, "removed local event");
        Ok(Refresh::Remerge)
    }

    fn upload_image(&mut self, bytes: &[u8], filename: &str) -> Result<String, TimelineError> {
        authoring::image_data_uri(bytes, filename)
    }

    fn list_events(&mut self) -> Result<Vec<TimelineItem>, TimelineError> {
        Ok(self.edits.custom_items().to_vec())
    }

    fn pending_edits(&self) -> PendingEdits<'_> {
        PendingEdits {
            custom: self.edits.custom_items(),
            deleted: self.edits.deleted_ids(),
        }
    }

    fn clear_pending(&mut self) -> Result<(), TimelineError> {
        self.edits.clear()?;
        Ok(())
    }

    fn reload_pending(&mut self) {
        self.edits.reload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authoring::DraftInput;
    use crate::error::ErrorCode;
    use crate::model::Category;

    fn store() -> LocalEventStore {
        LocalEventStore::new(LocalEditStore::in_memory(), "admin")
    }

    fn draft() -> EventDraft {
        DraftInput {
            title: "Art show".into(),
            date: "2024-04-01".into(),
            summary: "s".into(),
            details: "d".into(),
            categories: vec![Category::Creativity],
            ..DraftInput::default()
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn edits_require_unlock() {
        let mut s = store();
        assert!(!s.is_authorized().unwrap());
        let err = s.create_event(draft()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotAuthorized);
        assert!(s.pending_edits().is_empty());
    }

    #[test]
    fn wrong_password_is_rejected() {
        let mut s = store();
        assert_eq!(
            s.login("hunter2").unwrap_err().code(),
            ErrorCode::LoginRejected
        );
        s.login(" admin ").unwrap();
        assert!(s.is_authorized().unwrap());
        s.logout();
        assert!(!s.is_authorized().unwrap());
    }

    #[test]
    fn create_appends_custom_item() {
        let mut s = store();
        s.clock = || 42;
        s.login("admin").unwrap();
        let created = s.create_event(draft()).unwrap();
        assert_eq!(created.refresh, Refresh::Remerge);
        let item = created.item.unwrap();
        assert!(item.id.starts_with("custom-42-"));
        assert_eq!(s.pending_edits().custom.len(), 1);
        assert_eq!(s.list_events().unwrap().len(), 1);
    }

    #[test]
    fn delete_tombstones_base_items_and_clear_resets() {
        let mut s = store();
        s.login("admin").unwrap();
        s.delete_event("evt-1").unwrap();
        assert_eq!(s.pending_edits().deleted, ["evt-1".to_string()]);
        s.clear_pending().unwrap();
        assert!(s.pending_edits().is_empty());
    }

    #[test]
    fn upload_returns_data_uri() {
        let mut s = store();
        let url = s.upload_image(b"\x89PNG", "photo.png").unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }
}
