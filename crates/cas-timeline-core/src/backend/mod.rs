//! Collaborators the timeline talks to: where the dataset comes from, where
//! edits go, and where a finished timeline is published.
//!
//! The event store is chosen once at startup from configuration. Everything
//! downstream works against the [`EventStore`] trait and never asks which
//! implementation it holds.

pub mod local;
pub mod remote;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::authoring::EventDraft;
use crate::config::Config;
use crate::error::TimelineError;
use crate::export::ExportDataset;
use crate::model::{Dataset, TimelineItem};
use crate::store::{FileKeyValueStore, LocalEditStore};

pub use local::LocalEventStore;
pub use remote::{HttpClient, HttpDatasetSource, HttpPublisher, RemoteEventStore};

/// Path of the dataset on an editing server.
pub const SERVER_DATA_PATH: &str = "/api/timeline-data";

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Supplier of the authoritative dataset.
pub trait DatasetSource: Send + Sync {
    /// Fetch the current dataset.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::NetworkFailure`] when the dataset cannot be
    /// read or decoded.
    fn fetch_dataset(&self) -> Result<Dataset, TimelineError>;

    /// Human-readable origin, for logs and `status`.
    fn describe(&self) -> String;
}

/// Publishes a finished payload to the public site.
pub trait Publisher: Send + Sync {
    /// Send `payload` guarded by `password`.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::PublishFailure`] with the endpoint's message
    /// when it rejects the payload or cannot be reached.
    fn publish(&self, payload: &ExportDataset, password: &str) -> Result<(), TimelineError>;
}

/// Which event store is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Edits stay on this device until published.
    Local,
    /// Edits go straight to the editing server.
    Remote,
}

impl StoreMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "server",
        }
    }

    /// Only static deployments poll for a newer dataset.
    #[must_use]
    pub const fn polls_for_updates(self) -> bool {
        matches!(self, Self::Local)
    }
}

/// How the visible set catches up after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// Re-merge base data with the local edits.
    Remerge,
    /// Fetch the dataset again.
    Reload,
}

/// Result of a successful create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    /// The stored item, when the store reports it.
    pub item: Option<TimelineItem>,
    pub refresh: Refresh,
}

/// Unpublished edits held by a store.
#[derive(Debug, Clone, Copy)]
pub struct PendingEdits<'a> {
    pub custom: &'a [TimelineItem],
    pub deleted: &'a [String],
}

impl PendingEdits<'static> {
    pub const NONE: Self = Self {
        custom: &[],
        deleted: &[],
    };
}

impl PendingEdits<'_> {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.custom.is_empty() && self.deleted.is_empty()
    }
}

/// Event storage and authorization.
pub trait EventStore: Send {
    fn mode(&self) -> StoreMode;

    /// Whether this session may edit.
    ///
    /// # Errors
    ///
    /// Returns an error when the session check cannot reach its backend.
    fn is_authorized(&mut self) -> Result<bool, TimelineError>;

    /// Unlock editing.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::AuthorizationFailure`] for a wrong password.
    fn login(&mut self, password: &str) -> Result<(), TimelineError>;

    /// Lock editing again. Never fails from the caller's point of view.
    fn logout(&mut self);

    /// Store a new event.
    ///
    /// # Errors
    ///
    /// Returns an authorization failure when locked and a storage or network
    /// failure when the write fails.
    fn create_event(&mut self, draft: EventDraft) -> Result<Created, TimelineError>;

    /// Remove an event by id.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::create_event`].
    fn delete_event(&mut self, id: &str) -> Result<Refresh, TimelineError>;

    /// Store an image and return the URL to reference it by.
    ///
    /// # Errors
    ///
    /// Returns a validation failure for non-image files.
    fn upload_image(&mut self, bytes: &[u8], filename: &str) -> Result<String, TimelineError>;

    /// Events owned by this store.
    ///
    /// # Errors
    ///
    /// Returns a network failure when the store is remote and unreachable.
    fn list_events(&mut self) -> Result<Vec<TimelineItem>, TimelineError>;

    /// Edits not yet part of the base dataset.
    fn pending_edits(&self) -> PendingEdits<'_>;

    /// Drop pending edits after a confirmed publish.
    ///
    /// # Errors
    ///
    /// Returns a storage failure when the cleared state cannot be written.
    fn clear_pending(&mut self) -> Result<(), TimelineError>;

    /// Re-read pending edits from durable storage.
    fn reload_pending(&mut self) {}
}

// ---------------------------------------------------------------------------
// File source
// ---------------------------------------------------------------------------

/// Dataset read from a local JSON file.
#[derive(Debug, Clone)]
pub struct FileDatasetSource {
    path: PathBuf,
}

impl FileDatasetSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DatasetSource for FileDatasetSource {
    fn fetch_dataset(&self) -> Result<Dataset, TimelineError> {
        let raw = fs::read_to_string(&self.path).map_err(|err| {
            TimelineError::network(format!("cannot read {}: {err}", self.path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|err| {
            TimelineError::decode(format!("{} is not a timeline dataset: {err}", self.path.display()))
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Collaborators selected for one session.
pub struct Backends {
    pub source: Arc<dyn DatasetSource>,
    pub store: Box<dyn EventStore>,
    pub publisher: Option<Arc<dyn Publisher>>,
    /// Source the publish poll checks; always the public static dataset.
    pub public_source: Arc<dyn DatasetSource>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("source", &self.source.describe())
            .field("mode", &self.store.mode())
            .field("publisher", &self.publisher.is_some())
            .finish_non_exhaustive()
    }
}

/// Select collaborators from `config`.
#[must_use]
pub fn connect(config: &Config) -> Backends {
    let client = HttpClient::new(config.source.request_timeout());
    let public_source = static_source(&config.source.data_url, &client);

    let (source, store): (Arc<dyn DatasetSource>, Box<dyn EventStore>) =
        match config.source.server_url() {
            Some(server) => {
                info!(server, "server mode: edits go to the editing server");
                (
                    Arc::new(HttpDatasetSource::new(
                        client.clone(),
                        remote::join_url(server, SERVER_DATA_PATH),
                        false,
                    )),
                    Box::new(RemoteEventStore::new(client.clone(), server)),
                )
            }
            None => {
                let dir = config.storage.resolve_dir();
                info!(storage = %dir.display(), "local mode: edits stay on this device");
                (
                    Arc::clone(&public_source),
                    Box::new(LocalEventStore::new(
                        LocalEditStore::open(FileKeyValueStore::new(dir)),
                        &config.auth.local_password,
                    )),
                )
            }
        };

    let publisher = config
        .publish
        .endpoint()
        .map(|endpoint| Arc::new(HttpPublisher::new(client, endpoint)) as Arc<dyn Publisher>);

    Backends {
        source,
        store,
        publisher,
        public_source,
    }
}

/// A file path or an http(s) URL with a cache buster.
#[must_use]
pub fn static_source(data_url: &str, client: &HttpClient) -> Arc<dyn DatasetSource> {
    if is_http(data_url) {
        Arc::new(HttpDatasetSource::new(client.clone(), data_url, true))
    } else {
        Arc::new(FileDatasetSource::new(data_url))
    }
}

fn is_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
