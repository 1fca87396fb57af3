//! Device-local persistence of unpublished edits.
//!
//! Two collections live under fixed keys: custom items authored on this device
//! and tombstoned ids of base items. The key-value backend is a trait so the
//! TUI, the CLI and tests can share one [`LocalEditStore`] implementation.
//!
//! Read failures never propagate: a missing, unreadable or corrupt entry
//! degrades to an empty collection and is logged.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::ErrorCode;
use crate::model::TimelineItem;

/// Storage key for custom items.
pub const CUSTOM_ITEMS_KEY: &str = "kcm.timeline.customItems";
/// Storage key for tombstoned ids.
pub const DELETED_IDS_KEY: &str = "kcm.timeline.deletedItems";
/// Session key remembering a local teacher unlock. Never written to disk.
pub const TEACHER_UNLOCKED_KEY: &str = "kcm.timeline.teacherUnlocked";

const LOCK_FILE: &str = ".lock";
const LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors raised by a key-value backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("storage lock timed out after {waited:?} at {path}")]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("could not encode '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Unavailable(_) => ErrorCode::StorageUnavailable,
            Self::Io(_) | Self::LockTimeout { .. } | Self::Encode { .. } => {
                ErrorCode::StorageWriteFailed
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Key-value backends
// ---------------------------------------------------------------------------

/// Durable string store scoped to this device.
pub trait KeyValueStore: Send {
    /// Read the raw value under `key`, `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replace the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be written.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// One JSON file per key inside a directory.
///
/// Writes go to a sibling temp file that is renamed into place while an
/// advisory lock on `<dir>/.lock` is held, so a concurrent `cas` process
/// never observes a half-written file.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn lock(&self) -> Result<DirLock, StoreError> {
        DirLock::acquire(&self.dir.join(LOCK_FILE), LOCK_TIMEOUT)
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let _guard = self.lock()?;
        let target = self.path_for(key);
        let tmp = target.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &target)?;
        debug!(key, path = %target.display(), "stored local edits");
        Ok(())
    }
}

/// Exclusive advisory lock released on drop.
#[derive(Debug)]
struct DirLock {
    file: File,
}

impl DirLock {
    fn acquire(path: &Path, timeout: Duration) -> Result<Self, StoreError> {
        let start = Instant::now();
        loop {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(path)?;

            if FileExt::try_lock_exclusive(&file).is_ok() {
                return Ok(Self { file });
            }

            if start.elapsed() >= timeout {
                return Err(StoreError::LockTimeout {
                    path: path.to_path_buf(),
                    waited: start.elapsed(),
                });
            }

            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// In-memory backend for tests and for sessions without a storage dir.
#[derive(Debug, Default, Clone)]
pub struct MemoryKeyValueStore {
    entries: HashMap<String, String>,
    unavailable: bool,
}

impl MemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose every read and write fails.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            entries: HashMap::new(),
            unavailable: true,
        }
    }

    /// Seed a raw value, bypassing encoding.
    #[must_use]
    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable(format!("cannot read {key}")));
        }
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable(format!("cannot write {key}")));
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LocalEditStore
// ---------------------------------------------------------------------------

/// What [`LocalEditStore::remove`] did with an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// A custom item with this id was dropped.
    DroppedCustom,
    /// The id was added to the tombstones.
    Tombstoned,
    /// The id was already tombstoned.
    AlreadyTombstoned,
}

/// Unpublished custom items and tombstones, mirrored to a [`KeyValueStore`].
pub struct LocalEditStore {
    backend: Box<dyn KeyValueStore>,
    custom_items: Vec<TimelineItem>,
    deleted_ids: Vec<String>,
}

impl std::fmt::Debug for LocalEditStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEditStore")
            .field("custom_items", &self.custom_items.len())
            .field("deleted_ids", &self.deleted_ids)
            .finish_non_exhaustive()
    }
}

impl LocalEditStore {
    /// Load both collections from `backend`.
    pub fn open(backend: impl KeyValueStore + 'static) -> Self {
        let backend: Box<dyn KeyValueStore> = Box::new(backend);
        let custom_items = load_or_empty(backend.as_ref(), CUSTOM_ITEMS_KEY);
        let deleted_ids = load_or_empty(backend.as_ref(), DELETED_IDS_KEY);
        debug!(
            custom = custom_items.len(),
            deleted = deleted_ids.len(),
            "opened local edit store"
        );
        Self {
            backend,
            custom_items,
            deleted_ids,
        }
    }

    /// In-memory store, used when no storage directory is available.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::open(MemoryKeyValueStore::new())
    }

    #[must_use]
    pub fn custom_items(&self) -> &[TimelineItem] {
        &self.custom_items
    }

    #[must_use]
    pub fn deleted_ids(&self) -> &[String] {
        &self.deleted_ids
    }

    /// True when any unpublished addition or tombstone exists.
    #[must_use]
    pub fn has_edits(&self) -> bool {
        !self.custom_items.is_empty() || !self.deleted_ids.is_empty()
    }

    /// Append a custom item and persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails. The in-memory collection
    /// keeps the item either way.
    pub fn add_item(&mut self, item: TimelineItem) -> Result<(), StoreError> {
        self.custom_items.push(item);
        self.save_custom()
    }

    /// Drop a custom item with `id`, or tombstone it when it is a base item.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    pub fn remove(&mut self, id: &str) -> Result<Removal, StoreError> {
        if let Some(idx) = self.custom_items.iter().position(|i| i.id == id) {
            self.custom_items.remove(idx);
            self.save_custom()?;
            return Ok(Removal::DroppedCustom);
        }
        if self.deleted_ids.iter().any(|d| d == id) {
            return Ok(Removal::AlreadyTombstoned);
        }
        self.deleted_ids.push(id.to_string());
        self.save_deleted()?;
        Ok(Removal::Tombstoned)
    }

    /// Forget every unpublished edit.
    ///
    /// # Errors
    ///
    /// Returns an error if either backend write fails.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.custom_items.clear();
        self.deleted_ids.clear();
        self.save_custom()?;
        self.save_deleted()
    }

    /// Re-read both collections from the backend.
    pub fn reload(&mut self) {
        self.custom_items = load_or_empty(self.backend.as_ref(), CUSTOM_ITEMS_KEY);
        self.deleted_ids = load_or_empty(self.backend.as_ref(), DELETED_IDS_KEY);
    }

    fn save_custom(&mut self) -> Result<(), StoreError> {
        save(self.backend.as_mut(), CUSTOM_ITEMS_KEY, &self.custom_items)
    }

    fn save_deleted(&mut self) -> Result<(), StoreError> {
        save(self.backend.as_mut(), DELETED_IDS_KEY, &self.deleted_ids)
    }
}

fn load_or_empty<T: DeserializeOwned>(backend: &dyn KeyValueStore, key: &str) -> Vec<T> {
    let raw = match backend.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(err) => {
            warn!(key, "local storage read failed, starting empty: {err}");
            return Vec::new();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|err| {
        warn!(key, "ignoring corrupt local storage entry: {err}");
        Vec::new()
    })
}

fn save<T: Serialize>(backend: &mut dyn KeyValueStore, key: &str, value: &T) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })?;
    backend.set(key, &raw)
}
