//! Change detection between the loaded dataset, the published dataset and
//! the copy currently served.
//!
//! A [`Signature`] is `"{lastUpdated}|{itemCount}"`: cheap, and good enough to
//! notice that a newer file has been deployed. Local edits always win, so no
//! verdict ever asks for a reload while edits are pending.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info};

use crate::model::Dataset;

pub const UPDATE_NOTICE: &str = "New updates detected. Reloading…";
pub const PUBLISHED_NOTICE: &str = "Public site updated. Reloading…";

/// Cheap dataset fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    #[must_use]
    pub fn new(last_updated: &str, item_count: usize) -> Self {
        Self(format!("{last_updated}|{item_count}"))
    }

    #[must_use]
    pub fn of(dataset: &Dataset) -> Self {
        Self::new(&dataset.last_updated, dataset.items.len())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Poll cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub update_interval: Duration,
    pub publish_interval: Duration,
    pub publish_attempts: u32,
    pub reload_delay: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(120),
            publish_interval: Duration::from_secs(10),
            publish_attempts: 12,
            reload_delay: Duration::from_secs(1),
        }
    }
}

/// Outcome of comparing a freshly fetched signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Unchanged,
    /// Show the notice, then reload after the configured delay.
    Reload { notice: &'static str },
}

/// What the owner should do after one publish poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishPoll {
    /// Poll again after the publish interval.
    Continue,
    /// The public copy matches; reload.
    Matched { notice: &'static str },
    /// Out of attempts.
    Exhausted,
}

/// Tracks the loaded and the published signatures.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    current: Option<Signature>,
    published: Option<Signature>,
    attempts_left: u32,
}

impl Reconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn current(&self) -> Option<&Signature> {
        self.current.as_ref()
    }

    #[must_use]
    pub const fn published(&self) -> Option<&Signature> {
        self.published.as_ref()
    }

    /// Remember the signature of the dataset just loaded.
    pub fn record_load(&mut self, signature: Signature) {
        debug!(%signature, "recorded loaded signature");
        self.current = Some(signature);
    }

    /// Whether an update poll should fetch at all.
    #[must_use]
    pub const fn should_check_updates(&self, loaded: bool, has_local_edits: bool) -> bool {
        loaded && !has_local_edits
    }

    /// Compare a fetched signature with the loaded one.
    #[must_use]
    pub fn on_update_check(&self, fetched: &Signature, has_local_edits: bool) -> Verdict {
        if has_local_edits {
            return Verdict::Unchanged;
        }
        match &self.current {
            Some(current) if current != fetched => {
                info!(%current, %fetched, "remote timeline changed");
                Verdict::Reload {
                    notice: UPDATE_NOTICE,
                }
            }
            _ => Verdict::Unchanged,
        }
    }

    /// After a confirmed publish: the base data becomes current again and
    /// the published payload's signature is awaited for `attempts` polls.
    pub fn on_publish_succeeded(&mut self, base: Signature, published: Signature, attempts: u32) {
        info!(%published, attempts, "waiting for published timeline");
        self.current = Some(base);
        self.published = Some(published);
        self.attempts_left = attempts;
    }

    #[must_use]
    pub const fn publish_poll_active(&self) -> bool {
        self.published.is_some() && self.attempts_left > 0
    }

    /// Consume one publish-poll attempt. `fetched` is `None` when the fetch
    /// failed, which still counts as an attempt.
    pub fn on_publish_poll(&mut self, fetched: Option<&Signature>) -> PublishPoll {
        let Some(published) = &self.published else {
            return PublishPoll::Exhausted;
        };
        self.attempts_left = self.attempts_left.saturating_sub(1);
        if fetched == Some(published) {
            self.published = None;
            self.attempts_left = 0;
            return PublishPoll::Matched {
                notice: PUBLISHED_NOTICE,
            };
        }
        if self.attempts_left == 0 {
            self.published = None;
            PublishPoll::Exhausted
        } else {
            PublishPoll::Continue
        }
    }
}
