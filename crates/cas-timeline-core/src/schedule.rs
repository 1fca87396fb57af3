//! Keyed one-shot timers for the single-threaded event loop.
//!
//! Scheduling a key that is already pending replaces its deadline, which is
//! how debouncing works: every keystroke pushes the search out again.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Delayed tasks the TUI loop runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Apply the typed search query.
    SearchDebounce,
    /// Swap in the staged view after the cross-fade.
    TransitionSwap,
    /// Check the data source for a newer dataset.
    UpdatePoll,
    /// Check whether the published dataset is live.
    PublishPoll,
    /// Re-fetch the dataset after a reload notice.
    Reload,
    /// Hide the transient status message.
    StatusExpire,
}

/// Pending deadlines by key.
#[derive(Debug, Clone)]
pub struct Scheduler<K = Task> {
    deadlines: HashMap<K, Instant>,
}

impl<K> Default for Scheduler<K> {
    fn default() -> Self {
        Self {
            deadlines: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> Scheduler<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `key` at `now + delay`, cancelling any earlier schedule of it.
    pub fn schedule(&mut self, key: K, delay: Duration, now: Instant) {
        self.deadlines.insert(key, now + delay);
    }

    /// Schedule `key` only if it is not already pending.
    pub fn schedule_if_idle(&mut self, key: K, delay: Duration, now: Instant) {
        self.deadlines.entry(key).or_insert(now + delay);
    }

    /// Cancel `key`. Returns whether it was pending.
    pub fn cancel(&mut self, key: K) -> bool {
        self.deadlines.remove(&key).is_some()
    }

    #[must_use]
    pub fn is_pending(&self, key: K) -> bool {
        self.deadlines.contains_key(&key)
    }

    /// Remove and return every key whose deadline has passed, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<K> {
        let mut due: Vec<(K, Instant)> = self
            .deadlines
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(k, at)| (*k, *at))
            .collect();
        due.sort_by_key(|(_, at)| *at);
        for (key, _) in &due {
            self.deadlines.remove(key);
        }
        due.into_iter().map(|(k, _)| k).collect()
    }

    /// Time until the earliest deadline, zero if one is overdue.
    #[must_use]
    pub fn next_delay(&self, now: Instant) -> Option<Duration> {
        self.deadlines
            .values()
            .min()
            .map(|at| at.saturating_duration_since(now))
    }
}
