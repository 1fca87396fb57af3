//! Scroll-spy for year headers.
//!
//! The observer knows the line of every rendered year header. Each time the
//! viewport moves it computes which headers sit inside the band spanning
//! 10%..60% of the visible rows and reports the one nearest the band top
//! that just entered, over a channel drained by the owner of the view state.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::mpsc::{self, Receiver, Sender};

use tracing::trace;

/// Band start as a percentage of the viewport height.
pub const BAND_TOP_PERCENT: usize = 10;
/// Band end (exclusive) as a percentage of the viewport height.
pub const BAND_BOTTOM_PERCENT: usize = 60;

/// Messages sent by the observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpyEvent {
    YearVisible(String),
}

/// A rendered year header and the content line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderPosition {
    pub label: String,
    pub line: usize,
}

/// Visible window over the rendered content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    /// First visible content line.
    pub offset: usize,
    /// Number of visible rows.
    pub height: usize,
}

impl Viewport {
    /// Content lines inside the observation band; never empty for a
    /// non-empty viewport.
    #[must_use]
    pub fn band(self) -> Range<usize> {
        if self.height == 0 {
            return self.offset..self.offset;
        }
        let top = self.offset + self.height * BAND_TOP_PERCENT / 100;
        let bottom = (self.offset + self.height * BAND_BOTTOM_PERCENT / 100).max(top + 1);
        top..bottom
    }
}

/// Create a connected observer/receiver pair.
#[must_use]
pub fn channel() -> (YearObserver, Receiver<SpyEvent>) {
    let (tx, rx) = mpsc::channel();
    (YearObserver::new(tx), rx)
}

/// Watches header positions against the viewport band.
#[derive(Debug)]
pub struct YearObserver {
    tx: Sender<SpyEvent>,
    headers: Vec<HeaderPosition>,
    intersecting: HashSet<String>,
    connected: bool,
}

impl YearObserver {
    #[must_use]
    pub fn new(tx: Sender<SpyEvent>) -> Self {
        Self {
            tx,
            headers: Vec::new(),
            intersecting: HashSet::new(),
            connected: false,
        }
    }

    /// Drop the old headers and watch `headers` instead.
    pub fn observe(&mut self, headers: Vec<HeaderPosition>) {
        self.disconnect();
        self.connected = !headers.is_empty();
        self.headers = headers;
    }

    /// Stop watching; no events until the next [`Self::observe`].
    pub fn disconnect(&mut self) {
        self.headers.clear();
        self.intersecting.clear();
        self.connected = false;
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Line of the header labelled `label`.
    #[must_use]
    pub fn line_of(&self, label: &str) -> Option<usize> {
        self.headers.iter().find(|h| h.label == label).map(|h| h.line)
    }

    /// Re-evaluate the band for `viewport`; emits at most one event.
    pub fn on_viewport(&mut self, viewport: Viewport) {
        if !self.connected {
            return;
        }
        let band = viewport.band();
        let now: HashSet<String> = self
            .headers
            .iter()
            .filter(|h| band.contains(&h.line))
            .map(|h| h.label.clone())
            .collect();

        let entered = self
            .headers
            .iter()
            .filter(|h| now.contains(&h.label) && !self.intersecting.contains(&h.label))
            .min_by_key(|h| h.line.abs_diff(band.start));

        if let Some(header) = entered {
            trace!(year = %header.label, "year header entered band");
            // The receiver may be gone during shutdown.
            let _ = self.tx.send(SpyEvent::YearVisible(header.label.clone()));
        }
        self.intersecting = now;
    }
}
