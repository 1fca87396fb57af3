//! The add-event form: raw field parsing, validation and new-item
//! construction.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{Datelike, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::TimelineError;
use crate::model::{Category, Link, TimelineItem, parse_date};

pub const MISSING_FIELDS_MESSAGE: &str =
    "Fill title, date, summary, details, and at least one category.";

/// Raw form input as typed by a teacher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftInput {
    pub title: String,
    pub date: String,
    pub summary: String,
    pub details: String,
    pub categories: Vec<Category>,
    /// Comma- or newline-separated image URLs.
    pub images: String,
    /// Comma- or newline-separated video URLs.
    pub videos: String,
    /// One `label | url` per line.
    pub links: String,
    /// Comma- or newline-separated keywords.
    pub keywords: String,
    /// Uploaded image URLs (or data URIs), appended after typed ones.
    pub uploaded_images: Vec<String>,
}

/// Validated event fields, also the body of `POST /api/events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub date: String,
    pub summary: String,
    pub details: String,
    pub categories: Vec<String>,
    pub images: Vec<String>,
    pub videos: Vec<String>,
    pub links: Vec<Link>,
    pub keywords: Vec<String>,
}

impl DraftInput {
    /// Validate and normalize.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::ValidationFailure`] when a required field is
    /// blank, no category is chosen, or the date is not `YYYY-MM-DD`.
    pub fn validate(&self) -> Result<EventDraft, TimelineError> {
        let title = self.title.trim();
        let date = self.date.trim();
        let summary = self.summary.trim();
        let details = self.details.trim();

        if title.is_empty()
            || date.is_empty()
            || summary.is_empty()
            || details.is_empty()
            || self.categories.is_empty()
        {
            return Err(TimelineError::ValidationFailure(
                MISSING_FIELDS_MESSAGE.to_string(),
            ));
        }
        if date.len() != 10 || NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            return Err(TimelineError::ValidationFailure(format!(
                "Date '{date}' is not a valid YYYY-MM-DD date."
            )));
        }

        let mut categories: Vec<String> = Vec::with_capacity(self.categories.len());
        for category in &self.categories {
            let label = category.as_str().to_string();
            if !categories.contains(&label) {
                categories.push(label);
            }
        }

        let mut images = split_list(&self.images);
        images.extend(self.uploaded_images.iter().cloned());

        Ok(EventDraft {
            title: title.to_string(),
            date: date.to_string(),
            summary: summary.to_string(),
            details: details.to_string(),
            categories,
            images,
            videos: split_list(&self.videos),
            links: parse_links(&self.links),
            keywords: split_list(&self.keywords),
        })
    }
}

impl EventDraft {
    /// Materialize as a timeline item with `id`; the year is derived from
    /// the date.
    #[must_use]
    pub fn into_item(self, id: String) -> TimelineItem {
        let year = parse_date(&self.date).map(|d| d.year());
        TimelineItem {
            id,
            date: self.date,
            year,
            title: self.title,
            summary: self.summary,
            details: self.details,
            categories: self.categories,
            images: self.images,
            videos: self.videos,
            links: self.links,
            keywords: self.keywords,
        }
    }
}

/// Split on commas and newlines, trimming and dropping blanks.
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `label | url` lines; lines missing either side are dropped.
#[must_use]
pub fn parse_links(value: &str) -> Vec<Link> {
    value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let mut parts = line.split('|').map(str::trim);
            let label = parts.next().unwrap_or_default();
            let url = parts.next().unwrap_or_default();
            (!label.is_empty() && !url.is_empty()).then(|| Link {
                label: label.to_string(),
                url: url.to_string(),
            })
        })
        .collect()
}

/// Id for an item authored on this device: `custom-<millis>-<8 hex>`.
#[must_use]
pub fn new_custom_id(now_millis: i64) -> String {
    let suffix: u32 = rand::thread_rng().r#gen();
    format!("custom-{now_millis}-{suffix:08x}")
}

/// Image MIME type guessed from a file extension.
#[must_use]
pub fn image_mime(filename: &str) -> Option<&'static str> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())?
        .to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        "avif" => Some("image/avif"),
        _ => None,
    }
}

/// `data:<mime>;base64,…` URI for an image file.
///
/// # Errors
///
/// Returns a validation failure when the file is not a recognized image.
pub fn image_data_uri(bytes: &[u8], filename: &str) -> Result<String, TimelineError> {
    let mime = image_mime(filename).ok_or_else(|| {
        TimelineError::ValidationFailure(format!("'{filename}' is not an image file."))
    })?;
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}
