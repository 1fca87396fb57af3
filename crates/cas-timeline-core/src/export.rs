//! Normalized export/publish payload.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{DEFAULT_SCHOOL, DatasetMeta, Link, SortOrder, TimelineItem};
use crate::pipeline;
use crate::reconcile::Signature;

/// Item shape written to `timeline-data.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportItem {
    pub id: String,
    pub date: String,
    pub year: Option<i32>,
    pub title: String,
    pub summary: String,
    pub categories: Vec<String>,
    pub sustainability: bool,
    pub details: String,
    pub images: Vec<String>,
    pub videos: Vec<String>,
    pub links: Vec<Link>,
    pub keywords: Vec<String>,
}

impl From<TimelineItem> for ExportItem {
    fn from(item: TimelineItem) -> Self {
        let year = item.year();
        let sustainability = item.is_sustainability();
        Self {
            id: item.id,
            date: item.date,
            year,
            title: item.title,
            summary: item.summary,
            categories: item.categories,
            sustainability,
            details: item.details,
            images: item.images,
            videos: item.videos,
            links: item.links,
            keywords: item.keywords,
        }
    }
}

/// Full payload, also the `data` field of a publish request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDataset {
    pub school: String,
    pub last_updated: String,
    pub items: Vec<ExportItem>,
}

impl ExportDataset {
    #[must_use]
    pub fn signature(&self) -> Signature {
        Signature::new(&self.last_updated, self.items.len())
    }

    /// Pretty JSON with two-space indentation.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Build the payload from the merged set, oldest first, stamped `today`.
#[must_use]
pub fn build_export(meta: &DatasetMeta, merged: &[TimelineItem], today: NaiveDate) -> ExportDataset {
    let mut items = merged.to_vec();
    pipeline::sort_by_date(&mut items, SortOrder::Oldest);
    let school = if meta.school.trim().is_empty() {
        DEFAULT_SCHOOL.to_string()
    } else {
        meta.school.clone()
    };
    ExportDataset {
        school,
        last_updated: today.format("%Y-%m-%d").to_string(),
        items: items.into_iter().map(ExportItem::from).collect(),
    }
}
