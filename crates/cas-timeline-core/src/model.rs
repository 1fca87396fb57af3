//! Timeline data model: items, categories, filter/sort enums and the dataset
//! payload.
//!
//! Field names follow the camelCase JSON used by `timeline-data.json`. Array
//! fields tolerate both a missing key and an explicit `null`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ErrorCode, TimelineError};

/// School name used when the dataset omits one.
pub const DEFAULT_SCHOOL: &str = "King's College Murcia";

/// Accent color used for uncategorized cards.
pub const DEFAULT_ACCENT: Rgb = Rgb(0x14, 0x32, 0x56);

/// 24-bit color used for card accents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

// ---------------------------------------------------------------------------
// Category / Filter / SortOrder
// ---------------------------------------------------------------------------

/// The fixed category enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Sustainability,
    Achievements,
    Community,
    Facilities,
    Academics,
    Creativity,
}

impl Category {
    pub const ALL: [Self; 6] = [
        Self::Sustainability,
        Self::Achievements,
        Self::Community,
        Self::Facilities,
        Self::Academics,
        Self::Creativity,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sustainability => "Sustainability",
            Self::Achievements => "Achievements",
            Self::Community => "Community",
            Self::Facilities => "Facilities",
            Self::Academics => "Academics",
            Self::Creativity => "Creativity",
        }
    }

    /// Card accent for items whose first category is `self`.
    #[must_use]
    pub const fn accent(self) -> Rgb {
        match self {
            Self::Sustainability => Rgb(0x28, 0xa7, 0x45),
            Self::Achievements => Rgb(0xed, 0x6c, 0x75),
            Self::Community => Rgb(0x14, 0x32, 0x56),
            Self::Facilities => Rgb(0x59, 0xcb, 0xe8),
            Self::Academics => Rgb(0xf4, 0xb4, 0x00),
            Self::Creativity => Rgb(0xb8, 0x71, 0xf2),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TimelineError;

    /// Exact, case-sensitive match against the enumeration labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| invalid_value("category", s))
    }
}

/// Category filter: everything, or one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    #[default]
    All,
    Only(Category),
}

impl Filter {
    /// Filter chips in display order.
    pub const CHOICES: [Self; 7] = [
        Self::All,
        Self::Only(Category::Sustainability),
        Self::Only(Category::Achievements),
        Self::Only(Category::Community),
        Self::Only(Category::Facilities),
        Self::Only(Category::Academics),
        Self::Only(Category::Creativity),
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Only(category) => category.as_str(),
        }
    }

    #[must_use]
    pub const fn is_all(self) -> bool {
        matches!(self, Self::All)
    }

    fn position(self) -> usize {
        Self::CHOICES.iter().position(|f| *f == self).unwrap_or(0)
    }

    /// Next chip, wrapping around.
    #[must_use]
    pub fn next(self) -> Self {
        Self::CHOICES[(self.position() + 1) % Self::CHOICES.len()]
    }

    /// Previous chip, wrapping around.
    #[must_use]
    pub fn prev(self) -> Self {
        let len = Self::CHOICES.len();
        Self::CHOICES[(self.position() + len - 1) % len]
    }

    /// Whether `item` passes this filter.
    #[must_use]
    pub fn matches(self, item: &TimelineItem) -> bool {
        match self {
            Self::All => true,
            Self::Only(category) => item.has_category(category.as_str()),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Filter {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "All" {
            return Ok(Self::All);
        }
        s.parse::<Category>()
            .map(Self::Only)
            .map_err(|_| invalid_value("filter", s))
    }
}

/// Chronological direction of the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// Ascending by date.
    #[default]
    Oldest,
    /// Descending by date.
    Newest,
}

impl SortOrder {
    /// Wire value used in fragments and on the CLI.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Oldest => "oldest",
            Self::Newest => "newest",
        }
    }

    /// Label for the sort toggle.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Oldest => "Oldest",
            Self::Newest => "Newest",
        }
    }

    #[must_use]
    pub const fn toggle(self) -> Self {
        match self {
            Self::Oldest => Self::Newest,
            Self::Newest => Self::Oldest,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oldest" => Ok(Self::Oldest),
            "newest" => Ok(Self::Newest),
            other => Err(invalid_value("sort", other)),
        }
    }
}

fn invalid_value(kind: &str, value: &str) -> TimelineError {
    TimelineError::ValidationFailure(format!(
        "{}: invalid {kind} '{value}'",
        ErrorCode::InvalidEnumValue.code()
    ))
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Labelled external link attached to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default, deserialize_with = "nullable")]
    pub label: String,
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,
}

/// One activity on the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineItem {
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub summary: String,
    #[serde(default, deserialize_with = "nullable")]
    pub details: String,
    #[serde(default, deserialize_with = "nullable")]
    pub categories: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub images: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub videos: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub links: Vec<Link>,
    #[serde(default, deserialize_with = "nullable")]
    pub keywords: Vec<String>,
}

impl TimelineItem {
    /// Cached year, or the year of the parsed date.
    #[must_use]
    pub fn year(&self) -> Option<i32> {
        self.year.or_else(|| parse_date(&self.date).map(|d| d.year()))
    }

    /// Parsed calendar date, `None` when the raw string is unparsable.
    #[must_use]
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_date(&self.date)
    }

    /// Exact, case-sensitive category membership.
    #[must_use]
    pub fn has_category(&self, label: &str) -> bool {
        self.categories.iter().any(|c| c == label)
    }

    #[must_use]
    pub fn is_sustainability(&self) -> bool {
        self.has_category(Category::Sustainability.as_str())
    }

    /// First category if it belongs to the enumeration.
    #[must_use]
    pub fn primary_category(&self) -> Option<Category> {
        self.categories.first().and_then(|c| c.parse().ok())
    }

    /// Number of media attachments (images, videos and links).
    #[must_use]
    pub fn media_count(&self) -> usize {
        self.images.len() + self.videos.len() + self.links.len()
    }
}

/// Parse an ISO-8601 date, a full RFC 3339 timestamp, or a naive timestamp.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// Authoritative timeline payload as served by the data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default = "default_school", deserialize_with = "school_or_default")]
    pub school: String,
    #[serde(default, deserialize_with = "nullable")]
    pub last_updated: String,
    #[serde(default, deserialize_with = "nullable")]
    pub items: Vec<TimelineItem>,
}

impl Default for Dataset {
    fn default() -> Self {
        Self {
            school: default_school(),
            last_updated: String::new(),
            items: Vec::new(),
        }
    }
}

/// Dataset header kept alongside the base items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetMeta {
    pub school: String,
    pub last_updated: String,
}

impl Default for DatasetMeta {
    fn default() -> Self {
        Self {
            school: default_school(),
            last_updated: String::new(),
        }
    }
}

impl DatasetMeta {
    /// Take the new header, keeping previous values for blank fields.
    pub fn absorb(&mut self, dataset: &Dataset) {
        if !dataset.school.trim().is_empty() {
            self.school.clone_from(&dataset.school);
        }
        if !dataset.last_updated.is_empty() {
            self.last_updated.clone_from(&dataset.last_updated);
        }
    }
}

fn default_school() -> String {
    DEFAULT_SCHOOL.to_string()
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn school_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(default_school))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(categories: &[&str]) -> TimelineItem {
        TimelineItem {
            id: "evt-1".into(),
            date: "2023-09-01".into(),
            year: None,
            title: "Beach clean-up".into(),
            summary: String::new(),
            details: String::new(),
            categories: categories.iter().map(|c| (*c).to_string()).collect(),
            images: vec![],
            videos: vec![],
            links: vec![],
            keywords: vec![],
        }
    }

    #[test]
    fn category_round_trips_through_str() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>().ok(), Some(c));
        }
        assert!("sustainability".parse::<Category>().is_err());
    }

    #[test]
    fn filter_parse_accepts_all_and_categories() {
        assert_eq!("All".parse::<Filter>().ok(), Some(Filter::All));
        assert_eq!(
            "Community".parse::<Filter>().ok(),
            Some(Filter::Only(Category::Community))
        );
        assert!("Bogus".parse::<Filter>().is_err());
        assert!("all".parse::<Filter>().is_err());
    }

    #[test]
    fn filter_cycles_through_every_choice() {
        let mut f = Filter::All;
        for _ in 0..Filter::CHOICES.len() {
            f = f.next();
        }
        assert_eq!(f, Filter::All);
        assert_eq!(Filter::All.prev(), Filter::Only(Category::Creativity));
    }

    #[test]
    fn filter_matches_exact_label() {
        let it = item(&["Sustainability", "Community"]);
        assert!(Filter::All.matches(&it));
        assert!(Filter::Only(Category::Community).matches(&it));
        assert!(!Filter::Only(Category::Academics).matches(&it));
    }

    #[test]
    fn sort_order_parse_and_toggle() {
        assert_eq!("newest".parse::<SortOrder>().ok(), Some(SortOrder::Newest));
        assert!("Newest".parse::<SortOrder>().is_err());
        assert_eq!(SortOrder::Oldest.toggle(), SortOrder::Newest);
        assert_eq!(SortOrder::default(), SortOrder::Oldest);
    }

    #[test]
    fn year_is_derived_from_date_when_missing() {
        let mut it = item(&[]);
        assert_eq!(it.year(), Some(2023));
        it.year = Some(2020);
        assert_eq!(it.year(), Some(2020));
        it.year = None;
        it.date = "someday".into();
        assert_eq!(it.year(), None);
    }

    #[test]
    fn parse_date_accepts_common_shapes() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5);
        assert_eq!(parse_date("2024-03-05"), expected);
        assert_eq!(parse_date("2024-03-05T10:00:00Z"), expected);
        assert_eq!(parse_date("2024-03-05T10:00:00"), expected);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("05/03/2024"), None);
    }

    #[test]
    fn primary_category_drives_accent() {
        let it = item(&["Creativity", "Academics"]);
        assert_eq!(it.primary_category(), Some(Category::Creativity));
        assert_eq!(item(&["Robots"]).primary_category(), None);
        assert_eq!(item(&[]).primary_category(), None);
    }

    #[test]
    fn dataset_tolerates_missing_and_null_fields() {
        let json = r#"{
            "lastUpdated": "2024-05-01",
            "items": [
                {"id": "evt-1", "date": "2023-09-01", "title": "A", "categories": null},
                {"id": "evt-2", "date": "2024-01-10", "year": 2024, "links": [{"label": null, "url": "https://x"}]}
            ]
        }"#;
        let ds: Dataset = serde_json::from_str(json).expect("parse");
        assert_eq!(ds.school, DEFAULT_SCHOOL);
        assert_eq!(ds.items.len(), 2);
        assert!(ds.items[0].categories.is_empty());
        assert_eq!(ds.items[1].links[0].label, "");
        assert_eq!(ds.items[1].year, Some(2024));
    }

    #[test]
    fn item_serializes_camel_case_without_empty_year() {
        let json = serde_json::to_value(item(&["Community"])).expect("serialize");
        assert!(json.get("year").is_none());
        assert_eq!(json["categories"][0], "Community");
    }

    #[test]
    fn meta_absorb_keeps_previous_values_for_blanks() {
        let mut meta = DatasetMeta::default();
        let ds = Dataset {
            school: "Other School".into(),
            last_updated: String::new(),
            items: vec![],
        };
        meta.last_updated = "2024-01-01".into();
        meta.absorb(&ds);
        assert_eq!(meta.school, "Other School");
        assert_eq!(meta.last_updated, "2024-01-01");
    }
}
