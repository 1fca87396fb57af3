//! Merge and refine: base + custom − tombstones, then filter, search, sort.
//!
//! Every function here is pure. Inputs are borrowed and left untouched and a
//! fresh vector is returned on each call.

use std::cmp::Ordering;

use crate::model::{Filter, SortOrder, TimelineItem};

/// Everything the pipeline needs to derive the visible set.
#[derive(Debug, Clone, Copy)]
pub struct PipelineInput<'a> {
    pub base: &'a [TimelineItem],
    pub custom: &'a [TimelineItem],
    pub deleted: &'a [String],
    pub filter: Filter,
    pub query: &'a str,
    pub sort: SortOrder,
}

/// Run all four stages.
#[must_use]
pub fn visible_items(input: PipelineInput<'_>) -> Vec<TimelineItem> {
    let merged = merge(input.base, input.custom, input.deleted);
    refine(&merged, input.filter, input.query, input.sort)
}

/// Base items not tombstoned, followed by custom items in insertion order.
#[must_use]
pub fn merge(
    base: &[TimelineItem],
    custom: &[TimelineItem],
    deleted: &[String],
) -> Vec<TimelineItem> {
    base.iter()
        .filter(|item| !deleted.iter().any(|id| *id == item.id))
        .chain(custom.iter())
        .cloned()
        .collect()
}

/// Filter, search and sort an already-merged set.
#[must_use]
pub fn refine(
    items: &[TimelineItem],
    filter: Filter,
    query: &str,
    sort: SortOrder,
) -> Vec<TimelineItem> {
    let needle = normalize_query(query);
    let mut out: Vec<TimelineItem> = items
        .iter()
        .filter(|item| filter.matches(item))
        .filter(|item| needle.is_empty() || searchable_text(item).contains(&needle))
        .cloned()
        .collect();
    sort_by_date(&mut out, sort);
    out
}

/// Trimmed, lowercased query. Empty means "no search".
#[must_use]
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Lowercased `title summary details keywords…` haystack.
#[must_use]
pub fn searchable_text(item: &TimelineItem) -> String {
    let mut text = String::with_capacity(
        item.title.len() + item.summary.len() + item.details.len() + 16 * item.keywords.len(),
    );
    text.push_str(&item.title);
    text.push(' ');
    text.push_str(&item.summary);
    text.push(' ');
    text.push_str(&item.details);
    text.push(' ');
    text.push_str(&item.keywords.join(" "));
    text.to_lowercase()
}

/// Stable in-place sort by parsed date.
///
/// Unparsable dates compare as earlier than every valid date, so they lead an
/// ascending timeline and trail a descending one, keeping their relative order.
pub fn sort_by_date(items: &mut [TimelineItem], sort: SortOrder) {
    items.sort_by(|a, b| compare_dates(a, b, sort));
}

fn compare_dates(a: &TimelineItem, b: &TimelineItem, sort: SortOrder) -> Ordering {
    let ord = a.parsed_date().cmp(&b.parsed_date());
    match sort {
        SortOrder::Oldest => ord,
        SortOrder::Newest => ord.reverse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn make_item(id: &str, date: &str, title: &str, categories: &[&str]) -> TimelineItem {
        TimelineItem {
            id: id.into(),
            date: date.into(),
            year: None,
            title: title.into(),
            summary: String::new(),
            details: String::new(),
            categories: categories.iter().map(|c| (*c).to_string()).collect(),
            images: vec![],
            videos: vec![],
            links: vec![],
            keywords: vec![],
        }
    }

    fn ids(items: &[TimelineItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    fn sample() -> Vec<TimelineItem> {
        vec![
            make_item("evt-1", "2023-09-01", "Beach clean-up", &["Sustainability", "Community"]),
            make_item("evt-2", "2023-11-20", "Robotics regional final", &["Achievements"]),
            make_item("evt-3", "2022-05-14", "Garden opening", &["Facilities", "Sustainability"]),
        ]
    }

    // -----------------------------------------------------------------------
    // merge
    // -----------------------------------------------------------------------

    #[test]
    fn merge_excludes_tombstones_and_appends_custom() {
        let base = sample();
        let custom = vec![make_item("custom-1", "2024-01-01", "Art show", &["Creativity"])];
        let deleted = vec!["evt-2".to_string()];
        let merged = merge(&base, &custom, &deleted);
        assert_eq!(ids(&merged), ["evt-1", "evt-3", "custom-1"]);
    }

    #[test]
    fn tombstone_for_unknown_id_is_harmless() {
        let merged = merge(&sample(), &[], &["missing".to_string()]);
        assert_eq!(merged.len(), 3);
    }

    // -----------------------------------------------------------------------
    // refine
    // -----------------------------------------------------------------------

    #[test]
    fn sustainability_filter_keeps_tagged_items_ascending() {
        let out = refine(
            &sample(),
            Filter::Only(Category::Sustainability),
            "",
            SortOrder::Oldest,
        );
        assert_eq!(ids(&out), ["evt-3", "evt-1"]);
    }

    #[test]
    fn keyword_search_is_case_insensitive() {
        let mut items = sample();
        items[0].keywords = vec!["robotics".into()];
        let out = refine(&items, Filter::All, "Robotics", SortOrder::Oldest);
        assert_eq!(ids(&out), ["evt-1", "evt-2"]);
    }

    #[test]
    fn whitespace_query_is_no_search() {
        let out = refine(&sample(), Filter::All, "   ", SortOrder::Oldest);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn query_is_trimmed_before_matching() {
        let out = refine(&sample(), Filter::All, "  garden ", SortOrder::Oldest);
        assert_eq!(ids(&out), ["evt-3"]);
    }

    #[test]
    fn newest_sort_is_descending() {
        let out = refine(&sample(), Filter::All, "", SortOrder::Newest);
        assert_eq!(ids(&out), ["evt-2", "evt-1", "evt-3"]);
    }

    #[test]
    fn invalid_dates_lead_ascending_and_keep_order() {
        let mut items = sample();
        items.push(make_item("bad-1", "soon", "x", &[]));
        items.insert(0, make_item("bad-0", "", "y", &[]));
        let asc = refine(&items, Filter::All, "", SortOrder::Oldest);
        assert_eq!(ids(&asc), ["bad-0", "bad-1", "evt-3", "evt-1", "evt-2"]);
        let desc = refine(&items, Filter::All, "", SortOrder::Newest);
        assert_eq!(ids(&desc), ["evt-2", "evt-1", "evt-3", "bad-0", "bad-1"]);
    }

    #[test]
    fn equal_dates_keep_merge_order() {
        let items = vec![
            make_item("a", "2023-01-01", "a", &[]),
            make_item("b", "2023-01-01", "b", &[]),
            make_item("c", "2022-01-01", "c", &[]),
        ];
        let out = refine(&items, Filter::All, "", SortOrder::Oldest);
        assert_eq!(ids(&out), ["c", "a", "b"]);
    }

    #[test]
    fn inputs_are_untouched() {
        let base = sample();
        let before = base.clone();
        let _ = visible_items(PipelineInput {
            base: &base,
            custom: &[],
            deleted: &[],
            filter: Filter::All,
            query: "",
            sort: SortOrder::Newest,
        });
        assert_eq!(base, before);
    }

    #[test]
    fn searchable_text_joins_fields() {
        let mut item = make_item("x", "2023-01-01", "Title", &[]);
        item.summary = "Sum".into();
        item.details = "Det".into();
        item.keywords = vec!["K1".into(), "K2".into()];
        assert_eq!(searchable_text(&item), "title sum det k1 k2");
    }
}
