//! Shareable URL fragment: `#year=2023&filter=Community&q=robots&sort=newest`.
//!
//! Parsing never fails. Unknown keys are ignored and invalid values fall back
//! to the defaults, so a hand-edited link can only narrow the view, never
//! corrupt it.

use url::form_urlencoded;

use crate::model::{Filter, SortOrder};

pub const KEY_YEAR: &str = "year";
pub const KEY_FILTER: &str = "filter";
pub const KEY_QUERY: &str = "q";
pub const KEY_SORT: &str = "sort";

/// The subset of view state carried in a fragment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FragmentParams {
    pub filter: Filter,
    pub sort: SortOrder,
    pub query: String,
    pub year: String,
}

impl FragmentParams {
    /// True when every field holds its default, i.e. the fragment is empty.
    #[must_use]
    pub fn is_default(&self) -> bool {
        serialize(self).is_empty()
    }
}

/// Encode `params` without the leading `#`. Defaults are omitted and the
/// query is written trimmed.
#[must_use]
pub fn serialize(params: &FragmentParams) -> String {
    let mut out = form_urlencoded::Serializer::new(String::new());
    if !params.year.is_empty() {
        out.append_pair(KEY_YEAR, &params.year);
    }
    if !params.filter.is_all() {
        out.append_pair(KEY_FILTER, params.filter.as_str());
    }
    let query = params.query.trim();
    if !query.is_empty() {
        out.append_pair(KEY_QUERY, query);
    }
    if params.sort != SortOrder::Oldest {
        out.append_pair(KEY_SORT, params.sort.as_str());
    }
    out.finish()
}

/// Decode a fragment, with or without its leading `#`.
///
/// The first occurrence of a repeated key wins. The query is kept verbatim
/// (not trimmed) so the search box shows what the link carried.
#[must_use]
pub fn parse(fragment: &str) -> FragmentParams {
    let raw = fragment.strip_prefix('#').unwrap_or(fragment);
    let mut params = FragmentParams::default();
    let (mut seen_filter, mut seen_sort, mut seen_query, mut seen_year) = (false, false, false, false);

    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        match key.as_ref() {
            KEY_FILTER if !seen_filter => {
                seen_filter = true;
                if let Ok(filter) = value.parse() {
                    params.filter = filter;
                }
            }
            KEY_SORT if !seen_sort => {
                seen_sort = true;
                if let Ok(sort) = value.parse() {
                    params.sort = sort;
                }
            }
            KEY_QUERY if !seen_query => {
                seen_query = true;
                params.query = value.into_owned();
            }
            KEY_YEAR if !seen_year => {
                seen_year = true;
                params.year = value.into_owned();
            }
            _ => {}
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;

    #[test]
    fn defaults_serialize_to_empty() {
        assert_eq!(serialize(&FragmentParams::default()), "");
        assert!(FragmentParams::default().is_default());
    }

    #[test]
    fn keys_are_written_in_fixed_order() {
        let params = FragmentParams {
            filter: Filter::Only(Category::Community),
            sort: SortOrder::Newest,
            query: "  beach clean ".into(),
            year: "2023".into(),
        };
        assert_eq!(
            serialize(&params),
            "year=2023&filter=Community&q=beach+clean&sort=newest"
        );
    }

    #[test]
    fn parse_accepts_leading_hash_and_reserved_chars() {
        let params = parse("#q=a%26b%3Dc&filter=Academics");
        assert_eq!(params.query, "a&b=c");
        assert_eq!(params.filter, Filter::Only(Category::Academics));
        assert_eq!(params.sort, SortOrder::Oldest);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let params = parse("filter=Sports&sort=sideways&year=");
        assert_eq!(params, FragmentParams::default());
    }

    #[test]
    fn first_occurrence_wins() {
        let params = parse("filter=Community&filter=Academics&sort=newest&sort=oldest");
        assert_eq!(params.filter, Filter::Only(Category::Community));
        assert_eq!(params.sort, SortOrder::Newest);
    }

    #[test]
    fn invalid_first_value_is_not_replaced_by_later_one() {
        let params = parse("filter=Bogus&filter=Academics");
        assert_eq!(params.filter, Filter::All);
    }

    #[test]
    fn query_is_kept_verbatim_on_parse() {
        assert_eq!(parse("q=+robots+").query, " robots ");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let params = parse("utm_source=mail&year=2021");
        assert_eq!(params.year, "2021");
        assert_eq!(params.filter, Filter::All);
    }
}
