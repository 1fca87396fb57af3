use cas_timeline_core::fragment::{self, FragmentParams};
use cas_timeline_core::pipeline;
use cas_timeline_core::reconcile::{Reconciler, Signature, Verdict};
use cas_timeline_core::model::SortOrder;
use proptest::prelude::*;

use generators::*;

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn filter_keeps_only_matching_items(
        items in arb_items("evt"),
        filter in arb_filter(),
        sort in arb_sort(),
    ) {
        let out = pipeline::refine(&items, filter, "", sort);
        for item in &out {
            prop_assert!(filter.matches(item));
        }
        let expected = items.iter().filter(|i| filter.matches(i)).count();
        prop_assert_eq!(out.len(), expected);
    }

    #[test]
    fn search_results_contain_the_query(
        items in arb_items("evt"),
        query in "[A-Za-z ]{0,4}",
    ) {
        let needle = pipeline::normalize_query(&query);
        let out = pipeline::refine(&items, cas_timeline_core::Filter::All, &query, SortOrder::Oldest);
        for item in &out {
            prop_assert!(pipeline::searchable_text(item).contains(&needle));
        }
    }

    #[test]
    fn sorting_is_idempotent_and_ordered(items in arb_items("evt"), sort in arb_sort()) {
        let mut once = items.clone();
        pipeline::sort_by_date(&mut once, sort);
        let mut twice = once.clone();
        pipeline::sort_by_date(&mut twice, sort);
        prop_assert_eq!(&once, &twice);

        for pair in once.windows(2) {
            let (a, b) = (pair[0].parsed_date(), pair[1].parsed_date());
            match sort {
                SortOrder::Oldest => prop_assert!(a <= b),
                SortOrder::Newest => prop_assert!(a >= b),
            }
        }
    }

    #[test]
    fn fragment_round_trips(
        filter in arb_filter(),
        sort in arb_sort(),
        query in "[ -~]{0,12}",
        year in "(19|20)[0-9]{2}|",
    ) {
        let params = FragmentParams { filter, sort, query: query.clone(), year: year.clone() };
        let parsed = fragment::parse(&format!("#{}", fragment::serialize(&params)));
        prop_assert_eq!(parsed.filter, filter);
        prop_assert_eq!(parsed.sort, sort);
        prop_assert_eq!(parsed.query, query.trim());
        prop_assert_eq!(parsed.year, year);
    }

    #[test]
    fn tombstoned_base_items_never_surface(
        base in arb_items("evt"),
        custom in arb_items("custom"),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..6),
    ) {
        let deleted: Vec<String> = if base.is_empty() {
            Vec::new()
        } else {
            picks.iter().map(|ix| ix.get(&base).id.clone()).collect()
        };
        let merged = pipeline::merge(&base, &custom, &deleted);
        for item in &merged {
            if item.id.starts_with("evt-") {
                prop_assert!(!deleted.contains(&item.id));
            }
        }
        let custom_in_merged = merged.iter().filter(|i| i.id.starts_with("custom-")).count();
        prop_assert_eq!(custom_in_merged, custom.len());
    }

    #[test]
    fn pending_edits_block_update_reloads(
        loaded in "[0-9-]{0,10}", n in 0usize..50,
        fetched in "[0-9-]{0,10}", m in 0usize..50,
    ) {
        let mut reconciler = Reconciler::new();
        reconciler.record_load(Signature::new(&loaded, n));
        prop_assert!(!reconciler.should_check_updates(true, true));
        prop_assert_eq!(
            reconciler.on_update_check(&Signature::new(&fetched, m), true),
            Verdict::Unchanged
        );
    }
}
