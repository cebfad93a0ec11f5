// tests/semantic/trie_property_test.rs
use std::collections::BTreeSet;

use mantis_metrics::semantic::trie::dunder_name;
use mantis_metrics::semantic::{
    DunderNameDescriptor, DunderNameTrie, ElementProperties, ElementProperty, MutableDunderNameTrie,
};
use mantis_metrics::spec::LinkableElementType;
use proptest::prelude::*;

fn name_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop::sample::select(vec!["booking", "listing", "user", "ds"]).prop_map(str::to_string),
        1..4,
    )
}

fn names_strategy() -> impl Strategy<Value = BTreeSet<Vec<String>>> {
    prop::collection::btree_set(name_strategy(), 0..12)
}

fn build(names: &BTreeSet<Vec<String>>) -> DunderNameTrie {
    let descriptor = DunderNameDescriptor::new(
        LinkableElementType::Dimension,
        ElementProperties::of(&[ElementProperty::Local]),
    );
    let mut trie = MutableDunderNameTrie::new();
    trie.add_name_items(names.iter().map(|n| (n.clone(), descriptor.clone())));
    trie.freeze()
}

fn dunder_names(names: &BTreeSet<Vec<String>>) -> BTreeSet<String> {
    names.iter().map(|n| dunder_name(n)).collect()
}

fn trie_names(trie: &DunderNameTrie) -> BTreeSet<String> {
    trie.names(None).into_iter().collect()
}

proptest! {
    #[test]
    fn prop_frozen_trie_holds_every_name(names in names_strategy()) {
        let trie = build(&names);
        prop_assert_eq!(trie_names(&trie), dunder_names(&names));
        prop_assert_eq!(trie.len(), names.len());
    }

    #[test]
    fn prop_intersection_is_idempotent(names in names_strategy()) {
        let trie = build(&names);
        let single = DunderNameTrie::intersection_merge_common(&[&trie]);
        let twice = DunderNameTrie::intersection_merge_common(&[&trie, &trie]);
        prop_assert_eq!(trie_names(&single), trie_names(&trie));
        prop_assert_eq!(trie_names(&twice), trie_names(&trie));
    }

    #[test]
    fn prop_intersection_keeps_shared_names(a in names_strategy(), b in names_strategy()) {
        let merged = DunderNameTrie::intersection_merge_common(&[&build(&a), &build(&b)]);
        let expected: BTreeSet<String> =
            dunder_names(&a).intersection(&dunder_names(&b)).cloned().collect();
        prop_assert_eq!(trie_names(&merged), expected);
    }

    #[test]
    fn prop_union_merge_keeps_every_name(a in names_strategy(), b in names_strategy()) {
        let merged = DunderNameTrie::union_merge_common(&[&build(&a), &build(&b)]);
        let expected: BTreeSet<String> =
            dunder_names(&a).union(&dunder_names(&b)).cloned().collect();
        prop_assert_eq!(trie_names(&merged), expected);
    }

    #[test]
    fn prop_union_exclude_drops_shared_names(a in names_strategy(), b in names_strategy()) {
        let merged = DunderNameTrie::union_exclude_common(&[&build(&a), &build(&b)]);
        let expected: BTreeSet<String> = dunder_names(&a)
            .symmetric_difference(&dunder_names(&b))
            .cloned()
            .collect();
        prop_assert_eq!(trie_names(&merged), expected);
    }
}
