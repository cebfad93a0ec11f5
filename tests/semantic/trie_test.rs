// tests/semantic/trie_test.rs
#[path = "../common/mod.rs"]
mod common;

use insta::assert_snapshot;
use mantis_metrics::semantic::trie::indexed_name;
use mantis_metrics::semantic::{
    DunderNameDescriptor, DunderNameTrie, ElementProperties, ElementProperty, MutableDunderNameTrie,
};
use mantis_metrics::spec::LinkableElementType;

fn entity(origin: &str) -> DunderNameDescriptor {
    DunderNameDescriptor::new(
        LinkableElementType::Entity,
        ElementProperties::of(&[ElementProperty::Entity, ElementProperty::Local]),
    )
    .with_origin(origin)
}

fn trie(names: &[&str], origin: &str) -> DunderNameTrie {
    let mut trie = MutableDunderNameTrie::new();
    trie.add_name_items(names.iter().map(|n| (indexed_name(n), entity(origin))));
    trie.freeze()
}

#[test]
fn test_model_tries_follow_joins() {
    let lookup = common::lookup();
    let resolution = lookup.entity_key_resolution().unwrap();

    let bookings = resolution.model_trie("bookings_source").unwrap();
    assert_snapshot!(bookings.names(None).join("\n"), @r"
    booking
    listing
    listing__user
    ");

    let revenue = resolution.model_trie("revenue").unwrap();
    assert_snapshot!(revenue.names(None).join("\n"), @r"
    revenue_instance
    user
    ");
}

#[test]
fn test_metric_tries() {
    let lookup = common::lookup();
    let resolution = lookup.entity_key_resolution().unwrap();

    let ratio = resolution.metric_trie("booking_value_per_booking").unwrap();
    assert_snapshot!(ratio.names(None).join("\n"), @r"
    booking
    listing
    listing__user
    ");

    // Offsets, cumulative windows and conversions can't be queried by entity key.
    for metric in [
        "bookings_growth_2_weeks",
        "revenue_cumulative",
        "visit_buy_conversion_rate",
    ] {
        assert!(resolution.metric_trie(metric).unwrap().is_empty(), "{metric}");
    }
}

#[test]
fn test_metrics_by_entity_key() {
    let lookup = common::lookup();
    let resolution = lookup.entity_key_resolution().unwrap();

    let by_user = resolution.metrics_for_entity_key("user").unwrap();
    assert!(by_user.contains("listings"));
    assert!(by_user.contains("revenue"));
    assert!(by_user.contains("visits"));
    assert!(!by_user.contains("revenue_cumulative"));

    assert!(resolution.metrics_for_entity_key("view").unwrap().contains("views"));
    assert!(resolution.metrics_for_entity_key("listing__user").is_none());
}

#[test]
fn test_merge_algebra() {
    let a = trie(&["booking", "listing", "listing__user"], "bookings_source");
    let b = trie(&["listing", "user"], "listings_latest");

    let union = DunderNameTrie::union_merge_common(&[&a, &b]);
    assert_snapshot!(union.names(None).join("\n"), @r"
    booking
    listing
    listing__user
    user
    ");
    let listing = union.descriptor(&indexed_name("listing")).unwrap();
    assert_eq!(listing.origin_model_ids.len(), 2);

    let exclusive = DunderNameTrie::union_exclude_common(&[&a, &b]);
    assert_snapshot!(exclusive.names(None).join("\n"), @r"
    booking
    listing__user
    user
    ");

    let common = DunderNameTrie::intersection_merge_common(&[&a, &b]);
    assert_eq!(common.names(None), vec!["listing"]);
    assert!(DunderNameTrie::intersection_merge_common(&[]).is_empty());
}

#[test]
fn test_conflicting_descriptors_drop_name() {
    let mut trie = MutableDunderNameTrie::new();
    trie.add_name_items(vec![
        (indexed_name("listing"), entity("bookings_source")),
        (indexed_name("listing"), entity("listings_latest")),
        (indexed_name("listing"), entity("bookings_source")),
        (indexed_name("user"), entity("users_latest")),
    ]);
    let trie = trie.freeze();
    assert_eq!(trie.names(None), vec!["user"]);
    assert!(!trie.contains(&indexed_name("listing")));
}

#[test]
fn test_names_limited_by_length() {
    let a = trie(&["listing", "listing__user", "listing__user__home"], "bookings_source");
    assert_eq!(a.names(Some(1)), vec!["listing"]);
    assert_eq!(a.names(Some(2)), vec!["listing", "listing__user"]);
    assert_eq!(a.len(), 3);
}
