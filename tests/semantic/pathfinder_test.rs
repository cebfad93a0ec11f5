// tests/semantic/pathfinder_test.rs
#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeSet;

use mantis_metrics::config::PathfinderSettings;
use mantis_metrics::semantic::linkable::builder::find_join_paths;
use mantis_metrics::semantic::pathfinder::{reset_traversal_counters, traversal_counters};
use mantis_metrics::semantic::{Label, LabelSet, LabeledGraph, Pathfinder, TraversalOptions};

#[test]
fn test_cumulative_metric_blocked_by_date_part_denial() {
    let lookup = common::lookup();
    let graph = lookup.graph();
    let metric = graph.metric_node("revenue_cumulative").unwrap();
    let revenue = graph.measure_node("revenue").unwrap();
    let measures = graph.nodes_with_labels(&[Label::Measure]);

    let open = lookup.pathfinder().find_descendants(
        graph,
        &BTreeSet::from([metric]),
        &measures,
        &TraversalOptions::default(),
    );
    assert_eq!(open.reached_target_nodes, BTreeSet::from([revenue]));
    assert!(open.labels.contains(Label::DenyDatePart));

    let denied = lookup.pathfinder().find_descendants(
        graph,
        &BTreeSet::from([metric]),
        &measures,
        &TraversalOptions::deny(LabelSet::of(&[Label::DenyDatePart])),
    );
    assert!(denied.reached_target_nodes.is_empty());
    assert!(!denied.reachable_nodes.contains(&revenue));
}

#[test]
fn test_conversion_hides_conversion_measure() {
    let lookup = common::lookup();
    let graph = lookup.graph();
    let metric = graph.metric_node("visit_buy_conversion_rate").unwrap();
    let measures = graph.nodes_with_labels(&[Label::Measure]);

    let visible = lookup.pathfinder().find_descendants(
        graph,
        &BTreeSet::from([metric]),
        &measures,
        &TraversalOptions::deny(LabelSet::of(&[Label::DenyVisibleAttributes])),
    );
    assert_eq!(
        visible.reached_target_nodes,
        BTreeSet::from([graph.measure_node("visits").unwrap()])
    );

    let all = lookup.pathfinder().find_descendants(
        graph,
        &BTreeSet::from([metric]),
        &measures,
        &TraversalOptions::default(),
    );
    assert_eq!(
        all.reached_target_nodes,
        BTreeSet::from([
            graph.measure_node("visits").unwrap(),
            graph.measure_node("buys").unwrap(),
        ])
    );
}

#[test]
fn test_sources_by_target() {
    let lookup = common::lookup();
    let graph = lookup.graph();
    let ratio = graph.metric_node("booking_value_per_booking").unwrap();
    let growth = graph.metric_node("bookings_growth_2_weeks").unwrap();
    let bookings = graph.measure_node("bookings").unwrap();

    let result = lookup.pathfinder().find_descendants(
        graph,
        &BTreeSet::from([ratio, growth]),
        &BTreeSet::from([bookings]),
        &TraversalOptions::default(),
    );
    assert_eq!(
        result.source_nodes_by_target.get(&bookings),
        Some(&BTreeSet::from([ratio, growth]))
    );
}

#[test]
fn test_ancestors_of_model() {
    let lookup = common::lookup();
    let metrics = lookup.metrics_for_semantic_model("bookings_source").unwrap();
    for metric in [
        "bookings",
        "booking_value",
        "bookings_growth_2_weeks",
        "bookings_at_start_of_month",
        "booking_value_per_booking",
        "instant_bookings",
        "lux_booking_fraction",
    ] {
        assert!(metrics.contains(metric), "missing {metric}");
    }
    assert!(!metrics.contains("views"));
    assert!(!metrics.contains("listings"));
}

#[test]
fn test_iteration_cap_marks_exhaustion() {
    let lookup = common::lookup();
    let graph = lookup.graph();
    let pathfinder = Pathfinder::new(&PathfinderSettings {
        max_iterations: 1,
        warn_on_exhaustion: false,
    });
    let metric = graph.metric_node("bookings_growth_2_weeks").unwrap();

    let result = pathfinder.find_descendants(
        graph,
        &BTreeSet::from([metric]),
        &graph.nodes_with_labels(&[Label::Measure]),
        &TraversalOptions::default(),
    );
    assert!(result.exhausted);
    assert!(result.reached_target_nodes.is_empty());
}

#[test]
fn test_join_paths_from_bookings() {
    let lookup = common::lookup();
    let paths = find_join_paths(lookup.graph(), lookup.pathfinder(), "bookings_source", 2);

    let described: Vec<(usize, String)> = paths
        .iter()
        .map(|p| (p.join_count(), p.last_model().to_string()))
        .collect();
    assert_eq!(
        described,
        vec![
            (0, "bookings_source".to_string()),
            (1, "listings_latest".to_string()),
            (2, "users_latest".to_string()),
        ]
    );

    let one_hop = find_join_paths(lookup.graph(), lookup.pathfinder(), "bookings_source", 1);
    assert_eq!(one_hop.len(), 2);
}

#[test]
fn test_traversal_counters() {
    let lookup = common::lookup();
    reset_traversal_counters();
    lookup.measures_for_metric("bookings").unwrap();
    assert!(traversal_counters().bfs_searches >= 1);

    reset_traversal_counters();
    assert_eq!(traversal_counters().bfs_searches, 0);
}
