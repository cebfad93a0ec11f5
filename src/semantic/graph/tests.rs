//! Tests for SemanticGraph.

use super::*;
use crate::error::InternalError;
use crate::model::{
    EntityType, Metric, MetricInput, SemanticManifest, SemanticModel, TimeGranularity,
};

fn sample_manifest() -> SemanticManifest {
    SemanticManifest::new()
        .with_semantic_model(
            SemanticModel::new("bookings_source")
                .with_primary_entity("booking")
                .with_default_agg_time_dimension("ds")
                .with_entity("booking", EntityType::Primary)
                .with_entity("listing", EntityType::Foreign)
                .with_time_dimension("ds", TimeGranularity::Day)
                .with_measure("bookings"),
        )
        .with_semantic_model(
            SemanticModel::new("listings_latest")
                .with_entity("listing", EntityType::Primary)
                .with_categorical("country_latest")
                .with_measure("listings"),
        )
        .with_metric(Metric::simple("bookings", "bookings"))
        .with_metric(Metric::simple("listings", "listings"))
        .with_metric(Metric::cumulative("bookings_7d", "bookings", Some("7 days")))
        .with_metric(Metric::derived(
            "bookings_growth",
            "bookings - bookings_last_month",
            vec![
                MetricInput::new("bookings"),
                MetricInput::new("bookings")
                    .with_offset_to_grain(TimeGranularity::Month)
                    .with_alias("bookings_last_month"),
            ],
        ))
}

#[test]
fn test_from_manifest() {
    let graph = SemanticGraph::from_manifest(&sample_manifest()).unwrap();

    // metric time + 2 × (local, joined) + 2 entity keys + 2 measures + 4 metrics
    assert_eq!(graph.node_count(), 1 + 4 + 2 + 2 + 4);
    assert!(graph.metric_node("bookings").is_some());
    assert_eq!(graph.model_for_measure("listings"), Some("listings_latest"));
}

#[test]
fn test_nodes_with_labels() {
    let graph = SemanticGraph::from_manifest(&sample_manifest()).unwrap();

    let base = graph.nodes_with_labels(&[Label::Metric, Label::BaseMetric]);
    assert_eq!(base.len(), 3);
    let derived = graph.nodes_with_labels(&[Label::DerivedMetric]);
    assert_eq!(
        derived.into_iter().collect::<Vec<_>>(),
        vec![graph.metric_node("bookings_growth").unwrap()]
    );
}

#[test]
fn test_join_edges_only_into_join_targets() {
    let graph = SemanticGraph::from_manifest(&sample_manifest()).unwrap();
    let listing = graph.entity_key_node("listing").unwrap();
    let joined_listings = graph.joined_model_node("listings_latest").unwrap();
    let joined_bookings = graph.joined_model_node("bookings_source").unwrap();

    let successors = graph.successors(listing);
    assert!(successors.contains(&joined_listings));
    // bookings_source only has `listing` as a foreign key
    assert!(!successors.contains(&joined_bookings));
    assert_eq!(
        graph.edge_labels(listing, joined_listings),
        Some(LabelSet::of(&[Label::JoinEdge]))
    );
}

#[test]
fn test_metric_edge_labels() {
    let graph = SemanticGraph::from_manifest(&sample_manifest()).unwrap();
    let cumulative = graph.metric_node("bookings_7d").unwrap();
    let measure = graph.measure_node("bookings").unwrap();
    let labels = graph.edge_labels(cumulative, measure).unwrap();
    assert!(labels.contains(Label::DenyDatePart));
    assert!(labels.contains(Label::DenyEntityKeyQueryResolution));

    // Both inputs point at `bookings`; the offset input's labels are merged in.
    let growth = graph.metric_node("bookings_growth").unwrap();
    let bookings = graph.metric_node("bookings").unwrap();
    let labels = graph.edge_labels(growth, bookings).unwrap();
    assert!(labels.contains(Label::DenyDatePart));
    assert_eq!(graph.edges_with_tail_node(growth).len(), 1);
}

#[test]
fn test_measure_reaches_metric_time() {
    let graph = SemanticGraph::from_manifest(&sample_manifest()).unwrap();
    let bookings = graph.measure_node("bookings").unwrap();
    let listings = graph.measure_node("listings").unwrap();
    assert!(graph.successors(bookings).contains(&graph.metric_time_node()));
    // listings_latest has no agg time dimension
    assert!(!graph.successors(listings).contains(&graph.metric_time_node()));
}

#[test]
fn test_unknown_references_are_internal_errors() {
    let manifest = sample_manifest().with_metric(Metric::simple("orphan", "no_such_measure"));
    let err = SemanticGraph::from_manifest(&manifest).unwrap_err();
    assert_eq!(err, InternalError::UnknownMeasure("no_such_measure".to_string()));

    let manifest = sample_manifest().with_metric(Metric::simple("bookings", "bookings"));
    let err = SemanticGraph::from_manifest(&manifest).unwrap_err();
    assert!(matches!(err, InternalError::DuplicateElement { kind: "metric", .. }));
}
