// tests/resolver/filter_resolver_test.rs
#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeSet;

use mantis_metrics::model::{entity_links, CallParameterSet, TimeGranularity, WhereFilterIntersection};
use mantis_metrics::resolver::{
    FilterSpecResolutionLookup, ResolutionDag, ResolutionIssueKind, SuggestionGenerator,
    WhereFilterLocation, WhereFilterSpecResolver,
};
use mantis_metrics::semantic::SemanticManifestLookup;
use mantis_metrics::spec::{DimensionSpec, LinkableInstanceSpec, TimeDimensionSpec};

fn resolve(
    lookup: &SemanticManifestLookup,
    metrics: &[&str],
    filter: Option<WhereFilterIntersection>,
) -> FilterSpecResolutionLookup {
    let metrics: Vec<String> = metrics.iter().map(|m| m.to_string()).collect();
    let dag = ResolutionDag::build(lookup, &metrics, filter).unwrap();
    WhereFilterSpecResolver::new(lookup, &dag, SuggestionGenerator::disabled())
        .resolve_lookup()
        .unwrap()
}

#[test]
fn test_metric_filter() {
    let lookup = common::lookup();
    let resolutions = resolve(&lookup, &["instant_bookings"], None);

    let location = WhereFilterLocation::Metric {
        metric: "instant_bookings".to_string(),
    };
    let resolution = resolutions
        .checked_resolution(&location, &CallParameterSet::dimension("booking__is_instant"))
        .unwrap();
    assert_eq!(
        resolution.resolved_spec,
        Some(LinkableInstanceSpec::from(DimensionSpec::new(
            "is_instant",
            entity_links(&["booking"])
        )))
    );
    assert_eq!(
        resolution.semantic_models,
        BTreeSet::from(["bookings_source".to_string()])
    );
    assert_eq!(location.to_string(), "Metric('instant_bookings')");
}

#[test]
fn test_input_metric_filter_sees_input_items() {
    let lookup = common::lookup();
    let resolutions = resolve(&lookup, &["lux_booking_fraction"], None);

    let location = WhereFilterLocation::InputMetric {
        parent: "lux_booking_fraction".to_string(),
        input: "bookings".to_string(),
    };
    let resolution = resolutions
        .checked_resolution(&location, &CallParameterSet::dimension("listing__is_lux_latest"))
        .unwrap();
    assert_eq!(
        resolution.resolved_spec,
        Some(LinkableInstanceSpec::from(DimensionSpec::new(
            "is_lux_latest",
            entity_links(&["listing"])
        )))
    );
    assert!(resolution.semantic_models.contains("listings_latest"));
    assert!(resolutions.queried_semantic_models().contains("bookings_source"));
    assert!(!resolutions.issue_set().has_errors());

    // The filter is scoped to the input, not to the parent metric.
    assert!(resolutions
        .get(
            &WhereFilterLocation::Metric {
                metric: "lux_booking_fraction".to_string()
            },
            &CallParameterSet::dimension("listing__is_lux_latest"),
        )
        .is_none());
}

#[test]
fn test_query_filter_with_time_dimension() {
    let lookup = common::lookup();
    let filter = common::filter(
        "{{ TimeDimension('metric_time', 'month') }} >= '2024-01-01'",
        vec![CallParameterSet::time_dimension("metric_time", Some("month"))],
    );
    let resolutions = resolve(&lookup, &["bookings", "views"], Some(filter));

    let resolution = resolutions
        .checked_resolution(
            &WhereFilterLocation::Query,
            &CallParameterSet::time_dimension("metric_time", Some("month")),
        )
        .unwrap();
    assert_eq!(
        resolution.resolved_spec,
        Some(LinkableInstanceSpec::from(TimeDimensionSpec::metric_time(
            TimeGranularity::Month.into()
        )))
    );
}

#[test]
fn test_query_filter_not_visible_to_every_metric() {
    let lookup = common::lookup();
    let filter = common::filter(
        "{{ Dimension('listing__is_lux_latest') }}",
        vec![CallParameterSet::dimension("listing__is_lux_latest")],
    );
    let resolutions = resolve(&lookup, &["bookings", "views"], Some(filter));

    let resolution = resolutions
        .get(
            &WhereFilterLocation::Query,
            &CallParameterSet::dimension("listing__is_lux_latest"),
        )
        .unwrap();
    assert!(resolution.resolved_spec.is_none());
    assert!(resolution.issue_set.issues().iter().any(|issue| matches!(
        &issue.kind,
        ResolutionIssueKind::NoMatchingItemsForSimpleMetric { metric } if metric == "views"
    )));
}

#[test]
fn test_missing_resolution_is_internal_error() {
    let lookup = common::lookup();
    let resolutions = resolve(&lookup, &["bookings"], None);
    assert!(resolutions.is_empty());
    assert!(resolutions
        .checked_resolution(
            &WhereFilterLocation::Query,
            &CallParameterSet::dimension("booking__is_instant"),
        )
        .is_err());
}
