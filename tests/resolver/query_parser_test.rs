// tests/resolver/query_parser_test.rs
#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeSet;

use insta::assert_snapshot;
use mantis_metrics::model::{entity_links, CallParameterSet, TimeGranularity};
use mantis_metrics::resolver::{
    InvalidQueryReport, MetricParameter, QueryParameters, QueryParser, ResolutionIssueKind,
};
use mantis_metrics::semantic::SemanticManifestLookup;
use mantis_metrics::spec::{DimensionSpec, MetricSpec, TimeDimensionSpec};

fn report(lookup: &SemanticManifestLookup, params: &QueryParameters) -> InvalidQueryReport {
    QueryParser::new(lookup)
        .parse_and_validate_query(params)
        .unwrap_err()
        .report()
        .cloned()
        .unwrap()
}

fn models(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[test]
fn test_local_dimension() {
    let lookup = common::lookup();
    let result = QueryParser::new(&lookup)
        .parse_and_validate_query(
            &QueryParameters::new()
                .with_metrics(&["bookings"])
                .with_group_by(&["booking__is_instant"]),
        )
        .unwrap();

    assert_eq!(result.query_spec.metric_specs, vec![MetricSpec::new("bookings")]);
    assert_eq!(
        result.query_spec.dimension_specs,
        vec![DimensionSpec::new("is_instant", entity_links(&["booking"]))]
    );
    assert_eq!(result.queried_semantic_models, models(&["bookings_source"]));
}

#[test]
fn test_multi_hop_dimension() {
    let lookup = common::lookup();
    let result = QueryParser::new(&lookup)
        .parse_and_validate_query(
            &QueryParameters::new()
                .with_metrics(&["bookings"])
                .with_group_by(&["listing__user__home_state_latest"]),
        )
        .unwrap();

    assert_eq!(
        result.query_spec.dimension_specs,
        vec![DimensionSpec::new(
            "home_state_latest",
            entity_links(&["listing", "user"])
        )]
    );
    assert_eq!(
        result.queried_semantic_models,
        models(&["bookings_source", "listings_latest", "users_latest"])
    );
}

#[test]
fn test_object_builder_syntax() {
    let lookup = common::lookup();
    let result = QueryParser::new(&lookup)
        .parse_and_validate_query(
            &QueryParameters::new()
                .with_metrics(&["bookings"])
                .with_group_by(&["Dimension('listing__country_latest')"]),
        )
        .unwrap();

    assert_eq!(
        result.query_spec.dimension_specs,
        vec![DimensionSpec::new("country_latest", entity_links(&["listing"]))]
    );
}

#[test]
fn test_metric_time_defaults_to_coarsest_metric_grain() {
    let lookup = common::lookup();
    let result = QueryParser::new(&lookup)
        .parse_and_validate_query(
            &QueryParameters::new()
                .with_metrics(&["revenue", "bookings"])
                .with_group_by(&["metric_time"]),
        )
        .unwrap();

    assert_eq!(
        result.query_spec.time_dimension_specs,
        vec![TimeDimensionSpec::metric_time(TimeGranularity::Month.into())]
    );
    assert_eq!(
        result.queried_semantic_models,
        models(&["bookings_source", "revenue"])
    );
}

#[test]
fn test_cumulative_metric_requires_metric_time() {
    let lookup = common::lookup();
    let report = report(
        &lookup,
        &QueryParameters::new().with_metrics(&["revenue_cumulative"]),
    );
    assert!(report.contains(|kind| matches!(
        kind,
        ResolutionIssueKind::MetricTimeRequired { metric } if metric == "revenue_cumulative"
    )));
    assert!(report.to_string().contains("metric_time"));

    let result = QueryParser::new(&lookup)
        .parse_and_validate_query(
            &QueryParameters::new()
                .with_metrics(&["revenue_cumulative"])
                .with_group_by(&["metric_time__week"]),
        )
        .unwrap();
    assert_eq!(
        result.query_spec.time_dimension_specs,
        vec![TimeDimensionSpec::metric_time(TimeGranularity::Week.into())]
    );
}

#[test]
fn test_offset_metric_requires_metric_time() {
    let lookup = common::lookup();
    let report = report(
        &lookup,
        &QueryParameters::new()
            .with_metrics(&["bookings_growth_2_weeks"])
            .with_group_by(&["booking__is_instant"]),
    );
    assert!(report.contains(|kind| matches!(kind, ResolutionIssueKind::MetricTimeRequired { .. })));
}

#[test]
fn test_duplicate_metric() {
    let lookup = common::lookup();
    let report = report(
        &lookup,
        &QueryParameters::new().with_metrics(&["bookings", "bookings"]),
    );
    assert!(report.contains(|kind| matches!(
        kind,
        ResolutionIssueKind::DuplicateMetric { metrics } if metrics == &vec!["bookings".to_string()]
    )));
}

#[test]
fn test_alias_collides_with_group_by() {
    let lookup = common::lookup();
    let report = report(
        &lookup,
        &QueryParameters::new()
            .with_metric_parameters(vec![
                MetricParameter::new("bookings").with_alias("booking__is_instant")
            ])
            .with_group_by(&["booking__is_instant"]),
    );
    assert!(report.contains(|kind| matches!(
        kind,
        ResolutionIssueKind::DuplicateOutputColumn { column } if column == "booking__is_instant"
    )));
}

#[test]
fn test_negative_limit_report() {
    let lookup = common::lookup();
    let report = report(
        &lookup,
        &QueryParameters::new().with_metrics(&["bookings"]).with_limit(-1),
    );
    assert_snapshot!(report.to_string(), @r"
    Got errors while resolving the query.

    Error #1:
      Input: Limit(-1)
      Message: The limit must be a non-negative integer, got -1
    ");
}

#[test]
fn test_unknown_group_by_item_gets_suggestions() {
    let lookup = common::lookup();
    let report = report(
        &lookup,
        &QueryParameters::new()
            .with_metrics(&["bookings"])
            .with_group_by(&["booking__is_instan"]),
    );
    let entry = &report.entries()[0];
    assert_eq!(entry.input, "GroupBy('booking__is_instan')");
    assert!(matches!(
        &entry.issue.kind,
        ResolutionIssueKind::NoMatchingItemsForSimpleMetric { metric } if metric == "bookings"
    ));
    assert!(entry
        .issue
        .suggestions
        .contains(&"booking__is_instant".to_string()));
}

#[test]
fn test_item_not_common_to_all_metrics() {
    let lookup = common::lookup();
    let report = report(
        &lookup,
        &QueryParameters::new()
            .with_metrics(&["bookings", "views"])
            .with_group_by(&["booking__is_instant"]),
    );
    assert!(report.contains(|kind| matches!(
        kind,
        ResolutionIssueKind::NoMatchingItemsForSimpleMetric { metric } if metric == "views"
    )));
}

#[test]
fn test_min_max_only_and_apply_group_by() {
    let lookup = common::lookup();
    let report = report(
        &lookup,
        &QueryParameters::new()
            .with_group_by(&["listing__country_latest", "metric_time"])
            .with_min_max_only(true),
    );
    assert!(report.contains(|kind| matches!(
        kind,
        ResolutionIssueKind::InvalidMinMaxOnly { reason } if reason == "requires exactly one group-by item"
    )));

    let report = self::report(
        &lookup,
        &QueryParameters::new()
            .with_metrics(&["bookings"])
            .with_apply_group_by(false),
    );
    assert!(report.contains(|kind| matches!(kind, ResolutionIssueKind::InvalidApplyGroupBy)));
}

#[test]
fn test_distinct_values_query() {
    let lookup = common::lookup();
    let result = QueryParser::new(&lookup)
        .parse_and_validate_query(
            &QueryParameters::new()
                .with_group_by(&["listing__country_latest"])
                .with_apply_group_by(false),
        )
        .unwrap();

    assert!(result.query_spec.metric_specs.is_empty());
    assert!(!result.query_spec.apply_group_by);
    assert_eq!(
        result.query_spec.dimension_specs,
        vec![DimensionSpec::new("country_latest", entity_links(&["listing"]))]
    );
    assert!(result.queried_semantic_models.contains("listings_latest"));
}

#[test]
fn test_order_by() {
    let lookup = common::lookup();
    let result = QueryParser::new(&lookup)
        .parse_and_validate_query(
            &QueryParameters::new()
                .with_metrics(&["bookings"])
                .with_group_by(&["metric_time__day"])
                .with_order_by(&["-bookings", "metric_time__day"]),
        )
        .unwrap();
    let order_by = &result.query_spec.order_by_specs;
    assert_eq!(order_by.len(), 2);
    assert!(order_by[0].descending);
    assert_eq!(order_by[0].instance_spec.output_name(), "bookings");
    assert!(!order_by[1].descending);
    assert_eq!(order_by[1].instance_spec.output_name(), "metric_time__day");

    let report = report(
        &lookup,
        &QueryParameters::new()
            .with_metrics(&["bookings"])
            .with_order_by(&["listing__country_latest"]),
    );
    assert!(report.contains(|kind| matches!(kind, ResolutionIssueKind::InvalidOrderByItem { .. })));
}

#[test]
fn test_time_constraint() {
    let lookup = common::lookup();
    let result = QueryParser::new(&lookup)
        .parse_and_validate_query(
            &QueryParameters::new()
                .with_metrics(&["bookings"])
                .with_time_constraint(Some("2024-01-01"), Some("2024-03-31")),
        )
        .unwrap();
    let range = result.query_spec.time_range_constraint.unwrap();
    assert_eq!(range.start_time.to_string(), "2024-01-01 00:00:00");
    assert_eq!(range.end_time.to_string(), "2024-03-31 00:00:00");

    let report = report(
        &lookup,
        &QueryParameters::new()
            .with_metrics(&["bookings"])
            .with_time_constraint(Some("2024-03-31"), Some("2024-01-01")),
    );
    assert!(report.contains(|kind| matches!(kind, ResolutionIssueKind::InvalidTimeRange { .. })));
}

#[test]
fn test_query_filter_models_are_queried() {
    let lookup = common::lookup();
    let result = QueryParser::new(&lookup)
        .parse_and_validate_query(
            &QueryParameters::new()
                .with_metrics(&["bookings"])
                .with_where_filter(common::filter(
                    "{{ Dimension('listing__country_latest') }} = 'us'",
                    vec![CallParameterSet::dimension("listing__country_latest")],
                )),
        )
        .unwrap();
    assert!(result.queried_semantic_models.contains("listings_latest"));
    assert_eq!(
        result
            .query_spec
            .filter_spec_resolution_lookup
            .spec_resolutions()
            .len(),
        1
    );
}
