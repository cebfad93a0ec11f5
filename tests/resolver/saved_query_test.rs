// tests/resolver/saved_query_test.rs
#[path = "../common/mod.rs"]
mod common;

use mantis_metrics::model::{entity_links, CallParameterSet};
use mantis_metrics::resolver::{QueryParser, ResolutionIssueKind, WhereFilterLocation};
use mantis_metrics::spec::{DimensionSpec, LinkableInstanceSpec, MetricSpec};

#[test]
fn test_saved_query_resolves() {
    let lookup = common::lookup();
    let result = QueryParser::new(&lookup)
        .parse_and_validate_saved_query("bookings_by_country", None, Some(5), &[])
        .unwrap();
    let spec = &result.query_spec;

    assert_eq!(spec.metric_specs, vec![MetricSpec::new("bookings")]);
    assert_eq!(
        spec.dimension_specs,
        vec![DimensionSpec::new("country_latest", entity_links(&["listing"]))]
    );
    assert_eq!(spec.limit, Some(5));

    let instant = spec
        .filter_spec_resolution_lookup
        .checked_resolution(
            &WhereFilterLocation::Query,
            &CallParameterSet::dimension("booking__is_instant"),
        )
        .unwrap();
    assert_eq!(
        instant.resolved_spec,
        Some(LinkableInstanceSpec::from(DimensionSpec::new(
            "is_instant",
            entity_links(&["booking"])
        )))
    );
    assert!(result.queried_semantic_models.contains("listings_latest"));
    assert!(result.queried_semantic_models.contains("bookings_source"));
}

#[test]
fn test_caller_filter_is_combined() {
    let lookup = common::lookup();
    let extra = common::filter(
        "{{ Dimension('listing__is_lux_latest') }}",
        vec![CallParameterSet::dimension("listing__is_lux_latest")],
    );
    let result = QueryParser::new(&lookup)
        .parse_and_validate_saved_query(
            "bookings_by_country",
            Some(&extra),
            None,
            &["-bookings".to_string()],
        )
        .unwrap();
    let spec = &result.query_spec;

    let filters = spec.filter_intersection.as_ref().unwrap();
    assert_eq!(filters.where_filters.len(), 2);
    assert_eq!(spec.filter_spec_resolution_lookup.spec_resolutions().len(), 2);
    assert_eq!(spec.order_by_specs.len(), 1);
    assert!(spec.order_by_specs[0].descending);
}

#[test]
fn test_unknown_saved_query() {
    let lookup = common::lookup();
    let err = QueryParser::new(&lookup)
        .parse_and_validate_saved_query("bookings_by_county", None, None, &[])
        .unwrap_err();
    let report = err.report().unwrap();
    let entry = &report.entries()[0];

    assert_eq!(entry.input, "SavedQuery('bookings_by_county')");
    assert!(matches!(
        &entry.issue.kind,
        ResolutionIssueKind::InvalidSavedQuery { name } if name == "bookings_by_county"
    ));
    assert_eq!(entry.issue.suggestions, vec!["bookings_by_country".to_string()]);
}
