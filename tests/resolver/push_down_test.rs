// tests/resolver/push_down_test.rs
#[path = "../common/mod.rs"]
mod common;

use mantis_metrics::model::{DatePart, TimeGranularity};
use mantis_metrics::resolver::{PushDownResolver, PushDownResult, ResolutionDag, ResolutionIssueKind};
use mantis_metrics::semantic::SemanticManifestLookup;
use mantis_metrics::spec::{EntityLinkPattern, SpecPattern};

fn push_down(
    lookup: &SemanticManifestLookup,
    metrics: &[&str],
    patterns: &[SpecPattern],
) -> PushDownResult {
    let metrics: Vec<String> = metrics.iter().map(|m| m.to_string()).collect();
    let dag = ResolutionDag::build(lookup, &metrics, None).unwrap();
    let result = PushDownResolver::new(lookup, &dag, patterns)
        .resolve(dag.sink())
        .unwrap();
    assert_eq!(
        result.candidate_set.is_empty(),
        result.issue_set.has_errors(),
        "candidates and errors disagree for {metrics:?}"
    );
    result
}

fn qualified_names(result: &PushDownResult) -> Vec<String> {
    result
        .candidate_set
        .specs()
        .iter()
        .map(|spec| spec.qualified_name())
        .collect()
}

#[test]
fn test_every_metric_offers_candidates() {
    let lookup = common::lookup();
    for metric in lookup.metric_names() {
        let result = push_down(&lookup, &[metric], &[]);
        assert!(result.is_success(), "{metric}: {:?}", result.issue_set);
    }
    let result = push_down(&lookup, &[], &[]);
    assert!(result.is_success());
}

#[test]
fn test_conversion_offers_base_measure_items() {
    let lookup = common::lookup();
    let result = push_down(&lookup, &["visit_buy_conversion_rate"], &[]);
    let names = qualified_names(&result);
    assert!(names.contains(&"visit__referrer_id".to_string()));
    assert!(names.contains(&"metric_time__day".to_string()));
    assert!(!names.iter().any(|n| n.starts_with("buy__")));
}

#[test]
fn test_same_name_on_different_paths() {
    let lookup = common::lookup();
    let patterns: Vec<SpecPattern> = vec![EntityLinkPattern::new("ds", vec![]).into()];
    let result = push_down(&lookup, &["bookings", "views"], &patterns);

    let issue = &result.issue_set.issues()[0];
    match &issue.kind {
        ResolutionIssueKind::NoCommonItemsInParents { parents } => {
            assert_eq!(parents.len(), 2);
            let offered: Vec<&String> = parents.iter().flat_map(|p| p.items.iter()).collect();
            assert!(offered.contains(&&"booking__ds__day".to_string()));
            assert!(offered.contains(&&"view__ds__day".to_string()));
        }
        other => panic!("unexpected issue: {other:?}"),
    }
    assert_eq!(issue.path.to_string(), "[Resolve Query(['bookings', 'views'])]");
}

#[test]
fn test_offset_to_grain_excludes_date_parts() {
    let lookup = common::lookup();
    let patterns: Vec<SpecPattern> = vec![EntityLinkPattern::new("metric_time", vec![])
        .with_date_part(Some(DatePart::Year))
        .into()];

    let result = push_down(&lookup, &["bookings_at_start_of_month"], &patterns);
    assert!(matches!(
        result.issue_set.issues()[0].kind,
        ResolutionIssueKind::MetricExcludesDatePart { ref metric, .. } if metric == "bookings_at_start_of_month"
    ));

    // An offset window alone keeps date parts.
    let result = push_down(&lookup, &["bookings_growth_2_weeks"], &patterns);
    assert!(result.is_success());
}

#[test]
fn test_unreachable_dimension_reports_metric() {
    let lookup = common::lookup();
    let patterns: Vec<SpecPattern> =
        vec![EntityLinkPattern::new("device", mantis_metrics::model::entity_links(&["view"])).into()];
    let result = push_down(&lookup, &["bookings"], &patterns);
    assert!(matches!(
        &result.issue_set.issues()[0].kind,
        ResolutionIssueKind::NoMatchingItemsForSimpleMetric { metric } if metric == "bookings"
    ));
}

#[test]
fn test_max_default_grain() {
    let lookup = common::lookup();
    let result = push_down(&lookup, &["revenue", "bookings"], &[]);
    assert_eq!(
        result.max_metric_default_time_granularity,
        Some(TimeGranularity::Month)
    );

    let result = push_down(&lookup, &["bookings"], &[]);
    assert_eq!(
        result.max_metric_default_time_granularity,
        Some(TimeGranularity::Day)
    );
}
