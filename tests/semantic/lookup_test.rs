// tests/semantic/lookup_test.rs
#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeSet;

use mantis_metrics::config::Settings;
use mantis_metrics::model::{entity_links, TimeGranularity};
use mantis_metrics::semantic::SemanticManifestLookup;
use mantis_metrics::spec::ElementPathKey;

#[test]
fn test_linkable_elements_for_measure() {
    let lookup = common::lookup();
    let elements = lookup.linkable_elements_for_measure("bookings").unwrap();

    assert!(elements.contains_key(&ElementPathKey::dimension(
        "is_instant",
        entity_links(&["booking"])
    )));
    assert!(elements.contains_key(&ElementPathKey::dimension(
        "country_latest",
        entity_links(&["listing"])
    )));
    assert!(elements.contains_key(&ElementPathKey::dimension(
        "home_state_latest",
        entity_links(&["listing", "user"])
    )));
    assert!(elements.contains_key(&ElementPathKey::time_dimension(
        "metric_time",
        vec![],
        Some(TimeGranularity::Month.into()),
        None,
    )));
    assert!(elements.contains_key(&ElementPathKey::entity(
        "user",
        entity_links(&["listing"])
    )));
    // Views live in a model nothing joins to.
    assert!(!elements.contains_key(&ElementPathKey::dimension(
        "device",
        entity_links(&["view"])
    )));
}

#[test]
fn test_join_hops_are_configurable() {
    let mut settings = Settings::default();
    settings.joins.max_join_hops = 1;
    let lookup = SemanticManifestLookup::with_settings(common::manifest(), settings).unwrap();
    let elements = lookup.linkable_elements_for_measure("bookings").unwrap();

    assert!(elements.contains_key(&ElementPathKey::dimension(
        "country_latest",
        entity_links(&["listing"])
    )));
    assert!(!elements.contains_key(&ElementPathKey::dimension(
        "home_state_latest",
        entity_links(&["listing", "user"])
    )));
}

#[test]
fn test_no_metrics_query_elements() {
    let lookup = common::lookup();
    let elements = lookup.linkable_elements_for_no_metrics_query().unwrap();

    assert!(elements.contains_key(&ElementPathKey::dimension(
        "home_state_latest",
        entity_links(&["user"])
    )));
    assert!(elements.contains_key(&ElementPathKey::dimension(
        "device",
        entity_links(&["view"])
    )));
    assert!(elements.contains_key(&ElementPathKey::time_dimension(
        "metric_time",
        vec![],
        Some(TimeGranularity::Day.into()),
        None,
    )));
    assert!(!elements.contains_key(&ElementPathKey::dimension(
        "home_state_latest",
        entity_links(&["listing", "user"])
    )));
}

#[test]
fn test_metric_default_time_granularity() {
    let lookup = common::lookup();
    assert_eq!(
        lookup.metric_default_time_granularity("revenue").unwrap(),
        TimeGranularity::Month
    );
    assert_eq!(
        lookup.metric_default_time_granularity("bookings").unwrap(),
        TimeGranularity::Day
    );
    assert_eq!(
        lookup
            .metric_default_time_granularity("booking_value_per_booking")
            .unwrap(),
        TimeGranularity::Day
    );
}

#[test]
fn test_models_for_metric() {
    let lookup = common::lookup();
    assert_eq!(
        lookup.semantic_models_for_metric("visit_buy_conversion_rate").unwrap(),
        BTreeSet::from(["visits_source".to_string(), "buys_source".to_string()])
    );
    assert_eq!(
        lookup.measures_for_metric("bookings_growth_2_weeks").unwrap(),
        BTreeSet::from(["bookings".to_string()])
    );
    assert!(lookup.semantic_models_for_metric("nope").is_err());
}

#[test]
fn test_measure_elements_are_cached() {
    let lookup = common::lookup();
    let first = lookup.linkable_elements_for_measure("listings").unwrap();
    let second = lookup.linkable_elements_for_measure("listings").unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}
