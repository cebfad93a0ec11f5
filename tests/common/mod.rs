// tests/common/mod.rs
//! Shared fixture: a small bookings marketplace.
#![allow(dead_code)]

use mantis_metrics::model::{
    CallParameterSet, EntityType, Metric, MetricInput, SavedQuery, SemanticManifest,
    SemanticModel, TimeGranularity, WhereFilter, WhereFilterIntersection,
};
use mantis_metrics::semantic::SemanticManifestLookup;

pub fn filter(template: &str, call_parameter_sets: Vec<CallParameterSet>) -> WhereFilterIntersection {
    WhereFilterIntersection::single(WhereFilter::new(template, call_parameter_sets))
}

pub fn manifest() -> SemanticManifest {
    SemanticManifest::new()
        .with_semantic_model(
            SemanticModel::new("bookings_source")
                .with_primary_entity("booking")
                .with_default_agg_time_dimension("ds")
                .with_entity("booking", EntityType::Primary)
                .with_entity("listing", EntityType::Foreign)
                .with_categorical("is_instant")
                .with_time_dimension("ds", TimeGranularity::Day)
                .with_measure("bookings")
                .with_measure("booking_value"),
        )
        .with_semantic_model(
            SemanticModel::new("listings_latest")
                .with_primary_entity("listing")
                .with_default_agg_time_dimension("created_at")
                .with_entity("listing", EntityType::Primary)
                .with_entity("user", EntityType::Foreign)
                .with_categorical("country_latest")
                .with_categorical("is_lux_latest")
                .with_time_dimension("created_at", TimeGranularity::Day)
                .with_measure("listings"),
        )
        .with_semantic_model(
            SemanticModel::new("users_latest")
                .with_primary_entity("user")
                .with_entity("user", EntityType::Primary)
                .with_categorical("home_state_latest"),
        )
        .with_semantic_model(
            SemanticModel::new("revenue")
                .with_primary_entity("revenue_instance")
                .with_default_agg_time_dimension("ds")
                .with_entity("revenue_instance", EntityType::Primary)
                .with_entity("user", EntityType::Foreign)
                .with_time_dimension("ds", TimeGranularity::Day)
                .with_measure("revenue"),
        )
        .with_semantic_model(
            SemanticModel::new("visits_source")
                .with_primary_entity("visit")
                .with_default_agg_time_dimension("ds")
                .with_entity("visit", EntityType::Primary)
                .with_entity("user", EntityType::Foreign)
                .with_categorical("referrer_id")
                .with_time_dimension("ds", TimeGranularity::Day)
                .with_measure("visits"),
        )
        .with_semantic_model(
            SemanticModel::new("buys_source")
                .with_primary_entity("buy")
                .with_default_agg_time_dimension("ds")
                .with_entity("buy", EntityType::Primary)
                .with_entity("user", EntityType::Foreign)
                .with_time_dimension("ds", TimeGranularity::Day)
                .with_measure("buys"),
        )
        .with_semantic_model(
            SemanticModel::new("views_source")
                .with_primary_entity("view")
                .with_default_agg_time_dimension("ds")
                .with_entity("view", EntityType::Primary)
                .with_categorical("device")
                .with_time_dimension("ds", TimeGranularity::Day)
                .with_measure("views"),
        )
        .with_metric(Metric::simple("bookings", "bookings"))
        .with_metric(Metric::simple("booking_value", "booking_value"))
        .with_metric(Metric::simple("listings", "listings"))
        .with_metric(Metric::simple("revenue", "revenue").with_time_granularity(TimeGranularity::Month))
        .with_metric(Metric::simple("views", "views"))
        .with_metric(Metric::simple("visits", "visits"))
        .with_metric(Metric::cumulative("revenue_cumulative", "revenue", Some("7 days")))
        .with_metric(Metric::derived(
            "bookings_growth_2_weeks",
            "bookings - bookings_2_weeks_ago",
            vec![
                MetricInput::new("bookings"),
                MetricInput::new("bookings")
                    .with_offset_window("14 days")
                    .with_alias("bookings_2_weeks_ago"),
            ],
        ))
        .with_metric(Metric::derived(
            "bookings_at_start_of_month",
            "bookings_start_of_month",
            vec![MetricInput::new("bookings")
                .with_offset_to_grain(TimeGranularity::Month)
                .with_alias("bookings_start_of_month")],
        ))
        .with_metric(Metric::ratio(
            "booking_value_per_booking",
            MetricInput::new("booking_value"),
            MetricInput::new("bookings"),
        ))
        .with_metric(Metric::conversion(
            "visit_buy_conversion_rate",
            "visits",
            "buys",
            "user",
        ))
        .with_metric(
            Metric::simple("instant_bookings", "bookings").with_filter(filter(
                "{{ Dimension('booking__is_instant') }}",
                vec![CallParameterSet::dimension("booking__is_instant")],
            )),
        )
        .with_metric(Metric::ratio(
            "lux_booking_fraction",
            MetricInput::new("bookings").with_filter(filter(
                "{{ Dimension('listing__is_lux_latest') }}",
                vec![CallParameterSet::dimension("listing__is_lux_latest")],
            )),
            MetricInput::new("bookings"),
        ))
        .with_saved_query(
            SavedQuery::new(
                "bookings_by_country",
                &["bookings"],
                &["listing__country_latest"],
            )
            .with_where_filter(filter(
                "{{ Dimension('booking__is_instant') }}",
                vec![CallParameterSet::dimension("booking__is_instant")],
            )),
        )
}

pub fn lookup() -> SemanticManifestLookup {
    SemanticManifestLookup::new(manifest()).expect("fixture manifest is valid")
}
