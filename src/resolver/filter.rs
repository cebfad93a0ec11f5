//! Resolution of the references inside where filters.
//!
//! A filter can be attached to the query, to a metric (its own filter and the
//! filters on its input measures), or to one input of a ratio/derived metric.
//! Each reference is resolved against the items visible where the filter is
//! defined: a filter on an input metric sees what that input metric can be
//! grouped by, not what the whole query can.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use petgraph::graph::NodeIndex;
use serde::Serialize;
use tracing::debug;

use super::dag::{ResolutionDag, ResolutionDagNode};
use super::group_by_item::GroupByItemResolver;
use super::issues::{IssueSet, ResolutionIssue, ResolutionIssueKind, ResolutionPath};
use super::naming::pattern_for_call_parameter_set;
use super::suggestions::SuggestionGenerator;
use crate::error::{InternalError, InternalResult};
use crate::model::{CallParameterSet, WhereFilterIntersection};
use crate::semantic::graph::LabeledGraph;
use crate::semantic::SemanticManifestLookup;
use crate::spec::LinkableInstanceSpec;

/// Where a filter is defined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WhereFilterLocation {
    Query,
    /// The metric's own filter, or a filter on one of its input measures.
    Metric { metric: String },
    /// The filter a ratio/derived metric puts on one of its inputs.
    InputMetric { parent: String, input: String },
}

impl fmt::Display for WhereFilterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhereFilterLocation::Query => f.write_str("Query"),
            WhereFilterLocation::Metric { metric } => write!(f, "Metric('{metric}')"),
            WhereFilterLocation::InputMetric { parent, input } => {
                write!(f, "Metric('{parent}').input('{input}')")
            }
        }
    }
}

/// A reference in a filter resolved to a spec (or the issues explaining why not).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpecResolution {
    pub location: WhereFilterLocation,
    pub call_parameter_set: CallParameterSet,
    /// Template of the first filter at this location that used the reference.
    pub where_filter_template: String,
    pub resolved_spec: Option<LinkableInstanceSpec>,
    /// Models behind the resolved spec.
    pub semantic_models: BTreeSet<String>,
    pub issue_set: IssueSet,
}

/// A filter whose template could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonParsableFilterResolution {
    pub location: WhereFilterLocation,
    pub where_filter_template: String,
    pub error: String,
    pub issue_set: IssueSet,
}

/// Every filter reference in a query, keyed by location and reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpecResolutionLookup {
    spec_resolutions: Vec<FilterSpecResolution>,
    non_parsable_resolutions: Vec<NonParsableFilterResolution>,
}

impl FilterSpecResolutionLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &self,
        location: &WhereFilterLocation,
        call_parameter_set: &CallParameterSet,
    ) -> Option<&FilterSpecResolution> {
        self.spec_resolutions
            .iter()
            .find(|r| &r.location == location && &r.call_parameter_set == call_parameter_set)
    }

    /// Like [`get`](Self::get), but a missing resolution is an internal error:
    /// every reference in a resolved query has a resolution.
    pub fn checked_resolution(
        &self,
        location: &WhereFilterLocation,
        call_parameter_set: &CallParameterSet,
    ) -> InternalResult<&FilterSpecResolution> {
        self.get(location, call_parameter_set).ok_or_else(|| {
            InternalError::MissingFilterResolution(format!("{call_parameter_set} at {location}"))
        })
    }

    pub fn spec_resolutions(&self) -> &[FilterSpecResolution] {
        &self.spec_resolutions
    }

    pub fn non_parsable_resolutions(&self) -> &[NonParsableFilterResolution] {
        &self.non_parsable_resolutions
    }

    pub fn is_empty(&self) -> bool {
        self.spec_resolutions.is_empty() && self.non_parsable_resolutions.is_empty()
    }

    pub fn issue_set(&self) -> IssueSet {
        IssueSet::merged(
            self.spec_resolutions
                .iter()
                .map(|r| &r.issue_set)
                .chain(self.non_parsable_resolutions.iter().map(|r| &r.issue_set)),
        )
    }

    pub fn merge(&mut self, other: FilterSpecResolutionLookup) {
        for resolution in other.spec_resolutions {
            if self
                .get(&resolution.location, &resolution.call_parameter_set)
                .is_none()
            {
                self.spec_resolutions.push(resolution);
            }
        }
        for resolution in other.non_parsable_resolutions {
            if !self.non_parsable_resolutions.contains(&resolution) {
                self.non_parsable_resolutions.push(resolution);
            }
        }
    }

    /// Models read by resolved filter references.
    pub fn queried_semantic_models(&self) -> BTreeSet<String> {
        self.spec_resolutions
            .iter()
            .flat_map(|r| r.semantic_models.iter().cloned())
            .collect()
    }
}

/// Filters found at one DAG node.
struct FilterLocationGroup<'f> {
    location: WhereFilterLocation,
    node: NodeIndex,
    filters: Vec<&'f WhereFilterIntersection>,
}

pub struct WhereFilterSpecResolver<'a> {
    lookup: &'a SemanticManifestLookup,
    dag: &'a ResolutionDag,
    suggestions: SuggestionGenerator,
}

impl<'a> WhereFilterSpecResolver<'a> {
    pub fn new(
        lookup: &'a SemanticManifestLookup,
        dag: &'a ResolutionDag,
        suggestions: SuggestionGenerator,
    ) -> Self {
        Self {
            lookup,
            dag,
            suggestions,
        }
    }

    /// Resolve every filter reference at every location in the DAG.
    pub fn resolve_lookup(&self) -> InternalResult<FilterSpecResolutionLookup> {
        let group_by_resolver =
            GroupByItemResolver::new(self.lookup, self.dag, self.suggestions.clone());
        let mut lookup = FilterSpecResolutionLookup::new();

        for group in self.collect_filters()? {
            let mut seen: BTreeSet<&CallParameterSet> = BTreeSet::new();
            for intersection in &group.filters {
                for where_filter in &intersection.where_filters {
                    let call_parameter_sets = match where_filter.parsed() {
                        Ok(sets) => sets,
                        Err(error) => {
                            let issue = ResolutionIssue::error(
                                ResolutionIssueKind::WhereFilterParsing {
                                    filter: where_filter.where_sql_template.clone(),
                                    error: error.to_string(),
                                },
                                self.path_for(&group),
                            );
                            lookup.non_parsable_resolutions.push(NonParsableFilterResolution {
                                location: group.location.clone(),
                                where_filter_template: where_filter.where_sql_template.clone(),
                                error: error.to_string(),
                                issue_set: issue.into(),
                            });
                            continue;
                        }
                    };
                    for call_parameter_set in call_parameter_sets {
                        if !seen.insert(call_parameter_set) {
                            continue;
                        }
                        let resolution = self.resolve_call_parameter_set(
                            &group_by_resolver,
                            &group,
                            call_parameter_set,
                            &where_filter.where_sql_template,
                        )?;
                        lookup.spec_resolutions.push(resolution);
                    }
                }
            }
        }

        debug!(
            resolutions = lookup.spec_resolutions.len(),
            non_parsable = lookup.non_parsable_resolutions.len(),
            "resolved where filters"
        );
        Ok(lookup)
    }

    fn path_for(&self, group: &FilterLocationGroup<'_>) -> ResolutionPath {
        ResolutionPath::new(vec![self.dag.node_description(group.node)])
    }

    fn resolve_call_parameter_set(
        &self,
        group_by_resolver: &GroupByItemResolver<'_>,
        group: &FilterLocationGroup<'_>,
        call_parameter_set: &CallParameterSet,
        template: &str,
    ) -> InternalResult<FilterSpecResolution> {
        let input_str = call_parameter_set.to_string();
        let Some(pattern) =
            pattern_for_call_parameter_set(call_parameter_set, |name| self.lookup.granularity(name))
        else {
            let issue = ResolutionIssue::error(
                ResolutionIssueKind::StringInputParsing {
                    input: input_str,
                    expected: "filter reference".to_string(),
                },
                self.path_for(group),
            );
            return Ok(FilterSpecResolution {
                location: group.location.clone(),
                call_parameter_set: call_parameter_set.clone(),
                where_filter_template: template.to_string(),
                resolved_spec: None,
                semantic_models: BTreeSet::new(),
                issue_set: issue.into(),
            });
        };

        let resolution =
            group_by_resolver.resolve_matching_item_for_filters(group.node, &pattern, &input_str)?;
        Ok(FilterSpecResolution {
            location: group.location.clone(),
            call_parameter_set: call_parameter_set.clone(),
            where_filter_template: template.to_string(),
            semantic_models: resolution
                .linkable_element_set
                .derived_from_semantic_models(),
            resolved_spec: resolution.spec,
            issue_set: resolution.issue_set,
        })
    }

    /// Filters per location, in a stable order: the query first, then metrics
    /// by name.
    fn collect_filters(&self) -> InternalResult<Vec<FilterLocationGroup<'a>>> {
        let mut groups: BTreeMap<WhereFilterLocation, FilterLocationGroup<'a>> = BTreeMap::new();

        if let Some(ResolutionDagNode::Query {
            where_filter: Some(filter),
            ..
        }) = self.dag.node(self.dag.sink())
        {
            groups.insert(
                WhereFilterLocation::Query,
                FilterLocationGroup {
                    location: WhereFilterLocation::Query,
                    node: self.dag.sink(),
                    filters: vec![filter],
                },
            );
        }

        for (name, node) in self.dag.metric_nodes() {
            let metric = self
                .lookup
                .metric(name)
                .ok_or_else(|| InternalError::UnknownMetric(name.to_string()))?;

            let own: Vec<&'a WhereFilterIntersection> = metric
                .filter
                .iter()
                .chain(metric.input_measures().into_iter().filter_map(|m| m.filter.as_ref()))
                .filter(|f| !f.is_empty())
                .collect();
            if !own.is_empty() {
                let location = WhereFilterLocation::Metric {
                    metric: name.to_string(),
                };
                groups.insert(
                    location.clone(),
                    FilterLocationGroup {
                        location,
                        node,
                        filters: own,
                    },
                );
            }

            for input in metric.input_metrics() {
                let Some(filter) = input.filter.as_ref().filter(|f| !f.is_empty()) else {
                    continue;
                };
                let input_node = self
                    .dag
                    .node_for_metric(&input.name)
                    .ok_or_else(|| InternalError::UnknownMetric(input.name.clone()))?;
                let location = WhereFilterLocation::InputMetric {
                    parent: name.to_string(),
                    input: input.name.clone(),
                };
                groups
                    .entry(location.clone())
                    .or_insert_with(|| FilterLocationGroup {
                        location,
                        node: input_node,
                        filters: Vec::new(),
                    })
                    .filters
                    .push(filter);
            }
        }

        Ok(groups.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        entity_links, EntityType, Metric, MetricInput, SemanticManifest, SemanticModel,
        TimeGranularity, WhereFilter,
    };
    use crate::spec::DimensionSpec;

    fn lookup() -> SemanticManifestLookup {
        let instant = WhereFilterIntersection::single(WhereFilter::new(
            "{{ Dimension('booking__is_instant') }}",
            vec![CallParameterSet::dimension("booking__is_instant")],
        ));
        let manifest = SemanticManifest::new()
            .with_semantic_model(
                SemanticModel::new("bookings_source")
                    .with_primary_entity("booking")
                    .with_default_agg_time_dimension("ds")
                    .with_entity("listing", EntityType::Foreign)
                    .with_categorical("is_instant")
                    .with_time_dimension("ds", TimeGranularity::Day)
                    .with_measure("bookings"),
            )
            .with_semantic_model(
                SemanticModel::new("listings_latest")
                    .with_primary_entity("listing")
                    .with_categorical("country_latest")
                    .with_time_dimension("created_at", TimeGranularity::Day)
                    .with_measure_agg_time("listings", "created_at"),
            )
            .with_metric(Metric::simple("bookings", "bookings"))
            .with_metric(Metric::simple("listings", "listings"))
            .with_metric(
                Metric::simple("instant_bookings", "bookings").with_filter(instant.clone()),
            )
            .with_metric(Metric::ratio(
                "instant_share",
                MetricInput::new("bookings").with_filter(instant),
                MetricInput::new("bookings"),
            ));
        SemanticManifestLookup::new(manifest).unwrap()
    }

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
    fn test_metric_filter_resolves_at_metric() {
        let lookup = lookup();
        let resolutions = resolve(&lookup, &["instant_bookings"], None);
        let location = WhereFilterLocation::Metric {
            metric: "instant_bookings".to_string(),
        };
        let resolution = resolutions
            .checked_resolution(&location, &CallParameterSet::dimension("booking__is_instant"))
            .unwrap();
        assert_eq!(
            resolution.resolved_spec,
            Some(DimensionSpec::new("is_instant", entity_links(&["booking"])).into())
        );
        assert!(resolutions.queried_semantic_models().contains("bookings_source"));
    }

    #[test]
    fn test_input_metric_filter_location() {
        let lookup = lookup();
        let resolutions = resolve(&lookup, &["instant_share"], None);
        let location = WhereFilterLocation::InputMetric {
            parent: "instant_share".to_string(),
            input: "bookings".to_string(),
        };
        assert!(resolutions
            .get(&location, &CallParameterSet::dimension("booking__is_instant"))
            .is_some_and(|r| r.resolved_spec.is_some()));
        assert!(!resolutions.issue_set().has_errors());
    }

    #[test]
    fn test_query_filter_scoped_to_query() {
        let lookup = lookup();
        let filter = WhereFilterIntersection::single(WhereFilter::new(
            "{{ Dimension('booking__is_instant') }}",
            vec![
                CallParameterSet::dimension("booking__is_instant"),
                CallParameterSet::dimension("booking__is_instant"),
            ],
        ));
        // listings can't see booking__is_instant
        let resolutions = resolve(&lookup, &["bookings", "listings"], Some(filter));
        assert_eq!(resolutions.spec_resolutions().len(), 1);
        assert!(resolutions.issue_set().has_errors());
    }

    #[test]
    fn test_unparsable_filter() {
        let lookup = lookup();
        let filter = WhereFilterIntersection::single(WhereFilter::unparsable(
            "{{ Dimension( }}",
            "unexpected end of template",
        ));
        let resolutions = resolve(&lookup, &["bookings"], Some(filter));
        assert_eq!(resolutions.non_parsable_resolutions().len(), 1);
        assert!(matches!(
            resolutions.issue_set().issues()[0].kind,
            ResolutionIssueKind::WhereFilterParsing { .. }
        ));
    }
}
