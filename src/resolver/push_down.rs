//! Push-down resolution of group-by candidates through the resolution DAG.
//!
//! Every node produces a [`PushDownResult`]: source nodes read the linkable
//! elements of their measure, every other node intersects its visible parents'
//! candidate sets by path key. A result is empty exactly when its issues contain
//! an error, so callers only ever need to check one of the two.

use std::collections::HashMap;

use petgraph::graph::NodeIndex;
use tracing::debug;

use super::dag::{ResolutionDag, ResolutionDagNode};
use super::issues::{IssueSet, ParentCandidates, ResolutionIssue, ResolutionIssueKind, ResolutionPath};
use super::suggestions::SuggestionGenerator;
use crate::error::{InternalError, InternalResult};
use crate::model::TimeGranularity;
use crate::semantic::graph::{Label, LabeledGraph};
use crate::semantic::{LinkableElementSet, SemanticManifestLookup};
use crate::spec::SpecPattern;

/// Candidates available at one DAG node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushDownResult {
    pub candidate_set: LinkableElementSet,
    pub issue_set: IssueSet,
    /// Coarsest default `metric_time` grain among the metrics under this node.
    pub max_metric_default_time_granularity: Option<TimeGranularity>,
}

impl PushDownResult {
    fn success(
        candidate_set: LinkableElementSet,
        issue_set: IssueSet,
        max_metric_default_time_granularity: Option<TimeGranularity>,
    ) -> Self {
        debug_assert!(!candidate_set.is_empty());
        debug_assert!(!issue_set.has_errors());
        Self {
            candidate_set,
            issue_set,
            max_metric_default_time_granularity,
        }
    }

    fn failure(issue_set: IssueSet) -> Self {
        debug_assert!(issue_set.has_errors());
        Self {
            candidate_set: LinkableElementSet::new(),
            issue_set,
            max_metric_default_time_granularity: None,
        }
    }

    pub fn is_success(&self) -> bool {
        !self.issue_set.has_errors()
    }
}

/// Resolves the candidates available at a DAG node, optionally narrowed by
/// patterns applied at every source node.
///
/// Results are memoized per node for the duration of one [`resolve`] call.
///
/// [`resolve`]: PushDownResolver::resolve
pub struct PushDownResolver<'a> {
    lookup: &'a SemanticManifestLookup,
    dag: &'a ResolutionDag,
    source_patterns: &'a [SpecPattern],
    /// Raw input text, used to rank suggestions.
    suggestion_input: Option<&'a str>,
    suggestions: SuggestionGenerator,
    memo: HashMap<NodeIndex, PushDownResult>,
    path: Vec<NodeIndex>,
}

impl<'a> PushDownResolver<'a> {
    pub fn new(
        lookup: &'a SemanticManifestLookup,
        dag: &'a ResolutionDag,
        source_patterns: &'a [SpecPattern],
    ) -> Self {
        Self {
            lookup,
            dag,
            source_patterns,
            suggestion_input: None,
            suggestions: SuggestionGenerator::disabled(),
            memo: HashMap::new(),
            path: Vec::new(),
        }
    }

    /// Attach suggestions for `input` to "no matching items" issues.
    pub fn with_suggestions(mut self, input: &'a str, suggestions: SuggestionGenerator) -> Self {
        self.suggestion_input = Some(input);
        self.suggestions = suggestions;
        self
    }

    /// Resolve the candidates at `node`.
    pub fn resolve(&mut self, node: NodeIndex) -> InternalResult<PushDownResult> {
        self.memo.clear();
        self.path.clear();
        self.visit(node)
    }

    fn current_path(&self) -> ResolutionPath {
        ResolutionPath::new(
            self.path
                .iter()
                .map(|n| self.dag.node_description(*n))
                .collect(),
        )
    }

    fn error(&self, kind: ResolutionIssueKind) -> ResolutionIssue {
        ResolutionIssue::error(kind, self.current_path())
    }

    fn visit(&mut self, node: NodeIndex) -> InternalResult<PushDownResult> {
        if let Some(result) = self.memo.get(&node) {
            return Ok(result.clone());
        }
        if self.path.contains(&node) {
            return Err(InternalError::ResolutionDagCycle(
                self.dag.node_description(node),
            ));
        }
        let dag_node = self
            .dag
            .node(node)
            .ok_or_else(|| InternalError::ResolutionDagCycle(format!("missing node {}", node.index())))?
            .clone();

        self.path.push(node);
        let result = match &dag_node {
            ResolutionDagNode::SimpleMetricSource { metric, measure, .. } => {
                self.visit_source(metric, measure)
            }
            ResolutionDagNode::NoMetricsQuerySource => self.visit_no_metrics_source(),
            ResolutionDagNode::ComplexMetric { metric } => {
                self.visit_intersecting(node, Some(metric.as_str()))
            }
            ResolutionDagNode::Query { .. } => self.visit_intersecting(node, None),
        };
        self.path.pop();
        let result = result?;

        debug!(
            node = %dag_node,
            candidates = result.candidate_set.len(),
            errors = result.issue_set.has_errors(),
            "push-down result"
        );
        self.memo.insert(node, result.clone());
        Ok(result)
    }

    fn suggestions_for(&self, available: &LinkableElementSet) -> Vec<String> {
        let Some(input) = self.suggestion_input else {
            return Vec::new();
        };
        let names: Vec<String> = available
            .specs()
            .iter()
            .map(|spec| spec.qualified_name())
            .collect();
        self.suggestions
            .suggest(input, names.iter().map(String::as_str))
    }

    fn visit_source(&self, metric: &str, measure: &str) -> InternalResult<PushDownResult> {
        let available = self.lookup.linkable_elements_for_measure(measure)?;
        let matched = available.filter_by_spec_patterns(self.source_patterns);
        if matched.is_empty() {
            let issue = self
                .error(ResolutionIssueKind::NoMatchingItemsForSimpleMetric {
                    metric: metric.to_string(),
                })
                .with_suggestions(self.suggestions_for(&available));
            return Ok(PushDownResult::failure(issue.into()));
        }
        let grain = self.lookup.metric_default_time_granularity(metric)?;
        Ok(PushDownResult::success(matched, IssueSet::new(), Some(grain)))
    }

    fn visit_no_metrics_source(&self) -> InternalResult<PushDownResult> {
        let available = self.lookup.linkable_elements_for_no_metrics_query()?;
        let matched = available.filter_by_spec_patterns(self.source_patterns);
        if matched.is_empty() {
            let issue = self
                .error(ResolutionIssueKind::NoMatchingItemsForNoMetricsQuery)
                .with_suggestions(self.suggestions_for(&available));
            return Ok(PushDownResult::failure(issue.into()));
        }
        Ok(PushDownResult::success(matched, IssueSet::new(), None))
    }

    /// Intersect the candidates of every visible parent. `metric` is `None` at the
    /// query node.
    fn visit_intersecting(
        &mut self,
        node: NodeIndex,
        metric: Option<&str>,
    ) -> InternalResult<PushDownResult> {
        let mut parent_results: Vec<(NodeIndex, PushDownResult)> = Vec::new();
        let mut deny_date_part = false;
        for (parent, labels) in self.dag.parents(node) {
            if labels.contains(Label::DenyVisibleAttributes) {
                continue;
            }
            deny_date_part |= labels.contains(Label::DenyDatePart);
            let result = self.visit(parent)?;
            parent_results.push((parent, result));
        }

        if parent_results.is_empty() {
            let issue = self.error(ResolutionIssueKind::NoParentCandidates {
                parents: Vec::new(),
            });
            return Ok(PushDownResult::failure(issue.into()));
        }

        let merged_issues = IssueSet::merged(parent_results.iter().map(|(_, r)| &r.issue_set));
        if merged_issues.has_errors() {
            return Ok(PushDownResult::failure(merged_issues));
        }

        let sets: Vec<&LinkableElementSet> =
            parent_results.iter().map(|(_, r)| &r.candidate_set).collect();
        let intersection = LinkableElementSet::intersection_by_path_key(&sets);
        if intersection.is_empty() {
            let parents = parent_results
                .iter()
                .map(|(parent, result)| ParentCandidates {
                    parent: self.dag.node_description(*parent),
                    items: result
                        .candidate_set
                        .specs()
                        .iter()
                        .map(|spec| spec.qualified_name())
                        .collect(),
                })
                .collect();
            let issue = self.error(ResolutionIssueKind::NoCommonItemsInParents { parents });
            return Ok(PushDownResult::failure(issue.into()));
        }

        let candidate_set = if deny_date_part {
            let without_date_parts = intersection.without_date_parts();
            if without_date_parts.is_empty() {
                let issue = self.error(ResolutionIssueKind::MetricExcludesDatePart {
                    metric: metric.unwrap_or_default().to_string(),
                    items: intersection
                        .specs()
                        .iter()
                        .map(|spec| spec.qualified_name())
                        .collect(),
                });
                return Ok(PushDownResult::failure(issue.into()));
            }
            without_date_parts
        } else {
            intersection
        };

        let grain = parent_results
            .iter()
            .filter_map(|(_, r)| r.max_metric_default_time_granularity)
            .max();
        Ok(PushDownResult::success(candidate_set, merged_issues, grain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        entity_links, EntityType, Metric, MetricInput, SemanticManifest, SemanticModel,
    };
    use crate::spec::{DimensionSpec, EntityLinkPattern, LinkableInstanceSpec};

    fn lookup() -> SemanticManifestLookup {
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
                SemanticModel::new("views_source")
                    .with_primary_entity("view")
                    .with_default_agg_time_dimension("ds")
                    .with_categorical("device")
                    .with_time_dimension("ds", TimeGranularity::Day)
                    .with_measure("views"),
            )
            .with_metric(Metric::simple("bookings", "bookings"))
            .with_metric(Metric::simple("views", "views"))
            .with_metric(Metric::cumulative("bookings_7d", "bookings", Some("7 days")))
            .with_metric(Metric::ratio(
                "views_per_booking",
                MetricInput::new("views"),
                MetricInput::new("bookings"),
            ));
        SemanticManifestLookup::new(manifest).unwrap()
    }

    fn pattern(name: &str, links: &[&str]) -> Vec<SpecPattern> {
        vec![EntityLinkPattern::new(name, entity_links(links)).into()]
    }

    fn assert_invariant(result: &PushDownResult) {
        assert_eq!(result.candidate_set.is_empty(), result.issue_set.has_errors());
    }

    #[test]
    fn test_source_match() {
        let lookup = lookup();
        let dag = ResolutionDag::build(&lookup, &["bookings".to_string()], None).unwrap();
        let patterns = pattern("is_instant", &["booking"]);
        let result = PushDownResolver::new(&lookup, &dag, &patterns)
            .resolve(dag.sink())
            .unwrap();
        assert_invariant(&result);
        assert_eq!(
            result.candidate_set.specs(),
            vec![LinkableInstanceSpec::from(DimensionSpec::new(
                "is_instant",
                entity_links(&["booking"])
            ))]
        );
        assert_eq!(
            result.max_metric_default_time_granularity,
            Some(TimeGranularity::Day)
        );
    }

    #[test]
    fn test_no_common_items() {
        let lookup = lookup();
        let dag = ResolutionDag::build(
            &lookup,
            &["bookings".to_string(), "views".to_string()],
            None,
        )
        .unwrap();
        let result = PushDownResolver::new(&lookup, &dag, &[])
            .resolve(dag.sink())
            .unwrap();
        // metric_time is shared, model dimensions are not
        assert_invariant(&result);
        assert!(result.is_success());

        let patterns = pattern("is_instant", &["booking"]);
        let result = PushDownResolver::new(&lookup, &dag, &patterns)
            .resolve(dag.sink())
            .unwrap();
        assert_invariant(&result);
        assert!(result.issue_set.issues().iter().any(|i| matches!(
            i.kind,
            ResolutionIssueKind::NoMatchingItemsForSimpleMetric { .. }
        )));
    }

    #[test]
    fn test_same_name_on_different_paths() {
        let lookup = lookup();
        let dag = ResolutionDag::build(
            &lookup,
            &["bookings".to_string(), "views".to_string()],
            None,
        )
        .unwrap();
        // booking__ds vs view__ds
        let patterns = pattern("ds", &[]);
        let result = PushDownResolver::new(&lookup, &dag, &patterns)
            .resolve(dag.sink())
            .unwrap();
        assert_invariant(&result);
        match &result.issue_set.issues()[0].kind {
            ResolutionIssueKind::NoCommonItemsInParents { parents } => {
                assert_eq!(parents.len(), 2);
                assert!(parents[0].items.contains(&"booking__ds__day".to_string()));
            }
            other => panic!("unexpected issue: {other:?}"),
        }
    }

    #[test]
    fn test_cumulative_strips_date_parts() {
        let lookup = lookup();
        let dag = ResolutionDag::build(&lookup, &["bookings_7d".to_string()], None).unwrap();
        let result = PushDownResolver::new(&lookup, &dag, &[])
            .resolve(dag.sink())
            .unwrap();
        assert!(result
            .candidate_set
            .specs()
            .iter()
            .all(|spec| spec.date_part().is_none()));

        let patterns: Vec<SpecPattern> = vec![EntityLinkPattern::new("metric_time", vec![])
            .with_date_part(Some(crate::model::DatePart::Year))
            .into()];
        let result = PushDownResolver::new(&lookup, &dag, &patterns)
            .resolve(dag.sink())
            .unwrap();
        assert_invariant(&result);
        let issue = &result.issue_set.issues()[0];
        assert!(matches!(
            issue.kind,
            ResolutionIssueKind::MetricExcludesDatePart { .. }
        ));
        assert_eq!(
            issue.path.to_string(),
            "[Resolve Query(['bookings_7d'])] -> [Resolve Metric('bookings_7d')]"
        );
    }
}
