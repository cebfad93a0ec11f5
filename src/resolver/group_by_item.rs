//! Resolution of one group-by input to exactly one spec.

use petgraph::graph::NodeIndex;

use super::dag::ResolutionDag;
use super::issues::{IssueSet, ResolutionIssue, ResolutionIssueKind, ResolutionPath};
use super::push_down::{PushDownResolver, PushDownResult};
use super::suggestions::SuggestionGenerator;
use crate::error::InternalResult;
use crate::semantic::graph::LabeledGraph;
use crate::semantic::{LinkableElementSet, SemanticManifestLookup};
use crate::spec::pattern::match_linkable;
use crate::spec::{DefaultTimeGranularityPattern, LinkableInstanceSpec, SpecPattern};

/// Outcome of resolving one group-by input. `spec` is set exactly when
/// `issue_set` has no errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupByItemResolution {
    pub spec: Option<LinkableInstanceSpec>,
    /// Every element behind the chosen spec.
    pub linkable_element_set: LinkableElementSet,
    pub issue_set: IssueSet,
}

impl GroupByItemResolution {
    fn failure(issue_set: IssueSet) -> Self {
        Self {
            spec: None,
            linkable_element_set: LinkableElementSet::new(),
            issue_set,
        }
    }
}

pub struct GroupByItemResolver<'a> {
    lookup: &'a SemanticManifestLookup,
    dag: &'a ResolutionDag,
    suggestions: SuggestionGenerator,
}

impl<'a> GroupByItemResolver<'a> {
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

    /// Resolve a query's group-by input against everything the query can group by.
    pub fn resolve_matching_item_for_querying(
        &self,
        pattern: &SpecPattern,
        input_str: &str,
    ) -> InternalResult<GroupByItemResolution> {
        self.resolve_matching_item(self.dag.sink(), pattern, input_str)
    }

    /// Resolve a filter reference against what is visible at the node where the
    /// filter is defined.
    pub fn resolve_matching_item_for_filters(
        &self,
        node: NodeIndex,
        pattern: &SpecPattern,
        input_str: &str,
    ) -> InternalResult<GroupByItemResolution> {
        self.resolve_matching_item(node, pattern, input_str)
    }

    /// Everything the query can group by.
    pub fn resolve_available_items(&self) -> InternalResult<PushDownResult> {
        PushDownResolver::new(self.lookup, self.dag, &[]).resolve(self.dag.sink())
    }

    fn resolve_matching_item(
        &self,
        node: NodeIndex,
        pattern: &SpecPattern,
        input_str: &str,
    ) -> InternalResult<GroupByItemResolution> {
        let patterns = std::slice::from_ref(pattern);
        let result = PushDownResolver::new(self.lookup, self.dag, patterns)
            .with_suggestions(input_str, self.suggestions.clone())
            .resolve(node)?;
        if result.issue_set.has_errors() {
            return Ok(GroupByItemResolution::failure(result.issue_set));
        }

        let defaulting: SpecPattern =
            DefaultTimeGranularityPattern::new(result.max_metric_default_time_granularity).into();
        let specs = match_linkable(
            std::slice::from_ref(&defaulting),
            &result.candidate_set.specs(),
        );

        match specs.as_slice() {
            [spec] => {
                let spec = spec.clone();
                let elements = result
                    .candidate_set
                    .filter_by_spec_patterns(&[pattern.clone(), defaulting]);
                Ok(GroupByItemResolution {
                    spec: Some(spec),
                    linkable_element_set: elements,
                    issue_set: result.issue_set,
                })
            }
            _ => {
                let mut issue_set = result.issue_set;
                issue_set.add(ResolutionIssue::error(
                    ResolutionIssueKind::AmbiguousGroupByItem {
                        candidates: specs.iter().map(|s| s.qualified_name()).collect(),
                    },
                    ResolutionPath::new(vec![self.dag.node_description(node)]),
                ));
                Ok(GroupByItemResolution::failure(issue_set))
            }
        }
    }
}
