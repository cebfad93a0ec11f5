//! Query parsing: turns raw query parameters into a validated [`QuerySpec`].
//!
//! Every input is resolved independently and all issues are collected, so a
//! single call reports every problem with the query at once. Cheap checks run
//! before the resolution DAG is built.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::dag::ResolutionDag;
use super::filter::{FilterSpecResolutionLookup, WhereFilterLocation, WhereFilterSpecResolver};
use super::group_by_item::GroupByItemResolver;
use super::input::{InputKind, PatternInput, ResolverInput};
use super::issues::{
    InvalidQueryReport, IssueSet, ResolutionIssue, ResolutionIssueKind, ResolutionPath,
};
use super::naming::{
    DunderNamingScheme, MetricNamingScheme, ObjectBuilderNamingScheme, QueryItemNamingScheme,
};
use super::parameters::{GroupByParameter, MetricParameter, OrderByItem, OrderByParameter};
use super::suggestions::SuggestionGenerator;
use super::validation::default_rules;
use crate::error::{QueryError, QueryResult};
use crate::model::WhereFilterIntersection;
use crate::semantic::SemanticManifestLookup;
use crate::spec::pattern::match_all;
use crate::spec::{
    InstanceSpec, LinkableInstanceSpec, MetricSpec, OrderBySpec, QuerySpec, SpecPattern,
    TimeRangeConstraint,
};

/// Everything a caller can put in a query. Items may be given as strings or as
/// typed parameters; both forms can be mixed.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParameters {
    pub metric_names: Vec<String>,
    pub metrics: Vec<MetricParameter>,
    pub group_by_names: Vec<String>,
    pub group_by: Vec<GroupByParameter>,
    pub where_filter: Option<WhereFilterIntersection>,
    pub time_constraint_start: Option<String>,
    pub time_constraint_end: Option<String>,
    pub limit: Option<i64>,
    /// Names prefixed with `-` sort descending.
    pub order_by_names: Vec<String>,
    pub order_by: Vec<OrderByParameter>,
    pub min_max_only: bool,
    pub apply_group_by: bool,
}

impl Default for QueryParameters {
    fn default() -> Self {
        Self {
            metric_names: Vec::new(),
            metrics: Vec::new(),
            group_by_names: Vec::new(),
            group_by: Vec::new(),
            where_filter: None,
            time_constraint_start: None,
            time_constraint_end: None,
            limit: None,
            order_by_names: Vec::new(),
            order_by: Vec::new(),
            min_max_only: false,
            apply_group_by: true,
        }
    }
}

impl QueryParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, names: &[&str]) -> Self {
        self.metric_names.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn with_metric_parameters(mut self, metrics: Vec<MetricParameter>) -> Self {
        self.metrics.extend(metrics);
        self
    }

    pub fn with_group_by(mut self, names: &[&str]) -> Self {
        self.group_by_names.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn with_group_by_parameters(mut self, group_by: Vec<GroupByParameter>) -> Self {
        self.group_by.extend(group_by);
        self
    }

    pub fn with_where_filter(mut self, filter: WhereFilterIntersection) -> Self {
        self.where_filter = Some(filter);
        self
    }

    pub fn with_time_constraint(mut self, start: Option<&str>, end: Option<&str>) -> Self {
        self.time_constraint_start = start.map(str::to_string);
        self.time_constraint_end = end.map(str::to_string);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_order_by(mut self, names: &[&str]) -> Self {
        self.order_by_names.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn with_order_by_parameters(mut self, order_by: Vec<OrderByParameter>) -> Self {
        self.order_by.extend(order_by);
        self
    }

    pub fn with_min_max_only(mut self, min_max_only: bool) -> Self {
        self.min_max_only = min_max_only;
        self
    }

    pub fn with_apply_group_by(mut self, apply_group_by: bool) -> Self {
        self.apply_group_by = apply_group_by;
        self
    }

    fn group_by_count(&self) -> usize {
        self.group_by_names.len() + self.group_by.len()
    }

    fn metric_count(&self) -> usize {
        self.metric_names.len() + self.metrics.len()
    }

    fn order_by_count(&self) -> usize {
        self.order_by_names.len() + self.order_by.len()
    }

    /// The query as shown in issue reports.
    fn query_input(&self) -> ResolverInput {
        ResolverInput::Query {
            metrics: self
                .metric_names
                .iter()
                .cloned()
                .chain(self.metrics.iter().map(MetricParameter::input_str))
                .collect(),
            group_by: self
                .group_by_names
                .iter()
                .cloned()
                .chain(self.group_by.iter().map(GroupByParameter::input_str))
                .collect(),
        }
    }
}

/// A validated query plus the semantic models it reads.
#[derive(Debug, Clone)]
pub struct ParseQueryResult {
    pub query_spec: QuerySpec,
    pub queried_semantic_models: BTreeSet<String>,
}

pub struct QueryParser<'a> {
    lookup: &'a SemanticManifestLookup,
    /// Tried in order; the first scheme that recognises an input wins.
    group_by_schemes: Vec<Box<dyn QueryItemNamingScheme>>,
    metric_scheme: MetricNamingScheme,
    suggestions: SuggestionGenerator,
}

impl<'a> QueryParser<'a> {
    pub fn new(lookup: &'a SemanticManifestLookup) -> Self {
        let custom = lookup.manifest().custom_granularities.clone();
        Self {
            lookup,
            group_by_schemes: vec![
                Box::new(ObjectBuilderNamingScheme::new(custom.clone())),
                Box::new(DunderNamingScheme::new(custom)),
            ],
            metric_scheme: MetricNamingScheme,
            suggestions: SuggestionGenerator::new(&lookup.settings().suggestions),
        }
    }

    pub fn with_suggestions(mut self, suggestions: SuggestionGenerator) -> Self {
        self.suggestions = suggestions;
        self
    }

    /// Resolve a saved query, layering the caller's filter, limit and order-by
    /// over the saved definition.
    pub fn parse_and_validate_saved_query(
        &self,
        name: &str,
        where_filter: Option<&WhereFilterIntersection>,
        limit: Option<i64>,
        order_by_names: &[String],
    ) -> QueryResult<ParseQueryResult> {
        let Some(saved_query) = self.lookup.manifest().saved_query(name) else {
            let known = self
                .lookup
                .manifest()
                .saved_queries
                .iter()
                .map(|q| q.name.as_str());
            let issue = ResolutionIssue::error(
                ResolutionIssueKind::InvalidSavedQuery {
                    name: name.to_string(),
                },
                ResolutionPath::default(),
            )
            .with_suggestions(self.suggestions.suggest(name, known));
            let mut report = InvalidQueryReport::new();
            report.add_issues(
                &ResolverInput::SavedQuery(name.to_string()).ui_description(),
                &issue.into(),
            );
            return Err(QueryError::InvalidQuery(report));
        };

        let combined_filter = match (&saved_query.where_filter, where_filter) {
            (Some(saved), Some(extra)) => Some(saved.combine(extra)),
            (Some(saved), None) => Some(saved.clone()),
            (None, Some(extra)) => Some(extra.clone()),
            (None, None) => None,
        };

        let params = QueryParameters {
            metric_names: saved_query.metrics.clone(),
            group_by_names: saved_query.group_by.clone(),
            where_filter: combined_filter,
            limit,
            order_by_names: order_by_names.to_vec(),
            ..QueryParameters::default()
        };
        debug!(saved_query = %name, "resolving saved query");
        self.parse_and_validate_query(&params)
    }

    pub fn parse_and_validate_query(
        &self,
        params: &QueryParameters,
    ) -> QueryResult<ParseQueryResult> {
        let mut report = InvalidQueryReport::new();
        let query_input = params.query_input().ui_description();

        // Inputs
        let metric_inputs = self.metric_inputs(params);
        let group_by_inputs = self.group_by_inputs(params);
        let order_by_inputs = self.order_by_inputs(params);
        for input in metric_inputs
            .iter()
            .chain(&group_by_inputs)
            .chain(&order_by_inputs)
        {
            if let ResolverInput::InvalidString { kind, input_str } = input {
                let issue = ResolutionIssue::error(
                    ResolutionIssueKind::StringInputParsing {
                        input: input_str.clone(),
                        expected: kind.expected().to_string(),
                    },
                    ResolutionPath::default(),
                );
                report.add_issues(&input.ui_description(), &issue.into());
            }
        }

        let metric_specs = self.resolve_metrics(&metric_inputs, &mut report);

        // Cheap checks before building the DAG
        self.check_parameters(params, &query_input, &mut report);
        let time_range_constraint = match TimeRangeConstraint::parse(
            params.time_constraint_start.as_deref(),
            params.time_constraint_end.as_deref(),
        ) {
            Ok(constraint) => constraint,
            Err(error) => {
                let input = ResolverInput::TimeRange {
                    start: params.time_constraint_start.clone(),
                    end: params.time_constraint_end.clone(),
                };
                let issue = ResolutionIssue::error(
                    ResolutionIssueKind::InvalidTimeRange {
                        error: error.to_string(),
                    },
                    ResolutionPath::default(),
                );
                report.add_issues(&input.ui_description(), &issue.into());
                None
            }
        };
        if !report.is_empty() {
            return Err(QueryError::InvalidQuery(report));
        }

        // Group-by items and filters
        let metric_names: Vec<String> =
            metric_specs.iter().map(|s| s.element_name.clone()).collect();
        let query_filter = params.where_filter.clone().filter(|f| !f.is_empty());
        let dag = ResolutionDag::build(self.lookup, &metric_names, query_filter.clone())?;

        let mut warnings = IssueSet::new();
        let mut queried_semantic_models: BTreeSet<String> = BTreeSet::new();
        let group_by_resolver =
            GroupByItemResolver::new(self.lookup, &dag, self.suggestions.clone());
        let mut group_by_specs: Vec<LinkableInstanceSpec> = Vec::new();
        for input in &group_by_inputs {
            let ResolverInput::GroupByItem(pattern_input) = input else {
                continue;
            };
            let resolution = group_by_resolver
                .resolve_matching_item_for_querying(&pattern_input.pattern, &pattern_input.input_str)?;
            report.add_issues(&input.ui_description(), &resolution.issue_set);
            warnings.extend(resolution.issue_set.clone());
            if let Some(spec) = resolution.spec {
                queried_semantic_models
                    .extend(resolution.linkable_element_set.derived_from_semantic_models());
                if !group_by_specs.contains(&spec) {
                    group_by_specs.push(spec);
                }
            }
        }

        let filter_lookup =
            WhereFilterSpecResolver::new(self.lookup, &dag, self.suggestions.clone())
                .resolve_lookup()?;
        self.report_filter_issues(&filter_lookup, &mut report);
        queried_semantic_models.extend(filter_lookup.queried_semantic_models());

        // Order-by
        let order_by_specs =
            self.resolve_order_by(&order_by_inputs, &metric_specs, &group_by_specs, &mut report);

        let mut query_spec = QuerySpec {
            metric_specs,
            order_by_specs,
            time_range_constraint,
            limit: params.limit.and_then(|l| u64::try_from(l).ok()),
            filter_intersection: query_filter,
            filter_spec_resolution_lookup: filter_lookup,
            min_max_only: params.min_max_only,
            apply_group_by: params.apply_group_by,
            ..QuerySpec::default()
        };
        query_spec.add_group_by_specs(group_by_specs);

        // Whole-query validation
        for rule in default_rules() {
            let issues = rule.validate(self.lookup, &query_spec)?;
            if !issues.is_empty() {
                debug!(rule = rule.name(), issues = issues.issues().len(), "validation issues");
            }
            report.add_issues(&query_input, &issues);
            warnings.extend(issues);
        }

        if !report.is_empty() {
            return Err(QueryError::InvalidQuery(report));
        }
        for issue in warnings.warnings() {
            warn!(path = %issue.path, "{}", issue.kind);
        }

        for spec in &query_spec.metric_specs {
            queried_semantic_models.extend(self.lookup.semantic_models_for_metric(&spec.element_name)?);
        }
        debug!(
            metrics = query_spec.metric_specs.len(),
            group_by = query_spec.linkable_specs().len(),
            models = queried_semantic_models.len(),
            "parsed query"
        );
        Ok(ParseQueryResult {
            query_spec,
            queried_semantic_models,
        })
    }

    fn metric_inputs(&self, params: &QueryParameters) -> Vec<ResolverInput> {
        let named = params.metric_names.iter().map(|name| {
            match self.metric_scheme.spec_pattern(name) {
                Some(pattern) => ResolverInput::Metric {
                    input: PatternInput {
                        input_str: name.clone(),
                        pattern,
                    },
                    alias: None,
                },
                None => ResolverInput::InvalidString {
                    kind: InputKind::Metric,
                    input_str: name.clone(),
                },
            }
        });
        let typed = params.metrics.iter().map(|param| ResolverInput::Metric {
            input: PatternInput {
                input_str: param.input_str(),
                pattern: param.spec_pattern(),
            },
            alias: param.alias.clone(),
        });
        named.chain(typed).collect()
    }

    fn group_by_pattern(&self, input_str: &str) -> Option<SpecPattern> {
        self.group_by_schemes
            .iter()
            .find_map(|scheme| scheme.spec_pattern(input_str))
    }

    fn group_by_inputs(&self, params: &QueryParameters) -> Vec<ResolverInput> {
        let named = params.group_by_names.iter().map(|name| {
            match self.group_by_pattern(name) {
                Some(pattern) => ResolverInput::GroupByItem(PatternInput {
                    input_str: name.clone(),
                    pattern,
                }),
                None => ResolverInput::InvalidString {
                    kind: InputKind::GroupBy,
                    input_str: name.clone(),
                },
            }
        });
        let typed = params.group_by.iter().map(|param| {
            match param.spec_pattern(|name| self.lookup.granularity(name)) {
                Some(pattern) => ResolverInput::GroupByItem(PatternInput {
                    input_str: param.input_str(),
                    pattern,
                }),
                None => ResolverInput::InvalidString {
                    kind: InputKind::GroupBy,
                    input_str: param.input_str(),
                },
            }
        });
        named.chain(typed).collect()
    }

    fn order_by_inputs(&self, params: &QueryParameters) -> Vec<ResolverInput> {
        let mut inputs = Vec::new();
        for raw in &params.order_by_names {
            let (descending, name) = match raw.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, raw.as_str()),
            };
            let patterns: Vec<SpecPattern> = self
                .metric_scheme
                .spec_pattern(name)
                .into_iter()
                .chain(self.group_by_pattern(name))
                .collect();
            inputs.push(if patterns.is_empty() {
                ResolverInput::InvalidString {
                    kind: InputKind::OrderBy,
                    input_str: raw.clone(),
                }
            } else {
                ResolverInput::OrderBy {
                    input_str: name.to_string(),
                    patterns,
                    descending,
                }
            });
        }
        for param in &params.order_by {
            let pattern = match &param.item {
                OrderByItem::Metric(metric) => Some(metric.spec_pattern()),
                OrderByItem::GroupBy(group_by) => {
                    group_by.spec_pattern(|name| self.lookup.granularity(name))
                }
            };
            inputs.push(match pattern {
                Some(pattern) => ResolverInput::OrderBy {
                    input_str: param.input_str(),
                    patterns: vec![pattern],
                    descending: param.descending,
                },
                None => ResolverInput::InvalidString {
                    kind: InputKind::OrderBy,
                    input_str: param.input_str(),
                },
            });
        }
        inputs
    }

    fn resolve_metrics(
        &self,
        inputs: &[ResolverInput],
        report: &mut InvalidQueryReport,
    ) -> Vec<MetricSpec> {
        let known = self.lookup.metric_names();
        let candidates: Vec<InstanceSpec> = known
            .iter()
            .map(|name| InstanceSpec::Metric(MetricSpec::new(*name)))
            .collect();

        let mut specs = Vec::new();
        for input in inputs {
            let ResolverInput::Metric {
                input: pattern_input,
                alias,
            } = input
            else {
                continue;
            };
            let matches = match_all(
                std::slice::from_ref(&pattern_input.pattern),
                candidates.clone(),
            );
            match matches.as_slice() {
                [InstanceSpec::Metric(spec)] => {
                    specs.push(spec.clone().with_alias(alias.clone()));
                }
                _ => {
                    let issue = ResolutionIssue::error(
                        ResolutionIssueKind::InvalidMetric {
                            metric: pattern_input.input_str.clone(),
                        },
                        ResolutionPath::default(),
                    )
                    .with_suggestions(
                        self.suggestions
                            .suggest(&pattern_input.input_str, known.iter().copied()),
                    );
                    report.add_issues(&input.ui_description(), &issue.into());
                }
            }
        }
        specs
    }

    fn check_parameters(
        &self,
        params: &QueryParameters,
        query_input: &str,
        report: &mut InvalidQueryReport,
    ) {
        let error = |kind| IssueSet::from_issue(ResolutionIssue::error(kind, ResolutionPath::default()));

        if params.metric_count() == 0 && params.group_by_count() == 0 {
            report.add_issues(query_input, &error(ResolutionIssueKind::NoMetricOrGroupBy));
        }

        if let Some(limit) = params.limit.filter(|l| *l < 0) {
            report.add_issues(
                &ResolverInput::Limit(limit).ui_description(),
                &error(ResolutionIssueKind::InvalidLimit { limit }),
            );
        }

        if params.min_max_only {
            let reason = if params.group_by_count() != 1 {
                Some("requires exactly one group-by item")
            } else if params.metric_count() > 0 {
                Some("cannot be used with metrics")
            } else if params.order_by_count() > 0 {
                Some("cannot be used with an order-by")
            } else if params.limit.is_some() {
                Some("cannot be used with a limit")
            } else {
                None
            };
            if let Some(reason) = reason {
                report.add_issues(
                    &ResolverInput::MinMaxOnly(true).ui_description(),
                    &error(ResolutionIssueKind::InvalidMinMaxOnly {
                        reason: reason.to_string(),
                    }),
                );
            }
        }

        if !params.apply_group_by && params.metric_count() > 0 {
            report.add_issues(
                &ResolverInput::ApplyGroupBy(false).ui_description(),
                &error(ResolutionIssueKind::InvalidApplyGroupBy),
            );
        }
    }

    fn report_filter_issues(
        &self,
        filter_lookup: &FilterSpecResolutionLookup,
        report: &mut InvalidQueryReport,
    ) {
        let describe = |location: &WhereFilterLocation, template: &str| match location {
            WhereFilterLocation::Query => format!("WhereFilter('{template}')"),
            other => format!("WhereFilter('{template}') in {other}"),
        };
        for resolution in filter_lookup.spec_resolutions() {
            report.add_issues(
                &describe(&resolution.location, &resolution.where_filter_template),
                &resolution.issue_set,
            );
        }
        for resolution in filter_lookup.non_parsable_resolutions() {
            report.add_issues(
                &describe(&resolution.location, &resolution.where_filter_template),
                &resolution.issue_set,
            );
        }
    }

    fn resolve_order_by(
        &self,
        inputs: &[ResolverInput],
        metric_specs: &[MetricSpec],
        group_by_specs: &[LinkableInstanceSpec],
        report: &mut InvalidQueryReport,
    ) -> Vec<OrderBySpec> {
        let available: Vec<InstanceSpec> = metric_specs
            .iter()
            .cloned()
            .map(InstanceSpec::from)
            .chain(group_by_specs.iter().cloned().map(InstanceSpec::from))
            .collect();
        let output_names: Vec<String> = available.iter().map(InstanceSpec::output_name).collect();

        let mut specs = Vec::new();
        for input in inputs {
            let ResolverInput::OrderBy {
                input_str,
                patterns,
                descending,
            } = input
            else {
                continue;
            };
            // the first pattern with any match decides
            let matches = patterns
                .iter()
                .map(|pattern| match_all(std::slice::from_ref(pattern), available.clone()))
                .find(|matches| !matches.is_empty())
                .unwrap_or_default();
            match matches.as_slice() {
                [spec] => specs.push(OrderBySpec {
                    instance_spec: spec.clone(),
                    descending: *descending,
                }),
                _ => {
                    let issue = ResolutionIssue::error(
                        ResolutionIssueKind::InvalidOrderByItem {
                            item: input_str.clone(),
                        },
                        ResolutionPath::default(),
                    )
                    .with_suggestions(
                        self.suggestions
                            .suggest(input_str, output_names.iter().map(String::as_str)),
                    );
                    report.add_issues(&input.ui_description(), &issue.into());
                }
            }
        }
        specs
    }
}
