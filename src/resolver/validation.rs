//! Whole-query checks that run once every input has been resolved.

use std::collections::BTreeSet;

use super::issues::{IssueSet, ResolutionIssue, ResolutionIssueKind, ResolutionPath};
use crate::error::{InternalError, InternalResult};
use crate::semantic::SemanticManifestLookup;
use crate::spec::{InstanceSpec, MetricSpec, QuerySpec};

/// A check over a resolved query.
pub trait PostResolutionQueryValidationRule {
    fn name(&self) -> &'static str;

    fn validate(
        &self,
        lookup: &SemanticManifestLookup,
        query: &QuerySpec,
    ) -> InternalResult<IssueSet>;
}

/// The rules run by the query parser, in order.
pub fn default_rules() -> Vec<Box<dyn PostResolutionQueryValidationRule>> {
    vec![
        Box::new(DuplicateMetricRule),
        Box::new(MetricTimeRequirementsRule),
        Box::new(UniqueOutputColumnNameRule),
    ]
}

fn query_path() -> ResolutionPath {
    ResolutionPath::new(vec!["Validate Query".to_string()])
}

/// The same metric (with the same alias) may only be queried once.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateMetricRule;

impl PostResolutionQueryValidationRule for DuplicateMetricRule {
    fn name(&self) -> &'static str {
        "duplicate_metric"
    }

    fn validate(&self, _lookup: &SemanticManifestLookup, query: &QuerySpec) -> InternalResult<IssueSet> {
        let mut seen: BTreeSet<&MetricSpec> = BTreeSet::new();
        let mut duplicates: Vec<String> = Vec::new();
        for spec in &query.metric_specs {
            if !seen.insert(spec) && !duplicates.contains(&spec.element_name) {
                duplicates.push(spec.element_name.clone());
            }
        }
        if duplicates.is_empty() {
            return Ok(IssueSet::new());
        }
        Ok(ResolutionIssue::error(
            ResolutionIssueKind::DuplicateMetric {
                metrics: duplicates,
            },
            query_path(),
        )
        .into())
    }
}

/// Cumulative metrics with a window or grain-to-date, and metrics with offset
/// inputs, must be grouped by `metric_time`. Input metrics are checked too.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricTimeRequirementsRule;

impl MetricTimeRequirementsRule {
    fn requires_metric_time(
        lookup: &SemanticManifestLookup,
        metric: &str,
        visiting: &mut Vec<String>,
    ) -> InternalResult<bool> {
        if visiting.iter().any(|m| m == metric) {
            let mut cycle = visiting.clone();
            cycle.push(metric.to_string());
            return Err(InternalError::RecursiveMetricDefinition(cycle));
        }
        let definition = lookup
            .metric(metric)
            .ok_or_else(|| InternalError::UnknownMetric(metric.to_string()))?;
        if definition.requires_metric_time() {
            return Ok(true);
        }
        visiting.push(metric.to_string());
        let mut required = false;
        for input in definition.input_metrics() {
            if Self::requires_metric_time(lookup, &input.name, visiting)? {
                required = true;
                break;
            }
        }
        visiting.pop();
        Ok(required)
    }
}

impl PostResolutionQueryValidationRule for MetricTimeRequirementsRule {
    fn name(&self) -> &'static str {
        "metric_time_requirements"
    }

    fn validate(&self, lookup: &SemanticManifestLookup, query: &QuerySpec) -> InternalResult<IssueSet> {
        let has_metric_time = query
            .time_dimension_specs
            .iter()
            .any(|spec| spec.is_metric_time() && spec.date_part.is_none());

        let mut issues = IssueSet::new();
        if has_metric_time {
            return Ok(issues);
        }
        for spec in &query.metric_specs {
            if Self::requires_metric_time(lookup, &spec.element_name, &mut Vec::new())? {
                issues.add(ResolutionIssue::error(
                    ResolutionIssueKind::MetricTimeRequired {
                        metric: spec.element_name.clone(),
                    },
                    query_path(),
                ));
            }
        }
        Ok(issues)
    }
}

/// Output column names must be unique across metrics and group-by items.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniqueOutputColumnNameRule;

impl PostResolutionQueryValidationRule for UniqueOutputColumnNameRule {
    fn name(&self) -> &'static str {
        "unique_output_column_name"
    }

    fn validate(&self, _lookup: &SemanticManifestLookup, query: &QuerySpec) -> InternalResult<IssueSet> {
        // identical specs are reported by the duplicate metric rule
        let mut specs: Vec<InstanceSpec> = Vec::new();
        let candidates = query
            .metric_specs
            .iter()
            .cloned()
            .map(InstanceSpec::from)
            .chain(query.linkable_specs().into_iter().map(InstanceSpec::from));
        for spec in candidates {
            if !specs.contains(&spec) {
                specs.push(spec);
            }
        }

        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut issues = IssueSet::new();
        for spec in &specs {
            let column = spec.output_name();
            if !seen.insert(column.clone()) {
                issues.add(ResolutionIssue::error(
                    ResolutionIssueKind::DuplicateOutputColumn { column },
                    query_path(),
                ));
            }
        }
        Ok(issues)
    }
}
