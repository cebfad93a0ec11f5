//! Query inputs as the resolver sees them, for pattern matching and for labeling
//! issues in the report.

use std::fmt;

use crate::model::WhereFilterIntersection;
use crate::spec::SpecPattern;

/// An input string recognised by a naming scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternInput {
    pub input_str: String,
    pub pattern: SpecPattern,
}

/// Which kind of input a string was given as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Metric,
    GroupBy,
    OrderBy,
}

impl InputKind {
    pub fn expected(&self) -> &'static str {
        match self {
            InputKind::Metric => "metric name",
            InputKind::GroupBy => "group-by item",
            InputKind::OrderBy => "order-by item",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverInput {
    Metric {
        input: PatternInput,
        alias: Option<String>,
    },
    GroupByItem(PatternInput),
    /// Candidate patterns in priority order: metric first, then group-by items.
    OrderBy {
        input_str: String,
        patterns: Vec<SpecPattern>,
        descending: bool,
    },
    Limit(i64),
    MinMaxOnly(bool),
    ApplyGroupBy(bool),
    TimeRange {
        start: Option<String>,
        end: Option<String>,
    },
    WhereFilterIntersection(WhereFilterIntersection),
    SavedQuery(String),
    /// The query as a whole, for issues no single input causes.
    Query {
        metrics: Vec<String>,
        group_by: Vec<String>,
    },
    /// A string no naming scheme recognised.
    InvalidString {
        kind: InputKind,
        input_str: String,
    },
}

impl ResolverInput {
    /// How the input is shown in an issue report.
    pub fn ui_description(&self) -> String {
        fn quoted(items: &[String]) -> String {
            let items: Vec<String> = items.iter().map(|i| format!("'{i}'")).collect();
            format!("[{}]", items.join(", "))
        }

        match self {
            ResolverInput::Metric { input, alias } => match alias {
                Some(alias) => format!("Metric('{}', alias='{}')", input.input_str, alias),
                None => format!("Metric('{}')", input.input_str),
            },
            ResolverInput::GroupByItem(input) => format!("GroupBy('{}')", input.input_str),
            ResolverInput::OrderBy {
                input_str,
                descending,
                ..
            } => format!("OrderBy('{input_str}', descending={descending})"),
            ResolverInput::Limit(limit) => format!("Limit({limit})"),
            ResolverInput::MinMaxOnly(value) => format!("MinMaxOnly({value})"),
            ResolverInput::ApplyGroupBy(value) => format!("ApplyGroupBy({value})"),
            ResolverInput::TimeRange { start, end } => format!(
                "TimeRange(start={}, end={})",
                start.as_deref().unwrap_or("None"),
                end.as_deref().unwrap_or("None")
            ),
            ResolverInput::WhereFilterIntersection(intersection) => {
                let templates: Vec<String> = intersection
                    .where_filters
                    .iter()
                    .map(|f| f.where_sql_template.clone())
                    .collect();
                format!("WhereFilter({})", quoted(&templates))
            }
            ResolverInput::SavedQuery(name) => format!("SavedQuery('{name}')"),
            ResolverInput::Query { metrics, group_by } => format!(
                "Query(metrics={}, group_by={})",
                quoted(metrics),
                quoted(group_by)
            ),
            ResolverInput::InvalidString { input_str, .. } => format!("'{input_str}'"),
        }
    }
}

impl fmt::Display for ResolverInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ui_description())
    }
}
