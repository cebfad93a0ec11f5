//! Recoverable resolution issues and the report raised when a query is invalid.
//!
//! Issues are accumulated in an [`IssueSet`] and never stop the resolution of
//! independent inputs. Each issue records the resolution path that produced it.

use std::fmt;

/// Issue severity; only errors make a query invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IssueSeverity {
    Warning,
    Error,
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueSeverity::Warning => f.write_str("Warning"),
            IssueSeverity::Error => f.write_str("Error"),
        }
    }
}

/// Node descriptions from the start of a resolution to where an issue was found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ResolutionPath {
    nodes: Vec<String>,
}

impl ResolutionPath {
    pub fn new(nodes: Vec<String>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Display for ResolutionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.nodes.iter().map(|n| format!("[{n}]")).collect();
        f.write_str(&parts.join(" -> "))
    }
}

/// Candidates a DAG parent offered, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParentCandidates {
    pub parent: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ResolutionIssueKind {
    #[error("Unable to parse {input:?} as a {expected}")]
    StringInputParsing { input: String, expected: String },

    #[error("The given input does not exactly match one known metric: {metric:?}")]
    InvalidMetric { metric: String },

    #[error("The order-by item {item:?} does not match exactly one query output")]
    InvalidOrderByItem { item: String },

    #[error("The given input does not match any of the available group-by items for {metric}")]
    NoMatchingItemsForSimpleMetric { metric: String },

    #[error("The given input does not match any of the available group-by items for a query without metrics")]
    NoMatchingItemsForNoMetricsQuery,

    #[error("None of the parents produced candidates for the given input")]
    NoParentCandidates { parents: Vec<ParentCandidates> },

    #[error("The given input matches items for some metrics, but there is no item common to all of them: {}", render_parents(.parents))]
    NoCommonItemsInParents { parents: Vec<ParentCandidates> },

    #[error("{metric} does not support group-by items with a date part: {}", .items.join(", "))]
    MetricExcludesDatePart { metric: String, items: Vec<String> },

    #[error("Unable to parse the filter {filter:?}: {error}")]
    WhereFilterParsing { filter: String, error: String },

    #[error("The limit must be a non-negative integer, got {limit}")]
    InvalidLimit { limit: i64 },

    #[error("min_max_only {reason}")]
    InvalidMinMaxOnly { reason: String },

    #[error("apply_group_by=false is only supported for queries without metrics")]
    InvalidApplyGroupBy,

    #[error("The given input matches more than one group-by item: {}", .candidates.join(", "))]
    AmbiguousGroupByItem { candidates: Vec<String> },

    #[error("Metrics are queried more than once: {}", .metrics.join(", "))]
    DuplicateMetric { metrics: Vec<String> },

    #[error("{metric} requires metric_time in the group-by")]
    MetricTimeRequired { metric: String },

    #[error("More than one query output is named {column:?}")]
    DuplicateOutputColumn { column: String },

    #[error("A query needs at least one metric or group-by item")]
    NoMetricOrGroupBy,

    #[error("Invalid time range: {error}")]
    InvalidTimeRange { error: String },

    #[error("No saved query named {name:?}")]
    InvalidSavedQuery { name: String },
}

fn render_parents(parents: &[ParentCandidates]) -> String {
    parents
        .iter()
        .map(|p| format!("{} offers [{}]", p.parent, p.items.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionIssue {
    pub severity: IssueSeverity,
    pub kind: ResolutionIssueKind,
    pub path: ResolutionPath,
    pub suggestions: Vec<String>,
}

impl ResolutionIssue {
    pub fn error(kind: ResolutionIssueKind, path: ResolutionPath) -> Self {
        Self {
            severity: IssueSeverity::Error,
            kind,
            path,
            suggestions: Vec::new(),
        }
    }

    pub fn warning(kind: ResolutionIssueKind, path: ResolutionPath) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            kind,
            path,
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == IssueSeverity::Error
    }
}

/// An ordered collection of issues.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueSet {
    issues: Vec<ResolutionIssue>,
}

impl IssueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_issue(issue: ResolutionIssue) -> Self {
        Self {
            issues: vec![issue],
        }
    }

    pub fn add(&mut self, issue: ResolutionIssue) {
        if !self.issues.contains(&issue) {
            self.issues.push(issue);
        }
    }

    pub fn extend(&mut self, other: IssueSet) {
        for issue in other.issues {
            self.add(issue);
        }
    }

    pub fn merged<'a, I: IntoIterator<Item = &'a IssueSet>>(sets: I) -> IssueSet {
        let mut merged = IssueSet::new();
        for set in sets {
            merged.extend(set.clone());
        }
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(ResolutionIssue::is_error)
    }

    pub fn issues(&self) -> &[ResolutionIssue] {
        &self.issues
    }

    pub fn errors(&self) -> impl Iterator<Item = &ResolutionIssue> {
        self.issues.iter().filter(|i| i.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ResolutionIssue> {
        self.issues.iter().filter(|i| !i.is_error())
    }
}

impl From<ResolutionIssue> for IssueSet {
    fn from(issue: ResolutionIssue) -> Self {
        IssueSet::from_issue(issue)
    }
}

/// One error in a report, paired with the query input that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub input: String,
    pub issue: ResolutionIssue,
}

/// Every error found while resolving a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidQueryReport {
    entries: Vec<ReportEntry>,
}

impl InvalidQueryReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the errors of `issues` against `input`. Warnings are not reported.
    pub fn add_issues(&mut self, input: &str, issues: &IssueSet) {
        for issue in issues.errors() {
            let entry = ReportEntry {
                input: input.to_string(),
                issue: issue.clone(),
            };
            if !self.entries.contains(&entry) {
                self.entries.push(entry);
            }
        }
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, predicate: impl Fn(&ResolutionIssueKind) -> bool) -> bool {
        self.entries.iter().any(|e| predicate(&e.issue.kind))
    }
}

impl fmt::Display for InvalidQueryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Got errors while resolving the query.")?;
        for (i, entry) in self.entries.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "Error #{}:", i + 1)?;
            writeln!(f, "  Input: {}", entry.input)?;
            writeln!(f, "  Message: {}", entry.issue.kind)?;
            if !entry.issue.suggestions.is_empty() {
                writeln!(f, "  Suggestions: {}", entry.issue.suggestions.join(", "))?;
            }
            if !entry.issue.path.is_empty() {
                writeln!(f, "  Issue Location: {}", entry.issue.path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_set_errors() {
        let mut issues = IssueSet::new();
        assert!(!issues.has_errors());
        issues.add(ResolutionIssue::warning(
            ResolutionIssueKind::NoMetricOrGroupBy,
            ResolutionPath::default(),
        ));
        assert!(!issues.has_errors());
        issues.add(ResolutionIssue::error(
            ResolutionIssueKind::InvalidLimit { limit: -1 },
            ResolutionPath::default(),
        ));
        assert!(issues.has_errors());
        assert_eq!(issues.errors().count(), 1);
    }

    #[test]
    fn test_report_rendering() {
        let mut report = InvalidQueryReport::new();
        let issue = ResolutionIssue::error(
            ResolutionIssueKind::InvalidMetric {
                metric: "bookngs".to_string(),
            },
            ResolutionPath::new(vec!["Resolve Query(['bookngs'])".to_string()]),
        )
        .with_suggestions(vec!["bookings".to_string()]);
        report.add_issues("Metric('bookngs')", &IssueSet::from(issue));
        insta::assert_snapshot!(report.to_string(), @r###"
        Got errors while resolving the query.

        Error #1:
          Input: Metric('bookngs')
          Message: The given input does not exactly match one known metric: "bookngs"
          Suggestions: bookings
          Issue Location: [Resolve Query(['bookngs'])]
        "###);
    }
}
