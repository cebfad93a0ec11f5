//! Error types.
//!
//! Two tiers:
//! - [`InternalError`]: the manifest or graph violates an invariant that manifest
//!   validation should have caught (recursive metrics, dangling references). These
//!   abort resolution immediately.
//! - Resolution issues ([`crate::resolver::issues`]): problems with the query itself.
//!   They are accumulated and reported together through [`QueryError::InvalidQuery`].

use crate::resolver::issues::InvalidQueryReport;

/// Result type for operations that can only fail on internal invariants.
pub type InternalResult<T> = Result<T, InternalError>;

/// Result type for query parsing.
pub type QueryResult<T> = Result<T, QueryError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InternalError {
    #[error("Metric definitions are recursive: {}", .0.join(" -> "))]
    RecursiveMetricDefinition(Vec<String>),

    #[error("Unknown metric referenced in the manifest: {0}")]
    UnknownMetric(String),

    #[error("Unknown measure referenced in the manifest: {0}")]
    UnknownMeasure(String),

    #[error("Unknown semantic model: {0}")]
    UnknownSemanticModel(String),

    #[error("Duplicate {kind} in the manifest: {name}")]
    DuplicateElement { kind: &'static str, name: String },

    #[error("Expected a metric node but reached {0}")]
    NotAMetricNode(String),

    #[error("Resolution DAG contains a cycle through {0}")]
    ResolutionDagCycle(String),

    #[error("No filter resolution recorded for {0}")]
    MissingFilterResolution(String),

    #[error("Invalid dunder name: {0:?}")]
    InvalidDunderName(String),

    #[error("Measure {measure} has an invalid agg time dimension: {dimension}")]
    InvalidAggTimeDimension { measure: String, dimension: String },
}

/// Error returned by the query parser.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    #[error("{0}")]
    InvalidQuery(InvalidQueryReport),

    #[error("Internal error: {0}")]
    Internal(#[from] InternalError),
}

impl QueryError {
    pub fn report(&self) -> Option<&InvalidQueryReport> {
        match self {
            QueryError::InvalidQuery(report) => Some(report),
            QueryError::Internal(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recursive_message() {
        let err = InternalError::RecursiveMetricDefinition(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);
        assert_eq!(err.to_string(), "Metric definitions are recursive: a -> b -> a");
    }

    #[test]
    fn test_internal_converts_into_query_error() {
        let err: QueryError = InternalError::UnknownMetric("x".to_string()).into();
        assert!(err.report().is_none());
        assert_eq!(err.to_string(), "Internal error: Unknown metric referenced in the manifest: x");
    }
}
