//! Query resolution.
//!
//! - [`dag`]: the metric dependency DAG a query resolves against
//! - [`push_down`]: which group-by items each DAG node can offer
//! - [`group_by_item`]: one group-by input to exactly one spec
//! - [`filter`]: references inside where filters, scoped to where they are defined
//! - [`naming`]: the string syntaxes for query items
//! - [`parser`]: the orchestrating [`QueryParser`]
//! - [`validation`]: whole-query checks after resolution

pub mod dag;
pub mod filter;
pub mod group_by_item;
pub mod input;
pub mod issues;
pub mod naming;
pub mod parameters;
pub mod parser;
pub mod push_down;
pub mod suggestions;
pub mod validation;

pub use dag::{ResolutionDag, ResolutionDagNode};
pub use filter::{
    FilterSpecResolution, FilterSpecResolutionLookup, WhereFilterLocation, WhereFilterSpecResolver,
};
pub use group_by_item::{GroupByItemResolution, GroupByItemResolver};
pub use issues::{
    InvalidQueryReport, IssueSet, IssueSeverity, ResolutionIssue, ResolutionIssueKind,
    ResolutionPath,
};
pub use naming::{
    DunderNamingScheme, MetricNamingScheme, ObjectBuilderNamingScheme, QueryItemNamingScheme,
};
pub use parameters::{GroupByParameter, MetricParameter, OrderByItem, OrderByParameter};
pub use parser::{ParseQueryResult, QueryParameters, QueryParser};
pub use push_down::{PushDownResolver, PushDownResult};
pub use suggestions::SuggestionGenerator;
pub use validation::PostResolutionQueryValidationRule;
