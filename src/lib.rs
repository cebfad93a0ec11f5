//! # Mantis Metrics
//!
//! Resolves metric queries against a semantic manifest.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 SemanticManifest (JSON)                  │
//! │   (semantic models, measures, metrics, saved queries)    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [graph builder]
//! ┌─────────────────────────────────────────────────────────┐
//! │         SemanticGraph (labeled nodes and edges)          │
//! │   + Pathfinder + entity-key tries + linkable elements    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [resolution DAG + push-down]
//! ┌─────────────────────────────────────────────────────────┐
//! │    Group-by items and filter references per metric       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [query parser + validation]
//! ┌─────────────────────────────────────────────────────────┐
//! │                       QuerySpec                          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use mantis_metrics::prelude::*;
//!
//! let manifest = SemanticManifest::from_json("{}").unwrap();
//! let lookup = SemanticManifestLookup::new(manifest).unwrap();
//! let result = QueryParser::new(&lookup).parse_and_validate_query(
//!     &QueryParameters::new()
//!         .with_metrics(&["bookings"])
//!         .with_group_by(&["metric_time__month"]),
//! );
//! match result {
//!     Ok(parsed) => println!("{:?}", parsed.query_spec),
//!     Err(err) => eprintln!("{err}"),
//! }
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod resolver;
pub mod semantic;
pub mod spec;

pub use error::{InternalError, InternalResult, QueryError, QueryResult};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::error::{InternalError, QueryError};
    pub use crate::model::{
        CallParameterSet, Metric, MetricInput, SavedQuery, SemanticManifest, SemanticModel,
        TimeGranularity, WhereFilter, WhereFilterIntersection,
    };
    pub use crate::resolver::{
        GroupByParameter, InvalidQueryReport, MetricParameter, OrderByParameter,
        ParseQueryResult, QueryParameters, QueryParser, ResolutionIssueKind,
    };
    pub use crate::semantic::SemanticManifestLookup;
    pub use crate::spec::{
        DimensionSpec, EntitySpec, InstanceSpec, LinkableInstanceSpec, MetricSpec, QuerySpec,
        TimeDimensionSpec,
    };
}
