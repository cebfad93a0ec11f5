//! In-memory semantic manifest.
//!
//! Building and validating a manifest from YAML lives elsewhere; this crate consumes
//! an already-valid [`SemanticManifest`], usually deserialized from JSON.

pub mod filter;
pub mod metric;
pub mod saved_query;
pub mod semantic_model;
pub mod types;

pub use filter::{CallParameterSet, WhereFilter, WhereFilterIntersection};
pub use metric::{Metric, MetricInput, MetricInputMeasure, MetricKind};
pub use saved_query::SavedQuery;
pub use semantic_model::{Dimension, DimensionKind, Entity, Measure, SemanticModel};
pub use types::{
    entity_links, DatePart, EntityReference, EntityType, ExpandedTimeGranularity,
    TimeGranularity,
};

use serde::{Deserialize, Serialize};

/// Everything the resolver knows about the metrics layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticManifest {
    #[serde(default)]
    pub semantic_models: Vec<SemanticModel>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub saved_queries: Vec<SavedQuery>,
    /// Custom grains layered over the standard ones.
    #[serde(default)]
    pub custom_granularities: Vec<ExpandedTimeGranularity>,
}

impl SemanticManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_semantic_model(mut self, model: SemanticModel) -> Self {
        self.semantic_models.push(model);
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn with_saved_query(mut self, saved_query: SavedQuery) -> Self {
        self.saved_queries.push(saved_query);
        self
    }

    pub fn with_custom_granularity(
        mut self,
        name: impl Into<String>,
        base_granularity: TimeGranularity,
    ) -> Self {
        self.custom_granularities
            .push(ExpandedTimeGranularity::custom(name, base_granularity));
        self
    }

    pub fn semantic_model(&self, name: &str) -> Option<&SemanticModel> {
        self.semantic_models.iter().find(|m| m.name == name)
    }

    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn saved_query(&self, name: &str) -> Option<&SavedQuery> {
        self.saved_queries.iter().find(|q| q.name == name)
    }
}
