//! Read-only manifest lookup with lazily computed, manifest-scoped caches.
//!
//! `SemanticManifestLookup` is the single entry point the resolvers use. It owns
//! the manifest and its semantic graph, and memoizes derived structures:
//!
//! - entity-key tries (computed on first group-by metric request)
//! - linkable elements per measure
//! - linkable elements for queries without metrics
//!
//! The manifest never changes after construction, so nothing is invalidated. The
//! lookup is `Send + Sync` and can be shared across threads resolving queries.
//!
//! # Example
//!
//! ```ignore
//! use mantis_metrics::semantic::SemanticManifestLookup;
//!
//! let lookup = SemanticManifestLookup::new(manifest)?;
//! let elements = lookup.linkable_elements_for_measure("bookings")?;
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tracing::debug;

use super::entity_key::EntityKeyResolution;
use super::graph::{Label, LabeledGraph, SemanticGraph};
use super::linkable::{group_by_metric_element, LinkableElementBuilder, LinkableElementSet};
use super::pathfinder::{Pathfinder, TraversalOptions};
use crate::config::Settings;
use crate::error::{InternalError, InternalResult};
use crate::model::{
    ExpandedTimeGranularity, Metric, SemanticManifest, SemanticModel, TimeGranularity,
};

pub struct SemanticManifestLookup {
    /// The manifest being queried
    manifest: SemanticManifest,
    /// Labeled graph over models, measures, entities and metrics
    graph: SemanticGraph,
    pathfinder: Pathfinder,
    settings: Settings,
    /// Entity-key tries (lazy)
    entity_keys: OnceCell<EntityKeyResolution>,
    /// Measure name → linkable elements (lazy, per measure)
    measure_elements: DashMap<String, Arc<LinkableElementSet>>,
    /// Items for queries without metrics (lazy)
    no_metrics_elements: OnceCell<Arc<LinkableElementSet>>,
}

impl std::fmt::Debug for SemanticManifestLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticManifestLookup")
            .field("semantic_models", &self.manifest.semantic_models.len())
            .field("metrics", &self.manifest.metrics.len())
            .field("graph_nodes", &self.graph.node_count())
            .finish()
    }
}

impl SemanticManifestLookup {
    /// Build the lookup with default settings.
    pub fn new(manifest: SemanticManifest) -> InternalResult<Self> {
        Self::with_settings(manifest, Settings::default())
    }

    /// Build the lookup. The semantic graph is built immediately; everything else
    /// is deferred until first use.
    pub fn with_settings(manifest: SemanticManifest, settings: Settings) -> InternalResult<Self> {
        let graph = SemanticGraph::from_manifest(&manifest)?;
        let pathfinder = Pathfinder::new(&settings.pathfinder);
        Ok(Self {
            manifest,
            graph,
            pathfinder,
            settings,
            entity_keys: OnceCell::new(),
            measure_elements: DashMap::new(),
            no_metrics_elements: OnceCell::new(),
        })
    }

    pub fn manifest(&self) -> &SemanticManifest {
        &self.manifest
    }

    pub fn graph(&self) -> &SemanticGraph {
        &self.graph
    }

    pub fn pathfinder(&self) -> &Pathfinder {
        &self.pathfinder
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.manifest.metric(name)
    }

    pub fn metric_names(&self) -> Vec<&str> {
        self.manifest.metrics.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn semantic_model(&self, name: &str) -> Option<&SemanticModel> {
        self.manifest.semantic_model(name)
    }

    /// The model defining a measure.
    pub fn model_for_measure(&self, measure: &str) -> Option<&SemanticModel> {
        self.graph
            .model_for_measure(measure)
            .and_then(|name| self.manifest.semantic_model(name))
    }

    /// A standard grain by name, or a custom grain defined in the manifest.
    pub fn granularity(&self, name: &str) -> Option<ExpandedTimeGranularity> {
        ExpandedTimeGranularity::by_name(name, &self.manifest.custom_granularities)
    }

    fn builder(&self) -> LinkableElementBuilder<'_> {
        LinkableElementBuilder::new(
            &self.manifest,
            &self.graph,
            &self.pathfinder,
            self.settings.joins.max_join_hops,
        )
    }

    // ========================================================================
    // Cached structures
    // ========================================================================

    /// Entity-key tries for every model and metric (computed on first access).
    pub fn entity_key_resolution(&self) -> InternalResult<&EntityKeyResolution> {
        self.entity_keys.get_or_try_init(|| {
            EntityKeyResolution::resolve(
                &self.manifest,
                &self.graph,
                &self.pathfinder,
                self.settings.joins.max_join_hops,
            )
        })
    }

    /// Every group-by item reachable from a measure, group-by metrics included.
    pub fn linkable_elements_for_measure(
        &self,
        measure: &str,
    ) -> InternalResult<Arc<LinkableElementSet>> {
        if let Some(cached) = self.measure_elements.get(measure) {
            return Ok(Arc::clone(cached.value()));
        }

        let mut set = self.builder().elements_for_measure(measure)?;
        let model = self
            .graph
            .model_for_measure(measure)
            .ok_or_else(|| InternalError::UnknownMeasure(measure.to_string()))?;
        let sources = BTreeSet::from([model.to_string()]);
        for (name, descriptor) in self.entity_key_resolution()?.group_by_metric_items(&sources, None) {
            if let [entity, metric] = name.as_slice() {
                set.add(group_by_metric_element(
                    model,
                    entity,
                    metric,
                    descriptor.derived_from_model_ids,
                ));
            }
        }
        debug!(measure, items = set.len(), "computed linkable elements");

        let set = Arc::new(set);
        self.measure_elements
            .insert(measure.to_string(), Arc::clone(&set));
        Ok(set)
    }

    /// Items available to a query without metrics (computed on first access).
    pub fn linkable_elements_for_no_metrics_query(&self) -> InternalResult<Arc<LinkableElementSet>> {
        self.no_metrics_elements
            .get_or_try_init(|| self.builder().elements_for_no_metrics_query().map(Arc::new))
            .cloned()
    }

    // ========================================================================
    // Graph queries
    // ========================================================================

    fn metric_node(&self, metric: &str) -> InternalResult<petgraph::graph::NodeIndex> {
        self.graph
            .metric_node(metric)
            .ok_or_else(|| InternalError::UnknownMetric(metric.to_string()))
    }

    /// Measures a metric is computed from, through any number of input metrics.
    pub fn measures_for_metric(&self, metric: &str) -> InternalResult<BTreeSet<String>> {
        let node = self.metric_node(metric)?;
        let measures = self.graph.nodes_with_labels(&[Label::Measure]);
        let result = self.pathfinder.find_descendants(
            &self.graph,
            &BTreeSet::from([node]),
            &measures,
            &TraversalOptions::default(),
        );
        Ok(result
            .reached_target_nodes
            .into_iter()
            .filter_map(|n| match self.graph.node(n) {
                Some(super::graph::SemanticGraphNode::Measure(name)) => Some(name.clone()),
                _ => None,
            })
            .collect())
    }

    /// Models a metric reads.
    pub fn semantic_models_for_metric(&self, metric: &str) -> InternalResult<BTreeSet<String>> {
        Ok(self
            .measures_for_metric(metric)?
            .iter()
            .filter_map(|m| self.graph.model_for_measure(m))
            .map(str::to_string)
            .collect())
    }

    /// Metrics that read a model, directly or through input metrics.
    pub fn metrics_for_semantic_model(&self, model: &str) -> InternalResult<BTreeSet<String>> {
        let node = self
            .graph
            .local_model_node(model)
            .ok_or_else(|| InternalError::UnknownSemanticModel(model.to_string()))?;
        let result = self.pathfinder.find_ancestors(
            &self.graph,
            &BTreeSet::from([node]),
            &BTreeSet::new(),
            &TraversalOptions::default(),
        );
        Ok(result
            .reachable_nodes
            .into_iter()
            .filter_map(|n| self.graph.metric_name(n))
            .map(str::to_string)
            .collect())
    }

    /// The grain a metric's `metric_time` defaults to: the metric's own setting,
    /// else the coarsest agg-time grain of its measures, but never finer than a day.
    pub fn metric_default_time_granularity(&self, metric: &str) -> InternalResult<TimeGranularity> {
        let definition = self
            .metric(metric)
            .ok_or_else(|| InternalError::UnknownMetric(metric.to_string()))?;
        if let Some(grain) = definition.time_granularity {
            return Ok(grain);
        }
        let coarsest = self
            .measures_for_metric(metric)?
            .iter()
            .filter_map(|measure| {
                self.model_for_measure(measure)?
                    .agg_time_dimension_for(measure)?
                    .time_granularity()
            })
            .max();
        Ok(coarsest.map_or(TimeGranularity::Day, |g| g.max(TimeGranularity::Day)))
    }
}
