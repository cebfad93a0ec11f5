//! Graph construction from a semantic manifest.

use tracing::debug;

use super::{Label, LabelSet, NodeData, SemanticGraph, SemanticGraphNode};
use crate::error::{InternalError, InternalResult};
use crate::model::{Metric, MetricKind, SemanticManifest};

// ============================================================================
// Construction Entry Point
// ============================================================================

impl SemanticGraph {
    /// Build the graph for a manifest.
    ///
    /// Construction happens in two phases:
    /// - Phase 1: Create all nodes (models, entity keys, measures, metrics)
    /// - Phase 2: Create all edges (joins, measure sources, metric inputs)
    pub fn from_manifest(manifest: &SemanticManifest) -> InternalResult<Self> {
        let mut graph = SemanticGraph::empty();

        graph.create_model_nodes(manifest)?;
        graph.create_measure_nodes(manifest)?;
        graph.create_metric_nodes(manifest)?;

        graph.create_join_edges(manifest);
        graph.create_measure_edges(manifest)?;
        graph.create_metric_edges(manifest)?;

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "built semantic graph"
        );
        Ok(graph)
    }
}

// ============================================================================
// Phase 1: Node Creation
// ============================================================================

impl SemanticGraph {
    fn add(&mut self, node: SemanticGraphNode, labels: &[Label]) -> petgraph::graph::NodeIndex {
        self.graph.add_node(NodeData {
            node,
            labels: LabelSet::of(labels),
        })
    }

    fn create_model_nodes(&mut self, manifest: &SemanticManifest) -> InternalResult<()> {
        for model in &manifest.semantic_models {
            if self.local_model_index.contains_key(&model.name) {
                return Err(InternalError::DuplicateElement {
                    kind: "semantic model",
                    name: model.name.clone(),
                });
            }
            let local = self.add(
                SemanticGraphNode::LocalModel(model.name.clone()),
                &[Label::LocalModel],
            );
            let joined = self.add(
                SemanticGraphNode::JoinedModel(model.name.clone()),
                &[Label::JoinedModel],
            );
            self.local_model_index.insert(model.name.clone(), local);
            self.joined_model_index.insert(model.name.clone(), joined);

            for entity in model.entity_names() {
                if !self.entity_key_index.contains_key(entity) {
                    let node = self.add(
                        SemanticGraphNode::EntityKey(entity.to_string()),
                        &[Label::EntityKey],
                    );
                    self.entity_key_index.insert(entity.to_string(), node);
                }
            }
        }
        Ok(())
    }

    fn create_measure_nodes(&mut self, manifest: &SemanticManifest) -> InternalResult<()> {
        for model in &manifest.semantic_models {
            for measure in &model.measures {
                if self.measure_index.contains_key(&measure.name) {
                    return Err(InternalError::DuplicateElement {
                        kind: "measure",
                        name: measure.name.clone(),
                    });
                }
                let node = self.add(
                    SemanticGraphNode::Measure(measure.name.clone()),
                    &[Label::Measure],
                );
                self.measure_index.insert(measure.name.clone(), node);
                self.measure_models
                    .insert(measure.name.clone(), model.name.clone());
            }
        }
        Ok(())
    }

    fn create_metric_nodes(&mut self, manifest: &SemanticManifest) -> InternalResult<()> {
        for metric in &manifest.metrics {
            if self.metric_index.contains_key(&metric.name) {
                return Err(InternalError::DuplicateElement {
                    kind: "metric",
                    name: metric.name.clone(),
                });
            }
            let kind_label = if metric.is_base() {
                Label::BaseMetric
            } else {
                Label::DerivedMetric
            };
            let node = self.add(
                SemanticGraphNode::Metric(metric.name.clone()),
                &[Label::Metric, kind_label],
            );
            self.metric_index.insert(metric.name.clone(), node);
        }
        Ok(())
    }
}

// ============================================================================
// Phase 2: Edge Creation
// ============================================================================

impl SemanticGraph {
    /// Add an edge, merging labels into an existing parallel edge.
    fn connect(
        &mut self,
        tail: petgraph::graph::NodeIndex,
        head: petgraph::graph::NodeIndex,
        labels: LabelSet,
    ) {
        match self.graph.find_edge(tail, head) {
            Some(edge) => {
                if let Some(existing) = self.graph.edge_weight_mut(edge) {
                    *existing = existing.union(&labels);
                }
            }
            None => {
                self.graph.add_edge(tail, head, labels);
            }
        }
    }

    /// Model → entity key edges for every entity, and entity key → joined model
    /// edges where the entity identifies a single row of the model.
    fn create_join_edges(&mut self, manifest: &SemanticManifest) {
        for model in &manifest.semantic_models {
            let (Some(local), Some(joined)) = (
                self.local_model_node(&model.name),
                self.joined_model_node(&model.name),
            ) else {
                continue;
            };
            for entity in model.entity_names() {
                let Some(key) = self.entity_key_node(entity) else {
                    continue;
                };
                self.connect(local, key, LabelSet::empty());
                self.connect(joined, key, LabelSet::empty());
                if model.is_join_target_for(entity) {
                    self.connect(key, joined, LabelSet::of(&[Label::JoinEdge]));
                }
            }
        }
    }

    fn create_measure_edges(&mut self, manifest: &SemanticManifest) -> InternalResult<()> {
        for model in &manifest.semantic_models {
            let Some(local) = self.local_model_node(&model.name) else {
                continue;
            };
            for measure in &model.measures {
                let Some(measure_node) = self.measure_node(&measure.name) else {
                    continue;
                };
                self.connect(measure_node, local, LabelSet::empty());

                match model.agg_time_dimension_for(&measure.name) {
                    Some(_) => self.connect(measure_node, self.metric_time, LabelSet::empty()),
                    None => {
                        if let Some(dimension) = &measure.agg_time_dimension {
                            return Err(InternalError::InvalidAggTimeDimension {
                                measure: measure.name.clone(),
                                dimension: dimension.clone(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn create_metric_edges(&mut self, manifest: &SemanticManifest) -> InternalResult<()> {
        for metric in &manifest.metrics {
            let node = self
                .metric_node(&metric.name)
                .ok_or_else(|| InternalError::UnknownMetric(metric.name.clone()))?;
            for (target, labels) in self.metric_dependencies(metric)? {
                self.connect(node, target, labels);
            }
        }
        Ok(())
    }

    fn metric_dependencies(
        &self,
        metric: &Metric,
    ) -> InternalResult<Vec<(petgraph::graph::NodeIndex, LabelSet)>> {
        let measure = |name: &str| {
            self.measure_node(name)
                .ok_or_else(|| InternalError::UnknownMeasure(name.to_string()))
        };
        let input_metric = |name: &str| {
            self.metric_node(name)
                .ok_or_else(|| InternalError::UnknownMetric(name.to_string()))
        };

        let deps = match &metric.kind {
            MetricKind::Simple { measure: m } => vec![(measure(&m.name)?, LabelSet::empty())],
            MetricKind::Cumulative { measure: m, .. } => vec![(
                measure(&m.name)?,
                LabelSet::of(&[Label::DenyDatePart, Label::DenyEntityKeyQueryResolution]),
            )],
            MetricKind::Conversion {
                base_measure,
                conversion_measure,
                ..
            } => vec![
                (
                    measure(&base_measure.name)?,
                    LabelSet::of(&[Label::DenyEntityKeyQueryResolution]),
                ),
                (
                    measure(&conversion_measure.name)?,
                    LabelSet::of(&[
                        Label::DenyVisibleAttributes,
                        Label::DenyEntityKeyQueryResolution,
                    ]),
                ),
            ],
            MetricKind::Ratio { .. } | MetricKind::Derived { .. } => {
                let mut deps = Vec::new();
                for input in metric.input_metrics() {
                    let mut labels = LabelSet::empty();
                    if input.offset_to_grain.is_some() {
                        labels.insert(Label::DenyDatePart);
                    }
                    if input.has_offset() {
                        labels.insert(Label::DenyEntityKeyQueryResolution);
                    }
                    deps.push((input_metric(&input.name)?, labels));
                }
                deps
            }
        };
        Ok(deps)
    }
}
