//! Per-query resolution DAG mirroring the metric dependency graph.
//!
//! Edges point from a node to its parents (the nodes it is computed from), so
//! the query node is the sink and measure sources are the roots:
//!
//! ```text
//! SimpleMetricSource(bookings) ──┐
//!                                ├── ComplexMetric(bookings_per_listing) ── Query
//! SimpleMetricSource(listings) ──┘
//! ```
//!
//! Edge labels carry the same capabilities as in the semantic graph: a
//! `DenyDatePart` edge strips date-part items, a `DenyVisibleAttributes` edge
//! hides a parent's items from its child.

use std::collections::BTreeMap;
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use tracing::debug;

use crate::error::{InternalError, InternalResult};
use crate::model::{MetricKind, WhereFilterIntersection};
use crate::semantic::graph::{Label, LabelSet, LabeledEdge, LabeledGraph};
use crate::semantic::SemanticManifestLookup;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionDagNode {
    /// The sink. Parented by one node per distinct metric in the query.
    Query {
        metrics: Vec<String>,
        where_filter: Option<WhereFilterIntersection>,
    },
    /// One measure in one semantic model. `metric` is the metric the measure feeds.
    SimpleMetricSource {
        metric: String,
        measure: String,
        model: String,
    },
    /// Cumulative, conversion, ratio and derived metrics.
    ComplexMetric { metric: String },
    /// Source for queries that only ask for distinct group-by values.
    NoMetricsQuerySource,
}

impl ResolutionDagNode {
    /// The metric this node resolves, if any.
    pub fn metric_name(&self) -> Option<&str> {
        match self {
            ResolutionDagNode::SimpleMetricSource { metric, .. }
            | ResolutionDagNode::ComplexMetric { metric } => Some(metric),
            ResolutionDagNode::Query { .. } | ResolutionDagNode::NoMetricsQuerySource => None,
        }
    }

    /// Description shown in issue locations.
    pub fn ui_description(&self) -> String {
        match self {
            ResolutionDagNode::Query { metrics, .. } => {
                let names: Vec<String> = metrics.iter().map(|m| format!("'{m}'")).collect();
                format!("Resolve Query([{}])", names.join(", "))
            }
            ResolutionDagNode::SimpleMetricSource { metric, measure, .. } => {
                if metric == measure {
                    format!("Resolve Metric('{metric}')")
                } else {
                    format!("Resolve Measure('{measure}') for Metric('{metric}')")
                }
            }
            ResolutionDagNode::ComplexMetric { metric } => format!("Resolve Metric('{metric}')"),
            ResolutionDagNode::NoMetricsQuerySource => "Resolve Distinct Values".to_string(),
        }
    }
}

impl fmt::Display for ResolutionDagNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ui_description())
    }
}

#[derive(Debug, Clone)]
pub struct ResolutionDag {
    graph: DiGraph<ResolutionDagNode, LabelSet>,
    sink: NodeIndex,
    metric_nodes: BTreeMap<String, NodeIndex>,
}

impl ResolutionDag {
    /// Build the DAG for `metrics` (query order, duplicates ignored).
    pub fn build(
        lookup: &SemanticManifestLookup,
        metrics: &[String],
        where_filter: Option<WhereFilterIntersection>,
    ) -> InternalResult<Self> {
        let mut distinct: Vec<String> = Vec::new();
        for metric in metrics {
            if !distinct.contains(metric) {
                distinct.push(metric.clone());
            }
        }

        let mut builder = DagBuilder {
            lookup,
            graph: DiGraph::new(),
            metric_nodes: BTreeMap::new(),
            in_progress: Vec::new(),
        };
        let sink = builder.graph.add_node(ResolutionDagNode::Query {
            metrics: distinct.clone(),
            where_filter,
        });
        if distinct.is_empty() {
            let source = builder.graph.add_node(ResolutionDagNode::NoMetricsQuerySource);
            builder.graph.add_edge(sink, source, LabelSet::empty());
        }
        for metric in &distinct {
            let node = builder.metric_node(metric)?;
            builder.graph.add_edge(sink, node, LabelSet::empty());
        }

        debug!(
            nodes = builder.graph.node_count(),
            edges = builder.graph.edge_count(),
            "built resolution DAG"
        );
        Ok(Self {
            graph: builder.graph,
            sink,
            metric_nodes: builder.metric_nodes,
        })
    }

    pub fn sink(&self) -> NodeIndex {
        self.sink
    }

    pub fn node(&self, index: NodeIndex) -> Option<&ResolutionDagNode> {
        self.graph.node_weight(index)
    }

    /// `(parent, edge labels)` for every parent of `node`, in insertion order.
    pub fn parents(&self, node: NodeIndex) -> Vec<(NodeIndex, LabelSet)> {
        let mut parents: Vec<(NodeIndex, LabelSet)> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| (e.target(), *e.weight()))
            .collect();
        parents.sort_by_key(|(n, _)| *n);
        parents
    }

    /// The node resolving `metric`, if the metric is part of this DAG.
    pub fn node_for_metric(&self, metric: &str) -> Option<NodeIndex> {
        self.metric_nodes.get(metric).copied()
    }

    /// Every metric in the DAG with its node, by metric name.
    pub fn metric_nodes(&self) -> impl Iterator<Item = (&str, NodeIndex)> + '_ {
        self.metric_nodes.iter().map(|(name, node)| (name.as_str(), *node))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }
}

impl LabeledGraph for ResolutionDag {
    fn node_indices(&self) -> Vec<NodeIndex> {
        self.graph.node_indices().collect()
    }

    fn node_labels(&self, _node: NodeIndex) -> LabelSet {
        LabelSet::empty()
    }

    fn edges_with_tail_node(&self, node: NodeIndex) -> Vec<LabeledEdge> {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| LabeledEdge {
                tail: e.source(),
                head: e.target(),
                labels: *e.weight(),
            })
            .collect()
    }

    fn edges_with_head_node(&self, node: NodeIndex) -> Vec<LabeledEdge> {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .map(|e| LabeledEdge {
                tail: e.source(),
                head: e.target(),
                labels: *e.weight(),
            })
            .collect()
    }

    fn node_description(&self, node: NodeIndex) -> String {
        self.node(node)
            .map(ResolutionDagNode::ui_description)
            .unwrap_or_else(|| format!("<missing node {}>", node.index()))
    }
}

struct DagBuilder<'a> {
    lookup: &'a SemanticManifestLookup,
    graph: DiGraph<ResolutionDagNode, LabelSet>,
    /// One node per metric, shared by every consumer.
    metric_nodes: BTreeMap<String, NodeIndex>,
    in_progress: Vec<String>,
}

impl DagBuilder<'_> {
    fn connect(&mut self, child: NodeIndex, parent: NodeIndex, labels: LabelSet) {
        match self.graph.find_edge(child, parent) {
            Some(edge) => {
                if let Some(existing) = self.graph.edge_weight_mut(edge) {
                    *existing = existing.union(&labels);
                }
            }
            None => {
                self.graph.add_edge(child, parent, labels);
            }
        }
    }

    fn source_node(&mut self, metric: &str, measure: &str) -> InternalResult<NodeIndex> {
        let model = self
            .lookup
            .graph()
            .model_for_measure(measure)
            .ok_or_else(|| InternalError::UnknownMeasure(measure.to_string()))?;
        Ok(self.graph.add_node(ResolutionDagNode::SimpleMetricSource {
            metric: metric.to_string(),
            measure: measure.to_string(),
            model: model.to_string(),
        }))
    }

    fn metric_node(&mut self, name: &str) -> InternalResult<NodeIndex> {
        if let Some(node) = self.metric_nodes.get(name) {
            return Ok(*node);
        }
        if let Some(start) = self.in_progress.iter().position(|m| m == name) {
            let mut cycle = self.in_progress[start..].to_vec();
            cycle.push(name.to_string());
            return Err(InternalError::RecursiveMetricDefinition(cycle));
        }
        let metric = self
            .lookup
            .metric(name)
            .ok_or_else(|| InternalError::UnknownMetric(name.to_string()))?;

        self.in_progress.push(name.to_string());
        let node = match &metric.kind {
            MetricKind::Simple { measure } => self.source_node(name, &measure.name),
            MetricKind::Cumulative { measure, .. } => {
                let node = self.graph.add_node(ResolutionDagNode::ComplexMetric {
                    metric: name.to_string(),
                });
                let source = self.source_node(name, &measure.name)?;
                self.connect(node, source, LabelSet::of(&[Label::DenyDatePart]));
                Ok(node)
            }
            MetricKind::Conversion {
                base_measure,
                conversion_measure,
                ..
            } => {
                let node = self.graph.add_node(ResolutionDagNode::ComplexMetric {
                    metric: name.to_string(),
                });
                let base = self.source_node(name, &base_measure.name)?;
                self.connect(node, base, LabelSet::empty());
                let conversion = self.source_node(name, &conversion_measure.name)?;
                self.connect(
                    node,
                    conversion,
                    LabelSet::of(&[Label::DenyVisibleAttributes]),
                );
                Ok(node)
            }
            MetricKind::Ratio { .. } | MetricKind::Derived { .. } => {
                let node = self.graph.add_node(ResolutionDagNode::ComplexMetric {
                    metric: name.to_string(),
                });
                let mut result = Ok(node);
                for input in metric.input_metrics() {
                    let parent = match self.metric_node(&input.name) {
                        Ok(parent) => parent,
                        Err(err) => {
                            result = Err(err);
                            break;
                        }
                    };
                    let labels = if input.offset_to_grain.is_some() {
                        LabelSet::of(&[Label::DenyDatePart])
                    } else {
                        LabelSet::empty()
                    };
                    self.connect(node, parent, labels);
                }
                result
            }
        };
        self.in_progress.pop();

        let node = node?;
        self.metric_nodes.insert(name.to_string(), node);
        Ok(node)
    }
}
