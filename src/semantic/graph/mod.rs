//! Labeled semantic graph built once per manifest.
//!
//! Nodes:
//! - Metric: one per metric (`BaseMetric` or `DerivedMetric`)
//! - Measure: one per measure
//! - LocalModel / JoinedModel: each semantic model as a query source and as a join target
//! - EntityKey: one per entity name
//! - MetricTime: the virtual `metric_time` dimension
//!
//! Edges point from a consumer to what it depends on:
//! - metric → measure, metric → input metric
//! - measure → local model, measure → metric time
//! - local/joined model → entity key → joined model (the join)

mod builder;
pub mod label;

pub use label::{Label, LabelSet, LabeledEdge, LabeledGraph};

use std::collections::HashMap;
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

/// Identity of a node in the semantic graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SemanticGraphNode {
    Metric(String),
    Measure(String),
    LocalModel(String),
    JoinedModel(String),
    EntityKey(String),
    MetricTime,
}

impl SemanticGraphNode {
    /// Model name for local/joined model nodes.
    pub fn model_name(&self) -> Option<&str> {
        match self {
            SemanticGraphNode::LocalModel(name) | SemanticGraphNode::JoinedModel(name) => {
                Some(name)
            }
            _ => None,
        }
    }
}

impl fmt::Display for SemanticGraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticGraphNode::Metric(name) => write!(f, "Metric({name})"),
            SemanticGraphNode::Measure(name) => write!(f, "Measure({name})"),
            SemanticGraphNode::LocalModel(name) => write!(f, "LocalModel({name})"),
            SemanticGraphNode::JoinedModel(name) => write!(f, "JoinedModel({name})"),
            SemanticGraphNode::EntityKey(name) => write!(f, "EntityKey({name})"),
            SemanticGraphNode::MetricTime => f.write_str("MetricTime"),
        }
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    node: SemanticGraphNode,
    labels: LabelSet,
}

#[derive(Debug, Clone)]
pub struct SemanticGraph {
    /// The underlying directed graph
    graph: DiGraph<NodeData, LabelSet>,

    /// Index: metric name → NodeIndex
    metric_index: HashMap<String, NodeIndex>,

    /// Index: measure name → NodeIndex
    measure_index: HashMap<String, NodeIndex>,

    /// Index: model name → local model NodeIndex
    local_model_index: HashMap<String, NodeIndex>,

    /// Index: model name → joined model NodeIndex
    joined_model_index: HashMap<String, NodeIndex>,

    /// Index: entity name → NodeIndex
    entity_key_index: HashMap<String, NodeIndex>,

    metric_time: NodeIndex,

    /// Measure name → owning model name
    measure_models: HashMap<String, String>,
}

impl SemanticGraph {
    fn empty() -> Self {
        let mut graph = DiGraph::new();
        let metric_time = graph.add_node(NodeData {
            node: SemanticGraphNode::MetricTime,
            labels: LabelSet::of(&[Label::MetricTime]),
        });
        Self {
            graph,
            metric_index: HashMap::new(),
            measure_index: HashMap::new(),
            local_model_index: HashMap::new(),
            joined_model_index: HashMap::new(),
            entity_key_index: HashMap::new(),
            metric_time,
            measure_models: HashMap::new(),
        }
    }

    pub fn node(&self, index: NodeIndex) -> Option<&SemanticGraphNode> {
        self.graph.node_weight(index).map(|d| &d.node)
    }

    pub fn metric_node(&self, name: &str) -> Option<NodeIndex> {
        self.metric_index.get(name).copied()
    }

    pub fn measure_node(&self, name: &str) -> Option<NodeIndex> {
        self.measure_index.get(name).copied()
    }

    pub fn local_model_node(&self, name: &str) -> Option<NodeIndex> {
        self.local_model_index.get(name).copied()
    }

    pub fn joined_model_node(&self, name: &str) -> Option<NodeIndex> {
        self.joined_model_index.get(name).copied()
    }

    pub fn entity_key_node(&self, name: &str) -> Option<NodeIndex> {
        self.entity_key_index.get(name).copied()
    }

    pub fn metric_time_node(&self) -> NodeIndex {
        self.metric_time
    }

    pub fn model_for_measure(&self, measure: &str) -> Option<&str> {
        self.measure_models.get(measure).map(String::as_str)
    }

    pub fn metric_name(&self, index: NodeIndex) -> Option<&str> {
        match self.node(index)? {
            SemanticGraphNode::Metric(name) => Some(name),
            _ => None,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Labels on the edge `tail → head`, if present.
    pub fn edge_labels(&self, tail: NodeIndex, head: NodeIndex) -> Option<LabelSet> {
        self.graph
            .find_edge(tail, head)
            .and_then(|e| self.graph.edge_weight(e))
            .copied()
    }

    fn edges(&self, node: NodeIndex, direction: Direction) -> Vec<LabeledEdge> {
        self.graph
            .edges_directed(node, direction)
            .map(|e| LabeledEdge {
                tail: e.source(),
                head: e.target(),
                labels: *e.weight(),
            })
            .collect()
    }
}

impl LabeledGraph for SemanticGraph {
    fn node_indices(&self) -> Vec<NodeIndex> {
        self.graph.node_indices().collect()
    }

    fn node_labels(&self, node: NodeIndex) -> LabelSet {
        self.graph
            .node_weight(node)
            .map(|d| d.labels)
            .unwrap_or_default()
    }

    fn edges_with_tail_node(&self, node: NodeIndex) -> Vec<LabeledEdge> {
        self.edges(node, Direction::Outgoing)
    }

    fn edges_with_head_node(&self, node: NodeIndex) -> Vec<LabeledEdge> {
        self.edges(node, Direction::Incoming)
    }

    fn node_description(&self, node: NodeIndex) -> String {
        self.node(node)
            .map(|n| n.to_string())
            .unwrap_or_else(|| format!("Node({})", node.index()))
    }
}

#[cfg(test)]
mod tests;
