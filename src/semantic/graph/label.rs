//! Labels on graph nodes and edges, and the read-only graph interface the
//! pathfinder walks.
//!
//! Labels are capabilities, not types: traversal code asks "does this edge carry
//! `DenyDatePart`?" instead of matching on node kinds.

use std::collections::BTreeSet;

use petgraph::graph::NodeIndex;

use crate::semantic::flags::{Flag, FlagSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Measure,
    Metric,
    /// Metric defined directly on measures.
    BaseMetric,
    /// Metric defined on other metrics.
    DerivedMetric,
    LocalModel,
    JoinedModel,
    EntityKey,
    MetricTime,
    /// Edge into a join target model.
    JoinEdge,
    /// Group-by metrics cannot be resolved through this edge.
    DenyEntityKeyQueryResolution,
    /// Items of the head node are used for computation but can't be grouped by.
    DenyVisibleAttributes,
    /// Date part group-by items don't survive this edge.
    DenyDatePart,
}

impl Flag for Label {
    const ALL: &'static [Self] = &[
        Label::Measure,
        Label::Metric,
        Label::BaseMetric,
        Label::DerivedMetric,
        Label::LocalModel,
        Label::JoinedModel,
        Label::EntityKey,
        Label::MetricTime,
        Label::JoinEdge,
        Label::DenyEntityKeyQueryResolution,
        Label::DenyVisibleAttributes,
        Label::DenyDatePart,
    ];

    fn bit(self) -> u32 {
        self as u32
    }
}

pub type LabelSet = FlagSet<Label>;

/// A directed edge with its labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabeledEdge {
    pub tail: NodeIndex,
    pub head: NodeIndex,
    pub labels: LabelSet,
}

/// Read-only view of a graph whose nodes and edges carry label sets.
pub trait LabeledGraph {
    fn node_indices(&self) -> Vec<NodeIndex>;

    fn node_labels(&self, node: NodeIndex) -> LabelSet;

    /// Edges leaving `node`.
    fn edges_with_tail_node(&self, node: NodeIndex) -> Vec<LabeledEdge>;

    /// Edges entering `node`.
    fn edges_with_head_node(&self, node: NodeIndex) -> Vec<LabeledEdge>;

    /// Human readable node description for logs and error text.
    fn node_description(&self, node: NodeIndex) -> String;

    /// Nodes carrying every one of `labels`.
    fn nodes_with_labels(&self, labels: &[Label]) -> BTreeSet<NodeIndex> {
        let required = LabelSet::of(labels);
        self.node_indices()
            .into_iter()
            .filter(|n| self.node_labels(*n).is_superset(&required))
            .collect()
    }

    fn predecessors(&self, node: NodeIndex) -> BTreeSet<NodeIndex> {
        self.edges_with_head_node(node)
            .into_iter()
            .map(|e| e.tail)
            .collect()
    }

    fn successors(&self, node: NodeIndex) -> BTreeSet<NodeIndex> {
        self.edges_with_tail_node(node)
            .into_iter()
            .map(|e| e.head)
            .collect()
    }
}
