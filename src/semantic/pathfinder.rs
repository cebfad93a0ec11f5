//! Generic graph searches over any [`LabeledGraph`].
//!
//! - [`Pathfinder::find_descendants`] / [`Pathfinder::find_ancestors`]: multi-source
//!   BFS honoring deny labels, an optional node allow set and "closed" reachability.
//! - [`Pathfinder::find_paths_dfs`]: lazy DFS over weighted, cycle-free paths.
//!
//! BFS is bounded by an iteration cap. A search that hits the cap while it still
//! has a frontier is reported through [`ReachabilityResult::exhausted`] and a warning.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use petgraph::graph::NodeIndex;
use tracing::warn;

use crate::config::PathfinderSettings;
use crate::semantic::graph::{LabelSet, LabeledEdge, LabeledGraph};

// ============================================================================
// Traversal counters
// ============================================================================

/// Per-thread counters for profiling graph searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalCounters {
    pub bfs_searches: u64,
    pub bfs_iterations: u64,
    pub dfs_paths: u64,
}

thread_local! {
    static COUNTERS: RefCell<TraversalCounters> = RefCell::new(TraversalCounters::default());
}

/// Counters for searches run on the current thread.
pub fn traversal_counters() -> TraversalCounters {
    COUNTERS.with(|c| *c.borrow())
}

pub fn reset_traversal_counters() {
    COUNTERS.with(|c| *c.borrow_mut() = TraversalCounters::default());
}

fn count(update: impl FnOnce(&mut TraversalCounters)) {
    COUNTERS.with(|c| update(&mut c.borrow_mut()));
}

// ============================================================================
// BFS
// ============================================================================

/// Restrictions applied to a BFS.
#[derive(Debug, Clone, Default)]
pub struct TraversalOptions {
    /// When set, only these nodes may be reached.
    pub node_allow_set: Option<BTreeSet<NodeIndex>>,
    /// Edges carrying, or leading to nodes carrying, any of these labels are skipped.
    pub deny_labels: LabelSet,
    /// Only reach a node once every node on its upstream side is reachable.
    pub closed: bool,
}

impl TraversalOptions {
    pub fn deny(deny_labels: LabelSet) -> Self {
        Self {
            deny_labels,
            ..Self::default()
        }
    }

    pub fn with_allow_set(mut self, allow: BTreeSet<NodeIndex>) -> Self {
        self.node_allow_set = Some(allow);
        self
    }

    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReachabilityResult {
    /// Every node reached, sources included.
    pub reachable_nodes: BTreeSet<NodeIndex>,
    /// Targets that were reached.
    pub reached_target_nodes: BTreeSet<NodeIndex>,
    /// For every reached target, the sources it was reached from.
    pub source_nodes_by_target: BTreeMap<NodeIndex, BTreeSet<NodeIndex>>,
    /// Union of the labels of every traversed edge.
    pub labels: LabelSet,
    /// The search stopped at the iteration cap with work left.
    pub exhausted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    Down,
    Up,
}

#[derive(Debug, Clone)]
pub struct Pathfinder {
    max_iterations: usize,
    warn_on_exhaustion: bool,
}

impl Default for Pathfinder {
    fn default() -> Self {
        Self::new(&PathfinderSettings::default())
    }
}

impl Pathfinder {
    pub fn new(settings: &PathfinderSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            warn_on_exhaustion: settings.warn_on_exhaustion,
        }
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Nodes reachable by following edges forward from `source_nodes`. Targets are
    /// recorded but not expanded.
    pub fn find_descendants<G: LabeledGraph>(
        &self,
        graph: &G,
        source_nodes: &BTreeSet<NodeIndex>,
        target_nodes: &BTreeSet<NodeIndex>,
        options: &TraversalOptions,
    ) -> ReachabilityResult {
        self.bfs(graph, source_nodes, target_nodes, options, Walk::Down)
    }

    /// Nodes reachable by following edges backward from `target_nodes` towards
    /// `source_nodes`. Mirrors [`Self::find_descendants`].
    pub fn find_ancestors<G: LabeledGraph>(
        &self,
        graph: &G,
        target_nodes: &BTreeSet<NodeIndex>,
        source_nodes: &BTreeSet<NodeIndex>,
        options: &TraversalOptions,
    ) -> ReachabilityResult {
        self.bfs(graph, target_nodes, source_nodes, options, Walk::Up)
    }

    fn bfs<G: LabeledGraph>(
        &self,
        graph: &G,
        start_nodes: &BTreeSet<NodeIndex>,
        goal_nodes: &BTreeSet<NodeIndex>,
        options: &TraversalOptions,
        walk: Walk,
    ) -> ReachabilityResult {
        let mut result = ReachabilityResult {
            reachable_nodes: start_nodes.clone(),
            ..ReachabilityResult::default()
        };
        let mut sources_by_node: BTreeMap<NodeIndex, BTreeSet<NodeIndex>> = start_nodes
            .iter()
            .map(|n| (*n, BTreeSet::from([*n])))
            .collect();

        let mut frontier: Vec<NodeIndex> = start_nodes.iter().copied().collect();
        let mut iterations = 0;
        count(|c| c.bfs_searches += 1);

        while !frontier.is_empty() && iterations < self.max_iterations {
            iterations += 1;
            let mut next_frontier = Vec::new();

            for node in frontier {
                if goal_nodes.contains(&node) && !start_nodes.contains(&node) {
                    continue;
                }
                let node_sources = sources_by_node.get(&node).cloned().unwrap_or_default();

                let edges = match walk {
                    Walk::Down => graph.edges_with_tail_node(node),
                    Walk::Up => graph.edges_with_head_node(node),
                };
                for edge in edges {
                    let next = match walk {
                        Walk::Down => edge.head,
                        Walk::Up => edge.tail,
                    };
                    if !self.can_traverse(graph, &edge, next, &result.reachable_nodes, options, walk)
                    {
                        continue;
                    }

                    result.labels = result.labels.union(&edge.labels);
                    sources_by_node
                        .entry(next)
                        .or_default()
                        .extend(node_sources.iter().copied());
                    if result.reachable_nodes.insert(next) {
                        next_frontier.push(next);
                    }
                }
            }
            frontier = next_frontier;
        }
        count(|c| c.bfs_iterations += iterations as u64);

        if !frontier.is_empty() {
            result.exhausted = true;
            if self.warn_on_exhaustion {
                warn!(
                    max_iterations = self.max_iterations,
                    frontier = frontier.len(),
                    reachable = result.reachable_nodes.len(),
                    "graph search stopped at the iteration cap; results may be incomplete"
                );
            }
        }

        for goal in goal_nodes {
            if result.reachable_nodes.contains(goal) {
                result.reached_target_nodes.insert(*goal);
                if let Some(sources) = sources_by_node.remove(goal) {
                    result.source_nodes_by_target.insert(*goal, sources);
                }
            }
        }
        result
    }

    fn can_traverse<G: LabeledGraph>(
        &self,
        graph: &G,
        edge: &LabeledEdge,
        next: NodeIndex,
        reachable: &BTreeSet<NodeIndex>,
        options: &TraversalOptions,
        walk: Walk,
    ) -> bool {
        if edge.labels.intersects(&options.deny_labels)
            || graph.node_labels(next).intersects(&options.deny_labels)
        {
            return false;
        }
        if let Some(allow) = &options.node_allow_set {
            if !allow.contains(&next) {
                return false;
            }
        }
        if options.closed {
            let upstream = match walk {
                Walk::Down => graph.predecessors(next),
                Walk::Up => graph.successors(next),
            };
            if !upstream.is_subset(reachable) {
                return false;
            }
        }
        true
    }

    // ========================================================================
    // DFS
    // ========================================================================

    /// Lazily enumerate cycle-free paths from the end of `initial_path` to any of
    /// `target_nodes`.
    ///
    /// `weight` returns the cost of an edge given the path so far, or `None` to
    /// block it. Paths heavier than `max_path_weight` are not explored. Paths are
    /// extended past targets, so a path through one target to another yields both.
    /// When given, a path only steps onto nodes in `node_allow_set` and never onto
    /// nodes in `node_deny_set`.
    pub fn find_paths_dfs<'g, G, W>(
        &self,
        graph: &'g G,
        initial_path: Vec<NodeIndex>,
        target_nodes: BTreeSet<NodeIndex>,
        weight: W,
        max_path_weight: u32,
        node_allow_set: Option<BTreeSet<NodeIndex>>,
        node_deny_set: Option<BTreeSet<NodeIndex>>,
    ) -> PathIter<'g, G, W>
    where
        G: LabeledGraph,
        W: Fn(&LabeledEdge, &[NodeIndex]) -> Option<u32>,
    {
        PathIter::new(
            graph,
            initial_path,
            target_nodes,
            weight,
            max_path_weight,
            node_allow_set,
            node_deny_set,
        )
    }
}

/// A path found by [`Pathfinder::find_paths_dfs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedPath {
    pub nodes: Vec<NodeIndex>,
    pub weight: u32,
}

struct Frame {
    weight: u32,
    children: Vec<(NodeIndex, u32)>,
    next: usize,
}

pub struct PathIter<'g, G, W> {
    graph: &'g G,
    targets: BTreeSet<NodeIndex>,
    weight: W,
    max_path_weight: u32,
    node_allow_set: Option<BTreeSet<NodeIndex>>,
    node_deny_set: Option<BTreeSet<NodeIndex>>,
    path: Vec<NodeIndex>,
    on_path: HashSet<NodeIndex>,
    stack: Vec<Frame>,
    pending: Option<WeightedPath>,
}

impl<'g, G, W> PathIter<'g, G, W>
where
    G: LabeledGraph,
    W: Fn(&LabeledEdge, &[NodeIndex]) -> Option<u32>,
{
    fn new(
        graph: &'g G,
        initial_path: Vec<NodeIndex>,
        targets: BTreeSet<NodeIndex>,
        weight: W,
        max_path_weight: u32,
        node_allow_set: Option<BTreeSet<NodeIndex>>,
        node_deny_set: Option<BTreeSet<NodeIndex>>,
    ) -> Self {
        let mut iter = Self {
            graph,
            targets,
            weight,
            max_path_weight,
            node_allow_set,
            node_deny_set,
            on_path: initial_path.iter().copied().collect(),
            path: initial_path,
            stack: Vec::new(),
            pending: None,
        };
        if let Some(last) = iter.path.last().copied() {
            if iter.targets.contains(&last) {
                iter.pending = Some(WeightedPath {
                    nodes: iter.path.clone(),
                    weight: 0,
                });
            }
            let frame = iter.expand(0);
            iter.stack.push(frame);
        }
        iter
    }

    fn may_visit(&self, node: NodeIndex) -> bool {
        let allowed = self
            .node_allow_set
            .as_ref()
            .map_or(true, |allow| allow.contains(&node));
        let denied = self
            .node_deny_set
            .as_ref()
            .is_some_and(|deny| deny.contains(&node));
        allowed && !denied
    }

    fn expand(&self, weight: u32) -> Frame {
        let children = match self.path.last() {
            Some(node) => self
                .graph
                .edges_with_tail_node(*node)
                .into_iter()
                .filter(|e| self.may_visit(e.head))
                .filter_map(|e| (self.weight)(&e, &self.path).map(|w| (e.head, w)))
                .collect(),
            None => Vec::new(),
        };
        Frame {
            weight,
            children,
            next: 0,
        }
    }
}

impl<G, W> Iterator for PathIter<'_, G, W>
where
    G: LabeledGraph,
    W: Fn(&LabeledEdge, &[NodeIndex]) -> Option<u32>,
{
    type Item = WeightedPath;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(path) = self.pending.take() {
            count(|c| c.dfs_paths += 1);
            return Some(path);
        }

        loop {
            let top = self.stack.last_mut()?;
            if top.next >= top.children.len() {
                self.stack.pop();
                // The initial path is never shortened.
                if !self.stack.is_empty() {
                    if let Some(node) = self.path.pop() {
                        self.on_path.remove(&node);
                    }
                }
                continue;
            }

            let (child, edge_weight) = top.children[top.next];
            top.next += 1;
            let weight = top.weight.saturating_add(edge_weight);
            if self.on_path.contains(&child) || weight > self.max_path_weight {
                continue;
            }

            self.path.push(child);
            self.on_path.insert(child);
            let frame = self.expand(weight);
            self.stack.push(frame);

            if self.targets.contains(&child) {
                count(|c| c.dfs_paths += 1);
                return Some(WeightedPath {
                    nodes: self.path.clone(),
                    weight,
                });
            }
        }
    }
}
