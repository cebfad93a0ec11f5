//! Entity-key tries per model and per metric, and the group-by metrics they offer.
//!
//! A model's trie holds the entity keys it can be queried by: its own entities
//! (`listing`) and entities of joined models (`listing__user`). A metric's trie is
//! the intersection of the tries of the models or input metrics it is visibly
//! built from. Hidden inputs contribute provenance but never names.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::graph::NodeIndex;
use tracing::debug;

use crate::error::{InternalError, InternalResult};
use crate::model::SemanticManifest;
use crate::semantic::graph::{Label, LabelSet, LabeledGraph, SemanticGraph, SemanticGraphNode};
use crate::semantic::linkable::{find_join_paths, ElementProperties, ElementProperty};
use crate::semantic::pathfinder::{Pathfinder, TraversalOptions};
use crate::semantic::trie::{DunderNameDescriptor, DunderNameTrie, IndexedDunderName, MutableDunderNameTrie};
use crate::spec::LinkableElementType;

/// Entity-key tries for every model and metric of a manifest.
#[derive(Debug, Clone, Default)]
pub struct EntityKeyResolution {
    model_tries: BTreeMap<String, DunderNameTrie>,
    metric_tries: BTreeMap<String, DunderNameTrie>,
    /// Length-1 entity key → metrics that can be grouped by it.
    metrics_by_entity_key: BTreeMap<String, BTreeSet<String>>,
}

impl EntityKeyResolution {
    pub fn resolve(
        manifest: &SemanticManifest,
        graph: &SemanticGraph,
        pathfinder: &Pathfinder,
        max_join_hops: u32,
    ) -> InternalResult<Self> {
        let model_tries: BTreeMap<String, DunderNameTrie> = manifest
            .semantic_models
            .iter()
            .map(|model| {
                let trie = model_entity_key_trie(manifest, graph, pathfinder, &model.name, max_join_hops);
                (model.name.clone(), trie)
            })
            .collect();

        let mut resolver = MetricTrieResolver {
            graph,
            pathfinder,
            model_tries: &model_tries,
            memo: HashMap::new(),
            in_progress: Vec::new(),
        };
        let mut metric_tries = BTreeMap::new();
        for metric in &manifest.metrics {
            let node = graph
                .metric_node(&metric.name)
                .ok_or_else(|| InternalError::UnknownMetric(metric.name.clone()))?;
            metric_tries.insert(metric.name.clone(), resolver.resolve(node)?);
        }

        let mut metrics_by_entity_key: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (metric, trie) in &metric_tries {
            for (name, _) in trie.name_items(Some(1)) {
                metrics_by_entity_key
                    .entry(name[0].clone())
                    .or_default()
                    .insert(metric.clone());
            }
        }

        debug!(
            models = model_tries.len(),
            metrics = metric_tries.len(),
            entity_keys = metrics_by_entity_key.len(),
            "resolved entity-key tries"
        );
        Ok(Self {
            model_tries,
            metric_tries,
            metrics_by_entity_key,
        })
    }

    pub fn model_trie(&self, model: &str) -> Option<&DunderNameTrie> {
        self.model_tries.get(model)
    }

    pub fn metric_trie(&self, metric: &str) -> Option<&DunderNameTrie> {
        self.metric_tries.get(metric)
    }

    pub fn metrics_for_entity_key(&self, entity: &str) -> Option<&BTreeSet<String>> {
        self.metrics_by_entity_key.get(entity)
    }

    /// Group-by metrics (`entity__metric`) available to a query reading
    /// `source_models`, optionally restricted to `allowed_metrics`.
    pub fn group_by_metric_items(
        &self,
        source_models: &BTreeSet<String>,
        allowed_metrics: Option<&BTreeSet<String>>,
    ) -> Vec<(IndexedDunderName, DunderNameDescriptor)> {
        let tries: Vec<&DunderNameTrie> = source_models
            .iter()
            .filter_map(|m| self.model_tries.get(m))
            .collect();
        let common = DunderNameTrie::intersection_merge_common(&tries);

        let mut items = Vec::new();
        for (name, _) in common.name_items(Some(1)) {
            let entity = &name[0];
            let Some(metrics) = self.metrics_by_entity_key.get(entity) else {
                continue;
            };
            for metric in metrics {
                if allowed_metrics.is_some_and(|allowed| !allowed.contains(metric)) {
                    continue;
                }
                let Some(metric_descriptor) = self
                    .metric_tries
                    .get(metric)
                    .and_then(|trie| trie.descriptor(&name))
                else {
                    continue;
                };
                let mut descriptor = DunderNameDescriptor::new(
                    LinkableElementType::Metric,
                    ElementProperties::of(&[ElementProperty::Metric, ElementProperty::Joined]),
                )
                .with_derived_from(metric_descriptor.derived_from_model_ids.iter().cloned());
                descriptor.origin_model_ids = metric_descriptor.origin_model_ids.clone();
                descriptor.entity_key_queries.insert(entity.clone());
                items.push((vec![entity.clone(), metric.clone()], descriptor));
            }
        }
        items
    }
}

/// Entity keys a model can be queried by, through local entities and joins.
fn model_entity_key_trie(
    manifest: &SemanticManifest,
    graph: &SemanticGraph,
    pathfinder: &Pathfinder,
    model: &str,
    max_join_hops: u32,
) -> DunderNameTrie {
    let mut items: Vec<(IndexedDunderName, DunderNameDescriptor)> = Vec::new();
    for path in find_join_paths(graph, pathfinder, model, max_join_hops) {
        let Some(target) = manifest.semantic_model(path.last_model()) else {
            continue;
        };
        let links: Vec<String> = path
            .entity_links()
            .iter()
            .map(|l| l.name().to_string())
            .collect();
        let properties = path.properties().with(ElementProperty::Entity);
        for entity in target.entity_names() {
            if links.last().map(String::as_str) == Some(entity) {
                continue;
            }
            let mut name = links.clone();
            name.push(entity.to_string());
            let descriptor = DunderNameDescriptor::new(LinkableElementType::Entity, properties)
                .with_origin(target.name.clone())
                .with_derived_from(path.models());
            items.push((name, descriptor));
        }
    }
    let mut trie = MutableDunderNameTrie::new();
    trie.add_name_items(items);
    trie.freeze()
}

/// Recursive metric resolution with a memo and an explicit in-progress stack.
struct MetricTrieResolver<'a> {
    graph: &'a SemanticGraph,
    pathfinder: &'a Pathfinder,
    model_tries: &'a BTreeMap<String, DunderNameTrie>,
    memo: HashMap<NodeIndex, DunderNameTrie>,
    in_progress: Vec<NodeIndex>,
}

impl MetricTrieResolver<'_> {
    fn resolve(&mut self, node: NodeIndex) -> InternalResult<DunderNameTrie> {
        if let Some(trie) = self.memo.get(&node) {
            return Ok(trie.clone());
        }
        if let Some(start) = self.in_progress.iter().position(|n| *n == node) {
            let cycle = self.in_progress[start..]
                .iter()
                .chain(std::iter::once(&node))
                .map(|n| self.metric_name(*n))
                .collect::<InternalResult<Vec<_>>>()?;
            return Err(InternalError::RecursiveMetricDefinition(cycle));
        }
        self.metric_name(node)?;

        self.in_progress.push(node);
        let result = self.compute(node);
        self.in_progress.pop();

        let trie = result?;
        self.memo.insert(node, trie.clone());
        Ok(trie)
    }

    fn metric_name(&self, node: NodeIndex) -> InternalResult<String> {
        self.graph
            .metric_name(node)
            .map(str::to_string)
            .ok_or_else(|| InternalError::NotAMetricNode(self.graph.node_description(node)))
    }

    fn compute(&mut self, node: NodeIndex) -> InternalResult<DunderNameTrie> {
        let edges = self.graph.edges_with_tail_node(node);
        if edges
            .iter()
            .any(|e| e.labels.contains(Label::DenyEntityKeyQueryResolution))
        {
            return Ok(DunderNameTrie::empty());
        }

        if self.graph.node_labels(node).contains(Label::BaseMetric) {
            return Ok(self.base_metric_trie(node));
        }

        let mut visible = Vec::new();
        let mut hidden = BTreeSet::new();
        for edge in &edges {
            if !matches!(self.graph.node(edge.head), Some(SemanticGraphNode::Metric(_))) {
                return Err(InternalError::NotAMetricNode(
                    self.graph.node_description(edge.head),
                ));
            }
            let parent = self.resolve(edge.head)?;
            if edge.labels.contains(Label::DenyVisibleAttributes) {
                hidden.insert(edge.head);
            } else {
                visible.push(parent);
            }
        }
        let tries: Vec<&DunderNameTrie> = visible.iter().collect();
        let trie = DunderNameTrie::intersection_merge_common(&tries);
        Ok(with_provenance(trie, &self.models_reachable_from(&hidden, false)))
    }

    fn base_metric_trie(&self, node: NodeIndex) -> DunderNameTrie {
        let sources = BTreeSet::from([node]);
        let visible_models = self.models_reachable_from(&sources, true);
        let hidden_models: BTreeSet<String> = self
            .models_reachable_from(&sources, false)
            .difference(&visible_models)
            .cloned()
            .collect();

        let tries: Vec<&DunderNameTrie> = visible_models
            .iter()
            .filter_map(|m| self.model_tries.get(m))
            .collect();
        let trie = DunderNameTrie::intersection_merge_common(&tries);
        with_provenance(trie, &hidden_models)
    }

    /// Local models read by `sources`, optionally stopping at hidden inputs.
    fn models_reachable_from(
        &self,
        sources: &BTreeSet<NodeIndex>,
        visible_only: bool,
    ) -> BTreeSet<String> {
        if sources.is_empty() {
            return BTreeSet::new();
        }
        let targets = self.graph.nodes_with_labels(&[Label::LocalModel]);
        let options = if visible_only {
            TraversalOptions::deny(LabelSet::of(&[Label::DenyVisibleAttributes]))
        } else {
            TraversalOptions::default()
        };
        self.pathfinder
            .find_descendants(self.graph, sources, &targets, &options)
            .reached_target_nodes
            .into_iter()
            .filter_map(|n| self.graph.node(n).and_then(|node| node.model_name()).map(str::to_string))
            .collect()
    }
}

/// Add `models` to the provenance of every name in `trie`.
fn with_provenance(trie: DunderNameTrie, models: &BTreeSet<String>) -> DunderNameTrie {
    if models.is_empty() || trie.is_empty() {
        return trie;
    }
    let mut updated = MutableDunderNameTrie::new();
    updated.add_name_items(
        trie.name_items(None)
            .into_iter()
            .map(|(name, descriptor)| (name, descriptor.with_derived_from(models.iter().cloned()))),
    );
    updated.freeze()
}
