//! Computes the linkable elements a model exposes to a measure.
//!
//! Join paths are found by a weighted DFS over the semantic graph: one unit of
//! weight per join edge, capped at the configured number of hops. Entity-key to
//! joined-model edges only exist for join targets, so fan-out joins are never found.

use std::collections::BTreeSet;

use petgraph::graph::NodeIndex;

use super::element::{
    ElementProperties, ElementProperty, JoinPathElement, LinkableDimension, LinkableElement,
    LinkableEntity, LinkableMetric, SemanticModelJoinPath,
};
use super::set::LinkableElementSet;
use crate::error::{InternalError, InternalResult};
use crate::model::{
    DatePart, EntityReference, ExpandedTimeGranularity, SemanticManifest, SemanticModel,
    TimeGranularity,
};
use crate::semantic::graph::{Label, LabeledEdge, LabeledGraph, SemanticGraph, SemanticGraphNode};
use crate::semantic::pathfinder::Pathfinder;
use crate::spec::METRIC_TIME_ELEMENT_NAME;

/// Join paths leaving `model`, at most `max_join_hops` joins long.
///
/// The local (empty) path comes first, then joined paths ordered by length.
pub fn find_join_paths(
    graph: &SemanticGraph,
    pathfinder: &Pathfinder,
    model: &str,
    max_join_hops: u32,
) -> Vec<SemanticModelJoinPath> {
    let local = SemanticModelJoinPath::local(model);
    let Some(start) = graph.local_model_node(model) else {
        return vec![local];
    };
    let own_joined = graph.joined_model_node(model);
    let targets = graph.nodes_with_labels(&[Label::JoinedModel]);

    let weight = |edge: &LabeledEdge, _: &[NodeIndex]| {
        if !edge.labels.contains(Label::JoinEdge) {
            Some(0)
        } else if Some(edge.head) == own_joined {
            None
        } else {
            Some(1)
        }
    };

    let mut joined: Vec<SemanticModelJoinPath> = pathfinder
        .find_paths_dfs(graph, vec![start], targets, weight, max_join_hops, None, None)
        .filter_map(|path| to_join_path(graph, model, &path.nodes))
        .collect();
    joined.sort_by(|a, b| a.join_count().cmp(&b.join_count()).then_with(|| a.cmp(b)));
    joined.dedup();

    let mut paths = vec![local];
    paths.extend(joined);
    paths
}

/// `[local, key, joined, key, joined, ...]` → join path.
fn to_join_path(
    graph: &SemanticGraph,
    model: &str,
    nodes: &[NodeIndex],
) -> Option<SemanticModelJoinPath> {
    let hops = nodes.get(1..)?;
    if hops.is_empty() || hops.len() % 2 != 0 {
        return None;
    }
    let path = hops
        .chunks(2)
        .map(|hop| match (graph.node(hop[0]), graph.node(hop[1])) {
            (
                Some(SemanticGraphNode::EntityKey(entity)),
                Some(SemanticGraphNode::JoinedModel(right_model)),
            ) => Some(JoinPathElement {
                entity: EntityReference::new(entity.clone()),
                right_model: right_model.clone(),
            }),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(SemanticModelJoinPath {
        left_model: model.to_string(),
        path,
    })
}

/// Builds linkable element sets for measures and for queries without metrics.
pub struct LinkableElementBuilder<'a> {
    manifest: &'a SemanticManifest,
    graph: &'a SemanticGraph,
    pathfinder: &'a Pathfinder,
    max_join_hops: u32,
}

impl<'a> LinkableElementBuilder<'a> {
    pub fn new(
        manifest: &'a SemanticManifest,
        graph: &'a SemanticGraph,
        pathfinder: &'a Pathfinder,
        max_join_hops: u32,
    ) -> Self {
        Self {
            manifest,
            graph,
            pathfinder,
            max_join_hops,
        }
    }

    fn model(&self, name: &str) -> InternalResult<&'a SemanticModel> {
        self.manifest
            .semantic_model(name)
            .ok_or_else(|| InternalError::UnknownSemanticModel(name.to_string()))
    }

    /// Dimensions, entities and `metric_time` reachable from a measure's model.
    /// Group-by metrics are added by the caller.
    pub fn elements_for_measure(&self, measure: &str) -> InternalResult<LinkableElementSet> {
        let model_name = self
            .graph
            .model_for_measure(measure)
            .ok_or_else(|| InternalError::UnknownMeasure(measure.to_string()))?;
        let model = self.model(model_name)?;

        let mut set = LinkableElementSet::new();
        for path in find_join_paths(self.graph, self.pathfinder, model_name, self.max_join_hops) {
            self.add_path_elements(&mut set, path)?;
        }

        if let Some(grain) = model
            .agg_time_dimension_for(measure)
            .and_then(|d| d.time_granularity())
        {
            for dimension in self.time_dimension_elements(
                METRIC_TIME_ELEMENT_NAME,
                Vec::new(),
                None,
                Some(SemanticModelJoinPath::local(model_name)),
                grain,
                ElementProperties::of(&[ElementProperty::MetricTime]),
            ) {
                set.add(LinkableElement::Dimension(dimension));
            }
        }
        Ok(set)
    }

    /// Items available to a query without metrics: local and single-hop joined
    /// elements of every model, plus `metric_time` at day and coarser.
    pub fn elements_for_no_metrics_query(&self) -> InternalResult<LinkableElementSet> {
        let mut set = LinkableElementSet::new();
        for model in &self.manifest.semantic_models {
            for path in find_join_paths(self.graph, self.pathfinder, &model.name, 1) {
                self.add_path_elements(&mut set, path)?;
            }
        }
        for dimension in self.time_dimension_elements(
            METRIC_TIME_ELEMENT_NAME,
            Vec::new(),
            None,
            None,
            TimeGranularity::Day,
            ElementProperties::of(&[ElementProperty::MetricTime]),
        ) {
            set.add(LinkableElement::Dimension(dimension));
        }
        Ok(set)
    }

    /// Dimensions and entities of the model at the end of `path`.
    fn add_path_elements(
        &self,
        set: &mut LinkableElementSet,
        path: SemanticModelJoinPath,
    ) -> InternalResult<()> {
        let target = self.model(path.last_model())?;
        let path_properties = path.properties();

        let link_sets: Vec<Vec<EntityReference>> = if path.join_count() == 0 {
            target
                .local_entity_links()
                .into_iter()
                .map(|link| vec![link])
                .collect()
        } else {
            vec![path.entity_links()]
        };

        for links in &link_sets {
            for dimension in &target.dimensions {
                match dimension.time_granularity() {
                    Some(grain) => {
                        for element in self.time_dimension_elements(
                            &dimension.name,
                            links.clone(),
                            Some(target.name.clone()),
                            Some(path.clone()),
                            grain,
                            path_properties,
                        ) {
                            set.add(LinkableElement::Dimension(element));
                        }
                    }
                    None => set.add(LinkableElement::Dimension(LinkableDimension {
                        element_name: dimension.name.clone(),
                        entity_links: links.clone(),
                        defined_in_model: Some(target.name.clone()),
                        join_path: Some(path.clone()),
                        time_granularity: None,
                        date_part: None,
                        properties: path_properties,
                    })),
                }
            }
        }

        let entity_properties = path_properties.with(ElementProperty::Entity);
        let entity_links = path.entity_links();
        let last_link = entity_links.last().map(|l| l.name().to_string());
        for entity in target.entity_names() {
            if last_link.as_deref() == Some(entity) {
                continue;
            }
            set.add(LinkableElement::Entity(LinkableEntity {
                element_name: entity.to_string(),
                entity_links: entity_links.clone(),
                defined_in_model: target.name.clone(),
                join_path: path.clone(),
                properties: entity_properties,
            }));
        }
        Ok(())
    }

    /// One element per grain at or coarser than `defined_grain` (standard and
    /// custom), and one per compatible date part.
    fn time_dimension_elements(
        &self,
        element_name: &str,
        entity_links: Vec<EntityReference>,
        defined_in_model: Option<String>,
        join_path: Option<SemanticModelJoinPath>,
        defined_grain: TimeGranularity,
        properties: ElementProperties,
    ) -> Vec<LinkableDimension> {
        let element = |grain: Option<ExpandedTimeGranularity>,
                       date_part: Option<DatePart>,
                       properties: ElementProperties| LinkableDimension {
            element_name: element_name.to_string(),
            entity_links: entity_links.clone(),
            defined_in_model: defined_in_model.clone(),
            join_path: join_path.clone(),
            time_granularity: grain,
            date_part,
            properties,
        };

        let standard = TimeGranularity::ALL
            .into_iter()
            .filter(|g| *g >= defined_grain)
            .map(|g| element(Some(g.into()), None, properties));
        let custom = self
            .manifest
            .custom_granularities
            .iter()
            .filter(|g| g.base_granularity >= defined_grain)
            .map(|g| {
                element(
                    Some(g.clone()),
                    None,
                    properties.with(ElementProperty::CustomGrain),
                )
            });
        let date_parts = DatePart::ALL
            .into_iter()
            .filter(|p| p.is_compatible_with(defined_grain))
            .map(|p| element(None, Some(p), properties.with(ElementProperty::DatePart)));

        standard.chain(custom).chain(date_parts).collect()
    }
}

/// A metric grouped by one of the source model's entities.
pub fn group_by_metric_element(
    source_model: &str,
    entity: &str,
    metric: &str,
    metric_models: BTreeSet<String>,
) -> LinkableElement {
    let links = vec![EntityReference::new(entity)];
    LinkableElement::Metric(LinkableMetric {
        element_name: metric.to_string(),
        join_path: SemanticModelJoinPath::local(source_model),
        entity_links: links.clone(),
        metric_subquery_entity_links: links,
        metric_models,
        properties: ElementProperties::of(&[ElementProperty::Metric, ElementProperty::Joined]),
    })
}
