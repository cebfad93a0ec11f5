//! Linkable elements: concrete descriptions of how a group-by item is reached.

use std::collections::BTreeSet;

use crate::model::{DatePart, EntityReference, ExpandedTimeGranularity};
use crate::semantic::flags::{Flag, FlagSet};
use crate::spec::{ElementPathKey, LinkableElementType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementProperty {
    /// Defined in the measure's own model.
    Local,
    /// Reached through at least one join.
    Joined,
    /// Reached through more than one join.
    MultiHop,
    MetricTime,
    /// An entity.
    Entity,
    /// A group-by metric.
    Metric,
    /// A time dimension with a date part.
    DatePart,
    /// A time dimension at a custom grain.
    CustomGrain,
}

impl Flag for ElementProperty {
    const ALL: &'static [Self] = &[
        ElementProperty::Local,
        ElementProperty::Joined,
        ElementProperty::MultiHop,
        ElementProperty::MetricTime,
        ElementProperty::Entity,
        ElementProperty::Metric,
        ElementProperty::DatePart,
        ElementProperty::CustomGrain,
    ];

    fn bit(self) -> u32 {
        self as u32
    }
}

pub type ElementProperties = FlagSet<ElementProperty>;

/// One hop in a join path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinPathElement {
    pub entity: EntityReference,
    pub right_model: String,
}

/// A join path starting at `left_model`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SemanticModelJoinPath {
    pub left_model: String,
    pub path: Vec<JoinPathElement>,
}

impl SemanticModelJoinPath {
    pub fn local(model: impl Into<String>) -> Self {
        Self {
            left_model: model.into(),
            path: Vec::new(),
        }
    }

    pub fn entity_links(&self) -> Vec<EntityReference> {
        self.path.iter().map(|p| p.entity.clone()).collect()
    }

    /// The model the path ends at.
    pub fn last_model(&self) -> &str {
        self.path
            .last()
            .map(|p| p.right_model.as_str())
            .unwrap_or(&self.left_model)
    }

    /// Every model on the path.
    pub fn models(&self) -> BTreeSet<String> {
        std::iter::once(self.left_model.clone())
            .chain(self.path.iter().map(|p| p.right_model.clone()))
            .collect()
    }

    pub fn join_count(&self) -> usize {
        self.path.len()
    }

    pub fn properties(&self) -> ElementProperties {
        match self.path.len() {
            0 => ElementProperties::of(&[ElementProperty::Local]),
            1 => ElementProperties::of(&[ElementProperty::Joined]),
            _ => ElementProperties::of(&[ElementProperty::Joined, ElementProperty::MultiHop]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkableDimension {
    pub element_name: String,
    pub entity_links: Vec<EntityReference>,
    /// Model that defines the dimension; `None` for `metric_time`.
    pub defined_in_model: Option<String>,
    /// `None` when read from the time spine rather than a model.
    pub join_path: Option<SemanticModelJoinPath>,
    pub time_granularity: Option<ExpandedTimeGranularity>,
    pub date_part: Option<DatePart>,
    pub properties: ElementProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkableEntity {
    pub element_name: String,
    pub entity_links: Vec<EntityReference>,
    pub defined_in_model: String,
    pub join_path: SemanticModelJoinPath,
    pub properties: ElementProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkableMetric {
    pub element_name: String,
    /// Join path from the measure's model to the entity the metric is grouped by.
    pub join_path: SemanticModelJoinPath,
    pub entity_links: Vec<EntityReference>,
    pub metric_subquery_entity_links: Vec<EntityReference>,
    /// Models the metric subquery reads.
    pub metric_models: BTreeSet<String>,
    pub properties: ElementProperties,
}

/// One way to reach one path key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinkableElement {
    Dimension(LinkableDimension),
    Entity(LinkableEntity),
    Metric(LinkableMetric),
}

impl LinkableElement {
    pub fn path_key(&self) -> ElementPathKey {
        match self {
            LinkableElement::Dimension(d) => {
                if d.time_granularity.is_some() || d.date_part.is_some() {
                    ElementPathKey::time_dimension(
                        d.element_name.clone(),
                        d.entity_links.clone(),
                        d.time_granularity.clone(),
                        d.date_part,
                    )
                } else {
                    ElementPathKey::dimension(d.element_name.clone(), d.entity_links.clone())
                }
            }
            LinkableElement::Entity(e) => {
                ElementPathKey::entity(e.element_name.clone(), e.entity_links.clone())
            }
            LinkableElement::Metric(m) => ElementPathKey::metric(
                m.element_name.clone(),
                m.entity_links.clone(),
                m.metric_subquery_entity_links.clone(),
            ),
        }
    }

    pub fn element_type(&self) -> LinkableElementType {
        self.path_key().element_type()
    }

    pub fn properties(&self) -> ElementProperties {
        match self {
            LinkableElement::Dimension(d) => d.properties,
            LinkableElement::Entity(e) => e.properties,
            LinkableElement::Metric(m) => m.properties,
        }
    }

    pub fn join_path(&self) -> Option<&SemanticModelJoinPath> {
        match self {
            LinkableElement::Dimension(d) => d.join_path.as_ref(),
            LinkableElement::Entity(e) => Some(&e.join_path),
            LinkableElement::Metric(m) => Some(&m.join_path),
        }
    }

    /// Every semantic model this element reads.
    pub fn derived_from_semantic_models(&self) -> BTreeSet<String> {
        let mut models = self
            .join_path()
            .map(SemanticModelJoinPath::models)
            .unwrap_or_default();
        match self {
            LinkableElement::Dimension(d) => models.extend(d.defined_in_model.iter().cloned()),
            LinkableElement::Entity(e) => {
                models.insert(e.defined_in_model.clone());
            }
            LinkableElement::Metric(m) => models.extend(m.metric_models.iter().cloned()),
        }
        models
    }
}
