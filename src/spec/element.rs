//! Path keys: the identity of one logical linkable item.

use std::fmt;

use serde::Serialize;

use super::instance::{
    DimensionSpec, EntitySpec, GroupByMetricSpec, LinkableInstanceSpec, TimeDimensionSpec,
};
use crate::model::{DatePart, EntityReference, ExpandedTimeGranularity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkableElementType {
    Dimension,
    TimeDimension,
    Entity,
    Metric,
}

impl LinkableElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkableElementType::Dimension => "dimension",
            LinkableElementType::TimeDimension => "time_dimension",
            LinkableElementType::Entity => "entity",
            LinkableElementType::Metric => "metric",
        }
    }
}

impl fmt::Display for LinkableElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one join path to one item. Only time dimension keys carry a grain
/// or date part; the constructors are the only way to build a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ElementPathKey {
    element_name: String,
    element_type: LinkableElementType,
    entity_links: Vec<EntityReference>,
    time_granularity: Option<ExpandedTimeGranularity>,
    date_part: Option<DatePart>,
    metric_subquery_entity_links: Vec<EntityReference>,
}

impl ElementPathKey {
    pub fn dimension(element_name: impl Into<String>, entity_links: Vec<EntityReference>) -> Self {
        Self {
            element_name: element_name.into(),
            element_type: LinkableElementType::Dimension,
            entity_links,
            time_granularity: None,
            date_part: None,
            metric_subquery_entity_links: Vec::new(),
        }
    }

    pub fn time_dimension(
        element_name: impl Into<String>,
        entity_links: Vec<EntityReference>,
        time_granularity: Option<ExpandedTimeGranularity>,
        date_part: Option<DatePart>,
    ) -> Self {
        Self {
            element_name: element_name.into(),
            element_type: LinkableElementType::TimeDimension,
            entity_links,
            time_granularity,
            date_part,
            metric_subquery_entity_links: Vec::new(),
        }
    }

    pub fn entity(element_name: impl Into<String>, entity_links: Vec<EntityReference>) -> Self {
        Self {
            element_name: element_name.into(),
            element_type: LinkableElementType::Entity,
            entity_links,
            time_granularity: None,
            date_part: None,
            metric_subquery_entity_links: Vec::new(),
        }
    }

    pub fn metric(
        element_name: impl Into<String>,
        entity_links: Vec<EntityReference>,
        metric_subquery_entity_links: Vec<EntityReference>,
    ) -> Self {
        Self {
            element_name: element_name.into(),
            element_type: LinkableElementType::Metric,
            entity_links,
            time_granularity: None,
            date_part: None,
            metric_subquery_entity_links,
        }
    }

    pub fn element_name(&self) -> &str {
        &self.element_name
    }

    pub fn element_type(&self) -> LinkableElementType {
        self.element_type
    }

    pub fn entity_links(&self) -> &[EntityReference] {
        &self.entity_links
    }

    pub fn time_granularity(&self) -> Option<&ExpandedTimeGranularity> {
        self.time_granularity.as_ref()
    }

    pub fn date_part(&self) -> Option<DatePart> {
        self.date_part
    }

    pub fn metric_subquery_entity_links(&self) -> &[EntityReference] {
        &self.metric_subquery_entity_links
    }

    pub fn spec(&self) -> LinkableInstanceSpec {
        match self.element_type {
            LinkableElementType::Dimension => {
                DimensionSpec::new(self.element_name.clone(), self.entity_links.clone()).into()
            }
            LinkableElementType::TimeDimension => TimeDimensionSpec::new(
                self.element_name.clone(),
                self.entity_links.clone(),
                self.time_granularity.clone(),
                self.date_part,
            )
            .into(),
            LinkableElementType::Entity => {
                EntitySpec::new(self.element_name.clone(), self.entity_links.clone()).into()
            }
            LinkableElementType::Metric => GroupByMetricSpec {
                element_name: self.element_name.clone(),
                entity_links: self.entity_links.clone(),
                metric_subquery_entity_links: self.metric_subquery_entity_links.clone(),
            }
            .into(),
        }
    }
}

impl fmt::Display for ElementPathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.element_type, self.spec().qualified_name())
    }
}
