//! Resolved specs: the concrete, unambiguous items a query is made of.

use std::fmt;

use serde::Serialize;

use super::dunder::DUNDER;
use crate::model::{DatePart, EntityReference, ExpandedTimeGranularity};

/// Name of the virtual time dimension every metric can be grouped by.
pub const METRIC_TIME_ELEMENT_NAME: &str = "metric_time";

fn qualified(entity_links: &[EntityReference], element_name: &str) -> String {
    let mut parts: Vec<&str> = entity_links.iter().map(|l| l.name()).collect();
    parts.push(element_name);
    parts.join(DUNDER)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DimensionSpec {
    pub element_name: String,
    pub entity_links: Vec<EntityReference>,
}

impl DimensionSpec {
    pub fn new(element_name: impl Into<String>, entity_links: Vec<EntityReference>) -> Self {
        Self {
            element_name: element_name.into(),
            entity_links,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TimeDimensionSpec {
    pub element_name: String,
    pub entity_links: Vec<EntityReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_granularity: Option<ExpandedTimeGranularity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_part: Option<DatePart>,
}

impl TimeDimensionSpec {
    pub fn new(
        element_name: impl Into<String>,
        entity_links: Vec<EntityReference>,
        time_granularity: Option<ExpandedTimeGranularity>,
        date_part: Option<DatePart>,
    ) -> Self {
        Self {
            element_name: element_name.into(),
            entity_links,
            time_granularity,
            date_part,
        }
    }

    pub fn metric_time(time_granularity: ExpandedTimeGranularity) -> Self {
        Self::new(METRIC_TIME_ELEMENT_NAME, Vec::new(), Some(time_granularity), None)
    }

    pub fn is_metric_time(&self) -> bool {
        self.element_name == METRIC_TIME_ELEMENT_NAME && self.entity_links.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntitySpec {
    pub element_name: String,
    pub entity_links: Vec<EntityReference>,
}

impl EntitySpec {
    pub fn new(element_name: impl Into<String>, entity_links: Vec<EntityReference>) -> Self {
        Self {
            element_name: element_name.into(),
            entity_links,
        }
    }
}

/// A metric used as a group-by item, computed in a subquery grouped by
/// `metric_subquery_entity_links` and joined back on `entity_links`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupByMetricSpec {
    pub element_name: String,
    pub entity_links: Vec<EntityReference>,
    pub metric_subquery_entity_links: Vec<EntityReference>,
}

/// A group-by item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkableInstanceSpec {
    Dimension(DimensionSpec),
    TimeDimension(TimeDimensionSpec),
    Entity(EntitySpec),
    GroupByMetric(GroupByMetricSpec),
}

impl LinkableInstanceSpec {
    pub fn element_name(&self) -> &str {
        match self {
            LinkableInstanceSpec::Dimension(s) => &s.element_name,
            LinkableInstanceSpec::TimeDimension(s) => &s.element_name,
            LinkableInstanceSpec::Entity(s) => &s.element_name,
            LinkableInstanceSpec::GroupByMetric(s) => &s.element_name,
        }
    }

    pub fn entity_links(&self) -> &[EntityReference] {
        match self {
            LinkableInstanceSpec::Dimension(s) => &s.entity_links,
            LinkableInstanceSpec::TimeDimension(s) => &s.entity_links,
            LinkableInstanceSpec::Entity(s) => &s.entity_links,
            LinkableInstanceSpec::GroupByMetric(s) => &s.entity_links,
        }
    }

    pub fn time_granularity(&self) -> Option<&ExpandedTimeGranularity> {
        match self {
            LinkableInstanceSpec::TimeDimension(s) => s.time_granularity.as_ref(),
            _ => None,
        }
    }

    pub fn date_part(&self) -> Option<DatePart> {
        match self {
            LinkableInstanceSpec::TimeDimension(s) => s.date_part,
            _ => None,
        }
    }

    pub fn metric_subquery_entity_links(&self) -> &[EntityReference] {
        match self {
            LinkableInstanceSpec::GroupByMetric(s) => &s.metric_subquery_entity_links,
            _ => &[],
        }
    }

    pub fn as_time_dimension(&self) -> Option<&TimeDimensionSpec> {
        match self {
            LinkableInstanceSpec::TimeDimension(s) => Some(s),
            _ => None,
        }
    }

    /// The dunder name used as the output column, e.g. `listing__country`,
    /// `metric_time__month`, `booking__ds__extract_year`.
    pub fn qualified_name(&self) -> String {
        let base = qualified(self.entity_links(), self.element_name());
        match self {
            LinkableInstanceSpec::TimeDimension(TimeDimensionSpec {
                date_part: Some(part),
                ..
            }) => format!("{base}{DUNDER}extract_{part}"),
            LinkableInstanceSpec::TimeDimension(TimeDimensionSpec {
                time_granularity: Some(grain),
                ..
            }) => format!("{base}{DUNDER}{grain}"),
            _ => base,
        }
    }
}

impl fmt::Display for LinkableInstanceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

impl From<DimensionSpec> for LinkableInstanceSpec {
    fn from(spec: DimensionSpec) -> Self {
        LinkableInstanceSpec::Dimension(spec)
    }
}

impl From<TimeDimensionSpec> for LinkableInstanceSpec {
    fn from(spec: TimeDimensionSpec) -> Self {
        LinkableInstanceSpec::TimeDimension(spec)
    }
}

impl From<EntitySpec> for LinkableInstanceSpec {
    fn from(spec: EntitySpec) -> Self {
        LinkableInstanceSpec::Entity(spec)
    }
}

impl From<GroupByMetricSpec> for LinkableInstanceSpec {
    fn from(spec: GroupByMetricSpec) -> Self {
        LinkableInstanceSpec::GroupByMetric(spec)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MetricSpec {
    pub element_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl MetricSpec {
    pub fn new(element_name: impl Into<String>) -> Self {
        Self {
            element_name: element_name.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias;
        self
    }

    /// Output column name.
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.element_name)
    }
}

/// Anything a query can select or order by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum InstanceSpec {
    Metric(MetricSpec),
    Linkable(LinkableInstanceSpec),
}

impl InstanceSpec {
    pub fn element_name(&self) -> &str {
        match self {
            InstanceSpec::Metric(m) => &m.element_name,
            InstanceSpec::Linkable(l) => l.element_name(),
        }
    }

    pub fn output_name(&self) -> String {
        match self {
            InstanceSpec::Metric(m) => m.output_name().to_string(),
            InstanceSpec::Linkable(l) => l.qualified_name(),
        }
    }
}

impl From<MetricSpec> for InstanceSpec {
    fn from(spec: MetricSpec) -> Self {
        InstanceSpec::Metric(spec)
    }
}

impl From<LinkableInstanceSpec> for InstanceSpec {
    fn from(spec: LinkableInstanceSpec) -> Self {
        InstanceSpec::Linkable(spec)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OrderBySpec {
    pub instance_spec: InstanceSpec,
    pub descending: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{entity_links, TimeGranularity};

    #[test]
    fn test_qualified_names() {
        let dim: LinkableInstanceSpec =
            DimensionSpec::new("country", entity_links(&["listing"])).into();
        assert_eq!(dim.qualified_name(), "listing__country");

        let month: LinkableInstanceSpec =
            TimeDimensionSpec::metric_time(TimeGranularity::Month.into()).into();
        assert_eq!(month.qualified_name(), "metric_time__month");

        let year_part: LinkableInstanceSpec = TimeDimensionSpec::new(
            "ds",
            entity_links(&["booking"]),
            None,
            Some(DatePart::Year),
        )
        .into();
        assert_eq!(year_part.qualified_name(), "booking__ds__extract_year");

        let entity: LinkableInstanceSpec = EntitySpec::new("listing", vec![]).into();
        assert_eq!(entity.qualified_name(), "listing");
    }

    #[test]
    fn test_metric_output_name_prefers_alias() {
        let spec = MetricSpec::new("bookings").with_alias(Some("b".to_string()));
        assert_eq!(spec.output_name(), "b");
        assert_eq!(MetricSpec::new("bookings").output_name(), "bookings");
    }
}
