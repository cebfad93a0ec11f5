//! Spec patterns: predicates that narrow a list of candidate specs.
//!
//! Patterns are applied in sequence; each one receives the survivors of the
//! previous pattern.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::dunder::DUNDER;
use super::element::LinkableElementType;
use super::instance::{InstanceSpec, LinkableInstanceSpec};
use crate::model::{DatePart, EntityReference, ExpandedTimeGranularity, TimeGranularity};

/// Matches linkable specs by element name and entity links.
///
/// Entity links in the pattern must be a suffix of the spec's links. When several
/// specs match, only those with the shortest entity links are kept. Date part is
/// always compared; grain only when the pattern has one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityLinkPattern {
    pub element_name: String,
    pub entity_links: Vec<EntityReference>,
    pub element_types: Option<BTreeSet<LinkableElementType>>,
    pub time_granularity: Option<ExpandedTimeGranularity>,
    pub date_part: Option<DatePart>,
    pub metric_subquery_entity_links: Option<Vec<EntityReference>>,
}

impl EntityLinkPattern {
    pub fn new(element_name: impl Into<String>, entity_links: Vec<EntityReference>) -> Self {
        Self {
            element_name: element_name.into(),
            entity_links,
            element_types: None,
            time_granularity: None,
            date_part: None,
            metric_subquery_entity_links: None,
        }
    }

    pub fn with_element_types(mut self, types: &[LinkableElementType]) -> Self {
        self.element_types = Some(types.iter().copied().collect());
        self
    }

    pub fn with_time_granularity(mut self, grain: Option<ExpandedTimeGranularity>) -> Self {
        self.time_granularity = grain;
        self
    }

    pub fn with_date_part(mut self, date_part: Option<DatePart>) -> Self {
        self.date_part = date_part;
        self
    }

    pub fn with_metric_subquery_entity_links(mut self, links: Vec<EntityReference>) -> Self {
        self.metric_subquery_entity_links = Some(links);
        self
    }

    fn element_type_of(spec: &LinkableInstanceSpec) -> LinkableElementType {
        match spec {
            LinkableInstanceSpec::Dimension(_) => LinkableElementType::Dimension,
            LinkableInstanceSpec::TimeDimension(_) => LinkableElementType::TimeDimension,
            LinkableInstanceSpec::Entity(_) => LinkableElementType::Entity,
            LinkableInstanceSpec::GroupByMetric(_) => LinkableElementType::Metric,
        }
    }

    fn matches(&self, spec: &LinkableInstanceSpec) -> bool {
        if spec.element_name() != self.element_name {
            return false;
        }
        if let Some(types) = &self.element_types {
            if !types.contains(&Self::element_type_of(spec)) {
                return false;
            }
        }
        if !spec.entity_links().ends_with(&self.entity_links) {
            return false;
        }
        if spec.date_part() != self.date_part {
            return false;
        }
        if let Some(grain) = &self.time_granularity {
            if spec.time_granularity() != Some(grain) {
                return false;
            }
        }
        if let Some(links) = &self.metric_subquery_entity_links {
            if spec.metric_subquery_entity_links() != links.as_slice() {
                return false;
            }
        }
        true
    }

    fn match_specs(&self, specs: &[InstanceSpec]) -> Vec<InstanceSpec> {
        let matching: Vec<&InstanceSpec> = specs
            .iter()
            .filter(|spec| match spec {
                InstanceSpec::Linkable(linkable) => self.matches(linkable),
                InstanceSpec::Metric(_) => false,
            })
            .collect();

        let shortest = matching
            .iter()
            .filter_map(|spec| match spec {
                InstanceSpec::Linkable(linkable) => Some(linkable.entity_links().len()),
                InstanceSpec::Metric(_) => None,
            })
            .min();

        matching
            .into_iter()
            .filter(|spec| match spec {
                InstanceSpec::Linkable(linkable) => Some(linkable.entity_links().len()) == shortest,
                InstanceSpec::Metric(_) => false,
            })
            .cloned()
            .collect()
    }
}

impl fmt::Display for EntityLinkPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.entity_links.iter().map(|l| l.to_string()).collect();
        parts.push(self.element_name.clone());
        if let Some(grain) = &self.time_granularity {
            parts.push(grain.name.clone());
        }
        if let Some(part) = self.date_part {
            parts.push(format!("extract_{part}"));
        }
        f.write_str(&parts.join(DUNDER))
    }
}

/// Matches metric specs by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricSpecPattern {
    pub metric_name: String,
}

impl MetricSpecPattern {
    pub fn new(metric_name: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into().to_lowercase(),
        }
    }

    fn match_specs(&self, specs: &[InstanceSpec]) -> Vec<InstanceSpec> {
        specs
            .iter()
            .filter(|spec| match spec {
                InstanceSpec::Metric(metric) => metric.element_name == self.metric_name,
                InstanceSpec::Linkable(_) => false,
            })
            .cloned()
            .collect()
    }
}

/// Picks one grain per time dimension when the query didn't name one.
///
/// Per `(element_name, entity_links)`, keeps the finest standard grain that is at
/// least the queried metrics' default grain. If there is none, keeps the finest
/// grain available. Other specs pass through.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DefaultTimeGranularityPattern {
    pub max_metric_default_time_granularity: Option<TimeGranularity>,
}

impl DefaultTimeGranularityPattern {
    pub fn new(max_metric_default_time_granularity: Option<TimeGranularity>) -> Self {
        Self {
            max_metric_default_time_granularity,
        }
    }

    fn grain_rank(grain: &ExpandedTimeGranularity) -> (TimeGranularity, bool, String) {
        (grain.base_granularity, grain.is_custom(), grain.name.clone())
    }

    fn match_specs(&self, specs: &[InstanceSpec]) -> Vec<InstanceSpec> {
        let mut groups: BTreeMap<(String, Vec<EntityReference>), Vec<&ExpandedTimeGranularity>> =
            BTreeMap::new();
        for spec in specs {
            if let InstanceSpec::Linkable(LinkableInstanceSpec::TimeDimension(td)) = spec {
                if let (Some(grain), None) = (&td.time_granularity, td.date_part) {
                    groups
                        .entry((td.element_name.clone(), td.entity_links.clone()))
                        .or_default()
                        .push(grain);
                }
            }
        }

        let chosen: BTreeMap<(String, Vec<EntityReference>), ExpandedTimeGranularity> = groups
            .into_iter()
            .filter_map(|(key, grains)| {
                let at_least_default = grains
                    .iter()
                    .filter(|g| !g.is_custom())
                    .filter(|g| {
                        self.max_metric_default_time_granularity
                            .is_none_or(|default| g.base_granularity >= default)
                    })
                    .min_by_key(|g| Self::grain_rank(g));
                let pick = at_least_default.or_else(|| grains.iter().min_by_key(|g| Self::grain_rank(g)));
                pick.map(|g| (key, (*g).clone()))
            })
            .collect();

        specs
            .iter()
            .filter(|spec| match spec {
                InstanceSpec::Linkable(LinkableInstanceSpec::TimeDimension(td)) => {
                    match (&td.time_granularity, td.date_part) {
                        (Some(grain), None) => chosen
                            .get(&(td.element_name.clone(), td.entity_links.clone()))
                            .is_some_and(|c| c == grain),
                        _ => true,
                    }
                }
                _ => true,
            })
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpecPattern {
    EntityLink(EntityLinkPattern),
    Metric(MetricSpecPattern),
    DefaultTimeGranularity(DefaultTimeGranularityPattern),
}

impl SpecPattern {
    pub fn match_specs(&self, specs: &[InstanceSpec]) -> Vec<InstanceSpec> {
        match self {
            SpecPattern::EntityLink(p) => p.match_specs(specs),
            SpecPattern::Metric(p) => p.match_specs(specs),
            SpecPattern::DefaultTimeGranularity(p) => p.match_specs(specs),
        }
    }
}

impl From<EntityLinkPattern> for SpecPattern {
    fn from(pattern: EntityLinkPattern) -> Self {
        SpecPattern::EntityLink(pattern)
    }
}

impl From<MetricSpecPattern> for SpecPattern {
    fn from(pattern: MetricSpecPattern) -> Self {
        SpecPattern::Metric(pattern)
    }
}

impl From<DefaultTimeGranularityPattern> for SpecPattern {
    fn from(pattern: DefaultTimeGranularityPattern) -> Self {
        SpecPattern::DefaultTimeGranularity(pattern)
    }
}

/// Apply patterns in order.
pub fn match_all(patterns: &[SpecPattern], specs: Vec<InstanceSpec>) -> Vec<InstanceSpec> {
    patterns
        .iter()
        .fold(specs, |remaining, pattern| pattern.match_specs(&remaining))
}

/// Apply patterns in order to group-by specs.
pub fn match_linkable(
    patterns: &[SpecPattern],
    specs: &[LinkableInstanceSpec],
) -> Vec<LinkableInstanceSpec> {
    let wrapped: Vec<InstanceSpec> = specs.iter().cloned().map(InstanceSpec::Linkable).collect();
    match_all(patterns, wrapped)
        .into_iter()
        .filter_map(|spec| match spec {
            InstanceSpec::Linkable(linkable) => Some(linkable),
            InstanceSpec::Metric(_) => None,
        })
        .collect()
}
