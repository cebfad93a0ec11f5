//! Naming schemes: the string syntaxes a query item can be written in.
//!
//! | Scheme          | Example                                        |
//! |-----------------|------------------------------------------------|
//! | object builder  | `TimeDimension('booking__ds', 'month')`        |
//! | dunder          | `booking__ds__month`                           |
//! | metric          | `bookings`                                     |
//!
//! A scheme recognises its inputs and turns them into a [`SpecPattern`]. It
//! can also render a resolved spec back into its syntax, which is used for
//! suggestions.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{CallParameterSet, DatePart, EntityReference, ExpandedTimeGranularity};
use crate::spec::{
    EntityLinkPattern, InstanceSpec, LinkableElementType, LinkableInstanceSpec,
    MetricSpecPattern, SpecPattern, StructuredDunderName, DUNDER,
};

static METRIC_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap());

static DIMENSION_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^Dimension\(\s*['"]([^'"]+)['"]\s*\)$"#).unwrap()
});

static ENTITY_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^Entity\(\s*['"]([^'"]+)['"]\s*\)$"#).unwrap());

static TIME_DIMENSION_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^TimeDimension\(\s*['"]([^'"]+)['"]\s*(?:,\s*(?:time_granularity_name\s*=\s*)?['"]([^'"]+)['"]\s*)?(?:,\s*date_part_name\s*=\s*['"]([^'"]+)['"]\s*)?\)$"#,
    )
    .unwrap()
});

static METRIC_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^Metric\(\s*['"]([^'"]+)['"]\s*(?:,\s*group_by\s*=\s*\[([^\]]*)\]\s*)?\)$"#)
        .unwrap()
});

/// A syntax for writing query items.
pub trait QueryItemNamingScheme: fmt::Debug + Send + Sync {
    /// Render `spec` in this syntax, if the syntax can express it.
    fn input_str(&self, spec: &InstanceSpec) -> Option<String>;

    fn input_str_follows_scheme(&self, input_str: &str) -> bool;

    /// The pattern an input describes, or `None` if the input doesn't follow the
    /// scheme.
    fn spec_pattern(&self, input_str: &str) -> Option<SpecPattern>;
}

/// Pattern for a parsed call parameter set, or `None` when a name or grain in it
/// is malformed. `granularity` recognises grain names, custom grains included.
pub fn pattern_for_call_parameter_set<F>(
    call_parameter_set: &CallParameterSet,
    granularity: F,
) -> Option<SpecPattern>
where
    F: Fn(&str) -> Option<ExpandedTimeGranularity>,
{
    let pattern = match call_parameter_set {
        CallParameterSet::Dimension { name } => {
            let parsed = StructuredDunderName::parse(name, &granularity)?;
            let types: &[LinkableElementType] = if parsed.time_granularity.is_some()
                || parsed.date_part.is_some()
            {
                &[LinkableElementType::TimeDimension]
            } else {
                &[LinkableElementType::Dimension, LinkableElementType::TimeDimension]
            };
            EntityLinkPattern::new(parsed.element_name, parsed.entity_links)
                .with_element_types(types)
                .with_time_granularity(parsed.time_granularity)
                .with_date_part(parsed.date_part)
        }
        CallParameterSet::TimeDimension {
            name,
            time_granularity,
            date_part,
        } => {
            let parsed = StructuredDunderName::parse(name, &granularity)?;
            let grain = match time_granularity {
                Some(grain_name) => Some(granularity(grain_name)?),
                None => parsed.time_granularity,
            };
            EntityLinkPattern::new(parsed.element_name, parsed.entity_links)
                .with_element_types(&[LinkableElementType::TimeDimension])
                .with_time_granularity(grain)
                .with_date_part(date_part.or(parsed.date_part))
        }
        CallParameterSet::Entity { name } => {
            let parsed = StructuredDunderName::parse(name, |_| None)?;
            EntityLinkPattern::new(parsed.element_name, parsed.entity_links)
                .with_element_types(&[LinkableElementType::Entity])
        }
        CallParameterSet::Metric { metric, group_by } => {
            let mut links: Vec<EntityReference> = Vec::new();
            for item in group_by {
                let parsed = StructuredDunderName::parse(item, |_| None)?;
                links.extend(parsed.entity_links);
                links.push(EntityReference::new(parsed.element_name));
            }
            let metric = StructuredDunderName::parse(metric, |_| None)?;
            EntityLinkPattern::new(metric.element_name, links.clone())
                .with_element_types(&[LinkableElementType::Metric])
                .with_metric_subquery_entity_links(links)
        }
    };
    Some(pattern.into())
}

// ============================================================================
// Dunder
// ============================================================================

/// `listing__country`, `metric_time__month`, `booking__ds__extract_year`.
#[derive(Debug, Clone, Default)]
pub struct DunderNamingScheme {
    custom_granularities: Vec<ExpandedTimeGranularity>,
}

impl DunderNamingScheme {
    pub fn new(custom_granularities: Vec<ExpandedTimeGranularity>) -> Self {
        Self {
            custom_granularities,
        }
    }

    fn parse(&self, input_str: &str) -> Option<StructuredDunderName> {
        StructuredDunderName::parse(input_str, |part| {
            ExpandedTimeGranularity::by_name(part, &self.custom_granularities)
        })
    }
}

impl QueryItemNamingScheme for DunderNamingScheme {
    fn input_str(&self, spec: &InstanceSpec) -> Option<String> {
        match spec {
            InstanceSpec::Linkable(linkable) => Some(linkable.qualified_name()),
            InstanceSpec::Metric(_) => None,
        }
    }

    fn input_str_follows_scheme(&self, input_str: &str) -> bool {
        self.parse(input_str).is_some()
    }

    fn spec_pattern(&self, input_str: &str) -> Option<SpecPattern> {
        let parsed = self.parse(input_str)?;
        let pattern = if parsed.time_granularity.is_some() || parsed.date_part.is_some() {
            EntityLinkPattern::new(parsed.element_name, parsed.entity_links)
                .with_element_types(&[LinkableElementType::TimeDimension])
                .with_time_granularity(parsed.time_granularity)
                .with_date_part(parsed.date_part)
        } else {
            EntityLinkPattern::new(parsed.element_name, parsed.entity_links)
        };
        Some(pattern.into())
    }
}

// ============================================================================
// Object builder
// ============================================================================

/// `Dimension('listing__country')`, `TimeDimension('metric_time', 'month')`,
/// `Entity('listing')`, `Metric('bookings', group_by=['listing'])`.
#[derive(Debug, Clone, Default)]
pub struct ObjectBuilderNamingScheme {
    custom_granularities: Vec<ExpandedTimeGranularity>,
}

impl ObjectBuilderNamingScheme {
    pub fn new(custom_granularities: Vec<ExpandedTimeGranularity>) -> Self {
        Self {
            custom_granularities,
        }
    }

    /// Parse an object-builder call into the reference it names.
    pub fn parse_call_parameter_set(input_str: &str) -> Option<CallParameterSet> {
        let input = input_str.trim();
        if let Some(caps) = DIMENSION_CALL.captures(input) {
            return Some(CallParameterSet::dimension(&caps[1]));
        }
        if let Some(caps) = ENTITY_CALL.captures(input) {
            return Some(CallParameterSet::entity(&caps[1]));
        }
        if let Some(caps) = TIME_DIMENSION_CALL.captures(input) {
            let date_part = match caps.get(3) {
                Some(part) => Some(DatePart::from_name(part.as_str())?),
                None => None,
            };
            return Some(CallParameterSet::TimeDimension {
                name: caps[1].to_string(),
                time_granularity: caps.get(2).map(|g| g.as_str().to_string()),
                date_part,
            });
        }
        if let Some(caps) = METRIC_CALL.captures(input) {
            let group_by: Vec<String> = caps
                .get(2)
                .map(|items| {
                    items
                        .as_str()
                        .split(',')
                        .map(|item| item.trim().trim_matches(|c| c == '\'' || c == '"'))
                        .filter(|item| !item.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            return Some(CallParameterSet::Metric {
                metric: caps[1].to_string(),
                group_by,
            });
        }
        None
    }
}

impl QueryItemNamingScheme for ObjectBuilderNamingScheme {
    fn input_str(&self, spec: &InstanceSpec) -> Option<String> {
        let InstanceSpec::Linkable(linkable) = spec else {
            return None;
        };
        let path = || {
            let mut parts: Vec<&str> = linkable.entity_links().iter().map(|l| l.name()).collect();
            parts.push(linkable.element_name());
            parts.join(DUNDER)
        };
        let rendered = match linkable {
            LinkableInstanceSpec::Dimension(_) => format!("Dimension('{}')", path()),
            LinkableInstanceSpec::Entity(_) => format!("Entity('{}')", path()),
            LinkableInstanceSpec::TimeDimension(td) => match (&td.time_granularity, td.date_part) {
                (_, Some(part)) => {
                    format!("TimeDimension('{}', date_part_name='{}')", path(), part)
                }
                (Some(grain), None) => format!("TimeDimension('{}', '{}')", path(), grain),
                (None, None) => format!("TimeDimension('{}')", path()),
            },
            LinkableInstanceSpec::GroupByMetric(m) => {
                let group_by: Vec<String> = m
                    .metric_subquery_entity_links
                    .iter()
                    .map(|l| format!("'{}'", l))
                    .collect();
                format!("Metric('{}', group_by=[{}])", m.element_name, group_by.join(", "))
            }
        };
        Some(rendered)
    }

    fn input_str_follows_scheme(&self, input_str: &str) -> bool {
        Self::parse_call_parameter_set(input_str).is_some()
    }

    fn spec_pattern(&self, input_str: &str) -> Option<SpecPattern> {
        let call_parameter_set = Self::parse_call_parameter_set(input_str)?;
        pattern_for_call_parameter_set(&call_parameter_set, |name| {
            ExpandedTimeGranularity::by_name(name, &self.custom_granularities)
        })
    }
}

// ============================================================================
// Metric
// ============================================================================

/// Plain metric names.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricNamingScheme;

impl QueryItemNamingScheme for MetricNamingScheme {
    fn input_str(&self, spec: &InstanceSpec) -> Option<String> {
        match spec {
            InstanceSpec::Metric(metric) => Some(metric.element_name.clone()),
            InstanceSpec::Linkable(_) => None,
        }
    }

    fn input_str_follows_scheme(&self, input_str: &str) -> bool {
        METRIC_NAME.is_match(input_str.trim())
    }

    fn spec_pattern(&self, input_str: &str) -> Option<SpecPattern> {
        self.input_str_follows_scheme(input_str)
            .then(|| MetricSpecPattern::new(input_str.trim()).into())
    }
}
