//! Typed query parameters, an alternative to writing items as strings.

use serde::{Deserialize, Serialize};

use crate::model::{DatePart, ExpandedTimeGranularity};
use crate::spec::{
    EntityLinkPattern, LinkableElementType, MetricSpecPattern, SpecPattern, StructuredDunderName,
};

/// A group-by item given by name, with an optional grain or date part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupByParameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_part: Option<DatePart>,
}

impl GroupByParameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grain: None,
            date_part: None,
        }
    }

    pub fn with_grain(mut self, grain: impl Into<String>) -> Self {
        self.grain = Some(grain.into());
        self
    }

    pub fn with_date_part(mut self, date_part: DatePart) -> Self {
        self.date_part = Some(date_part);
        self
    }

    pub fn input_str(&self) -> String {
        let mut rendered = format!("GroupByParameter('{}'", self.name);
        if let Some(grain) = &self.grain {
            rendered.push_str(&format!(", grain='{grain}'"));
        }
        if let Some(part) = self.date_part {
            rendered.push_str(&format!(", date_part='{part}'"));
        }
        rendered.push(')');
        rendered
    }

    /// `None` when the name or grain is malformed.
    pub fn spec_pattern<F>(&self, granularity: F) -> Option<SpecPattern>
    where
        F: Fn(&str) -> Option<ExpandedTimeGranularity>,
    {
        let parsed = StructuredDunderName::parse(&self.name, &granularity)?;
        let grain = match &self.grain {
            Some(name) => Some(granularity(name)?),
            None => parsed.time_granularity,
        };
        let date_part = self.date_part.or(parsed.date_part);
        let pattern = EntityLinkPattern::new(parsed.element_name, parsed.entity_links);
        let pattern = if grain.is_some() || date_part.is_some() {
            pattern
                .with_element_types(&[LinkableElementType::TimeDimension])
                .with_time_granularity(grain)
                .with_date_part(date_part)
        } else {
            pattern
        };
        Some(pattern.into())
    }
}

/// A metric given by name, optionally renamed in the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricParameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl MetricParameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn input_str(&self) -> String {
        self.name.clone()
    }

    pub fn spec_pattern(&self) -> SpecPattern {
        MetricSpecPattern::new(&self.name).into()
    }
}

/// What an order-by parameter refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderByItem {
    Metric(MetricParameter),
    GroupBy(GroupByParameter),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderByParameter {
    pub item: OrderByItem,
    #[serde(default)]
    pub descending: bool,
}

impl OrderByParameter {
    pub fn metric(metric: MetricParameter, descending: bool) -> Self {
        Self {
            item: OrderByItem::Metric(metric),
            descending,
        }
    }

    pub fn group_by(group_by: GroupByParameter, descending: bool) -> Self {
        Self {
            item: OrderByItem::GroupBy(group_by),
            descending,
        }
    }

    pub fn input_str(&self) -> String {
        let item = match &self.item {
            OrderByItem::Metric(metric) => metric.input_str(),
            OrderByItem::GroupBy(group_by) => group_by.input_str(),
        };
        if self.descending {
            format!("-{item}")
        } else {
            item
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{entity_links, TimeGranularity};

    fn standard(name: &str) -> Option<ExpandedTimeGranularity> {
        TimeGranularity::from_name(name).map(Into::into)
    }

    #[test]
    fn test_group_by_parameter_pattern() {
        let param = GroupByParameter::new("booking__ds").with_grain("month");
        let Some(SpecPattern::EntityLink(pattern)) = param.spec_pattern(standard) else {
            panic!("expected an entity link pattern");
        };
        assert_eq!(pattern.element_name, "ds");
        assert_eq!(pattern.entity_links, entity_links(&["booking"]));
        assert_eq!(pattern.time_granularity, Some(TimeGranularity::Month.into()));
        assert_eq!(param.input_str(), "GroupByParameter('booking__ds', grain='month')");
    }

    #[test]
    fn test_unknown_grain() {
        let param = GroupByParameter::new("booking__ds").with_grain("fortnight");
        assert!(param.spec_pattern(standard).is_none());
    }

    #[test]
    fn test_order_by_input_str() {
        let order = OrderByParameter::metric(MetricParameter::new("bookings"), true);
        assert_eq!(order.input_str(), "-bookings");
    }
}
