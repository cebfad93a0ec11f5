//! The fully resolved query.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use super::instance::{
    DimensionSpec, EntitySpec, GroupByMetricSpec, LinkableInstanceSpec, MetricSpec, OrderBySpec,
    TimeDimensionSpec,
};
use crate::model::WhereFilterIntersection;
use crate::resolver::filter::FilterSpecResolutionLookup;

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeRangeError {
    #[error("{0:?} is not an ISO-8601 date or datetime")]
    InvalidDatetime(String),

    #[error("start time {start} is after end time {end}")]
    StartAfterEnd {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

/// Inclusive bounds on `metric_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeRangeConstraint {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}

impl TimeRangeConstraint {
    /// Bounds used for a missing side of the range.
    pub fn all_time() -> Self {
        Self {
            start_time: midnight(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN)),
            end_time: midnight(NaiveDate::from_ymd_opt(2040, 12, 31).unwrap_or(NaiveDate::MAX)),
        }
    }

    /// Build a constraint from optional ISO-8601 strings. Returns `Ok(None)` when
    /// neither side is given.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Option<Self>, TimeRangeError> {
        if start.is_none() && end.is_none() {
            return Ok(None);
        }
        let all_time = Self::all_time();
        let start_time = start.map(parse_datetime).transpose()?.unwrap_or(all_time.start_time);
        let end_time = end.map(parse_datetime).transpose()?.unwrap_or(all_time.end_time);
        if start_time > end_time {
            return Err(TimeRangeError::StartAfterEnd {
                start: start_time,
                end: end_time,
            });
        }
        Ok(Some(Self {
            start_time,
            end_time,
        }))
    }
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn parse_datetime(value: &str) -> Result<NaiveDateTime, TimeRangeError> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(midnight(date));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| TimeRangeError::InvalidDatetime(value.to_string()))
}

/// A validated query ready for plan building.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QuerySpec {
    pub metric_specs: Vec<MetricSpec>,
    pub dimension_specs: Vec<DimensionSpec>,
    pub time_dimension_specs: Vec<TimeDimensionSpec>,
    pub entity_specs: Vec<EntitySpec>,
    pub group_by_metric_specs: Vec<GroupByMetricSpec>,
    pub order_by_specs: Vec<OrderBySpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range_constraint: Option<TimeRangeConstraint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_intersection: Option<WhereFilterIntersection>,
    #[serde(skip)]
    pub filter_spec_resolution_lookup: FilterSpecResolutionLookup,
    pub min_max_only: bool,
    pub apply_group_by: bool,
}

impl QuerySpec {
    /// Split group-by specs into their typed buckets, keeping input order.
    pub fn add_group_by_specs(&mut self, specs: impl IntoIterator<Item = LinkableInstanceSpec>) {
        for spec in specs {
            match spec {
                LinkableInstanceSpec::Dimension(s) => self.dimension_specs.push(s),
                LinkableInstanceSpec::TimeDimension(s) => self.time_dimension_specs.push(s),
                LinkableInstanceSpec::Entity(s) => self.entity_specs.push(s),
                LinkableInstanceSpec::GroupByMetric(s) => self.group_by_metric_specs.push(s),
            }
        }
    }

    pub fn linkable_specs(&self) -> Vec<LinkableInstanceSpec> {
        let mut specs: Vec<LinkableInstanceSpec> = Vec::new();
        specs.extend(self.dimension_specs.iter().cloned().map(Into::into));
        specs.extend(self.time_dimension_specs.iter().cloned().map(Into::into));
        specs.extend(self.entity_specs.iter().cloned().map(Into::into));
        specs.extend(self.group_by_metric_specs.iter().cloned().map(Into::into));
        specs
    }
}
