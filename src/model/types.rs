//! Primitive manifest types: time granularities, date parts, entity kinds and references.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Standard time granularity, ordered from finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeGranularity {
    Nanosecond,
    Microsecond,
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeGranularity {
    /// Every standard granularity, finest first.
    pub const ALL: [TimeGranularity; 11] = [
        TimeGranularity::Nanosecond,
        TimeGranularity::Microsecond,
        TimeGranularity::Millisecond,
        TimeGranularity::Second,
        TimeGranularity::Minute,
        TimeGranularity::Hour,
        TimeGranularity::Day,
        TimeGranularity::Week,
        TimeGranularity::Month,
        TimeGranularity::Quarter,
        TimeGranularity::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeGranularity::Nanosecond => "nanosecond",
            TimeGranularity::Microsecond => "microsecond",
            TimeGranularity::Millisecond => "millisecond",
            TimeGranularity::Second => "second",
            TimeGranularity::Minute => "minute",
            TimeGranularity::Hour => "hour",
            TimeGranularity::Day => "day",
            TimeGranularity::Week => "week",
            TimeGranularity::Month => "month",
            TimeGranularity::Quarter => "quarter",
            TimeGranularity::Year => "year",
        }
    }

    /// Parse a granularity name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.to_lowercase();
        Self::ALL.into_iter().find(|g| g.as_str() == lowered)
    }
}

impl fmt::Display for TimeGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A granularity that is either a standard one or a custom grain defined in the
/// manifest on top of a standard base granularity (e.g. `fiscal_quarter`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExpandedTimeGranularity {
    pub name: String,
    pub base_granularity: TimeGranularity,
}

impl ExpandedTimeGranularity {
    pub fn from_standard(granularity: TimeGranularity) -> Self {
        Self {
            name: granularity.as_str().to_string(),
            base_granularity: granularity,
        }
    }

    pub fn custom(name: impl Into<String>, base_granularity: TimeGranularity) -> Self {
        Self {
            name: name.into().to_lowercase(),
            base_granularity,
        }
    }

    pub fn is_custom(&self) -> bool {
        self.name != self.base_granularity.as_str()
    }

    /// A standard grain by name, else one of `custom` (case-insensitive).
    pub fn by_name(name: &str, custom: &[ExpandedTimeGranularity]) -> Option<Self> {
        if let Some(standard) = TimeGranularity::from_name(name) {
            return Some(standard.into());
        }
        let name = name.to_lowercase();
        custom.iter().find(|g| g.name == name).cloned()
    }
}

impl From<TimeGranularity> for ExpandedTimeGranularity {
    fn from(granularity: TimeGranularity) -> Self {
        Self::from_standard(granularity)
    }
}

impl fmt::Display for ExpandedTimeGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A part of a date that can be extracted from a time dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePart {
    Year,
    Quarter,
    Month,
    Week,
    Day,
    Dow,
    Doy,
}

impl DatePart {
    pub const ALL: [DatePart; 7] = [
        DatePart::Year,
        DatePart::Quarter,
        DatePart::Month,
        DatePart::Week,
        DatePart::Day,
        DatePart::Dow,
        DatePart::Doy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatePart::Year => "year",
            DatePart::Quarter => "quarter",
            DatePart::Month => "month",
            DatePart::Week => "week",
            DatePart::Day => "day",
            DatePart::Dow => "dow",
            DatePart::Doy => "doy",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.to_lowercase();
        Self::ALL.into_iter().find(|p| p.as_str() == lowered)
    }

    /// The granularity this part is measured in. A time dimension only supports
    /// the part if it is defined at this granularity or finer.
    pub fn to_granularity(&self) -> TimeGranularity {
        match self {
            DatePart::Year => TimeGranularity::Year,
            DatePart::Quarter => TimeGranularity::Quarter,
            DatePart::Month => TimeGranularity::Month,
            DatePart::Week => TimeGranularity::Week,
            DatePart::Day | DatePart::Dow | DatePart::Doy => TimeGranularity::Day,
        }
    }

    pub fn is_compatible_with(&self, defined_granularity: TimeGranularity) -> bool {
        defined_granularity <= self.to_granularity()
    }
}

impl fmt::Display for DatePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an entity participates in its semantic model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Primary,
    Unique,
    Foreign,
    Natural,
}

impl EntityType {
    /// Entities of this type identify at most one row, so joining *to* the model on
    /// them does not fan out.
    pub fn is_join_target(&self) -> bool {
        matches!(
            self,
            EntityType::Primary | EntityType::Unique | EntityType::Natural
        )
    }
}

/// Reference to an entity by name. Entity links in a join path are sequences of these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityReference(String);

impl EntityReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityReference {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EntityReference {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for EntityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Convenience for building entity link lists in code.
pub fn entity_links(names: &[&str]) -> Vec<EntityReference> {
    names.iter().map(|n| EntityReference::new(*n)).collect()
}
