//! Where filters and the parsed call parameter sets extracted from their templates.
//!
//! The template text (`{{ Dimension('listing__country') }} = 'US'`) is never parsed
//! here. Whatever builds the manifest attaches the references it found as
//! [`CallParameterSet`]s, or the parse error it hit.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::DatePart;

/// One reference embedded in a filter template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallParameterSet {
    /// `Dimension('listing__country')`
    Dimension { name: String },
    /// `TimeDimension('metric_time', 'month')`
    TimeDimension {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_granularity: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        date_part: Option<DatePart>,
    },
    /// `Entity('listing')`
    Entity { name: String },
    /// `Metric('bookings', group_by=['listing'])`
    Metric {
        metric: String,
        #[serde(default)]
        group_by: Vec<String>,
    },
}

impl CallParameterSet {
    pub fn dimension(name: impl Into<String>) -> Self {
        CallParameterSet::Dimension { name: name.into() }
    }

    pub fn time_dimension(name: impl Into<String>, time_granularity: Option<&str>) -> Self {
        CallParameterSet::TimeDimension {
            name: name.into(),
            time_granularity: time_granularity.map(str::to_string),
            date_part: None,
        }
    }

    pub fn time_dimension_date_part(name: impl Into<String>, date_part: DatePart) -> Self {
        CallParameterSet::TimeDimension {
            name: name.into(),
            time_granularity: None,
            date_part: Some(date_part),
        }
    }

    pub fn entity(name: impl Into<String>) -> Self {
        CallParameterSet::Entity { name: name.into() }
    }

    pub fn metric(metric: impl Into<String>, group_by: &[&str]) -> Self {
        CallParameterSet::Metric {
            metric: metric.into(),
            group_by: group_by.iter().map(|g| g.to_string()).collect(),
        }
    }
}

impl fmt::Display for CallParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallParameterSet::Dimension { name } => write!(f, "Dimension('{}')", name),
            CallParameterSet::TimeDimension {
                name,
                time_granularity,
                date_part,
            } => {
                write!(f, "TimeDimension('{}'", name)?;
                if let Some(grain) = time_granularity {
                    write!(f, ", '{}'", grain)?;
                }
                if let Some(part) = date_part {
                    write!(f, ", date_part_name='{}'", part)?;
                }
                f.write_str(")")
            }
            CallParameterSet::Entity { name } => write!(f, "Entity('{}')", name),
            CallParameterSet::Metric { metric, group_by } => {
                let items: Vec<String> = group_by.iter().map(|g| format!("'{}'", g)).collect();
                write!(f, "Metric('{}', group_by=[{}])", metric, items.join(", "))
            }
        }
    }
}

/// A single filter. `parse_error` is set when the template could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WhereFilter {
    pub where_sql_template: String,
    #[serde(default)]
    pub call_parameter_sets: Vec<CallParameterSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

impl WhereFilter {
    pub fn new(
        where_sql_template: impl Into<String>,
        call_parameter_sets: Vec<CallParameterSet>,
    ) -> Self {
        Self {
            where_sql_template: where_sql_template.into(),
            call_parameter_sets,
            parse_error: None,
        }
    }

    pub fn unparsable(where_sql_template: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            where_sql_template: where_sql_template.into(),
            call_parameter_sets: Vec::new(),
            parse_error: Some(error.into()),
        }
    }

    /// The parsed references, or the error message from the template parser.
    pub fn parsed(&self) -> Result<&[CallParameterSet], &str> {
        match &self.parse_error {
            Some(err) => Err(err.as_str()),
            None => Ok(&self.call_parameter_sets),
        }
    }
}

/// A conjunction of filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WhereFilterIntersection {
    #[serde(default)]
    pub where_filters: Vec<WhereFilter>,
}

impl WhereFilterIntersection {
    pub fn new(where_filters: Vec<WhereFilter>) -> Self {
        Self { where_filters }
    }

    pub fn single(filter: WhereFilter) -> Self {
        Self {
            where_filters: vec![filter],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.where_filters.is_empty()
    }

    pub fn combine(&self, other: &WhereFilterIntersection) -> WhereFilterIntersection {
        let mut where_filters = self.where_filters.clone();
        where_filters.extend(other.where_filters.iter().cloned());
        WhereFilterIntersection { where_filters }
    }
}
