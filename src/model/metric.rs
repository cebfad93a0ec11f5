//! Metric definitions.

use serde::{Deserialize, Serialize};

use super::filter::WhereFilterIntersection;
use super::types::TimeGranularity;

/// A measure consumed by a simple, cumulative or conversion metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricInputMeasure {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<WhereFilterIntersection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl MetricInputMeasure {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filter: None,
            alias: None,
        }
    }
}

/// A metric consumed by a ratio or derived metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricInput {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<WhereFilterIntersection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// e.g. `"1 week"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_window: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_to_grain: Option<TimeGranularity>,
}

impl MetricInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filter: None,
            alias: None,
            offset_window: None,
            offset_to_grain: None,
        }
    }

    pub fn with_filter(mut self, filter: WhereFilterIntersection) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_offset_window(mut self, window: impl Into<String>) -> Self {
        self.offset_window = Some(window.into());
        self
    }

    pub fn with_offset_to_grain(mut self, grain: TimeGranularity) -> Self {
        self.offset_to_grain = Some(grain);
        self
    }

    pub fn has_offset(&self) -> bool {
        self.offset_window.is_some() || self.offset_to_grain.is_some()
    }
}

/// The metric type with its type-specific parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricKind {
    Simple {
        measure: MetricInputMeasure,
    },
    Cumulative {
        measure: MetricInputMeasure,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        window: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        grain_to_date: Option<TimeGranularity>,
    },
    Ratio {
        numerator: MetricInput,
        denominator: MetricInput,
    },
    Derived {
        expr: String,
        metrics: Vec<MetricInput>,
    },
    Conversion {
        base_measure: MetricInputMeasure,
        conversion_measure: MetricInputMeasure,
        entity: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    #[serde(flatten)]
    pub kind: MetricKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<WhereFilterIntersection>,
    /// Default grain for `metric_time` when the query doesn't specify one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_granularity: Option<TimeGranularity>,
}

impl Metric {
    fn with_kind(name: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            kind,
            filter: None,
            time_granularity: None,
        }
    }

    pub fn simple(name: impl Into<String>, measure: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            MetricKind::Simple {
                measure: MetricInputMeasure::new(measure),
            },
        )
    }

    pub fn cumulative(
        name: impl Into<String>,
        measure: impl Into<String>,
        window: Option<&str>,
    ) -> Self {
        Self::with_kind(
            name,
            MetricKind::Cumulative {
                measure: MetricInputMeasure::new(measure),
                window: window.map(str::to_string),
                grain_to_date: None,
            },
        )
    }

    pub fn ratio(name: impl Into<String>, numerator: MetricInput, denominator: MetricInput) -> Self {
        Self::with_kind(
            name,
            MetricKind::Ratio {
                numerator,
                denominator,
            },
        )
    }

    pub fn derived(name: impl Into<String>, expr: impl Into<String>, metrics: Vec<MetricInput>) -> Self {
        Self::with_kind(
            name,
            MetricKind::Derived {
                expr: expr.into(),
                metrics,
            },
        )
    }

    pub fn conversion(
        name: impl Into<String>,
        base_measure: impl Into<String>,
        conversion_measure: impl Into<String>,
        entity: impl Into<String>,
    ) -> Self {
        Self::with_kind(
            name,
            MetricKind::Conversion {
                base_measure: MetricInputMeasure::new(base_measure),
                conversion_measure: MetricInputMeasure::new(conversion_measure),
                entity: entity.into(),
            },
        )
    }

    pub fn with_filter(mut self, filter: WhereFilterIntersection) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_time_granularity(mut self, grain: TimeGranularity) -> Self {
        self.time_granularity = Some(grain);
        self
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            MetricKind::Simple { .. } => "simple",
            MetricKind::Cumulative { .. } => "cumulative",
            MetricKind::Ratio { .. } => "ratio",
            MetricKind::Derived { .. } => "derived",
            MetricKind::Conversion { .. } => "conversion",
        }
    }

    /// Metrics defined directly on measures rather than on other metrics.
    pub fn is_base(&self) -> bool {
        matches!(
            self.kind,
            MetricKind::Simple { .. } | MetricKind::Cumulative { .. } | MetricKind::Conversion { .. }
        )
    }

    pub fn input_metrics(&self) -> Vec<&MetricInput> {
        match &self.kind {
            MetricKind::Ratio {
                numerator,
                denominator,
            } => vec![numerator, denominator],
            MetricKind::Derived { metrics, .. } => metrics.iter().collect(),
            MetricKind::Simple { .. }
            | MetricKind::Cumulative { .. }
            | MetricKind::Conversion { .. } => Vec::new(),
        }
    }

    pub fn input_measures(&self) -> Vec<&MetricInputMeasure> {
        match &self.kind {
            MetricKind::Simple { measure } | MetricKind::Cumulative { measure, .. } => {
                vec![measure]
            }
            MetricKind::Conversion {
                base_measure,
                conversion_measure,
                ..
            } => vec![base_measure, conversion_measure],
            MetricKind::Ratio { .. } | MetricKind::Derived { .. } => Vec::new(),
        }
    }

    /// Whether this metric, by itself, can only be computed over `metric_time`.
    /// Input metrics are checked by the caller.
    pub fn requires_metric_time(&self) -> bool {
        match &self.kind {
            MetricKind::Cumulative {
                window,
                grain_to_date,
                ..
            } => window.is_some() || grain_to_date.is_some(),
            MetricKind::Ratio { .. } | MetricKind::Derived { .. } => {
                self.input_metrics().iter().any(|input| input.has_offset())
            }
            MetricKind::Simple { .. } | MetricKind::Conversion { .. } => false,
        }
    }
}
