//! Specs: path keys, resolved instance specs, patterns and the final query spec.

pub mod dunder;
pub mod element;
pub mod instance;
pub mod pattern;
pub mod query;

pub use dunder::{StructuredDunderName, DUNDER};
pub use element::{ElementPathKey, LinkableElementType};
pub use instance::{
    DimensionSpec, EntitySpec, GroupByMetricSpec, InstanceSpec, LinkableInstanceSpec, MetricSpec,
    OrderBySpec, TimeDimensionSpec, METRIC_TIME_ELEMENT_NAME,
};
pub use pattern::{
    DefaultTimeGranularityPattern, EntityLinkPattern, MetricSpecPattern, SpecPattern,
};
pub use query::{QuerySpec, TimeRangeConstraint, TimeRangeError};
