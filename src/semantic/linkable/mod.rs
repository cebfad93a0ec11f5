//! Linkable elements: the concrete ways a group-by item can be reached from a
//! measure, collected into sets keyed by path key.

pub mod builder;
pub mod element;
pub mod set;

pub use builder::{find_join_paths, group_by_metric_element, LinkableElementBuilder};
pub use element::{
    ElementProperties, ElementProperty, JoinPathElement, LinkableDimension, LinkableElement,
    LinkableEntity, LinkableMetric, SemanticModelJoinPath,
};
pub use set::LinkableElementSet;
