//! Semantic layer: the labeled graph over a manifest and the structures derived
//! from it.
//!
//! - [`graph`]: models, measures, entity keys and metrics as a labeled graph
//! - [`pathfinder`]: BFS reachability and weighted DFS path search over any labeled graph
//! - [`trie`]: dunder-name tries with merge algebra
//! - [`linkable`]: the group-by items a measure can reach
//! - [`entity_key`]: entity-key tries per model and metric, group-by metrics
//! - [`lookup`]: the manifest lookup that owns and caches all of the above

pub mod entity_key;
pub mod flags;
pub mod graph;
pub mod linkable;
pub mod lookup;
pub mod pathfinder;
pub mod trie;

pub use entity_key::EntityKeyResolution;
pub use flags::{Flag, FlagSet};
pub use graph::{Label, LabelSet, LabeledEdge, LabeledGraph, SemanticGraph, SemanticGraphNode};
pub use linkable::{
    ElementProperties, ElementProperty, LinkableDimension, LinkableElement, LinkableElementSet,
    LinkableEntity, LinkableMetric, SemanticModelJoinPath,
};
pub use lookup::SemanticManifestLookup;
pub use pathfinder::{Pathfinder, ReachabilityResult, TraversalOptions, WeightedPath};
pub use trie::{DunderNameDescriptor, DunderNameTrie, MutableDunderNameTrie};
