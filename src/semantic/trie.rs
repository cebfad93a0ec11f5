//! A trie keyed by the parts of a dunder name (`("listing", "user")` for
//! `listing__user`), with set algebra over whole tries.
//!
//! [`MutableDunderNameTrie`] is the builder. [`DunderNameTrie`] is the frozen view
//! returned by every merge; merges never modify their inputs.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::model::{DatePart, ExpandedTimeGranularity};
use crate::semantic::linkable::{ElementProperties, ElementProperty};
use crate::spec::{LinkableElementType, DUNDER};

/// The parts of a dunder name.
pub type IndexedDunderName = Vec<String>;

pub fn indexed_name(dunder_name: &str) -> IndexedDunderName {
    dunder_name.split(DUNDER).map(str::to_string).collect()
}

pub fn dunder_name(indexed: &[String]) -> String {
    indexed.join(DUNDER)
}

/// What a name in the trie refers to, and where it comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DunderNameDescriptor {
    pub element_type: LinkableElementType,
    pub time_grain: Option<ExpandedTimeGranularity>,
    pub date_part: Option<DatePart>,
    pub properties: ElementProperties,
    /// Models where the named element is defined.
    pub origin_model_ids: BTreeSet<String>,
    /// Every model read to produce the element, including hidden inputs.
    pub derived_from_model_ids: BTreeSet<String>,
    /// For group-by metrics, the entity keys the metric subquery is grouped by.
    pub entity_key_queries: BTreeSet<String>,
}

impl DunderNameDescriptor {
    pub fn new(element_type: LinkableElementType, properties: ElementProperties) -> Self {
        Self {
            element_type,
            time_grain: None,
            date_part: None,
            properties,
            origin_model_ids: BTreeSet::new(),
            derived_from_model_ids: BTreeSet::new(),
            entity_key_queries: BTreeSet::new(),
        }
    }

    pub fn with_origin(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.derived_from_model_ids.insert(model.clone());
        self.origin_model_ids.insert(model);
        self
    }

    pub fn with_derived_from<I: IntoIterator<Item = String>>(mut self, models: I) -> Self {
        self.derived_from_model_ids.extend(models);
        self
    }

    /// Combine provenance. Element type, grain and date part are taken from `self`.
    pub fn merge(&self, other: &DunderNameDescriptor) -> DunderNameDescriptor {
        let mut merged = self.clone();
        merged.properties = merged.properties.union(&other.properties);
        merged
            .origin_model_ids
            .extend(other.origin_model_ids.iter().cloned());
        merged
            .derived_from_model_ids
            .extend(other.derived_from_model_ids.iter().cloned());
        merged
            .entity_key_queries
            .extend(other.entity_key_queries.iter().cloned());
        merged
    }

    pub fn is_group_by_metric(&self) -> bool {
        self.properties.contains(ElementProperty::Metric)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TrieNode {
    descriptor: Option<DunderNameDescriptor>,
    children: BTreeMap<String, TrieNode>,
}

impl TrieNode {
    fn is_empty(&self) -> bool {
        self.descriptor.is_none() && self.children.is_empty()
    }

    fn prune(&mut self) {
        for child in self.children.values_mut() {
            child.prune();
        }
        self.children.retain(|_, child| !child.is_empty());
    }

    fn get(&self, name: &[String]) -> Option<&TrieNode> {
        match name.split_first() {
            None => Some(self),
            Some((first, rest)) => self.children.get(first)?.get(rest),
        }
    }

    fn collect(
        &self,
        prefix: &mut Vec<String>,
        max_length: Option<usize>,
        out: &mut Vec<(IndexedDunderName, DunderNameDescriptor)>,
    ) {
        if let Some(descriptor) = &self.descriptor {
            if !prefix.is_empty() {
                out.push((prefix.clone(), descriptor.clone()));
            }
        }
        if max_length.is_some_and(|max| prefix.len() >= max) {
            return;
        }
        for (part, child) in &self.children {
            prefix.push(part.clone());
            child.collect(prefix, max_length, out);
            prefix.pop();
        }
    }

    fn merge_descriptors(nodes: &[&TrieNode]) -> Option<DunderNameDescriptor> {
        nodes
            .iter()
            .filter_map(|n| n.descriptor.as_ref())
            .fold(None, |acc: Option<DunderNameDescriptor>, d| match acc {
                None => Some(d.clone()),
                Some(merged) => Some(merged.merge(d)),
            })
    }

    fn child_groups<'a>(nodes: &[&'a TrieNode]) -> BTreeMap<&'a str, Vec<&'a TrieNode>> {
        let mut groups: BTreeMap<&str, Vec<&TrieNode>> = BTreeMap::new();
        for node in nodes {
            for (part, child) in &node.children {
                groups.entry(part.as_str()).or_default().push(child);
            }
        }
        groups
    }

    fn union_merge(nodes: &[&TrieNode]) -> TrieNode {
        let children = Self::child_groups(nodes)
            .into_iter()
            .map(|(part, group)| (part.to_string(), Self::union_merge(&group)))
            .collect();
        TrieNode {
            descriptor: Self::merge_descriptors(nodes),
            children,
        }
    }

    fn union_exclude(nodes: &[&TrieNode]) -> TrieNode {
        let with_descriptor: Vec<&DunderNameDescriptor> =
            nodes.iter().filter_map(|n| n.descriptor.as_ref()).collect();
        let descriptor = match with_descriptor.as_slice() {
            [only] => Some((*only).clone()),
            _ => None,
        };
        let children = Self::child_groups(nodes)
            .into_iter()
            .map(|(part, group)| (part.to_string(), Self::union_exclude(&group)))
            .collect();
        TrieNode {
            descriptor,
            children,
        }
    }

    fn intersection_merge(nodes: &[&TrieNode]) -> TrieNode {
        let descriptor = if nodes.iter().all(|n| n.descriptor.is_some()) {
            Self::merge_descriptors(nodes)
        } else {
            None
        };
        let children = Self::child_groups(nodes)
            .into_iter()
            .filter(|(_, group)| group.len() == nodes.len())
            .map(|(part, group)| (part.to_string(), Self::intersection_merge(&group)))
            .collect();
        TrieNode {
            descriptor,
            children,
        }
    }
}

/// Read-only dunder name trie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DunderNameTrie {
    root: TrieNode,
}

impl DunderNameTrie {
    pub fn empty() -> Self {
        Self::default()
    }

    fn from_root(mut root: TrieNode) -> Self {
        root.descriptor = None;
        root.prune();
        Self { root }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn len(&self) -> usize {
        self.name_items(None).len()
    }

    pub fn descriptor(&self, name: &[String]) -> Option<&DunderNameDescriptor> {
        if name.is_empty() {
            return None;
        }
        self.root.get(name)?.descriptor.as_ref()
    }

    pub fn contains(&self, name: &[String]) -> bool {
        self.descriptor(name).is_some()
    }

    /// Every stored name with its descriptor, in name order. `max_length` bounds the
    /// number of parts.
    pub fn name_items(
        &self,
        max_length: Option<usize>,
    ) -> Vec<(IndexedDunderName, DunderNameDescriptor)> {
        let mut out = Vec::new();
        self.root.collect(&mut Vec::new(), max_length, &mut out);
        out
    }

    pub fn names(&self, max_length: Option<usize>) -> Vec<String> {
        self.name_items(max_length)
            .into_iter()
            .map(|(name, _)| dunder_name(&name))
            .collect()
    }

    pub fn mutable_copy(&self) -> MutableDunderNameTrie {
        MutableDunderNameTrie {
            root: self.root.clone(),
        }
    }

    /// Names in any trie. Descriptors of names in several tries are merged.
    pub fn union_merge_common(tries: &[&DunderNameTrie]) -> DunderNameTrie {
        let roots: Vec<&TrieNode> = tries.iter().map(|t| &t.root).collect();
        Self::from_root(TrieNode::union_merge(&roots))
    }

    /// Names in exactly one trie. A name offered by several inputs is ambiguous and
    /// dropped.
    pub fn union_exclude_common(tries: &[&DunderNameTrie]) -> DunderNameTrie {
        let roots: Vec<&TrieNode> = tries.iter().map(|t| &t.root).collect();
        Self::from_root(TrieNode::union_exclude(&roots))
    }

    /// Names in every trie, with descriptors merged across all of them.
    pub fn intersection_merge_common(tries: &[&DunderNameTrie]) -> DunderNameTrie {
        if tries.is_empty() {
            return DunderNameTrie::empty();
        }
        let roots: Vec<&TrieNode> = tries.iter().map(|t| &t.root).collect();
        Self::from_root(TrieNode::intersection_merge(&roots))
    }
}

/// Builder for [`DunderNameTrie`].
#[derive(Debug, Clone, Default)]
pub struct MutableDunderNameTrie {
    root: TrieNode,
}

impl MutableDunderNameTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert names in order.
    ///
    /// Inserting a name that is already present with a different descriptor removes
    /// it, and the name stays unavailable for the rest of this call.
    pub fn add_name_items<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = (IndexedDunderName, DunderNameDescriptor)>,
    {
        let mut ambiguous: HashSet<IndexedDunderName> = HashSet::new();
        for (name, descriptor) in items {
            if name.is_empty() || ambiguous.contains(&name) {
                continue;
            }
            let mut node = &mut self.root;
            for part in &name {
                node = node.children.entry(part.clone()).or_default();
            }
            match &node.descriptor {
                Some(existing) if *existing == descriptor => {}
                Some(_) => {
                    node.descriptor = None;
                    ambiguous.insert(name);
                }
                None => node.descriptor = Some(descriptor),
            }
        }
    }

    pub fn name_items(
        &self,
        max_length: Option<usize>,
    ) -> Vec<(IndexedDunderName, DunderNameDescriptor)> {
        let mut out = Vec::new();
        self.root.collect(&mut Vec::new(), max_length, &mut out);
        out
    }

    pub fn freeze(self) -> DunderNameTrie {
        DunderNameTrie::from_root(self.root)
    }
}
