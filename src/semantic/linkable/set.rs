//! Candidate sets of linkable elements, keyed by path key.

use std::collections::{BTreeMap, BTreeSet};

use super::element::{
    ElementProperties, ElementProperty, LinkableDimension, LinkableElement, LinkableEntity,
    LinkableMetric,
};
use crate::spec::pattern::match_linkable;
use crate::spec::{ElementPathKey, LinkableElementType, LinkableInstanceSpec, SpecPattern};

/// Path key → every way of reaching it.
///
/// Keys live in the bucket matching their element type and always map to at least
/// one element. Several elements under one key mean the item is reachable in more
/// than one way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkableElementSet {
    dimensions: BTreeMap<ElementPathKey, BTreeSet<LinkableDimension>>,
    entities: BTreeMap<ElementPathKey, BTreeSet<LinkableEntity>>,
    metrics: BTreeMap<ElementPathKey, BTreeSet<LinkableMetric>>,
}

impl LinkableElementSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_elements<I: IntoIterator<Item = LinkableElement>>(elements: I) -> Self {
        let mut set = Self::new();
        for element in elements {
            set.add(element);
        }
        set
    }

    pub fn add(&mut self, element: LinkableElement) {
        let key = element.path_key();
        match element {
            LinkableElement::Dimension(d) => {
                self.dimensions.entry(key).or_default().insert(d);
            }
            LinkableElement::Entity(e) => {
                self.entities.entry(key).or_default().insert(e);
            }
            LinkableElement::Metric(m) => {
                self.metrics.entry(key).or_default().insert(m);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty() && self.entities.is_empty() && self.metrics.is_empty()
    }

    /// Number of distinct path keys.
    pub fn len(&self) -> usize {
        self.dimensions.len() + self.entities.len() + self.metrics.len()
    }

    pub fn path_keys(&self) -> Vec<&ElementPathKey> {
        self.dimensions
            .keys()
            .chain(self.entities.keys())
            .chain(self.metrics.keys())
            .collect()
    }

    pub fn contains_key(&self, key: &ElementPathKey) -> bool {
        self.dimensions.contains_key(key)
            || self.entities.contains_key(key)
            || self.metrics.contains_key(key)
    }

    /// Every element, grouped by path key.
    pub fn elements(&self) -> Vec<(ElementPathKey, Vec<LinkableElement>)> {
        let dims = self.dimensions.iter().map(|(k, v)| {
            (k.clone(), v.iter().cloned().map(LinkableElement::Dimension).collect())
        });
        let entities = self.entities.iter().map(|(k, v)| {
            (k.clone(), v.iter().cloned().map(LinkableElement::Entity).collect())
        });
        let metrics = self.metrics.iter().map(|(k, v)| {
            (k.clone(), v.iter().cloned().map(LinkableElement::Metric).collect())
        });
        dims.chain(entities).chain(metrics).collect()
    }

    pub fn elements_for_path_key(&self, key: &ElementPathKey) -> Vec<LinkableElement> {
        match key.element_type() {
            LinkableElementType::Dimension | LinkableElementType::TimeDimension => self
                .dimensions
                .get(key)
                .map(|v| v.iter().cloned().map(LinkableElement::Dimension).collect())
                .unwrap_or_default(),
            LinkableElementType::Entity => self
                .entities
                .get(key)
                .map(|v| v.iter().cloned().map(LinkableElement::Entity).collect())
                .unwrap_or_default(),
            LinkableElementType::Metric => self
                .metrics
                .get(key)
                .map(|v| v.iter().cloned().map(LinkableElement::Metric).collect())
                .unwrap_or_default(),
        }
    }

    pub fn specs(&self) -> Vec<LinkableInstanceSpec> {
        self.path_keys().into_iter().map(|k| k.spec()).collect()
    }

    /// Union of sets. Elements under the same key are combined.
    pub fn merge_by_path_key(sets: &[&LinkableElementSet]) -> LinkableElementSet {
        let mut merged = LinkableElementSet::new();
        for set in sets {
            for (key, elements) in &set.dimensions {
                merged
                    .dimensions
                    .entry(key.clone())
                    .or_default()
                    .extend(elements.iter().cloned());
            }
            for (key, elements) in &set.entities {
                merged
                    .entities
                    .entry(key.clone())
                    .or_default()
                    .extend(elements.iter().cloned());
            }
            for (key, elements) in &set.metrics {
                merged
                    .metrics
                    .entry(key.clone())
                    .or_default()
                    .extend(elements.iter().cloned());
            }
        }
        merged
    }

    /// Keys present in every set, keeping the elements from all of them.
    pub fn intersection_by_path_key(sets: &[&LinkableElementSet]) -> LinkableElementSet {
        let Some((first, rest)) = sets.split_first() else {
            return LinkableElementSet::new();
        };
        let common: BTreeSet<ElementPathKey> = first
            .path_keys()
            .into_iter()
            .filter(|key| rest.iter().all(|s| s.contains_key(key)))
            .cloned()
            .collect();
        LinkableElementSet::merge_by_path_key(sets).retain_keys(|key| common.contains(key))
    }

    fn retain_keys<F: Fn(&ElementPathKey) -> bool>(mut self, keep: F) -> Self {
        self.dimensions.retain(|k, _| keep(k));
        self.entities.retain(|k, _| keep(k));
        self.metrics.retain(|k, _| keep(k));
        self
    }

    fn retain_elements<F: Fn(ElementProperties) -> bool>(mut self, keep: F) -> Self {
        for elements in self.dimensions.values_mut() {
            elements.retain(|e| keep(e.properties));
        }
        for elements in self.entities.values_mut() {
            elements.retain(|e| keep(e.properties));
        }
        for elements in self.metrics.values_mut() {
            elements.retain(|e| keep(e.properties));
        }
        self.dimensions.retain(|_, v| !v.is_empty());
        self.entities.retain(|_, v| !v.is_empty());
        self.metrics.retain(|_, v| !v.is_empty());
        self
    }

    /// Keep elements having at least one of `with_any_of` (when given) and none of
    /// `without_any_of`.
    pub fn filter(
        &self,
        with_any_of: Option<ElementProperties>,
        without_any_of: ElementProperties,
    ) -> LinkableElementSet {
        self.clone().retain_elements(|props| {
            with_any_of.is_none_or(|with| props.intersects(&with))
                && !props.intersects(&without_any_of)
        })
    }

    pub fn without_date_parts(&self) -> LinkableElementSet {
        self.filter(None, ElementProperties::of(&[ElementProperty::DatePart]))
    }

    /// Keep keys whose spec survives every pattern.
    pub fn filter_by_spec_patterns(&self, patterns: &[SpecPattern]) -> LinkableElementSet {
        if patterns.is_empty() {
            return self.clone();
        }
        let matched: BTreeSet<LinkableInstanceSpec> =
            match_linkable(patterns, &self.specs()).into_iter().collect();
        self.clone()
            .retain_keys(|key| matched.contains(&key.spec()))
    }

    /// Every model any element reads.
    pub fn derived_from_semantic_models(&self) -> BTreeSet<String> {
        self.elements()
            .into_iter()
            .flat_map(|(_, elements)| elements)
            .flat_map(|e| e.derived_from_semantic_models())
            .collect()
    }
}
