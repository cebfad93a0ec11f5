//! Semantic models: the table-like sources that define entities, measures and dimensions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::types::{EntityReference, EntityType, TimeGranularity};

/// A join key exposed by a semantic model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
}

/// Categorical or time dimension payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DimensionKind {
    Categorical,
    Time { time_granularity: TimeGranularity },
}

/// A non-aggregated attribute of a semantic model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    #[serde(flatten)]
    pub kind: DimensionKind,
}

impl Dimension {
    pub fn is_time(&self) -> bool {
        matches!(self.kind, DimensionKind::Time { .. })
    }

    pub fn time_granularity(&self) -> Option<TimeGranularity> {
        match self.kind {
            DimensionKind::Time { time_granularity } => Some(time_granularity),
            DimensionKind::Categorical => None,
        }
    }
}

/// An aggregatable column expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agg_time_dimension: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticModel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_agg_time_dimension: Option<String>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub measures: Vec<Measure>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
}

impl SemanticModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_entity: None,
            default_agg_time_dimension: None,
            entities: Vec::new(),
            measures: Vec::new(),
            dimensions: Vec::new(),
        }
    }

    pub fn with_primary_entity(mut self, name: impl Into<String>) -> Self {
        self.primary_entity = Some(name.into());
        self
    }

    pub fn with_default_agg_time_dimension(mut self, name: impl Into<String>) -> Self {
        self.default_agg_time_dimension = Some(name.into());
        self
    }

    pub fn with_entity(mut self, name: impl Into<String>, entity_type: EntityType) -> Self {
        self.entities.push(Entity {
            name: name.into(),
            entity_type,
        });
        self
    }

    pub fn with_categorical(mut self, name: impl Into<String>) -> Self {
        self.dimensions.push(Dimension {
            name: name.into(),
            kind: DimensionKind::Categorical,
        });
        self
    }

    pub fn with_time_dimension(
        mut self,
        name: impl Into<String>,
        time_granularity: TimeGranularity,
    ) -> Self {
        self.dimensions.push(Dimension {
            name: name.into(),
            kind: DimensionKind::Time { time_granularity },
        });
        self
    }

    /// Add a measure that uses the model's default agg time dimension.
    pub fn with_measure(mut self, name: impl Into<String>) -> Self {
        self.measures.push(Measure {
            name: name.into(),
            agg_time_dimension: None,
        });
        self
    }

    pub fn with_measure_agg_time(
        mut self,
        name: impl Into<String>,
        agg_time_dimension: impl Into<String>,
    ) -> Self {
        self.measures.push(Measure {
            name: name.into(),
            agg_time_dimension: Some(agg_time_dimension.into()),
        });
        self
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn measure(&self, name: &str) -> Option<&Measure> {
        self.measures.iter().find(|m| m.name == name)
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    /// Every entity name, the primary entity included.
    pub fn entity_names(&self) -> BTreeSet<&str> {
        let mut names: BTreeSet<&str> = self.entities.iter().map(|e| e.name.as_str()).collect();
        if let Some(primary) = &self.primary_entity {
            names.insert(primary);
        }
        names
    }

    /// Entities through which this model's own elements are addressed: the primary
    /// entity plus every entity that identifies a single row of the model.
    pub fn local_entity_links(&self) -> Vec<EntityReference> {
        let mut links: Vec<EntityReference> = Vec::new();
        if let Some(primary) = &self.primary_entity {
            links.push(EntityReference::new(primary.clone()));
        }
        for entity in &self.entities {
            if entity.entity_type.is_join_target()
                && !links.iter().any(|l| l.name() == entity.name)
            {
                links.push(EntityReference::new(entity.name.clone()));
            }
        }
        links
    }

    /// Whether this model can be joined *to* on the given entity without fan-out.
    pub fn is_join_target_for(&self, entity_name: &str) -> bool {
        self.primary_entity.as_deref() == Some(entity_name)
            || self
                .entity(entity_name)
                .is_some_and(|e| e.entity_type.is_join_target())
    }

    /// The time dimension used to aggregate the named measure over time.
    pub fn agg_time_dimension_for(&self, measure_name: &str) -> Option<&Dimension> {
        let measure = self.measure(measure_name)?;
        let dim_name = measure
            .agg_time_dimension
            .as_deref()
            .or(self.default_agg_time_dimension.as_deref())?;
        self.dimension(dim_name).filter(|d| d.is_time())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listings() -> SemanticModel {
        SemanticModel::new("listings")
            .with_primary_entity("listing")
            .with_default_agg_time_dimension("created_at")
            .with_entity("listing", EntityType::Primary)
            .with_entity("user", EntityType::Foreign)
            .with_entity("listing_code", EntityType::Unique)
            .with_categorical("country")
            .with_time_dimension("created_at", TimeGranularity::Day)
            .with_measure("listings")
    }

    #[test]
    fn test_local_entity_links_skip_foreign() {
        let names: Vec<String> = listings()
            .local_entity_links()
            .iter()
            .map(|l| l.name().to_string())
            .collect();
        assert_eq!(names, vec!["listing", "listing_code"]);
    }

    #[test]
    fn test_agg_time_dimension_falls_back_to_default() {
        let model = listings();
        let dim = model.agg_time_dimension_for("listings").unwrap();
        assert_eq!(dim.name, "created_at");
        assert_eq!(dim.time_granularity(), Some(TimeGranularity::Day));
        assert!(model.agg_time_dimension_for("missing").is_none());
    }

    #[test]
    fn test_join_target() {
        let model = listings();
        assert!(model.is_join_target_for("listing"));
        assert!(!model.is_join_target_for("user"));
    }

    #[test]
    fn test_dimension_json_shape() {
        let dim: Dimension =
            serde_json::from_str(r#"{"name": "ds", "type": "time", "time_granularity": "day"}"#)
                .unwrap();
        assert_eq!(dim.time_granularity(), Some(TimeGranularity::Day));
    }
}
