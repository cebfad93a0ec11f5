use serde::{Deserialize, Serialize};

use super::filter::WhereFilterIntersection;

/// A named, reusable query stored in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedQuery {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub metrics: Vec<String>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub where_filter: Option<WhereFilterIntersection>,
}

impl SavedQuery {
    pub fn new(name: impl Into<String>, metrics: &[&str], group_by: &[&str]) -> Self {
        Self {
            name: name.into(),
            description: None,
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
            group_by: group_by.iter().map(|g| g.to_string()).collect(),
            where_filter: None,
        }
    }

    pub fn with_where_filter(mut self, filter: WhereFilterIntersection) -> Self {
        self.where_filter = Some(filter);
        self
    }
}
