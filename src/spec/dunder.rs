//! Parsing of `__`-joined names such as `listing__user__country` or
//! `booking__ds__extract_year`.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{DatePart, EntityReference, ExpandedTimeGranularity};

pub const DUNDER: &str = "__";

const DATE_PART_PREFIX: &str = "extract_";

static NAME_PART: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").unwrap());

/// Whether a single element of a dunder name is well-formed.
pub fn is_valid_name_part(part: &str) -> bool {
    NAME_PART.is_match(part) && !part.ends_with('_')
}

/// A dunder name split into entity links, element name and time suffixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredDunderName {
    pub entity_links: Vec<EntityReference>,
    pub element_name: String,
    pub time_granularity: Option<ExpandedTimeGranularity>,
    pub date_part: Option<DatePart>,
}

impl StructuredDunderName {
    /// Parse a name, using `granularity` to recognise grain suffixes (including
    /// custom grains). Returns `None` if any part is malformed.
    pub fn parse<F>(name: &str, granularity: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<ExpandedTimeGranularity>,
    {
        let lowered = name.trim().to_lowercase();
        let mut parts: Vec<&str> = lowered.split(DUNDER).collect();
        if parts.iter().any(|p| !is_valid_name_part(p)) {
            return None;
        }

        let mut time_granularity = None;
        let mut date_part = None;
        if parts.len() >= 2 {
            let last = parts[parts.len() - 1];
            if let Some(part) = last
                .strip_prefix(DATE_PART_PREFIX)
                .and_then(DatePart::from_name)
            {
                date_part = Some(part);
                parts.pop();
            } else if let Some(grain) = granularity(last) {
                time_granularity = Some(grain);
                parts.pop();
            }
        }

        let element_name = parts.pop()?.to_string();
        Some(Self {
            entity_links: parts.into_iter().map(EntityReference::new).collect(),
            element_name,
            time_granularity,
            date_part,
        })
    }

    /// Parse recognising only the standard grains.
    pub fn parse_standard(name: &str) -> Option<Self> {
        Self::parse(name, |part| {
            crate::model::TimeGranularity::from_name(part).map(ExpandedTimeGranularity::from)
        })
    }

    /// The name without time suffixes.
    pub fn element_path(&self) -> String {
        let mut parts: Vec<&str> = self.entity_links.iter().map(|l| l.name()).collect();
        parts.push(&self.element_name);
        parts.join(DUNDER)
    }
}
