//! Type-to-category mapping and chart legend

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Display grouping for one raw event/operation type
///
/// Only `category` drives aggregation; `color` and `nicename` are for the
/// legend and may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpec {
    /// Category the type is counted under
    pub category: String,
    /// Chart color, e.g. `#4dd0e1`
    #[serde(default)]
    pub color: String,
    /// Human readable label
    #[serde(default)]
    pub nicename: String,
}

impl CategorySpec {
    /// Create a category spec
    pub fn new(
        category: impl Into<String>,
        color: impl Into<String>,
        nicename: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            color: color.into(),
            nicename: nicename.into(),
        }
    }
}

/// One legend item per distinct category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendEntry {
    /// Category key as it appears in bucket rows
    pub category: String,
    /// Chart color
    pub color: String,
    /// Human readable label
    pub nicename: String,
}

/// Mapping from raw `type` strings to their category
///
/// Many types may share one category; their counts are summed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryMap {
    types: BTreeMap<String, CategorySpec>,
}

impl CategoryMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_type(mut self, raw_type: impl Into<String>, spec: CategorySpec) -> Self {
        self.insert(raw_type, spec);
        self
    }

    /// Map a raw type to a category, replacing any previous mapping
    pub fn insert(&mut self, raw_type: impl Into<String>, spec: CategorySpec) {
        self.types.insert(raw_type.into(), spec);
    }

    /// Spec for a raw type
    pub fn get(&self, raw_type: &str) -> Option<&CategorySpec> {
        self.types.get(raw_type)
    }

    /// Category a raw type is counted under
    pub fn category_of(&self, raw_type: &str) -> Option<&str> {
        self.types.get(raw_type).map(|spec| spec.category.as_str())
    }

    /// Distinct categories, sorted
    pub fn categories(&self) -> BTreeSet<&str> {
        self.types
            .values()
            .map(|spec| spec.category.as_str())
            .collect()
    }

    /// Legend entries for every distinct category, sorted by category
    ///
    /// When several types share a category, the first non-empty color and
    /// nicename (in type-name order) win.
    pub fn legend(&self) -> Vec<LegendEntry> {
        let mut by_category: BTreeMap<&str, LegendEntry> = BTreeMap::new();
        for spec in self.types.values() {
            let entry = by_category
                .entry(spec.category.as_str())
                .or_insert_with(|| LegendEntry {
                    category: spec.category.clone(),
                    color: String::new(),
                    nicename: String::new(),
                });
            if entry.color.is_empty() {
                entry.color.clone_from(&spec.color);
            }
            if entry.nicename.is_empty() {
                entry.nicename.clone_from(&spec.nicename);
            }
        }
        by_category.into_values().collect()
    }

    /// Number of mapped raw types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True if no type is mapped
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, CategorySpec)> for CategoryMap {
    fn from_iter<I: IntoIterator<Item = (K, CategorySpec)>>(iter: I) -> Self {
        Self {
            types: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
