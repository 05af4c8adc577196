//! Dense bucket rows from sparse metric samples

use super::category::CategoryMap;
use crate::metrics;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Count of one raw type within a bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCount {
    /// Raw event/operation type
    #[serde(rename = "type")]
    pub kind: String,
    /// Occurrences in the bucket
    #[serde(deserialize_with = "count_from_json")]
    pub count: u64,
}

impl TypeCount {
    /// Create a type count
    pub fn new(kind: impl Into<String>, count: u64) -> Self {
        Self {
            kind: kind.into(),
            count,
        }
    }
}

/// One bucket as returned by the metrics endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Bucket key, passed through unchanged
    pub timestamp: String,
    /// Per-type counts within the bucket
    #[serde(default)]
    pub types: Vec<TypeCount>,
}

impl MetricSample {
    /// Create a sample
    pub fn new(timestamp: impl Into<String>, types: Vec<TypeCount>) -> Self {
        Self {
            timestamp: timestamp.into(),
            types,
        }
    }
}

/// Output row: bucket key plus one count per category
///
/// Serializes flat, e.g. `{"timestamp": "...", "Mint": 3, "Burn": 0}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRow {
    /// Bucket key
    pub timestamp: String,
    /// Count per category; every category of the map is present
    #[serde(flatten)]
    pub counts: BTreeMap<String, u64>,
}

impl BucketRow {
    /// Count for a category (0 if the category is unknown)
    pub fn get(&self, category: &str) -> u64 {
        self.counts.get(category).copied().unwrap_or(0)
    }

    /// Sum across categories, saturating at `u64::MAX`
    pub fn total(&self) -> u64 {
        self.counts
            .values()
            .fold(0u64, |acc, &count| acc.saturating_add(count))
    }
}

/// Fold samples into dense rows, one per sample in input order
///
/// Every row holds every distinct category of `categories`, starting at 0.
/// Types without a mapping are dropped.
pub fn aggregate(samples: &[MetricSample], categories: &CategoryMap) -> Vec<BucketRow> {
    let keys = categories.categories();
    let mut dropped = 0u64;

    let rows = samples
        .iter()
        .map(|sample| {
            let mut counts: BTreeMap<String, u64> =
                keys.iter().map(|k| ((*k).to_string(), 0)).collect();

            for entry in &sample.types {
                match categories.category_of(&entry.kind) {
                    Some(category) => {
                        let slot = counts.entry(category.to_string()).or_insert(0);
                        *slot = slot.saturating_add(entry.count);
                    }
                    None => {
                        dropped += 1;
                        tracing::debug!(
                            raw_type = %entry.kind,
                            timestamp = %sample.timestamp,
                            count = entry.count,
                            "Dropping histogram count for unmapped type"
                        );
                    }
                }
            }

            BucketRow {
                timestamp: sample.timestamp.clone(),
                counts,
            }
        })
        .collect();

    if dropped > 0 {
        metrics::HISTOGRAM_TYPES_DROPPED.inc_by(dropped as f64);
    }

    rows
}

/// True iff every count in every row is zero
pub fn is_empty(rows: &[BucketRow]) -> bool {
    rows.iter().all(|row| row.counts.values().all(|&c| c == 0))
}

/// Per-category totals across all rows
///
/// Sums saturate at `u64::MAX`.
pub fn totals(rows: &[BucketRow]) -> BTreeMap<String, u64> {
    let mut out: BTreeMap<String, u64> = BTreeMap::new();
    for row in rows {
        for (category, count) in &row.counts {
            let slot = out.entry(category.clone()).or_insert(0);
            *slot = slot.saturating_add(*count);
        }
    }
    out
}

/// Accept counts as JSON integers or decimal strings
fn count_from_json<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawCount {
        Int(u64),
        Text(String),
    }

    match RawCount::deserialize(deserializer)? {
        RawCount::Int(n) => Ok(n),
        RawCount::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
