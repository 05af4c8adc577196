//! Time-bucketed histogram aggregation
//!
//! Converts sparse `(timestamp, type, count)` samples into dense,
//! category-keyed rows for stacked charts.
//!
//! # Example
//!
//! ```rust
//! use ledgerscope::histogram::{aggregate, is_empty, CategoryMap, CategorySpec, MetricSample, TypeCount};
//!
//! let categories = CategoryMap::new()
//!     .with_type("token_mint", CategorySpec::new("Mint", "#4dd0e1", "Mint"))
//!     .with_type("token_burn", CategorySpec::new("Burn", "#ff7043", "Burn"));
//!
//! let samples = vec![MetricSample::new("2024-05-01T00:00:00Z", vec![TypeCount::new("token_mint", 3)])];
//! let rows = aggregate(&samples, &categories);
//!
//! assert_eq!(rows[0].get("Mint"), 3);
//! assert_eq!(rows[0].get("Burn"), 0);
//! assert!(!is_empty(&rows));
//! ```

pub mod bucket;
pub mod category;

pub use bucket::{aggregate, is_empty, totals, BucketRow, MetricSample, TypeCount};
pub use category::{CategoryMap, CategorySpec, LegendEntry};
