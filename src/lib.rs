//! Ledgerscope - explorer core for a multiparty ledger REST API
//!
//! This library provides the non-visual core of a ledger explorer:
//! - Filter expression compilation to the backend's query-string dialect
//! - Dense, category-keyed histogram buckets for stacked charts
//! - Namespace-scoped reference resolution with in-flight coalescing
//! - Paged queries with last-request-wins and cancellation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod filter;
pub mod histogram;
pub mod models;
pub mod types;

/// Prometheus metrics and telemetry
pub mod metrics;

/// Configuration management with TOML support
pub mod config;

/// Reference resolution cache
pub mod cache;

/// Paged query orchestration over a pluggable data source
pub mod query;

/// Per-namespace wiring of data source, caches and orchestrators
pub mod session;

// Re-export main types
pub use cache::ResolutionCache;
pub use config::Config;
pub use error::{Error, Result};
pub use filter::{FilterDraft, FilterToken, Operator};
pub use query::{PageOrchestrator, PageQuery, PageView};
pub use session::Session;
pub use types::{DateRange, EntityKind};
