//! Reference resolution caching
//!
//! One [`ResolutionCache`] is owned per namespace session and injected into
//! the page orchestrator; there is no process-wide cache.

pub mod resolution;

pub use resolution::{
    CacheConfig, CacheStats, CacheStatsSnapshot, EntityFetcher, EntryState, ResolutionCache,
};
