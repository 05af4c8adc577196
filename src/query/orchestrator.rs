//! Paged Query Orchestrator
//!
//! Turns a [`PageQuery`] into a request, fetches the page, and enriches each
//! row's reference through the namespace's [`ResolutionCache`].
//!
//! ```text
//! PageQuery ──build──▶ RequestDescriptor ──fetch──▶ {items, total}
//!                                                        │
//!                            distinct reference ids ◀────┘
//!                                      │
//!                              resolve_all (cache)
//!                                      │
//!                                      ▼
//!                   PagedResult { rows in server order, total }
//! ```
//!
//! A failed resolution never fails the page: the row carries
//! [`Reference::Unresolved`] with the raw id instead.

use crate::cache::ResolutionCache;
use crate::error::{Error, Result};
use crate::histogram::{aggregate, BucketRow, CategoryMap, MetricSample};
use crate::metrics;
use crate::query::cancel::CancellationToken;
use crate::query::request::{HistogramRequest, PageQuery, RequestDescriptor};
use crate::query::source::DataSource;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Default upper bound on `limit`
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;

// ============================================================================
// Result types
// ============================================================================

/// Rows that point at another entity by id
pub trait Referencing {
    /// Id of the referenced entity, if this row has one
    fn reference_id(&self) -> Option<&str>;
}

impl Referencing for serde_json::Value {
    fn reference_id(&self) -> Option<&str> {
        None
    }
}

/// Outcome of resolving one row's reference
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Reference<E> {
    /// Referenced entity
    Resolved(E),
    /// Lookup failed or entity absent; raw id for display
    Unresolved(String),
}

impl<E> Reference<E> {
    /// Resolved entity, if any
    pub fn resolved(&self) -> Option<&E> {
        match self {
            Reference::Resolved(e) => Some(e),
            Reference::Unresolved(_) => None,
        }
    }

    /// True if the entity was resolved
    pub fn is_resolved(&self) -> bool {
        matches!(self, Reference::Resolved(_))
    }
}

/// One row of a page with its enrichment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRow<R, E> {
    /// Record as returned by the backend
    pub record: R,
    /// Enrichment for the record's reference, `None` if it has none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference<E>>,
}

/// One page of rows plus the total matching count
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedResult<R, E> {
    /// Rows in server order
    pub rows: Vec<EnrichedRow<R, E>>,
    /// Total rows matching the query across all pages
    pub total: u64,
    /// Offset the page was requested at
    pub offset: usize,
    /// Page size requested
    pub limit: usize,
}

impl<R, E> PagedResult<R, E> {
    /// Number of rows on this page
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the page has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True if rows exist beyond this page
    pub fn has_more(&self) -> bool {
        (self.offset.saturating_add(self.rows.len()) as u64) < self.total
    }
}

#[derive(Deserialize)]
struct RawPage<R> {
    items: Vec<R>,
    total: u64,
}

// ============================================================================
// Orchestrator
// ============================================================================

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Fetches pages for one namespace session
///
/// Holds the session's resolution cache; two orchestrators built with the
/// same cache share resolved entities.
pub struct PageOrchestrator<E> {
    namespace: String,
    source: Arc<dyn DataSource>,
    cache: Option<ResolutionCache<E>>,
    max_page_size: usize,
    clock: Clock,
}

impl<E: Clone + Send + Sync + 'static> PageOrchestrator<E> {
    /// Create an orchestrator without reference enrichment
    pub fn new(namespace: impl Into<String>, source: Arc<dyn DataSource>) -> Self {
        Self {
            namespace: namespace.into(),
            source,
            cache: None,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            clock: Arc::new(Utc::now),
        }
    }

    /// Enrich references through `cache`
    ///
    /// # Panics
    ///
    /// Panics if the cache belongs to another namespace.
    pub fn with_cache(mut self, cache: ResolutionCache<E>) -> Self {
        assert!(
            cache.namespace() == self.namespace,
            "cache namespace must match orchestrator namespace"
        );
        self.cache = Some(cache);
        self
    }

    /// Set the upper bound on `limit`
    pub fn with_max_page_size(mut self, max: usize) -> Self {
        self.max_page_size = max.max(1);
        self
    }

    /// Replace the wall clock used for date-range windows
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Namespace requests are scoped to
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Resolution cache, if enrichment is enabled
    pub fn cache(&self) -> Option<&ResolutionCache<E>> {
        self.cache.as_ref()
    }

    /// Build the request a query would issue right now
    pub fn describe(&self, query: &PageQuery) -> Result<RequestDescriptor> {
        RequestDescriptor::build(&self.namespace, query, (self.clock)(), self.max_page_size)
    }

    /// Fetch one page and enrich rows via [`Referencing`]
    pub async fn fetch_page<R>(
        &self,
        query: &PageQuery,
        cancel: &CancellationToken,
    ) -> Result<PagedResult<R, E>>
    where
        R: DeserializeOwned + Referencing,
    {
        self.fetch_page_with(query, cancel, R::reference_id).await
    }

    /// Fetch one page, extracting reference ids with `reference_of`
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires at any point before the
    /// page is assembled.
    pub async fn fetch_page_with<R, F>(
        &self,
        query: &PageQuery,
        cancel: &CancellationToken,
        reference_of: F,
    ) -> Result<PagedResult<R, E>>
    where
        R: DeserializeOwned,
        F: Fn(&R) -> Option<&str>,
    {
        let descriptor = self.describe(query)?;
        let path = descriptor.path();
        let query_string = descriptor.query();
        let entity = descriptor.entity_path.as_str();

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let start = Instant::now();
        let body = match self.source.fetch(&path, &query_string).await {
            Ok(body) => body,
            Err(e) => {
                metrics::record_page_fetch(entity, start.elapsed().as_secs_f64(), false);
                tracing::warn!(
                    namespace = %self.namespace,
                    path = %path,
                    error = %e,
                    "Page fetch failed"
                );
                return Err(e.into());
            }
        };

        let page: RawPage<R> = match serde_json::from_value(body) {
            Ok(page) => page,
            Err(e) => {
                metrics::record_page_fetch(entity, start.elapsed().as_secs_f64(), false);
                return Err(Error::MalformedResponse {
                    path,
                    message: e.to_string(),
                });
            }
        };

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let resolved: HashMap<String, Option<E>> = match &self.cache {
            Some(cache) => {
                let ids: Vec<&str> = page.items.iter().filter_map(&reference_of).collect();
                cache.resolve_all(ids).await
            }
            None => HashMap::new(),
        };

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let rows: Vec<EnrichedRow<R, E>> = page
            .items
            .into_iter()
            .map(|record| {
                let reference = reference_of(&record).map(|id| match resolved.get(id) {
                    Some(Some(entity)) => Reference::Resolved(entity.clone()),
                    _ => Reference::Unresolved(id.to_string()),
                });
                EnrichedRow { record, reference }
            })
            .collect();

        let elapsed = start.elapsed();
        metrics::record_page_fetch(entity, elapsed.as_secs_f64(), true);
        tracing::debug!(
            namespace = %self.namespace,
            entity,
            offset = descriptor.offset,
            rows = rows.len(),
            total = page.total,
            duration_ms = elapsed.as_millis() as u64,
            "Fetched page"
        );

        Ok(PagedResult {
            rows,
            total: page.total,
            offset: descriptor.offset,
            limit: descriptor.limit,
        })
    }

    /// Fetch and aggregate histogram buckets
    ///
    /// The request's namespace is ignored in favour of the orchestrator's.
    pub async fn fetch_histogram(
        &self,
        request: &HistogramRequest,
        categories: &CategoryMap,
    ) -> Result<Vec<BucketRow>> {
        let request = HistogramRequest {
            namespace: self.namespace.clone(),
            ..request.clone()
        };
        let path = request.path();

        let body = self.source.fetch(&path, &request.query()).await?;
        let samples: Vec<MetricSample> =
            serde_json::from_value(body).map_err(|e| Error::MalformedResponse {
                path: path.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!(
            namespace = %self.namespace,
            collection = %request.collection,
            buckets = samples.len(),
            "Fetched histogram"
        );

        Ok(aggregate(&samples, categories))
    }
}
