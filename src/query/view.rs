//! Last-request-wins page state
//!
//! A [`PageView`] holds the page a view currently shows. Every [`load`]
//! takes a generation stamp before fetching; when the fetch completes, the
//! result is applied only if no newer load started in the meantime and the
//! view has not been torn down.
//!
//! ```text
//! load #1 ─────────────fetch──────────────────▶ superseded (discarded)
//!       load #2 ───fetch───▶ applied
//! ```
//!
//! [`load`]: PageView::load

use crate::error::{Error, Result};
use crate::metrics;
use crate::query::cancel::CancellationToken;
use crate::query::orchestrator::{PageOrchestrator, PagedResult, Referencing};
use crate::query::request::PageQuery;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};

/// What happened to a completed load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Result became the view's current page
    Applied,
    /// A newer load started first; result discarded
    Superseded,
    /// View was torn down; result discarded
    Cancelled,
}

struct Current<R, E> {
    generation: u64,
    page: Option<PagedResult<R, E>>,
}

/// Current page of one view
pub struct PageView<R, E> {
    latest: AtomicU64,
    cancel: CancellationToken,
    current: RwLock<Current<R, E>>,
}

impl<R, E> PageView<R, E> {
    /// Create an empty view
    pub fn new() -> Self {
        Self {
            latest: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            current: RwLock::new(Current {
                generation: 0,
                page: None,
            }),
        }
    }

    /// Tear the view down; in-flight and future loads are discarded
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once [`cancel`](Self::cancel) was called
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token carried by this view's fetches
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Generation of the most recently started load
    pub fn latest_generation(&self) -> u64 {
        self.latest.load(Ordering::Acquire)
    }

    /// Generation of the page currently shown (0 if none)
    pub fn applied_generation(&self) -> u64 {
        self.current.read().generation
    }

    /// Run `f` against the current page
    pub fn with_page<T>(&self, f: impl FnOnce(Option<&PagedResult<R, E>>) -> T) -> T {
        f(self.current.read().page.as_ref())
    }

    /// Clone of the current page
    pub fn page(&self) -> Option<PagedResult<R, E>>
    where
        R: Clone,
        E: Clone,
    {
        self.current.read().page.clone()
    }

    /// Start a load and apply its result if it is still the latest
    ///
    /// Errors are returned only for the latest load; stale failures are
    /// reported as [`LoadOutcome::Superseded`] like stale successes.
    pub async fn load(
        &self,
        orchestrator: &PageOrchestrator<E>,
        query: &PageQuery,
    ) -> Result<LoadOutcome>
    where
        R: DeserializeOwned + Referencing,
        E: Clone + Send + Sync + 'static,
    {
        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        let result = orchestrator.fetch_page::<R>(query, &self.cancel).await;

        let mut current = self.current.write();
        if self.cancel.is_cancelled() || matches!(result, Err(Error::Cancelled)) {
            drop(current);
            metrics::record_stale_page("cancelled");
            tracing::debug!(generation, "Discarding page for cancelled view");
            return Ok(LoadOutcome::Cancelled);
        }
        if self.latest.load(Ordering::Acquire) != generation {
            drop(current);
            metrics::record_stale_page("superseded");
            tracing::debug!(
                generation,
                latest = self.latest_generation(),
                "Discarding superseded page"
            );
            return Ok(LoadOutcome::Superseded);
        }

        let page = result?;
        current.generation = generation;
        current.page = Some(page);
        Ok(LoadOutcome::Applied)
    }
}

impl<R, E> Default for PageView<R, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, E> Drop for PageView<R, E> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::query::source::DataSource;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct EchoSource;

    #[async_trait]
    impl DataSource for EchoSource {
        async fn fetch(
            &self,
            _path: &str,
            query: &str,
        ) -> std::result::Result<Value, TransportError> {
            if query.contains("skip=999") {
                return Err(TransportError::Connection("reset".into()));
            }
            Ok(json!({"items": [{"query": query}], "total": 1}))
        }
    }

    fn orchestrator() -> PageOrchestrator<String> {
        PageOrchestrator::new("ns1", Arc::new(EchoSource))
    }

    #[tokio::test]
    async fn test_sequential_loads_apply() {
        let view: PageView<Value, String> = PageView::new();
        let orch = orchestrator();

        let outcome = view.load(&orch, &PageQuery::new("events", 10)).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Applied);
        assert_eq!(view.applied_generation(), 1);

        let outcome = view
            .load(&orch, &PageQuery::new("events", 10).page(1))
            .await
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Applied);
        assert_eq!(view.applied_generation(), 2);
        assert_eq!(view.page().unwrap().offset, 10);
    }

    #[tokio::test]
    async fn test_cancelled_view_discards() {
        let view: PageView<Value, String> = PageView::new();
        view.cancel();

        let outcome = view
            .load(&orchestrator(), &PageQuery::new("events", 10))
            .await
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Cancelled);
        assert!(view.page().is_none());
        assert_eq!(view.applied_generation(), 0);
    }

    #[tokio::test]
    async fn test_latest_failure_keeps_previous_page() {
        let view: PageView<Value, String> = PageView::new();
        let orch = orchestrator();

        view.load(&orch, &PageQuery::new("events", 10)).await.unwrap();
        let err = view
            .load(&orch, &PageQuery::new("events", 10).offset(999))
            .await;
        assert!(matches!(err, Err(Error::Transport(_))));
        assert_eq!(view.applied_generation(), 1);
        assert!(view.with_page(|p| p.is_some()));
    }
}
