//! Reference Resolution Cache
//!
//! Resolves ids embedded in other records (a pool id on a transfer, say) to
//! the full entity, fetching each id at most once per cache instance.
//!
//! # State machine
//!
//! ```text
//!            resolve()              fetch ok
//!   Absent ──────────────▶ Pending ──────────▶ Resolved
//!                             │
//!                             │ fetch failed / not found
//!                             ▼
//!                           Failed
//! ```
//!
//! `Resolved` and `Failed` are terminal until [`ResolutionCache::invalidate`]
//! removes the entry. Callers arriving while a key is `Pending` are queued as
//! waiters and receive the same outcome as the caller that started the fetch.
//!
//! The upstream fetch runs on a spawned task, so a caller dropping its
//! `resolve` future never strands other waiters. If the task dies before
//! publishing, the key is recorded as `Failed`.

use crate::error::TransportError;
use crate::metrics;
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

// ============================================================================
// Fetcher seam
// ============================================================================

/// Single-entity lookup used to populate the cache
#[async_trait]
pub trait EntityFetcher<E>: Send + Sync + 'static {
    /// Fetch one entity. `Ok(None)` means the entity does not exist.
    async fn fetch_entity(&self, namespace: &str, id: &str) -> Result<Option<E>, TransportError>;
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for a resolution cache
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Maximum number of terminal entries kept (None = unbounded)
    ///
    /// When exceeded, the least recently read `Resolved`/`Failed` entry is
    /// evicted. Pending entries are never evicted.
    pub max_entries: Option<usize>,
}

impl CacheConfig {
    /// Bound the number of retained entries
    pub fn with_max_entries(mut self, entries: usize) -> Self {
        self.max_entries = Some(entries.max(1));
        self
    }
}

// ============================================================================
// Entries
// ============================================================================

/// Observable state of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Fetch in flight
    Pending,
    /// Entity available
    Resolved,
    /// Fetch failed or entity absent
    Failed,
}

enum Slot<E> {
    Pending {
        waiters: Vec<oneshot::Sender<Option<E>>>,
    },
    Resolved {
        value: E,
        last_accessed: u64,
    },
    Failed {
        last_accessed: u64,
    },
}

impl<E> Slot<E> {
    fn state(&self) -> EntryState {
        match self {
            Slot::Pending { .. } => EntryState::Pending,
            Slot::Resolved { .. } => EntryState::Resolved,
            Slot::Failed { .. } => EntryState::Failed,
        }
    }

    fn last_accessed(&self) -> Option<u64> {
        match self {
            Slot::Pending { .. } => None,
            Slot::Resolved { last_accessed, .. } | Slot::Failed { last_accessed } => {
                Some(*last_accessed)
            }
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups answered from a terminal entry
    pub hits: AtomicU64,

    /// Lookups that attached to an in-flight fetch
    pub coalesced: AtomicU64,

    /// Lookups that started a fetch
    pub misses: AtomicU64,

    /// Fetches that ended in `Failed`
    pub failures: AtomicU64,

    /// Terminal entries evicted by the capacity bound
    pub evictions: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    /// Lookups answered from a terminal entry
    pub hits: u64,
    /// Lookups that attached to an in-flight fetch
    pub coalesced: u64,
    /// Lookups that started a fetch (equals upstream fetches issued)
    pub misses: u64,
    /// Fetches that ended in `Failed`
    pub failures: u64,
    /// Terminal entries evicted
    pub evictions: u64,
}

impl CacheStats {
    fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Cache
// ============================================================================

struct Inner<E> {
    namespace: String,
    config: CacheConfig,
    fetcher: Arc<dyn EntityFetcher<E>>,
    entries: Mutex<HashMap<String, Slot<E>>>,
    /// Logical clock for LRU ordering
    clock: AtomicU64,
    stats: CacheStats,
}

impl<E: Clone + Send + Sync + 'static> Inner<E> {
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Move a pending key to its terminal state and wake its waiters
    fn publish(&self, id: &str, value: Option<E>) {
        let waiters = {
            let mut entries = self.entries.lock();
            let waiters = match entries.remove(id) {
                Some(Slot::Pending { waiters }) => waiters,
                Some(other) => {
                    // Already terminal; keep the first outcome.
                    entries.insert(id.to_string(), other);
                    return;
                }
                None => Vec::new(),
            };

            let last_accessed = self.tick();
            let slot = match &value {
                Some(v) => Slot::Resolved {
                    value: v.clone(),
                    last_accessed,
                },
                None => {
                    self.stats.failures.fetch_add(1, Ordering::Relaxed);
                    Slot::Failed { last_accessed }
                }
            };
            entries.insert(id.to_string(), slot);
            self.enforce_capacity(&mut entries);
            waiters
        };

        tracing::trace!(
            namespace = %self.namespace,
            id,
            waiters = waiters.len(),
            resolved = value.is_some(),
            "Publishing resolution"
        );

        for tx in waiters {
            // Receiver gone means that caller was cancelled.
            let _ = tx.send(value.clone());
        }
    }

    fn enforce_capacity(&self, entries: &mut HashMap<String, Slot<E>>) {
        let Some(max) = self.config.max_entries else {
            return;
        };

        while entries.len() > max {
            let lru_key = entries
                .iter()
                .filter_map(|(k, slot)| slot.last_accessed().map(|t| (t, k)))
                .min_by_key(|(t, _)| *t)
                .map(|(_, k)| k.clone());

            match lru_key {
                Some(key) => {
                    entries.remove(&key);
                    self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(namespace = %self.namespace, id = %key, "Evicted resolution entry");
                }
                // Only pending entries left
                None => break,
            }
        }
    }
}

/// Publishes a failure if the fetch task ends without publishing
struct PublishOnDrop<E: Clone + Send + Sync + 'static> {
    inner: Arc<Inner<E>>,
    id: String,
    published: bool,
}

impl<E: Clone + Send + Sync + 'static> Drop for PublishOnDrop<E> {
    fn drop(&mut self) {
        if !self.published {
            tracing::warn!(
                namespace = %self.inner.namespace,
                id = %self.id,
                "Resolution task ended without a result"
            );
            metrics::record_resolution_fetch(&self.inner.namespace, "aborted");
            self.inner.publish(&self.id, None);
        }
    }
}

/// Namespace-scoped memoizing resolver with in-flight coalescing
///
/// Cloning is cheap and clones share state. Must be used from within a Tokio
/// runtime, since fetches are spawned.
pub struct ResolutionCache<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for ResolutionCache<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Clone + Send + Sync + 'static> ResolutionCache<E> {
    /// Create an unbounded cache for one namespace
    pub fn new(namespace: impl Into<String>, fetcher: Arc<dyn EntityFetcher<E>>) -> Self {
        Self::with_config(namespace, fetcher, CacheConfig::default())
    }

    /// Create a cache with explicit configuration
    pub fn with_config(
        namespace: impl Into<String>,
        fetcher: Arc<dyn EntityFetcher<E>>,
        config: CacheConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                namespace: namespace.into(),
                config,
                fetcher,
                entries: Mutex::new(HashMap::new()),
                clock: AtomicU64::new(0),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Namespace this cache serves
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Resolve an id, fetching it only if no entry exists
    ///
    /// Returns `None` when the fetch failed or the entity does not exist;
    /// callers should fall back to displaying the raw id.
    pub async fn resolve(&self, id: &str) -> Option<E> {
        let namespace = self.inner.namespace.as_str();

        let rx = {
            let mut entries = self.inner.entries.lock();
            match entries.get_mut(id) {
                Some(Slot::Resolved {
                    value,
                    last_accessed,
                }) => {
                    *last_accessed = self.inner.tick();
                    self.inner.stats.hits.fetch_add(1, Ordering::Relaxed);
                    metrics::record_lookup(namespace, "hit");
                    return Some(value.clone());
                }
                Some(Slot::Failed { last_accessed }) => {
                    *last_accessed = self.inner.tick();
                    self.inner.stats.hits.fetch_add(1, Ordering::Relaxed);
                    metrics::record_lookup(namespace, "hit");
                    return None;
                }
                Some(Slot::Pending { waiters }) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    self.inner.stats.coalesced.fetch_add(1, Ordering::Relaxed);
                    metrics::record_lookup(namespace, "coalesced");
                    rx
                }
                None => {
                    let (tx, rx) = oneshot::channel();
                    entries.insert(id.to_string(), Slot::Pending { waiters: vec![tx] });
                    self.inner.stats.misses.fetch_add(1, Ordering::Relaxed);
                    metrics::record_lookup(namespace, "miss");
                    self.spawn_fetch(id.to_string());
                    rx
                }
            }
        };

        rx.await.unwrap_or(None)
    }

    /// Resolve many ids, fetching each distinct id at most once
    pub async fn resolve_all<'a, I>(&self, ids: I) -> HashMap<String, Option<E>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = HashSet::new();
        let distinct: Vec<&str> = ids.into_iter().filter(|id| seen.insert(*id)).collect();

        let resolved = join_all(distinct.iter().map(|id| self.resolve(id))).await;

        distinct
            .into_iter()
            .map(str::to_string)
            .zip(resolved)
            .collect()
    }

    fn spawn_fetch(&self, id: String) {
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            let mut guard = PublishOnDrop {
                inner,
                id,
                published: false,
            };
            let namespace = guard.inner.namespace.as_str();

            tracing::debug!(namespace, id = %guard.id, "Fetching referenced entity");

            let value = match guard.inner.fetcher.fetch_entity(namespace, &guard.id).await {
                Ok(Some(value)) => {
                    metrics::record_resolution_fetch(namespace, "resolved");
                    Some(value)
                }
                Ok(None) => {
                    metrics::record_resolution_fetch(namespace, "not_found");
                    None
                }
                Err(e) if e.is_not_found() => {
                    metrics::record_resolution_fetch(namespace, "not_found");
                    None
                }
                Err(e) => {
                    tracing::warn!(namespace, id = %guard.id, error = %e, "Reference resolution failed");
                    metrics::record_resolution_fetch(namespace, "error");
                    None
                }
            };

            guard.inner.publish(&guard.id, value);
            guard.published = true;
        });
    }

    /// Resolved value for an id without fetching
    pub fn get(&self, id: &str) -> Option<E> {
        match self.inner.entries.lock().get(id) {
            Some(Slot::Resolved { value, .. }) => Some(value.clone()),
            _ => None,
        }
    }

    /// Current state of an id (None = absent)
    pub fn state(&self, id: &str) -> Option<EntryState> {
        self.inner.entries.lock().get(id).map(Slot::state)
    }

    /// Copy of every resolved entity keyed by id
    pub fn snapshot(&self) -> HashMap<String, E> {
        self.inner
            .entries
            .lock()
            .iter()
            .filter_map(|(id, slot)| match slot {
                Slot::Resolved { value, .. } => Some((id.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Drop a terminal entry so the next `resolve` fetches again
    ///
    /// Returns false if the id is absent or still pending.
    pub fn invalidate(&self, id: &str) -> bool {
        let mut entries = self.inner.entries.lock();
        match entries.get(id) {
            Some(Slot::Resolved { .. }) | Some(Slot::Failed { .. }) => {
                entries.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Drop every terminal entry; in-flight fetches are kept
    pub fn clear(&self) {
        self.inner
            .entries
            .lock()
            .retain(|_, slot| matches!(slot, Slot::Pending { .. }));
    }

    /// Number of entries in any state
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// True if the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    /// Statistics snapshot
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.inner.stats.snapshot()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Fetcher that counts calls and waits for a release signal
    struct GatedFetcher {
        calls: AtomicUsize,
        release: Notify,
        gated: bool,
    }

    impl GatedFetcher {
        fn new(gated: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                release: Notify::new(),
                gated,
            })
        }
    }

    #[async_trait]
    impl EntityFetcher<String> for GatedFetcher {
        async fn fetch_entity(
            &self,
            namespace: &str,
            id: &str,
        ) -> Result<Option<String>, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.gated {
                self.release.notified().await;
            }
            match id {
                "missing" => Ok(None),
                "broken" => Err(TransportError::Connection("reset".into())),
                _ => Ok(Some(format!("{namespace}/{id}"))),
            }
        }
    }

    #[tokio::test]
    async fn test_resolve_and_hit() {
        let fetcher = GatedFetcher::new(false);
        let cache = ResolutionCache::<String>::new("ns1", fetcher.clone());

        assert_eq!(cache.resolve("pool-a").await, Some("ns1/pool-a".to_string()));
        assert_eq!(cache.resolve("pool-a").await, Some("ns1/pool-a".to_string()));

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.state("pool-a"), Some(EntryState::Resolved));
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let fetcher = GatedFetcher::new(true);
        let cache = ResolutionCache::<String>::new("ns1", fetcher.clone());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.resolve("pool-a").await })
            })
            .collect();

        // Wait until the fetch is in flight and every caller is queued
        while fetcher.calls.load(Ordering::SeqCst) == 0 || cache.stats().coalesced < 15 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert_eq!(cache.state("pool-a"), Some(EntryState::Pending));
        fetcher.release.notify_one();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Some("ns1/pool-a".to_string()));
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_terminal() {
        let fetcher = GatedFetcher::new(false);
        let cache = ResolutionCache::<String>::new("ns1", fetcher.clone());

        assert_eq!(cache.resolve("broken").await, None);
        assert_eq!(cache.resolve("broken").await, None);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.state("broken"), Some(EntryState::Failed));
        assert_eq!(cache.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_not_found_resolves_to_none() {
        let fetcher = GatedFetcher::new(false);
        let cache = ResolutionCache::<String>::new("ns1", fetcher);

        assert_eq!(cache.resolve("missing").await, None);
        assert_eq!(cache.state("missing"), Some(EntryState::Failed));
    }

    #[tokio::test]
    async fn test_invalidate_allows_refetch() {
        let fetcher = GatedFetcher::new(false);
        let cache = ResolutionCache::<String>::new("ns1", fetcher.clone());

        cache.resolve("broken").await;
        assert!(cache.invalidate("broken"));
        assert_eq!(cache.state("broken"), None);
        cache.resolve("broken").await;

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert!(!cache.invalidate("never-seen"));
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_strand_waiters() {
        let fetcher = GatedFetcher::new(true);
        let cache = ResolutionCache::<String>::new("ns1", fetcher.clone());

        let first = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.resolve("pool-a").await })
        };
        while fetcher.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let second = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.resolve("pool-a").await })
        };
        while cache.stats().coalesced == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        first.abort();
        fetcher.release.notify_one();

        assert_eq!(second.await.unwrap(), Some("ns1/pool-a".to_string()));
        assert_eq!(cache.get("pool-a"), Some("ns1/pool-a".to_string()));
    }

    #[tokio::test]
    async fn test_resolve_all_dedupes() {
        let fetcher = GatedFetcher::new(false);
        let cache = ResolutionCache::<String>::new("ns1", fetcher.clone());

        let resolved = cache.resolve_all(["a", "b", "a", "missing", "b"]).await;

        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved["a"], Some("ns1/a".to_string()));
        assert_eq!(resolved["missing"], None);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_snapshot_contains_only_resolved() {
        let fetcher = GatedFetcher::new(false);
        let cache = ResolutionCache::<String>::new("ns1", fetcher);

        cache.resolve_all(["a", "broken"]).await;
        let snapshot = cache.snapshot();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("a"), Some(&"ns1/a".to_string()));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_read() {
        let fetcher = GatedFetcher::new(false);
        let cache = ResolutionCache::<String>::with_config(
            "ns1",
            fetcher.clone(),
            CacheConfig::default().with_max_entries(2),
        );

        cache.resolve("a").await;
        cache.resolve("b").await;
        // Touch "a" so "b" becomes the eviction candidate
        cache.resolve("a").await;
        cache.resolve("c").await;

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.state("b"), None);
        assert_eq!(cache.state("a"), Some(EntryState::Resolved));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_clear_keeps_pending() {
        let fetcher = GatedFetcher::new(true);
        let cache = ResolutionCache::<String>::new("ns1", fetcher.clone());

        let pending = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.resolve("slow").await })
        };
        while fetcher.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        cache.clear();
        assert_eq!(cache.state("slow"), Some(EntryState::Pending));

        fetcher.release.notify_one();
        assert_eq!(pending.await.unwrap(), Some("ns1/slow".to_string()));
    }

    /// Fetcher whose task dies mid-fetch
    struct PanickingFetcher {
        release: Notify,
    }

    #[async_trait]
    impl EntityFetcher<String> for PanickingFetcher {
        async fn fetch_entity(
            &self,
            _namespace: &str,
            _id: &str,
        ) -> Result<Option<String>, TransportError> {
            self.release.notified().await;
            panic!("fetch task died");
        }
    }

    #[tokio::test]
    async fn test_dead_fetch_task_fails_every_waiter() {
        let fetcher = Arc::new(PanickingFetcher {
            release: Notify::new(),
        });
        let cache = ResolutionCache::<String>::new("ns1", fetcher.clone());

        let first = tokio::spawn({
            let cache = cache.clone();
            async move { cache.resolve("pool-x").await }
        });
        let second = tokio::spawn({
            let cache = cache.clone();
            async move { cache.resolve("pool-x").await }
        });
        while cache.stats().coalesced < 1 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        fetcher.release.notify_one();

        let results = tokio::time::timeout(Duration::from_secs(5), async {
            (first.await.unwrap(), second.await.unwrap())
        })
        .await
        .unwrap();
        assert_eq!(results, (None, None));
        assert_eq!(cache.state("pool-x"), Some(EntryState::Failed));
        assert_eq!(cache.resolve("pool-x").await, None);
    }
}
