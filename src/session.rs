//! Namespace session wiring
//!
//! A session owns the data source and the namespace's pool resolution cache.
//! Orchestrators handed out by the same session share that cache; switching
//! namespace means building a new session.

use crate::cache::{CacheConfig, ResolutionCache};
use crate::config::Config;
use crate::error::Result;
use crate::models::TokenPool;
use crate::query::{ApiEntityFetcher, DataSource, HttpDataSource, PageOrchestrator};
use crate::types::EntityKind;
use std::sync::Arc;

/// Data source and caches for one namespace
pub struct Session {
    namespace: String,
    source: Arc<dyn DataSource>,
    pools: ResolutionCache<TokenPool>,
    max_page_size: usize,
}

impl Session {
    /// Build a session over the configured REST API
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let source: Arc<dyn DataSource> = Arc::new(HttpDataSource::from_config(&config.api)?);
        Ok(Self::with_source(config, source))
    }

    /// Build a session over an arbitrary data source
    pub fn with_source(config: &Config, source: Arc<dyn DataSource>) -> Self {
        let namespace = config.session.namespace.clone();
        let cache_config = CacheConfig {
            max_entries: config.cache.max_entries,
        };
        let fetcher = Arc::new(ApiEntityFetcher::<TokenPool>::new(
            Arc::clone(&source),
            EntityKind::TokenPools.path(),
        ));
        let pools = ResolutionCache::<TokenPool>::with_config(namespace.clone(), fetcher, cache_config);

        tracing::info!(
            namespace = %namespace,
            max_cached_pools = ?config.cache.max_entries,
            "Session created"
        );

        Self {
            namespace,
            source,
            pools,
            max_page_size: config.session.max_page_size,
        }
    }

    /// Namespace this session is scoped to
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Shared pool cache
    pub fn pools(&self) -> &ResolutionCache<TokenPool> {
        &self.pools
    }

    /// Orchestrator enriching rows with token pools
    pub fn pool_orchestrator(&self) -> PageOrchestrator<TokenPool> {
        PageOrchestrator::new(self.namespace.clone(), Arc::clone(&self.source))
            .with_cache(self.pools.clone())
            .with_max_page_size(self.max_page_size)
    }

    /// Orchestrator without enrichment
    pub fn orchestrator<E: Clone + Send + Sync + 'static>(&self) -> PageOrchestrator<E> {
        PageOrchestrator::new(self.namespace.clone(), Arc::clone(&self.source))
            .with_max_page_size(self.max_page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::models::TokenTransfer;
    use crate::query::{CancellationToken, PageQuery};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    #[derive(Default)]
    struct FakeApi {
        paths: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DataSource for FakeApi {
        async fn fetch(
            &self,
            path: &str,
            _query: &str,
        ) -> std::result::Result<Value, TransportError> {
            self.paths.lock().push(path.to_string());
            if path.ends_with("/tokens/transfers") {
                return Ok(json!({
                    "items": [
                        {"localId": "t1", "type": "mint", "pool": "p1", "amount": "5"},
                        {"localId": "t2", "type": "burn", "pool": "p1", "amount": "2"},
                    ],
                    "total": 2,
                }));
            }
            if path.ends_with("/tokens/pools/p1") {
                return Ok(json!({"id": "p1", "name": "Gold", "decimals": 18}));
            }
            Err(TransportError::NotFound(path.to_string()))
        }
    }

    #[tokio::test]
    async fn test_orchestrators_share_pool_cache() {
        let mut config = Config::default();
        config.session.namespace = "ns9".into();
        let api = Arc::new(FakeApi::default());
        let session = Session::with_source(&config, api.clone());

        let query = PageQuery::new(EntityKind::TokenTransfers.path(), 10);
        for _ in 0..2 {
            let page = session
                .pool_orchestrator()
                .fetch_page::<TokenTransfer>(&query, &CancellationToken::new())
                .await
                .unwrap();
            assert!(page.rows.iter().all(|row| {
                row.reference.as_ref().and_then(|r| r.resolved()).map(|p| p.name.as_str())
                    == Some("Gold")
            }));
        }

        let pool_lookups = api
            .paths
            .lock()
            .iter()
            .filter(|p| p.as_str() == "/namespaces/ns9/tokens/pools/p1")
            .count();
        assert_eq!(pool_lookups, 1);
        assert_eq!(session.pools().len(), 1);
    }
}
