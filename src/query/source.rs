//! Data source seam
//!
//! The orchestrator and the resolution cache only see [`DataSource`]: an
//! async `fetch(path, query) -> JSON` call. [`HttpDataSource`] implements it
//! over the REST API; tests substitute in-memory sources.

use crate::cache::EntityFetcher;
use crate::config::ApiConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Async JSON fetch against the backend
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Fetch `path?query`. `query` has no leading `?` and may be empty.
    async fn fetch(&self, path: &str, query: &str) -> Result<Value, TransportError>;
}

// ============================================================================
// HTTP
// ============================================================================

/// REST data source backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpDataSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDataSource {
    /// Create a source rooted at `base_url` (e.g. `http://host:5000/api/v1`)
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a source from API configuration
    pub fn from_config(config: &ApiConfig) -> Result<Self, TransportError> {
        Self::new(&config.base_url, Duration::from_millis(config.timeout_ms))
    }

    /// Base URL requests are resolved against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        }
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn fetch(&self, path: &str, query: &str) -> Result<Value, TransportError> {
        let url = self.url(path, query);
        tracing::debug!(url = %url, "GET");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

// ============================================================================
// Entity lookups
// ============================================================================

/// [`EntityFetcher`] that loads `/namespaces/{ns}/{collection}/{id}`
///
/// A missing entity is reported as `Ok(None)`.
pub struct ApiEntityFetcher<E> {
    source: Arc<dyn DataSource>,
    collection: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E> ApiEntityFetcher<E> {
    /// Create a fetcher for one collection, e.g. `tokens/pools`
    pub fn new(source: Arc<dyn DataSource>, collection: impl Into<String>) -> Self {
        Self {
            source,
            collection: collection.into().trim_matches('/').to_string(),
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<E> EntityFetcher<E> for ApiEntityFetcher<E>
where
    E: DeserializeOwned + Send + Sync + 'static,
{
    async fn fetch_entity(&self, namespace: &str, id: &str) -> Result<Option<E>, TransportError> {
        let path = format!("/namespaces/{}/{}/{}", namespace, self.collection, id);
        match self.source.fetch(&path, "").await {
            Ok(body) => serde_json::from_value(body)
                .map(Some)
                .map_err(|e| TransportError::Decode(format!("{path}: {e}"))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
