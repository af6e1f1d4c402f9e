//! Caching layer for GraphQL responses.
//!
//! Scenario runs over overlapping areas repeat the same feed, route and
//! departure queries. Responses are cached by the exact document and
//! variables, so only byte-identical queries share an entry.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use serde_json::Value;
use tracing::trace;

use super::client::QueryClient;
use super::error::QueryError;

/// Cache key: (document, serialized variables).
type QueryKey = (String, String);

/// Configuration for the response cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached entries.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            max_capacity: 1000,
        }
    }
}

/// Query client with caching.
///
/// Wraps any [`QueryClient`] and caches successful responses. Errors are
/// never cached.
pub struct CachedQueryClient<C> {
    client: C,
    responses: MokaCache<QueryKey, Value>,
}

impl<C> CachedQueryClient<C> {
    /// Create a new cached client.
    pub fn new(client: C, config: &CacheConfig) -> Self {
        let responses = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();

        Self { client, responses }
    }

    /// Access the underlying client for operations that bypass cache.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Get cache statistics.
    pub fn cache_entry_count(&self) -> u64 {
        self.responses.entry_count()
    }

    /// Invalidate all cached entries.
    pub fn invalidate_cache(&self) {
        self.responses.invalidate_all();
    }
}

#[async_trait]
impl<C: QueryClient> QueryClient for CachedQueryClient<C> {
    async fn query(&self, document: &str, variables: Value) -> Result<Value, QueryError> {
        let key = (document.to_string(), variables.to_string());

        // Try cache first
        if let Some(cached) = self.responses.get(&key).await {
            trace!("Query cache hit");
            return Ok(cached);
        }

        let data = self.client.query(document, variables).await?;
        self.responses.insert(key, data.clone()).await;

        Ok(data)
    }
}
