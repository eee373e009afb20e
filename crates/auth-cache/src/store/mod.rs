//! Caching decorator for document stores
//!
//! Reads go through the cache unless the query opts out with a zero TTL.
//! Every write advances the collection generation after the inner store
//! succeeds. Cache failures never fail a store call: reads fall through to
//! the inner store and a failed generation bump only leaves results stale
//! until their TTL runs out.

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use auth_core::{Document, DocumentStore, DomainError, Filter, IndexSpec, Query, RepoResult};

use crate::query_cache::QueryCache;

/// Document store serving repeated finder queries from a `QueryCache`
pub struct CachedDocumentStore<S> {
    inner: S,
    cache: Arc<dyn QueryCache>,
    default_ttl: u64,
}

impl<S: DocumentStore> CachedDocumentStore<S> {
    /// Wrap `inner`; queries without their own TTL are cached for `default_ttl` seconds
    pub fn new(inner: S, cache: Arc<dyn QueryCache>, default_ttl: u64) -> Self {
        Self {
            inner,
            cache,
            default_ttl,
        }
    }

    /// The wrapped store. Writes made through it do not invalidate the cache.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn ttl_for(&self, query: &Query) -> u64 {
        query.cache_ttl.unwrap_or(self.default_ttl)
    }

    fn cache_key(collection: &str, generation: u64, op: &str, query: &Query) -> RepoResult<String> {
        let encoded =
            serde_json::to_vec(query).map_err(|e| DomainError::InternalError(e.to_string()))?;
        let digest = Sha256::digest(&encoded);
        Ok(format!("{collection}:{generation}:{op}:{}", hex::encode(digest)))
    }

    /// Look up a cached value, returning the key to fill on a miss
    async fn lookup(
        &self,
        collection: &str,
        op: &str,
        query: &Query,
    ) -> RepoResult<(String, Option<Value>)> {
        let generation = self.cache.generation(collection).await?;
        let key = Self::cache_key(collection, generation, op, query)?;
        let cached = self.cache.get(&key).await?;
        Ok((key, cached))
    }

    async fn fill(&self, key: &str, value: &Value, ttl: u64) {
        if let Err(e) = self.cache.put(key, value, ttl).await {
            warn!(error = %e, "Failed to store finder result");
        }
    }

    async fn invalidate(&self, collection: &str) {
        match self.cache.bump_generation(collection).await {
            Ok(generation) => debug!(collection, generation, "Finder cache invalidated"),
            Err(e) => warn!(collection, error = %e, "Failed to invalidate finder cache"),
        }
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for CachedDocumentStore<S> {
    fn next_id(&self) -> String {
        self.inner.next_id()
    }

    async fn ensure_indexes(&self, collection: &str, indexes: &[IndexSpec]) -> RepoResult<()> {
        self.inner.ensure_indexes(collection, indexes).await?;
        self.invalidate(collection).await;
        Ok(())
    }

    async fn insert(&self, collection: &str, document: Document) -> RepoResult<()> {
        self.inner.insert(collection, document).await?;
        self.invalidate(collection).await;
        Ok(())
    }

    async fn replace(&self, collection: &str, document: Document) -> RepoResult<()> {
        self.inner.replace(collection, document).await?;
        self.invalidate(collection).await;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> RepoResult<bool> {
        let removed = self.inner.delete(collection, id).await?;
        if removed {
            self.invalidate(collection).await;
        }
        Ok(removed)
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> RepoResult<u64> {
        let removed = self.inner.delete_many(collection, filter).await?;
        if removed > 0 {
            self.invalidate(collection).await;
        }
        Ok(removed)
    }

    #[instrument(skip(self, query))]
    async fn find(&self, collection: &str, query: &Query) -> RepoResult<Vec<Document>> {
        let ttl = self.ttl_for(query);
        if ttl == 0 {
            return self.inner.find(collection, query).await;
        }

        let key = match self.lookup(collection, "find", query).await {
            Ok((_, Some(Value::Array(items)))) => {
                debug!("Finder cache hit");
                return Ok(items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(map) => Some(map),
                        _ => None,
                    })
                    .collect());
            }
            Ok((key, _)) => Some(key),
            Err(e) => {
                warn!(error = %e, "Finder cache unavailable");
                None
            }
        };

        let documents = self.inner.find(collection, query).await?;
        if let Some(key) = key {
            let value = Value::Array(documents.iter().cloned().map(Value::Object).collect());
            self.fill(&key, &value, ttl).await;
        }
        Ok(documents)
    }

    #[instrument(skip(self, query))]
    async fn count(&self, collection: &str, query: &Query) -> RepoResult<u64> {
        let ttl = self.ttl_for(query);
        if ttl == 0 {
            return self.inner.count(collection, query).await;
        }

        let key = match self.lookup(collection, "count", query).await {
            Ok((_, Some(cached))) if cached.is_u64() => {
                debug!("Finder cache hit");
                return Ok(cached.as_u64().unwrap_or_default());
            }
            Ok((key, _)) => Some(key),
            Err(e) => {
                warn!(error = %e, "Finder cache unavailable");
                None
            }
        };

        let count = self.inner.count(collection, query).await?;
        if let Some(key) = key {
            self.fill(&key, &Value::from(count), ttl).await;
        }
        Ok(count)
    }
}
