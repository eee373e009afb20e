//! Finder result caches
//!
//! Entries are keyed by collection generation, so bumping a collection's
//! generation orphans every cached result for it; orphans age out by TTL.

mod memory_cache;
mod redis_cache;

use async_trait::async_trait;
use serde_json::Value;

use auth_core::RepoResult;

pub use memory_cache::MemoryQueryCache;
pub use redis_cache::RedisQueryCache;

/// Storage for cached finder results
#[async_trait]
pub trait QueryCache: Send + Sync {
    /// Fetch a live entry
    async fn get(&self, key: &str) -> RepoResult<Option<Value>>;

    /// Store an entry for `ttl_seconds`
    async fn put(&self, key: &str, value: &Value, ttl_seconds: u64) -> RepoResult<()>;

    /// Current generation of a collection (zero if never written)
    async fn generation(&self, collection: &str) -> RepoResult<u64>;

    /// Advance a collection's generation, returning the new value
    async fn bump_generation(&self, collection: &str) -> RepoResult<u64>;
}
