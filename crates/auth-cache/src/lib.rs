//! # auth-cache
//!
//! Redis layer for the identity store.
//!
//! ## Features
//!
//! - **Connection Pool**: Managed Redis connection pool with deadpool
//! - **Finder Cache**: `CachedDocumentStore` decorates any `DocumentStore`,
//!   serving repeated finder queries from a `QueryCache`
//! - **Pub/Sub**: Domain events published on the `auth:events` channel
//!
//! ## Example
//!
//! ```ignore
//! use auth_cache::{CachedDocumentStore, RedisPool, RedisPoolConfig, RedisQueryCache};
//!
//! let pool = RedisPool::new(RedisPoolConfig::default())?;
//! let cache = Arc::new(RedisQueryCache::new(pool.clone()));
//! let store = CachedDocumentStore::new(PgDocumentStore::new(pg), cache, 60);
//!
//! // Served from Redis until the collection is written to or the TTL runs out
//! let admins = store.find("users", &Query::new(Filter::eq("roles", "role:admin"))).await?;
//! ```

pub mod pool;
pub mod pubsub;
pub mod query_cache;
pub mod store;

pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult};

pub use pubsub::{RedisEventPublisher, EVENTS_CHANNEL};

pub use query_cache::{MemoryQueryCache, QueryCache, RedisQueryCache};

pub use store::CachedDocumentStore;
