//! Test helpers for integration tests
//!
//! Builds `OdmStorage` instances over the available backends and records
//! the events they publish.

use std::sync::Arc;

use anyhow::{Context, Result};
use auth_cache::{CachedDocumentStore, MemoryQueryCache, RedisEventPublisher, RedisPool};
use auth_common::{DatabaseConfig, RedisConfig};
use auth_core::{DocumentStore, RecordingEventSink};
use auth_db::{create_pool, MemoryAttachmentStore, MemoryDocumentStore, PgDocumentStore, PoolConfig};
use auth_odm::OdmStorage;

/// Storage under test with the events it published
pub struct TestStorage {
    pub storage: OdmStorage,
    pub events: Arc<RecordingEventSink>,
}

impl TestStorage {
    /// In-memory store with indexes declared
    pub async fn memory() -> Result<Self> {
        Self::over(Arc::new(MemoryDocumentStore::new())).await
    }

    /// In-memory store behind the in-process finder cache
    pub async fn cached_memory() -> Result<Self> {
        let store = CachedDocumentStore::new(
            MemoryDocumentStore::new(),
            Arc::new(MemoryQueryCache::new()),
            60,
        );
        Self::over(Arc::new(store)).await
    }

    /// PostgreSQL store; `None` when DATABASE_URL is not set
    pub async fn postgres() -> Result<Option<Self>> {
        let Some(url) = env_var("DATABASE_URL") else {
            eprintln!("Skipping test: DATABASE_URL not set");
            return Ok(None);
        };

        let config = DatabaseConfig {
            url,
            max_connections: 5,
            min_connections: 1,
        };
        let pool = create_pool(&PoolConfig::from(&config))
            .await
            .context("failed to connect to PostgreSQL")?;
        let store = PgDocumentStore::new(pool);
        store.ensure_schema().await?;

        Self::over(Arc::new(store)).await.map(Some)
    }

    async fn over(store: Arc<dyn DocumentStore>) -> Result<Self> {
        let events = Arc::new(RecordingEventSink::new());
        let storage = OdmStorage::builder()
            .store(store)
            .attachments(Arc::new(MemoryAttachmentStore::new()))
            .events(events.clone())
            .build()?;
        storage.ensure_indexes().await?;

        Ok(Self { storage, events })
    }
}

/// Redis pool for publisher tests; `None` when REDIS_URL is not set
pub fn redis_publisher() -> Result<Option<RedisEventPublisher>> {
    let Some(url) = env_var("REDIS_URL") else {
        eprintln!("Skipping test: REDIS_URL not set");
        return Ok(None);
    };

    let pool = RedisPool::from_config(&RedisConfig {
        url,
        max_connections: 2,
    })?;
    Ok(Some(RedisEventPublisher::new(pool)))
}

fn env_var(name: &str) -> Option<String> {
    dotenvy::dotenv().ok();
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
