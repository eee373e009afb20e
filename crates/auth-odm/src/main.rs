//! Identity store provisioning
//!
//! Run with:
//! ```bash
//! cargo run -p auth-odm
//! ```
//!
//! Connects to the configured document store, declares the model indexes
//! and creates the default roles that are missing. Configuration is loaded
//! from environment variables.

use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info};

use auth_cache::{CachedDocumentStore, RedisEventPublisher, RedisPool, RedisQueryCache};
use auth_common::{try_init_tracing_with_config, AppConfig, StorageBackend, TracingConfig};
use auth_core::{DocumentStore, DomainError, EventSink, NoopEventSink};
use auth_db::{create_pool, MemoryDocumentStore, PgDocumentStore, PoolConfig};
use auth_odm::{OdmStorage, RoleLookup, StorageDriver};

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = try_init_tracing_with_config(&TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(error = %format!("{e:#}"), "Provisioning failed");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    info!(
        app = %config.app.name,
        env = ?config.app.env,
        storage = ?config.storage,
        cache = config.redis.is_some(),
        "Starting identity store provisioning"
    );

    let redis = config
        .redis
        .as_ref()
        .map(RedisPool::from_config)
        .transpose()
        .context("failed to create Redis pool")?;
    if let Some(pool) = &redis {
        pool.ping().await.context("Redis is not reachable")?;
    }

    let store = match config.storage {
        StorageBackend::Memory => {
            with_cache(MemoryDocumentStore::new(), redis.clone(), &config)
        }
        StorageBackend::Postgres => {
            let database = config
                .database
                .as_ref()
                .context("postgres storage needs DATABASE_URL")?;
            let pool = create_pool(&PoolConfig::from(database))
                .await
                .context("failed to connect to PostgreSQL")?;
            let store = PgDocumentStore::new(pool);
            store.ensure_schema().await?;
            with_cache(store, redis.clone(), &config)
        }
    };

    let events: Arc<dyn EventSink> = match redis {
        Some(pool) => Arc::new(RedisEventPublisher::new(pool)),
        None => Arc::new(NoopEventSink),
    };

    let storage = OdmStorage::builder()
        .store(store)
        .events(events)
        .settings(config.auth.clone())
        .build()?;
    storage.ensure_indexes().await?;

    let mut created = 0;
    for name in &config.auth.default_roles {
        match storage.get_role(RoleLookup::by_name(name.as_str())).await {
            Ok(_) => {}
            Err(DomainError::RoleNotFound(_)) => {
                storage.create_role(name, "").await?;
                created += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        driver = storage.name(),
        roles = config.auth.default_roles.len(),
        created,
        "Identity store ready"
    );
    Ok(())
}

/// Wrap `store` with the finder cache when Redis is configured
fn with_cache<S>(store: S, redis: Option<RedisPool>, config: &AppConfig) -> Arc<dyn DocumentStore>
where
    S: DocumentStore + 'static,
{
    match redis {
        Some(pool) => Arc::new(CachedDocumentStore::new(
            store,
            Arc::new(RedisQueryCache::new(pool)),
            config.auth.finder_cache_ttl,
        )),
        None => Arc::new(store),
    }
}
