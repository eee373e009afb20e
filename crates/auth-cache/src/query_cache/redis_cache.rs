use async_trait::async_trait;
use serde_json::Value;

use auth_core::RepoResult;

use super::QueryCache;
use crate::pool::RedisPool;

const KEY_PREFIX: &str = "auth:cache";

/// Query cache shared by every process pointing at the same Redis
#[derive(Debug, Clone)]
pub struct RedisQueryCache {
    pool: RedisPool,
}

impl RedisQueryCache {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    fn entry_key(key: &str) -> String {
        format!("{KEY_PREFIX}:entry:{key}")
    }

    fn generation_key(collection: &str) -> String {
        format!("{KEY_PREFIX}:generation:{collection}")
    }
}

#[async_trait]
impl QueryCache for RedisQueryCache {
    async fn get(&self, key: &str) -> RepoResult<Option<Value>> {
        Ok(self.pool.get_json(&Self::entry_key(key)).await?)
    }

    async fn put(&self, key: &str, value: &Value, ttl_seconds: u64) -> RepoResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }
        self.pool
            .put_json(&Self::entry_key(key), value, ttl_seconds)
            .await?;
        Ok(())
    }

    async fn generation(&self, collection: &str) -> RepoResult<u64> {
        Ok(self.pool.counter(&Self::generation_key(collection)).await?)
    }

    async fn bump_generation(&self, collection: &str) -> RepoResult<u64> {
        Ok(self.pool.incr(&Self::generation_key(collection)).await?)
    }
}
