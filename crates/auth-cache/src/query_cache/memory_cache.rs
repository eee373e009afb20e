use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use auth_core::RepoResult;

use super::QueryCache;

/// Process-local query cache
#[derive(Debug, Default)]
pub struct MemoryQueryCache {
    entries: Mutex<HashMap<String, (Value, Instant)>>,
    generations: Mutex<HashMap<String, u64>>,
}

impl MemoryQueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl QueryCache for MemoryQueryCache {
    async fn get(&self, key: &str) -> RepoResult<Option<Value>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &Value, ttl_seconds: u64) -> RepoResult<()> {
        let expires = Instant::now() + Duration::from_secs(ttl_seconds);
        self.entries
            .lock()
            .insert(key.to_string(), (value.clone(), expires));
        Ok(())
    }

    async fn generation(&self, collection: &str) -> RepoResult<u64> {
        Ok(self
            .generations
            .lock()
            .get(collection)
            .copied()
            .unwrap_or(0))
    }

    async fn bump_generation(&self, collection: &str) -> RepoResult<u64> {
        let mut generations = self.generations.lock();
        let generation = generations.entry(collection.to_string()).or_insert(0);
        *generation += 1;
        Ok(*generation)
    }
}
