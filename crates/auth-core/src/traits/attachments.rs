//! Attachment store port - files owned by records (profile pictures)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::document_store::RepoResult;

/// A stored file reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub url: String,
    pub mime: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Register a file fetched from a remote URL
    async fn create_from_url(&self, url: &str) -> RepoResult<Attachment>;

    /// Get an attachment; not-found if missing
    async fn get(&self, id: &str) -> RepoResult<Attachment>;

    /// Delete an attachment; not-found if already gone
    async fn delete(&self, id: &str) -> RepoResult<()>;
}
