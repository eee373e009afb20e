//! Attachment stores
//!
//! Attachments are registered by URL; fetching and storing the bytes is the
//! job of the file service sitting behind the URL.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use auth_core::{
    Attachment, AttachmentStore, DocumentStore, DomainError, Filter, ObjectIdGenerator, Query,
    RepoResult, ID_FIELD,
};

/// Collection used by `DocumentAttachmentStore`
pub const ATTACHMENTS_COLLECTION: &str = "attachments";

fn guess_mime(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    if path.contains("gravatar.com/avatar/") || path.ends_with(".jpg") || path.ends_with(".jpeg") {
        "image/jpeg"
    } else if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".gif") {
        "image/gif"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}

fn attachment_not_found(id: &str) -> DomainError {
    DomainError::not_found("Attachment", id)
}

/// Process-local attachment store
#[derive(Default)]
pub struct MemoryAttachmentStore {
    ids: ObjectIdGenerator,
    attachments: Mutex<HashMap<String, Attachment>>,
}

impl MemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.attachments.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AttachmentStore for MemoryAttachmentStore {
    #[instrument(skip(self))]
    async fn create_from_url(&self, url: &str) -> RepoResult<Attachment> {
        let attachment = Attachment {
            id: self.ids.generate().to_string(),
            url: url.to_string(),
            mime: guess_mime(url).to_string(),
            created_at: Utc::now(),
        };
        self.attachments
            .lock()
            .insert(attachment.id.clone(), attachment.clone());
        Ok(attachment)
    }

    async fn get(&self, id: &str) -> RepoResult<Attachment> {
        self.attachments
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| attachment_not_found(id))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> RepoResult<()> {
        self.attachments
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| attachment_not_found(id))
    }
}

/// Attachment records kept in a document store collection
#[derive(Clone)]
pub struct DocumentAttachmentStore {
    store: Arc<dyn DocumentStore>,
}

impl DocumentAttachmentStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AttachmentStore for DocumentAttachmentStore {
    #[instrument(skip(self))]
    async fn create_from_url(&self, url: &str) -> RepoResult<Attachment> {
        let attachment = Attachment {
            id: self.store.next_id(),
            url: url.to_string(),
            mime: guess_mime(url).to_string(),
            created_at: Utc::now(),
        };

        let mut document = match serde_json::to_value(&attachment) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(DomainError::InternalError("attachment is not an object".into())),
            Err(e) => return Err(DomainError::InternalError(e.to_string())),
        };
        document.insert(ID_FIELD.to_string(), Value::String(attachment.id.clone()));

        self.store.insert(ATTACHMENTS_COLLECTION, document).await?;
        Ok(attachment)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> RepoResult<Attachment> {
        let query = Query::new(Filter::eq(ID_FIELD, id)).no_cache();
        let document = self
            .store
            .find_one(ATTACHMENTS_COLLECTION, &query)
            .await?
            .ok_or_else(|| attachment_not_found(id))?;

        serde_json::from_value(Value::Object(document))
            .map_err(|e| DomainError::InternalError(format!("corrupt attachment record: {e}")))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> RepoResult<()> {
        if self.store.delete(ATTACHMENTS_COLLECTION, id).await? {
            Ok(())
        } else {
            Err(attachment_not_found(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryDocumentStore;

    #[test]
    fn test_guess_mime() {
        assert_eq!(
            guess_mime("https://www.gravatar.com/avatar/abc?s=512"),
            "image/jpeg"
        );
        assert_eq!(guess_mime("https://cdn.example.com/a.PNG"), "image/png");
        assert_eq!(guess_mime("https://cdn.example.com/a"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_memory_store_delete_twice_is_not_found() {
        let store = MemoryAttachmentStore::new();
        let a = store.create_from_url("https://x/a.png").await.unwrap();
        assert_eq!(store.get(&a.id).await.unwrap(), a);

        store.delete(&a.id).await.unwrap();
        assert!(store.delete(&a.id).await.unwrap_err().is_not_found());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_document_store_round_trip() {
        let docs: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let store = DocumentAttachmentStore::new(Arc::clone(&docs));

        let a = store.create_from_url("https://x/a.jpg").await.unwrap();
        let loaded = store.get(&a.id).await.unwrap();
        assert_eq!(loaded.url, "https://x/a.jpg");
        assert_eq!(loaded.mime, "image/jpeg");

        store.delete(&a.id).await.unwrap();
        assert!(store.get(&a.id).await.unwrap_err().is_not_found());
        assert!(store.delete(&a.id).await.unwrap_err().is_not_found());
    }
}
