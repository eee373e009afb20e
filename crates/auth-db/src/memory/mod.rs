//! In-memory document store
//!
//! Keeps collections in insertion order behind a `parking_lot` lock. Unique
//! indexes are enforced on insert and replace; a document whose indexed
//! fields are all missing is not constrained.

mod matcher;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, instrument};

use auth_core::{
    Document, DocumentStore, DomainError, Filter, IndexSpec, ObjectIdGenerator, Query, RepoResult,
    ID_FIELD,
};

#[derive(Default)]
struct Collection {
    documents: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

impl Collection {
    fn text_fields(&self) -> Vec<String> {
        self.indexes
            .iter()
            .filter(|idx| idx.is_text())
            .flat_map(|idx| idx.field_names().map(String::from))
            .collect()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.documents
            .iter()
            .position(|doc| document_id(doc).is_some_and(|doc_id| doc_id == id))
    }

    /// Reject `candidate` if it collides with another document on a unique index
    fn check_unique(&self, name: &str, candidate: &Document, id: &str) -> RepoResult<()> {
        for index in self.indexes.iter().filter(|idx| idx.unique) {
            let key: Vec<Option<&Value>> = index
                .field_names()
                .map(|path| matcher::field(candidate, path).filter(|v| !v.is_null()))
                .collect();
            if key.iter().all(Option::is_none) {
                continue;
            }

            let collides = self.documents.iter().any(|doc| {
                document_id(doc) != Some(id)
                    && index
                        .field_names()
                        .map(|path| matcher::field(doc, path).filter(|v| !v.is_null()))
                        .eq(key.iter().copied())
            });

            if collides {
                return Err(DomainError::DuplicateKey {
                    collection: name.to_string(),
                    index: index.name.clone(),
                });
            }
        }
        Ok(())
    }
}

fn document_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}

fn require_id(doc: &Document) -> RepoResult<String> {
    document_id(doc)
        .map(String::from)
        .ok_or_else(|| DomainError::InvalidArgument(format!("document without '{ID_FIELD}'")))
}

/// Process-local document store
#[derive(Default)]
pub struct MemoryDocumentStore {
    ids: ObjectIdGenerator,
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents across all collections
    pub fn len(&self) -> usize {
        self.collections
            .read()
            .values()
            .map(|c| c.documents.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn next_id(&self) -> String {
        self.ids.generate().to_string()
    }

    #[instrument(skip(self, indexes))]
    async fn ensure_indexes(&self, collection: &str, indexes: &[IndexSpec]) -> RepoResult<()> {
        let mut collections = self.collections.write();
        let entry = collections.entry(collection.to_string()).or_default();
        for index in indexes {
            if !entry.indexes.iter().any(|existing| existing.name == index.name) {
                debug!(index = %index.name, "Index registered");
                entry.indexes.push(index.clone());
            }
        }
        Ok(())
    }

    #[instrument(skip(self, document))]
    async fn insert(&self, collection: &str, document: Document) -> RepoResult<()> {
        let id = require_id(&document)?;
        let mut collections = self.collections.write();
        let entry = collections.entry(collection.to_string()).or_default();

        if entry.position(&id).is_some() {
            return Err(DomainError::DuplicateKey {
                collection: collection.to_string(),
                index: ID_FIELD.to_string(),
            });
        }
        entry.check_unique(collection, &document, &id)?;
        entry.documents.push(document);
        Ok(())
    }

    #[instrument(skip(self, document))]
    async fn replace(&self, collection: &str, document: Document) -> RepoResult<()> {
        let id = require_id(&document)?;
        let mut collections = self.collections.write();
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| DomainError::not_found("Document", id.clone()))?;

        let position = entry
            .position(&id)
            .ok_or_else(|| DomainError::not_found("Document", id.clone()))?;
        entry.check_unique(collection, &document, &id)?;
        entry.documents[position] = document;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, collection: &str, id: &str) -> RepoResult<bool> {
        let mut collections = self.collections.write();
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(false);
        };
        Ok(match entry.position(id) {
            Some(position) => {
                entry.documents.remove(position);
                true
            }
            None => false,
        })
    }

    #[instrument(skip(self))]
    async fn delete_many(&self, collection: &str, filter: &Filter) -> RepoResult<u64> {
        let mut collections = self.collections.write();
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let text_fields = entry.text_fields();
        let before = entry.documents.len();
        entry
            .documents
            .retain(|doc| !matcher::matches(doc, filter, &text_fields));
        Ok((before - entry.documents.len()) as u64)
    }

    #[instrument(skip(self))]
    async fn find(&self, collection: &str, query: &Query) -> RepoResult<Vec<Document>> {
        let collections = self.collections.read();
        let Some(entry) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let text_fields = entry.text_fields();

        let mut found: Vec<&Document> = entry
            .documents
            .iter()
            .filter(|doc| matcher::matches(doc, &query.filter, &text_fields))
            .collect();

        if !query.sort.is_empty() {
            // Stable: ties keep storage order
            found.sort_by(|a, b| matcher::compare_documents(a, b, &query.sort));
        }

        Ok(found
            .into_iter()
            .skip(query.skip)
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn count(&self, collection: &str, query: &Query) -> RepoResult<u64> {
        let collections = self.collections.read();
        let Some(entry) = collections.get(collection) else {
            return Ok(0);
        };
        let text_fields = entry.text_fields();
        Ok(entry
            .documents
            .iter()
            .filter(|doc| matcher::matches(doc, &query.filter, &text_fields))
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth_core::{IndexKind, SortOrder};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap_or_default()
    }

    async fn users_store() -> MemoryDocumentStore {
        let store = MemoryDocumentStore::new();
        store
            .ensure_indexes(
                "users",
                &[
                    IndexSpec::new([("login", IndexKind::Asc)]).unique(),
                    IndexSpec::new([("login", IndexKind::Text), ("city", IndexKind::Text)])
                        .named("text_index"),
                ],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = users_store().await;
        store
            .insert("users", doc(json!({"_id": "1", "login": "a"})))
            .await
            .unwrap();
        store
            .insert("users", doc(json!({"_id": "2", "login": "b"})))
            .await
            .unwrap();

        let found = store
            .find_one("users", &Query::new(Filter::eq("login", "b")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["_id"], "2");
        assert_eq!(store.count("users", &Query::all()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unique_index_rejects_duplicates() {
        let store = users_store().await;
        store
            .insert("users", doc(json!({"_id": "1", "login": "a"})))
            .await
            .unwrap();

        let err = store
            .insert("users", doc(json!({"_id": "2", "login": "a"})))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DuplicateKey { ref index, .. } if index == "login_1"));

        // Replacing a document with its own key is fine
        store
            .replace("users", doc(json!({"_id": "1", "login": "a", "city": "Lviv"})))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = MemoryDocumentStore::new();
        store.insert("roles", doc(json!({"_id": "1"}))).await.unwrap();
        assert!(store
            .insert("roles", doc(json!({"_id": "1"})))
            .await
            .unwrap_err()
            .is_conflict());
    }

    #[tokio::test]
    async fn test_replace_missing_is_not_found() {
        let store = MemoryDocumentStore::new();
        let err = store
            .replace("users", doc(json!({"_id": "nope"})))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryDocumentStore::new();
        store.insert("users", doc(json!({"_id": "1"}))).await.unwrap();
        assert!(store.delete("users", "1").await.unwrap());
        assert!(!store.delete("users", "1").await.unwrap());
        assert!(!store.delete("missing", "1").await.unwrap());
    }

    #[tokio::test]
    async fn test_sort_skip_limit() {
        let store = MemoryDocumentStore::new();
        for (id, name) in [("1", "Carol"), ("2", "Alice"), ("3", "Bob")] {
            store
                .insert("users", doc(json!({"_id": id, "first_name": name})))
                .await
                .unwrap();
        }

        let query = Query::all()
            .sort("first_name", SortOrder::Asc)
            .skip(1)
            .limit(1);
        let found = store.find("users", &query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["first_name"], "Bob");

        // No sort: storage order
        let found = store.find("users", &Query::all()).await.unwrap();
        assert_eq!(found[0]["first_name"], "Carol");
    }

    #[tokio::test]
    async fn test_text_search_uses_text_index() {
        let store = users_store().await;
        store
            .insert("users", doc(json!({"_id": "1", "login": "x", "city": "Kyiv"})))
            .await
            .unwrap();
        store
            .insert("users", doc(json!({"_id": "2", "login": "y", "city": "Lviv"})))
            .await
            .unwrap();

        let found = store
            .find("users", &Query::new(Filter::text("kyi")))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["_id"], "1");
    }

    #[tokio::test]
    async fn test_delete_many() {
        let store = MemoryDocumentStore::new();
        for (id, follower) in [("1", "a"), ("2", "a"), ("3", "b")] {
            store
                .insert("follower", doc(json!({"_id": id, "follower": follower})))
                .await
                .unwrap();
        }
        let removed = store
            .delete_many("follower", &Filter::eq("follower", "a"))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_next_id_is_object_id() {
        let store = MemoryDocumentStore::new();
        let id = store.next_id();
        assert_eq!(id.len(), 24);
        assert_ne!(id, store.next_id());
    }
}
