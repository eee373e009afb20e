//! Document store port - the persistence contract the ODM consumes
//!
//! The domain layer defines what it needs, and the infrastructure layer
//! provides the implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::query::{Filter, Query};

/// Result type for storage operations
pub type RepoResult<T> = Result<T, DomainError>;

/// A stored document: a JSON object keyed by field name
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Field holding the storage-assigned reference
pub const ID_FIELD: &str = "_id";

// ============================================================================
// Indexes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Asc,
    Desc,
    Text,
}

/// Index declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub fields: Vec<(String, IndexKind)>,
    pub unique: bool,
}

impl IndexSpec {
    /// Create an index named after its fields
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, IndexKind)>,
        S: Into<String>,
    {
        let fields: Vec<(String, IndexKind)> =
            fields.into_iter().map(|(f, k)| (f.into(), k)).collect();
        let name = fields
            .iter()
            .map(|(field, kind)| {
                let suffix = match kind {
                    IndexKind::Asc => "1",
                    IndexKind::Desc => "-1",
                    IndexKind::Text => "text",
                };
                format!("{field}_{suffix}")
            })
            .collect::<Vec<_>>()
            .join("_");

        Self {
            name,
            fields,
            unique: false,
        }
    }

    /// Ascending index over `fields`
    pub fn asc<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(fields.into_iter().map(|f| (f, IndexKind::Asc)))
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new([(field.into(), IndexKind::Desc)])
    }

    /// Text index over `fields`
    pub fn text<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(fields.into_iter().map(|f| (f, IndexKind::Text)))
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Whether this is a text index
    pub fn is_text(&self) -> bool {
        self.fields.iter().any(|(_, kind)| *kind == IndexKind::Text)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(field, _)| field.as_str())
    }
}

// ============================================================================
// Document Store
// ============================================================================

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Allocate a fresh storage reference
    fn next_id(&self) -> String;

    /// Declare indexes for a collection. Unique indexes are enforced on
    /// every subsequent write; text indexes define what `Filter::Text` searches.
    async fn ensure_indexes(&self, collection: &str, indexes: &[IndexSpec]) -> RepoResult<()>;

    /// Insert a document carrying its `_id`
    async fn insert(&self, collection: &str, document: Document) -> RepoResult<()>;

    /// Replace the document with the same `_id`; not-found if missing
    async fn replace(&self, collection: &str, document: Document) -> RepoResult<()>;

    /// Delete by `_id`, returning whether something was removed
    async fn delete(&self, collection: &str, id: &str) -> RepoResult<bool>;

    /// Delete every matching document, returning how many were removed
    async fn delete_many(&self, collection: &str, filter: &Filter) -> RepoResult<u64>;

    /// Find documents
    async fn find(&self, collection: &str, query: &Query) -> RepoResult<Vec<Document>>;

    /// Find the first matching document
    async fn find_one(&self, collection: &str, query: &Query) -> RepoResult<Option<Document>> {
        let query = query.clone().limit(1);
        Ok(self.find(collection, &query).await?.into_iter().next())
    }

    /// Count documents matching the query's filter
    async fn count(&self, collection: &str, query: &Query) -> RepoResult<u64>;
}
