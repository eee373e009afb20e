//! Finder
//!
//! Reference-aware query builder over one model. Arguments to `eq`/`ne` go
//! through the field's codec, so a live user, a uid, a composite or a
//! document link all match every stored shape of the same reference.

use serde_json::Value;
use std::sync::Arc;
use std::vec;

use auth_core::{Document, DomainError, DomainResult, Filter, Query, SortOrder, ID_FIELD};

use crate::fields::{plain_finder_values, FieldInput};
use crate::record::{Record, CREATED_FIELD, MODIFIED_FIELD};
use crate::registry::Model;
use crate::storage::OdmStorage;

pub struct Finder {
    storage: OdmStorage,
    model: Arc<Model>,
    query: Query,
}

impl Finder {
    pub(crate) fn new(storage: OdmStorage, model: Arc<Model>) -> Self {
        Self {
            storage,
            model,
            query: Query::all(),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Replace the query, keeping the model
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    /// Match documents whose `field` equals `value`
    pub fn eq(self, field: &str, value: impl Into<FieldInput>) -> DomainResult<Self> {
        let mut values = self.finder_values(field, value.into())?;
        let filter = if values.len() == 1 {
            Filter::eq(field, values.remove(0))
        } else {
            Filter::any_of(field, values)
        };
        Ok(self.filter(filter))
    }

    /// Match documents whose `field` differs from `value`
    pub fn ne(self, field: &str, value: impl Into<FieldInput>) -> DomainResult<Self> {
        let values = self.finder_values(field, value.into())?;
        let filter = values
            .into_iter()
            .fold(Filter::All, |filter, value| filter.and(Filter::ne(field, value)));
        Ok(self.filter(filter))
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.query = self.query.and(filter);
        self
    }

    /// Case-insensitive search over the model's text index
    pub fn text(self, needle: impl Into<String>) -> Self {
        self.filter(Filter::text(needle))
    }

    pub fn sort(mut self, field: impl Into<String>, order: impl Into<SortOrder>) -> Self {
        self.query = self.query.sort(field, order);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.query = self.query.skip(skip);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query = self.query.limit(limit);
        self
    }

    /// Cache results for `seconds`; zero bypasses the cache
    pub fn cache(mut self, seconds: u64) -> Self {
        self.query = self.query.cache_ttl(seconds);
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.query = self.query.no_cache();
        self
    }

    pub async fn get(self) -> DomainResult<Cursor<Record>> {
        let model = Arc::clone(&self.model);
        self.get_with(move |document| Record::from_document(Arc::clone(&model), document))
            .await
    }

    /// Matching documents, each wrapped by `wrap` as the cursor advances
    pub async fn get_with<T, F>(self, wrap: F) -> DomainResult<Cursor<T>>
    where
        F: Fn(Document) -> T + Send + Sync + 'static,
    {
        let documents = self
            .storage
            .store()
            .find(self.model.collection(), &self.query)
            .await?;
        Ok(Cursor::new(documents, wrap))
    }

    pub async fn first(self) -> DomainResult<Option<Record>> {
        let document = self
            .storage
            .store()
            .find_one(self.model.collection(), &self.query)
            .await?;
        Ok(document.map(|document| Record::from_document(Arc::clone(&self.model), document)))
    }

    pub async fn count(self) -> DomainResult<u64> {
        self.storage
            .store()
            .count(self.model.collection(), &self.query)
            .await
    }

    /// Delete every match without running lifecycle hooks
    pub async fn delete(self) -> DomainResult<u64> {
        self.storage
            .store()
            .delete_many(self.model.collection(), &self.query.filter)
            .await
    }

    fn finder_values(&self, field: &str, input: FieldInput) -> DomainResult<Vec<Value>> {
        if matches!(field, ID_FIELD | CREATED_FIELD | MODIFIED_FIELD) {
            return plain_finder_values(field, input);
        }
        let def = self.model.schema().field(field).ok_or_else(|| {
            DomainError::InvalidArgument(format!(
                "model '{}' has no field '{field}'",
                self.model.name()
            ))
        })?;
        def.codec.finder_values(field, input)
    }
}

/// One-pass sequence of finder results
pub struct Cursor<T> {
    documents: vec::IntoIter<Document>,
    wrap: Box<dyn Fn(Document) -> T + Send + Sync>,
}

impl<T> Cursor<T> {
    pub(crate) fn new<F>(documents: Vec<Document>, wrap: F) -> Self
    where
        F: Fn(Document) -> T + Send + Sync + 'static,
    {
        Self {
            documents: documents.into_iter(),
            wrap: Box::new(wrap),
        }
    }
}

impl<T> Iterator for Cursor<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.documents.next().map(&self.wrap)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.documents.size_hint()
    }
}

impl<T> ExactSizeIterator for Cursor<T> {}
