//! PostgreSQL document store
//!
//! Every collection lives in the single `odm_documents` table as JSONB
//! bodies. Unique indexes become partial expression indexes scoped to their
//! collection; text indexes are tracked in-process and compiled into
//! `ILIKE` searches.

mod error;
mod sql;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use auth_core::{
    Document, DocumentStore, DomainError, Filter, IndexSpec, ObjectIdGenerator, Query, RepoResult,
    ID_FIELD,
};

use self::error::{document_not_found, map_db_error, map_unique_violation};

const PRIMARY_KEY: &str = "odm_documents_pkey";

/// PostgreSQL implementation of DocumentStore
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    ids: Arc<ObjectIdGenerator>,
    text_fields: Arc<RwLock<HashMap<String, Vec<String>>>>,
}

impl PgDocumentStore {
    /// Create a new PgDocumentStore
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            ids: Arc::new(ObjectIdGenerator::new()),
            text_fields: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the documents table if it does not exist
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> RepoResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS odm_documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body JSONB NOT NULL,
                seq BIGSERIAL NOT NULL,
                CONSTRAINT odm_documents_pkey PRIMARY KEY (collection, id)
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS odm_documents_body_idx
            ON odm_documents USING GIN (body jsonb_path_ops)
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    fn text_fields_of(&self, collection: &str) -> Vec<String> {
        self.text_fields
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Translate a unique violation back into the index that raised it
    fn duplicate_key(collection: &str, constraint: Option<&str>) -> DomainError {
        let prefix = sql::unique_index_name(collection, "");
        let index = match constraint {
            Some(PRIMARY_KEY) | None => ID_FIELD.to_string(),
            Some(name) => name.strip_prefix(&prefix).unwrap_or(name).to_string(),
        };
        DomainError::DuplicateKey {
            collection: collection.to_string(),
            index,
        }
    }

    fn where_clause(
        builder: &mut QueryBuilder<'_, Postgres>,
        collection: &str,
        filter: &Filter,
        text_fields: &[String],
    ) {
        builder.push(" WHERE collection = ");
        builder.push_bind(collection.to_string());
        builder.push(" AND ");
        sql::push_filter(builder, filter, text_fields);
    }
}

fn require_id(document: &Document) -> RepoResult<String> {
    document
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| DomainError::InvalidArgument(format!("document without '{ID_FIELD}'")))
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn next_id(&self) -> String {
        self.ids.generate().to_string()
    }

    #[instrument(skip(self, indexes))]
    async fn ensure_indexes(&self, collection: &str, indexes: &[IndexSpec]) -> RepoResult<()> {
        let collection = sql::ddl_identifier(collection)?;

        for index in indexes {
            if index.is_text() {
                let mut text_fields = self.text_fields.write();
                let fields = text_fields.entry(collection.to_string()).or_default();
                for field in index.field_names() {
                    if !fields.iter().any(|f| f == field) {
                        fields.push(field.to_string());
                    }
                }
                continue;
            }

            if !index.unique {
                // Non-unique indexes are served by the GIN index on body
                continue;
            }

            let name = sql::unique_index_name(collection, sql::ddl_identifier(&index.name)?);
            let mut expressions = Vec::with_capacity(index.fields.len());
            for field in index.field_names() {
                let field = sql::ddl_identifier(field)?;
                expressions.push(format!("(body #>> '{{{}}}')", field.replace('.', ",")));
            }

            let ddl = format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {name} ON odm_documents ({}) WHERE collection = '{collection}'",
                expressions.join(", ")
            );
            debug!(index = %name, "Ensuring unique index");
            sqlx::query(&ddl)
                .execute(&self.pool)
                .await
                .map_err(map_db_error)?;
        }

        Ok(())
    }

    #[instrument(skip(self, document))]
    async fn insert(&self, collection: &str, document: Document) -> RepoResult<()> {
        let id = require_id(&document)?;

        sqlx::query("INSERT INTO odm_documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(Value::Object(document))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                map_unique_violation(e, |constraint| Self::duplicate_key(collection, constraint))
            })?;

        Ok(())
    }

    #[instrument(skip(self, document))]
    async fn replace(&self, collection: &str, document: Document) -> RepoResult<()> {
        let id = require_id(&document)?;

        let result =
            sqlx::query("UPDATE odm_documents SET body = $3 WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(&id)
                .bind(Value::Object(document))
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    map_unique_violation(e, |constraint| {
                        Self::duplicate_key(collection, constraint)
                    })
                })?;

        if result.rows_affected() == 0 {
            return Err(document_not_found(&id));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, collection: &str, id: &str) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM odm_documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete_many(&self, collection: &str, filter: &Filter) -> RepoResult<u64> {
        let text_fields = self.text_fields_of(collection);
        let mut builder = QueryBuilder::<Postgres>::new("DELETE FROM odm_documents");
        Self::where_clause(&mut builder, collection, filter, &text_fields);

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn find(&self, collection: &str, query: &Query) -> RepoResult<Vec<Document>> {
        let text_fields = self.text_fields_of(collection);
        let mut builder = QueryBuilder::<Postgres>::new("SELECT body FROM odm_documents");
        Self::where_clause(&mut builder, collection, &query.filter, &text_fields);
        sql::push_order_by(&mut builder, &query.sort);

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if query.skip > 0 {
            builder.push(" OFFSET ");
            builder.push_bind(i64::try_from(query.skip).unwrap_or(i64::MAX));
        }

        let bodies: Vec<Value> = builder
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(bodies
            .into_iter()
            .filter_map(|body| match body {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn count(&self, collection: &str, query: &Query) -> RepoResult<u64> {
        let text_fields = self.text_fields_of(collection);
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM odm_documents");
        Self::where_clause(&mut builder, collection, &query.filter, &text_fields);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}
