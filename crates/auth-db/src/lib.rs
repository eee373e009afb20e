//! # auth-db
//!
//! Document store implementations of the `DocumentStore` and
//! `AttachmentStore` ports defined in `auth-core`.
//!
//! ## Overview
//!
//! - `MemoryDocumentStore`: process-local store with unique index enforcement
//! - `PgDocumentStore`: PostgreSQL store keeping every collection in one
//!   JSONB table, with expression indexes for unique constraints
//! - Attachment stores for profile pictures
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_common::DatabaseConfig;
//! use auth_db::pool::{create_pool, PoolConfig};
//! use auth_db::PgDocumentStore;
//!
//! async fn example(database: &DatabaseConfig) -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool(&PoolConfig::from(database)).await?;
//!     let store = PgDocumentStore::new(pool);
//!     store.ensure_schema().await?;
//!     Ok(())
//! }
//! ```

pub mod attachments;
pub mod memory;
pub mod pool;
pub mod postgres;

// Re-export commonly used types
pub use attachments::{DocumentAttachmentStore, MemoryAttachmentStore};
pub use memory::MemoryDocumentStore;
pub use pool::{create_pool, PgPool, PoolConfig};
pub use postgres::PgDocumentStore;
