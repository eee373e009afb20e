//! # auth-core
//!
//! Domain layer for the document-backed identity storage driver: the error
//! taxonomy, identifier value objects, the reference resolver, domain events,
//! and the storage ports implemented by the infrastructure crates.
//! This crate has zero dependencies on infrastructure (database, cache, etc.).

pub mod error;
pub mod events;
pub mod query;
pub mod reference;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use error::{DomainError, DomainResult};
pub use events::{
    DomainEvent, EventSink, NoopEventSink, RecordingEventSink, RelationEvent, RoleEvent, UserEvent,
};
pub use query::{Filter, Query, SortOrder};
pub use reference::{
    finder_forms, resolve, resolve_identity, Identity, IdentityLookup, Reference, ResolvePolicy,
};
pub use traits::{
    Attachment, AttachmentStore, Document, DocumentStore, IndexKind, IndexSpec, RepoResult,
    ID_FIELD,
};
pub use value_objects::{
    DocumentLink, EntityKind, ObjectId, ObjectIdGenerator, StoredRef, UserStatus,
    ANONYMOUS_UID, SYSTEM_UID,
};
