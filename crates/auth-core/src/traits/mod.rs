//! Storage ports - implemented by the infrastructure crates

mod attachments;
mod document_store;

pub use attachments::{Attachment, AttachmentStore};
pub use document_store::{Document, DocumentStore, IndexKind, IndexSpec, RepoResult, ID_FIELD};
