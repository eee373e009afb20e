//! Value objects - immutable identifiers and closed value sets

mod object_id;
mod status;
mod stored_ref;

pub use object_id::{ObjectId, ObjectIdGenerator, ObjectIdParseError};
pub use status::UserStatus;
pub use stored_ref::{DocumentLink, EntityKind, StoredRef, ANONYMOUS_UID, SYSTEM_UID};
