//! # auth-odm
//!
//! Document-mapping layer for the identity directory: field codecs, the
//! model registry, records with their lifecycle hooks, the reference-aware
//! finder, and the storage driver the host framework talks to.

pub mod driver;
pub mod fields;
pub mod finder;
pub mod hooks;
pub mod models;
pub mod record;
pub mod registry;
pub mod schema;
pub mod storage;

// Re-export commonly used types at crate root
pub use driver::{RoleLookup, StorageDriver, UserLookup};
pub use fields::{FieldCodec, FieldInput, FieldValue};
pub use finder::{Cursor, Finder};
pub use hooks::LifecycleHooks;
pub use models::{ActorContext, Role, User};
pub use record::{Record, RecordState};
pub use registry::{Model, ModelDef, ModelRegistry};
pub use schema::{FieldDef, Schema};
pub use storage::{OdmStorage, OdmStorageBuilder};
