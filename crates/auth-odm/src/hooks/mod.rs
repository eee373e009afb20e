//! Entity lifecycle hooks
//!
//! Each model carries one hooks object. `OdmStorage` calls it at four points
//! of an explicit save or delete: before save (after the storage reference
//! is assigned), after save, before delete and after delete. An error from a
//! `before_*` hook aborts the operation.

mod role;
mod user;

use async_trait::async_trait;

use auth_core::DomainResult;

use crate::models::ActorContext;
use crate::record::Record;
use crate::storage::OdmStorage;

pub use role::RoleHooks;
pub use user::UserHooks;

pub(crate) use user::md5_hex;

#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    async fn before_save(
        &self,
        _storage: &OdmStorage,
        _record: &mut Record,
        _actor: &ActorContext,
    ) -> DomainResult<()> {
        Ok(())
    }

    /// `created` is true for the first save of the record
    async fn after_save(
        &self,
        _storage: &OdmStorage,
        _record: &Record,
        _actor: &ActorContext,
        _created: bool,
    ) -> DomainResult<()> {
        Ok(())
    }

    async fn before_delete(
        &self,
        _storage: &OdmStorage,
        _record: &Record,
        _actor: &ActorContext,
    ) -> DomainResult<()> {
        Ok(())
    }

    async fn after_delete(
        &self,
        _storage: &OdmStorage,
        _record: &Record,
        _actor: &ActorContext,
    ) -> DomainResult<()> {
        Ok(())
    }
}

/// Hooks of models without lifecycle behavior
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl LifecycleHooks for NoHooks {}

/// Copy the storage reference into `uid` on first save
pub(crate) fn assign_uid(record: &mut Record) {
    if !record.is_new() || record.raw_str("uid").is_some() {
        return;
    }
    if let Some(id) = record.id().map(str::to_string) {
        record.write_raw("uid", serde_json::Value::String(id));
    }
}
