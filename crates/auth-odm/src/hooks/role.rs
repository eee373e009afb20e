use async_trait::async_trait;
use tracing::info;

use auth_core::{
    DomainError, DomainEvent, DomainResult, EntityKind, Filter, Query, RoleEvent, StoredRef,
};

use super::{assign_uid, LifecycleHooks};
use crate::models::ActorContext;
use crate::record::Record;
use crate::storage::OdmStorage;

#[derive(Debug, Clone, Copy, Default)]
pub struct RoleHooks;

#[async_trait]
impl LifecycleHooks for RoleHooks {
    async fn before_save(
        &self,
        _storage: &OdmStorage,
        record: &mut Record,
        _actor: &ActorContext,
    ) -> DomainResult<()> {
        assign_uid(record);
        Ok(())
    }

    async fn after_save(
        &self,
        storage: &OdmStorage,
        record: &Record,
        actor: &ActorContext,
        created: bool,
    ) -> DomainResult<()> {
        let event = RoleEvent::new(record.raw_str("uid").unwrap_or_default(), actor.uid());
        storage
            .publish(if created {
                DomainEvent::RoleCreated(event)
            } else {
                DomainEvent::RoleSaved(event)
            })
            .await;
        Ok(())
    }

    /// A role held by any user cannot be deleted
    async fn before_delete(
        &self,
        storage: &OdmStorage,
        record: &Record,
        _actor: &ActorContext,
    ) -> DomainResult<()> {
        let Some(uid) = record.raw_str("uid") else {
            return Ok(());
        };

        let filter = Filter::any_of("roles", StoredRef::stored_forms(EntityKind::Role, uid));
        let holders = storage
            .store()
            .count(EntityKind::User.collection(), &Query::new(filter).no_cache())
            .await?;

        if holders > 0 {
            return Err(DomainError::ForbidDeletion(format!(
                "role '{}' is used by {holders} user(s)",
                record.raw_str("name").unwrap_or(uid)
            )));
        }
        Ok(())
    }

    async fn after_delete(
        &self,
        storage: &OdmStorage,
        record: &Record,
        actor: &ActorContext,
    ) -> DomainResult<()> {
        let uid = record.raw_str("uid").unwrap_or_default();
        info!(uid = %uid, "Role deleted");
        storage
            .publish(DomainEvent::RoleDeleted(RoleEvent::new(uid, actor.uid())))
            .await;
        Ok(())
    }
}
