use async_trait::async_trait;
use md5::{Digest, Md5};
use serde_json::Value;
use tracing::{debug, info};

use auth_core::{
    DomainError, DomainEvent, DomainResult, EntityKind, Filter, StoredRef, UserEvent,
};

use super::{assign_uid, LifecycleHooks};
use crate::fields::NicknameCodec;
use crate::models::{ActorContext, BLOCKED_USER_MODEL, FOLLOWER_MODEL};
use crate::record::Record;
use crate::storage::OdmStorage;

/// Attachment fields owned by a user
const OWNED_ATTACHMENTS: [&str; 2] = ["picture", "cover_picture"];

#[derive(Debug, Clone, Copy, Default)]
pub struct UserHooks;

/// Hex md5 digest, the fallback nickname and the Gravatar key of a login
pub(crate) fn md5_hex(value: &str) -> String {
    hex::encode(Md5::digest(value.as_bytes()))
}

#[async_trait]
impl LifecycleHooks for UserHooks {
    async fn before_save(
        &self,
        storage: &OdmStorage,
        record: &mut Record,
        _actor: &ActorContext,
    ) -> DomainResult<()> {
        assign_uid(record);

        if record.raw_str("password").is_none() {
            record.set(storage, "password", "").await?;
        }

        match record.raw_str("nickname").map(str::to_string) {
            // Another user may have taken the nickname since it was set
            Some(nickname) => {
                let codec = NicknameCodec::from_settings(storage.settings());
                let unique = codec.unique(storage, &nickname, record.id()).await?;
                record.write_raw("nickname", Value::String(unique));
            }
            None => {
                if let Some(login) = record.raw_str("login").map(str::to_string) {
                    record.set(storage, "nickname", md5_hex(&login)).await?;
                }
            }
        }
        Ok(())
    }

    async fn after_save(
        &self,
        storage: &OdmStorage,
        record: &Record,
        actor: &ActorContext,
        created: bool,
    ) -> DomainResult<()> {
        let event = UserEvent::new(record.raw_str("uid").unwrap_or_default(), actor.uid());
        storage
            .publish(if created {
                DomainEvent::UserCreated(event)
            } else {
                DomainEvent::UserSaved(event)
            })
            .await;
        Ok(())
    }

    /// The acting identity cannot delete itself
    async fn before_delete(
        &self,
        _storage: &OdmStorage,
        record: &Record,
        actor: &ActorContext,
    ) -> DomainResult<()> {
        if record.raw_str("uid") == Some(actor.uid()) {
            return Err(DomainError::ForbidDeletion(
                "a user cannot delete themselves".to_string(),
            ));
        }
        Ok(())
    }

    async fn after_delete(
        &self,
        storage: &OdmStorage,
        record: &Record,
        actor: &ActorContext,
    ) -> DomainResult<()> {
        for field in OWNED_ATTACHMENTS {
            let Some(id) = record.raw_str(field) else {
                continue;
            };
            match storage.attachments().delete(id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!(attachment_id = %id, "Attachment already removed");
                }
                Err(e) => return Err(e),
            }
        }

        let uid = record.raw_str("uid").unwrap_or_default();
        if !uid.is_empty() {
            let forms = StoredRef::stored_forms(EntityKind::User, uid);
            let mut removed = 0;
            for (model, from, to) in [
                (FOLLOWER_MODEL, "follower", "follows"),
                (BLOCKED_USER_MODEL, "blocker", "blocked"),
            ] {
                let filter =
                    Filter::any_of(from, forms.clone()).or(Filter::any_of(to, forms.clone()));
                let collection = storage.model(model)?.collection().to_string();
                removed += storage.store().delete_many(&collection, &filter).await?;
            }
            info!(uid = %uid, edges = removed, "User deleted");
        }

        storage
            .publish(DomainEvent::UserDeleted(UserEvent::new(uid, actor.uid())))
            .await;
        Ok(())
    }
}
