//! ODM storage
//!
//! `OdmStorage` ties the document store, the attachment store, the event
//! sink and the model registry together. It owns the record lifecycle
//! (save and delete with their hooks) and is the identity directory that
//! reference fields resolve against.

use async_trait::async_trait;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use auth_common::{AuthSettings, PasswordService};
use auth_core::{
    AttachmentStore, DocumentStore, DomainError, DomainEvent, DomainResult, EventSink,
    IdentityLookup, NoopEventSink, ANONYMOUS_UID, ID_FIELD, SYSTEM_UID,
};
use auth_db::DocumentAttachmentStore;

use crate::finder::Finder;
use crate::models::{
    builtin_models, ActorContext, Placeholder, Role, User, ROLE_MODEL, USER_MODEL,
};
use crate::record::{Record, RecordState};
use crate::registry::{Model, ModelDef, ModelRegistry};
use crate::schema::Schema;

type Extension = Box<dyn Fn(&mut Schema) + Send + Sync>;

/// Shared handle to the ODM; cheap to clone
#[derive(Clone)]
pub struct OdmStorage {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn DocumentStore>,
    attachments: Arc<dyn AttachmentStore>,
    events: Arc<dyn EventSink>,
    passwords: PasswordService,
    settings: AuthSettings,
    registry: ModelRegistry,
    users: Arc<Model>,
    roles: Arc<Model>,
}

impl OdmStorage {
    pub fn builder() -> OdmStorageBuilder {
        OdmStorageBuilder::default()
    }

    /// Declare the indexes of every registered model
    #[instrument(skip(self))]
    pub async fn ensure_indexes(&self) -> DomainResult<()> {
        for model in self.inner.registry.models() {
            self.store()
                .ensure_indexes(model.collection(), model.schema().indexes())
                .await?;
        }
        info!(
            models = self.inner.registry.names().count(),
            "Indexes ensured"
        );
        Ok(())
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.inner.store.as_ref()
    }

    pub fn attachments(&self) -> &dyn AttachmentStore {
        self.inner.attachments.as_ref()
    }

    pub fn passwords(&self) -> &PasswordService {
        &self.inner.passwords
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.inner.settings
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.inner.registry
    }

    pub fn model(&self, name: &str) -> DomainResult<Arc<Model>> {
        self.inner.registry.get(name)
    }

    /// New, unsaved record of a model
    pub fn dispense(&self, model: &str) -> DomainResult<Record> {
        Ok(Record::new(self.model(model)?))
    }

    pub fn find(&self, model: &str) -> DomainResult<Finder> {
        Ok(Finder::new(self.clone(), self.model(model)?))
    }

    pub(crate) fn user_model(&self) -> Arc<Model> {
        Arc::clone(&self.inner.users)
    }

    pub(crate) fn role_model(&self) -> Arc<Model> {
        Arc::clone(&self.inner.roles)
    }

    pub(crate) fn dispense_user(&self) -> User {
        User::from_record(self.clone(), Record::new(Arc::clone(&self.inner.users)))
    }

    pub(crate) fn dispense_role(&self) -> Role {
        Role::from_record(self.clone(), Record::new(Arc::clone(&self.inner.roles)))
    }

    pub fn anonymous_user(&self) -> User {
        self.placeholder(Placeholder::Anonymous)
    }

    pub fn system_user(&self) -> User {
        self.placeholder(Placeholder::System)
    }

    pub(crate) fn placeholder(&self, kind: Placeholder) -> User {
        let record = Record::new(Arc::clone(&self.inner.users));
        User::placeholder(self.clone(), record, kind)
    }

    /// Persist a record, running its model's hooks
    ///
    /// A persisted record without changes is left alone.
    #[instrument(skip_all, fields(model = %record.model().name(), actor = %actor.uid()))]
    pub async fn save_record(&self, record: &mut Record, actor: &ActorContext) -> DomainResult<()> {
        match record.state() {
            RecordState::Deleted => {
                return Err(DomainError::InvalidArgument(
                    "a deleted record cannot be saved".to_string(),
                ))
            }
            RecordState::Persisted => return Ok(()),
            RecordState::New | RecordState::Modified => {}
        }

        let created = record.is_new();
        if created && record.id().is_none() {
            record.assign_id(self.store().next_id());
        }

        let model = Arc::clone(record.model());
        model.hooks().before_save(self, record, actor).await?;
        record.check_required()?;
        record.stamp(Utc::now());

        let document = record.document().clone();
        if created {
            self.store().insert(model.collection(), document).await?;
        } else {
            self.store().replace(model.collection(), document).await?;
        }
        record.mark_persisted();

        debug!(id = ?record.id(), created, "Record saved");
        model.hooks().after_save(self, record, actor, created).await
    }

    /// Delete a record, running its model's hooks
    #[instrument(skip_all, fields(model = %record.model().name(), actor = %actor.uid()))]
    pub async fn delete_record(
        &self,
        record: &mut Record,
        actor: &ActorContext,
    ) -> DomainResult<()> {
        let id = match record.state() {
            RecordState::Deleted => return Ok(()),
            RecordState::New => {
                return Err(DomainError::InvalidArgument(
                    "a record that was never saved cannot be deleted".to_string(),
                ))
            }
            RecordState::Persisted | RecordState::Modified => record
                .id()
                .map(str::to_string)
                .ok_or_else(|| DomainError::InternalError("saved record without id".to_string()))?,
        };

        let model = Arc::clone(record.model());
        model.hooks().before_delete(self, record, actor).await?;

        if !self.store().delete(model.collection(), &id).await? {
            debug!(id = %id, "Record was already removed");
        }
        record.mark_deleted();

        model.hooks().after_delete(self, record, actor).await
    }

    /// Publish an event; failures are logged, never returned
    pub async fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.inner.events.publish(&event).await {
            warn!(event_type = event.event_type(), error = %e, "Failed to publish event");
        }
    }

    /// Storage reference of the user holding `nickname`, if any
    pub async fn nickname_owner(&self, nickname: &str) -> DomainResult<Option<String>> {
        let record = self
            .find(USER_MODEL)?
            .eq("nickname", nickname)?
            .no_cache()
            .first()
            .await?;
        Ok(record.and_then(|record| record.id().map(str::to_string)))
    }
}

#[async_trait]
impl IdentityLookup<User> for OdmStorage {
    async fn find_by_uid(&self, uid: &str) -> DomainResult<User> {
        match uid {
            ANONYMOUS_UID => return Ok(self.anonymous_user()),
            SYSTEM_UID => return Ok(self.system_user()),
            _ => {}
        }

        let record = self
            .find(USER_MODEL)?
            .eq(ID_FIELD, uid)?
            .no_cache()
            .first()
            .await?
            .ok_or(DomainError::UserNotFound)?;
        Ok(User::from_record(self.clone(), record))
    }
}

#[async_trait]
impl IdentityLookup<Role> for OdmStorage {
    async fn find_by_uid(&self, uid: &str) -> DomainResult<Role> {
        let record = self
            .find(ROLE_MODEL)?
            .eq(ID_FIELD, uid)?
            .first()
            .await?
            .ok_or_else(|| DomainError::RoleNotFound(uid.to_string()))?;
        Ok(Role::from_record(self.clone(), record))
    }
}

impl fmt::Debug for OdmStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OdmStorage")
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

/// Builder for [`OdmStorage`]
pub struct OdmStorageBuilder {
    store: Option<Arc<dyn DocumentStore>>,
    attachments: Option<Arc<dyn AttachmentStore>>,
    events: Arc<dyn EventSink>,
    settings: AuthSettings,
    extensions: Vec<(String, Extension)>,
    models: Vec<ModelDef>,
}

impl Default for OdmStorageBuilder {
    fn default() -> Self {
        Self {
            store: None,
            attachments: None,
            events: Arc::new(NoopEventSink),
            settings: AuthSettings::default(),
            extensions: Vec::new(),
            models: Vec::new(),
        }
    }
}

impl OdmStorageBuilder {
    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to attachments kept in the document store
    pub fn attachments(mut self, attachments: Arc<dyn AttachmentStore>) -> Self {
        self.attachments = Some(attachments);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn settings(mut self, settings: AuthSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Extend the fields of a model before its indexes are declared
    pub fn on_setup_fields<F>(mut self, model: impl Into<String>, extension: F) -> Self
    where
        F: Fn(&mut Schema) + Send + Sync + 'static,
    {
        self.extensions.push((model.into(), Box::new(extension)));
        self
    }

    /// Register an additional model next to the built-in ones
    pub fn model(mut self, def: ModelDef) -> Self {
        self.models.push(def);
        self
    }

    pub fn build(self) -> DomainResult<OdmStorage> {
        let store = self.store.ok_or_else(|| {
            DomainError::InvalidArgument("a document store is required".to_string())
        })?;
        let attachments = self.attachments.unwrap_or_else(|| {
            Arc::new(DocumentAttachmentStore::new(Arc::clone(&store))) as Arc<dyn AttachmentStore>
        });

        let mut registry = ModelRegistry::new(self.settings.clone());
        for (model, extension) in self.extensions {
            registry.on_setup_fields(model, extension);
        }
        for def in builtin_models().into_iter().chain(self.models) {
            registry.register(def)?;
        }

        let users = registry.get(USER_MODEL)?;
        let roles = registry.get(ROLE_MODEL)?;

        Ok(OdmStorage {
            inner: Arc::new(Inner {
                store,
                attachments,
                events: self.events,
                passwords: PasswordService::new(),
                settings: self.settings,
                registry,
                users,
                roles,
            }),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::driver::StorageDriver;
    use crate::fields::StringCodec;
    use crate::schema::FieldDef;
    use auth_core::{Identity, RecordingEventSink, RepoResult};
    use auth_db::{MemoryAttachmentStore, MemoryDocumentStore};

    pub(crate) fn memory_storage() -> OdmStorage {
        OdmStorage::builder()
            .store(Arc::new(MemoryDocumentStore::new()))
            .attachments(Arc::new(MemoryAttachmentStore::new()))
            .build()
            .unwrap()
    }

    /// Memory storage with unique and text indexes in force
    pub(crate) async fn indexed_storage() -> OdmStorage {
        let storage = memory_storage();
        storage.ensure_indexes().await.unwrap();
        storage
    }

    pub(crate) async fn recording_storage() -> (OdmStorage, Arc<RecordingEventSink>) {
        let events = Arc::new(RecordingEventSink::new());
        let storage = OdmStorage::builder()
            .store(Arc::new(MemoryDocumentStore::new()))
            .attachments(Arc::new(MemoryAttachmentStore::new()))
            .events(events.clone())
            .build()
            .unwrap();
        storage.ensure_indexes().await.unwrap();
        (storage, events)
    }

    struct FailingSink;

    #[async_trait]
    impl EventSink for FailingSink {
        async fn publish(&self, _event: &DomainEvent) -> RepoResult<()> {
            Err(DomainError::CacheError("connection refused".to_string()))
        }
    }

    #[test]
    fn test_build_requires_store() {
        assert!(OdmStorage::builder().build().is_err());
    }

    #[test]
    fn test_builtin_models_registered() {
        let storage = memory_storage();
        let names: Vec<&str> = storage.registry().names().collect();
        assert_eq!(names, vec!["blocked_user", "follower", "role", "user"]);
        assert_eq!(storage.model("user").unwrap().collection(), "users");
        assert_eq!(storage.model("role").unwrap().collection(), "roles");
    }

    #[tokio::test]
    async fn test_save_publishes_created_then_saved() {
        let (storage, events) = recording_storage().await;
        let mut role = storage.create_role("editor", "").await.unwrap();
        role.set_field("description", "Edits").await.unwrap();
        role.save(&ActorContext::system()).await.unwrap();
        // Unchanged: nothing to save
        role.save(&ActorContext::system()).await.unwrap();

        assert_eq!(events.event_types(), vec!["ROLE_CREATED", "ROLE_SAVED"]);
        assert_eq!(events.events()[0].actor_uid(), SYSTEM_UID);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_fail_save() {
        let storage = OdmStorage::builder()
            .store(Arc::new(MemoryDocumentStore::new()))
            .events(Arc::new(FailingSink))
            .build()
            .unwrap();

        let role = storage.create_role("editor", "").await.unwrap();
        assert!(!role.is_new());
    }

    #[tokio::test]
    async fn test_role_in_use_cannot_be_deleted() {
        let storage = indexed_storage().await;
        let mut admin = storage.create_role("admin", "").await.unwrap();
        let mut unused = storage.create_role("unused", "").await.unwrap();
        let mut bob = storage.create_user("bob", None).await.unwrap();
        bob.add_to_field("roles", &admin).await.unwrap();
        bob.save(&ActorContext::system()).await.unwrap();

        let err = admin.delete(&ActorContext::system()).await.unwrap_err();
        assert!(matches!(err, DomainError::ForbidDeletion(_)));

        unused.delete(&ActorContext::system()).await.unwrap();
        // Deleting twice is a no-op
        unused.delete(&ActorContext::system()).await.unwrap();

        bob.sub_from_field("roles", &admin).await.unwrap();
        bob.save(&ActorContext::system()).await.unwrap();
        admin.delete(&ActorContext::system()).await.unwrap();
    }

    #[tokio::test]
    async fn test_legacy_role_reference_blocks_deletion() {
        let storage = indexed_storage().await;
        let mut admin = storage.create_role("admin", "").await.unwrap();
        let mut bob = storage.dispense(USER_MODEL).unwrap();
        bob.set(&storage, "login", "bob").await.unwrap();
        bob.write_raw("roles", serde_json::json!([admin.uid()]));
        storage
            .save_record(&mut bob, &ActorContext::system())
            .await
            .unwrap();

        assert!(admin.delete(&ActorContext::system()).await.is_err());
    }

    #[tokio::test]
    async fn test_unsaved_record_cannot_be_deleted() {
        let storage = memory_storage();
        let mut record = storage.dispense(ROLE_MODEL).unwrap();
        let err = storage
            .delete_record(&mut record, &ActorContext::system())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_required_fields() {
        let storage = memory_storage();
        let mut record = storage.dispense(ROLE_MODEL).unwrap();
        let err = storage
            .save_record(&mut record, &ActorContext::system())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidValue { ref field, .. } if field == "name"));
    }

    #[tokio::test]
    async fn test_field_extensions() {
        let storage = OdmStorage::builder()
            .store(Arc::new(MemoryDocumentStore::new()))
            .on_setup_fields(USER_MODEL, |schema| {
                schema.define_field(FieldDef::new("telegram", StringCodec::max_length(32)));
            })
            .build()
            .unwrap();
        storage.ensure_indexes().await.unwrap();

        let mut bob = storage.create_user("bob", None).await.unwrap();
        bob.set_field("telegram", "@bob").await.unwrap();
        bob.save(&ActorContext::system()).await.unwrap();
        assert_eq!(
            bob.get_field("telegram").await.unwrap().as_str(),
            Some("@bob")
        );
    }

    #[tokio::test]
    async fn test_lookup_placeholders_and_missing() {
        let storage = memory_storage();

        let anonymous = IdentityLookup::<User>::find_by_uid(&storage, ANONYMOUS_UID)
            .await
            .unwrap();
        assert!(anonymous.is_anonymous());
        let system = IdentityLookup::<User>::find_by_uid(&storage, SYSTEM_UID)
            .await
            .unwrap();
        assert!(Identity::is_system(&system));

        let missing = IdentityLookup::<User>::find_by_uid(&storage, "nope").await;
        assert!(matches!(missing, Err(DomainError::UserNotFound)));
        let missing = IdentityLookup::<Role>::find_by_uid(&storage, "nope").await;
        assert!(matches!(missing, Err(DomainError::RoleNotFound(_))));
    }

    #[tokio::test]
    async fn test_nickname_owner() {
        let storage = indexed_storage().await;
        let bob = storage.create_user("bob", None).await.unwrap();

        let owner = storage.nickname_owner(bob.nickname()).await.unwrap();
        assert_eq!(owner.as_deref(), bob.record().id());
        assert_eq!(storage.nickname_owner("nobody").await.unwrap(), None);
    }
}
