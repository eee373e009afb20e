use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, instrument};

use auth_common::{random_token, AuthSettings};
use auth_core::{
    resolve_identity, Attachment, DomainError, DomainEvent, DomainResult, EntityKind, Identity,
    IdentityLookup, IndexSpec, RelationEvent, ResolvePolicy, UserStatus, ANONYMOUS_UID, SYSTEM_UID,
};

use super::{
    ActorContext, Role, ANONYMOUS_LOGIN, BLOCKED_USER_MODEL, FOLLOWER_MODEL, SYSTEM_LOGIN,
};
use crate::fields::{
    to_reference, AttachmentCodec, BoolCodec, DateTimeCodec, DictCodec, EnumCodec, FieldInput,
    FieldValue, IntegerCodec, NicknameCodec, PasswordCodec, RolesField, StatusCodec, StringCodec,
    UniqueStringListCodec,
};
use crate::finder::Finder;
use crate::hooks::md5_hex;
use crate::record::Record;
use crate::schema::{FieldDef, Schema};
use crate::storage::OdmStorage;

/// Fields the text index may cover, when they hold text
const TEXT_INDEX_CANDIDATES: [&str; 11] = [
    "login",
    "nickname",
    "first_name",
    "last_name",
    "position",
    "city",
    "country",
    "province",
    "district",
    "street",
    "phone",
];

pub(crate) fn setup_fields(schema: &mut Schema, settings: &AuthSettings) {
    let name = || StringCodec::max_length(settings.name_max_length);
    let address = || StringCodec::max_length(settings.address_max_length);

    schema
        .define_field(FieldDef::new("uid", StringCodec::new()).required().immutable())
        .define_field(
            FieldDef::new("login", StringCodec::max_length(settings.login_max_length)).required(),
        )
        .define_field(
            FieldDef::new("nickname", NicknameCodec::from_settings(settings)).required(),
        )
        .define_field(FieldDef::new("password", PasswordCodec).required())
        .define_field(FieldDef::new("confirmation_hash", StringCodec::new()))
        .define_field(FieldDef::new("is_public", BoolCodec))
        .define_field(FieldDef::new("first_name", name()))
        .define_field(FieldDef::new("middle_name", name()))
        .define_field(FieldDef::new("last_name", name()))
        .define_field(FieldDef::new(
            "position",
            StringCodec::max_length(settings.position_max_length),
        ))
        .define_field(FieldDef::new(
            "description",
            StringCodec::max_length(settings.description_max_length),
        ))
        .define_field(FieldDef::new("birth_date", DateTimeCodec))
        .define_field(FieldDef::new("timezone", StringCodec::new()))
        .define_field(FieldDef::new("last_sign_in", DateTimeCodec))
        .define_field(FieldDef::new("last_activity", DateTimeCodec))
        .define_field(FieldDef::new("sign_in_count", IntegerCodec))
        .define_field(FieldDef::new("status", StatusCodec))
        .define_field(FieldDef::new("roles", RolesField::new()))
        .define_field(FieldDef::new("gender", EnumCodec::new(["m", "f"])))
        .define_field(FieldDef::new(
            "phone",
            StringCodec::max_length(settings.phone_max_length),
        ))
        .define_field(FieldDef::new(
            "email",
            StringCodec::max_length(settings.login_max_length),
        ))
        .define_field(FieldDef::new("options", DictCodec))
        .define_field(FieldDef::new("picture", AttachmentCodec))
        .define_field(FieldDef::new("cover_picture", AttachmentCodec))
        .define_field(FieldDef::new("urls", UniqueStringListCodec))
        .define_field(FieldDef::new("follows_count", IntegerCodec))
        .define_field(FieldDef::new("followers_count", IntegerCodec))
        .define_field(FieldDef::new("blocked_users_count", IntegerCodec))
        .define_field(FieldDef::new("last_ip", StringCodec::new()))
        .define_field(FieldDef::new("country", address()))
        .define_field(FieldDef::new("province", address()))
        .define_field(FieldDef::new("city", address()))
        .define_field(FieldDef::new("district", address()))
        .define_field(FieldDef::new("street", address()))
        .define_field(FieldDef::new("building", address()))
        .define_field(FieldDef::new("apt_number", address()))
        .define_field(FieldDef::new("postal_code", address()));
}

pub(crate) fn setup_indexes(schema: &mut Schema) {
    let text_fields = schema.textual_fields(&TEXT_INDEX_CANDIDATES);
    let text_index = IndexSpec::text(text_fields).named("text_index");

    schema
        .define_index(IndexSpec::asc(["uid"]).unique())
        .define_index(IndexSpec::asc(["login"]).unique())
        .define_index(IndexSpec::asc(["nickname"]).unique())
        .define_index(IndexSpec::desc("last_sign_in"))
        .define_index(text_index);
}

/// Well-known identities that only exist in memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placeholder {
    Anonymous,
    System,
}

impl Placeholder {
    pub(crate) fn uid(self) -> &'static str {
        match self {
            Self::Anonymous => ANONYMOUS_UID,
            Self::System => SYSTEM_UID,
        }
    }

    pub(crate) fn login(self) -> &'static str {
        match self {
            Self::Anonymous => ANONYMOUS_LOGIN,
            Self::System => SYSTEM_LOGIN,
        }
    }

    pub(crate) fn from_login(login: &str) -> Option<Self> {
        match login {
            ANONYMOUS_LOGIN => Some(Self::Anonymous),
            SYSTEM_LOGIN => Some(Self::System),
            _ => None,
        }
    }
}

/// Relation between two users kept as edge records
#[derive(Debug, Clone, Copy)]
enum Relation {
    Follow,
    Block,
}

impl Relation {
    fn model(self) -> &'static str {
        match self {
            Self::Follow => FOLLOWER_MODEL,
            Self::Block => BLOCKED_USER_MODEL,
        }
    }

    fn from_field(self) -> &'static str {
        match self {
            Self::Follow => "follower",
            Self::Block => "blocker",
        }
    }

    fn to_field(self) -> &'static str {
        match self {
            Self::Follow => "follows",
            Self::Block => "blocked",
        }
    }

    fn added(self, event: RelationEvent) -> DomainEvent {
        match self {
            Self::Follow => DomainEvent::FollowAdded(event),
            Self::Block => DomainEvent::UserBlocked(event),
        }
    }

    fn removed(self, event: RelationEvent) -> DomainEvent {
        match self {
            Self::Follow => DomainEvent::FollowRemoved(event),
            Self::Block => DomainEvent::UserUnblocked(event),
        }
    }
}

/// Domain view of a user record
///
/// The anonymous and system users are recognised by their logins; they are
/// never persisted and reference fields store them by their well-known uids.
#[derive(Clone)]
pub struct User {
    record: Record,
    storage: OdmStorage,
}

impl User {
    pub(crate) fn from_record(storage: OdmStorage, record: Record) -> Self {
        Self { record, storage }
    }

    /// In-memory placeholder identity
    pub(crate) fn placeholder(storage: OdmStorage, mut record: Record, kind: Placeholder) -> Self {
        record.write_raw("uid", Value::String(kind.uid().to_string()));
        record.write_raw("login", Value::String(kind.login().to_string()));
        record.write_raw("nickname", Value::String(kind.uid().to_lowercase()));
        Self { record, storage }
    }

    fn placeholder_kind(&self) -> Option<Placeholder> {
        Placeholder::from_login(self.login())
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Canonical uid; empty until first saved
    pub fn uid(&self) -> String {
        match self.placeholder_kind() {
            Some(kind) => kind.uid().to_string(),
            None => self.record.raw_str("uid").unwrap_or_default().to_string(),
        }
    }

    pub fn login(&self) -> &str {
        self.record.raw_str("login").unwrap_or_default()
    }

    pub fn nickname(&self) -> &str {
        self.record.raw_str("nickname").unwrap_or_default()
    }

    pub fn email(&self) -> Option<&str> {
        self.record.raw_str("email")
    }

    pub fn status(&self) -> UserStatus {
        self.record
            .raw_str("status")
            .and_then(|code| UserStatus::from_str(code).ok())
            .unwrap_or_default()
    }

    /// First and last name, or the nickname when both are empty
    pub fn full_name(&self) -> String {
        let parts: Vec<&str> = ["first_name", "last_name"]
            .into_iter()
            .filter_map(|field| self.record.raw_str(field))
            .collect();
        if parts.is_empty() {
            self.nickname().to_string()
        } else {
            parts.join(" ")
        }
    }

    /// True while `confirmation_hash` is empty
    pub fn is_confirmed(&self) -> bool {
        self.record.raw_str("confirmation_hash").is_none()
    }

    pub fn is_anonymous(&self) -> bool {
        self.placeholder_kind() == Some(Placeholder::Anonymous)
    }

    pub fn is_system(&self) -> bool {
        self.placeholder_kind() == Some(Placeholder::System)
    }

    pub fn is_new(&self) -> bool {
        self.record.is_new()
    }

    pub fn is_modified(&self) -> bool {
        self.record.is_modified()
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.record.created()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.record.has_field(field)
    }

    pub async fn roles(&self) -> DomainResult<Vec<Role>> {
        Ok(self.record.get(&self.storage, "roles").await?.into_roles())
    }

    pub async fn has_role(&self, name: &str) -> DomainResult<bool> {
        Ok(self.roles().await?.iter().any(|role| role.name() == name))
    }

    pub fn verify_password(&self, password: &str) -> DomainResult<bool> {
        match self.record.raw_str("password") {
            Some(hash) => self.storage.passwords().verify(password, hash),
            None => Ok(false),
        }
    }

    /// Field value, including the relation-backed virtual fields
    ///
    /// Reading `picture` may provision and save a Gravatar picture. Only the
    /// picture is persisted; other pending changes stay unsaved.
    pub async fn get_field(&mut self, field: &str) -> DomainResult<FieldValue> {
        match field {
            "follows" => Ok(FieldValue::Users(self.follows(0, None).await?)),
            "followers" => Ok(FieldValue::Users(self.followers().await?)),
            "blocked_users" => Ok(FieldValue::Users(self.blocked_users().await?)),
            "follows_count" => count_value(self.follows_count().await),
            "followers_count" => count_value(self.followers_count().await),
            "blocked_users_count" => count_value(self.blocked_users_count().await),
            "is_confirmed" => Ok(FieldValue::Value(Value::Bool(self.is_confirmed()))),
            "picture" => Ok(self
                .picture()
                .await?
                .map_or(FieldValue::Null, FieldValue::Attachment)),
            _ => self.record.get(&self.storage, field).await,
        }
    }

    pub async fn set_field(
        &mut self,
        field: &str,
        value: impl Into<FieldInput> + Send,
    ) -> DomainResult<&mut Self> {
        if field == "is_confirmed" {
            let confirmed = match value.into() {
                FieldInput::Value(Value::Bool(confirmed)) => confirmed,
                other => {
                    return Err(DomainError::TypeMismatch(format!(
                        "field 'is_confirmed': bool expected, got {}",
                        other.type_name()
                    )))
                }
            };
            let hash = if confirmed {
                Value::Null
            } else {
                Value::String(random_token(64))
            };
            self.record.set(&self.storage, "confirmation_hash", hash).await?;
        } else {
            self.record.set(&self.storage, field, value).await?;
        }
        Ok(self)
    }

    /// `follows` and `blocked_users` create relation records; other fields
    /// add to the stored value
    pub async fn add_to_field(
        &mut self,
        field: &str,
        value: impl Into<FieldInput> + Send,
    ) -> DomainResult<&mut Self> {
        match field {
            "follows" => self.add_relation(Relation::Follow, value.into()).await?,
            "blocked_users" => self.add_relation(Relation::Block, value.into()).await?,
            _ => self.record.add(&self.storage, field, value).await?,
        }
        Ok(self)
    }

    pub async fn sub_from_field(
        &mut self,
        field: &str,
        value: impl Into<FieldInput> + Send,
    ) -> DomainResult<&mut Self> {
        match field {
            "follows" => self.remove_relation(Relation::Follow, value.into()).await?,
            "blocked_users" => self.remove_relation(Relation::Block, value.into()).await?,
            _ => self.record.sub(&self.storage, field, value).await?,
        }
        Ok(self)
    }

    /// Users this user follows, oldest relation first
    pub async fn follows(&self, skip: usize, limit: Option<usize>) -> DomainResult<Vec<User>> {
        let mut finder = self.relations(Relation::Follow, "follower", self)?.skip(skip);
        if let Some(limit) = limit {
            finder = finder.limit(limit);
        }
        self.relation_ends(finder, "follows").await
    }

    pub async fn followers(&self) -> DomainResult<Vec<User>> {
        let finder = self.relations(Relation::Follow, "follows", self)?;
        self.relation_ends(finder, "follower").await
    }

    pub async fn blocked_users(&self) -> DomainResult<Vec<User>> {
        let finder = self.relations(Relation::Block, "blocker", self)?;
        self.relation_ends(finder, "blocked").await
    }

    pub async fn follows_count(&self) -> DomainResult<u64> {
        self.relations(Relation::Follow, "follower", self)?.count().await
    }

    pub async fn followers_count(&self) -> DomainResult<u64> {
        self.relations(Relation::Follow, "follows", self)?.count().await
    }

    pub async fn blocked_users_count(&self) -> DomainResult<u64> {
        self.relations(Relation::Block, "blocker", self)?.count().await
    }

    pub async fn is_follows(&self, other: &User) -> DomainResult<bool> {
        self.has_relation(Relation::Follow, self, other).await
    }

    pub async fn is_followed(&self, other: &User) -> DomainResult<bool> {
        self.has_relation(Relation::Follow, other, self).await
    }

    pub async fn is_blocks(&self, other: &User) -> DomainResult<bool> {
        self.has_relation(Relation::Block, self, other).await
    }

    pub async fn save(&mut self, actor: &ActorContext) -> DomainResult<()> {
        self.reject_placeholder("saved")?;
        let storage = self.storage.clone();
        storage.save_record(&mut self.record, actor).await
    }

    /// Fails with a forbid-deletion error when `actor` is this user
    pub async fn delete(&mut self, actor: &ActorContext) -> DomainResult<()> {
        self.reject_placeholder("deleted")?;
        let storage = self.storage.clone();
        storage.delete_record(&mut self.record, actor).await
    }

    fn reject_placeholder(&self, operation: &str) -> DomainResult<()> {
        match self.placeholder_kind() {
            Some(kind) => Err(DomainError::PolicyViolation(format!(
                "the {} user cannot be {operation}",
                kind.uid().to_lowercase()
            ))),
            None => Ok(()),
        }
    }

    /// Stored picture, falling back to a Gravatar picture for saved users
    async fn picture(&mut self) -> DomainResult<Option<Attachment>> {
        if let Some(picture) = self
            .record
            .get(&self.storage, "picture")
            .await?
            .into_attachment()
        {
            return Ok(Some(picture));
        }

        let settings = self.storage.settings();
        if !settings.gravatar_fallback
            || self.record.is_new()
            || self.record.is_deleted()
            || self.placeholder_kind().is_some()
        {
            return Ok(None);
        }

        let url = format!(
            "https://www.gravatar.com/avatar/{}?s={}",
            md5_hex(self.login()),
            settings.gravatar_size
        );
        let picture = self.storage.attachments().create_from_url(&url).await?;
        if self.record.is_modified() {
            // Persist only the picture; pending edits stay unsaved
            let mut stored =
                IdentityLookup::<User>::find_by_uid(&self.storage, &self.uid()).await?;
            stored
                .record
                .set(&self.storage, "picture", picture.clone())
                .await?;
            stored.save(&ActorContext::system()).await?;
            self.record
                .set(&self.storage, "picture", picture.clone())
                .await?;
        } else {
            self.record
                .set(&self.storage, "picture", picture.clone())
                .await?;
            self.save(&ActorContext::system()).await?;
        }

        debug!(uid = %self.uid(), "Gravatar picture provisioned");
        Ok(Some(picture))
    }

    fn relations(&self, relation: Relation, field: &str, user: &User) -> DomainResult<Finder> {
        self.storage.find(relation.model())?.eq(field, user)
    }

    async fn relation_ends(&self, finder: Finder, end: &str) -> DomainResult<Vec<User>> {
        let mut users = Vec::new();
        for edge in finder.sort("_created", 1).get().await? {
            if let Some(user) = edge.get(&self.storage, end).await?.into_user() {
                users.push(user);
            }
        }
        Ok(users)
    }

    async fn has_relation(&self, relation: Relation, from: &User, to: &User) -> DomainResult<bool> {
        let count = self
            .relations(relation, relation.from_field(), from)?
            .eq(relation.to_field(), to)?
            .count()
            .await?;
        Ok(count > 0)
    }

    /// Create the relation record unless it exists; the target may not be
    /// this user
    #[instrument(skip(self, input), fields(uid = %self.uid()))]
    async fn add_relation(&self, relation: Relation, input: FieldInput) -> DomainResult<()> {
        let policy = ResolvePolicy::default().exclude(self.uid());
        let raw = to_reference::<User>(relation.to_field(), input)?;
        let target = resolve_identity(&self.storage, raw, &policy).await?;

        if self.has_relation(relation, self, &target).await? {
            return Ok(());
        }

        let actor = ActorContext::for_user(self);
        let mut edge = self.storage.dispense(relation.model())?;
        edge.set(&self.storage, relation.from_field(), self).await?;
        edge.set(&self.storage, relation.to_field(), &target).await?;
        self.storage.save_record(&mut edge, &actor).await?;

        self.storage
            .publish(relation.added(RelationEvent::new(self.uid(), target.uid(), actor.uid())))
            .await;
        Ok(())
    }

    #[instrument(skip(self, input), fields(uid = %self.uid()))]
    async fn remove_relation(&self, relation: Relation, input: FieldInput) -> DomainResult<()> {
        let policy = ResolvePolicy::default().allow_system().allow_anonymous();
        let raw = to_reference::<User>(relation.to_field(), input)?;
        let target = resolve_identity(&self.storage, raw, &policy).await?;

        let removed = self
            .relations(relation, relation.from_field(), self)?
            .eq(relation.to_field(), &target)?
            .delete()
            .await?;

        if removed > 0 {
            let actor = ActorContext::for_user(self);
            self.storage
                .publish(relation.removed(RelationEvent::new(
                    self.uid(),
                    target.uid(),
                    actor.uid(),
                )))
                .await;
        }
        Ok(())
    }
}

fn count_value(count: DomainResult<u64>) -> DomainResult<FieldValue> {
    count.map(|count| FieldValue::Value(Value::from(count)))
}

impl Identity for User {
    const KIND: EntityKind = EntityKind::User;

    fn uid(&self) -> String {
        User::uid(self)
    }

    fn label(&self) -> String {
        self.login().to_string()
    }

    fn is_anonymous(&self) -> bool {
        User::is_anonymous(self)
    }

    fn is_system(&self) -> bool {
        User::is_system(self)
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("uid", &self.uid())
            .field("login", &self.login())
            .field("state", &self.record.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{StorageDriver, UserLookup};
    use crate::storage::tests::{indexed_storage, recording_storage};
    use serde_json::json;

    async fn create(storage: &OdmStorage, login: &str) -> User {
        storage.create_user(login, Some("pw")).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_user_defaults() {
        let storage = indexed_storage().await;
        let user = create(&storage, "bob@example.com").await;

        assert_eq!(user.uid(), user.record().id().unwrap());
        assert_eq!(user.email(), Some("bob@example.com"));
        assert_eq!(user.nickname(), md5_hex("bob@example.com"));
        assert_eq!(user.status(), UserStatus::Active);
        assert!(user.is_confirmed());
        assert!(user.verify_password("pw").unwrap());
        assert!(!user.verify_password("wrong").unwrap());

        let plain = storage.create_user("bob", None).await.unwrap();
        assert_eq!(plain.email(), None);
        assert!(!plain.verify_password("").unwrap());
    }

    #[tokio::test]
    async fn test_nickname_collisions_get_suffixes() {
        let storage = indexed_storage().await;
        let mut nicknames = Vec::new();
        for login in ["a@example.com", "b@example.com", "c@example.com"] {
            let mut user = create(&storage, login).await;
            user.set_field("nickname", "Alice").await.unwrap();
            user.save(&ActorContext::system()).await.unwrap();
            nicknames.push(user.nickname().to_string());
        }
        assert_eq!(nicknames, vec!["alice", "alice-1", "alice-2"]);

        // Re-setting its own nickname keeps it
        let mut first = storage
            .get_user(UserLookup::by_nickname("alice"))
            .await
            .unwrap();
        first.set_field("nickname", "alice").await.unwrap();
        assert_eq!(first.nickname(), "alice");
    }

    #[tokio::test]
    async fn test_nickname_taken_before_save_gets_suffix() {
        let storage = indexed_storage().await;
        let mut first = create(&storage, "a@example.com").await;
        let mut second = create(&storage, "b@example.com").await;

        // Both see "alice" as free when setting it
        first.set_field("nickname", "alice").await.unwrap();
        second.set_field("nickname", "alice").await.unwrap();
        assert_eq!(second.nickname(), "alice");

        first.save(&ActorContext::system()).await.unwrap();
        second.save(&ActorContext::system()).await.unwrap();
        assert_eq!(first.nickname(), "alice");
        assert_eq!(second.nickname(), "alice-1");

        // Saving again keeps its own nickname
        second.set_field("first_name", "Bob").await.unwrap();
        second.save(&ActorContext::system()).await.unwrap();
        assert_eq!(second.nickname(), "alice-1");
    }

    #[tokio::test]
    async fn test_transliterated_nickname_is_bounded() {
        let storage = indexed_storage().await;
        let settings = storage.settings().clone();
        let mut user = create(&storage, "bob@example.com").await;

        user.set_field("nickname", "中".repeat(32)).await.unwrap();
        user.save(&ActorContext::system()).await.unwrap();
        assert!(user.nickname().starts_with("zhong"));
        assert!(user.nickname().len() <= settings.nickname_base_length);
        assert!(user.nickname().len() <= settings.nickname_max_length);
    }

    #[tokio::test]
    async fn test_uid_is_immutable() {
        let storage = indexed_storage().await;
        let mut user = create(&storage, "bob@example.com").await;

        let err = user.set_field("uid", "other").await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_is_confirmed() {
        let storage = indexed_storage().await;
        let mut user = create(&storage, "bob@example.com").await;

        user.set_field("is_confirmed", false).await.unwrap();
        assert_eq!(
            user.record().raw_str("confirmation_hash").map(str::len),
            Some(64)
        );
        assert_eq!(
            user.get_field("is_confirmed").await.unwrap().as_bool(),
            Some(false)
        );

        user.set_field("is_confirmed", true).await.unwrap();
        assert!(user.is_confirmed());
    }

    #[tokio::test]
    async fn test_follow_relations() {
        let (storage, events) = recording_storage().await;
        let mut alice = create(&storage, "alice@example.com").await;
        let bob = create(&storage, "bob@example.com").await;
        events.clear();

        alice.add_to_field("follows", &bob).await.unwrap();
        // Idempotent
        alice.add_to_field("follows", bob.uid()).await.unwrap();

        assert!(alice.is_follows(&bob).await.unwrap());
        assert!(bob.is_followed(&alice).await.unwrap());
        assert!(!bob.is_follows(&alice).await.unwrap());
        assert_eq!(alice.follows_count().await.unwrap(), 1);
        assert_eq!(
            alice.get_field("followers_count").await.unwrap().as_i64(),
            Some(0)
        );

        let follows: Vec<String> = alice
            .follows(0, None)
            .await
            .unwrap()
            .iter()
            .map(User::uid)
            .collect();
        assert_eq!(follows, vec![bob.uid()]);
        let followers = bob.followers().await.unwrap();
        assert_eq!(followers[0].login(), "alice@example.com");

        alice.sub_from_field("follows", &bob).await.unwrap();
        assert!(!alice.is_follows(&bob).await.unwrap());

        let relation_events: Vec<&str> = events
            .event_types()
            .into_iter()
            .filter(|t| t.starts_with("FOLLOW"))
            .collect();
        assert_eq!(relation_events, vec!["FOLLOW_ADDED", "FOLLOW_REMOVED"]);
    }

    #[tokio::test]
    async fn test_self_and_placeholder_relations_are_rejected() {
        let storage = indexed_storage().await;
        let mut alice = create(&storage, "alice@example.com").await;
        let alice_again = alice.clone();

        let err = alice.add_to_field("follows", &alice_again).await.unwrap_err();
        assert!(matches!(err, DomainError::PolicyViolation(_)));

        let err = alice
            .add_to_field("blocked_users", storage.anonymous_user())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::PolicyViolation(_)));
        assert_eq!(alice.blocked_users_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_block_relations() {
        let storage = indexed_storage().await;
        let mut alice = create(&storage, "alice@example.com").await;
        let bob = create(&storage, "bob@example.com").await;

        alice.add_to_field("blocked_users", &bob).await.unwrap();
        assert!(alice.is_blocks(&bob).await.unwrap());
        let blocked = alice.get_field("blocked_users").await.unwrap().into_users();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].uid(), bob.uid());

        alice.sub_from_field("blocked_users", &bob).await.unwrap();
        assert!(!alice.is_blocks(&bob).await.unwrap());
    }

    #[tokio::test]
    async fn test_self_deletion_is_forbidden() {
        let storage = indexed_storage().await;
        let mut bob = create(&storage, "bob@example.com").await;
        let actor = ActorContext::for_user(&bob);

        let err = bob.delete(&actor).await.unwrap_err();
        assert!(matches!(err, DomainError::ForbidDeletion(_)));

        bob.delete(&ActorContext::system()).await.unwrap();
        assert!(storage
            .get_user(UserLookup::by_login("bob@example.com"))
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let storage = indexed_storage().await;
        let mut alice = create(&storage, "alice@example.com").await;
        let mut bob = create(&storage, "bob@example.com").await;
        alice.add_to_field("follows", &bob).await.unwrap();
        bob.add_to_field("blocked_users", &alice).await.unwrap();

        let cover = storage
            .attachments()
            .create_from_url("https://cdn.example.com/cover.png")
            .await
            .unwrap();
        let picture = storage
            .attachments()
            .create_from_url("https://cdn.example.com/me.png")
            .await
            .unwrap();
        bob.set_field("cover_picture", cover.clone()).await.unwrap();
        bob.set_field("picture", picture.clone()).await.unwrap();
        bob.save(&ActorContext::system()).await.unwrap();

        // Removed concurrently; the cascade still succeeds
        storage.attachments().delete(&cover.id).await.unwrap();

        bob.delete(&ActorContext::system()).await.unwrap();
        assert!(storage
            .attachments()
            .get(&picture.id)
            .await
            .unwrap_err()
            .is_not_found());
        assert_eq!(alice.follows_count().await.unwrap(), 0);
        let blocks = storage.find(BLOCKED_USER_MODEL).unwrap().count().await.unwrap();
        assert_eq!(blocks, 0);
    }

    #[tokio::test]
    async fn test_gravatar_fallback() {
        let storage = indexed_storage().await;
        let mut bob = create(&storage, "bob@example.com").await;

        let picture = bob.get_field("picture").await.unwrap().into_attachment().unwrap();
        assert_eq!(
            picture.url,
            format!(
                "https://www.gravatar.com/avatar/{}?s=512",
                md5_hex("bob@example.com")
            )
        );

        let stored = storage
            .get_user(UserLookup::by_login("bob@example.com"))
            .await
            .unwrap();
        assert_eq!(stored.record().raw("picture"), &json!(picture.id));
    }

    #[tokio::test]
    async fn test_gravatar_fallback_keeps_pending_changes_unsaved() {
        let storage = indexed_storage().await;
        let mut bob = create(&storage, "bob@example.com").await;
        bob.set_field("first_name", "Robert").await.unwrap();

        let picture = bob.get_field("picture").await.unwrap().into_attachment().unwrap();
        assert_eq!(bob.record().raw("first_name"), &json!("Robert"));

        let stored = storage
            .get_user(UserLookup::by_login("bob@example.com"))
            .await
            .unwrap();
        assert_eq!(stored.record().raw("picture"), &json!(picture.id));
        assert!(stored.record().raw("first_name").is_null());
    }

    #[tokio::test]
    async fn test_placeholders_are_not_saved() {
        let storage = indexed_storage().await;
        let mut anonymous = storage.anonymous_user();
        assert!(anonymous.is_anonymous());
        assert_eq!(anonymous.uid(), ANONYMOUS_UID);

        let err = anonymous.save(&ActorContext::system()).await.unwrap_err();
        assert!(err.is_policy());
        assert!(anonymous.get_field("picture").await.unwrap().is_null());
    }

    #[tokio::test]
    async fn test_roles() {
        let storage = indexed_storage().await;
        let admin = storage.create_role("admin", "").await.unwrap();
        let mut bob = create(&storage, "bob@example.com").await;

        bob.set_field("roles", vec![admin.clone()]).await.unwrap();
        bob.save(&ActorContext::system()).await.unwrap();

        assert!(bob.has_role("admin").await.unwrap());
        assert_eq!(
            bob.record().raw("roles"),
            &json!([format!("role:{}", admin.uid())])
        );
    }

    #[tokio::test]
    async fn test_full_name() {
        let storage = indexed_storage().await;
        let mut bob = create(&storage, "bob@example.com").await;
        assert_eq!(bob.full_name(), bob.nickname());

        bob.set_field("first_name", "Bob").await.unwrap();
        bob.set_field("last_name", "Stone").await.unwrap();
        assert_eq!(bob.full_name(), "Bob Stone");
    }
}
