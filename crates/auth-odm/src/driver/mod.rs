//! Identity directory driver
//!
//! The storage-driver contract the host framework calls into: create, get,
//! find and count for users and roles.

use async_trait::async_trait;
use tracing::{info, instrument, warn};
use validator::ValidateEmail;

use auth_core::{
    DomainError, DomainResult, EntityKind, Filter, IdentityLookup, Query, SortOrder, StoredRef,
    UserStatus,
};

use crate::finder::{Cursor, Finder};
use crate::models::{ActorContext, Placeholder, Role, User, ROLE_MODEL, USER_MODEL};
use crate::record::{Record, CREATED_FIELD, MODIFIED_FIELD};
use crate::storage::OdmStorage;

/// Historical sort keys and the storage fields they map to
const SORT_ALIASES: [(&str, &str); 4] = [
    ("created", CREATED_FIELD),
    ("modified", MODIFIED_FIELD),
    ("full_name", "first_name"),
    ("is_online", "last_activity"),
];

/// Key for a single-user lookup; exactly one must be set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserLookup {
    pub login: Option<String>,
    pub nickname: Option<String>,
    pub uid: Option<String>,
}

impl UserLookup {
    pub fn by_login(login: impl Into<String>) -> Self {
        Self {
            login: Some(login.into()),
            ..Self::default()
        }
    }

    pub fn by_nickname(nickname: impl Into<String>) -> Self {
        Self {
            nickname: Some(nickname.into()),
            ..Self::default()
        }
    }

    /// Bare uid or `user:<uid>`
    pub fn by_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            ..Self::default()
        }
    }

    fn key(&self) -> DomainResult<(&'static str, &str)> {
        let keys = [
            ("login", self.login.as_deref()),
            ("nickname", self.nickname.as_deref()),
            ("uid", self.uid.as_deref()),
        ];
        exactly_one(keys)
    }
}

/// Key for a single-role lookup; exactly one must be set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleLookup {
    pub name: Option<String>,
    pub uid: Option<String>,
}

impl RoleLookup {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Bare uid or `role:<uid>`
    pub fn by_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            ..Self::default()
        }
    }

    fn key(&self) -> DomainResult<(&'static str, &str)> {
        exactly_one([("name", self.name.as_deref()), ("uid", self.uid.as_deref())])
    }
}

fn exactly_one<'a, const N: usize>(
    keys: [(&'static str, Option<&'a str>); N],
) -> DomainResult<(&'static str, &'a str)> {
    let mut given = keys
        .into_iter()
        .filter_map(|(kind, value)| value.map(|value| (kind, value)));
    match (given.next(), given.next()) {
        (Some(key), None) => Ok(key),
        (None, _) => Err(DomainError::InvalidArgument(
            "a lookup key is required".to_string(),
        )),
        (Some(_), Some(_)) => Err(DomainError::InvalidArgument(
            "only one lookup key may be given".to_string(),
        )),
    }
}

/// Identity directory over a storage backend
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Driver name
    fn name(&self) -> &'static str;

    async fn create_role(&self, name: &str, description: &str) -> DomainResult<Role>;

    async fn get_role(&self, lookup: RoleLookup) -> DomainResult<Role>;

    async fn find_roles(&self, query: Query) -> DomainResult<Cursor<Role>>;

    async fn count_roles(&self, filter: Filter) -> DomainResult<u64>;

    /// Create and save a user. The well-known placeholder logins yield their
    /// in-memory identity and are never stored.
    async fn create_user(&self, login: &str, password: Option<&str>) -> DomainResult<User>;

    /// Look a user up, bypassing any result cache
    async fn get_user(&self, lookup: UserLookup) -> DomainResult<User>;

    async fn find_users(&self, query: Query) -> DomainResult<Cursor<User>>;

    async fn count_users(&self, filter: Filter) -> DomainResult<u64>;

    fn hash_password(&self, password: &str) -> DomainResult<String>;

    /// Ordered `(code, label)` pairs
    fn user_statuses(&self) -> Vec<(&'static str, &'static str)>;
}

#[async_trait]
impl StorageDriver for OdmStorage {
    fn name(&self) -> &'static str {
        "odm"
    }

    #[instrument(skip(self, description))]
    async fn create_role(&self, name: &str, description: &str) -> DomainResult<Role> {
        let mut role = self.dispense_role();
        role.set_field("name", name).await?;
        role.set_field("description", description).await?;
        role.save(&ActorContext::system()).await?;

        info!(uid = %role.uid(), "Role created");
        Ok(role)
    }

    async fn get_role(&self, lookup: RoleLookup) -> DomainResult<Role> {
        let (kind, value) = lookup.key()?;
        if kind == "uid" {
            let uid = StoredRef::parse(value)?.expect_kind(EntityKind::Role)?.uid;
            return IdentityLookup::<Role>::find_by_uid(self, &uid).await;
        }

        let record = self
            .find(ROLE_MODEL)?
            .eq("name", value)?
            .first()
            .await?
            .ok_or_else(|| DomainError::RoleNotFound(value.to_string()))?;
        Ok(Role::from_record(self.clone(), record))
    }

    async fn find_roles(&self, query: Query) -> DomainResult<Cursor<Role>> {
        let storage = self.clone();
        self.sorted_finder(ROLE_MODEL, query)?
            .get_with(move |document| {
                let record = Record::from_document(storage.role_model(), document);
                Role::from_record(storage.clone(), record)
            })
            .await
    }

    async fn count_roles(&self, filter: Filter) -> DomainResult<u64> {
        self.find(ROLE_MODEL)?.filter(filter).count().await
    }

    #[instrument(skip(self, password))]
    async fn create_user(&self, login: &str, password: Option<&str>) -> DomainResult<User> {
        if login.is_empty() {
            return Err(DomainError::InvalidArgument("login is required".to_string()));
        }
        if let Some(kind) = Placeholder::from_login(login) {
            return Ok(self.placeholder(kind));
        }

        let mut user = self.dispense_user();
        user.set_field("login", login).await?;
        if login.validate_email() {
            user.set_field("email", login).await?;
        }
        if let Some(password) = password {
            user.set_field("password", password).await?;
        }
        user.save(&ActorContext::system()).await?;

        info!(uid = %user.uid(), "User created");
        Ok(user)
    }

    async fn get_user(&self, lookup: UserLookup) -> DomainResult<User> {
        let (kind, value) = lookup.key()?;
        let found = match kind {
            "uid" => {
                let uid = StoredRef::parse(value)?.expect_kind(EntityKind::User)?.uid;
                match IdentityLookup::<User>::find_by_uid(self, &uid).await {
                    Ok(user) => Some(user),
                    Err(DomainError::UserNotFound) => None,
                    Err(e) => return Err(e),
                }
            }
            "login" => match Placeholder::from_login(value) {
                Some(placeholder) => Some(self.placeholder(placeholder)),
                None => self.first_user(self.find(USER_MODEL)?.eq("login", value)?).await?,
            },
            _ => self.first_user(self.find(USER_MODEL)?.eq("nickname", value)?).await?,
        };

        found.ok_or_else(|| {
            warn!(lookup = kind, "User not found");
            DomainError::UserNotFound
        })
    }

    async fn find_users(&self, query: Query) -> DomainResult<Cursor<User>> {
        let storage = self.clone();
        self.sorted_finder(USER_MODEL, query.no_cache())?
            .get_with(move |document| {
                let record = Record::from_document(storage.user_model(), document);
                User::from_record(storage.clone(), record)
            })
            .await
    }

    async fn count_users(&self, filter: Filter) -> DomainResult<u64> {
        self.find(USER_MODEL)?.filter(filter).no_cache().count().await
    }

    fn hash_password(&self, password: &str) -> DomainResult<String> {
        self.passwords().hash(password)
    }

    fn user_statuses(&self) -> Vec<(&'static str, &'static str)> {
        UserStatus::options()
    }
}

impl OdmStorage {
    fn sorted_finder(&self, model: &str, mut query: Query) -> DomainResult<Finder> {
        query.sort = remap_sort(query.sort);
        Ok(self.find(model)?.with_query(query))
    }

    async fn first_user(&self, finder: Finder) -> DomainResult<Option<User>> {
        let record = finder.no_cache().first().await?;
        Ok(record.map(|record| User::from_record(self.clone(), record)))
    }
}

fn remap_sort(sort: Vec<(String, SortOrder)>) -> Vec<(String, SortOrder)> {
    sort.into_iter()
        .map(|(field, order)| {
            let field = SORT_ALIASES
                .iter()
                .find(|(alias, _)| *alias == field)
                .map_or(field, |(_, target)| target.to_string());
            (field, order)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::storage::tests::{indexed_storage, memory_storage};
    use auth_core::{Identity, ANONYMOUS_UID};

    #[test]
    fn test_lookup_requires_exactly_one_key() {
        assert!(UserLookup::default().key().is_err());
        let both = UserLookup {
            login: Some("bob".to_string()),
            nickname: Some("bob".to_string()),
            uid: None,
        };
        assert!(matches!(both.key(), Err(DomainError::InvalidArgument(_))));
        assert_eq!(UserLookup::by_login("bob").key().unwrap(), ("login", "bob"));
        assert!(RoleLookup::default().key().is_err());
    }

    #[test]
    fn test_sort_aliases() {
        let sort = remap_sort(vec![
            ("full_name".to_string(), SortOrder::Asc),
            ("is_online".to_string(), SortOrder::Desc),
            ("login".to_string(), SortOrder::Asc),
        ]);
        let fields: Vec<&str> = sort.iter().map(|(field, _)| field.as_str()).collect();
        assert_eq!(fields, vec!["first_name", "last_activity", "login"]);
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let storage = indexed_storage().await;
        let created = storage
            .create_user("bob@example.com", Some("secret"))
            .await
            .unwrap();

        let by_login = storage
            .get_user(UserLookup::by_login("bob@example.com"))
            .await
            .unwrap();
        assert_eq!(by_login.uid(), created.uid());
        let hash = by_login.record().raw_str("password").unwrap();
        assert_ne!(hash, "secret");
        assert!(storage.passwords().verify("secret", hash).unwrap());

        let by_nickname = storage
            .get_user(UserLookup::by_nickname(created.nickname()))
            .await
            .unwrap();
        assert_eq!(by_nickname.uid(), created.uid());

        let composite = format!("user:{}", created.uid());
        let by_uid = storage.get_user(UserLookup::by_uid(composite)).await.unwrap();
        assert_eq!(by_uid.login(), "bob@example.com");

        let missing = storage.get_user(UserLookup::by_login("nobody")).await;
        assert!(matches!(missing, Err(DomainError::UserNotFound)));
        let wrong_kind = storage.get_user(UserLookup::by_uid("role:abc")).await;
        assert!(matches!(wrong_kind, Err(DomainError::TypeMismatch(_))));
    }

    #[tokio::test]
    async fn test_placeholder_logins_are_not_stored() {
        let storage = indexed_storage().await;
        let anonymous = storage
            .create_user(crate::models::ANONYMOUS_LOGIN, None)
            .await
            .unwrap();
        assert!(anonymous.is_anonymous());
        assert_eq!(anonymous.uid(), ANONYMOUS_UID);
        assert_eq!(storage.count_users(Filter::All).await.unwrap(), 0);

        let system = storage
            .get_user(UserLookup::by_login(crate::models::SYSTEM_LOGIN))
            .await
            .unwrap();
        assert!(Identity::is_system(&system));
    }

    #[tokio::test]
    async fn test_get_role() {
        let storage = indexed_storage().await;
        let admin = storage.create_role("admin", "Administrators").await.unwrap();

        let by_name = storage.get_role(RoleLookup::by_name("admin")).await.unwrap();
        assert_eq!(by_name.uid(), admin.uid());
        assert_eq!(by_name.description(), "Administrators");

        let by_uid = storage
            .get_role(RoleLookup::by_uid(format!("role:{}", admin.uid())))
            .await
            .unwrap();
        assert_eq!(by_uid.name(), "admin");

        let missing = storage.get_role(RoleLookup::by_name("nobody")).await;
        assert!(matches!(missing, Err(DomainError::RoleNotFound(_))));
    }

    #[tokio::test]
    async fn test_find_and_count() {
        let storage = indexed_storage().await;
        let people = [("c@x.io", "Carol"), ("a@x.io", "Alice"), ("b@x.io", "Bob")];
        for (login, first_name) in people {
            let mut user = storage.create_user(login, None).await.unwrap();
            user.set_field("first_name", first_name).await.unwrap();
            user.save(&ActorContext::system()).await.unwrap();
        }
        storage.create_role("admin", "").await.unwrap();
        storage.create_role("user", "").await.unwrap();

        let names: Vec<String> = storage
            .find_users(Query::all().sort("full_name", 1))
            .await
            .unwrap()
            .map(|user| user.full_name())
            .collect();
        assert_eq!(names, vec!["Alice", "Bob", "Carol"]);

        let page = storage
            .find_users(Query::all().sort("login", -1).skip(1).limit(1))
            .await
            .unwrap();
        let logins: Vec<String> = page.map(|user| user.login().to_string()).collect();
        assert_eq!(logins, vec!["b@x.io"]);

        let roles = storage.find_roles(Query::all().sort("name", 1)).await.unwrap();
        assert_eq!(roles.len(), 2);

        assert_eq!(storage.count_users(Filter::All).await.unwrap(), 3);
        assert_eq!(
            storage.count_roles(Filter::eq("name", "admin")).await.unwrap(),
            1
        );
    }

    #[test]
    fn test_statuses_and_name() {
        let storage = memory_storage();
        assert_eq!(storage.name(), "odm");
        assert_eq!(storage.user_statuses()[0], ("active", "Active"));
        assert_eq!(storage.user_statuses().len(), 3);
    }

    #[test]
    fn test_storage_is_object_safe_driver() {
        let driver: Arc<dyn StorageDriver> = Arc::new(memory_storage());
        assert_eq!(driver.name(), "odm");
    }
}
