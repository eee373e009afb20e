//! Directory Integration Tests
//!
//! Scenarios run against the in-memory store. The PostgreSQL and Redis
//! variants require:
//! - Environment variables: DATABASE_URL, REDIS_URL
//!
//! Run with: cargo test -p integration-tests --test directory_tests

use std::collections::BTreeSet;

use auth_core::{
    resolve_identity, DocumentLink, DomainError, DomainEvent, EventSink, Filter, Query, Reference,
    ResolvePolicy, UserEvent, ANONYMOUS_UID,
};
use auth_odm::{ActorContext, FieldInput, Role, RoleLookup, StorageDriver, User, UserLookup};
use integration_tests::{redis_publisher, unique_login, unique_nickname, unique_role, TestStorage};

// ============================================================================
// Users
// ============================================================================

#[tokio::test]
async fn test_create_then_get_user_by_login() {
    let TestStorage { storage, .. } = TestStorage::memory().await.unwrap();

    for login in ["bob@example.com", "plain-login", "Ünïcode@example.com"] {
        storage.create_user(login, None).await.unwrap();
        let user = storage.get_user(UserLookup::by_login(login)).await.unwrap();

        assert_eq!(user.login(), login);
        let hash = user.record().raw_str("password").unwrap();
        assert!(!hash.is_empty());
        assert!(storage.passwords().is_hash(hash));
    }
}

#[tokio::test]
async fn test_password_never_stored_in_plain() {
    let TestStorage { storage, .. } = TestStorage::memory().await.unwrap();

    let mut user = storage.create_user("bob@example.com", None).await.unwrap();
    user.set_field("password", "secret").await.unwrap();
    user.save(&ActorContext::system()).await.unwrap();

    let mut stored = storage
        .get_user(UserLookup::by_login("bob@example.com"))
        .await
        .unwrap();
    let raw = stored.get_field("password").await.unwrap();
    let hash = raw.as_str().unwrap().to_string();
    assert_ne!(hash, "secret");
    assert!(storage.passwords().verify("secret", &hash).unwrap());
    assert!(stored.verify_password("secret").unwrap());

    // Saving an empty password keeps the previous hash
    stored.set_field("password", "").await.unwrap();
    stored.save(&ActorContext::system()).await.unwrap();
    assert!(stored.verify_password("secret").unwrap());
}

#[tokio::test]
async fn test_nickname_collisions_get_increasing_suffixes() {
    let TestStorage { storage, .. } = TestStorage::memory().await.unwrap();

    let mut nicknames = Vec::new();
    for n in 0..4 {
        let mut user = storage
            .create_user(&format!("alice{n}@example.com"), None)
            .await
            .unwrap();
        user.set_field("nickname", "Alice").await.unwrap();
        user.save(&ActorContext::system()).await.unwrap();
        nicknames.push(user.nickname().to_string());
    }

    assert_eq!(nicknames, vec!["alice", "alice-1", "alice-2", "alice-3"]);
    let distinct: BTreeSet<&String> = nicknames.iter().collect();
    assert_eq!(distinct.len(), nicknames.len());
}

#[tokio::test]
async fn test_find_users_sorted_by_full_name() {
    let TestStorage { storage, .. } = TestStorage::memory().await.unwrap();
    let people = [("z@x.io", "Zoe"), ("m@x.io", "Mia"), ("a@x.io", "Ann")];
    for (login, first_name) in people {
        let mut user = storage.create_user(login, None).await.unwrap();
        user.set_field("first_name", first_name).await.unwrap();
        user.save(&ActorContext::system()).await.unwrap();
    }

    let names: Vec<String> = storage
        .find_users(Query::all().sort("full_name", 1))
        .await
        .unwrap()
        .map(|user| user.full_name())
        .collect();
    assert_eq!(names, vec!["Ann", "Mia", "Zoe"]);

    let online = storage
        .find_users(Query::all().sort("is_online", -1).limit(2))
        .await
        .unwrap();
    assert_eq!(online.len(), 2);
}

#[tokio::test]
async fn test_get_user_requires_exactly_one_key() {
    let TestStorage { storage, .. } = TestStorage::memory().await.unwrap();

    let none = storage.get_user(UserLookup::default()).await;
    assert!(matches!(none, Err(DomainError::InvalidArgument(_))));

    let two = UserLookup {
        login: Some("a".to_string()),
        uid: Some("b".to_string()),
        ..UserLookup::default()
    };
    assert!(matches!(
        storage.get_user(two).await,
        Err(DomainError::InvalidArgument(_))
    ));

    let missing = storage.get_user(UserLookup::by_nickname("ghost")).await;
    assert!(matches!(missing, Err(e) if e.is_not_found()));
}

#[tokio::test]
async fn test_user_cannot_delete_itself() {
    let TestStorage { storage, events } = TestStorage::memory().await.unwrap();
    let mut bob = storage.create_user("bob@example.com", None).await.unwrap();

    let err = bob.delete(&ActorContext::for_user(&bob)).await.unwrap_err();
    assert!(matches!(err, DomainError::ForbidDeletion(_)));

    bob.delete(&ActorContext::system()).await.unwrap();
    assert!(events.event_types().contains(&"USER_DELETED"));
    assert_eq!(storage.count_users(Filter::All).await.unwrap(), 0);
}

#[tokio::test]
async fn test_deleting_user_removes_relations() {
    let TestStorage { storage, .. } = TestStorage::memory().await.unwrap();
    let mut alice = storage.create_user("alice@example.com", None).await.unwrap();
    let mut bob = storage.create_user("bob@example.com", None).await.unwrap();
    let carol = storage.create_user("carol@example.com", None).await.unwrap();

    alice.add_to_field("follows", &bob).await.unwrap();
    alice.add_to_field("blocked_users", &carol).await.unwrap();
    bob.add_to_field("follows", &alice).await.unwrap();
    assert_eq!(bob.followers_count().await.unwrap(), 1);

    alice.delete(&ActorContext::system()).await.unwrap();

    assert_eq!(bob.followers_count().await.unwrap(), 0);
    assert_eq!(bob.follows_count().await.unwrap(), 0);
    let blocked_edges = storage
        .find("blocked_user")
        .unwrap()
        .count()
        .await
        .unwrap();
    assert_eq!(blocked_edges, 0);
    assert_eq!(carol.followers_count().await.unwrap(), 0);
}

// ============================================================================
// References
// ============================================================================

#[tokio::test]
async fn test_anonymous_reference_rejected_in_every_shape() {
    let TestStorage { storage, .. } = TestStorage::memory().await.unwrap();
    let policy = ResolvePolicy::default().allow_system();

    let shapes: Vec<Reference<User>> = vec![
        Reference::Live(storage.anonymous_user()),
        Reference::Identifier(ANONYMOUS_UID.to_string()),
        Reference::Identifier(format!("user:{ANONYMOUS_UID}")),
        Reference::RawLink(DocumentLink::new("users", ANONYMOUS_UID)),
    ];
    for raw in shapes {
        let result = resolve_identity(&storage, raw, &policy).await;
        assert!(matches!(result, Err(DomainError::PolicyViolation(_))));
    }

    let allowed: User = resolve_identity(
        &storage,
        Reference::Identifier(ANONYMOUS_UID.to_string()),
        &policy.allow_anonymous(),
    )
    .await
    .unwrap();
    assert!(allowed.is_anonymous());
}

#[tokio::test]
async fn test_role_list_is_deduplicated() {
    let TestStorage { storage, .. } = TestStorage::memory().await.unwrap();
    let admin = storage.create_role("admin", "").await.unwrap();
    let dev = storage.create_role("dev", "").await.unwrap();

    let mut user = storage.create_user("bob@example.com", None).await.unwrap();
    let roles: Vec<FieldInput> = vec![
        admin.clone().into(),
        admin.uid().into(),
        format!("role:{}", dev.uid()).into(),
        DocumentLink::new("roles", dev.uid()).into(),
        dev.clone().into(),
    ];
    user.set_field("roles", roles).await.unwrap();
    user.save(&ActorContext::system()).await.unwrap();

    let mut stored = storage
        .get_user(UserLookup::by_uid(user.uid()))
        .await
        .unwrap();
    let raw = stored.record().raw("roles").as_array().unwrap().len();
    assert_eq!(raw, 2);

    let read: BTreeSet<String> = stored
        .get_field("roles")
        .await
        .unwrap()
        .into_roles()
        .iter()
        .map(Role::uid)
        .collect();
    let expected: BTreeSet<String> = [admin.uid(), dev.uid()].into_iter().collect();
    assert_eq!(read, expected);
    assert!(stored.has_role("dev").await.unwrap());
}

// ============================================================================
// Roles
// ============================================================================

#[tokio::test]
async fn test_role_deletion_guard() {
    let TestStorage { storage, events } = TestStorage::memory().await.unwrap();
    let mut used = storage.create_role("admin", "").await.unwrap();
    let mut unused = storage.create_role("guest", "").await.unwrap();

    let mut bob = storage.create_user("bob@example.com", None).await.unwrap();
    bob.add_to_field("roles", &used).await.unwrap();
    bob.save(&ActorContext::system()).await.unwrap();

    let err = used.delete(&ActorContext::system()).await.unwrap_err();
    assert!(matches!(err, DomainError::ForbidDeletion(_)));
    assert!(storage.get_role(RoleLookup::by_name("admin")).await.is_ok());

    unused.delete(&ActorContext::system()).await.unwrap();
    assert!(matches!(
        storage.get_role(RoleLookup::by_name("guest")).await,
        Err(DomainError::RoleNotFound(_))
    ));
    assert!(events.event_types().contains(&"ROLE_DELETED"));
    assert_eq!(storage.count_roles(Filter::All).await.unwrap(), 1);
}

// ============================================================================
// Finder cache
// ============================================================================

#[tokio::test]
async fn test_cached_store_sees_writes() {
    let TestStorage { storage, .. } = TestStorage::cached_memory().await.unwrap();
    storage.create_role("admin", "").await.unwrap();
    assert_eq!(storage.count_roles(Filter::All).await.unwrap(), 1);

    storage.create_role("dev", "").await.unwrap();
    assert_eq!(storage.count_roles(Filter::All).await.unwrap(), 2);

    let mut bob = storage.create_user("bob@example.com", None).await.unwrap();
    storage
        .get_user(UserLookup::by_login("bob@example.com"))
        .await
        .unwrap();
    bob.set_field("first_name", "Bob").await.unwrap();
    bob.save(&ActorContext::system()).await.unwrap();

    let fresh = storage
        .get_user(UserLookup::by_login("bob@example.com"))
        .await
        .unwrap();
    assert_eq!(fresh.full_name(), "Bob");
}

// ============================================================================
// PostgreSQL and Redis
// ============================================================================

#[tokio::test]
async fn test_postgres_directory_round_trip() {
    let Some(TestStorage { storage, .. }) = TestStorage::postgres().await.unwrap() else {
        return;
    };

    let login = unique_login();
    let created = storage.create_user(&login, Some("secret")).await.unwrap();
    let user = storage.get_user(UserLookup::by_login(&login)).await.unwrap();
    assert_eq!(user.uid(), created.uid());
    assert!(user.verify_password("secret").unwrap());

    let base = unique_nickname();
    let mut suffixes = Vec::new();
    for _ in 0..3 {
        let mut user = storage.create_user(&unique_login(), None).await.unwrap();
        user.set_field("nickname", base.as_str()).await.unwrap();
        user.save(&ActorContext::system()).await.unwrap();
        suffixes.push(user.nickname().to_string());
    }
    assert_eq!(
        suffixes,
        vec![base.clone(), format!("{base}-1"), format!("{base}-2")]
    );

    let mut role = storage.create_role(&unique_role(), "").await.unwrap();
    let mut holder = storage.get_user(UserLookup::by_login(&login)).await.unwrap();
    holder.add_to_field("roles", &role).await.unwrap();
    holder.save(&ActorContext::system()).await.unwrap();
    assert!(matches!(
        role.delete(&ActorContext::system()).await,
        Err(DomainError::ForbidDeletion(_))
    ));
}

#[tokio::test]
async fn test_redis_event_publisher() {
    let Some(publisher) = redis_publisher().unwrap() else {
        return;
    };

    let event = DomainEvent::UserCreated(UserEvent::new("u1", "SYSTEM"));
    publisher.publish(&event).await.unwrap();
}
