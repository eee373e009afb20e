//! Reference resolver
//!
//! A reference to a user or role reaches the storage layer in one of three
//! shapes: a live object, an identifier string (any stored form), or a raw
//! document link. Resolution turns any of them into the live identity and
//! applies the eligibility policy of the field doing the resolving.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{DomainError, DomainResult};
use crate::value_objects::{DocumentLink, EntityKind, StoredRef, ANONYMOUS_UID, SYSTEM_UID};

/// An identity that reference fields can point to
pub trait Identity: Clone + Send + Sync {
    const KIND: EntityKind;

    /// Canonical uid; empty while the identity has never been saved
    fn uid(&self) -> String;

    /// Human-readable name used in error messages
    fn label(&self) -> String;

    fn is_anonymous(&self) -> bool {
        false
    }

    fn is_system(&self) -> bool {
        false
    }
}

/// Polymorphic reference input
#[derive(Debug, Clone)]
pub enum Reference<T> {
    Identifier(String),
    Live(T),
    RawLink(DocumentLink),
}

impl<T: Identity> Reference<T> {
    /// Interpret a stored JSON value
    pub fn from_stored(value: &Value) -> DomainResult<Self> {
        match value {
            Value::String(s) => Ok(Self::Identifier(s.clone())),
            Value::Object(_) => DocumentLink::from_value(value).map(Self::RawLink).ok_or_else(|| {
                DomainError::TypeMismatch(format!(
                    "{} object, identifier string or document link expected, got object",
                    T::KIND
                ))
            }),
            other => Err(DomainError::TypeMismatch(format!(
                "{} object, identifier string or document link expected, got {}",
                T::KIND,
                json_type_name(other)
            ))),
        }
    }
}

impl<T> From<&str> for Reference<T> {
    fn from(value: &str) -> Self {
        Self::Identifier(value.to_string())
    }
}

impl<T> From<String> for Reference<T> {
    fn from(value: String) -> Self {
        Self::Identifier(value)
    }
}

impl<T> From<DocumentLink> for Reference<T> {
    fn from(value: DocumentLink) -> Self {
        Self::RawLink(value)
    }
}

/// Eligibility rules applied after resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvePolicy {
    pub allow_system: bool,
    pub allow_anonymous: bool,
    /// Canonical uids that may not be referenced
    pub excluded: Vec<String>,
}

impl ResolvePolicy {
    pub fn allow_system(mut self) -> Self {
        self.allow_system = true;
        self
    }

    pub fn allow_anonymous(mut self) -> Self {
        self.allow_anonymous = true;
        self
    }

    pub fn exclude(mut self, uid: impl Into<String>) -> Self {
        self.excluded.push(uid.into());
        self
    }

    /// Check a resolved identity against the policy
    pub fn check<T: Identity>(&self, identity: &T) -> DomainResult<()> {
        let uid = identity.uid();
        if uid.is_empty() {
            return Err(DomainError::invalid_value(
                T::KIND.prefix(),
                "cannot reference an identity that was never saved",
            ));
        }

        if identity.is_anonymous() && !self.allow_anonymous {
            return Err(DomainError::PolicyViolation(format!(
                "anonymous {} is not allowed here",
                T::KIND
            )));
        }

        if identity.is_system() && !self.allow_system {
            return Err(DomainError::PolicyViolation(format!(
                "system {} is not allowed here",
                T::KIND
            )));
        }

        if self.excluded.iter().any(|excluded| *excluded == uid) {
            return Err(DomainError::PolicyViolation(format!(
                "{} '{}' is not allowed here",
                T::KIND,
                identity.label()
            )));
        }

        Ok(())
    }
}

/// Lookup of live identities by canonical uid
#[async_trait]
pub trait IdentityLookup<T: Identity>: Send + Sync {
    /// Fails with a not-found error when no identity has this uid
    async fn find_by_uid(&self, uid: &str) -> DomainResult<T>;
}

/// Resolve a reference to its live identity and check the policy
pub async fn resolve_identity<T, L>(
    lookup: &L,
    raw: Reference<T>,
    policy: &ResolvePolicy,
) -> DomainResult<T>
where
    T: Identity,
    L: IdentityLookup<T> + ?Sized,
{
    let identity = match raw {
        Reference::Live(identity) => identity,
        Reference::Identifier(raw) => {
            let parsed = StoredRef::parse(&raw)?.expect_kind(T::KIND)?;
            lookup.find_by_uid(&parsed.uid).await?
        }
        Reference::RawLink(link) => {
            let id = link_uid::<T>(&link)?;
            lookup.find_by_uid(&id).await?
        }
    };

    policy.check(&identity)?;
    Ok(identity)
}

/// Resolve a reference to its canonical uid
pub async fn resolve<T, L>(lookup: &L, raw: Reference<T>, policy: &ResolvePolicy) -> DomainResult<String>
where
    T: Identity,
    L: IdentityLookup<T> + ?Sized,
{
    resolve_identity(lookup, raw, policy).await.map(|identity| identity.uid())
}

/// Stored shapes matching a reference in finder queries
///
/// Finder arguments are flattened without a lookup and without the
/// eligibility policy. Placeholder identities map to their well-known tokens.
pub fn finder_forms<T: Identity>(raw: &Reference<T>) -> DomainResult<Vec<String>> {
    let uid = match raw {
        Reference::Live(identity) if identity.is_anonymous() => ANONYMOUS_UID.to_string(),
        Reference::Live(identity) if identity.is_system() => SYSTEM_UID.to_string(),
        Reference::Live(identity) => {
            let uid = identity.uid();
            if uid.is_empty() {
                return Err(DomainError::invalid_value(
                    T::KIND.prefix(),
                    "cannot search by an identity that was never saved",
                ));
            }
            uid
        }
        Reference::Identifier(raw) => StoredRef::parse(raw)?.expect_kind(T::KIND)?.uid,
        Reference::RawLink(link) => link_uid::<T>(link)?,
    };

    Ok(StoredRef::stored_forms(T::KIND, &uid).to_vec())
}

fn link_uid<T: Identity>(link: &DocumentLink) -> DomainResult<String> {
    match link.kind() {
        Some(kind) if kind == T::KIND => Ok(link.id.clone()),
        _ => Err(DomainError::TypeMismatch(format!(
            "link to '{}' cannot reference a {}",
            link.collection,
            T::KIND
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
