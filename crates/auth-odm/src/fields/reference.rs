//! Reference codecs
//!
//! References are written as `kind:uid` composites after resolution and the
//! field's eligibility policy. Stored values in any historical shape (bare
//! uid, composite, document link) are read back. A stored reference whose
//! target no longer exists reads as absent.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;
use tracing::warn;

use auth_core::{
    finder_forms, resolve, resolve_identity, DomainError, DomainResult, Identity, IdentityLookup,
    Reference, ResolvePolicy, StoredRef,
};

use super::{type_mismatch, FieldCodec, FieldInput, FieldValue, Slot};
use crate::models::{Role, User};
use crate::storage::OdmStorage;

/// An identity reference fields can hold
pub trait Referent: Identity + fmt::Debug + 'static {
    /// Take the live object out of `input`, or hand the input back
    fn from_live(input: FieldInput) -> Result<Self, FieldInput>;

    fn directory(storage: &OdmStorage) -> &dyn IdentityLookup<Self>;

    fn one(self) -> FieldValue;

    fn many(items: Vec<Self>) -> FieldValue;
}

impl Referent for User {
    fn from_live(input: FieldInput) -> Result<Self, FieldInput> {
        match input {
            FieldInput::User(user) => Ok(user),
            other => Err(other),
        }
    }

    fn directory(storage: &OdmStorage) -> &dyn IdentityLookup<Self> {
        storage
    }

    fn one(self) -> FieldValue {
        FieldValue::User(self)
    }

    fn many(items: Vec<Self>) -> FieldValue {
        FieldValue::Users(items)
    }
}

impl Referent for Role {
    fn from_live(input: FieldInput) -> Result<Self, FieldInput> {
        match input {
            FieldInput::Role(role) => Ok(role),
            other => Err(other),
        }
    }

    fn directory(storage: &OdmStorage) -> &dyn IdentityLookup<Self> {
        storage
    }

    fn one(self) -> FieldValue {
        FieldValue::Role(self)
    }

    fn many(items: Vec<Self>) -> FieldValue {
        FieldValue::Roles(items)
    }
}

/// Interpret a field input as a reference to a `T`
pub(crate) fn to_reference<T: Referent>(
    field: &str,
    input: FieldInput,
) -> DomainResult<Reference<T>> {
    match T::from_live(input) {
        Ok(live) => Ok(Reference::Live(live)),
        Err(FieldInput::Value(value)) => Reference::from_stored(&value),
        Err(other) => Err(type_mismatch(
            field,
            &format!("{} reference", T::KIND),
            &other,
        )),
    }
}

/// Resolve `input` under `policy` and return the composite to store
async fn encode_one<T: Referent>(
    storage: &OdmStorage,
    field: &str,
    input: FieldInput,
    policy: &ResolvePolicy,
) -> DomainResult<String> {
    let raw = to_reference::<T>(field, input)?;
    let uid = resolve(T::directory(storage), raw, policy).await?;
    Ok(StoredRef::composite(T::KIND, &uid))
}

/// Look up a stored reference; `None` when its target is gone
async fn decode_one<T: Referent>(storage: &OdmStorage, stored: &Value) -> DomainResult<Option<T>> {
    let raw = Reference::<T>::from_stored(stored)?;
    let policy = ResolvePolicy::default().allow_system().allow_anonymous();
    match resolve_identity(T::directory(storage), raw, &policy).await {
        Ok(identity) => Ok(Some(identity)),
        Err(e) if e.is_not_found() => {
            warn!(kind = %T::KIND, "Dangling reference skipped");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn finder_values_of<T: Referent>(field: &str, input: FieldInput) -> DomainResult<Vec<Value>> {
    let items = match input {
        FieldInput::List(items) => items,
        FieldInput::Value(Value::Array(items)) => items.into_iter().map(FieldInput::Value).collect(),
        single => vec![single],
    };

    let mut values = Vec::new();
    for item in items {
        for form in finder_forms(&to_reference::<T>(field, item)?)? {
            values.push(Value::String(form));
        }
    }
    Ok(values)
}

/// Whether `stored` refers to the identity with `uid` in any stored shape
fn refers_to<T: Referent>(stored: &Value, uid: &str) -> bool {
    match Reference::<T>::from_stored(stored) {
        Ok(Reference::Identifier(raw)) => StoredRef::parse(&raw)
            .and_then(|parsed| parsed.expect_kind(T::KIND))
            .is_ok_and(|parsed| parsed.uid == uid),
        Ok(Reference::RawLink(link)) => link.kind() == Some(T::KIND) && link.id == uid,
        _ => false,
    }
}

/// Single user reference
#[derive(Debug, Clone, Default)]
pub struct UserField {
    policy: ResolvePolicy,
}

impl UserField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ResolvePolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl FieldCodec for UserField {
    async fn encode(
        &self,
        storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        if input.is_empty() {
            return Ok(Value::Null);
        }
        encode_one::<User>(storage, slot.field, input, &self.policy)
            .await
            .map(Value::String)
    }

    async fn decode(&self, storage: &OdmStorage, stored: &Value) -> DomainResult<FieldValue> {
        if stored.is_null() {
            return Ok(FieldValue::Null);
        }
        Ok(decode_one::<User>(storage, stored)
            .await?
            .map_or(FieldValue::Null, Referent::one))
    }

    fn finder_values(&self, field: &str, input: FieldInput) -> DomainResult<Vec<Value>> {
        finder_values_of::<User>(field, input)
    }
}

/// List of references with set semantics
pub struct ReferenceList<T> {
    policy: ResolvePolicy,
    kind: PhantomData<fn() -> T>,
}

/// List of user references
pub type UsersField = ReferenceList<User>;

/// List of role references
pub type RolesField = ReferenceList<Role>;

impl<T> ReferenceList<T> {
    pub fn new() -> Self {
        Self::with_policy(ResolvePolicy::default())
    }

    pub fn with_policy(policy: ResolvePolicy) -> Self {
        Self {
            policy,
            kind: PhantomData,
        }
    }
}

impl<T> Default for ReferenceList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Referent> fmt::Debug for ReferenceList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceList")
            .field("kind", &T::KIND)
            .field("policy", &self.policy)
            .finish()
    }
}

#[async_trait]
impl<T: Referent> FieldCodec for ReferenceList<T> {
    async fn encode(
        &self,
        storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        let mut stored: Vec<Value> = Vec::new();
        for item in input.into_items(slot.field)? {
            if item.is_empty() {
                continue;
            }
            let composite =
                Value::String(encode_one::<T>(storage, slot.field, item, &self.policy).await?);
            if !stored.contains(&composite) {
                stored.push(composite);
            }
        }
        Ok(Value::Array(stored))
    }

    async fn decode(&self, storage: &OdmStorage, stored: &Value) -> DomainResult<FieldValue> {
        let mut items = Vec::new();
        for value in stored.as_array().map(Vec::as_slice).unwrap_or_default() {
            if let Some(identity) = decode_one::<T>(storage, value).await? {
                items.push(identity);
            }
        }
        Ok(T::many(items))
    }

    async fn add(
        &self,
        storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        let raw = to_reference::<T>(slot.field, input)?;
        let uid = resolve(T::directory(storage), raw, &self.policy).await?;

        let mut items = slot.current.as_array().cloned().unwrap_or_default();
        if !items.iter().any(|stored| refers_to::<T>(stored, &uid)) {
            items.push(Value::String(StoredRef::composite(T::KIND, &uid)));
        }
        Ok(Value::Array(items))
    }

    async fn sub(
        &self,
        storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        let raw = to_reference::<T>(slot.field, input)?;
        let uid = resolve(T::directory(storage), raw, &self.policy).await?;

        let mut items = slot.current.as_array().cloned().unwrap_or_default();
        items.retain(|stored| !refers_to::<T>(stored, &uid));
        Ok(Value::Array(items))
    }

    fn finder_values(&self, field: &str, input: FieldInput) -> DomainResult<Vec<Value>> {
        finder_values_of::<T>(field, input)
    }

    fn default_value(&self) -> Value {
        Value::Array(Vec::new())
    }
}

fn plain_key(field: &str, key: FieldInput) -> DomainResult<String> {
    match key {
        FieldInput::Value(Value::String(key)) => Ok(key),
        other => Err(type_mismatch(field, "string key", &other)),
    }
}

/// Map of plain keys to user references
#[derive(Debug, Clone, Default)]
pub struct UsersDictField {
    policy: ResolvePolicy,
}

impl UsersDictField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ResolvePolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl FieldCodec for UsersDictField {
    async fn encode(
        &self,
        storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        let mut stored = Map::new();
        for (key, value) in input.into_entries(slot.field)? {
            let key = plain_key(slot.field, key)?;
            let composite = encode_one::<User>(storage, slot.field, value, &self.policy).await?;
            stored.insert(key, Value::String(composite));
        }
        Ok(Value::Object(stored))
    }

    async fn decode(&self, storage: &OdmStorage, stored: &Value) -> DomainResult<FieldValue> {
        let mut entries = Vec::new();
        if let Some(map) = stored.as_object() {
            for (key, value) in map {
                if let Some(user) = decode_one::<User>(storage, value).await? {
                    entries.push((key.clone(), user));
                }
            }
        }
        Ok(FieldValue::UsersByKey(entries))
    }

    fn finder_values(&self, field: &str, _input: FieldInput) -> DomainResult<Vec<Value>> {
        Err(DomainError::InvalidArgument(format!(
            "field '{field}' cannot be searched"
        )))
    }

    fn default_value(&self) -> Value {
        Value::Object(Map::new())
    }
}

/// Map of user references to plain values
#[derive(Debug, Clone, Default)]
pub struct UsersDictReversedField {
    policy: ResolvePolicy,
}

impl UsersDictReversedField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ResolvePolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl FieldCodec for UsersDictReversedField {
    async fn encode(
        &self,
        storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        let mut stored = Map::new();
        for (key, value) in input.into_entries(slot.field)? {
            let composite = encode_one::<User>(storage, slot.field, key, &self.policy).await?;
            stored.insert(composite, value.into_plain(slot.field)?);
        }
        Ok(Value::Object(stored))
    }

    async fn decode(&self, storage: &OdmStorage, stored: &Value) -> DomainResult<FieldValue> {
        let mut entries = Vec::new();
        if let Some(map) = stored.as_object() {
            for (key, value) in map {
                let key = Value::String(key.clone());
                if let Some(user) = decode_one::<User>(storage, &key).await? {
                    entries.push((user, value.clone()));
                }
            }
        }
        Ok(FieldValue::UserValues(entries))
    }

    fn finder_values(&self, field: &str, _input: FieldInput) -> DomainResult<Vec<Value>> {
        Err(DomainError::InvalidArgument(format!(
            "field '{field}' cannot be searched"
        )))
    }

    fn default_value(&self) -> Value {
        Value::Object(Map::new())
    }
}
