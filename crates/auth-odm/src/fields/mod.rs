//! Field codecs
//!
//! Every schema field carries a codec chosen when the field is defined. The
//! codec owns the field's rules: how input is validated and turned into the
//! stored JSON, how stored JSON is turned back into a value, and how a
//! finder argument maps onto the stored shapes it should match.

mod attachment;
mod identity;
mod reference;
mod scalar;
mod value;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use auth_core::{DomainError, DomainResult};

use crate::storage::OdmStorage;

pub use attachment::AttachmentCodec;
pub use identity::{NicknameCodec, PasswordCodec, StatusCodec};
pub use reference::{
    Referent, RolesField, UserField, UsersDictField, UsersDictReversedField, UsersField,
};
pub use scalar::{
    BoolCodec, DateTimeCodec, DictCodec, EnumCodec, IntegerCodec, StringCodec,
    UniqueStringListCodec,
};
pub use value::{FieldInput, FieldValue};

pub(crate) use reference::to_reference;
pub(crate) use value::{format_datetime, parse_datetime};

/// The record slot a codec is writing into
#[derive(Debug, Clone, Copy)]
pub struct Slot<'a> {
    pub field: &'a str,
    /// Currently stored value
    pub current: &'a Value,
    /// Storage reference of the record, once assigned
    pub record_id: Option<&'a str>,
    pub is_new: bool,
}

/// Per-field-type strategy
#[async_trait]
pub trait FieldCodec: Send + Sync + fmt::Debug {
    /// Validate `input` and produce the value to store
    async fn encode(
        &self,
        storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value>;

    /// Turn a stored value into its live form
    async fn decode(&self, storage: &OdmStorage, stored: &Value) -> DomainResult<FieldValue>;

    /// Stored values a finder argument should match
    fn finder_values(&self, field: &str, input: FieldInput) -> DomainResult<Vec<Value>> {
        plain_finder_values(field, input)
    }

    /// Add one element to the stored value
    async fn add(
        &self,
        _storage: &OdmStorage,
        slot: Slot<'_>,
        _input: FieldInput,
    ) -> DomainResult<Value> {
        Err(unsupported(slot.field, "add"))
    }

    /// Remove one element from the stored value
    async fn sub(
        &self,
        _storage: &OdmStorage,
        slot: Slot<'_>,
        _input: FieldInput,
    ) -> DomainResult<Value> {
        Err(unsupported(slot.field, "sub"))
    }

    /// Stored value of a fresh record
    fn default_value(&self) -> Value {
        Value::Null
    }

    /// Whether the field may take part in a text index
    fn is_textual(&self) -> bool {
        false
    }
}

/// A list argument matches any of its elements
pub(crate) fn plain_finder_values(field: &str, input: FieldInput) -> DomainResult<Vec<Value>> {
    match input.into_plain(field)? {
        Value::Array(items) => Ok(items),
        value => Ok(vec![value]),
    }
}

fn unsupported(field: &str, operation: &str) -> DomainError {
    DomainError::InvalidArgument(format!("field '{field}' does not support '{operation}'"))
}

pub(crate) fn type_mismatch(field: &str, expected: &str, input: &FieldInput) -> DomainError {
    DomainError::TypeMismatch(format!(
        "field '{field}': {expected} expected, got {}",
        input.type_name()
    ))
}
