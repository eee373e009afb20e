//! Plain-value codecs

use async_trait::async_trait;
use serde_json::{Map, Value};

use auth_core::{DomainError, DomainResult};

use super::{
    format_datetime, parse_datetime, type_mismatch, FieldCodec, FieldInput, FieldValue, Slot,
};
use crate::storage::OdmStorage;

/// UTF-8 string with an optional length limit
#[derive(Debug, Clone, Default)]
pub struct StringCodec {
    max_length: Option<usize>,
}

impl StringCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_length(max_length: usize) -> Self {
        Self {
            max_length: Some(max_length),
        }
    }
}

#[async_trait]
impl FieldCodec for StringCodec {
    async fn encode(
        &self,
        _storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        match input {
            FieldInput::Value(Value::Null) => Ok(Value::Null),
            FieldInput::Value(Value::String(s)) => {
                if let Some(max) = self.max_length {
                    let length = s.chars().count();
                    if length > max {
                        return Err(DomainError::invalid_value(
                            slot.field,
                            format!("{length} characters exceeds the limit of {max}"),
                        ));
                    }
                }
                Ok(Value::String(s))
            }
            other => Err(type_mismatch(slot.field, "string", &other)),
        }
    }

    async fn decode(&self, _storage: &OdmStorage, stored: &Value) -> DomainResult<FieldValue> {
        Ok(FieldValue::Value(stored.clone()))
    }

    fn is_textual(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BoolCodec;

#[async_trait]
impl FieldCodec for BoolCodec {
    async fn encode(
        &self,
        _storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        match input {
            FieldInput::Value(Value::Null) => Ok(Value::Bool(false)),
            FieldInput::Value(Value::Bool(b)) => Ok(Value::Bool(b)),
            other => Err(type_mismatch(slot.field, "bool", &other)),
        }
    }

    async fn decode(&self, _storage: &OdmStorage, stored: &Value) -> DomainResult<FieldValue> {
        Ok(FieldValue::Value(Value::Bool(stored.as_bool().unwrap_or(false))))
    }

    fn default_value(&self) -> Value {
        Value::Bool(false)
    }
}

/// Signed integer; `add`/`sub` increment and decrement
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerCodec;

impl IntegerCodec {
    fn integer(field: &str, input: FieldInput) -> DomainResult<i64> {
        match input {
            FieldInput::Value(Value::Null) => Ok(0),
            FieldInput::Value(Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| DomainError::invalid_value(field, format!("{n} is not an integer"))),
            other => Err(type_mismatch(field, "integer", &other)),
        }
    }

    fn step(slot: Slot<'_>, input: FieldInput, sign: i64) -> DomainResult<Value> {
        let current = slot.current.as_i64().unwrap_or(0);
        let delta = Self::integer(slot.field, input)?;
        current
            .checked_add(sign * delta)
            .map(Value::from)
            .ok_or_else(|| DomainError::invalid_value(slot.field, "integer overflow"))
    }
}

#[async_trait]
impl FieldCodec for IntegerCodec {
    async fn encode(
        &self,
        _storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        Self::integer(slot.field, input).map(Value::from)
    }

    async fn decode(&self, _storage: &OdmStorage, stored: &Value) -> DomainResult<FieldValue> {
        Ok(FieldValue::Value(Value::from(stored.as_i64().unwrap_or(0))))
    }

    async fn add(
        &self,
        _storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        Self::step(slot, input, 1)
    }

    async fn sub(
        &self,
        _storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        Self::step(slot, input, -1)
    }

    fn default_value(&self) -> Value {
        Value::from(0)
    }
}

/// UTC timestamp stored as fixed-width RFC 3339
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeCodec;

#[async_trait]
impl FieldCodec for DateTimeCodec {
    async fn encode(
        &self,
        _storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        match input {
            FieldInput::Value(Value::Null) => Ok(Value::Null),
            FieldInput::Value(Value::String(s)) => {
                let parsed = parse_datetime(slot.field, &s)?;
                Ok(Value::String(format_datetime(&parsed)))
            }
            other => Err(type_mismatch(slot.field, "timestamp", &other)),
        }
    }

    async fn decode(&self, _storage: &OdmStorage, stored: &Value) -> DomainResult<FieldValue> {
        match stored.as_str() {
            Some(raw) => parse_datetime("datetime", raw).map(FieldValue::DateTime),
            None => Ok(FieldValue::Null),
        }
    }
}

/// String restricted to a closed set of values
#[derive(Debug, Clone)]
pub struct EnumCodec {
    values: Vec<String>,
}

impl EnumCodec {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl FieldCodec for EnumCodec {
    async fn encode(
        &self,
        _storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        match input {
            FieldInput::Value(Value::Null) => Ok(Value::Null),
            FieldInput::Value(Value::String(s)) if self.values.contains(&s) => Ok(Value::String(s)),
            FieldInput::Value(Value::String(s)) => Err(DomainError::invalid_value(
                slot.field,
                format!("'{s}' is not one of {}", self.values.join(", ")),
            )),
            other => Err(type_mismatch(slot.field, "string", &other)),
        }
    }

    async fn decode(&self, _storage: &OdmStorage, stored: &Value) -> DomainResult<FieldValue> {
        Ok(FieldValue::Value(stored.clone()))
    }
}

/// Free-form JSON object
#[derive(Debug, Clone, Copy, Default)]
pub struct DictCodec;

#[async_trait]
impl FieldCodec for DictCodec {
    async fn encode(
        &self,
        _storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        let mut map = Map::new();
        for (key, value) in input.into_entries(slot.field)? {
            let FieldInput::Value(Value::String(key)) = key else {
                return Err(DomainError::TypeMismatch(format!(
                    "field '{}': map keys must be strings",
                    slot.field
                )));
            };
            map.insert(key, value.into_plain(slot.field)?);
        }
        Ok(Value::Object(map))
    }

    async fn decode(&self, _storage: &OdmStorage, stored: &Value) -> DomainResult<FieldValue> {
        match stored {
            Value::Object(_) => Ok(FieldValue::Value(stored.clone())),
            _ => Ok(FieldValue::Value(Value::Object(Map::new()))),
        }
    }

    fn default_value(&self) -> Value {
        Value::Object(Map::new())
    }
}

/// Ordered list of distinct strings
#[derive(Debug, Clone, Copy, Default)]
pub struct UniqueStringListCodec;

impl UniqueStringListCodec {
    fn string(field: &str, input: FieldInput) -> DomainResult<String> {
        match input {
            FieldInput::Value(Value::String(s)) => Ok(s),
            other => Err(type_mismatch(field, "string", &other)),
        }
    }

    fn current(slot: Slot<'_>) -> Vec<Value> {
        slot.current.as_array().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl FieldCodec for UniqueStringListCodec {
    async fn encode(
        &self,
        _storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        let mut items: Vec<Value> = Vec::new();
        for item in input.into_items(slot.field)? {
            let item = Value::String(Self::string(slot.field, item)?);
            if !items.contains(&item) {
                items.push(item);
            }
        }
        Ok(Value::Array(items))
    }

    async fn decode(&self, _storage: &OdmStorage, stored: &Value) -> DomainResult<FieldValue> {
        Ok(FieldValue::Value(Value::Array(
            stored.as_array().cloned().unwrap_or_default(),
        )))
    }

    async fn add(
        &self,
        _storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        let item = Value::String(Self::string(slot.field, input)?);
        let mut items = Self::current(slot);
        if !items.contains(&item) {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    async fn sub(
        &self,
        _storage: &OdmStorage,
        slot: Slot<'_>,
        input: FieldInput,
    ) -> DomainResult<Value> {
        let item = Value::String(Self::string(slot.field, input)?);
        let mut items = Self::current(slot);
        items.retain(|existing| *existing != item);
        Ok(Value::Array(items))
    }

    fn default_value(&self) -> Value {
        Value::Array(Vec::new())
    }
}
