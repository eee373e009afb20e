//! Records
//!
//! A record is one document of a model plus its lifecycle state. Field
//! access goes through the codecs of the model's schema; the storage
//! lifecycle (save, delete and their hooks) lives in `OdmStorage`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use auth_core::{Document, DomainError, DomainResult, ID_FIELD};

use crate::fields::{format_datetime, parse_datetime, FieldInput, FieldValue, Slot};
use crate::registry::Model;
use crate::schema::FieldDef;
use crate::storage::OdmStorage;

pub const CREATED_FIELD: &str = "_created";
pub const MODIFIED_FIELD: &str = "_modified";

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Never saved
    New,
    /// Matches the stored document
    Persisted,
    /// Saved before, changed since
    Modified,
    Deleted,
}

#[derive(Clone)]
pub struct Record {
    model: Arc<Model>,
    document: Document,
    state: RecordState,
}

impl Record {
    /// Fresh record with every field at its initial value
    pub fn new(model: Arc<Model>) -> Self {
        let document = model
            .schema()
            .fields()
            .iter()
            .map(|def| (def.name.clone(), def.initial_value()))
            .collect();

        Self {
            model,
            document,
            state: RecordState::New,
        }
    }

    /// Record backed by a stored document
    pub fn from_document(model: Arc<Model>, document: Document) -> Self {
        Self {
            model,
            document,
            state: RecordState::Persisted,
        }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Storage reference; `None` until first saved
    pub fn id(&self) -> Option<&str> {
        self.document.get(ID_FIELD).and_then(Value::as_str)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Stored value of a field; null when absent
    pub fn raw(&self, field: &str) -> &Value {
        self.document.get(field).unwrap_or(&NULL)
    }

    /// Stored string value of a field, if it is a non-empty string
    pub fn raw_str(&self, field: &str) -> Option<&str> {
        self.raw(field).as_str().filter(|s| !s.is_empty())
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    pub fn is_new(&self) -> bool {
        self.state == RecordState::New
    }

    pub fn is_modified(&self) -> bool {
        self.state == RecordState::Modified
    }

    pub fn is_deleted(&self) -> bool {
        self.state == RecordState::Deleted
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.timestamp(CREATED_FIELD)
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.timestamp(MODIFIED_FIELD)
    }

    fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.raw_str(field)
            .and_then(|raw| parse_datetime(field, raw).ok())
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.model.schema().has_field(field)
    }

    /// Decoded value of a field
    pub async fn get(&self, storage: &OdmStorage, field: &str) -> DomainResult<FieldValue> {
        match field {
            ID_FIELD => Ok(self
                .id()
                .map_or(FieldValue::Null, |id| FieldValue::Value(Value::String(id.to_string())))),
            CREATED_FIELD | MODIFIED_FIELD => Ok(self
                .timestamp(field)
                .map_or(FieldValue::Null, FieldValue::DateTime)),
            _ => {
                let def = self.field_def(field)?;
                def.codec.decode(storage, self.raw(field)).await
            }
        }
    }

    /// Replace a field's value
    pub async fn set(
        &mut self,
        storage: &OdmStorage,
        field: &str,
        input: impl Into<FieldInput> + Send,
    ) -> DomainResult<()> {
        let model = Arc::clone(&self.model);
        let def = self.writable_def(&model, field)?;
        let current = self.raw(field).clone();
        let value = def
            .codec
            .encode(storage, self.slot(field, &current), input.into())
            .await?;

        if def.immutable && !self.is_new() && !current.is_null() && current != value {
            return Err(DomainError::invalid_value(
                field,
                "cannot be changed once saved",
            ));
        }

        self.write_raw(field, value);
        Ok(())
    }

    /// Add one element to a field
    pub async fn add(
        &mut self,
        storage: &OdmStorage,
        field: &str,
        input: impl Into<FieldInput> + Send,
    ) -> DomainResult<()> {
        let model = Arc::clone(&self.model);
        let def = self.writable_def(&model, field)?;
        let current = self.raw(field).clone();
        let value = def
            .codec
            .add(storage, self.slot(field, &current), input.into())
            .await?;
        self.write_raw(field, value);
        Ok(())
    }

    /// Remove one element from a field
    pub async fn sub(
        &mut self,
        storage: &OdmStorage,
        field: &str,
        input: impl Into<FieldInput> + Send,
    ) -> DomainResult<()> {
        let model = Arc::clone(&self.model);
        let def = self.writable_def(&model, field)?;
        let current = self.raw(field).clone();
        let value = def
            .codec
            .sub(storage, self.slot(field, &current), input.into())
            .await?;
        self.write_raw(field, value);
        Ok(())
    }

    fn slot<'a>(&'a self, field: &'a str, current: &'a Value) -> Slot<'a> {
        Slot {
            field,
            current,
            record_id: self.id(),
            is_new: self.is_new(),
        }
    }

    fn field_def(&self, field: &str) -> DomainResult<&FieldDef> {
        self.model.schema().field(field).ok_or_else(|| {
            DomainError::InvalidArgument(format!(
                "model '{}' has no field '{field}'",
                self.model.name()
            ))
        })
    }

    fn writable_def<'m>(&self, model: &'m Model, field: &str) -> DomainResult<&'m FieldDef> {
        if self.is_deleted() {
            return Err(DomainError::InvalidArgument(format!(
                "{} record was deleted",
                model.name()
            )));
        }
        model.schema().field(field).ok_or_else(|| {
            DomainError::InvalidArgument(format!(
                "model '{}' has no field '{field}'",
                model.name()
            ))
        })
    }

    /// Store an already-encoded value
    pub(crate) fn write_raw(&mut self, field: &str, value: Value) {
        if self.raw(field) == &value {
            return;
        }
        self.document.insert(field.to_string(), value);
        if self.state == RecordState::Persisted {
            self.state = RecordState::Modified;
        }
    }

    pub(crate) fn assign_id(&mut self, id: String) {
        self.document.insert(ID_FIELD.to_string(), Value::String(id));
    }

    /// Maintain the `_created`/`_modified` timestamps
    pub(crate) fn stamp(&mut self, now: DateTime<Utc>) {
        let now = Value::String(format_datetime(&now));
        if self.raw(CREATED_FIELD).is_null() {
            self.document.insert(CREATED_FIELD.to_string(), now.clone());
        }
        self.document.insert(MODIFIED_FIELD.to_string(), now);
    }

    pub(crate) fn check_required(&self) -> DomainResult<()> {
        for def in self.model.schema().fields().iter().filter(|def| def.required) {
            let missing = match self.raw(&def.name) {
                Value::Null => true,
                Value::String(s) => s.is_empty(),
                _ => false,
            };
            if missing {
                return Err(DomainError::invalid_value(def.name.clone(), "is required"));
            }
        }
        Ok(())
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.state = RecordState::Persisted;
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.state = RecordState::Deleted;
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.model.name())
            .field("id", &self.id())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
