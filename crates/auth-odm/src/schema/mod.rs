//! Model schemas
//!
//! A schema is the ordered list of field definitions and the index
//! declarations of one model. Field definitions are replaced by name so an
//! extension hook can redefine a base field.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use auth_core::IndexSpec;

use crate::fields::FieldCodec;

/// One field of a model
#[derive(Clone)]
pub struct FieldDef {
    pub name: String,
    pub codec: Arc<dyn FieldCodec>,
    /// Must hold a non-empty value when saved
    pub required: bool,
    /// Stored value of a fresh record; the codec default when `None`
    pub default: Option<Value>,
    /// May not change once the record is persisted
    pub immutable: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, codec: impl FieldCodec + 'static) -> Self {
        Self {
            name: name.into(),
            codec: Arc::new(codec),
            required: false,
            default: None,
            immutable: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    /// Stored value of the field on a fresh record
    pub fn initial_value(&self) -> Value {
        self.default
            .clone()
            .unwrap_or_else(|| self.codec.default_value())
    }
}

impl fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("codec", &self.codec)
            .field("required", &self.required)
            .field("immutable", &self.immutable)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<FieldDef>,
    indexes: Vec<IndexSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, replacing any existing field with the same name
    pub fn define_field(&mut self, field: FieldDef) -> &mut Self {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    pub fn define_index(&mut self, index: IndexSpec) -> &mut Self {
        self.indexes.push(index);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn indexes(&self) -> &[IndexSpec] {
        &self.indexes
    }

    /// Names of the fields whose codec may take part in a text index
    pub fn textual_fields<'a>(&'a self, candidates: &'a [&'a str]) -> Vec<&'a str> {
        candidates
            .iter()
            .copied()
            .filter(|name| self.field(name).is_some_and(|f| f.codec.is_textual()))
            .collect()
    }
}
