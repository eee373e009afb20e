use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;

use auth_common::AuthSettings;
use auth_core::{DomainResult, EntityKind, Identity, IndexSpec};

use super::ActorContext;
use crate::fields::{FieldInput, FieldValue, StringCodec, UniqueStringListCodec};
use crate::record::Record;
use crate::schema::{FieldDef, Schema};
use crate::storage::OdmStorage;

pub(crate) fn setup_fields(schema: &mut Schema, settings: &AuthSettings) {
    schema
        .define_field(FieldDef::new("uid", StringCodec::new()).immutable())
        .define_field(
            FieldDef::new("name", StringCodec::max_length(settings.name_max_length)).required(),
        )
        .define_field(FieldDef::new(
            "description",
            StringCodec::max_length(settings.description_max_length),
        ))
        .define_field(FieldDef::new("permissions", UniqueStringListCodec));
}

pub(crate) fn setup_indexes(schema: &mut Schema) {
    schema
        .define_index(IndexSpec::asc(["uid"]).unique())
        .define_index(IndexSpec::asc(["name"]).unique())
        .define_index(IndexSpec::text(["name", "description"]).named("text_index"));
}

/// Domain view of a role record
#[derive(Clone)]
pub struct Role {
    record: Record,
    storage: OdmStorage,
}

impl Role {
    pub(crate) fn from_record(storage: OdmStorage, record: Record) -> Self {
        Self { record, storage }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Canonical uid; empty until first saved
    pub fn uid(&self) -> String {
        self.record.raw_str("uid").unwrap_or_default().to_string()
    }

    pub fn name(&self) -> &str {
        self.record.raw_str("name").unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        self.record.raw_str("description").unwrap_or_default()
    }

    pub fn permissions(&self) -> Vec<String> {
        self.record
            .raw("permissions")
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions().iter().any(|p| p == permission)
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

    pub async fn get_field(&self, field: &str) -> DomainResult<FieldValue> {
        self.record.get(&self.storage, field).await
    }

    pub async fn set_field(
        &mut self,
        field: &str,
        value: impl Into<FieldInput> + Send,
    ) -> DomainResult<&mut Self> {
        self.record.set(&self.storage, field, value).await?;
        Ok(self)
    }

    pub async fn add_to_field(
        &mut self,
        field: &str,
        value: impl Into<FieldInput> + Send,
    ) -> DomainResult<&mut Self> {
        self.record.add(&self.storage, field, value).await?;
        Ok(self)
    }

    pub async fn sub_from_field(
        &mut self,
        field: &str,
        value: impl Into<FieldInput> + Send,
    ) -> DomainResult<&mut Self> {
        self.record.sub(&self.storage, field, value).await?;
        Ok(self)
    }

    pub async fn save(&mut self, actor: &ActorContext) -> DomainResult<()> {
        let storage = self.storage.clone();
        storage.save_record(&mut self.record, actor).await
    }

    /// Fails with a forbid-deletion error while any user holds the role
    pub async fn delete(&mut self, actor: &ActorContext) -> DomainResult<()> {
        let storage = self.storage.clone();
        storage.delete_record(&mut self.record, actor).await
    }
}

impl Identity for Role {
    const KIND: EntityKind = EntityKind::Role;

    fn uid(&self) -> String {
        Role::uid(self)
    }

    fn label(&self) -> String {
        self.name().to_string()
    }
}

impl fmt::Debug for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Role")
            .field("uid", &self.uid())
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
