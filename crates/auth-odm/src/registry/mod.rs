//! Model registry
//!
//! Models are registered by name. Building a model's schema runs its base
//! field setup, then every extension registered for that model name, then
//! its index setup, so index declarations see the final field set.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use auth_common::AuthSettings;
use auth_core::{DomainError, DomainResult};

use crate::hooks::LifecycleHooks;
use crate::schema::Schema;

type FieldsSetup = fn(&mut Schema, &AuthSettings);
type IndexesSetup = fn(&mut Schema);
type Extension = Box<dyn Fn(&mut Schema) + Send + Sync>;

/// Static description of a model
#[derive(Clone)]
pub struct ModelDef {
    pub name: &'static str,
    pub collection: &'static str,
    pub fields: FieldsSetup,
    pub indexes: IndexesSetup,
    pub hooks: Arc<dyn LifecycleHooks>,
}

/// A registered model with its built schema
pub struct Model {
    name: String,
    collection: String,
    schema: Schema,
    hooks: Arc<dyn LifecycleHooks>,
}

impl Model {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn hooks(&self) -> &dyn LifecycleHooks {
        self.hooks.as_ref()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

pub struct ModelRegistry {
    settings: AuthSettings,
    extensions: HashMap<String, Vec<Extension>>,
    models: BTreeMap<String, Arc<Model>>,
}

impl ModelRegistry {
    pub fn new(settings: AuthSettings) -> Self {
        Self {
            settings,
            extensions: HashMap::new(),
            models: BTreeMap::new(),
        }
    }

    /// Extend the field setup of `model`; applies to models registered later
    pub fn on_setup_fields<F>(&mut self, model: impl Into<String>, extension: F) -> &mut Self
    where
        F: Fn(&mut Schema) + Send + Sync + 'static,
    {
        self.extensions
            .entry(model.into())
            .or_default()
            .push(Box::new(extension));
        self
    }

    pub fn register(&mut self, def: ModelDef) -> DomainResult<Arc<Model>> {
        if self.models.contains_key(def.name) {
            return Err(DomainError::InvalidArgument(format!(
                "model '{}' is already registered",
                def.name
            )));
        }

        let mut schema = Schema::new();
        (def.fields)(&mut schema, &self.settings);
        let extensions = self.extensions.get(def.name).map_or(0, Vec::len);
        for extension in self.extensions.get(def.name).into_iter().flatten() {
            extension(&mut schema);
        }
        (def.indexes)(&mut schema);

        debug!(
            model = %def.name,
            fields = schema.fields().len(),
            indexes = schema.indexes().len(),
            extensions,
            "Model registered"
        );

        let model = Arc::new(Model {
            name: def.name.to_string(),
            collection: def.collection.to_string(),
            schema,
            hooks: def.hooks,
        });
        self.models.insert(def.name.to_string(), Arc::clone(&model));
        Ok(model)
    }

    pub fn get(&self, name: &str) -> DomainResult<Arc<Model>> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::InvalidArgument(format!("model '{name}' is not registered")))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn models(&self) -> impl Iterator<Item = &Arc<Model>> {
        self.models.values()
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
