//! Variant (discriminated-model) resolution.
//!
//! A tagged-union registry: the discriminator value of a request body selects
//! one concrete, standalone [`ModelSchema`]. Resolution happens once per
//! request.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::RouterError;
use crate::model::{ModelSchema, Record};

pub const DEFAULT_DISCRIMINATOR_KEY: &str = "__t";

/// The concrete model a request operates on.
#[derive(Clone, Debug)]
pub struct ResolvedModel {
    schema: Arc<ModelSchema>,
    variant: Option<String>,
    discriminator_key: Arc<str>,
}

impl ResolvedModel {
    #[must_use]
    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    /// `None` for the base model.
    #[must_use]
    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }

    #[must_use]
    pub fn discriminator_key(&self) -> &str {
        &self.discriminator_key
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.schema.name()
    }
}

#[derive(Clone, Debug)]
pub struct VariantRegistry {
    key: Arc<str>,
    base: Arc<ModelSchema>,
    variants: HashMap<String, Arc<ModelSchema>>,
}

impl VariantRegistry {
    #[must_use]
    pub fn new(base: ModelSchema) -> Self {
        Self {
            key: Arc::from(DEFAULT_DISCRIMINATOR_KEY),
            base: Arc::new(base),
            variants: HashMap::new(),
        }
    }

    /// Register a variant under its schema name.
    #[must_use]
    pub fn variant(mut self, schema: ModelSchema) -> Self {
        self.variants
            .insert(schema.name().to_owned(), Arc::new(schema));
        self
    }

    #[must_use]
    pub fn discriminator_key(mut self, key: &str) -> Self {
        self.key = Arc::from(key);
        self
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn base_schema(&self) -> &ModelSchema {
        &self.base
    }

    pub fn variant_names(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }

    #[must_use]
    pub fn base(&self) -> ResolvedModel {
        ResolvedModel {
            schema: Arc::clone(&self.base),
            variant: None,
            discriminator_key: Arc::clone(&self.key),
        }
    }

    /// Resolve the model named by `body`'s discriminator, or the base model
    /// when the body carries none.
    ///
    /// # Errors
    /// [`RouterError::UnknownVariant`] when the named variant is not registered;
    /// [`RouterError::Validation`] when the discriminator is not a string.
    pub fn resolve(&self, body: Option<&Record>) -> Result<ResolvedModel, RouterError> {
        match body.and_then(|b| b.get(&*self.key)) {
            None | Some(Value::Null) => Ok(self.base()),
            Some(Value::String(name)) => self.by_name(name),
            Some(other) => Err(RouterError::validation(format!(
                "{} must be a string, got: {other}",
                self.key
            ))),
        }
    }

    /// Resolve the model a stored record belongs to.
    ///
    /// # Errors
    /// [`RouterError::UnknownVariant`] when the record names an unregistered variant.
    pub fn for_record(&self, record: &Record) -> Result<ResolvedModel, RouterError> {
        match record.get(&*self.key).and_then(Value::as_str) {
            Some(name) => self.by_name(name),
            None => Ok(self.base()),
        }
    }

    /// False when a record fetched through `model` belongs to a different
    /// variant than the request named.
    ///
    /// A request through the base model never matches a variant record: that
    /// would bypass variant-specific hooks and validation.
    #[must_use]
    pub fn record_matches(&self, model: &ResolvedModel, record: &Record) -> bool {
        let stored = record.get(&*self.key).and_then(Value::as_str);
        stored == model.variant()
    }

    fn by_name(&self, name: &str) -> Result<ResolvedModel, RouterError> {
        let schema = self.variants.get(name).ok_or_else(|| {
            tracing::error!(
                model = self.base.name(),
                variant = name,
                "Unregistered variant requested"
            );
            RouterError::UnknownVariant {
                key: self.key.to_string(),
                value: name.to_owned(),
                model: self.base.name().to_owned(),
            }
        })?;
        Ok(ResolvedModel {
            schema: Arc::clone(schema),
            variant: Some(name.to_owned()),
            discriminator_key: Arc::clone(&self.key),
        })
    }
}
