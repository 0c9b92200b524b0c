//! Immutable per-resource configuration.

use std::sync::Arc;

use resource_security::{Actor, DEFAULT_OWNER_FIELD};
use thiserror::Error;

use crate::config::RouterDefaults;
use crate::field_mask::Transformer;
use crate::hooks::Hooks;
use crate::permission::Permissions;
use crate::query::{Baseline, BaselineFilter, Filter, QuerySettings, SortSpec};
use crate::variant::VariantRegistry;

/// Construction-time configuration errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("default_limit must be at least 1")]
    ZeroLimit,

    #[error("default_limit {default_limit} exceeds max_limit {max_limit}")]
    LimitAboveMax { default_limit: u64, max_limit: u64 },

    #[error("discriminator key must not be empty")]
    EmptyDiscriminatorKey,

    #[error("populate path '{path}' is not a reference field of {model}")]
    NotAReference { path: String, model: String },
}

/// Everything the router needs to know about one resource.
///
/// Built once at mount time and shared read-only by every request.
pub struct ResourceDefinition {
    pub(crate) registry: VariantRegistry,
    pub(crate) permissions: Permissions,
    pub(crate) query: QuerySettings,
    pub(crate) populate: Vec<String>,
    pub(crate) hooks: Hooks,
    pub(crate) transformer: Transformer,
    pub(crate) owner_field: String,
    pub(crate) query_filter: Option<BaselineFilter>,
}

impl ResourceDefinition {
    #[must_use]
    pub fn builder(registry: VariantRegistry) -> ResourceDefinitionBuilder {
        ResourceDefinitionBuilder {
            registry,
            permissions: Permissions::new(),
            query: QuerySettings::default(),
            populate: Vec::new(),
            hooks: Hooks::new(),
            transformer: Transformer::default(),
            owner_field: DEFAULT_OWNER_FIELD.to_owned(),
            query_filter: None,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &VariantRegistry {
        &self.registry
    }

    #[must_use]
    pub fn permissions(&self) -> &Permissions {
        &self.permissions
    }

    #[must_use]
    pub fn query(&self) -> &QuerySettings {
        &self.query
    }

    #[must_use]
    pub fn populate_paths(&self) -> &[String] {
        &self.populate
    }

    #[must_use]
    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    #[must_use]
    pub fn transformer(&self) -> &Transformer {
        &self.transformer
    }

    #[must_use]
    pub fn owner_field(&self) -> &str {
        &self.owner_field
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        self.registry.base_schema().name()
    }

    /// Mandatory filter for `actor`; an empty filter when none is configured.
    #[must_use]
    pub fn baseline(&self, actor: Option<&Actor>) -> Baseline {
        self.query_filter
            .as_ref()
            .map_or_else(|| Baseline::Filter(Filter::new()), |f| f(actor))
    }
}

impl std::fmt::Debug for ResourceDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceDefinition")
            .field("model", &self.model_name())
            .field("query", &self.query)
            .field("populate", &self.populate)
            .field("hooks", &self.hooks)
            .field("owner_field", &self.owner_field)
            .finish_non_exhaustive()
    }
}

pub struct ResourceDefinitionBuilder {
    registry: VariantRegistry,
    permissions: Permissions,
    query: QuerySettings,
    populate: Vec<String>,
    hooks: Hooks,
    transformer: Transformer,
    owner_field: String,
    query_filter: Option<BaselineFilter>,
}

impl ResourceDefinitionBuilder {
    /// Seed limits, discriminator key and owner field from deployment defaults.
    #[must_use]
    pub fn with_defaults(mut self, defaults: &RouterDefaults) -> Self {
        self.query.default_limit = defaults.default_limit;
        self.query.max_limit = defaults.max_limit;
        self.registry = self.registry.discriminator_key(&defaults.discriminator_key);
        self.owner_field.clone_from(&defaults.owner_field);
        self
    }

    #[must_use]
    pub fn permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    #[must_use]
    pub fn query_fields<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.query.query_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn default_query_params(mut self, params: Filter) -> Self {
        self.query.default_query_params = params;
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.query.sort = sort;
        self
    }

    #[must_use]
    pub fn default_limit(mut self, limit: u64) -> Self {
        self.query.default_limit = limit;
        self
    }

    #[must_use]
    pub fn max_limit(mut self, limit: u64) -> Self {
        self.query.max_limit = limit;
        self
    }

    #[must_use]
    pub fn populate<I>(mut self, paths: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.populate = paths.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn transformer(mut self, transformer: Transformer) -> Self {
        self.transformer = transformer;
        self
    }

    #[must_use]
    pub fn discriminator_key(mut self, key: &str) -> Self {
        self.registry = self.registry.discriminator_key(key);
        self
    }

    #[must_use]
    pub fn owner_field(mut self, field: impl Into<String>) -> Self {
        self.owner_field = field.into();
        self
    }

    /// Per-actor mandatory list filter.
    #[must_use]
    pub fn query_filter<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Actor>) -> Baseline + Send + Sync + 'static,
    {
        self.query_filter = Some(Arc::new(f));
        self
    }

    /// # Errors
    /// [`DefinitionError`] when limits, the discriminator key or the populate
    /// paths are inconsistent with each other or with the base schema.
    pub fn build(self) -> Result<ResourceDefinition, DefinitionError> {
        if self.query.default_limit == 0 {
            return Err(DefinitionError::ZeroLimit);
        }
        if self.query.default_limit > self.query.max_limit {
            return Err(DefinitionError::LimitAboveMax {
                default_limit: self.query.default_limit,
                max_limit: self.query.max_limit,
            });
        }
        if self.registry.key().is_empty() {
            return Err(DefinitionError::EmptyDiscriminatorKey);
        }
        let base = self.registry.base_schema();
        if let Some(path) = self
            .populate
            .iter()
            .find(|p| base.reference_target(p).is_none())
        {
            return Err(DefinitionError::NotAReference {
                path: path.clone(),
                model: base.name().to_owned(),
            });
        }

        Ok(ResourceDefinition {
            registry: self.registry,
            permissions: self.permissions,
            query: self.query,
            populate: self.populate,
            hooks: self.hooks,
            transformer: self.transformer,
            owner_field: self.owner_field,
            query_filter: self.query_filter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldKind, ModelSchema};

    fn registry() -> VariantRegistry {
        VariantRegistry::new(
            ModelSchema::builder("Food")
                .field("name", FieldKind::String)
                .field("ownerId", FieldKind::Reference("users".to_owned()))
                .build(),
        )
    }

    #[test]
    fn defaults_apply() {
        let def = ResourceDefinition::builder(registry()).build().unwrap();
        assert_eq!(def.query().default_limit, 100);
        assert_eq!(def.query().max_limit, 500);
        assert_eq!(def.registry().key(), "__t");
        assert_eq!(def.owner_field(), "ownerId");
    }

    #[test]
    fn router_defaults_seed_then_override() {
        let defaults = RouterDefaults {
            default_limit: 20,
            max_limit: 40,
            discriminator_key: "kind".to_owned(),
            owner_field: "author".to_owned(),
        };
        let def = ResourceDefinition::builder(registry())
            .with_defaults(&defaults)
            .max_limit(60)
            .build()
            .unwrap();
        assert_eq!(def.query().default_limit, 20);
        assert_eq!(def.query().max_limit, 60);
        assert_eq!(def.registry().key(), "kind");
        assert_eq!(def.owner_field(), "author");
    }

    #[test]
    fn rejects_inconsistent_limits() {
        let err = ResourceDefinition::builder(registry())
            .default_limit(0)
            .build()
            .unwrap_err();
        assert_eq!(err, DefinitionError::ZeroLimit);

        let err = ResourceDefinition::builder(registry())
            .default_limit(50)
            .max_limit(10)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::LimitAboveMax {
                default_limit: 50,
                max_limit: 10
            }
        );
    }

    #[test]
    fn rejects_empty_key_and_bad_populate() {
        let err = ResourceDefinition::builder(registry())
            .discriminator_key("")
            .build()
            .unwrap_err();
        assert_eq!(err, DefinitionError::EmptyDiscriminatorKey);

        let err = ResourceDefinition::builder(registry())
            .populate(["name"])
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "populate path 'name' is not a reference field of Food");

        assert!(ResourceDefinition::builder(registry()).populate(["ownerId"]).build().is_ok());
    }

    #[test]
    fn baseline_defaults_to_empty_filter() {
        let def = ResourceDefinition::builder(registry())
            .query_filter(|actor| {
                if actor.is_some() {
                    Baseline::Filter(Filter::new())
                } else {
                    Baseline::NoResults
                }
            })
            .build()
            .unwrap();
        assert_eq!(def.baseline(None), Baseline::NoResults);

        let open = ResourceDefinition::builder(registry()).build().unwrap();
        assert_eq!(open.baseline(None), Baseline::Filter(Filter::new()));
    }
}
