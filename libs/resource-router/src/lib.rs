#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Governed list/create/read/update/delete endpoints synthesized from a model
//! definition: permission rules, classification-keyed field masks, query
//! validation with pagination, lifecycle hooks, array sub-resources and
//! discriminated variants.

pub mod api;
pub mod config;
pub mod definition;
pub mod error;
pub mod field_mask;
pub mod hooks;
pub mod model;
pub mod operation;
pub mod permission;
pub mod query;
pub mod router;
pub mod store;
pub mod variant;

pub use api::rest::{Problem, register_routes};
pub use config::RouterDefaults;
pub use definition::{DefinitionError, ResourceDefinition, ResourceDefinitionBuilder};
pub use error::{HookStage, RouterError, StoreError};
pub use field_mask::{FieldMask, FieldMaskSpec, Transformer, apply_serialize, apply_write_mask};
pub use hooks::{HookContext, Hooks};
pub use model::{FieldDef, FieldKind, ModelSchema, Record};
pub use operation::Operation;
pub use permission::{PermissionRule, Permissions, Rule, check_permissions, rules};
pub use query::{Baseline, FindQuery, QueryParams, QueryPlan, SortOrder, SortSpec, build_query};
pub use router::{ListPage, ResourceRouter};
pub use store::{MemoryDatabase, MemoryStore, ResourceStore};
pub use variant::{ResolvedModel, VariantRegistry};

pub use resource_security::{Actor, Classification, classify};
