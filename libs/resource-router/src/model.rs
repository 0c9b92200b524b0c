//! Schema introspection for backing models.
//!
//! The persistence engine is a black box to the router; this is the narrow
//! slice of its schema the router needs: field kinds (to find array fields and
//! reference fields), the primary key, soft-delete and timestamp detection.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// One record of a backing model.
pub type Record = Map<String, Value>;

/// Name of the boolean field that turns deletion into a soft delete.
pub const SOFT_DELETE_FIELD: &str = "deleted";
/// Timestamp stamped on insert when the schema declares it.
pub const CREATED_FIELD: &str = "created";
/// Timestamp stamped on every write when the schema declares it.
pub const UPDATED_FIELD: &str = "updated";
/// Default primary key and sub-document identifier.
pub const DEFAULT_PRIMARY_KEY: &str = "_id";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    /// RFC 3339 string.
    DateTime,
    Object,
    /// Id of a record in the named collection; expandable via populate.
    Reference(String),
    /// Array of scalars addressed by value.
    ScalarArray,
    /// Array of sub-documents addressed by their own `_id`.
    DocumentArray,
    Any,
}

impl FieldKind {
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, Self::ScalarArray | Self::DocumentArray)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDef {
    pub kind: FieldKind,
    pub required: bool,
    /// Hidden fields are never part of the default serialization.
    pub hidden: bool,
}

impl FieldDef {
    #[must_use]
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            hidden: false,
        }
    }
}

/// Complete, standalone schema of one model or one variant.
///
/// Variants do not inherit from their base at runtime: a variant schema is a
/// full copy of the fields it accepts, so a field declared only on one variant
/// can never leak into another.
#[derive(Clone, Debug)]
pub struct ModelSchema {
    name: String,
    primary_key: String,
    fields: BTreeMap<String, FieldDef>,
}

impl ModelSchema {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ModelSchemaBuilder {
        ModelSchemaBuilder {
            schema: ModelSchema {
                name: name.into(),
                primary_key: DEFAULT_PRIMARY_KEY.to_owned(),
                fields: BTreeMap::new(),
            },
        }
    }

    /// Start a variant schema from a copy of this one's fields.
    #[must_use]
    pub fn extend(&self, name: impl Into<String>) -> ModelSchemaBuilder {
        ModelSchemaBuilder {
            schema: ModelSchema {
                name: name.into(),
                primary_key: self.primary_key.clone(),
                fields: self.fields.clone(),
            },
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDef)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Kind of the field at a dotted `path`, descending only through the
    /// declared top-level field.
    #[must_use]
    pub fn kind_at(&self, path: &str) -> Option<&FieldKind> {
        let root = path.split('.').next().unwrap_or(path);
        let def = self.fields.get(root)?;
        if root.len() == path.len() {
            Some(&def.kind)
        } else {
            None
        }
    }

    #[must_use]
    pub fn soft_delete_field(&self) -> Option<&str> {
        self.fields
            .get(SOFT_DELETE_FIELD)
            .filter(|def| def.kind == FieldKind::Boolean)
            .map(|_| SOFT_DELETE_FIELD)
    }

    #[must_use]
    pub fn has_timestamp(&self, field: &str) -> bool {
        self.fields
            .get(field)
            .is_some_and(|def| def.kind == FieldKind::DateTime)
    }

    /// Reference fields whose ids can be expanded.
    #[must_use]
    pub fn reference_target(&self, path: &str) -> Option<&str> {
        match self.fields.get(path).map(|def| &def.kind) {
            Some(FieldKind::Reference(target)) => Some(target.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_soft_deleted(&self, record: &Record) -> bool {
        self.soft_delete_field()
            .and_then(|f| record.get(f))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Primary key value of `record` as a string.
    #[must_use]
    pub fn id_of(&self, record: &Record) -> Option<String> {
        match record.get(&self.primary_key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

pub struct ModelSchemaBuilder {
    schema: ModelSchema,
}

impl ModelSchemaBuilder {
    #[must_use]
    pub fn primary_key(mut self, key: impl Into<String>) -> Self {
        self.schema.primary_key = key.into();
        self
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.schema.fields.insert(name.into(), FieldDef::new(kind));
        self
    }

    #[must_use]
    pub fn required(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        let mut def = FieldDef::new(kind);
        def.required = true;
        self.schema.fields.insert(name.into(), def);
        self
    }

    #[must_use]
    pub fn hidden(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        let mut def = FieldDef::new(kind);
        def.hidden = true;
        self.schema.fields.insert(name.into(), def);
        self
    }

    #[must_use]
    pub fn build(self) -> ModelSchema {
        self.schema
    }
}
