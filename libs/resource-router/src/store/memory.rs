//! In-memory document engine.
//!
//! One [`MemoryDatabase`] holds named collections; a [`MemoryStore`] is a
//! handle on one of them. Schemas are strict: unknown fields are dropped on
//! write, declared fields are type-checked.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use super::ResourceStore;
use super::filter::{compare_values, lookup, matches};
use crate::error::StoreError;
use crate::model::{
    CREATED_FIELD, DEFAULT_PRIMARY_KEY, FieldKind, ModelSchema, Record, UPDATED_FIELD,
};
use crate::query::{FindQuery, SortOrder};
use crate::variant::ResolvedModel;

#[derive(Clone, Default)]
pub struct MemoryDatabase {
    collections: Arc<RwLock<HashMap<String, Vec<Record>>>>,
}

impl MemoryDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on `collection`; the collection is created lazily.
    #[must_use]
    pub fn store(&self, collection: impl Into<String>) -> MemoryStore {
        MemoryStore {
            db: self.clone(),
            collection: collection.into(),
        }
    }

    /// Raw copy of a collection, bypassing models and filters.
    #[must_use]
    pub fn dump(&self, collection: &str) -> Vec<Record> {
        self.collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn get_by_id(&self, collection: &str, id: &str) -> Option<Record> {
        self.collections
            .read()
            .get(collection)?
            .iter()
            .find(|r| id_string(r.get(DEFAULT_PRIMARY_KEY)).as_deref() == Some(id))
            .cloned()
    }
}

impl std::fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.collections.read();
        let mut dbg = f.debug_map();
        for (name, records) in guard.iter() {
            dbg.entry(name, &records.len());
        }
        dbg.finish()
    }
}

#[derive(Clone, Debug)]
pub struct MemoryStore {
    db: MemoryDatabase,
    collection: String,
}

impl MemoryStore {
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn visible(model: &ResolvedModel, record: &Record) -> bool {
        match model.variant() {
            Some(variant) => {
                record.get(model.discriminator_key()).and_then(Value::as_str) == Some(variant)
            }
            None => true,
        }
    }
}

fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn now_rfc3339() -> Result<String, StoreError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| StoreError::Internal(e.to_string()))
}

fn type_error(schema: &ModelSchema, field: &str, reason: &str) -> StoreError {
    StoreError::Validation(format!("{} validation failed: {field}: {reason}", schema.name()))
}

fn check_kind(
    schema: &ModelSchema,
    field: &str,
    kind: &FieldKind,
    value: &Value,
) -> Result<(), StoreError> {
    let ok = match kind {
        FieldKind::String => value.is_string(),
        FieldKind::Number => value.is_number(),
        FieldKind::Boolean => value.is_boolean(),
        FieldKind::DateTime => {
            let Some(s) = value.as_str() else {
                return Err(type_error(schema, field, "expected an RFC 3339 date-time"));
            };
            OffsetDateTime::parse(s, &Rfc3339).is_ok()
        }
        FieldKind::Object => value.is_object(),
        FieldKind::Reference(_) => value.is_string() || value.is_number(),
        FieldKind::ScalarArray => value
            .as_array()
            .is_some_and(|items| items.iter().all(|i| !i.is_object() && !i.is_array())),
        FieldKind::DocumentArray => value
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_object)),
        FieldKind::Any => true,
    };
    if ok {
        Ok(())
    } else {
        let expected = match kind {
            FieldKind::String => "expected a string",
            FieldKind::Number => "expected a number",
            FieldKind::Boolean => "expected a boolean",
            FieldKind::DateTime => "expected an RFC 3339 date-time",
            FieldKind::Object => "expected an object",
            FieldKind::Reference(_) => "expected a reference id",
            FieldKind::ScalarArray => "expected an array of scalars",
            FieldKind::DocumentArray => "expected an array of objects",
            FieldKind::Any => "unexpected value",
        };
        Err(type_error(schema, field, expected))
    }
}

/// Strip unknown fields, validate the rest, assign sub-document ids and stamp
/// the discriminator.
fn normalize(model: &ResolvedModel, record: Record) -> Result<Record, StoreError> {
    let schema = model.schema();
    let pk = schema.primary_key();
    let mut out = Record::new();

    for (key, value) in record {
        if key == pk {
            out.insert(key, value);
            continue;
        }
        let Some(def) = schema.field(&key) else {
            continue;
        };
        if value.is_null() {
            out.insert(key, value);
            continue;
        }
        check_kind(schema, &key, &def.kind, &value)?;
        let value = match (&def.kind, value) {
            (FieldKind::DocumentArray, Value::Array(items)) => {
                Value::Array(items.into_iter().map(with_sub_id).collect())
            }
            (_, v) => v,
        };
        out.insert(key, value);
    }

    for (name, def) in schema.fields() {
        if def.required && out.get(name).is_none_or(Value::is_null) {
            return Err(type_error(schema, name, "is required"));
        }
    }

    if let Some(variant) = model.variant() {
        out.insert(
            model.discriminator_key().to_owned(),
            Value::String(variant.to_owned()),
        );
    }
    Ok(out)
}

fn with_sub_id(item: Value) -> Value {
    match item {
        Value::Object(mut doc) => {
            if doc.get(DEFAULT_PRIMARY_KEY).is_none_or(Value::is_null) {
                doc.insert(
                    DEFAULT_PRIMARY_KEY.to_owned(),
                    Value::String(Uuid::now_v7().to_string()),
                );
            }
            Value::Object(doc)
        }
        other => other,
    }
}

fn sort_records(records: &mut [Record], query: &FindQuery, primary_key: &str) {
    records.sort_by(|a, b| {
        for (field, order) in query.sort.keys() {
            let ord = compare_optional(lookup(a, field), lookup(b, field));
            let ord = match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        compare_optional(a.get(primary_key), b.get(primary_key))
    });
}

/// Missing and `null` sort before everything else.
fn compare_optional(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn find_by_id(
        &self,
        model: &ResolvedModel,
        id: &str,
    ) -> Result<Option<Record>, StoreError> {
        let pk = model.schema().primary_key();
        let guard = self.db.collections.read();
        Ok(guard.get(&self.collection).and_then(|records| {
            records
                .iter()
                .find(|r| id_string(r.get(pk)).as_deref() == Some(id) && Self::visible(model, r))
                .cloned()
        }))
    }

    async fn find(
        &self,
        model: &ResolvedModel,
        query: &FindQuery,
    ) -> Result<Vec<Record>, StoreError> {
        let schema = model.schema();
        let mut hits = Vec::new();
        {
            let guard = self.db.collections.read();
            for record in guard.get(&self.collection).into_iter().flatten() {
                if Self::visible(model, record) && matches(record, &query.filter, schema)? {
                    hits.push(record.clone());
                }
            }
        }
        sort_records(&mut hits, query, schema.primary_key());
        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        Ok(hits.into_iter().skip(skip).take(limit).collect())
    }

    async fn insert(&self, model: &ResolvedModel, record: Record) -> Result<Record, StoreError> {
        let schema = model.schema();
        let pk = schema.primary_key().to_owned();
        let mut doc = normalize(model, record)?;
        if doc.get(&pk).is_none_or(Value::is_null) {
            doc.insert(pk.clone(), Value::String(Uuid::now_v7().to_string()));
        }
        let now = now_rfc3339()?;
        if schema.has_timestamp(CREATED_FIELD)
            && doc.get(CREATED_FIELD).is_none_or(Value::is_null)
        {
            doc.insert(CREATED_FIELD.to_owned(), Value::String(now.clone()));
        }
        if schema.has_timestamp(UPDATED_FIELD) {
            doc.insert(UPDATED_FIELD.to_owned(), Value::String(now));
        }
        let id = id_string(doc.get(&pk))
            .ok_or_else(|| type_error(schema, &pk, "expected a string or number id"))?;

        let mut guard = self.db.collections.write();
        let records = guard.entry(self.collection.clone()).or_default();
        if records
            .iter()
            .any(|r| id_string(r.get(&pk)).as_deref() == Some(id.as_str()))
        {
            return Err(StoreError::Validation(format!(
                "{} validation failed: {pk}: duplicate id {id}",
                schema.name()
            )));
        }
        records.push(doc.clone());
        Ok(doc)
    }

    async fn replace(&self, model: &ResolvedModel, record: Record) -> Result<Record, StoreError> {
        let schema = model.schema();
        let pk = schema.primary_key().to_owned();
        let id = id_string(record.get(&pk))
            .ok_or_else(|| StoreError::Internal(format!("replace without {pk}")))?;
        let mut doc = normalize(model, record)?;
        if schema.has_timestamp(UPDATED_FIELD) {
            doc.insert(UPDATED_FIELD.to_owned(), Value::String(now_rfc3339()?));
        }

        let mut guard = self.db.collections.write();
        let slot = guard
            .get_mut(&self.collection)
            .and_then(|records| {
                records
                    .iter_mut()
                    .find(|r| id_string(r.get(&pk)).as_deref() == Some(id.as_str()))
            })
            .ok_or_else(|| StoreError::NotFound(format!("Could not find document with id {id}")))?;
        if let Some(created) = slot.get(CREATED_FIELD)
            && schema.has_timestamp(CREATED_FIELD)
        {
            doc.insert(CREATED_FIELD.to_owned(), created.clone());
        }
        *slot = doc.clone();
        Ok(doc)
    }

    async fn remove(&self, model: &ResolvedModel, id: &str) -> Result<(), StoreError> {
        let pk = model.schema().primary_key();
        let mut guard = self.db.collections.write();
        if let Some(records) = guard.get_mut(&self.collection) {
            records.retain(|r| id_string(r.get(pk)).as_deref() != Some(id));
        }
        Ok(())
    }

    async fn populate(
        &self,
        model: &ResolvedModel,
        mut records: Vec<Record>,
        paths: &[String],
    ) -> Result<Vec<Record>, StoreError> {
        let schema = model.schema();
        for path in paths {
            let Some(target) = schema.reference_target(path) else {
                continue;
            };
            for record in &mut records {
                let Some(id) = id_string(record.get(path)) else {
                    continue;
                };
                let expanded = self
                    .db
                    .get_by_id(target, &id)
                    .map_or(Value::Null, Value::Object);
                record.insert(path.clone(), expanded);
            }
        }
        Ok(records)
    }
}
