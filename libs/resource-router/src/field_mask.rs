//! Field masking: which fields a caller may write, and which it may see.
//!
//! Masks are keyed by [`Classification`]. The write side is all-or-nothing:
//! one forbidden field fails the whole body. The read side projects a record
//! onto the allowed fields plus a derived `id`.

use std::sync::Arc;

use resource_security::{Actor, Classification};
use serde_json::{Map, Value};

use crate::error::RouterError;
use crate::model::{ModelSchema, Record};
use crate::operation::Operation;

/// Field always present in serialized output, mirroring the primary key.
pub const ID_FIELD: &str = "id";

/// Read and write allow-lists of one classification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldMask {
    pub read: Vec<String>,
    pub write: Vec<String>,
}

impl FieldMask {
    #[must_use]
    pub fn new<R, W>(read: R, write: W) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        W: IntoIterator,
        W::Item: Into<String>,
    {
        Self {
            read: read.into_iter().map(Into::into).collect(),
            write: write.into_iter().map(Into::into).collect(),
        }
    }
}

/// One mask per classification. An unset tier can read only `id` and write nothing.
#[derive(Clone, Debug, Default)]
pub struct FieldMaskSpec {
    pub admin: FieldMask,
    pub owner: FieldMask,
    pub authenticated: FieldMask,
    pub anonymous: FieldMask,
}

impl FieldMaskSpec {
    #[must_use]
    pub fn for_classification(&self, classification: Classification) -> &FieldMask {
        match classification {
            Classification::Admin => &self.admin,
            Classification::Owner => &self.owner,
            Classification::Authenticated => &self.authenticated,
            Classification::Anonymous => &self.anonymous,
        }
    }
}

/// Reject `body` if it names any field outside `write_fields`.
///
/// Arrays are checked element by element; the first failing element aborts
/// the whole batch.
///
/// # Errors
/// [`RouterError::UnwritableFields`] listing every offending field of the
/// first failing object.
pub fn apply_write_mask(
    body: Value,
    classification: Classification,
    write_fields: &[String],
) -> Result<Value, RouterError> {
    match body {
        Value::Array(items) => items
            .into_iter()
            .map(|item| apply_write_mask(item, classification, write_fields))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            check_writable(&map, classification, write_fields).map(|()| Value::Object(map))
        }
        other => Err(RouterError::validation(format!(
            "Request body must be an object, got: {other}"
        ))),
    }
}

fn check_writable(
    body: &Record,
    classification: Classification,
    write_fields: &[String],
) -> Result<(), RouterError> {
    let mut denied: Vec<String> = body
        .keys()
        .filter(|k| !write_fields.iter().any(|w| w == *k))
        .cloned()
        .collect();
    denied.sort();
    if denied.is_empty() {
        Ok(())
    } else {
        Err(RouterError::UnwritableFields {
            classification,
            fields: denied,
        })
    }
}

/// Project `record` onto `read_fields` plus a derived `id`.
///
/// Fields outside the list are omitted, never nulled. Serializing an already
/// serialized record with the same list yields the same projection.
#[must_use]
pub fn apply_serialize(record: &Record, read_fields: &[String], primary_key: &str) -> Record {
    let mut out = Map::new();
    for field in read_fields {
        if field == ID_FIELD {
            continue;
        }
        if let Some(value) = record.get(field) {
            out.insert(field.clone(), value.clone());
        }
    }
    if let Some(id) = derived_id(record, primary_key) {
        out.insert(ID_FIELD.to_owned(), id);
    }
    out
}

/// Every non-hidden field plus a derived `id`.
#[must_use]
pub fn serialize_public(record: &Record, schema: &ModelSchema) -> Record {
    let mut out: Record = record
        .iter()
        .filter(|(k, _)| !schema.field(k).is_some_and(|def| def.hidden))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if let Some(id) = derived_id(record, schema.primary_key()) {
        out.insert(ID_FIELD.to_owned(), id);
    }
    out
}

fn derived_id(record: &Record, primary_key: &str) -> Option<Value> {
    record
        .get(primary_key)
        .or_else(|| record.get(ID_FIELD))
        .cloned()
}

pub type TransformFn =
    Arc<dyn Fn(Record, Operation, Option<&Actor>) -> Result<Record, String> + Send + Sync>;
pub type SerializeFn = Arc<dyn Fn(&Record, Option<&Actor>) -> Record + Send + Sync>;

/// How a resource masks input and output.
#[derive(Clone, Default)]
pub enum Transformer {
    /// Every field writable; full public record returned.
    #[default]
    Open,
    /// Classification-driven masks.
    Masked(FieldMaskSpec),
    /// Caller-supplied transform and/or serialize; a missing half falls back
    /// to the open behavior.
    Custom {
        transform: Option<TransformFn>,
        serialize: Option<SerializeFn>,
    },
}

impl Transformer {
    /// Apply the write side to a request body.
    ///
    /// # Errors
    /// [`RouterError::UnwritableFields`] for mask violations,
    /// [`RouterError::TransformRejected`] when a custom transform refuses.
    pub fn transform(
        &self,
        body: Record,
        operation: Operation,
        actor: Option<&Actor>,
        classification: Classification,
    ) -> Result<Record, RouterError> {
        match self {
            Self::Open | Self::Custom { transform: None, .. } => Ok(body),
            Self::Masked(spec) => {
                let mask = spec.for_classification(classification);
                check_writable(&body, classification, &mask.write)?;
                Ok(body)
            }
            Self::Custom {
                transform: Some(f), ..
            } => f(body, operation, actor).map_err(RouterError::TransformRejected),
        }
    }

    /// Apply the read side to a stored record.
    #[must_use]
    pub fn serialize(
        &self,
        record: &Record,
        schema: &ModelSchema,
        actor: Option<&Actor>,
        classification: Classification,
    ) -> Record {
        match self {
            Self::Open | Self::Custom { serialize: None, .. } => serialize_public(record, schema),
            Self::Masked(spec) => apply_serialize(
                record,
                &spec.for_classification(classification).read,
                schema.primary_key(),
            ),
            Self::Custom {
                serialize: Some(f), ..
            } => f(record, actor),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::FieldKind;

    fn owner_write() -> Vec<String> {
        vec!["name".to_owned(), "calories".to_owned(), "created".to_owned()]
    }

    #[test]
    fn write_mask_rejects_with_verbatim_message() {
        let err = apply_write_mask(
            json!({"ownerId": "someone"}),
            Classification::Owner,
            &owner_write(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "User of type owner cannot write fields: ownerId");
    }

    #[test]
    fn write_mask_names_every_offending_field() {
        let err = apply_write_mask(
            json!({"name": "ok", "ownerId": "x", "hidden": true}),
            Classification::Authenticated,
            &owner_write(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "User of type authenticated cannot write fields: hidden, ownerId"
        );
    }

    #[test]
    fn write_mask_first_failure_aborts_batch() {
        let body = json!([{"name": "a"}, {"ownerId": "b"}, {"secret": 1}]);
        let err = apply_write_mask(body, Classification::Owner, &owner_write()).unwrap_err();
        assert_eq!(err.to_string(), "User of type owner cannot write fields: ownerId");

        let ok = apply_write_mask(json!([{"name": "a"}]), Classification::Owner, &owner_write());
        assert!(ok.is_ok());
    }

    #[test]
    fn serialize_omits_unlisted_fields_and_adds_id() {
        let rec = json!({"_id": "f1", "name": "Spinach", "calories": 1, "hidden": false});
        let out = apply_serialize(rec.as_object().unwrap(), &["name".to_owned()], "_id");
        assert_eq!(Value::Object(out), json!({"name": "Spinach", "id": "f1"}));
    }

    #[test]
    fn serialize_is_idempotent() {
        let rec = json!({"_id": "f1", "name": "Spinach", "calories": 1});
        let read = vec!["name".to_owned(), "calories".to_owned()];
        let once = apply_serialize(rec.as_object().unwrap(), &read, "_id");
        let twice = apply_serialize(&once, &read, "_id");
        assert_eq!(once, twice);
    }

    #[test]
    fn open_serialize_drops_hidden_fields() {
        let schema = ModelSchema::builder("User")
            .field("name", FieldKind::String)
            .hidden("hash", FieldKind::String)
            .build();
        let rec = json!({"_id": "u1", "name": "Ann", "hash": "xyz"});
        let out = Transformer::Open.serialize(
            rec.as_object().unwrap(),
            &schema,
            None,
            Classification::Anonymous,
        );
        assert_eq!(Value::Object(out), json!({"_id": "u1", "name": "Ann", "id": "u1"}));
    }

    #[test]
    fn custom_transform_rejection_surfaces_message() {
        let transformer = Transformer::Custom {
            transform: Some(Arc::new(|_, _, _| Err("no writes today".to_owned()))),
            serialize: None,
        };
        let err = transformer
            .transform(Map::new(), Operation::Create, None, Classification::Anonymous)
            .unwrap_err();
        assert_eq!(err.to_string(), "no writes today");
    }
}
