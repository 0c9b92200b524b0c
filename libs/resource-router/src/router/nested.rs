//! Array sub-resources: add, update and remove one element of an array field.
//!
//! Nested operations are authorised as `update` of the parent and persist the
//! parent as a whole. Hooks do not run for them.

use resource_security::Actor;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{ResourceRouter, actor_label};
use crate::error::RouterError;
use crate::model::{DEFAULT_PRIMARY_KEY, FieldKind, Record};
use crate::operation::Operation;
use crate::variant::ResolvedModel;

enum ArrayEdit<'a> {
    Add(Value),
    Update(&'a str, Value),
    Remove(&'a str),
}

/// String form used to match scalar elements and sub-document ids.
fn string_form(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn element_id(kind: &FieldKind, element: &Value) -> Option<String> {
    match kind {
        FieldKind::DocumentArray => element
            .as_object()
            .and_then(|doc| doc.get(DEFAULT_PRIMARY_KEY))
            .and_then(string_form),
        _ => string_form(element),
    }
}

/// The body must be exactly `{field: value}`.
fn single_key_value(field: &str, mut body: Record) -> Result<Value, RouterError> {
    if body.len() == 1
        && let Some(value) = body.remove(field)
    {
        return Ok(value);
    }
    let keys: Vec<&str> = body.keys().map(String::as_str).collect();
    Err(RouterError::validation(format!(
        "Malformed body, array operations should have a single, top level key, got: {}",
        keys.join(", ")
    )))
}

impl ResourceRouter {
    /// Append the value of the single-key body `{field: value}`.
    ///
    /// # Errors
    /// 405 at the operation gate, 400 for a malformed body or a non-array
    /// field, 404 for a missing parent, 403 at the object gate or on a mask
    /// violation.
    #[instrument(
        skip_all,
        fields(model = %self.model_name(), actor = actor_label(actor), id = %id, field = %field)
    )]
    pub async fn add_item(
        &self,
        actor: Option<&Actor>,
        id: &str,
        field: &str,
        body: Record,
    ) -> Result<Record, RouterError> {
        self.edit_array(actor, id, field, Some(body), ArrayEdit::Add)
            .await
    }

    /// # Errors
    /// As [`Self::add_item`], plus 404 when no element matches `child_id`.
    #[instrument(
        skip_all,
        fields(
            model = %self.model_name(),
            actor = actor_label(actor),
            id = %id,
            field = %field,
            child = %child_id,
        )
    )]
    pub async fn update_item(
        &self,
        actor: Option<&Actor>,
        id: &str,
        field: &str,
        child_id: &str,
        body: Record,
    ) -> Result<Record, RouterError> {
        self.edit_array(actor, id, field, Some(body), |value| {
            ArrayEdit::Update(child_id, value)
        })
        .await
    }

    /// # Errors
    /// As [`Self::update_item`].
    #[instrument(
        skip_all,
        fields(
            model = %self.model_name(),
            actor = actor_label(actor),
            id = %id,
            field = %field,
            child = %child_id,
        )
    )]
    pub async fn remove_item(
        &self,
        actor: Option<&Actor>,
        id: &str,
        field: &str,
        child_id: &str,
    ) -> Result<Record, RouterError> {
        self.edit_array(actor, id, field, None, |_| ArrayEdit::Remove(child_id))
            .await
    }

    async fn edit_array<'a>(
        &self,
        actor: Option<&Actor>,
        id: &str,
        field: &str,
        body: Option<Record>,
        edit: impl FnOnce(Value) -> ArrayEdit<'a> + Send,
    ) -> Result<Record, RouterError> {
        self.gate(Operation::Update, actor).await?;
        if let Some(body) = &body {
            // shape check only; the value is taken after masking
            single_key_value(field, body.clone())?;
        }

        let base = self.definition.registry.base();
        let parent = self.load_any(&base, id).await?;
        let model = self.definition.registry.for_record(&parent)?;
        self.gate_record(Operation::Update, actor, &parent).await?;

        let kind = array_kind(&model, field)?;
        let value = match body {
            Some(body) => {
                let masked = self.mask_input(body, Operation::Update, actor, &parent)?;
                single_key_value(field, masked)?
            }
            None => Value::Null,
        };

        let mut items = match parent.get(field) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        let not_found =
            |child: &str| RouterError::not_found(format!("Could not find {field}/{child}"));
        let position = |child: &str, items: &[Value]| {
            items
                .iter()
                .position(|e| element_id(&kind, e).as_deref() == Some(child))
        };

        match edit(value) {
            ArrayEdit::Add(value) => items.push(value),
            ArrayEdit::Update(child, value) => {
                let index = position(child, &items).ok_or_else(|| not_found(child))?;
                let replacement = match (&kind, value) {
                    (FieldKind::DocumentArray, Value::Object(mut doc)) => {
                        if let Some(sub_id) = items[index].get(DEFAULT_PRIMARY_KEY) {
                            doc.insert(DEFAULT_PRIMARY_KEY.to_owned(), sub_id.clone());
                        }
                        Value::Object(doc)
                    }
                    (_, value) => value,
                };
                items[index] = replacement;
            }
            ArrayEdit::Remove(child) => {
                let index = position(child, &items).ok_or_else(|| not_found(child))?;
                items.remove(index);
            }
        }

        let mut next = parent;
        next.insert(field.to_owned(), Value::Array(items));
        let saved = self.store.replace(&model, next).await?;
        debug!("Updated array field");
        Ok(self.serialize(&saved, actor))
    }
}

fn array_kind(model: &ResolvedModel, field: &str) -> Result<FieldKind, RouterError> {
    match model.schema().field(field) {
        Some(def) if def.kind.is_array() => Ok(def.kind.clone()),
        _ => Err(RouterError::validation(format!(
            "{field} is not an array field of {}",
            model.name()
        ))),
    }
}
