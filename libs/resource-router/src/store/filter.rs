//! Document filter evaluation for the in-memory engine.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::model::{FieldKind, ModelSchema, Record};

/// Value at a dotted `path`, descending through nested objects.
#[must_use]
pub fn lookup<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// True when `record` satisfies every condition in `filter`.
///
/// # Errors
/// [`StoreError::Validation`] for an unknown `$operator`.
pub fn matches(
    record: &Record,
    filter: &Map<String, Value>,
    schema: &ModelSchema,
) -> Result<bool, StoreError> {
    for (path, condition) in filter {
        let kind = schema.kind_at(path);
        let actual = lookup(record, path);
        let ok = match condition.as_object() {
            Some(ops) if is_operator_object(ops) => {
                let mut all = true;
                for (op, operand) in ops {
                    if !apply_operator(op, actual, &cast(operand, kind))? {
                        all = false;
                        break;
                    }
                }
                all
            }
            _ => equals(actual, &cast(condition, kind)),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn is_operator_object(ops: &Map<String, Value>) -> bool {
    !ops.is_empty() && ops.keys().all(|k| k.starts_with('$'))
}

fn apply_operator(op: &str, actual: Option<&Value>, operand: &Value) -> Result<bool, StoreError> {
    Ok(match op {
        "$eq" => equals(actual, operand),
        "$ne" => !equals(actual, operand),
        "$in" => in_list(actual, operand),
        "$nin" => !in_list(actual, operand),
        "$gt" => ordered(actual, operand, |o| o == Ordering::Greater),
        "$gte" => ordered(actual, operand, |o| o != Ordering::Less),
        "$lt" => ordered(actual, operand, |o| o == Ordering::Less),
        "$lte" => ordered(actual, operand, |o| o != Ordering::Greater),
        other => {
            return Err(StoreError::Validation(format!(
                "Unsupported query operator: {other}"
            )));
        }
    })
}

/// Cast a string filter value to the field's declared kind.
fn cast(value: &Value, kind: Option<&FieldKind>) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|v| cast(v, kind)).collect()),
        Value::String(s) => match kind {
            Some(FieldKind::Number) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map_or_else(|| value.clone(), Value::Number),
            Some(FieldKind::Boolean) => match s.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => value.clone(),
            },
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Equality; an array value matches when any element equals a scalar operand.
fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None | Some(Value::Null), Value::Null) => true,
        (None, _) => false,
        (Some(Value::Array(items)), e) if !e.is_array() => items.iter().any(|i| scalar_eq(i, e)),
        (Some(a), e) => scalar_eq(a, e),
    }
}

fn in_list(actual: Option<&Value>, operand: &Value) -> bool {
    match operand {
        Value::Array(candidates) => candidates.iter().any(|c| equals(actual, c)),
        single => equals(actual, single),
    }
}

fn ordered(actual: Option<&Value>, operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    match actual {
        Some(Value::Array(items)) => items
            .iter()
            .any(|i| compare_values(i, operand).is_some_and(&accept)),
        Some(v) => compare_values(v, operand).is_some_and(accept),
        None => false,
    }
}

/// Ordering between two scalars of the same JSON type.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}
