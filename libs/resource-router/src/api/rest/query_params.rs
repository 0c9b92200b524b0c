//! Query-string decoding into router query parameters.
//!
//! `key=value` becomes a string value, `key[$op]=value` adds `$op` to an
//! object under `key`, and a value that is a JSON object literal is passed
//! through as that object.

use serde_json::{Map, Value};

use crate::error::RouterError;
use crate::query::QueryParams;

/// # Errors
/// [`RouterError::Validation`] when the query string is not valid
/// `application/x-www-form-urlencoded`.
pub fn parse_query(raw: Option<&str>) -> Result<QueryParams, RouterError> {
    let Some(raw) = raw.filter(|q| !q.is_empty()) else {
        return Ok(QueryParams::new());
    };
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw)
        .map_err(|e| RouterError::validation(format!("Malformed query string: {e}")))?;

    let mut params = QueryParams::new();
    for (key, value) in pairs {
        let value = decode_value(value);
        match split_operator(&key) {
            Some((root, op)) => {
                let slot = params
                    .entry(root.to_owned())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                if let Value::Object(ops) = slot {
                    ops.insert(op.to_owned(), value);
                }
            }
            None => {
                params.insert(key, value);
            }
        }
    }
    Ok(params)
}

/// `created[$gte]` -> `("created", "$gte")`.
fn split_operator(key: &str) -> Option<(&str, &str)> {
    let open = key.find('[')?;
    let inner = key.strip_suffix(']')?.get(open + 1..)?;
    let root = &key[..open];
    if root.is_empty() || inner.is_empty() {
        return None;
    }
    Some((root, inner))
}

fn decode_value(value: String) -> Value {
    if value.trim_start().starts_with('{')
        && let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(&value)
    {
        return Value::Object(obj);
    }
    Value::String(value)
}

/// String value of `key`, if present.
#[must_use]
pub fn string_param<'a>(params: &'a QueryParams, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}
