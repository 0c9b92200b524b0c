use std::fmt;

use serde_json::{Map, Value};

use crate::Actor;

/// Field that names a record's owner unless a resource overrides it.
pub const DEFAULT_OWNER_FIELD: &str = "ownerId";

/// Trust tier of a caller relative to one record.
///
/// Field masks are keyed by classification rather than by individual field
/// rules: whole tiers of trust see whole tiers of fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Admin,
    Owner,
    Authenticated,
    Anonymous,
}

impl Classification {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Owner => "owner",
            Self::Authenticated => "authenticated",
            Self::Anonymous => "anonymous",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify `actor` against an optional `record`.
///
/// Pure and stateless: re-derive it for every record instead of caching it.
/// Ownership is string equality between the actor id and the record's
/// `owner_field`; numeric owner values compare by their string form.
#[must_use]
pub fn classify(
    actor: Option<&Actor>,
    record: Option<&Map<String, Value>>,
    owner_field: &str,
) -> Classification {
    let Some(actor) = actor else {
        return Classification::Anonymous;
    };
    if actor.is_admin() {
        return Classification::Admin;
    }
    if actor.is_anonymous() {
        return Classification::Anonymous;
    }
    if let Some(record) = record
        && is_owner(actor, record, owner_field)
    {
        return Classification::Owner;
    }
    Classification::Authenticated
}

/// True when `record[owner_field]` names `actor`.
#[must_use]
pub fn is_owner(actor: &Actor, record: &Map<String, Value>, owner_field: &str) -> bool {
    if actor.id().is_empty() {
        return false;
    }
    match record.get(owner_field) {
        Some(Value::String(owner)) => owner == actor.id(),
        Some(Value::Number(owner)) => owner.to_string() == actor.id(),
        // populated reference: compare the embedded document's id
        Some(Value::Object(owner)) => owner
            .get("_id")
            .or_else(|| owner.get("id"))
            .and_then(Value::as_str)
            .is_some_and(|id| id == actor.id()),
        _ => false,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: &Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_missing_actor_is_anonymous() {
        let rec = record(&json!({"ownerId": "u-1"}));
        assert_eq!(
            classify(None, Some(&rec), DEFAULT_OWNER_FIELD),
            Classification::Anonymous
        );
    }

    #[test]
    fn test_admin_wins_over_owner() {
        let actor = Actor::admin("u-1");
        let rec = record(&json!({"ownerId": "u-1"}));
        assert_eq!(
            classify(Some(&actor), Some(&rec), DEFAULT_OWNER_FIELD),
            Classification::Admin
        );
    }

    #[test]
    fn test_owner_by_string_equality() {
        let actor = Actor::user("u-1");
        let mine = record(&json!({"ownerId": "u-1"}));
        let theirs = record(&json!({"ownerId": "u-2"}));

        assert_eq!(
            classify(Some(&actor), Some(&mine), DEFAULT_OWNER_FIELD),
            Classification::Owner
        );
        assert_eq!(
            classify(Some(&actor), Some(&theirs), DEFAULT_OWNER_FIELD),
            Classification::Authenticated
        );
    }

    #[test]
    fn test_no_record_is_authenticated() {
        let actor = Actor::user("u-1");
        assert_eq!(
            classify(Some(&actor), None, DEFAULT_OWNER_FIELD),
            Classification::Authenticated
        );
    }

    #[test]
    fn test_anonymous_account_never_owns() {
        let actor = Actor::anonymous("u-1");
        let rec = record(&json!({"ownerId": "u-1"}));
        assert_eq!(
            classify(Some(&actor), Some(&rec), DEFAULT_OWNER_FIELD),
            Classification::Anonymous
        );
    }

    #[test]
    fn test_custom_owner_field_and_populated_owner() {
        let actor = Actor::user("u-9");
        let rec = record(&json!({"author": {"_id": "u-9", "name": "Nine"}}));
        assert_eq!(
            classify(Some(&actor), Some(&rec), "author"),
            Classification::Owner
        );
        assert_eq!(
            classify(Some(&actor), Some(&rec), DEFAULT_OWNER_FIELD),
            Classification::Authenticated
        );
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Classification::Owner.to_string(), "owner");
        assert_eq!(Classification::Authenticated.to_string(), "authenticated");
    }
}
