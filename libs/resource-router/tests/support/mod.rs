//! Shared fixtures: a `foods` resource with a `SuperFood` variant over an
//! in-memory database.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use resource_router::permission::rules::{allow_any, authenticated, owner_or_admin_rule};
use resource_router::{
    Actor, FieldKind, FieldMask, FieldMaskSpec, HookContext, Hooks, MemoryDatabase, ModelSchema,
    Permissions, Record, ResourceDefinition, ResourceRouter, ResourceStore, SortSpec, Transformer,
    VariantRegistry,
};
use serde_json::{Value, json};

pub const FOODS: &str = "foods";
pub const USERS: &str = "users";

pub fn rec(v: Value) -> Record {
    match v {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn food_schema() -> ModelSchema {
    ModelSchema::builder("Food")
        .required("name", FieldKind::String)
        .field("calories", FieldKind::Number)
        .field("created", FieldKind::DateTime)
        .field("hidden", FieldKind::Boolean)
        .field("ownerId", FieldKind::Reference(USERS.to_owned()))
        .field("tags", FieldKind::ScalarArray)
        .field("categories", FieldKind::DocumentArray)
        .field("source", FieldKind::Object)
        .field("deleted", FieldKind::Boolean)
        .build()
}

pub fn registry() -> VariantRegistry {
    let base = food_schema();
    let superfood = base
        .extend("SuperFood")
        .field("superpower", FieldKind::String)
        .build();
    VariantRegistry::new(base).variant(superfood)
}

pub fn user_schema() -> ModelSchema {
    ModelSchema::builder("User")
        .required("name", FieldKind::String)
        .build()
}

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_owned()).collect()
}

pub fn masks() -> FieldMaskSpec {
    let everything = fields(&[
        "name", "calories", "created", "hidden", "ownerId", "tags", "categories", "source",
        "deleted", "superpower",
    ]);
    FieldMaskSpec {
        admin: FieldMask {
            read: everything.clone(),
            write: everything,
        },
        owner: FieldMask {
            read: fields(&[
                "name", "calories", "created", "hidden", "ownerId", "tags", "categories",
                "source", "superpower",
            ]),
            write: fields(&[
                "name", "calories", "created", "hidden", "tags", "categories", "source",
                "superpower",
            ]),
        },
        authenticated: FieldMask {
            read: fields(&[
                "name", "calories", "created", "ownerId", "tags", "categories", "superpower",
            ]),
            write: fields(&[
                "name", "calories", "created", "tags", "categories", "source", "superpower",
            ]),
        },
        anonymous: FieldMask {
            read: fields(&["name"]),
            write: Vec::new(),
        },
    }
}

pub fn permissions() -> Permissions {
    Permissions::new()
        .list(vec![allow_any()])
        .read(vec![allow_any()])
        .create(vec![authenticated()])
        .update(vec![authenticated(), owner_or_admin_rule()])
        .delete(vec![authenticated(), owner_or_admin_rule()])
}

/// Stamps the creating actor as owner.
pub fn stamp_owner() -> Hooks {
    Hooks::new().pre_create(|ctx: HookContext, mut body: Record| async move {
        if let Some(actor) = &ctx.actor {
            body.insert("ownerId".to_owned(), json!(actor.id()));
        }
        Ok(Some(body))
    })
}

pub fn food_definition(hooks: Hooks) -> ResourceDefinition {
    ResourceDefinition::builder(registry())
        .permissions(permissions())
        .query_fields(["name", "calories", "created", "hidden", "tags", "source", "deleted"])
        .sort(SortSpec::new().desc("created"))
        .transformer(Transformer::Masked(masks()))
        .hooks(hooks)
        .build()
        .unwrap()
}

pub fn food_router(db: &MemoryDatabase, hooks: Hooks) -> ResourceRouter {
    ResourceRouter::new(food_definition(hooks), Arc::new(db.store(FOODS)))
}

pub fn default_food_router(db: &MemoryDatabase) -> ResourceRouter {
    food_router(db, stamp_owner())
}

/// Insert directly into the store, bypassing permissions, masks and hooks.
pub async fn seed(db: &MemoryDatabase, doc: Value) -> Record {
    let mut doc = rec(doc);
    let registry = registry();
    let model = registry.resolve(Some(&doc)).unwrap();
    doc.remove(registry.key());
    db.store(FOODS).insert(&model, doc).await.unwrap()
}

pub async fn seed_user(db: &MemoryDatabase, id: &str, name: &str) -> Record {
    db.store(USERS)
        .insert(&VariantRegistry::new(user_schema()).base(), rec(json!({"_id": id, "name": name})))
        .await
        .unwrap()
}

pub fn alice() -> Actor {
    Actor::user("alice")
}

pub fn bob() -> Actor {
    Actor::user("bob")
}

pub fn root() -> Actor {
    Actor::admin("root")
}

pub fn id_of(record: &Record) -> String {
    record
        .get("id")
        .or_else(|| record.get("_id"))
        .and_then(Value::as_str)
        .expect("record has an id")
        .to_owned()
}
