//! Demo resources: `users` and `foods` over one in-memory database.

use std::sync::Arc;

use resource_router::permission::rules::{OwnerOrAdmin, admin_only, allow_any, authenticated};
use resource_router::{
    FieldKind, FieldMask, FieldMaskSpec, HookContext, Hooks, MemoryDatabase, ModelSchema,
    Permissions, Record, ResourceDefinition, ResourceRouter, RouterDefaults, Rule, SortSpec,
    Transformer, VariantRegistry,
};
use serde_json::Value;

pub const USERS: &str = "users";
pub const FOODS: &str = "foods";

fn names(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| (*f).to_owned()).collect()
}

/// Administrators manage accounts; any authenticated caller may look them up.
///
/// # Errors
/// When `defaults` carry inconsistent limits.
pub fn users(db: &MemoryDatabase, defaults: &RouterDefaults) -> anyhow::Result<ResourceRouter> {
    let schema = ModelSchema::builder("User")
        .required("name", FieldKind::String)
        .field("email", FieldKind::String)
        .field("created", FieldKind::DateTime)
        .field("updated", FieldKind::DateTime)
        .build();

    let definition = ResourceDefinition::builder(VariantRegistry::new(schema))
        .with_defaults(defaults)
        .permissions(
            Permissions::new()
                .list(vec![authenticated()])
                .read(vec![authenticated()])
                .create(vec![admin_only()])
                .update(vec![admin_only()])
                .delete(vec![admin_only()]),
        )
        .query_fields(["name", "email"])
        .sort(SortSpec::new().asc("name"))
        .build()?;
    Ok(ResourceRouter::new(definition, Arc::new(db.store(USERS))))
}

fn food_registry(owner_field: &str) -> VariantRegistry {
    let base = ModelSchema::builder("Food")
        .required("name", FieldKind::String)
        .field("calories", FieldKind::Number)
        .field("created", FieldKind::DateTime)
        .field("updated", FieldKind::DateTime)
        .field("hidden", FieldKind::Boolean)
        .field(owner_field, FieldKind::Reference(USERS.to_owned()))
        .field("tags", FieldKind::ScalarArray)
        .field("categories", FieldKind::DocumentArray)
        .field("source", FieldKind::Object)
        .field("deleted", FieldKind::Boolean)
        .build();
    let superfood = base
        .extend("SuperFood")
        .field("superpower", FieldKind::String)
        .build();
    VariantRegistry::new(base).variant(superfood)
}

fn food_masks(owner_field: &str) -> FieldMaskSpec {
    let content = [
        "name",
        "calories",
        "created",
        "tags",
        "categories",
        "source",
        "superpower",
    ];
    let mut public_read = names(&content);
    public_read.retain(|f| f != "source");
    public_read.push(owner_field.to_owned());

    let mut owner_read = names(&content);
    owner_read.extend([owner_field.to_owned(), "hidden".to_owned(), "updated".to_owned()]);
    let mut owner_write = names(&content);
    owner_write.push("hidden".to_owned());

    let mut admin = owner_read.clone();
    admin.push("deleted".to_owned());

    FieldMaskSpec {
        admin: FieldMask {
            read: admin.clone(),
            write: admin,
        },
        owner: FieldMask {
            read: owner_read,
            write: owner_write,
        },
        authenticated: FieldMask {
            read: public_read,
            write: names(&content),
        },
        anonymous: FieldMask::new(["name", "calories"], Vec::<String>::new()),
    }
}

/// The creating actor becomes the owner.
fn stamp_owner(owner_field: String) -> Hooks {
    Hooks::new().pre_create(move |ctx: HookContext, mut body: Record| {
        let owner_field = owner_field.clone();
        async move {
            if let Some(actor) = &ctx.actor {
                body.insert(owner_field, Value::String(actor.id().to_owned()));
            }
            Ok(Some(body))
        }
    })
}

/// Everyone may browse; authenticated callers create; owners and
/// administrators edit. Deletes are soft.
///
/// # Errors
/// When `defaults` carry inconsistent limits or an empty discriminator key.
pub fn foods(db: &MemoryDatabase, defaults: &RouterDefaults) -> anyhow::Result<ResourceRouter> {
    let owner_field = defaults.owner_field.as_str();
    let owner_rule: Rule = Arc::new(OwnerOrAdmin::with_field(owner_field));

    let definition = ResourceDefinition::builder(food_registry(owner_field))
        .with_defaults(defaults)
        .permissions(
            Permissions::new()
                .list(vec![allow_any()])
                .read(vec![allow_any()])
                .create(vec![authenticated()])
                .update(vec![authenticated(), Arc::clone(&owner_rule)])
                .delete(vec![authenticated(), owner_rule]),
        )
        .query_fields(["name", "calories", "created", "tags", "source"])
        .sort(SortSpec::new().desc("created"))
        .populate([owner_field])
        .transformer(Transformer::Masked(food_masks(owner_field)))
        .hooks(stamp_owner(owner_field.to_owned()))
        .build()?;
    Ok(ResourceRouter::new(definition, Arc::new(db.store(FOODS))))
}
