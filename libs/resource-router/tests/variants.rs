#![allow(clippy::unwrap_used, clippy::expect_used)]

mod support;

use resource_router::{MemoryDatabase, QueryParams, RouterError};
use serde_json::json;
use support::{FOODS, alice, default_food_router, id_of, rec, seed};

#[tokio::test]
async fn create_through_variant_stamps_discriminator() {
    let db = MemoryDatabase::new();
    let router = default_food_router(&db);

    let created = router
        .create(
            Some(&alice()),
            rec(json!({"__t": "SuperFood", "name": "Acai", "superpower": "antioxidants"})),
        )
        .await
        .unwrap();
    assert_eq!(created["superpower"], json!("antioxidants"));

    let stored = db.dump(FOODS);
    assert_eq!(stored[0]["__t"], json!("SuperFood"));
    assert_eq!(stored[0]["ownerId"], json!("alice"));
}

#[tokio::test]
async fn unknown_variant_is_an_internal_error() {
    let db = MemoryDatabase::new();
    let router = default_food_router(&db);

    let err = router
        .create(Some(&alice()), rec(json!({"__t": "MegaFood", "name": "x"})))
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::UnknownVariant { .. }));
    assert!(err.is_internal());
    assert!(db.dump(FOODS).is_empty());
}

#[tokio::test]
async fn update_without_discriminator_cannot_reach_variant_record() {
    let db = MemoryDatabase::new();
    let router = default_food_router(&db);
    let food = seed(
        &db,
        json!({
            "__t": "SuperFood",
            "name": "Acai",
            "superpower": "antioxidants",
            "ownerId": "alice",
        }),
    )
    .await;

    let err = router
        .update(Some(&alice()), &id_of(&food), rec(json!({"name": "Acai berry"})))
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::NotFound(_)));

    let updated = router
        .update(
            Some(&alice()),
            &id_of(&food),
            rec(json!({"__t": "SuperFood", "superpower": "energy"})),
        )
        .await
        .unwrap();
    assert_eq!(updated["superpower"], json!("energy"));
    assert_eq!(updated["name"], json!("Acai"));
    assert_eq!(db.dump(FOODS)[0]["__t"], json!("SuperFood"));
}

#[tokio::test]
async fn variant_update_cannot_reach_base_record() {
    let db = MemoryDatabase::new();
    let router = default_food_router(&db);
    let food = seed(&db, json!({"name": "Rice", "ownerId": "alice"})).await;

    let err = router
        .update(
            Some(&alice()),
            &id_of(&food),
            rec(json!({"__t": "SuperFood", "superpower": "filling"})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::NotFound(_)));
}

#[tokio::test]
async fn variant_only_field_on_base_record_is_dropped() {
    let db = MemoryDatabase::new();
    let router = default_food_router(&db);
    let food = seed(&db, json!({"name": "Rice", "ownerId": "alice"})).await;

    let updated = router
        .update(
            Some(&alice()),
            &id_of(&food),
            rec(json!({"calories": 130, "superpower": "filling"})),
        )
        .await
        .unwrap();
    assert_eq!(updated["calories"], json!(130));
    assert!(updated.get("superpower").is_none());
    assert!(db.dump(FOODS)[0].get("superpower").is_none());
}

#[tokio::test]
async fn read_and_list_see_every_variant() {
    let db = MemoryDatabase::new();
    let router = default_food_router(&db);
    let acai = seed(
        &db,
        json!({
            "__t": "SuperFood",
            "name": "Acai",
            "superpower": "antioxidants",
            "ownerId": "alice",
        }),
    )
    .await;
    seed(&db, json!({"name": "Rice", "ownerId": "alice"})).await;

    let read = router.read(Some(&alice()), &id_of(&acai)).await.unwrap();
    assert_eq!(read["superpower"], json!("antioxidants"));

    let page = router.list(Some(&alice()), &QueryParams::new()).await.unwrap();
    assert_eq!(page.data.len(), 2);
}

#[tokio::test]
async fn delete_names_the_variant() {
    let db = MemoryDatabase::new();
    let router = default_food_router(&db);
    let food = seed(
        &db,
        json!({
            "__t": "SuperFood",
            "name": "Acai",
            "superpower": "antioxidants",
            "ownerId": "alice",
        }),
    )
    .await;
    let id = id_of(&food);

    let err = router.delete(Some(&alice()), &id, None).await.unwrap_err();
    assert!(matches!(err, RouterError::NotFound(_)));

    router
        .delete(Some(&alice()), &id, Some("SuperFood"))
        .await
        .unwrap();
    let stored = db.dump(FOODS);
    assert_eq!(stored[0]["deleted"], json!(true));
    assert_eq!(stored[0]["superpower"], json!("antioxidants"));

    let err = router.read(Some(&alice()), &id).await.unwrap_err();
    assert!(matches!(err, RouterError::NotFound(_)));
}
