//! Postgres store integration tests
//!
//! Require a running Postgres reachable through `DATABASE_URL`; run with
//! `cargo test -p wildcam-sync --test postgres_store_tests -- --ignored`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;
use wildcam_common::types::{AuthConfig, NewPullSource};
use wildcam_sync::error::StoreError;
use wildcam_sync::store::{PgPullSourceStore, PullSourceStore};

fn new_source(name: &str, owner: &str) -> NewPullSource {
    NewPullSource {
        name: name.to_string(),
        owner_user_id: owner.to_string(),
        target_location_id: Uuid::new_v4(),
        base_url: format!("https://{}.example.org/", name),
        auth_config: AuthConfig::Basic {
            username: "ranger".to_string(),
            password: "s3cret".to_string(),
        },
        is_active: true,
    }
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_create_and_get_roundtrips_auth(pool: PgPool) {
    let store = PgPullSourceStore::new(pool);

    let created = store.create(new_source("ridge", "u1")).await.unwrap();
    let loaded = store.get_by_id(created.id).await.unwrap();

    assert_eq!(loaded.name, "ridge");
    assert_eq!(loaded.auth_config, created.auth_config);
    assert!(loaded.cursor.is_none());
    assert!(loaded.is_active);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_duplicate_name_maps_to_store_error(pool: PgPool) {
    let store = PgPullSourceStore::new(pool);

    store.create(new_source("ridge", "u1")).await.unwrap();
    let err = store.create(new_source("ridge", "u2")).await.unwrap_err();

    assert!(matches!(err, StoreError::DuplicateName(name) if name == "ridge"));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_cursor_never_regresses(pool: PgPool) {
    let store = PgPullSourceStore::new(pool);
    let source = store.create(new_source("ridge", "u1")).await.unwrap();

    assert!(store.update_cursor(source.id, "b.jpg", Utc::now()).await.unwrap());
    assert!(!store.update_cursor(source.id, "a.jpg", Utc::now()).await.unwrap());
    assert!(!store.update_cursor(source.id, "b.jpg", Utc::now()).await.unwrap());
    // Byte order, not locale order.
    assert!(!store.update_cursor(source.id, "B.jpg", Utc::now()).await.unwrap());
    assert!(store.update_cursor(source.id, "c.jpg", Utc::now()).await.unwrap());

    let loaded = store.get_by_id(source.id).await.unwrap();
    assert_eq!(loaded.cursor.as_deref(), Some("c.jpg"));
    assert!(loaded.last_sync_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_active_listing_and_toggle(pool: PgPool) {
    let store = PgPullSourceStore::new(pool);
    let a = store.create(new_source("alpha", "u1")).await.unwrap();
    let b = store.create(new_source("bravo", "u1")).await.unwrap();
    store.create(new_source("charlie", "u2")).await.unwrap();

    store.update_active_status(b.id, false).await.unwrap();

    let active: Vec<String> = store
        .get_all_active()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(active, vec!["alpha", "charlie"]);

    let owned = store.list_active_for_owner("u1").await.unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, a.id);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_missing_rows_are_not_found(pool: PgPool) {
    let store = PgPullSourceStore::new(pool);
    let id = Uuid::new_v4();

    assert!(matches!(store.get_by_id(id).await, Err(StoreError::NotFound(_))));
    assert!(matches!(
        store.update_cursor(id, "a.jpg", Utc::now()).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(store.delete(id).await, Err(StoreError::NotFound(_))));
    assert!(matches!(
        store.update_active_status(id, false).await,
        Err(StoreError::NotFound(_))
    ));
}
