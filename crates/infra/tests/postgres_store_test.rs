//! Runs against a live Postgres when `DATABASE_URL` is set; otherwise every
//! test returns early.
//!
//! Tests share one database, so each one tags its rows with a fresh suffix.

use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::OnceCell;

use cardioportal_auth::{AccessKind, ContentPermissions};
use cardioportal_core::{DomainError, UserId};
use cardioportal_infra::PostgresPortalStore;
use cardioportal_portal::{DeviceScope, PortalService, PortalStore, StoreError, User};

static SCHEMA: OnceCell<()> = OnceCell::const_new();

async fn connect() -> Option<(PostgresPortalStore, PgPool)> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };

    SCHEMA
        .get_or_init(|| async {
            let pool = PgPool::connect(&url).await.expect("failed to connect to DATABASE_URL");
            PostgresPortalStore::new(pool.clone())
                .ensure_schema()
                .await
                .expect("failed to create portal schema");
            pool.close().await;
        })
        .await;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("failed to connect to DATABASE_URL");
    Some((PostgresPortalStore::new(pool.clone()), pool))
}

fn suffix() -> String {
    uuid::Uuid::now_v7().simple().to_string()
}

fn user(email: &str, first_name: &str, kind: AccessKind, access_id: Option<&str>) -> User {
    let now = Utc::now();
    User {
        id: UserId::new(),
        email: email.to_string(),
        first_name: first_name.to_string(),
        last_name: String::new(),
        access_kind: kind,
        access_id: access_id.map(str::to_string),
        group_id: None,
        company_id: None,
        device_id: None,
        permissions: ContentPermissions::default(),
        active: true,
        password_hash: String::new(),
        created_at: now,
        updated_at: now,
    }
}

async fn insert_device(pool: &PgPool, serial: &str, company: &str, group: &str, next: Option<NaiveDate>) {
    sqlx::query(
        "INSERT INTO portal_devices (id, serial_number, company_name, group_name, next_review_date) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(uuid::Uuid::now_v7())
    .bind(serial)
    .bind(company)
    .bind(group)
    .bind(next)
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn company_scope_matches_by_name_with_undated_devices_last() {
    let Some((store, pool)) = connect().await else { return };
    let tag = suffix();
    let group_code = format!("G-{tag}");
    let group_name = format!("Grupo {tag}");
    let company_code = format!("C-{tag}");
    let company_name = format!("Empresa {tag}");

    sqlx::query("INSERT INTO portal_groups (id, code, name) VALUES ($1, $2, $3)")
        .bind(uuid::Uuid::now_v7())
        .bind(&group_code)
        .bind(&group_name)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO portal_companies (id, code, name, group_code) VALUES ($1, $2, $3, $4)")
        .bind(uuid::Uuid::now_v7())
        .bind(&company_code)
        .bind(&company_name)
        .bind(&group_code)
        .execute(&pool)
        .await
        .unwrap();

    let serial = |n: &str| format!("{n}-{tag}");
    insert_device(&pool, &serial("C"), &company_name, &group_name, None).await;
    insert_device(&pool, &serial("B"), &company_name, &group_name, NaiveDate::from_ymd_opt(2025, 1, 1)).await;
    insert_device(&pool, &serial("A"), &company_name, &group_name, NaiveDate::from_ymd_opt(2024, 1, 1)).await;
    insert_device(&pool, &serial("X"), "Otra", &group_name, NaiveDate::from_ymd_opt(2023, 1, 1)).await;

    let service = PortalService::new(store);
    let principal = user(
        &format!("empresa-{tag}@x.test"),
        "Iago",
        AccessKind::Company,
        Some(&company_code),
    )
    .principal();
    let devices = service.list_devices_for_principal(&principal).await.unwrap();
    let serials: Vec<String> = devices.into_iter().map(|d| d.serial_number).collect();
    assert_eq!(serials, vec![serial("A"), serial("B"), serial("C")]);

    let by_group = service
        .store()
        .list_devices(&DeviceScope::Group(group_name.clone()))
        .await
        .unwrap();
    assert_eq!(by_group.len(), 4);
    assert_eq!(by_group[0].serial_number, serial("X"));
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let Some((store, _pool)) = connect().await else { return };
    let email = format!("dup-{}@x.test", suffix());

    store.insert_user(&user(&email, "Ana", AccessKind::Admin, None)).await.unwrap();
    let err = store
        .insert_user(&user(&email, "Otra", AccessKind::Admin, None))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)), "got {err:?}");
}

#[tokio::test]
async fn search_is_case_insensitive_escapes_wildcards_and_caps_rows() {
    let Some((store, _pool)) = connect().await else { return };
    let tag = suffix();

    for n in 0..5 {
        let email = format!("search{n}-{tag}@x.test");
        store.insert_user(&user(&email, "Marta", AccessKind::Admin, None)).await.unwrap();
    }
    let literal = format!("50%_off-{tag}@x.test");
    store.insert_user(&user(&literal, "Promo", AccessKind::Admin, None)).await.unwrap();

    let found = store.search_users(&tag.to_uppercase(), 3).await.unwrap();
    assert_eq!(found.len(), 3);
    assert!(found.windows(2).all(|w| w[0].email <= w[1].email));

    let found = store.search_users(&format!("50%_off-{tag}"), 50).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].email, literal);

    let found = store.search_users(&format!("%-{tag}"), 50).await.unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn missing_rows_are_reported() {
    let Some((store, _pool)) = connect().await else { return };
    let ghost = user(&format!("ghost-{}@x.test", suffix()), "Nadie", AccessKind::Admin, None);

    let err = store.update_user(&ghost).await.unwrap_err();
    assert_eq!(err, StoreError::NotFound("user".into()));
    assert!(!store.delete_user(ghost.id).await.unwrap());
    assert!(store.find_user(ghost.id).await.unwrap().is_none());
}

#[tokio::test]
async fn stored_unknown_kind_surfaces_as_invalid_access_kind() {
    let Some((store, pool)) = connect().await else { return };
    let tag = suffix();
    let email = format!("legacy-{tag}@x.test");
    let id = uuid::Uuid::now_v7();

    sqlx::query(
        "INSERT INTO portal_users (id, email, first_name, access_type, access_id, password_hash) \
         VALUES ($1, $2, 'Legacy', 'SUPERVISOR', 'ABANCA', '')",
    )
    .bind(id)
    .bind(&email)
    .execute(&pool)
    .await
    .unwrap();
    let ok = format!("ok-{tag}@x.test");
    store.insert_user(&user(&ok, "Ok", AccessKind::Admin, None)).await.unwrap();

    let err = store.find_user(UserId::from_uuid(id)).await.unwrap_err();
    assert_eq!(err, StoreError::UnknownAccessKind("SUPERVISOR".into()));

    let service = PortalService::new(store);
    let err = service.authenticate(&email, "whatever-pass").await.unwrap_err();
    assert_eq!(
        err,
        cardioportal_portal::ServiceError::Domain(DomainError::InvalidAccessKind("SUPERVISOR".into()))
    );

    let listed = service.store().search_users(&tag, 50).await.unwrap();
    let emails: Vec<&str> = listed.iter().map(|u| u.email.as_str()).collect();
    assert_eq!(emails, vec![ok.as_str()]);
}
