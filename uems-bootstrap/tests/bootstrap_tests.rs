/// Integration tests for the bootstrap sequence
///
/// These tests require a running PostgreSQL database (see `common`).
/// Run with: cargo test -p uems-bootstrap --test bootstrap_tests

mod common;

use common::{config, TestDb};
use std::collections::HashMap;
use uems_bootstrap::credentials::resolve_admin_password;
use uems_bootstrap::{Bootstrap, BootstrapError};
use uems_shared::auth::password::verify_password;
use uems_shared::config::Environment;
use uems_shared::db::seed::{ADMIN_USERNAME, DEFAULT_ADMIN_PASSWORD};
use uems_shared::models::user::{User, UserRole};

#[tokio::test]
async fn test_init_migrates_and_creates_admin() {
    let Some(db) = TestDb::new().await else { return };
    let bootstrap = Bootstrap::new(config("development"), db.pool.clone());
    let password = resolve_admin_password(Environment::Development, |_| None).unwrap();

    let report = bootstrap.init(&password).await.unwrap();

    assert_eq!(report.applied.len(), 2);
    assert!(report.admin.is_created());

    let admin = User::find_by_username(&db.pool, ADMIN_USERNAME)
        .await
        .unwrap()
        .expect("Admin should exist");
    assert_eq!(admin.id, report.admin.id());
    assert_eq!(admin.role, UserRole::Admin);
    assert!(admin.is_active);
    assert!(verify_password(DEFAULT_ADMIN_PASSWORD, &admin.password).unwrap());

    db.cleanup().await;
}

#[tokio::test]
async fn test_init_is_idempotent() {
    let Some(db) = TestDb::new().await else { return };
    let bootstrap = Bootstrap::new(config("test"), db.pool.clone());
    let password = resolve_admin_password(Environment::Test, |_| None).unwrap();

    let first = bootstrap.init(&password).await.unwrap();
    let second = bootstrap.init(&password).await.unwrap();

    assert!(second.applied.is_empty());
    assert!(!second.admin.is_created());
    assert_eq!(second.admin.id(), first.admin.id());

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(users, 1);

    db.cleanup().await;
}

#[tokio::test]
async fn test_existing_admin_keeps_its_password() {
    let Some(db) = TestDb::new().await else { return };
    let bootstrap = Bootstrap::new(config("development"), db.pool.clone());

    let original = resolve_admin_password(Environment::Development, |_| None).unwrap();
    bootstrap.init(&original).await.unwrap();

    let vars = HashMap::from([("UEMS_ADMIN_PASSWORD", "Another@Secret99")]);
    let changed =
        resolve_admin_password(Environment::Development, |k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
    let outcome = bootstrap.ensure_admin(&changed).await.unwrap();
    assert!(!outcome.is_created());

    let admin = User::find_by_username(&db.pool, ADMIN_USERNAME)
        .await
        .unwrap()
        .unwrap();
    assert!(verify_password(DEFAULT_ADMIN_PASSWORD, &admin.password).unwrap());
    assert!(!verify_password("Another@Secret99", &admin.password).unwrap());

    db.cleanup().await;
}

#[tokio::test]
async fn test_seed_samples() {
    let Some(db) = TestDb::new().await else { return };
    let bootstrap = Bootstrap::new(config("development"), db.pool.clone());
    bootstrap.migrate().await.unwrap();

    let seeded = bootstrap.seed_samples().await.unwrap();
    let usernames: Vec<&str> = seeded.iter().map(|(s, _)| s.username.as_str()).collect();
    assert_eq!(usernames, vec!["hrmanager", "salesuser"]);
    assert!(seeded.iter().all(|(_, outcome)| outcome.is_created()));

    let again = bootstrap.seed_samples().await.unwrap();
    assert!(again.iter().all(|(_, outcome)| !outcome.is_created()));

    let hr = User::find_by_username(&db.pool, "hrmanager")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hr.role, UserRole::HrManager);

    db.cleanup().await;
}

#[tokio::test]
async fn test_seed_samples_refused_in_production() {
    let Some(db) = TestDb::new().await else { return };
    let bootstrap = Bootstrap::new(config("production"), db.pool.clone());
    assert!(bootstrap.config().environment.is_production());

    let err = bootstrap.seed_samples().await.unwrap_err();
    assert!(matches!(err, BootstrapError::SamplesInProduction));

    // nothing was touched, not even the schema
    let status = bootstrap.status().await.unwrap();
    assert_eq!(status.applied_migrations, 0);

    db.cleanup().await;
}

#[tokio::test]
async fn test_revert_and_status() {
    let Some(db) = TestDb::new().await else { return };
    let bootstrap = Bootstrap::new(config("development"), db.pool.clone());

    let before = bootstrap.status().await.unwrap();
    assert_eq!(before.pending, vec!["create_crm_schema", "add_username_to_users"]);

    bootstrap.migrate().await.unwrap();
    let reverted = bootstrap.revert().await.unwrap().expect("Something to revert");
    assert_eq!(reverted.name, "add_username_to_users");

    let after = bootstrap.status().await.unwrap();
    assert_eq!(after.applied_migrations, 1);
    assert_eq!(after.pending, vec!["add_username_to_users"]);
    assert!(!after.is_up_to_date);

    db.cleanup().await;
}
