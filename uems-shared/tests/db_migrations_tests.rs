/// Integration tests for the migration runner
///
/// These tests require a running PostgreSQL database (see `common`).
/// Run with: cargo test -p uems-shared --test db_migrations_tests

mod common;

use async_trait::async_trait;
use common::TestDb;
use sqlx::PgConnection;
use uems_shared::db::migrations::{AddUsernameToUsers, CreateCrmSchema};
use uems_shared::db::migrator::{Migration, MigrationError, Migrator};

/// A migration that creates a table and then fails
struct Broken;

#[async_trait]
impl Migration for Broken {
    fn version(&self) -> i64 {
        1_735_300_000_000
    }

    fn name(&self) -> &'static str {
        "broken"
    }

    async fn up(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE half_done (id INT)")
            .execute(&mut *conn)
            .await?;
        sqlx::query("SELECT * FROM table_that_does_not_exist")
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn down(&self, _conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

#[tokio::test]
async fn test_run_applies_all_in_order() {
    let Some(db) = TestDb::new().await else { return };

    let applied = Migrator::with_defaults().run(&db.pool).await.unwrap();
    let names: Vec<&str> = applied.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["create_crm_schema", "add_username_to_users"]);

    for table in ["users", "organizations", "contacts", "activities", "migrations"] {
        assert!(db.table_exists(table).await, "{table} should exist");
    }
    assert!(db.column_exists("users", "username").await);

    let history: Vec<(i64, String)> =
        sqlx::query_as("SELECT timestamp, name FROM migrations ORDER BY timestamp")
            .fetch_all(&db.pool)
            .await
            .unwrap();
    assert_eq!(
        history,
        vec![
            (1_735_200_000_000, "create_crm_schema".to_string()),
            (1_735_201_200_000, "add_username_to_users".to_string()),
        ]
    );

    db.cleanup().await;
}

#[tokio::test]
async fn test_second_run_is_noop() {
    let Some(db) = TestDb::new().await else { return };
    let migrator = Migrator::with_defaults();

    assert_eq!(migrator.run(&db.pool).await.unwrap().len(), 2);
    assert!(migrator.run(&db.pool).await.unwrap().is_empty());

    let status = migrator.status(&db.pool).await.unwrap();
    assert_eq!(status.applied_migrations, 2);
    assert_eq!(status.latest_version, Some(1_735_201_200_000));
    assert!(status.pending.is_empty());
    assert!(status.is_up_to_date);

    db.cleanup().await;
}

#[tokio::test]
async fn test_status_before_any_run() {
    let Some(db) = TestDb::new().await else { return };

    let status = Migrator::with_defaults().status(&db.pool).await.unwrap();
    assert_eq!(status.applied_migrations, 0);
    assert_eq!(status.latest_version, None);
    assert_eq!(status.pending, vec!["create_crm_schema", "add_username_to_users"]);
    assert!(!status.is_up_to_date);

    // status must not create the history table
    assert!(!db.table_exists("migrations").await);

    db.cleanup().await;
}

#[tokio::test]
async fn test_failing_batch_rolls_back_everything() {
    let Some(db) = TestDb::new().await else { return };

    let migrator = Migrator::new(vec![
        Box::new(CreateCrmSchema),
        Box::new(AddUsernameToUsers),
        Box::new(Broken),
    ])
    .unwrap();

    let err = migrator.run(&db.pool).await.unwrap_err();
    match err {
        MigrationError::StepFailed { name, .. } => assert_eq!(name, "broken"),
        other => panic!("expected StepFailed, got {other:?}"),
    }

    for table in ["users", "organizations", "contacts", "activities", "half_done", "migrations"] {
        assert!(!db.table_exists(table).await, "{table} should have been rolled back");
    }

    db.cleanup().await;
}

#[tokio::test]
async fn test_failure_after_partial_history_keeps_earlier_batches() {
    let Some(db) = TestDb::new().await else { return };

    Migrator::new(vec![Box::new(CreateCrmSchema)])
        .unwrap()
        .run(&db.pool)
        .await
        .unwrap();

    let migrator = Migrator::new(vec![
        Box::new(CreateCrmSchema),
        Box::new(AddUsernameToUsers),
        Box::new(Broken),
    ])
    .unwrap();
    assert!(migrator.run(&db.pool).await.is_err());

    // The earlier batch is untouched, the failed batch left nothing behind
    assert!(db.table_exists("users").await);
    assert!(!db.column_exists("users", "username").await);

    let status = migrator.status(&db.pool).await.unwrap();
    assert_eq!(status.applied_migrations, 1);
    assert_eq!(status.pending, vec!["add_username_to_users", "broken"]);

    db.cleanup().await;
}

#[tokio::test]
async fn test_revert_last() {
    let Some(db) = TestDb::new().await else { return };
    let migrator = Migrator::with_defaults();
    migrator.run(&db.pool).await.unwrap();

    let reverted = migrator.revert_last(&db.pool).await.unwrap().unwrap();
    assert_eq!(reverted.name, "add_username_to_users");
    assert!(!db.column_exists("users", "username").await);

    let status = migrator.status(&db.pool).await.unwrap();
    assert_eq!(status.pending, vec!["add_username_to_users"]);

    let reverted = migrator.revert_last(&db.pool).await.unwrap().unwrap();
    assert_eq!(reverted.name, "create_crm_schema");
    assert!(!db.table_exists("users").await);

    assert!(migrator.revert_last(&db.pool).await.unwrap().is_none());

    // Everything re-applies cleanly after a full revert
    assert_eq!(migrator.run(&db.pool).await.unwrap().len(), 2);

    db.cleanup().await;
}

#[tokio::test]
async fn test_revert_unknown_migration_fails() {
    let Some(db) = TestDb::new().await else { return };
    Migrator::with_defaults().run(&db.pool).await.unwrap();

    let older = Migrator::new(vec![Box::new(CreateCrmSchema)]).unwrap();
    let err = older.revert_last(&db.pool).await.unwrap_err();
    assert!(matches!(
        err,
        MigrationError::UnknownMigration { version: 1_735_201_200_000, .. }
    ));

    // Nothing was reverted
    assert!(db.column_exists("users", "username").await);

    db.cleanup().await;
}

#[tokio::test]
async fn test_username_backfill() {
    let Some(db) = TestDb::new().await else { return };

    Migrator::new(vec![Box::new(CreateCrmSchema)])
        .unwrap()
        .run(&db.pool)
        .await
        .unwrap();

    for (email, created_at) in [
        ("john@alpha.test", "2024-01-02T00:00:00Z"),
        ("john@beta.test", "2024-01-01T00:00:00Z"),
        ("mary@alpha.test", "2024-01-03T00:00:00Z"),
        ("john@gamma.test", "2024-01-04T00:00:00Z"),
    ] {
        sqlx::query(
            "INSERT INTO users (email, password, first_name, last_name, created_at) \
             VALUES ($1, 'x', 'F', 'L', $2::timestamptz)",
        )
        .bind(email)
        .bind(created_at)
        .execute(&db.pool)
        .await
        .unwrap();
    }

    let applied = Migrator::with_defaults().run(&db.pool).await.unwrap();
    assert_eq!(applied.len(), 1);

    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT email, username FROM users ORDER BY email")
            .fetch_all(&db.pool)
            .await
            .unwrap();
    assert_eq!(
        rows,
        vec![
            ("john@alpha.test".to_string(), "user_john_2".to_string()),
            ("john@beta.test".to_string(), "user_john".to_string()),
            ("john@gamma.test".to_string(), "user_john_3".to_string()),
            ("mary@alpha.test".to_string(), "user_mary".to_string()),
        ]
    );

    // username is now required and unique
    let missing = sqlx::query(
        "INSERT INTO users (email, password, first_name, last_name) \
         VALUES ('new@alpha.test', 'x', 'F', 'L')",
    )
    .execute(&db.pool)
    .await;
    assert!(missing.is_err());

    let duplicate = sqlx::query(
        "INSERT INTO users (username, email, password, first_name, last_name) \
         VALUES ('user_mary', 'other@alpha.test', 'x', 'F', 'L')",
    )
    .execute(&db.pool)
    .await;
    assert!(duplicate.is_err());

    db.cleanup().await;
}

#[tokio::test]
async fn test_custom_history_table() {
    let Some(db) = TestDb::new().await else { return };

    let migrator = Migrator::with_defaults().with_table("schema_history").unwrap();
    migrator.run(&db.pool).await.unwrap();

    assert!(db.table_exists("schema_history").await);
    assert!(!db.table_exists("migrations").await);
    assert!(migrator.status(&db.pool).await.unwrap().is_up_to_date);

    db.cleanup().await;
}

#[tokio::test]
async fn test_concurrent_runs_apply_once() {
    let Some(db) = TestDb::new().await else { return };

    let first = Migrator::with_defaults();
    let second = Migrator::with_defaults();
    let (a, b) = tokio::join!(first.run(&db.pool), second.run(&db.pool));

    let total = a.unwrap().len() + b.unwrap().len();
    assert_eq!(total, 2);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM migrations")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(count, 2);

    db.cleanup().await;
}

#[tokio::test]
async fn test_username_backfill_avoids_literal_suffix_names() {
    let Some(db) = TestDb::new().await else { return };

    Migrator::new(vec![Box::new(CreateCrmSchema)])
        .unwrap()
        .run(&db.pool)
        .await
        .unwrap();

    let long_local = "z".repeat(120);
    let long_email = format!("{long_local}@delta.test");
    for (email, created_at) in [
        ("a@x.test", "2024-01-01T00:00:00Z"),
        ("a@y.test", "2024-01-02T00:00:00Z"),
        ("a_2@z.test", "2024-01-03T00:00:00Z"),
        (long_email.as_str(), "2024-01-04T00:00:00Z"),
    ] {
        sqlx::query(
            "INSERT INTO users (email, password, first_name, last_name, created_at) \
             VALUES ($1, 'x', 'F', 'L', $2::timestamptz)",
        )
        .bind(email)
        .bind(created_at)
        .execute(&db.pool)
        .await
        .unwrap();
    }

    Migrator::with_defaults().run(&db.pool).await.unwrap();

    let usernames: Vec<String> =
        sqlx::query_scalar("SELECT username FROM users ORDER BY created_at")
            .fetch_all(&db.pool)
            .await
            .unwrap();
    assert_eq!(usernames[..3], ["user_a", "user_a_2", "user_a_2_2"]);
    assert_eq!(usernames[3].chars().count(), 100);
    assert!(usernames[3].starts_with("user_zzz"));

    db.cleanup().await;
}

#[tokio::test]
async fn test_ensure_and_drop_database() {
    use sqlx::postgres::PgConnectOptions;
    use sqlx::{ConnectOptions, Connection};
    use uems_shared::db::migrator::{drop_database, ensure_database_exists};

    let Ok(url) = std::env::var("DATABASE_URL") else {
        return;
    };
    let base: PgConnectOptions = url.parse().unwrap();
    let name = format!("uems_db_{}", uuid::Uuid::new_v4().simple());
    let options = base.clone().database(&name).disable_statement_logging();

    ensure_database_exists(&options).await.unwrap();
    // second call finds it and does nothing
    ensure_database_exists(&options).await.unwrap();

    let mut conn = PgConnection::connect_with(&options).await.unwrap();
    let current: String = sqlx::query_scalar("SELECT current_database()")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(current, name);
    conn.close().await.unwrap();

    drop_database(&options).await.unwrap();

    let mut admin = PgConnection::connect_with(&base).await.unwrap();
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(&name)
            .fetch_one(&mut admin)
            .await
            .unwrap();
    assert!(!exists);
}
