//! Database helpers for bootstrap integration tests
//!
//! Each test runs against its own schema selected through `search_path`.
//! When `DATABASE_URL` is unset the helpers return `None` and tests skip.

#![allow(dead_code)]

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{ConnectOptions, Connection, PgConnection};
use std::collections::HashMap;
use std::path::Path;
use uems_shared::config::AppConfig;
use uuid::Uuid;

pub struct TestDb {
    pub pool: PgPool,
    pub schema: String,
    base: PgConnectOptions,
}

impl TestDb {
    pub async fn new() -> Option<Self> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping database test");
            return None;
        };

        let base = url
            .parse::<PgConnectOptions>()
            .expect("DATABASE_URL should be a valid Postgres URL")
            .disable_statement_logging();
        let schema = format!("uems_boot_{}", Uuid::new_v4().simple());

        let mut conn = PgConnection::connect_with(&base)
            .await
            .expect("Failed to connect to test database");
        sqlx::query(&format!("CREATE SCHEMA {schema}"))
            .execute(&mut conn)
            .await
            .expect("Failed to create test schema");
        let _ = conn.close().await;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_with(base.clone().options([("search_path", schema.as_str())]))
            .await
            .expect("Failed to create test pool");

        Some(Self { pool, schema, base })
    }

    pub async fn cleanup(self) {
        self.pool.close().await;

        let mut conn = PgConnection::connect_with(&self.base)
            .await
            .expect("Failed to connect for cleanup");
        sqlx::query(&format!("DROP SCHEMA {} CASCADE", self.schema))
            .execute(&mut conn)
            .await
            .expect("Failed to drop test schema");
        let _ = conn.close().await;
    }
}

/// Resolves a configuration for the given environment
pub fn config(environment: &str) -> AppConfig {
    let secret = "bootstrap-test-secret-with-32-chars!!";
    let vars = HashMap::from([("NODE_ENV", environment), ("JWT_SECRET", secret)]);
    AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()), Path::new("/srv/uems"))
        .expect("Test configuration should resolve")
}
