/// Database migration runner
///
/// Migrations are Rust types implementing [`Migration`], registered in
/// [`crate::db::migrations::all`]. Each has a numeric version (a millisecond
/// timestamp), a name, and `up`/`down` operations.
///
/// # Guarantees
///
/// - Pending migrations are applied in ascending version order.
/// - The whole batch runs in **one** transaction: if any step fails, every
///   earlier step of the batch is rolled back and nothing is recorded.
/// - Applied migrations are recorded in a history table (`migrations` by
///   default) whose `name` column is unique; re-running is a no-op.
/// - A transaction-scoped advisory lock serializes concurrent runners, so two
///   deploys racing each other apply every migration exactly once.
///
/// # Example
///
/// ```no_run
/// use uems_shared::db::migrator::Migrator;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let migrator = Migrator::with_defaults();
///
/// let applied = migrator.run(&pool).await?;
/// for migration in &applied {
///     println!("applied {}", migration.name);
/// }
///
/// let status = migrator.status(&pool).await?;
/// assert!(status.is_up_to_date);
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgConnectOptions, PgPool},
    Connection, PgConnection, Postgres, Transaction,
};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Default history table name
pub const DEFAULT_HISTORY_TABLE: &str = "migrations";

/// Advisory lock key held while migrations run ("uemsmigr")
const MIGRATION_LOCK_KEY: i64 = 0x7565_6d73_6d69_6772;

/// A single reversible schema change
#[async_trait]
pub trait Migration: Send + Sync {
    /// Ordering key, a millisecond timestamp
    fn version(&self) -> i64;

    /// Human-readable name, unique across migrations
    fn name(&self) -> &'static str;

    /// Applies the schema change
    async fn up(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error>;

    /// Reverts the schema change
    async fn down(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error>;
}

/// Error type for migration operations
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// A migration step failed; the batch was rolled back
    #[error("Migration {name} failed: {source}")]
    StepFailed {
        name: String,
        #[source]
        source: sqlx::Error,
    },

    /// Two registered migrations share a version
    #[error("Duplicate migration version {0}")]
    DuplicateVersion(i64),

    /// The history table records a migration this binary does not know
    #[error("Applied migration {name} (version {version}) is not registered")]
    UnknownMigration { version: i64, name: String },

    /// The configured history table name is not a plain identifier
    #[error("Invalid migration history table name: {0:?}")]
    InvalidTableName(String),

    /// Database error outside of a migration step
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A row of the migration history table
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AppliedMigration {
    /// Migration version (timestamp)
    pub version: i64,

    /// Migration name
    pub name: String,

    /// When it was applied
    pub executed_at: DateTime<Utc>,
}

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Number of migrations that have been applied
    pub applied_migrations: usize,

    /// Latest applied migration version
    pub latest_version: Option<i64>,

    /// Registered migrations that have not been applied, in order
    pub pending: Vec<String>,

    /// Whether every registered migration has been applied
    pub is_up_to_date: bool,
}

/// Transactional migration runner
pub struct Migrator {
    migrations: Vec<Box<dyn Migration>>,
    table: String,
}

impl Migrator {
    /// Creates a runner over the given migrations
    ///
    /// Migrations are sorted by version.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::DuplicateVersion` if two migrations share a version.
    pub fn new(mut migrations: Vec<Box<dyn Migration>>) -> Result<Self, MigrationError> {
        migrations.sort_by_key(|m| m.version());

        if let Some(pair) = migrations
            .windows(2)
            .find(|pair| pair[0].version() == pair[1].version())
        {
            return Err(MigrationError::DuplicateVersion(pair[0].version()));
        }

        Ok(Self {
            migrations,
            table: DEFAULT_HISTORY_TABLE.to_string(),
        })
    }

    /// Creates a runner over the registered application migrations
    pub fn with_defaults() -> Self {
        Self {
            migrations: sorted(super::migrations::all()),
            table: DEFAULT_HISTORY_TABLE.to_string(),
        }
    }

    /// Uses a different history table
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::InvalidTableName` unless the name is a
    /// lowercase identifier (`[a-z_][a-z0-9_]*`, at most 63 bytes).
    pub fn with_table(mut self, table: &str) -> Result<Self, MigrationError> {
        if !is_identifier(table) {
            return Err(MigrationError::InvalidTableName(table.to_string()));
        }
        self.table = table.to_string();
        Ok(self)
    }

    /// Names of the registered migrations, in application order
    pub fn names(&self) -> Vec<&'static str> {
        self.migrations.iter().map(|m| m.name()).collect()
    }

    /// Applies every pending migration as a single all-or-nothing batch
    ///
    /// Returns the migrations applied by this call; an empty list means the
    /// schema was already current.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::StepFailed` if a migration fails. The whole
    /// batch is rolled back in that case.
    pub async fn run(&self, pool: &PgPool) -> Result<Vec<AppliedMigration>, MigrationError> {
        info!(table = %self.table, "Starting database migrations");

        let mut tx = pool.begin().await?;

        match self.apply_pending(&mut tx).await {
            Ok(applied) => {
                tx.commit().await?;

                if applied.is_empty() {
                    info!("No pending migrations");
                } else {
                    info!(count = applied.len(), "All database migrations completed successfully");
                }
                Ok(applied)
            }
            Err(e) => {
                warn!("Migration batch failed, rolling back: {}", e);
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn apply_pending(
        &self,
        tx: &mut Transaction<'static, Postgres>,
    ) -> Result<Vec<AppliedMigration>, MigrationError> {
        lock(tx).await?;
        self.ensure_history_table(tx).await?;

        let applied = self.load_applied(tx).await?;
        let applied_versions: HashSet<i64> = applied.iter().map(|m| m.version).collect();

        for record in &applied {
            if !self.migrations.iter().any(|m| m.version() == record.version) {
                warn!(
                    version = record.version,
                    name = %record.name,
                    "Applied migration is not registered in this build"
                );
            }
        }

        let mut newly_applied = Vec::new();

        for migration in self
            .migrations
            .iter()
            .filter(|m| !applied_versions.contains(&m.version()))
        {
            info!(version = migration.version(), name = migration.name(), "Applying migration");

            migration
                .up(&mut **tx)
                .await
                .map_err(|source| MigrationError::StepFailed {
                    name: migration.name().to_string(),
                    source,
                })?;

            let record = sqlx::query_as::<_, AppliedMigration>(&format!(
                r#"
                INSERT INTO {} (timestamp, name)
                VALUES ($1, $2)
                RETURNING timestamp AS version, name, executed_at
                "#,
                self.table
            ))
            .bind(migration.version())
            .bind(migration.name())
            .fetch_one(&mut **tx)
            .await?;

            newly_applied.push(record);
        }

        Ok(newly_applied)
    }

    /// Reverts the most recently applied migration
    ///
    /// Returns the reverted migration, or `None` when nothing is applied.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::UnknownMigration` if the last recorded
    /// migration is not registered, or `StepFailed` if its `down` fails.
    pub async fn revert_last(
        &self,
        pool: &PgPool,
    ) -> Result<Option<AppliedMigration>, MigrationError> {
        let mut tx = pool.begin().await?;
        lock(&mut tx).await?;
        self.ensure_history_table(&mut tx).await?;

        let Some(last) = self.load_applied(&mut tx).await?.pop() else {
            info!("No applied migrations to revert");
            return Ok(None);
        };

        let migration = self
            .migrations
            .iter()
            .find(|m| m.version() == last.version)
            .ok_or_else(|| MigrationError::UnknownMigration {
                version: last.version,
                name: last.name.clone(),
            })?;

        info!(version = last.version, name = %last.name, "Reverting migration");

        migration
            .down(&mut *tx)
            .await
            .map_err(|source| MigrationError::StepFailed {
                name: migration.name().to_string(),
                source,
            })?;

        sqlx::query(&format!("DELETE FROM {} WHERE timestamp = $1", self.table))
            .bind(last.version)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(name = %last.name, "Migration reverted");
        Ok(Some(last))
    }

    /// Gets the current migration status
    ///
    /// Does not create the history table; a missing table means nothing has
    /// been applied yet.
    pub async fn status(&self, pool: &PgPool) -> Result<MigrationStatus, MigrationError> {
        debug!("Checking migration status");

        let table_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1)",
        )
        .bind(&self.table)
        .fetch_one(pool)
        .await?;

        let applied = if table_exists {
            self.load_applied(&mut *pool.acquire().await?).await?
        } else {
            debug!("Migrations table does not exist yet");
            Vec::new()
        };

        let applied_versions: HashSet<i64> = applied.iter().map(|m| m.version).collect();
        let pending: Vec<String> = self
            .migrations
            .iter()
            .filter(|m| !applied_versions.contains(&m.version()))
            .map(|m| m.name().to_string())
            .collect();

        debug!(
            applied_migrations = applied.len(),
            pending = pending.len(),
            "Migration status retrieved"
        );

        Ok(MigrationStatus {
            applied_migrations: applied.len(),
            latest_version: applied.iter().map(|m| m.version).max(),
            is_up_to_date: pending.is_empty(),
            pending,
        })
    }

    async fn ensure_history_table(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id SERIAL PRIMARY KEY,
                timestamp BIGINT NOT NULL,
                name VARCHAR(255) NOT NULL UNIQUE,
                executed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.table
        ))
        .execute(conn)
        .await?;

        Ok(())
    }

    async fn load_applied(
        &self,
        conn: &mut PgConnection,
    ) -> Result<Vec<AppliedMigration>, sqlx::Error> {
        sqlx::query_as::<_, AppliedMigration>(&format!(
            "SELECT timestamp AS version, name, executed_at FROM {} ORDER BY timestamp, id",
            self.table
        ))
        .fetch_all(conn)
        .await
    }
}

/// Creates the target database if it does not exist
///
/// Connects to the `postgres` maintenance database with the same
/// credentials and issues `CREATE DATABASE` when needed.
///
/// # Example
///
/// ```no_run
/// use sqlx::postgres::PgConnectOptions;
/// use uems_shared::db::migrator::ensure_database_exists;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let options = PgConnectOptions::new().host("localhost").database("uems_db");
/// ensure_database_exists(&options).await?;
/// # Ok(())
/// # }
/// ```
pub async fn ensure_database_exists(options: &PgConnectOptions) -> Result<(), sqlx::Error> {
    let Some(database) = options.get_database().map(str::to_string) else {
        debug!("No database name configured, nothing to create");
        return Ok(());
    };

    info!(database = %database, "Checking if database exists");

    let mut conn = PgConnection::connect_with(&options.clone().database("postgres")).await?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(&database)
            .fetch_one(&mut conn)
            .await?;

    if !exists {
        info!(database = %database, "Database does not exist, creating it");
        sqlx::query(&format!("CREATE DATABASE {}", quote_identifier(&database)))
            .execute(&mut conn)
            .await?;
        info!("Database created successfully");
    } else {
        debug!("Database already exists");
    }

    conn.close().await?;
    Ok(())
}

/// Drops the target database if it exists
///
/// **WARNING**: This permanently deletes all data. Use with caution!
pub async fn drop_database(options: &PgConnectOptions) -> Result<(), sqlx::Error> {
    let Some(database) = options.get_database().map(str::to_string) else {
        return Ok(());
    };

    warn!(database = %database, "Dropping database");

    let mut conn = PgConnection::connect_with(&options.clone().database("postgres")).await?;
    sqlx::query(&format!("DROP DATABASE IF EXISTS {}", quote_identifier(&database)))
        .execute(&mut conn)
        .await?;
    conn.close().await?;

    info!("Database dropped successfully");
    Ok(())
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

async fn lock(conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    debug!("Acquiring migration lock");
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(conn)
        .await?;
    Ok(())
}

fn sorted(mut migrations: Vec<Box<dyn Migration>>) -> Vec<Box<dyn Migration>> {
    migrations.sort_by_key(|m| m.version());
    migrations
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_');

    starts_ok
        && name.len() <= 63
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop(i64, &'static str);

    #[async_trait]
    impl Migration for Noop {
        fn version(&self) -> i64 {
            self.0
        }

        fn name(&self) -> &'static str {
            self.1
        }

        async fn up(&self, _conn: &mut PgConnection) -> Result<(), sqlx::Error> {
            Ok(())
        }

        async fn down(&self, _conn: &mut PgConnection) -> Result<(), sqlx::Error> {
            Ok(())
        }
    }

    #[test]
    fn test_migrations_sorted_by_version() {
        let migrator = Migrator::new(vec![
            Box::new(Noop(3, "third")),
            Box::new(Noop(1, "first")),
            Box::new(Noop(2, "second")),
        ])
        .unwrap();

        assert_eq!(migrator.names(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_duplicate_versions_rejected() {
        let result = Migrator::new(vec![Box::new(Noop(7, "a")), Box::new(Noop(7, "b"))]);
        assert!(matches!(result, Err(MigrationError::DuplicateVersion(7))));
    }

    #[test]
    fn test_default_registry_is_ordered() {
        let migrator = Migrator::with_defaults();
        assert_eq!(
            migrator.names(),
            vec!["create_crm_schema", "add_username_to_users"]
        );
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("uems_db"), "\"uems_db\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_table_name_validation() {
        assert!(Migrator::with_defaults().with_table("schema_history").is_ok());
        assert!(Migrator::with_defaults().with_table("_hist2").is_ok());

        for bad in ["", "2fast", "Migrations", "mig-rations", "users; DROP TABLE users"] {
            assert!(
                matches!(
                    Migrator::with_defaults().with_table(bad),
                    Err(MigrationError::InvalidTableName(_))
                ),
                "{bad:?} should be rejected"
            );
        }
        assert!(Migrator::with_defaults().with_table(&"a".repeat(64)).is_err());
    }
}
