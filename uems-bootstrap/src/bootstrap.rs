/// Bootstrap sequence
///
/// Ties configuration, the pool, the migration runner and the seed sequencer
/// together. Every step is idempotent, so `init` can run on every deploy:
///
/// ```text
/// AppConfig ─> PgPool ─> Migrator::run ─> ensure_account(admin)
/// ```
///
/// # Example
///
/// ```no_run
/// use uems_bootstrap::bootstrap::Bootstrap;
/// use uems_bootstrap::credentials::admin_password_from_env;
/// use uems_shared::config::AppConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AppConfig::from_env()?;
/// let password = admin_password_from_env(config.environment)?;
///
/// let bootstrap = Bootstrap::connect(config, false).await?;
/// let report = bootstrap.init(&password).await?;
/// println!("Applied {} migration(s)", report.applied.len());
/// bootstrap.close().await;
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uems_shared::config::{AppConfig, FileLayout};
use uems_shared::db::migrator::{
    ensure_database_exists, AppliedMigration, MigrationStatus, Migrator,
};
use uems_shared::db::pool::{close_pool, create_pool};
use uems_shared::db::seed::{
    admin_account, ensure_account, sample_accounts, AccountSeed, SeedOutcome,
};

use crate::credentials::AdminPassword;
use crate::error::BootstrapError;

/// What `init` did
#[derive(Debug)]
pub struct InitReport {
    /// Migrations applied by this run, oldest first
    pub applied: Vec<AppliedMigration>,

    /// The administrator account
    pub admin: SeedOutcome,
}

/// A connected bootstrap sequence
pub struct Bootstrap {
    config: AppConfig,
    pool: PgPool,
    migrator: Migrator,
}

impl Bootstrap {
    /// Wraps an existing pool with the registered migrations
    pub fn new(config: AppConfig, pool: PgPool) -> Self {
        Self {
            config,
            pool,
            migrator: Migrator::with_defaults(),
        }
    }

    /// Connects to the configured database
    ///
    /// With `create_database`, the database itself is created first when
    /// missing.
    pub async fn connect(config: AppConfig, create_database: bool) -> Result<Self, BootstrapError> {
        if create_database {
            ensure_database_exists(&config.database.connect_options())
                .await
                .map_err(BootstrapError::Connect)?;
        }

        let pool = create_pool(config.database.pool_config())
            .await
            .map_err(BootstrapError::Connect)?;

        Ok(Self::new(config, pool))
    }

    /// Replaces the migration set
    pub fn with_migrator(mut self, migrator: Migrator) -> Self {
        self.migrator = migrator;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies pending migrations
    pub async fn migrate(&self) -> Result<Vec<AppliedMigration>, BootstrapError> {
        let applied = self.migrator.run(&self.pool).await?;

        if applied.is_empty() {
            info!("Database schema is up to date");
        } else {
            info!(count = applied.len(), "Database schema migrated");
        }

        Ok(applied)
    }

    /// Reverts the most recently applied migration
    pub async fn revert(&self) -> Result<Option<AppliedMigration>, BootstrapError> {
        let reverted = self.migrator.revert_last(&self.pool).await?;

        if reverted.is_none() {
            info!("No applied migrations to revert");
        }

        Ok(reverted)
    }

    /// Reports applied and pending migrations without changing anything
    pub async fn status(&self) -> Result<MigrationStatus, BootstrapError> {
        Ok(self.migrator.status(&self.pool).await?)
    }

    /// Creates the administrator account unless it already exists
    pub async fn ensure_admin(&self, password: &AdminPassword) -> Result<SeedOutcome, BootstrapError> {
        let outcome = ensure_account(&self.pool, &admin_account(password.value())).await?;
        Ok(outcome)
    }

    /// Creates the demo accounts
    ///
    /// # Errors
    ///
    /// `SamplesInProduction` in production, before touching the database.
    pub async fn seed_samples(&self) -> Result<Vec<(AccountSeed, SeedOutcome)>, BootstrapError> {
        if self.config.environment.is_production() {
            return Err(BootstrapError::SamplesInProduction);
        }

        let mut seeded = Vec::new();
        for seed in sample_accounts() {
            let outcome = ensure_account(&self.pool, &seed).await?;
            seeded.push((seed, outcome));
        }

        Ok(seeded)
    }

    /// Migrates the schema, then ensures the administrator account
    pub async fn init(&self, password: &AdminPassword) -> Result<InitReport, BootstrapError> {
        let applied = self.migrate().await?;
        let admin = self.ensure_admin(password).await?;

        info!(
            environment = %self.config.environment,
            migrations = applied.len(),
            admin_created = admin.is_created(),
            "Bootstrap complete"
        );

        Ok(InitReport { applied, admin })
    }

    /// Closes the pool
    pub async fn close(self) {
        close_pool(self.pool).await;
    }
}

/// Result of checking the definition layout on disk
#[derive(Debug, Default)]
pub struct LayoutReport {
    pub entities: Vec<PathBuf>,
    pub migrations: Vec<PathBuf>,
    pub issues: Vec<String>,
}

impl LayoutReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Scans the entity and migration locations and compares the migration
/// files with the registered migrations
///
/// Files are expected to be named `m<version>_<name>.rs`.
pub fn verify_layout(layout: &FileLayout, registered: &[&str]) -> LayoutReport {
    let mut report = LayoutReport::default();

    if !layout.root.is_dir() {
        report
            .issues
            .push(format!("{} does not exist", layout.root.display()));
        return report;
    }

    report.entities = layout.entities.find_files();
    report.migrations = layout.migrations.find_files();

    if report.entities.is_empty() {
        report
            .issues
            .push(format!("No entity definitions match {}", layout.entities));
    }
    if report.migrations.is_empty() {
        report
            .issues
            .push(format!("No migrations match {}", layout.migrations));
    }

    let found: Vec<&str> = report
        .migrations
        .iter()
        .filter_map(|path| migration_name(path))
        .collect();

    for name in registered {
        if !found.contains(name) {
            report
                .issues
                .push(format!("Registered migration {name} has no file"));
        }
    }
    for name in &found {
        if !registered.contains(name) {
            warn!(name = %name, "Migration file is not registered");
            report
                .issues
                .push(format!("Migration file for {name} is not registered"));
        }
    }

    report
}

fn migration_name(path: &Path) -> Option<&str> {
    let stem = path.file_stem()?.to_str()?;
    let (version, name) = stem.strip_prefix('m')?.split_once('_')?;
    version.chars().all(|c| c.is_ascii_digit()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use uems_shared::config::Environment;

    fn write(dir: &Path, names: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        for name in names {
            fs::write(dir.join(name), "").unwrap();
        }
    }

    #[test]
    fn test_migration_name() {
        assert_eq!(
            migration_name(Path::new("src/db/migrations/m1735200000000_create_crm_schema.rs")),
            Some("create_crm_schema")
        );
        assert_eq!(migration_name(Path::new("mod.rs")), None);
        assert_eq!(migration_name(Path::new("misc_notes.rs")), None);
    }

    #[test]
    fn test_verify_layout_ok() {
        let cwd = tempfile::tempdir().unwrap();
        let layout = FileLayout::resolve(Environment::Development, cwd.path());
        write(&layout.entities.dir, &["mod.rs", "user.rs", "contact.rs"]);
        write(
            &layout.migrations.dir,
            &[
                "mod.rs",
                "m1735200000000_create_crm_schema.rs",
                "m1735201200000_add_username_to_users.rs",
            ],
        );

        let report = verify_layout(&layout, &["create_crm_schema", "add_username_to_users"]);

        assert!(report.is_ok(), "unexpected issues: {:?}", report.issues);
        assert_eq!(report.entities.len(), 2);
        assert_eq!(report.migrations.len(), 2);
    }

    #[test]
    fn test_verify_layout_missing_root() {
        let cwd = tempfile::tempdir().unwrap();
        let layout = FileLayout::resolve(Environment::Production, cwd.path());

        let report = verify_layout(&layout, &["create_crm_schema"]);

        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].contains("dist"));
    }

    #[test]
    fn test_verify_layout_mismatch() {
        let cwd = tempfile::tempdir().unwrap();
        let layout = FileLayout::resolve(Environment::Development, cwd.path());
        write(&layout.entities.dir, &["user.rs"]);
        write(
            &layout.migrations.dir,
            &["m1735200000000_create_crm_schema.rs", "m1799999999999_stray.rs"],
        );

        let report = verify_layout(&layout, &["create_crm_schema", "add_username_to_users"]);

        assert_eq!(
            report.issues,
            vec![
                "Registered migration add_username_to_users has no file".to_string(),
                "Migration file for stray is not registered".to_string(),
            ]
        );
    }
}
