/// Database layer for UEMS
///
/// This module provides connection pooling, the migration runner, the
/// registered migrations, and the seed sequencer used at bootstrap.
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool management with health checks
/// - `migrator`: Transactional, all-or-nothing migration runner
/// - `migrations`: The ordered set of schema migrations
/// - `seed`: Baseline account seeding
///
/// # Example
///
/// ```no_run
/// use uems_shared::config::AppConfig;
/// use uems_shared::db::{migrator::Migrator, pool::create_pool};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = AppConfig::from_env()?;
///     let pool = create_pool(config.database.pool_config()).await?;
///
///     let applied = Migrator::with_defaults().run(&pool).await?;
///     println!("Applied {} migration(s)", applied.len());
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod migrator;
pub mod pool;
pub mod seed;
