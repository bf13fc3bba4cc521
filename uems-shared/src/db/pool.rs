/// PostgreSQL connection pool
///
/// One pool is built at startup from [`PoolConfig`] and handed to the
/// migrator, the seed sequencer and every service. Nothing holds a global
/// connection.
///
/// # Example
///
/// ```no_run
/// use sqlx::postgres::PgConnectOptions;
/// use uems_shared::db::pool::{close_pool, create_pool, PoolConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), sqlx::Error> {
///     let pool = create_pool(PoolConfig {
///         connect_options: PgConnectOptions::new()
///             .host("localhost")
///             .username("uems_user")
///             .database("uems_db"),
///         max_connections: 4,
///         ..Default::default()
///     })
///     .await?;
///
///     let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
///         .fetch_one(&pool)
///         .await?;
///     println!("{users} user(s)");
///
///     close_pool(pool).await;
///     Ok(())
/// }
/// ```

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};

/// Pool sizing and connection parameters
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Host, credentials, database and TLS mode
    pub connect_options: PgConnectOptions,

    /// Upper bound on open connections (`DB_POOL_MAX`)
    pub max_connections: u32,

    /// Idle connections kept open (`DB_POOL_MIN`)
    pub min_connections: u32,

    /// How long a caller waits for a free connection (`DB_CONNECTION_TIMEOUT`)
    ///
    /// Running out surfaces as `sqlx::Error::PoolTimedOut`.
    pub acquire_timeout: Duration,

    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,

    /// Ping connections when they are checked out
    pub test_before_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            connect_options: PgConnectOptions::new(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
            test_before_acquire: true,
        }
    }
}

/// Opens the pool and makes sure the server answers
///
/// # Errors
///
/// Any connection or authentication failure, or a failed [`ping`].
pub async fn create_pool(config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    info!(
        host = config.connect_options.get_host(),
        port = config.connect_options.get_port(),
        database = ?config.connect_options.get_database(),
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        acquire_timeout_ms = config.acquire_timeout.as_millis() as u64,
        "Opening database pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .test_before_acquire(config.test_before_acquire)
        .connect_with(config.connect_options)
        .await?;

    ping(&pool).await?;

    info!("Database pool ready");
    Ok(pool)
}

/// Round-trips a trivial query
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    let answer: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;

    if answer != 1 {
        return Err(sqlx::Error::Protocol(format!(
            "ping returned {answer} instead of 1"
        )));
    }

    debug!("Database ping ok");
    Ok(())
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolUsage {
    pub size: u32,
    pub idle: u32,
    pub in_use: u32,
}

pub fn pool_usage(pool: &PgPool) -> PoolUsage {
    let size = pool.size();
    let idle = u32::try_from(pool.num_idle()).unwrap_or(size);

    PoolUsage {
        size,
        idle,
        in_use: size.saturating_sub(idle),
    }
}

/// Waits for checked-out connections to return, then closes the pool
pub async fn close_pool(pool: PgPool) {
    debug!(usage = ?pool_usage(&pool), "Closing database pool");
    pool.close().await;
    info!("Database pool closed");
}
