/// Application state and service factory
///
/// Everything a handler needs is built once from an [`AppConfig`] and shared
/// through Axum's `State` extractor. Cloning the state is cheap: the pool and
/// the services are handles, the configuration sits behind an `Arc`.
///
/// # Example
///
/// ```no_run
/// use uems_api::app::AppState;
/// use uems_shared::config::AppConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AppConfig::from_env()?;
/// let state = AppState::connect(config).await?;
///
/// let contacts = state.services.contacts.find_all().await?;
/// # Ok(())
/// # }
/// ```

use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uems_shared::config::{AppConfig, JwtSettings};
use uems_shared::db::pool::create_pool;
use uems_shared::services::{ActivitiesService, AuthService, ContactsService, OrganizationsService};

/// Every service the handlers use, sharing one pool
#[derive(Debug, Clone)]
pub struct Services {
    pub auth: AuthService,
    pub contacts: ContactsService,
    pub organizations: OrganizationsService,
    pub activities: ActivitiesService,
}

impl Services {
    /// Builds the services on top of an existing pool
    pub fn new(pool: PgPool, jwt: JwtSettings) -> Self {
        Self {
            auth: AuthService::new(pool.clone(), jwt),
            contacts: ContactsService::new(pool.clone()),
            organizations: OrganizationsService::new(pool.clone()),
            activities: ActivitiesService::new(pool),
        }
    }
}

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<AppConfig>,

    pub services: Services,
}

impl AppState {
    /// Wires state around an existing pool
    pub fn new(db: PgPool, config: AppConfig) -> Self {
        let services = Services::new(db.clone(), config.jwt.clone());

        Self {
            db,
            config: Arc::new(config),
            services,
        }
    }

    /// Connects to the configured database and wires every service
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable.
    pub async fn connect(config: AppConfig) -> Result<Self, sqlx::Error> {
        let pool = create_pool(config.database.pool_config()).await?;

        info!(environment = %config.environment, "Application state ready");
        Ok(Self::new(pool, config))
    }
}

impl FromRef<AppState> for JwtSettings {
    fn from_ref(state: &AppState) -> Self {
        state.config.jwt.clone()
    }
}
