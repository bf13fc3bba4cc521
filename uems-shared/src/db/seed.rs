/// Baseline account seeding
///
/// Seeding is idempotent: an account is only inserted when no user with its
/// username exists. The existence check and the insert run in one
/// transaction that holds an advisory lock, so concurrent bootstraps create
/// each account at most once.
///
/// Plaintext passwords never reach the log. Callers that need to show a
/// generated password do so themselves.
///
/// # Example
///
/// ```no_run
/// use uems_shared::db::seed::{admin_account, ensure_account, SeedOutcome};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), uems_shared::db::seed::SeedError> {
/// match ensure_account(&pool, &admin_account("AdminAdmin@123")).await? {
///     SeedOutcome::Created { .. } => println!("Admin account created"),
///     SeedOutcome::AlreadyExists { .. } => println!("Admin account already exists"),
/// }
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::password::{hash_password, PasswordError};
use crate::error::ServiceError;
use crate::models::user::{CreateUser, User, UserRole};

/// Username of the built-in administrator
pub const ADMIN_USERNAME: &str = "Admin";

/// Email of the built-in administrator
pub const ADMIN_EMAIL: &str = "admin@uems.local";

/// Administrator password used outside production when none is configured
pub const DEFAULT_ADMIN_PASSWORD: &str = "AdminAdmin@123";

/// Advisory lock key held while seeding ("uemsseed")
const SEED_LOCK_KEY: i64 = 0x7565_6d73_7365_6564;

/// Error type for seeding
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Failed to hash password for {username}: {source}")]
    Password {
        username: String,
        #[source]
        source: PasswordError,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl From<sqlx::Error> for SeedError {
    fn from(err: sqlx::Error) -> Self {
        SeedError::Service(ServiceError::from(err))
    }
}

/// An account that should exist after seeding
#[derive(Clone)]
pub struct AccountSeed {
    pub username: String,
    pub email: String,

    /// Plaintext; hashed just before insert
    pub password: String,

    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
}

impl fmt::Debug for AccountSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountSeed")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("role", &self.role)
            .finish()
    }
}

/// What [`ensure_account`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Created { id: Uuid },
    AlreadyExists { id: Uuid },
}

impl SeedOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, SeedOutcome::Created { .. })
    }

    pub fn id(&self) -> Uuid {
        match self {
            SeedOutcome::Created { id } | SeedOutcome::AlreadyExists { id } => *id,
        }
    }
}

/// The built-in administrator account with the given password
pub fn admin_account(password: &str) -> AccountSeed {
    AccountSeed {
        username: ADMIN_USERNAME.to_string(),
        email: ADMIN_EMAIL.to_string(),
        password: password.to_string(),
        first_name: "System".to_string(),
        last_name: "Administrator".to_string(),
        role: UserRole::Admin,
    }
}

/// Demo accounts for non-production environments
pub fn sample_accounts() -> Vec<AccountSeed> {
    vec![
        AccountSeed {
            username: "hrmanager".to_string(),
            email: "hr@uems.com".to_string(),
            password: "HR@123456".to_string(),
            first_name: "HR".to_string(),
            last_name: "Manager".to_string(),
            role: UserRole::HrManager,
        },
        AccountSeed {
            username: "salesuser".to_string(),
            email: "sales@uems.com".to_string(),
            password: "Sales@123456".to_string(),
            first_name: "Sales".to_string(),
            last_name: "User".to_string(),
            role: UserRole::SalesUser,
        },
    ]
}

/// Creates the account unless a user with its username already exists
///
/// # Errors
///
/// `Service(ConstraintViolation)` if the email belongs to another user.
pub async fn ensure_account(pool: &PgPool, seed: &AccountSeed) -> Result<SeedOutcome, SeedError> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(SEED_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    if let Some(existing) = User::find_by_username(&mut *tx, &seed.username).await? {
        debug!(username = %seed.username, "Account already exists");
        tx.rollback().await?;
        return Ok(SeedOutcome::AlreadyExists { id: existing.id });
    }

    let password_hash = hash_password(&seed.password).map_err(|source| SeedError::Password {
        username: seed.username.clone(),
        source,
    })?;

    let user = User::create(
        &mut *tx,
        CreateUser {
            username: seed.username.clone(),
            email: seed.email.clone(),
            password_hash,
            first_name: seed.first_name.clone(),
            last_name: seed.last_name.clone(),
            role: seed.role,
        },
    )
    .await?;

    tx.commit().await?;

    info!(
        user_id = %user.id,
        username = %user.username,
        role = user.role.as_str(),
        "Account created"
    );
    Ok(SeedOutcome::Created { id: user.id })
}
