/// Authentication service
///
/// Implements the two login strategies the request layer relies on:
///
/// - **Local**: [`AuthService::validate_user`] checks a username-or-email
///   plus password against the stored Argon2id hash.
/// - **Bearer**: [`AuthService::verify_token`] validates a JWT and confirms
///   the account it names still exists and is active.
///
/// Registration always creates a plain `user`; elevated roles are only ever
/// granted by seeding.
///
/// # Example
///
/// ```no_run
/// use uems_shared::config::AppConfig;
/// use uems_shared::services::auth::{AuthService, LoginInput};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
/// let auth = AuthService::new(pool, config.jwt.clone());
///
/// let session = auth
///     .login(LoginInput {
///         username: "Admin".to_string(),
///         password: "AdminAdmin@123".to_string(),
///     })
///     .await?;
///
/// let user = auth.verify_token(&session.access_token).await?;
/// assert_eq!(user.username, "Admin");
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auth::jwt::{create_token, validate_token, Claims, JwtError};
use crate::auth::password::{hash_password, verify_password, PasswordError};
use crate::config::JwtSettings;
use crate::error::ServiceError;
use crate::models::user::{CreateUser, User, UserRole};

/// Error type for authentication flows
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown identifier or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The account exists but has been deactivated
    #[error("Account is disabled")]
    AccountDisabled,

    /// The token's subject no longer exists
    #[error("User {0} no longer exists")]
    UnknownUser(Uuid),

    #[error(transparent)]
    Token(#[from] JwtError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Service(ServiceError::from(err))
    }
}

/// Credentials for the local strategy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginInput {
    /// Username or email address
    #[validate(length(min = 1, message = "username must not be empty"))]
    pub username: String,

    #[validate(length(min = 6))]
    pub password: String,
}

/// Self-service registration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 3, max = 100))]
    pub username: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 6))]
    pub password: String,

    #[validate(length(min = 1, message = "first_name must not be empty"))]
    pub first_name: String,

    #[validate(length(min = 1, message = "last_name must not be empty"))]
    pub last_name: String,

    /// Accepted for compatibility; only `"user"` passes validation
    #[validate(custom(function = "self_service_role"))]
    pub role: Option<String>,
}

fn self_service_role(role: &str) -> Result<(), ValidationError> {
    if role == UserRole::User.as_str() {
        Ok(())
    } else {
        let mut error = ValidationError::new("role");
        error.message = Some("role must be user".into());
        Err(error)
    }
}

/// Issued on successful login or registration
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub access_token: String,

    /// Always `"Bearer"`
    pub token_type: &'static str,

    /// Token lifetime in seconds
    pub expires_in: i64,

    pub user: User,
}

#[derive(Debug, Clone)]
pub struct AuthService {
    pool: PgPool,
    jwt: JwtSettings,
}

impl AuthService {
    pub fn new(pool: PgPool, jwt: JwtSettings) -> Self {
        Self { pool, jwt }
    }

    /// Local strategy: resolves a username or email and checks the password
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` for an unknown identifier or a wrong password,
    /// `AccountDisabled` when the password is right but the account is
    /// inactive.
    pub async fn validate_user(&self, identifier: &str, password: &str) -> Result<User, AuthError> {
        let Some(user) = User::find_by_login(&self.pool, identifier).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &user.password)? {
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            warn!(user_id = %user.id, "Login attempt on disabled account");
            return Err(AuthError::AccountDisabled);
        }

        Ok(user)
    }

    /// Logs a user in and issues an access token
    pub async fn login(&self, input: LoginInput) -> Result<AuthResponse, AuthError> {
        let user = self.validate_user(&input.username, &input.password).await?;

        info!(user_id = %user.id, username = %user.username, "User logged in");
        self.issue(user)
    }

    /// Registers a new `user` account and issues an access token
    ///
    /// The requested role is ignored; registration never grants more than
    /// `user`.
    ///
    /// # Errors
    ///
    /// `Service(ConstraintViolation)` if the username or email is taken.
    pub async fn register(&self, input: RegisterInput) -> Result<AuthResponse, AuthError> {
        let password_hash = hash_password(&input.password)?;

        let user = User::create(
            &self.pool,
            CreateUser {
                username: input.username,
                email: input.email,
                password_hash,
                first_name: input.first_name,
                last_name: input.last_name,
                role: UserRole::User,
            },
        )
        .await?;

        info!(user_id = %user.id, username = %user.username, "User registered");
        self.issue(user)
    }

    /// Bearer strategy: validates a token and loads the active account
    pub async fn verify_token(&self, token: &str) -> Result<User, AuthError> {
        let claims = validate_token(token, &self.jwt.secret)?;

        let user = User::find_by_id(&self.pool, claims.sub)
            .await?
            .ok_or(AuthError::UnknownUser(claims.sub))?;

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        Ok(user)
    }

    fn issue(&self, user: User) -> Result<AuthResponse, AuthError> {
        let claims = Claims::for_user(&user, &self.jwt);
        let access_token = create_token(&claims, &self.jwt.secret)?;

        Ok(AuthResponse {
            access_token,
            token_type: "Bearer",
            expires_in: claims.exp - claims.iat,
            user,
        })
    }
}
