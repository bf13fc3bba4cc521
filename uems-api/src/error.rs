/// Error handling for the request layer
///
/// Handlers return `Result<T, ApiError>`. Service errors convert with `?`
/// and map to HTTP status codes:
///
/// | Source                                   | Status |
/// |------------------------------------------|--------|
/// | `ServiceError::NotFound`                 | 404    |
/// | `ServiceError::ConstraintViolation`      | 409    |
/// | validation (`Vec<FieldError>`)           | 422    |
/// | `AuthError` (credentials, token)         | 401    |
/// | role check                               | 403    |
/// | database, hashing, anything unexpected   | 500    |
///
/// # Example
///
/// ```no_run
/// use axum::{extract::{Path, State}, Json};
/// use uems_api::{app::AppState, error::ApiResult};
/// use uems_shared::services::ContactRecord;
/// use uuid::Uuid;
///
/// async fn get_contact(
///     State(state): State<AppState>,
///     Path(id): Path<Uuid>,
/// ) -> ApiResult<Json<ContactRecord>> {
///     Ok(Json(state.services.contacts.find_one(id).await?))
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uems_shared::error::ServiceError;
use uems_shared::services::auth::AuthError;
use uems_shared::validation::FieldError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict (409) - e.g., duplicate username or email
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    #[error("Validation failed: {} errors", .0.len())]
    ValidationError(Vec<FieldError>),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "not_found", "conflict")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Field errors, for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldErrorDetail>>,
}

/// Serialized form of a rejected field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldErrorDetail {
    pub field: String,
    pub message: String,
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_code, message, details) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg, None),
            ApiError::Unauthorized(msg) => ("unauthorized", msg, None),
            ApiError::Forbidden(msg) => ("forbidden", msg, None),
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::Conflict(msg) => ("conflict", msg, None),
            ApiError::ValidationError(errors) => (
                "validation_error",
                "Request validation failed".to_string(),
                Some(
                    errors
                        .into_iter()
                        .map(|e| FieldErrorDetail {
                            field: e.field,
                            message: e.message,
                        })
                        .collect(),
                ),
            ),
            ApiError::InternalError(msg) => {
                // Logged here, never sent to the client
                tracing::error!("Internal error: {}", msg);
                (
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            ServiceError::ConstraintViolation { ref constraint, .. } => {
                if constraint.contains("username") {
                    ApiError::Conflict("Username already exists".to_string())
                } else if constraint.contains("email") {
                    ApiError::Conflict("Email already exists".to_string())
                } else {
                    ApiError::Conflict(err.to_string())
                }
            }
            ServiceError::Database(e) => ApiError::InternalError(format!("Database error: {}", e)),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::Unauthorized("Invalid credentials".to_string()),
            AuthError::AccountDisabled => ApiError::Unauthorized("Account is disabled".to_string()),
            AuthError::UnknownUser(_) => ApiError::Unauthorized("Invalid token".to_string()),
            AuthError::Token(e) => ApiError::Unauthorized(e.to_string()),
            AuthError::Service(e) => ApiError::from(e),
            AuthError::Password(e) => {
                ApiError::InternalError(format!("Password operation failed: {}", e))
            }
        }
    }
}

impl From<Vec<FieldError>> for ApiError {
    fn from(errors: Vec<FieldError>) -> Self {
        ApiError::ValidationError(errors)
    }
}
