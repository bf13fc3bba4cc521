/// Authenticated-user extractor
///
/// [`CurrentUser`] reads `Authorization: Bearer <token>`, validates the JWT
/// against the configured secret and exposes the token's claims. It works
/// with any state from which [`JwtSettings`] can be obtained via `FromRef`.
///
/// # Example
///
/// ```no_run
/// use axum::{extract::State, Json};
/// use uems_api::{app::AppState, error::ApiResult, extract::CurrentUser};
/// use uems_shared::models::user::UserRole;
/// use uems_shared::services::ContactRecord;
///
/// async fn list_contacts(
///     user: CurrentUser,
///     State(state): State<AppState>,
/// ) -> ApiResult<Json<Vec<ContactRecord>>> {
///     user.require_role(&[UserRole::Admin, UserRole::SalesUser])?;
///     Ok(Json(state.services.contacts.find_all().await?))
/// }
/// ```

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use uems_shared::auth::jwt::{validate_token, Claims, JwtError};
use uems_shared::config::JwtSettings;
use uems_shared::models::user::UserRole;
use uuid::Uuid;

use crate::error::ApiError;

/// The caller identified by a valid bearer token
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub claims: Claims,
}

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.claims.sub
    }

    pub fn username(&self) -> &str {
        &self.claims.username
    }

    pub fn role(&self) -> UserRole {
        self.claims.role
    }

    /// Fails with 403 unless the caller holds one of `allowed`
    pub fn require_role(&self, allowed: &[UserRole]) -> Result<(), ApiError> {
        if allowed.contains(&self.claims.role) {
            Ok(())
        } else {
            tracing::debug!(
                user_id = %self.claims.sub,
                role = self.claims.role.as_str(),
                "Role not permitted"
            );
            Err(ApiError::Forbidden("Insufficient permissions".to_string()))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    JwtSettings: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| ApiError::Unauthorized("Missing credentials".to_string()))?
            .to_str()
            .map_err(|_| ApiError::BadRequest("Invalid Authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::BadRequest("Expected Bearer token".to_string()))?;

        let settings = JwtSettings::from_ref(state);
        let claims = validate_token(token, &settings.secret).map_err(|e| match e {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            _ => ApiError::Unauthorized("Invalid token".to_string()),
        })?;

        Ok(CurrentUser { claims })
    }
}
