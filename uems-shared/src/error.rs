/// Common error type for the entity and authentication services
///
/// Database failures are classified when converted: unique and foreign-key
/// violations become [`ServiceError::ConstraintViolation`] (a conflict the
/// caller can act on), everything else stays a [`ServiceError::Database`].
///
/// # Example
///
/// ```
/// use uems_shared::error::ServiceError;
/// use uuid::Uuid;
///
/// let id = Uuid::nil();
/// let err = ServiceError::not_found("Contact", id);
/// assert!(err.is_not_found());
/// assert_eq!(
///     err.to_string(),
///     "Contact with ID \"00000000-0000-0000-0000-000000000000\" not found"
/// );
/// ```

use sqlx::error::ErrorKind;
use std::fmt::Display;

/// Errors returned by the entity services
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The requested row does not exist
    #[error("{entity} with ID \"{id}\" not found")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness or referential constraint rejected the write
    #[error("Constraint {constraint} violated: {message}")]
    ConstraintViolation { constraint: String, message: String },

    /// Any other database failure, including pool acquisition timeouts
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl ServiceError {
    /// Builds a `NotFound` error for the given entity name and identifier
    pub fn not_found(entity: &'static str, id: impl Display) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether this is a `NotFound` error
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound { .. })
    }

    /// Whether this is a `ConstraintViolation` error
    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::ConstraintViolation { .. })
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if matches!(
                db_err.kind(),
                ErrorKind::UniqueViolation | ErrorKind::ForeignKeyViolation
            ) {
                return ServiceError::ConstraintViolation {
                    constraint: db_err.constraint().unwrap_or("unknown").to_string(),
                    message: db_err.message().to_string(),
                };
            }
        }

        ServiceError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = ServiceError::not_found("Organization", "abc");
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
        assert_eq!(err.to_string(), "Organization with ID \"abc\" not found");
    }

    #[test]
    fn test_non_database_errors_stay_database() {
        let err = ServiceError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, ServiceError::Database(sqlx::Error::RowNotFound)));

        let err = ServiceError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, ServiceError::Database(sqlx::Error::PoolTimedOut)));
    }
}
