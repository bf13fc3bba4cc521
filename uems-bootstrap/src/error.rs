use uems_shared::config::ConfigError;
use uems_shared::db::migrator::MigrationError;
use uems_shared::db::seed::SeedError;

/// Error type for the bootstrap sequence
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] MigrationError),

    #[error("Seeding failed: {0}")]
    Seed(#[from] SeedError),

    #[error("{var} is too weak for production: {reason}")]
    WeakAdminPassword { var: &'static str, reason: String },

    #[error("Sample accounts are never seeded in production")]
    SamplesInProduction,

    #[error("Layout check found {count} problem(s)")]
    Layout { count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = BootstrapError::WeakAdminPassword {
            var: "UEMS_ADMIN_PASSWORD",
            reason: "Password must contain a digit".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "UEMS_ADMIN_PASSWORD is too weak for production: Password must contain a digit"
        );

        let err: BootstrapError = ConfigError::MissingSecret { name: "JWT_SECRET" }.into();
        assert_eq!(
            err.to_string(),
            "Configuration error: JWT_SECRET is not defined in environment variables"
        );
    }
}
