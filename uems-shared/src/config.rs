/// Configuration resolution
///
/// This module turns environment variables into a type-safe [`AppConfig`].
/// Resolution is a pure function of a variable lookup and a working
/// directory, so it can fail before any database connection is attempted.
///
/// # Environment Variables
///
/// - `NODE_ENV`: `development` (default), `test` or `production`
/// - `POSTGRES_HOST`: Database host (default: localhost)
/// - `POSTGRES_PORT`: Database port (default: 5432)
/// - `POSTGRES_USER`: Database user (default: uems_user)
/// - `POSTGRES_PASSWORD`: Database password (optional)
/// - `POSTGRES_DB`: Database name (default: uems_db)
/// - `DB_POOL_MAX`: Maximum pool size (default: 10)
/// - `DB_POOL_MIN`: Minimum idle connections (default: 2)
/// - `DB_CONNECTION_TIMEOUT`: Connection acquire timeout in milliseconds (default: 30000)
/// - `JWT_SECRET`: Token signing key (required, at least 32 characters in production)
/// - `JWT_EXPIRATION`: Access token lifetime, e.g. `900`, `15m`, `12h` (default: 15m)
///
/// # Example
///
/// ```no_run
/// use uems_shared::config::AppConfig;
///
/// # fn example() -> Result<(), uems_shared::config::ConfigError> {
/// let config = AppConfig::from_env()?;
/// println!("Entities: {}", config.layout.entities);
/// # Ok(())
/// # }
/// ```

use chrono::Duration;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

use crate::db::pool::PoolConfig;

/// Name of the token signing key variable
pub const JWT_SECRET_VAR: &str = "JWT_SECRET";

/// Minimum signing key length enforced in production
pub const PRODUCTION_SECRET_MIN_LEN: usize = 32;

const DEFAULT_JWT_EXPIRATION: &str = "15m";

/// Error type for configuration resolution
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required secret is absent or empty
    #[error("{name} is not defined in environment variables")]
    MissingSecret { name: &'static str },

    /// A secret is too short for the current environment
    #[error("{name} must be at least {min_len} characters in production")]
    WeakSecret { name: &'static str, min_len: usize },

    /// A variable is present but cannot be used
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// The working directory could not be determined
    #[error("Failed to resolve working directory: {0}")]
    WorkingDirectory(#[from] std::io::Error),
}

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    /// Gets the environment as it appears in `NODE_ENV`
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }

    /// Parses the environment from a `NODE_ENV` value
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "development" => Some(Environment::Development),
            "test" => Some(Environment::Test),
            "production" => Some(Environment::Production),
            _ => None,
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-directory file pattern of the form `<dir>/<prefix>*.<extension>`
///
/// Module index files (`mod.rs`) never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePattern {
    /// Directory the pattern is anchored at
    pub dir: PathBuf,

    /// Required file name prefix (may be empty)
    pub prefix: &'static str,

    /// Required file extension, without the dot
    pub extension: &'static str,
}

impl FilePattern {
    /// Checks whether a path matches this pattern
    pub fn matches(&self, path: &Path) -> bool {
        if path.parent() != Some(self.dir.as_path()) {
            return false;
        }

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        file_name != "mod.rs"
            && file_name.starts_with(self.prefix)
            && path.extension().and_then(|e| e.to_str()) == Some(self.extension)
    }

    /// Lists the files matching this pattern, sorted by file name
    ///
    /// A missing directory yields an empty list.
    pub fn find_files(&self) -> Vec<PathBuf> {
        if !self.dir.is_dir() {
            return Vec::new();
        }

        WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file() && self.matches(entry.path()))
            .map(walkdir::DirEntry::into_path)
            .collect()
    }
}

impl fmt::Display for FilePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}*.{}",
            self.dir.display(),
            self.prefix,
            self.extension
        )
    }
}

/// Environment-dependent locations of entity and migration definitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLayout {
    /// `<cwd>/src` in development, `<cwd>/dist` otherwise
    pub root: PathBuf,

    /// Entity (model) definitions
    pub entities: FilePattern,

    /// Migration definitions
    pub migrations: FilePattern,
}

impl FileLayout {
    /// Resolves the layout for an environment and working directory
    ///
    /// # Example
    ///
    /// ```
    /// use std::path::Path;
    /// use uems_shared::config::{Environment, FileLayout};
    ///
    /// let layout = FileLayout::resolve(Environment::Development, Path::new("/app"));
    /// assert_eq!(layout.entities.to_string(), "/app/src/models/*.rs");
    /// assert_eq!(layout.migrations.to_string(), "/app/src/db/migrations/m*.rs");
    /// ```
    pub fn resolve(environment: Environment, cwd: &Path) -> Self {
        let root = if environment.is_development() {
            cwd.join("src")
        } else {
            cwd.join("dist")
        };

        Self {
            entities: FilePattern {
                dir: root.join("models"),
                prefix: "",
                extension: "rs",
            },
            migrations: FilePattern {
                dir: root.join("db").join("migrations"),
                prefix: "m",
                extension: "rs",
            },
            root,
        }
    }
}

/// Database connection parameters
#[derive(Clone)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub database: String,

    /// Maximum number of pooled connections
    pub pool_max: u32,

    /// Minimum number of idle connections
    pub pool_min: u32,

    /// How long to wait when acquiring a connection
    pub connection_timeout: std::time::Duration,

    /// Whether TLS is required (production only)
    pub require_tls: bool,
}

impl DatabaseSettings {
    /// Builds sqlx connection options from these settings
    pub fn connect_options(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_tls {
            PgSslMode::Require
        } else {
            PgSslMode::Disable
        };

        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .database(&self.database)
            .ssl_mode(ssl_mode);

        match &self.password {
            Some(password) => options.password(password),
            None => options,
        }
    }

    /// Builds the pool configuration for these settings
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            connect_options: self.connect_options(),
            max_connections: self.pool_max,
            min_connections: self.pool_min,
            acquire_timeout: self.connection_timeout,
            ..Default::default()
        }
    }
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("database", &self.database)
            .field("pool_max", &self.pool_max)
            .field("pool_min", &self.pool_min)
            .field("connection_timeout", &self.connection_timeout)
            .field("require_tls", &self.require_tls)
            .finish()
    }
}

/// Token signing configuration
#[derive(Clone)]
pub struct JwtSettings {
    /// HS256 signing key
    pub secret: String,

    /// Access token lifetime
    pub expires_in: Duration,
}

impl fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub layout: FileLayout,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
}

impl AppConfig {
    /// Loads configuration from the process environment
    ///
    /// A `.env` file in the working directory is loaded first if present.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let cwd = std::env::current_dir()?;
        Self::from_lookup(|name| std::env::var(name).ok(), &cwd)
    }

    /// Resolves configuration from an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `NODE_ENV` is not a known environment
    /// - `JWT_SECRET` is unset or empty
    /// - `JWT_SECRET` is shorter than 32 characters in production
    /// - a numeric variable cannot be parsed or the pool bounds are inconsistent
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use std::path::Path;
    /// use uems_shared::config::AppConfig;
    ///
    /// let vars = HashMap::from([("JWT_SECRET", "dev-secret")]);
    /// let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()), Path::new("/app"))
    ///     .unwrap();
    /// assert_eq!(config.database.pool_max, 10);
    /// ```
    pub fn from_lookup<F>(lookup: F, cwd: &Path) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("NODE_ENV") {
            Some(value) => Environment::parse(&value).ok_or_else(|| ConfigError::InvalidValue {
                name: "NODE_ENV",
                value,
                reason: "expected development, test or production".to_string(),
            })?,
            None => Environment::Development,
        };

        let jwt = resolve_jwt(&lookup, environment)?;
        let database = resolve_database(&lookup, environment)?;
        let layout = FileLayout::resolve(environment, cwd);

        tracing::debug!(
            environment = %environment,
            entities = %layout.entities,
            migrations = %layout.migrations,
            "Resolved configuration"
        );

        Ok(Self {
            environment,
            layout,
            database,
            jwt,
        })
    }
}

fn resolve_jwt<F>(lookup: &F, environment: Environment) -> Result<JwtSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let secret = lookup(JWT_SECRET_VAR)
        .filter(|s| !s.is_empty())
        .ok_or(ConfigError::MissingSecret {
            name: JWT_SECRET_VAR,
        })?;

    if environment.is_production() && secret.chars().count() < PRODUCTION_SECRET_MIN_LEN {
        return Err(ConfigError::WeakSecret {
            name: JWT_SECRET_VAR,
            min_len: PRODUCTION_SECRET_MIN_LEN,
        });
    }

    let raw_expiration =
        lookup("JWT_EXPIRATION").unwrap_or_else(|| DEFAULT_JWT_EXPIRATION.to_string());
    let expires_in =
        parse_expiration(&raw_expiration).ok_or_else(|| ConfigError::InvalidValue {
            name: "JWT_EXPIRATION",
            value: raw_expiration.clone(),
            reason: "expected a positive duration such as 900, 15m, 12h or 7d".to_string(),
        })?;

    Ok(JwtSettings { secret, expires_in })
}

fn resolve_database<F>(lookup: &F, environment: Environment) -> Result<DatabaseSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let pool_max: u32 = parse_var(lookup, "DB_POOL_MAX", 10)?;
    let pool_min: u32 = parse_var(lookup, "DB_POOL_MIN", 2)?;
    let timeout_ms: u64 = parse_var(lookup, "DB_CONNECTION_TIMEOUT", 30_000)?;

    if pool_max == 0 {
        return Err(ConfigError::InvalidValue {
            name: "DB_POOL_MAX",
            value: pool_max.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if pool_min > pool_max {
        return Err(ConfigError::InvalidValue {
            name: "DB_POOL_MIN",
            value: pool_min.to_string(),
            reason: format!("must not exceed DB_POOL_MAX ({pool_max})"),
        });
    }

    Ok(DatabaseSettings {
        host: lookup("POSTGRES_HOST").unwrap_or_else(|| "localhost".to_string()),
        port: parse_var(lookup, "POSTGRES_PORT", 5432)?,
        username: lookup("POSTGRES_USER").unwrap_or_else(|| "uems_user".to_string()),
        password: lookup("POSTGRES_PASSWORD"),
        database: lookup("POSTGRES_DB").unwrap_or_else(|| "uems_db".to_string()),
        pool_max,
        pool_min,
        connection_timeout: std::time::Duration::from_millis(timeout_ms),
        require_tls: environment.is_production(),
    })
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue {
                name,
                value,
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}

/// Parses a token lifetime
///
/// Accepts plain seconds (`900`) or a number with a unit suffix:
/// `s`, `m`, `h` or `d`. Zero and negative values are rejected.
///
/// # Example
///
/// ```
/// use chrono::Duration;
/// use uems_shared::config::parse_expiration;
///
/// assert_eq!(parse_expiration("15m"), Some(Duration::minutes(15)));
/// assert_eq!(parse_expiration("3600"), Some(Duration::hours(1)));
/// assert_eq!(parse_expiration("soon"), None);
/// ```
pub fn parse_expiration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (digits, unit) = match value.char_indices().last()? {
        (idx, c) if c.is_ascii_alphabetic() => (&value[..idx], Some(c)),
        _ => (value, None),
    };

    let amount: i64 = digits.trim().parse().ok().filter(|n| *n > 0)?;

    let seconds = match unit {
        None | Some('s') => amount,
        Some('m') => amount.checked_mul(60)?,
        Some('h') => amount.checked_mul(3_600)?,
        Some('d') => amount.checked_mul(86_400)?,
        Some(_) => return None,
    };

    Duration::try_seconds(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| vars.get(k).cloned(), Path::new("/srv/uems"))
    }

    #[test]
    fn test_missing_secret_fails_in_every_environment() {
        for env in ["development", "test", "production"] {
            let err = resolve(&[("NODE_ENV", env)]).unwrap_err();
            assert!(
                matches!(err, ConfigError::MissingSecret { name: "JWT_SECRET" }),
                "unexpected error for {env}: {err}"
            );
        }
    }

    #[test]
    fn test_empty_secret_is_missing() {
        let err = resolve(&[("JWT_SECRET", "")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret { .. }));
    }

    #[test]
    fn test_short_secret_rejected_only_in_production() {
        let err = resolve(&[("NODE_ENV", "production"), ("JWT_SECRET", "short")]).unwrap_err();
        assert!(matches!(err, ConfigError::WeakSecret { min_len: 32, .. }));

        let config = resolve(&[("NODE_ENV", "development"), ("JWT_SECRET", "short")]).unwrap();
        assert_eq!(config.jwt.secret, "short");

        let strong = "s".repeat(32);
        let config = resolve(&[("NODE_ENV", "production"), ("JWT_SECRET", strong.as_str())]).unwrap();
        assert!(config.environment.is_production());
    }

    #[test]
    fn test_defaults() {
        let config = resolve(&[("JWT_SECRET", "dev")]).unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.username, "uems_user");
        assert_eq!(config.database.password, None);
        assert_eq!(config.database.database, "uems_db");
        assert_eq!(config.database.pool_max, 10);
        assert_eq!(config.database.pool_min, 2);
        assert_eq!(
            config.database.connection_timeout,
            std::time::Duration::from_millis(30_000)
        );
        assert!(!config.database.require_tls);
        assert_eq!(config.jwt.expires_in, Duration::minutes(15));
    }

    #[test]
    fn test_overrides() {
        let config = resolve(&[
            ("JWT_SECRET", "dev"),
            ("POSTGRES_HOST", "db.internal"),
            ("POSTGRES_PORT", "6543"),
            ("POSTGRES_USER", "crm"),
            ("POSTGRES_PASSWORD", "hunter2"),
            ("POSTGRES_DB", "crm_db"),
            ("DB_POOL_MAX", "25"),
            ("DB_POOL_MIN", "5"),
            ("DB_CONNECTION_TIMEOUT", "1500"),
            ("JWT_EXPIRATION", "2h"),
        ])
        .unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.username, "crm");
        assert_eq!(config.database.password.as_deref(), Some("hunter2"));
        assert_eq!(config.database.database, "crm_db");
        assert_eq!(config.database.pool_max, 25);
        assert_eq!(config.database.pool_min, 5);
        assert_eq!(
            config.database.connection_timeout,
            std::time::Duration::from_millis(1500)
        );
        assert_eq!(config.jwt.expires_in, Duration::hours(2));
    }

    #[test]
    fn test_invalid_values() {
        let err = resolve(&[("JWT_SECRET", "dev"), ("POSTGRES_PORT", "abc")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "POSTGRES_PORT", .. }));

        let err = resolve(&[("JWT_SECRET", "dev"), ("DB_POOL_MIN", "20")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "DB_POOL_MIN", .. }));

        let err = resolve(&[("JWT_SECRET", "dev"), ("DB_POOL_MAX", "0"), ("DB_POOL_MIN", "0")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "DB_POOL_MAX", .. }));

        let err = resolve(&[("NODE_ENV", "staging"), ("JWT_SECRET", "dev")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "NODE_ENV", .. }));

        let err = resolve(&[("JWT_SECRET", "dev"), ("JWT_EXPIRATION", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "JWT_EXPIRATION", .. }));
    }

    #[test]
    fn test_layout_switches_on_environment() {
        let dev = resolve(&[("JWT_SECRET", "dev")]).unwrap();
        assert_eq!(dev.layout.root, PathBuf::from("/srv/uems/src"));
        assert_eq!(dev.layout.entities.to_string(), "/srv/uems/src/models/*.rs");
        assert_eq!(
            dev.layout.migrations.to_string(),
            "/srv/uems/src/db/migrations/m*.rs"
        );

        let test = resolve(&[("NODE_ENV", "test"), ("JWT_SECRET", "dev")]).unwrap();
        assert_eq!(test.layout.root, PathBuf::from("/srv/uems/dist"));
        assert!(!test.database.require_tls);

        let prod = resolve(&[("NODE_ENV", "production"), ("JWT_SECRET", "x".repeat(40).as_str())])
            .unwrap();
        assert_eq!(prod.layout.root, PathBuf::from("/srv/uems/dist"));
        assert!(prod.database.require_tls);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = resolve(&[
            ("JWT_SECRET", "very-secret-signing-key"),
            ("POSTGRES_PASSWORD", "db-password"),
        ])
        .unwrap();

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("very-secret-signing-key"));
        assert!(!rendered.contains("db-password"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_parse_expiration() {
        assert_eq!(parse_expiration("900"), Some(Duration::seconds(900)));
        assert_eq!(parse_expiration("30s"), Some(Duration::seconds(30)));
        assert_eq!(parse_expiration("15m"), Some(Duration::minutes(15)));
        assert_eq!(parse_expiration("12h"), Some(Duration::hours(12)));
        assert_eq!(parse_expiration("7d"), Some(Duration::days(7)));
        assert_eq!(parse_expiration(""), None);
        assert_eq!(parse_expiration("m"), None);
        assert_eq!(parse_expiration("-5m"), None);
        assert_eq!(parse_expiration("10w"), None);
    }

    #[test]
    fn test_file_pattern_scan() {
        let dir = tempfile::tempdir().unwrap();
        let migrations = dir.path().join("db").join("migrations");
        std::fs::create_dir_all(&migrations).unwrap();
        for name in [
            "m1735200000000_create_crm_schema.rs",
            "m1735201200000_add_username_to_users.rs",
            "mod.rs",
            "notes.md",
        ] {
            std::fs::write(migrations.join(name), "").unwrap();
        }

        let layout = FileLayout::resolve(Environment::Production, dir.path());
        // production resolves under dist/, which does not exist here
        assert!(layout.migrations.find_files().is_empty());

        let pattern = FilePattern {
            dir: migrations.clone(),
            prefix: "m",
            extension: "rs",
        };
        let found: Vec<String> = pattern
            .find_files()
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect();

        assert_eq!(
            found,
            vec![
                "m1735200000000_create_crm_schema.rs".to_string(),
                "m1735201200000_add_username_to_users.rs".to_string(),
            ]
        );
    }
}
