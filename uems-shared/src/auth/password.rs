/// Password hashing using Argon2id
///
/// Hashes are PHC strings (`$argon2id$v=19$m=...`) so the parameters travel
/// with the hash and can be raised later without invalidating stored
/// credentials.
///
/// # Parameters
///
/// - **Memory**: 19 MiB (19456 KiB)
/// - **Iterations**: 2 passes
/// - **Parallelism**: 1 lane
/// - **Output**: 32-byte hash
///
/// # Example
///
/// ```
/// use uems_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Sales@123456")?;
///
/// assert!(verify_password("Sales@123456", &hash)?);
/// assert!(!verify_password("sales@123456", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Minimum length accepted for any password
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Minimum length for passwords that must pass the strength check
pub const STRONG_PASSWORD_LENGTH: usize = 10;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Stored hash is not a valid PHC string
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),

    /// Verification failed for a reason other than a wrong password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(19_456, 2, 1, Some(32))
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password with a fresh random salt
///
/// # Errors
///
/// Returns `PasswordError::HashError` if hashing fails
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC hash
///
/// Returns `Ok(false)` for a wrong password; errors are reserved for
/// unusable hashes. A PHC string without a salt or hash output (such as
/// `$argon2id$invalid`) is `InvalidHash`, not a mismatch.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    if parsed.salt.is_none() || parsed.hash.is_none() {
        return Err(PasswordError::InvalidHash(
            "missing salt or hash output".to_string(),
        ));
    }

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(e.to_string())),
    }
}

/// Checks that a password is strong enough for a privileged account
///
/// Requires at least [`STRONG_PASSWORD_LENGTH`] characters with an uppercase
/// letter, a lowercase letter, a digit and a symbol. Returns the first rule
/// that failed.
///
/// ```
/// use uems_shared::auth::password::validate_password_strength;
///
/// assert!(validate_password_strength("AdminAdmin@123").is_ok());
/// assert!(validate_password_strength("admin123").is_err());
/// ```
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    let rules: [(bool, &str); 5] = [
        (
            password.chars().count() >= STRONG_PASSWORD_LENGTH,
            "must be at least 10 characters long",
        ),
        (
            password.chars().any(|c| c.is_uppercase()),
            "must contain an uppercase letter",
        ),
        (
            password.chars().any(|c| c.is_lowercase()),
            "must contain a lowercase letter",
        ),
        (
            password.chars().any(|c| c.is_ascii_digit()),
            "must contain a digit",
        ),
        (
            password.chars().any(|c| !c.is_alphanumeric()),
            "must contain a symbol",
        ),
    ];

    match rules.iter().find(|(ok, _)| !ok) {
        Some((_, rule)) => Err(format!("Password {}", rule)),
        None => Ok(()),
    }
}
