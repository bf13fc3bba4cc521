/// Authentication primitives
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength checks
/// - [`jwt`]: HS256 access tokens carrying user id, username and role
///
/// The account-aware flows (login, registration, token verification) live in
/// [`crate::services::auth`].

pub mod jwt;
pub mod password;
