/// Database models for UEMS
///
/// Each model owns its table's queries. Query functions are generic over
/// [`sqlx::PgExecutor`] so the services can run them on the pool or inside a
/// transaction.
///
/// # Models
///
/// - `user`: User accounts, roles and credentials
/// - `organization`: Organizations with an optional parent organization
/// - `contact`: People, optionally attached to an organization
/// - `activity`: Calls, emails, meetings, notes and tasks logged on a contact
///
/// # Example
///
/// ```no_run
/// use uems_shared::models::contact::{Contact, CreateContact};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let contact = Contact::create(
///     &pool,
///     CreateContact {
///         first_name: "Ada".to_string(),
///         last_name: "Lovelace".to_string(),
///         ..Default::default()
///     },
/// )
/// .await?;
///
/// let all = Contact::find_all(&pool).await?;
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Deserializer};

pub mod activity;
pub mod contact;
pub mod organization;
pub mod user;

/// Deserializes a nullable field of a partial update
///
/// Used with `#[serde(default, deserialize_with = "double_option")]` so that
/// an absent field becomes `None` (keep), an explicit `null` becomes
/// `Some(None)` (clear) and a value becomes `Some(Some(value))` (set).
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
