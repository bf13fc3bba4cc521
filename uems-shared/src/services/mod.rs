/// Business services
///
/// Every service is a cheap `Clone` holding a pool handle. Mutating
/// operations run in their own transaction; reads go straight to the pool.
/// Relations are loaded eagerly with one extra query per relation rather than
/// per row.
///
/// # Services
///
/// - `contacts`: Contacts with their organization
/// - `organizations`: Organizations with parent and contacts
/// - `activities`: Activities with their contact
/// - `auth`: Local login, registration and token verification

use std::collections::{HashMap, HashSet};
use uuid::Uuid;

pub mod activities;
pub mod auth;
pub mod contacts;
pub mod organizations;

pub use activities::{ActivitiesService, ActivityRecord};
pub use auth::AuthService;
pub use contacts::{ContactRecord, ContactsService};
pub use organizations::{OrganizationRecord, OrganizationsService};

/// Distinct non-null foreign keys, for an `= ANY($1)` relation load
pub(crate) fn distinct_ids(ids: impl IntoIterator<Item = Option<Uuid>>) -> Vec<Uuid> {
    let set: HashSet<Uuid> = ids.into_iter().flatten().collect();
    set.into_iter().collect()
}

/// Indexes loaded relation rows by primary key
pub(crate) fn index_by_id<T>(rows: Vec<T>, id: impl Fn(&T) -> Uuid) -> HashMap<Uuid, T> {
    rows.into_iter().map(|row| (id(&row), row)).collect()
}
