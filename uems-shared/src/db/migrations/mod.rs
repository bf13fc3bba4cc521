/// Registered schema migrations
///
/// Each file is named `m<version>_<name>.rs`, where the version is the
/// millisecond timestamp the migration was authored at. New migrations must
/// be appended to [`all`].

use super::migrator::Migration;

mod m1735200000000_create_crm_schema;
mod m1735201200000_add_username_to_users;

pub use m1735200000000_create_crm_schema::CreateCrmSchema;
pub use m1735201200000_add_username_to_users::AddUsernameToUsers;

/// Every migration known to this build
pub fn all() -> Vec<Box<dyn Migration>> {
    vec![Box::new(CreateCrmSchema), Box::new(AddUsernameToUsers)]
}
