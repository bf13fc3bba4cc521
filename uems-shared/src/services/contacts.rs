/// Contacts service
///
/// # Example
///
/// ```no_run
/// use uems_shared::models::contact::{CreateContact, UpdateContact};
/// use uems_shared::services::ContactsService;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), uems_shared::error::ServiceError> {
/// let contacts = ContactsService::new(pool);
///
/// let created = contacts
///     .create(CreateContact {
///         first_name: "Ada".to_string(),
///         last_name: "Lovelace".to_string(),
///         ..Default::default()
///     })
///     .await?;
///
/// let updated = contacts
///     .update(
///         created.contact.id,
///         UpdateContact {
///             job_title: Some(Some("Analyst".to_string())),
///             ..Default::default()
///         },
///     )
///     .await?;
/// assert_eq!(updated.contact.job_title.as_deref(), Some("Analyst"));
/// # Ok(())
/// # }
/// ```

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use super::{distinct_ids, index_by_id};
use crate::error::ServiceError;
use crate::models::contact::{Contact, CreateContact, UpdateContact};
use crate::models::organization::Organization;

const ENTITY: &str = "Contact";

/// A contact with its organization attached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactRecord {
    #[serde(flatten)]
    pub contact: Contact,

    pub organization: Option<Organization>,
}

#[derive(Debug, Clone)]
pub struct ContactsService {
    pool: PgPool,
}

impl ContactsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a contact
    ///
    /// # Errors
    ///
    /// `ConstraintViolation` if `organization_id` does not reference an
    /// existing organization.
    pub async fn create(&self, input: CreateContact) -> Result<ContactRecord, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let contact = Contact::create(&mut *tx, input).await?;
        let record = with_organization(&mut tx, contact).await?;

        tx.commit().await?;

        info!(contact_id = %record.contact.id, "Contact created");
        Ok(record)
    }

    /// Lists every contact, newest first, with organizations attached
    pub async fn find_all(&self) -> Result<Vec<ContactRecord>, ServiceError> {
        let contacts = Contact::find_all(&self.pool).await?;

        let organization_ids = distinct_ids(contacts.iter().map(|c| c.organization_id));
        let organizations = index_by_id(
            Organization::find_by_ids(&self.pool, &organization_ids).await?,
            |o| o.id,
        );

        debug!(count = contacts.len(), "Loaded contacts");

        Ok(contacts
            .into_iter()
            .map(|contact| {
                let organization = contact
                    .organization_id
                    .and_then(|id| organizations.get(&id).cloned());
                ContactRecord {
                    contact,
                    organization,
                }
            })
            .collect())
    }

    /// Finds one contact with its organization
    ///
    /// # Errors
    ///
    /// `NotFound` if no contact has this id.
    pub async fn find_one(&self, id: Uuid) -> Result<ContactRecord, ServiceError> {
        let mut conn = self.pool.acquire().await?;

        let contact = Contact::find_by_id(&mut *conn, id)
            .await?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))?;

        with_organization(&mut conn, contact).await
    }

    /// Applies a partial update
    ///
    /// The row is locked for the duration of the transaction. A missing
    /// contact yields `NotFound` and nothing is written.
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateContact,
    ) -> Result<ContactRecord, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let mut contact = Contact::find_by_id_for_update(&mut *tx, id)
            .await?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))?;

        input.apply(&mut contact);
        let contact = contact.save(&mut *tx).await?;
        let record = with_organization(&mut tx, contact).await?;

        tx.commit().await?;

        info!(contact_id = %id, "Contact updated");
        Ok(record)
    }

    /// Deletes a contact and, through the foreign key, its activities
    ///
    /// Returns the deleted contact.
    pub async fn remove(&self, id: Uuid) -> Result<Contact, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let contact = Contact::find_by_id_for_update(&mut *tx, id)
            .await?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))?;

        Contact::delete(&mut *tx, id).await?;
        tx.commit().await?;

        info!(contact_id = %id, "Contact removed");
        Ok(contact)
    }
}

async fn with_organization(
    conn: &mut PgConnection,
    contact: Contact,
) -> Result<ContactRecord, ServiceError> {
    let organization = match contact.organization_id {
        Some(organization_id) => Organization::find_by_id(&mut *conn, organization_id).await?,
        None => None,
    };

    Ok(ContactRecord {
        contact,
        organization,
    })
}
