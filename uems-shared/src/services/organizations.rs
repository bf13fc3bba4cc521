/// Organizations service
///
/// Lists attach each organization's parent. A single lookup additionally
/// attaches the organization's contacts.

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use super::{distinct_ids, index_by_id};
use crate::error::ServiceError;
use crate::models::contact::Contact;
use crate::models::organization::{CreateOrganization, Organization, UpdateOrganization};

const ENTITY: &str = "Organization";

/// Reported when an update would make the parent chain loop
const PARENT_CYCLE: &str = "organization_parent_cycle";

/// An organization with its relations attached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganizationRecord {
    #[serde(flatten)]
    pub organization: Organization,

    pub parent_organization: Option<Organization>,

    /// Loaded by `find_one` only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<Contact>>,
}

#[derive(Debug, Clone)]
pub struct OrganizationsService {
    pool: PgPool,
}

impl OrganizationsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates an organization
    ///
    /// # Errors
    ///
    /// `ConstraintViolation` if `parent_organization_id` does not reference an
    /// existing organization.
    pub async fn create(
        &self,
        input: CreateOrganization,
    ) -> Result<OrganizationRecord, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let organization = Organization::create(&mut *tx, input).await?;
        let record = with_parent(&mut tx, organization).await?;

        tx.commit().await?;

        info!(organization_id = %record.organization.id, "Organization created");
        Ok(record)
    }

    /// Lists every organization, newest first, with parents attached
    pub async fn find_all(&self) -> Result<Vec<OrganizationRecord>, ServiceError> {
        let organizations = Organization::find_all(&self.pool).await?;

        let parent_ids = distinct_ids(organizations.iter().map(|o| o.parent_organization_id));
        let parents = index_by_id(
            Organization::find_by_ids(&self.pool, &parent_ids).await?,
            |o| o.id,
        );

        debug!(count = organizations.len(), "Loaded organizations");

        Ok(organizations
            .into_iter()
            .map(|organization| {
                let parent_organization = organization
                    .parent_organization_id
                    .and_then(|id| parents.get(&id).cloned());
                OrganizationRecord {
                    organization,
                    parent_organization,
                    contacts: None,
                }
            })
            .collect())
    }

    /// Finds one organization with its parent and contacts
    ///
    /// # Errors
    ///
    /// `NotFound` if no organization has this id.
    pub async fn find_one(&self, id: Uuid) -> Result<OrganizationRecord, ServiceError> {
        let mut conn = self.pool.acquire().await?;

        let organization = Organization::find_by_id(&mut *conn, id)
            .await?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))?;

        let mut record = with_parent(&mut conn, organization).await?;
        record.contacts = Some(Contact::find_by_organization(&mut *conn, id).await?);

        Ok(record)
    }

    /// Applies a partial update under a row lock
    ///
    /// A missing organization yields `NotFound` and nothing is written. A
    /// parent that is the organization itself or one of its descendants is a
    /// `ConstraintViolation`.
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateOrganization,
    ) -> Result<OrganizationRecord, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let mut organization = Organization::find_by_id_for_update(&mut *tx, id)
            .await?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))?;

        input.apply(&mut organization);

        if let Some(parent_id) = organization.parent_organization_id {
            if parent_id == id
                || Organization::is_self_or_ancestor(&mut *tx, parent_id, id).await?
            {
                return Err(ServiceError::ConstraintViolation {
                    constraint: PARENT_CYCLE.to_string(),
                    message: format!(
                        "Organization {id} cannot have {parent_id} as its parent organization"
                    ),
                });
            }
        }

        let organization = organization.save(&mut *tx).await?;
        let record = with_parent(&mut tx, organization).await?;

        tx.commit().await?;

        info!(organization_id = %id, "Organization updated");
        Ok(record)
    }

    /// Deletes an organization
    ///
    /// Child organizations and contacts are detached, not deleted. Returns the
    /// deleted organization.
    pub async fn remove(&self, id: Uuid) -> Result<Organization, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let organization = Organization::find_by_id_for_update(&mut *tx, id)
            .await?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))?;

        Organization::delete(&mut *tx, id).await?;
        tx.commit().await?;

        info!(organization_id = %id, "Organization removed");
        Ok(organization)
    }
}

async fn with_parent(
    conn: &mut PgConnection,
    organization: Organization,
) -> Result<OrganizationRecord, ServiceError> {
    let parent_organization = match organization.parent_organization_id {
        Some(parent_id) => Organization::find_by_id(&mut *conn, parent_id).await?,
        None => None,
    };

    Ok(OrganizationRecord {
        organization,
        parent_organization,
        contacts: None,
    })
}
