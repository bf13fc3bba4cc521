/// Activities service
///
/// Activities are listed by `activity_date`, most recent first, each with
/// its contact attached.

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use super::index_by_id;
use crate::error::ServiceError;
use crate::models::activity::{Activity, CreateActivity, UpdateActivity};
use crate::models::contact::Contact;

const ENTITY: &str = "Activity";

/// An activity with its contact attached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRecord {
    #[serde(flatten)]
    pub activity: Activity,

    /// The owning contact; only absent if it vanished mid-read
    pub contact: Option<Contact>,
}

#[derive(Debug, Clone)]
pub struct ActivitiesService {
    pool: PgPool,
}

impl ActivitiesService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates an activity
    ///
    /// # Errors
    ///
    /// `ConstraintViolation` if `contact_id` does not reference an existing
    /// contact.
    pub async fn create(&self, input: CreateActivity) -> Result<ActivityRecord, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let activity = Activity::create(&mut *tx, input).await?;
        let record = with_contact(&mut tx, activity).await?;

        tx.commit().await?;

        info!(
            activity_id = %record.activity.id,
            activity_type = record.activity.activity_type.as_str(),
            "Activity created"
        );
        Ok(record)
    }

    /// Lists every activity, most recent first
    pub async fn find_all(&self) -> Result<Vec<ActivityRecord>, ServiceError> {
        let activities = Activity::find_all(&self.pool).await?;
        self.attach_contacts(activities).await
    }

    /// Lists the activities of one contact, most recent first
    ///
    /// An unknown contact yields an empty list.
    pub async fn find_by_contact(
        &self,
        contact_id: Uuid,
    ) -> Result<Vec<ActivityRecord>, ServiceError> {
        let activities = Activity::find_by_contact(&self.pool, contact_id).await?;
        self.attach_contacts(activities).await
    }

    /// Finds one activity with its contact
    ///
    /// # Errors
    ///
    /// `NotFound` if no activity has this id.
    pub async fn find_one(&self, id: Uuid) -> Result<ActivityRecord, ServiceError> {
        let mut conn = self.pool.acquire().await?;

        let activity = Activity::find_by_id(&mut *conn, id)
            .await?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))?;

        with_contact(&mut conn, activity).await
    }

    /// Applies a partial update under a row lock
    ///
    /// A missing activity yields `NotFound` and nothing is written.
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateActivity,
    ) -> Result<ActivityRecord, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let mut activity = Activity::find_by_id_for_update(&mut *tx, id)
            .await?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))?;

        input.apply(&mut activity);
        let activity = activity.save(&mut *tx).await?;
        let record = with_contact(&mut tx, activity).await?;

        tx.commit().await?;

        info!(activity_id = %id, "Activity updated");
        Ok(record)
    }

    /// Deletes an activity, returning it
    pub async fn remove(&self, id: Uuid) -> Result<Activity, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let activity = Activity::find_by_id_for_update(&mut *tx, id)
            .await?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))?;

        Activity::delete(&mut *tx, id).await?;
        tx.commit().await?;

        info!(activity_id = %id, "Activity removed");
        Ok(activity)
    }

    async fn attach_contacts(
        &self,
        activities: Vec<Activity>,
    ) -> Result<Vec<ActivityRecord>, ServiceError> {
        let mut contact_ids: Vec<Uuid> = activities.iter().map(|a| a.contact_id).collect();
        contact_ids.sort_unstable();
        contact_ids.dedup();

        let contacts = index_by_id(
            Contact::find_by_ids(&self.pool, &contact_ids).await?,
            |c| c.id,
        );

        debug!(count = activities.len(), "Loaded activities");

        Ok(activities
            .into_iter()
            .map(|activity| {
                let contact = contacts.get(&activity.contact_id).cloned();
                ActivityRecord { activity, contact }
            })
            .collect())
    }
}

async fn with_contact(
    conn: &mut PgConnection,
    activity: Activity,
) -> Result<ActivityRecord, ServiceError> {
    let contact = Contact::find_by_id(&mut *conn, activity.contact_id).await?;
    Ok(ActivityRecord { activity, contact })
}
