/// Activity model and database operations
///
/// An activity is something that happened with a contact: a call, an email,
/// a meeting, a note or a task. Activities are owned by their contact and are
/// deleted with it.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE activity_type AS ENUM ('call', 'email', 'meeting', 'note', 'task');
///
/// CREATE TABLE activities (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     activity_type activity_type NOT NULL,
///     subject VARCHAR(255) NOT NULL,
///     description TEXT,
///     activity_date TIMESTAMPTZ NOT NULL,
///     contact_id UUID NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;
use validator::Validate;

use super::double_option;

/// Kind of activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "activity_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Call,
    Email,
    Meeting,
    Note,
    Task,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Call => "call",
            ActivityType::Email => "email",
            ActivityType::Meeting => "meeting",
            ActivityType::Note => "note",
            ActivityType::Task => "task",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Activity {
    pub id: Uuid,
    pub activity_type: ActivityType,
    pub subject: String,
    pub description: Option<String>,
    pub activity_date: DateTime<Utc>,
    pub contact_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an activity
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateActivity {
    pub activity_type: ActivityType,

    #[validate(length(min = 1, max = 255, message = "subject must not be empty"))]
    pub subject: String,

    pub description: Option<String>,

    pub activity_date: DateTime<Utc>,

    pub contact_id: Uuid,
}

/// Partial update for an activity
///
/// Only `description` is nullable; the other fields can be replaced but not
/// cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateActivity {
    pub activity_type: Option<ActivityType>,

    #[validate(length(min = 1, max = 255, message = "subject must not be empty"))]
    pub subject: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    pub activity_date: Option<DateTime<Utc>>,

    pub contact_id: Option<Uuid>,
}

impl UpdateActivity {
    /// Merges the present fields into `activity`
    pub fn apply(self, activity: &mut Activity) {
        if let Some(activity_type) = self.activity_type {
            activity.activity_type = activity_type;
        }
        if let Some(subject) = self.subject {
            activity.subject = subject;
        }
        if let Some(description) = self.description {
            activity.description = description;
        }
        if let Some(activity_date) = self.activity_date {
            activity.activity_date = activity_date;
        }
        if let Some(contact_id) = self.contact_id {
            activity.contact_id = contact_id;
        }
    }
}

impl Activity {
    pub async fn create<'e, E>(executor: E, data: CreateActivity) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Activity>(
            r#"
            INSERT INTO activities (activity_type, subject, description, activity_date, contact_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, activity_type, subject, description, activity_date, contact_id,
                      created_at, updated_at
            "#,
        )
        .bind(data.activity_type)
        .bind(data.subject)
        .bind(data.description)
        .bind(data.activity_date)
        .bind(data.contact_id)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Activity>(
            r#"
            SELECT id, activity_type, subject, description, activity_date, contact_id,
                   created_at, updated_at
            FROM activities
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Finds an activity and locks its row until the transaction ends
    pub async fn find_by_id_for_update<'e, E>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Activity>(
            r#"
            SELECT id, activity_type, subject, description, activity_date, contact_id,
                   created_at, updated_at
            FROM activities
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Lists every activity, most recent `activity_date` first
    pub async fn find_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Activity>(
            r#"
            SELECT id, activity_type, subject, description, activity_date, contact_id,
                   created_at, updated_at
            FROM activities
            ORDER BY activity_date DESC, id
            "#,
        )
        .fetch_all(executor)
        .await
    }

    /// Lists the activities of one contact, most recent first
    pub async fn find_by_contact<'e, E>(
        executor: E,
        contact_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Activity>(
            r#"
            SELECT id, activity_type, subject, description, activity_date, contact_id,
                   created_at, updated_at
            FROM activities
            WHERE contact_id = $1
            ORDER BY activity_date DESC, id
            "#,
        )
        .bind(contact_id)
        .fetch_all(executor)
        .await
    }

    /// Writes every column of `self` back and bumps `updated_at`
    pub async fn save<'e, E>(&self, executor: E) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Activity>(
            r#"
            UPDATE activities
            SET activity_type = $2, subject = $3, description = $4, activity_date = $5,
                contact_id = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING id, activity_type, subject, description, activity_date, contact_id,
                      created_at, updated_at
            "#,
        )
        .bind(self.id)
        .bind(self.activity_type)
        .bind(&self.subject)
        .bind(&self.description)
        .bind(self.activity_date)
        .bind(self.contact_id)
        .fetch_one(executor)
        .await
    }

    /// Deletes an activity by ID
    ///
    /// Returns true if a row was deleted.
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM activities WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ActivityType::Meeting).unwrap(),
            "\"meeting\""
        );
        let parsed: ActivityType = serde_json::from_str("\"call\"").unwrap();
        assert_eq!(parsed, ActivityType::Call);
        assert_eq!(parsed.as_str(), "call");
    }

    #[test]
    fn test_apply_replaces_required_and_clears_description() {
        let mut activity = Activity {
            id: Uuid::new_v4(),
            activity_type: ActivityType::Call,
            subject: "Intro call".to_string(),
            description: Some("Discussed pricing".to_string()),
            activity_date: Utc::now(),
            contact_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let original_contact = activity.contact_id;

        UpdateActivity {
            activity_type: Some(ActivityType::Meeting),
            description: Some(None),
            ..Default::default()
        }
        .apply(&mut activity);

        assert_eq!(activity.activity_type, ActivityType::Meeting);
        assert_eq!(activity.subject, "Intro call");
        assert_eq!(activity.description, None);
        assert_eq!(activity.contact_id, original_contact);
    }
}
