/// Contact model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE contacts (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     first_name VARCHAR(100) NOT NULL,
///     last_name VARCHAR(100) NOT NULL,
///     email VARCHAR(255),
///     phone VARCHAR(50),
///     job_title VARCHAR(100),
///     notes TEXT,
///     organization_id UUID REFERENCES organizations(id) ON DELETE SET NULL,
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub job_title: Option<String>,
    pub notes: Option<String>,
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a contact
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateContact {
    #[validate(length(min = 1, max = 100, message = "first_name must not be empty"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100, message = "last_name must not be empty"))]
    pub last_name: String,

    #[validate(email(message = "email must be an email"))]
    pub email: Option<String>,

    #[validate(length(max = 50))]
    pub phone: Option<String>,

    #[validate(length(max = 100))]
    pub job_title: Option<String>,

    pub notes: Option<String>,

    pub organization_id: Option<Uuid>,
}

/// Partial update for a contact
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateContact {
    #[validate(length(min = 1, max = 100, message = "first_name must not be empty"))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 100, message = "last_name must not be empty"))]
    pub last_name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub job_title: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub organization_id: Option<Option<Uuid>>,
}

impl UpdateContact {
    /// Merges the present fields into `contact`
    pub fn apply(self, contact: &mut Contact) {
        if let Some(first_name) = self.first_name {
            contact.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            contact.last_name = last_name;
        }
        if let Some(email) = self.email {
            contact.email = email;
        }
        if let Some(phone) = self.phone {
            contact.phone = phone;
        }
        if let Some(job_title) = self.job_title {
            contact.job_title = job_title;
        }
        if let Some(notes) = self.notes {
            contact.notes = notes;
        }
        if let Some(organization_id) = self.organization_id {
            contact.organization_id = organization_id;
        }
    }
}

impl Contact {
    pub async fn create<'e, E>(executor: E, data: CreateContact) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts
                (first_name, last_name, email, phone, job_title, notes, organization_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, first_name, last_name, email, phone, job_title, notes,
                      organization_id, created_at, updated_at
            "#,
        )
        .bind(data.first_name)
        .bind(data.last_name)
        .bind(data.email)
        .bind(data.phone)
        .bind(data.job_title)
        .bind(data.notes)
        .bind(data.organization_id)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, first_name, last_name, email, phone, job_title, notes,
                   organization_id, created_at, updated_at
            FROM contacts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Finds a contact and locks its row until the transaction ends
    pub async fn find_by_id_for_update<'e, E>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, first_name, last_name, email, phone, job_title, notes,
                   organization_id, created_at, updated_at
            FROM contacts
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Lists every contact, newest first
    pub async fn find_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, first_name, last_name, email, phone, job_title, notes,
                   organization_id, created_at, updated_at
            FROM contacts
            ORDER BY created_at DESC, id
            "#,
        )
        .fetch_all(executor)
        .await
    }

    /// Lists the contacts of an organization, newest first
    pub async fn find_by_organization<'e, E>(
        executor: E,
        organization_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, first_name, last_name, email, phone, job_title, notes,
                   organization_id, created_at, updated_at
            FROM contacts
            WHERE organization_id = $1
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(organization_id)
        .fetch_all(executor)
        .await
    }

    /// Loads the contacts with the given IDs, in no particular order
    pub async fn find_by_ids<'e, E>(executor: E, ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, first_name, last_name, email, phone, job_title, notes,
                   organization_id, created_at, updated_at
            FROM contacts
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(executor)
        .await
    }

    /// Writes every column of `self` back and bumps `updated_at`
    pub async fn save<'e, E>(&self, executor: E) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Contact>(
            r#"
            UPDATE contacts
            SET first_name = $2, last_name = $3, email = $4, phone = $5,
                job_title = $6, notes = $7, organization_id = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING id, first_name, last_name, email, phone, job_title, notes,
                      organization_id, created_at, updated_at
            "#,
        )
        .bind(self.id)
        .bind(&self.first_name)
        .bind(&self.last_name)
        .bind(&self.email)
        .bind(&self.phone)
        .bind(&self.job_title)
        .bind(&self.notes)
        .bind(self.organization_id)
        .fetch_one(executor)
        .await
    }

    /// Deletes a contact by ID, cascading to its activities
    ///
    /// Returns true if a row was deleted.
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
