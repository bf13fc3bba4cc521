/// Organization model and database operations
///
/// Organizations form an optional hierarchy through `parent_organization_id`.
/// Deleting a parent detaches its children (`ON DELETE SET NULL`); contacts of
/// a deleted organization are detached the same way.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE organizations (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     industry VARCHAR(100),
///     website VARCHAR(255),
///     email VARCHAR(255),
///     phone VARCHAR(50),
///     address TEXT,
///     parent_organization_id UUID REFERENCES organizations(id) ON DELETE SET NULL,
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
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub parent_organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an organization
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateOrganization {
    #[validate(length(min = 1, max = 255, message = "name must not be empty"))]
    pub name: String,

    #[validate(length(max = 100))]
    pub industry: Option<String>,

    #[validate(url(message = "website must be a URL"))]
    pub website: Option<String>,

    #[validate(email(message = "email must be an email"))]
    pub email: Option<String>,

    #[validate(length(max = 50))]
    pub phone: Option<String>,

    pub address: Option<String>,

    pub parent_organization_id: Option<Uuid>,
}

/// Partial update for an organization
///
/// `None` keeps the current value. For nullable columns `Some(None)` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateOrganization {
    #[validate(length(min = 1, max = 255, message = "name must not be empty"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub industry: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub website: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub parent_organization_id: Option<Option<Uuid>>,
}

impl UpdateOrganization {
    /// Merges the present fields into `organization`
    pub fn apply(self, organization: &mut Organization) {
        if let Some(name) = self.name {
            organization.name = name;
        }
        if let Some(industry) = self.industry {
            organization.industry = industry;
        }
        if let Some(website) = self.website {
            organization.website = website;
        }
        if let Some(email) = self.email {
            organization.email = email;
        }
        if let Some(phone) = self.phone {
            organization.phone = phone;
        }
        if let Some(address) = self.address {
            organization.address = address;
        }
        if let Some(parent) = self.parent_organization_id {
            organization.parent_organization_id = parent;
        }
    }
}

impl Organization {
    pub async fn create<'e, E>(executor: E, data: CreateOrganization) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Organization>(
            r#"
            INSERT INTO organizations
                (name, industry, website, email, phone, address, parent_organization_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, industry, website, email, phone, address,
                      parent_organization_id, created_at, updated_at
            "#,
        )
        .bind(data.name)
        .bind(data.industry)
        .bind(data.website)
        .bind(data.email)
        .bind(data.phone)
        .bind(data.address)
        .bind(data.parent_organization_id)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Organization>(
            r#"
            SELECT id, name, industry, website, email, phone, address,
                   parent_organization_id, created_at, updated_at
            FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Finds an organization and locks its row until the transaction ends
    pub async fn find_by_id_for_update<'e, E>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Organization>(
            r#"
            SELECT id, name, industry, website, email, phone, address,
                   parent_organization_id, created_at, updated_at
            FROM organizations
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Lists every organization, newest first
    pub async fn find_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Organization>(
            r#"
            SELECT id, name, industry, website, email, phone, address,
                   parent_organization_id, created_at, updated_at
            FROM organizations
            ORDER BY created_at DESC, id
            "#,
        )
        .fetch_all(executor)
        .await
    }

    /// Loads the organizations with the given IDs, in no particular order
    pub async fn find_by_ids<'e, E>(executor: E, ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Organization>(
            r#"
            SELECT id, name, industry, website, email, phone, address,
                   parent_organization_id, created_at, updated_at
            FROM organizations
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(executor)
        .await
    }

    /// Whether `ancestor_id` is `id` itself or anywhere up its parent chain
    pub async fn is_self_or_ancestor<'e, E>(
        executor: E,
        id: Uuid,
        ancestor_id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar(
            r#"
            WITH RECURSIVE chain AS (
                SELECT id, parent_organization_id FROM organizations WHERE id = $1
                UNION
                SELECT o.id, o.parent_organization_id
                FROM organizations o
                JOIN chain c ON o.id = c.parent_organization_id
            )
            SELECT EXISTS (SELECT 1 FROM chain WHERE id = $2)
            "#,
        )
        .bind(id)
        .bind(ancestor_id)
        .fetch_one(executor)
        .await
    }

    /// Writes every column of `self` back and bumps `updated_at`
    pub async fn save<'e, E>(&self, executor: E) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Organization>(
            r#"
            UPDATE organizations
            SET name = $2, industry = $3, website = $4, email = $5, phone = $6,
                address = $7, parent_organization_id = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, industry, website, email, phone, address,
                      parent_organization_id, created_at, updated_at
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.industry)
        .bind(&self.website)
        .bind(&self.email)
        .bind(&self.phone)
        .bind(&self.address)
        .bind(self.parent_organization_id)
        .fetch_one(executor)
        .await
    }

    /// Deletes an organization by ID
    ///
    /// Returns true if a row was deleted.
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
