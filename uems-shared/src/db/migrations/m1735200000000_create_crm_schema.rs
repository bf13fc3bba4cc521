//! Initial CRM schema: users, organizations, contacts and activities.

use async_trait::async_trait;
use sqlx::PgConnection;

use crate::db::migrator::Migration;

pub struct CreateCrmSchema;

const UP: &[&str] = &[
    r#"CREATE TYPE user_role AS ENUM ('admin', 'hr_manager', 'sales_user', 'user')"#,
    r#"CREATE TYPE activity_type AS ENUM ('call', 'email', 'meeting', 'note', 'task')"#,
    r#"
    CREATE TABLE users (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        email VARCHAR(255) NOT NULL UNIQUE,
        password VARCHAR(255) NOT NULL,
        first_name VARCHAR(100) NOT NULL,
        last_name VARCHAR(100) NOT NULL,
        role user_role NOT NULL DEFAULT 'user',
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE organizations (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        name VARCHAR(255) NOT NULL,
        industry VARCHAR(100),
        website VARCHAR(255),
        email VARCHAR(255),
        phone VARCHAR(50),
        address TEXT,
        parent_organization_id UUID REFERENCES organizations(id) ON DELETE SET NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE contacts (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        first_name VARCHAR(100) NOT NULL,
        last_name VARCHAR(100) NOT NULL,
        email VARCHAR(255),
        phone VARCHAR(50),
        job_title VARCHAR(100),
        notes TEXT,
        organization_id UUID REFERENCES organizations(id) ON DELETE SET NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE activities (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        activity_type activity_type NOT NULL,
        subject VARCHAR(255) NOT NULL,
        description TEXT,
        activity_date TIMESTAMPTZ NOT NULL,
        contact_id UUID NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"CREATE INDEX idx_organizations_parent ON organizations(parent_organization_id)"#,
    r#"CREATE INDEX idx_organizations_created_at ON organizations(created_at DESC)"#,
    r#"CREATE INDEX idx_contacts_organization ON contacts(organization_id)"#,
    r#"CREATE INDEX idx_contacts_created_at ON contacts(created_at DESC)"#,
    r#"CREATE INDEX idx_activities_contact ON activities(contact_id)"#,
    r#"CREATE INDEX idx_activities_date ON activities(activity_date DESC)"#,
];

const DOWN: &[&str] = &[
    "DROP TABLE IF EXISTS activities",
    "DROP TABLE IF EXISTS contacts",
    "DROP TABLE IF EXISTS organizations",
    "DROP TABLE IF EXISTS users",
    "DROP TYPE IF EXISTS activity_type",
    "DROP TYPE IF EXISTS user_role",
];

#[async_trait]
impl Migration for CreateCrmSchema {
    fn version(&self) -> i64 {
        1_735_200_000_000
    }

    fn name(&self) -> &'static str {
        "create_crm_schema"
    }

    async fn up(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        for statement in UP {
            sqlx::query(statement).execute(&mut *conn).await?;
        }
        Ok(())
    }

    async fn down(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        for statement in DOWN {
            sqlx::query(statement).execute(&mut *conn).await?;
        }
        Ok(())
    }
}
