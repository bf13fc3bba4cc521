//! Adds a unique, required `username` to existing user rows.
//!
//! Runs in three phases so it is safe on a populated table: add the column
//! as nullable, backfill it, then tighten it to NOT NULL with a unique index.
//! Backfilled names are `user_<email local part>`. Accounts are named oldest
//! first (`created_at`, then `id`); when a name is already taken, by a shared
//! local part or by another account's literal one, the next free `_<n>`
//! suffix is used. Local parts are cut so the name fits `VARCHAR(100)`.

use async_trait::async_trait;
use sqlx::PgConnection;
use std::collections::HashSet;
use uuid::Uuid;

use crate::db::migrator::Migration;

pub struct AddUsernameToUsers;

const ADD_COLUMN: &str = r#"
    ALTER TABLE users
    ADD COLUMN username VARCHAR(100) NULL,
    ADD CONSTRAINT "UQ_users_username" UNIQUE (username)
"#;

const BACKFILL: &str = r#"
    UPDATE users
    SET username = data.username
    FROM UNNEST($1::uuid[], $2::text[]) AS data(id, username)
    WHERE users.id = data.id
"#;

/// Upper bound of the `username` column, in characters
const USERNAME_MAX_LEN: usize = 100;

const USERNAME_PREFIX: &str = "user_";

const SET_NOT_NULL: &str = "ALTER TABLE users ALTER COLUMN username SET NOT NULL";

const CREATE_INDEX: &str = r#"CREATE UNIQUE INDEX "IDX_users_username" ON users (username)"#;

#[async_trait]
impl Migration for AddUsernameToUsers {
    fn version(&self) -> i64 {
        1_735_201_200_000
    }

    fn name(&self) -> &'static str {
        "add_username_to_users"
    }

    async fn up(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        sqlx::query(ADD_COLUMN).execute(&mut *conn).await?;

        let taken: HashSet<String> =
            sqlx::query_scalar("SELECT username FROM users WHERE username IS NOT NULL")
                .fetch_all(&mut *conn)
                .await?
                .into_iter()
                .collect();
        let pending: Vec<(Uuid, String)> = sqlx::query_as(
            "SELECT id, email FROM users WHERE username IS NULL ORDER BY created_at, id",
        )
        .fetch_all(&mut *conn)
        .await?;

        let (ids, usernames): (Vec<Uuid>, Vec<String>) =
            assign_usernames(&pending, taken).into_iter().unzip();

        let backfilled = sqlx::query(BACKFILL)
            .bind(ids)
            .bind(usernames)
            .execute(&mut *conn)
            .await?;
        tracing::debug!(rows = backfilled.rows_affected(), "Backfilled usernames");

        sqlx::query(SET_NOT_NULL).execute(&mut *conn).await?;
        sqlx::query(CREATE_INDEX).execute(&mut *conn).await?;
        Ok(())
    }

    async fn down(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        sqlx::query(r#"DROP INDEX IF EXISTS "IDX_users_username""#)
            .execute(&mut *conn)
            .await?;
        sqlx::query("ALTER TABLE users DROP COLUMN IF EXISTS username")
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

/// Names each `(id, email)` in order, skipping every name in `taken`
fn assign_usernames(users: &[(Uuid, String)], mut taken: HashSet<String>) -> Vec<(Uuid, String)> {
    users
        .iter()
        .map(|(id, email)| {
            let local_part = email.split('@').next().unwrap_or_default();
            let username = (1..)
                .map(|n| candidate_username(local_part, n))
                .find(|candidate| !taken.contains(candidate))
                .unwrap_or_default();
            taken.insert(username.clone());
            (*id, username)
        })
        .collect()
}

/// `user_<local>` for the first candidate, `user_<local>_<n>` after that,
/// with the local part shortened to fit the column
fn candidate_username(local_part: &str, n: u32) -> String {
    let suffix = if n == 1 { String::new() } else { format!("_{n}") };
    let room = USERNAME_MAX_LEN - USERNAME_PREFIX.len() - suffix.len();
    let local: String = local_part.chars().take(room).collect();
    format!("{USERNAME_PREFIX}{local}{suffix}")
}
