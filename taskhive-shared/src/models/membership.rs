//! Membership model and database operations
//!
//! A membership row records non-owner participation in an organization.
//! The owner never has a row of their own.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE memberships (
//!     org_id UUID NOT NULL REFERENCES organizations(id),
//!     user_id UUID NOT NULL REFERENCES users(id),
//!     joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     CONSTRAINT memberships_pkey PRIMARY KEY (org_id, user_id)
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::user::UserProfile;

/// Membership of a user in an organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    /// Organization ID
    pub org_id: Uuid,

    /// Member user ID
    pub user_id: Uuid,

    /// When the user joined
    pub joined_at: DateTime<Utc>,
}

/// One entry of an organization's participant list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user: UserProfile,
    pub joined_at: DateTime<Utc>,
    pub is_owner: bool,
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: Uuid,
    full_name: String,
    email: String,
    created_at: DateTime<Utc>,
    joined_at: DateTime<Utc>,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Self {
            user: UserProfile {
                id: row.id,
                full_name: row.full_name,
                email: row.email,
                created_at: row.created_at,
            },
            joined_at: row.joined_at,
            is_owner: false,
        }
    }
}

impl Membership {
    /// Inserts a membership row with `joined_at = NOW()`
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `memberships_pkey` if the row exists
    pub async fn create<'e, E>(executor: E, org_id: Uuid, user_id: Uuid) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (org_id, user_id)
            VALUES ($1, $2)
            RETURNING org_id, user_id, joined_at
            "#,
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_one(executor)
        .await?;

        Ok(membership)
    }

    /// Finds the membership row for `(org_id, user_id)`
    pub async fn find<'e, E>(
        executor: E,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let membership = sqlx::query_as::<_, Membership>(
            "SELECT org_id, user_id, joined_at FROM memberships WHERE org_id = $1 AND user_id = $2",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(membership)
    }

    /// Finds the membership row and takes a shared row lock
    ///
    /// Blocks concurrent removal until the surrounding transaction ends.
    pub async fn find_for_share<'e, E>(
        executor: E,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let membership = sqlx::query_as::<_, Membership>(
            "SELECT org_id, user_id, joined_at FROM memberships WHERE org_id = $1 AND user_id = $2 FOR SHARE",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(membership)
    }

    /// Members of an organization with their profiles, in join order
    pub async fn list_members<'e, E>(executor: E, org_id: Uuid) -> Result<Vec<Member>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT u.id, u.full_name, u.email, u.created_at, m.joined_at
            FROM memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.org_id = $1
            ORDER BY m.joined_at ASC, u.id ASC
            "#,
        )
        .bind(org_id)
        .fetch_all(executor)
        .await?;

        Ok(rows.into_iter().map(Member::from).collect())
    }

    /// Deletes one membership row
    ///
    /// Returns true if a row was removed.
    pub async fn delete<'e, E>(executor: E, org_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM memberships WHERE org_id = $1 AND user_id = $2")
            .bind(org_id)
            .bind(user_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes every membership of an organization
    pub async fn delete_by_organization<'e, E>(executor: E, org_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM memberships WHERE org_id = $1")
            .bind(org_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
