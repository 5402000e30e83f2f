//! Organization model and database operations
//!
//! The owner is a column on the organization, not a membership row. Invite
//! codes are unique among live organizations and, through
//! `invite_code_history`, never reissued once minted.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE organizations (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     name VARCHAR(255) NOT NULL,
//!     description TEXT,
//!     invite_code CHAR(8) NOT NULL CONSTRAINT organizations_invite_code_key UNIQUE,
//!     owner_id UUID NOT NULL REFERENCES users(id),
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//!
//! CREATE TABLE invite_code_history (
//!     code CHAR(8) PRIMARY KEY,
//!     issued_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

const ORGANIZATION_COLUMNS: &str =
    "id, name, description, invite_code, owner_id, created_at, updated_at";

/// Organization (tenant)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organization {
    /// Unique organization ID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Optional free-form description
    pub description: Option<String>,

    /// Join code, 8 characters from `A-Z0-9`
    pub invite_code: String,

    /// Owning user; immutable
    pub owner_id: Uuid,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Organization as seen by a particular user
///
/// `invite_code` is only populated for the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
    pub owner_id: Uuid,
    pub is_owner: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrganizationView {
    /// Projects `org` for `viewer`
    pub fn for_viewer(org: Organization, viewer: Uuid) -> Self {
        let is_owner = org.owner_id == viewer;
        Self {
            id: org.id,
            name: org.name,
            description: org.description,
            invite_code: is_owner.then_some(org.invite_code),
            owner_id: org.owner_id,
            is_owner,
            created_at: org.created_at,
            updated_at: org.updated_at,
        }
    }
}

/// Input for creating an organization
#[derive(Debug, Clone)]
pub struct CreateOrganization {
    pub name: String,
    pub description: Option<String>,
    pub invite_code: String,
    pub owner_id: Uuid,
}

/// Input for updating an organization
///
/// Only `Some` fields are written. `description: Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct UpdateOrganization {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub invite_code: Option<String>,
}

impl Organization {
    /// Inserts a new organization
    ///
    /// The invite code must already be reserved with [`reserve_invite_code`]
    /// in the same transaction.
    pub async fn create<'e, E>(executor: E, data: CreateOrganization) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let org = sqlx::query_as::<_, Organization>(&format!(
            r#"
            INSERT INTO organizations (name, description, invite_code, owner_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {ORGANIZATION_COLUMNS}
            "#
        ))
        .bind(data.name)
        .bind(data.description)
        .bind(data.invite_code)
        .bind(data.owner_id)
        .fetch_one(executor)
        .await?;

        Ok(org)
    }

    /// Finds an organization by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let org = sqlx::query_as::<_, Organization>(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(org)
    }

    /// Finds an organization by ID and takes a shared row lock
    ///
    /// Blocks concurrent deletion until the surrounding transaction ends.
    pub async fn find_by_id_for_share<'e, E>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let org = sqlx::query_as::<_, Organization>(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE id = $1 FOR SHARE"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(org)
    }

    /// Finds an organization by ID and takes an exclusive row lock
    ///
    /// Conflicts with the key-share locks taken by inserts that reference the
    /// row, so no task or membership can be added until the transaction ends.
    pub async fn find_by_id_for_update<'e, E>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let org = sqlx::query_as::<_, Organization>(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(org)
    }

    /// Finds the organization currently holding `code`
    pub async fn find_by_invite_code<'e, E>(
        executor: E,
        code: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let org = sqlx::query_as::<_, Organization>(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE invite_code = $1"
        ))
        .bind(code)
        .fetch_optional(executor)
        .await?;

        Ok(org)
    }

    /// Organizations owned by `user_id`, oldest first
    pub async fn list_owned_by<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let orgs = sqlx::query_as::<_, Organization>(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE owner_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        Ok(orgs)
    }

    /// Organizations `user_id` joined as a member, in join order
    pub async fn list_joined_by<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let orgs = sqlx::query_as::<_, Organization>(
            r#"
            SELECT o.id, o.name, o.description, o.invite_code, o.owner_id, o.created_at, o.updated_at
            FROM organizations o
            JOIN memberships m ON m.org_id = o.id
            WHERE m.user_id = $1
            ORDER BY m.joined_at ASC, o.id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await?;

        Ok(orgs)
    }

    /// Updates an organization
    ///
    /// A new invite code must already be reserved with
    /// [`reserve_invite_code`] in the same transaction.
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateOrganization,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut query = String::from("UPDATE organizations SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if data.invite_code.is_some() {
            bind_count += 1;
            query.push_str(&format!(", invite_code = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {ORGANIZATION_COLUMNS}"));

        let mut q = sqlx::query_as::<_, Organization>(&query).bind(id);

        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(invite_code) = data.invite_code {
            q = q.bind(invite_code);
        }

        let org = q.fetch_optional(executor).await?;

        Ok(org)
    }

    /// Deletes the organization row only
    ///
    /// Callers delete tasks and memberships first, in the same transaction.
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

/// Records `code` as issued
///
/// Fails with a unique violation on `invite_code_history_pkey` if the code
/// was ever minted before.
pub async fn reserve_invite_code<'e, E>(executor: E, code: &str) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query("INSERT INTO invite_code_history (code) VALUES ($1)")
        .bind(code)
        .execute(executor)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_org(owner_id: Uuid) -> Organization {
        Organization {
            id: Uuid::new_v4(),
            name: "Eng".to_string(),
            description: None,
            invite_code: "ABC12345".to_string(),
            owner_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_view_includes_invite_code() {
        let owner = Uuid::new_v4();
        let view = OrganizationView::for_viewer(sample_org(owner), owner);
        assert!(view.is_owner);
        assert_eq!(view.invite_code.as_deref(), Some("ABC12345"));
    }

    #[test]
    fn test_member_view_hides_invite_code() {
        let view = OrganizationView::for_viewer(sample_org(Uuid::new_v4()), Uuid::new_v4());
        assert!(!view.is_owner);
        assert!(view.invite_code.is_none());

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("invite_code").is_none());
    }
}
