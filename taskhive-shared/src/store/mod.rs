//! Storage seam
//!
//! [`Store`] is the only way the services touch persisted state. Every method
//! is one atomic unit: the Postgres implementation wraps multi-statement
//! methods in a transaction, the in-memory implementation holds a single
//! write lock for the whole call.
//!
//! Two guarantees are enforced here rather than in the services:
//!
//! - **Uniqueness** of emails, live invite codes, ever-issued invite codes and
//!   `(org_id, user_id)` memberships. Violations surface as
//!   [`StoreError::UniqueViolation`].
//! - **Assignee participation** on [`Store::insert_task`] and
//!   [`Store::set_task_assignee`]: the assignee is re-checked in the same
//!   unit that writes the row and a concurrent removal cannot interleave.
//!   Violations surface as [`StoreError::AssigneeNotParticipant`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    membership::{Member, Membership},
    organization::{CreateOrganization, Organization, UpdateOrganization},
    task::{CreateTask, StatusCounts, Task, TaskFilter, TaskStatus, UpdateTask},
    user::{CreateUser, UpdateUser, User},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

const POSTGRES_UNIQUE_VIOLATION: &str = "23505";
const POSTGRES_FOREIGN_KEY_VIOLATION: &str = "23503";

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared handle to a store implementation
pub type SharedStore = Arc<dyn Store>;

/// Uniqueness constraints the store enforces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniqueConstraint {
    /// `users.email`
    UserEmail,
    /// `organizations.invite_code` or `invite_code_history.code`
    InviteCode,
    /// `memberships (org_id, user_id)`
    Membership,
    /// Any other named constraint
    Other(String),
}

impl UniqueConstraint {
    /// Maps a Postgres constraint name onto a known constraint
    pub fn from_constraint_name(name: &str) -> Self {
        match name {
            "users_email_key" => UniqueConstraint::UserEmail,
            "organizations_invite_code_key" | "invite_code_history_pkey" => {
                UniqueConstraint::InviteCode
            }
            "memberships_pkey" => UniqueConstraint::Membership,
            other => UniqueConstraint::Other(other.to_string()),
        }
    }

    /// Human name of the unique value
    pub fn subject(&self) -> &str {
        match self {
            UniqueConstraint::UserEmail => "Email",
            UniqueConstraint::InviteCode => "Invite code",
            UniqueConstraint::Membership => "Membership",
            UniqueConstraint::Other(name) => name,
        }
    }
}

impl fmt::Display for UniqueConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subject())
    }
}

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(UniqueConstraint),

    /// The assignee is not the owner or a member of the task's organization
    #[error("Assignee is not a participant of the organization")]
    AssigneeNotParticipant,

    /// The acting user left or was removed from the task's organization
    #[error("Actor is no longer a participant of the organization")]
    ActorNotParticipant,

    /// A referenced row is missing, e.g. the organization was deleted mid-request
    #[error("Referenced row does not exist: {0}")]
    MissingReference(String),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let code = db_err.code();
            let constraint = db_err.constraint().unwrap_or_default();

            match code.as_deref() {
                Some(POSTGRES_UNIQUE_VIOLATION) => {
                    return StoreError::UniqueViolation(UniqueConstraint::from_constraint_name(
                        constraint,
                    ));
                }
                Some(POSTGRES_FOREIGN_KEY_VIOLATION) => {
                    return StoreError::MissingReference(constraint.to_string());
                }
                _ => {}
            }
        }

        StoreError::Database(err)
    }
}

impl StoreError {
    /// True if this is a violation of `constraint`
    pub fn is_unique_violation_of(&self, constraint: &UniqueConstraint) -> bool {
        matches!(self, StoreError::UniqueViolation(c) if c == constraint)
    }
}

/// Persistence operations used by the core services
#[async_trait]
pub trait Store: Send + Sync {
    /// Verifies the backing store is reachable
    async fn ping(&self) -> StoreResult<()>;

    // Users

    async fn insert_user(&self, data: CreateUser) -> StoreResult<User>;

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn update_user(&self, id: Uuid, data: UpdateUser) -> StoreResult<Option<User>>;

    // Organizations

    /// Inserts the organization and records its invite code as issued
    async fn insert_organization(&self, data: CreateOrganization) -> StoreResult<Organization>;

    async fn find_organization(&self, id: Uuid) -> StoreResult<Option<Organization>>;

    async fn find_organization_by_invite_code(&self, code: &str)
        -> StoreResult<Option<Organization>>;

    /// Applies the update; a new invite code is recorded as issued
    async fn update_organization(
        &self,
        id: Uuid,
        data: UpdateOrganization,
    ) -> StoreResult<Option<Organization>>;

    /// Deletes the organization's tasks, then its memberships, then the row
    ///
    /// Returns false if the organization did not exist.
    async fn delete_organization(&self, id: Uuid) -> StoreResult<bool>;

    /// Organizations owned by the user (oldest first), then joined (join order)
    async fn list_organizations_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Organization>>;

    // Memberships

    async fn insert_membership(&self, org_id: Uuid, user_id: Uuid) -> StoreResult<Membership>;

    async fn find_membership(&self, org_id: Uuid, user_id: Uuid)
        -> StoreResult<Option<Membership>>;

    /// Members (excluding the owner) with profiles, in join order
    async fn list_members(&self, org_id: Uuid) -> StoreResult<Vec<Member>>;

    /// Deletes the membership row and unassigns the user's tasks in the org
    ///
    /// Returns `None` if there was no row, otherwise the number of tasks
    /// unassigned.
    async fn remove_membership(&self, org_id: Uuid, user_id: Uuid) -> StoreResult<Option<u64>>;

    // Tasks

    /// Inserts a task after re-checking the assignee's participation
    async fn insert_task(&self, data: CreateTask) -> StoreResult<Task>;

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>>;

    /// Tasks of an organization ordered by due date ascending
    async fn list_tasks(&self, org_id: Uuid, filter: &TaskFilter) -> StoreResult<Vec<Task>>;

    // The writes below re-check, in the same unit as the write, that `actor`
    // still owns or belongs to the task's organization, failing with
    // `ActorNotParticipant` otherwise. `None`/`false` means no such task.

    async fn update_task(&self, id: Uuid, data: UpdateTask, actor: Uuid)
        -> StoreResult<Option<Task>>;

    /// Sets or clears the assignee after re-checking participation
    async fn set_task_assignee(
        &self,
        id: Uuid,
        assignee: Option<Uuid>,
        actor: Uuid,
    ) -> StoreResult<Option<Task>>;

    async fn set_task_status(&self, id: Uuid, status: TaskStatus, actor: Uuid)
        -> StoreResult<Option<Task>>;

    async fn delete_task(&self, id: Uuid, actor: Uuid) -> StoreResult<bool>;

    /// Status counts over tasks assigned to the user
    async fn task_counts_for_assignee(&self, user_id: Uuid) -> StoreResult<StatusCounts>;

    /// Newest tasks the user created or is assigned, newest first
    async fn recent_tasks_for_user(&self, user_id: Uuid, limit: usize) -> StoreResult<Vec<Task>>;
}
