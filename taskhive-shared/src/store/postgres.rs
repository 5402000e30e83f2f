//! PostgreSQL store
//!
//! Single-statement methods run directly on the pool. Methods that touch more
//! than one row set open a transaction; dropping the transaction on an early
//! return rolls it back.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::db::pool::health_check;
use crate::models::{
    membership::{Member, Membership},
    organization::{reserve_invite_code, CreateOrganization, Organization, UpdateOrganization},
    task::{CreateTask, StatusCounts, Task, TaskFilter, TaskStatus, UpdateTask},
    user::{CreateUser, UpdateUser, User},
};

/// [`Store`] backed by a Postgres pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Locks the facts that make `user_id` a participant of `org_id`
///
/// Takes a shared lock on the organization row and, for non-owners, on the
/// membership row. A concurrent removal blocks until the caller's
/// transaction ends.
async fn lock_participation(
    conn: &mut PgConnection,
    org_id: Uuid,
    user_id: Uuid,
) -> StoreResult<bool> {
    let org = Organization::find_by_id_for_share(&mut *conn, org_id)
        .await?
        .ok_or_else(|| StoreError::MissingReference("organizations".to_string()))?;

    if org.owner_id == user_id {
        return Ok(true);
    }

    Ok(Membership::find_for_share(&mut *conn, org_id, user_id)
        .await?
        .is_some())
}

/// A removal that runs after the caller commits clears the assignment it made
async fn lock_assignee(conn: &mut PgConnection, org_id: Uuid, assignee: Uuid) -> StoreResult<()> {
    if lock_participation(conn, org_id, assignee).await? {
        Ok(())
    } else {
        Err(StoreError::AssigneeNotParticipant)
    }
}

/// Loads the task and locks `actor`'s participation in its organization
///
/// `None` if the task does not exist.
async fn lock_task_for_actor(
    conn: &mut PgConnection,
    task_id: Uuid,
    actor: Uuid,
) -> StoreResult<Option<Task>> {
    let Some(task) = Task::find_by_id(&mut *conn, task_id).await? else {
        return Ok(None);
    };

    if !lock_participation(conn, task.org_id, actor).await? {
        return Err(StoreError::ActorNotParticipant);
    }
    Ok(Some(task))
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        health_check(&self.pool).await?;
        Ok(())
    }

    async fn insert_user(&self, data: CreateUser) -> StoreResult<User> {
        Ok(User::create(&self.pool, data).await?)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn update_user(&self, id: Uuid, data: UpdateUser) -> StoreResult<Option<User>> {
        Ok(User::update(&self.pool, id, data).await?)
    }

    async fn insert_organization(&self, data: CreateOrganization) -> StoreResult<Organization> {
        let mut tx = self.pool.begin().await?;

        reserve_invite_code(&mut *tx, &data.invite_code).await?;
        let org = Organization::create(&mut *tx, data).await?;

        tx.commit().await?;
        Ok(org)
    }

    async fn find_organization(&self, id: Uuid) -> StoreResult<Option<Organization>> {
        Ok(Organization::find_by_id(&self.pool, id).await?)
    }

    async fn find_organization_by_invite_code(
        &self,
        code: &str,
    ) -> StoreResult<Option<Organization>> {
        Ok(Organization::find_by_invite_code(&self.pool, code).await?)
    }

    async fn update_organization(
        &self,
        id: Uuid,
        data: UpdateOrganization,
    ) -> StoreResult<Option<Organization>> {
        let mut tx = self.pool.begin().await?;

        if let Some(code) = data.invite_code.as_deref() {
            reserve_invite_code(&mut *tx, code).await?;
        }
        let org = Organization::update(&mut *tx, id, data).await?;

        tx.commit().await?;
        Ok(org)
    }

    async fn delete_organization(&self, id: Uuid) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        if Organization::find_by_id_for_update(&mut *tx, id).await?.is_none() {
            return Ok(false);
        }
        let tasks = Task::delete_by_organization(&mut *tx, id).await?;
        let memberships = Membership::delete_by_organization(&mut *tx, id).await?;
        let deleted = Organization::delete(&mut *tx, id).await?;

        tx.commit().await?;

        tracing::debug!(
            org_id = %id,
            tasks_deleted = tasks,
            memberships_deleted = memberships,
            "Organization cascade applied"
        );
        Ok(deleted)
    }

    async fn list_organizations_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Organization>> {
        let mut conn = self.pool.acquire().await?;

        let mut orgs = Organization::list_owned_by(&mut *conn, user_id).await?;
        orgs.extend(Organization::list_joined_by(&mut *conn, user_id).await?);

        Ok(orgs)
    }

    async fn insert_membership(&self, org_id: Uuid, user_id: Uuid) -> StoreResult<Membership> {
        Ok(Membership::create(&self.pool, org_id, user_id).await?)
    }

    async fn find_membership(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<Membership>> {
        Ok(Membership::find(&self.pool, org_id, user_id).await?)
    }

    async fn list_members(&self, org_id: Uuid) -> StoreResult<Vec<Member>> {
        Ok(Membership::list_members(&self.pool, org_id).await?)
    }

    async fn remove_membership(&self, org_id: Uuid, user_id: Uuid) -> StoreResult<Option<u64>> {
        let mut tx = self.pool.begin().await?;

        if !Membership::delete(&mut *tx, org_id, user_id).await? {
            return Ok(None);
        }
        let unassigned = Task::unassign_user(&mut *tx, org_id, user_id).await?;

        tx.commit().await?;
        Ok(Some(unassigned))
    }

    async fn insert_task(&self, data: CreateTask) -> StoreResult<Task> {
        let mut tx = self.pool.begin().await?;

        if let Some(assignee) = data.assigned_to {
            lock_assignee(&mut tx, data.org_id, assignee).await?;
        }
        let task = Task::create(&mut *tx, data).await?;

        tx.commit().await?;
        Ok(task)
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(Task::find_by_id(&self.pool, id).await?)
    }

    async fn list_tasks(&self, org_id: Uuid, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        Ok(Task::list_by_organization(&self.pool, org_id, filter).await?)
    }

    async fn update_task(
        &self,
        id: Uuid,
        data: UpdateTask,
        actor: Uuid,
    ) -> StoreResult<Option<Task>> {
        let mut tx = self.pool.begin().await?;

        if lock_task_for_actor(&mut tx, id, actor).await?.is_none() {
            return Ok(None);
        }
        let task = Task::update(&mut *tx, id, data).await?;

        tx.commit().await?;
        Ok(task)
    }

    async fn set_task_assignee(
        &self,
        id: Uuid,
        assignee: Option<Uuid>,
        actor: Uuid,
    ) -> StoreResult<Option<Task>> {
        let mut tx = self.pool.begin().await?;

        let Some(task) = lock_task_for_actor(&mut tx, id, actor).await? else {
            return Ok(None);
        };
        if let Some(assignee) = assignee {
            lock_assignee(&mut tx, task.org_id, assignee).await?;
        }
        let task = Task::set_assignee(&mut *tx, id, assignee).await?;

        tx.commit().await?;
        Ok(task)
    }

    async fn set_task_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        actor: Uuid,
    ) -> StoreResult<Option<Task>> {
        let mut tx = self.pool.begin().await?;

        if lock_task_for_actor(&mut tx, id, actor).await?.is_none() {
            return Ok(None);
        }
        let task = Task::set_status(&mut *tx, id, status).await?;

        tx.commit().await?;
        Ok(task)
    }

    async fn delete_task(&self, id: Uuid, actor: Uuid) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        if lock_task_for_actor(&mut tx, id, actor).await?.is_none() {
            return Ok(false);
        }
        let deleted = Task::delete(&mut *tx, id).await?;

        tx.commit().await?;
        Ok(deleted)
    }

    async fn task_counts_for_assignee(&self, user_id: Uuid) -> StoreResult<StatusCounts> {
        Ok(Task::status_counts_for_assignee(&self.pool, user_id).await?)
    }

    async fn recent_tasks_for_user(&self, user_id: Uuid, limit: usize) -> StoreResult<Vec<Task>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(Task::recent_for_user(&self.pool, user_id, limit).await?)
    }
}
