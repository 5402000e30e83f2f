//! Task model and database operations
//!
//! Tasks belong to one organization. `created_by` is fixed at creation;
//! `assigned_to`, when set, always names a participant of the organization.
//!
//! # Status
//!
//! ```text
//! pending ⇄ in_progress ⇄ completed
//! ```
//!
//! Any status may be set from any other; there is no enforced order.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE task_status AS ENUM ('pending', 'in_progress', 'completed');
//!
//! CREATE TABLE tasks (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     org_id UUID NOT NULL REFERENCES organizations(id),
//!     title VARCHAR(255) NOT NULL,
//!     description TEXT,
//!     created_by UUID NOT NULL REFERENCES users(id),
//!     assigned_to UUID REFERENCES users(id),
//!     status task_status NOT NULL DEFAULT 'pending',
//!     due_at TIMESTAMPTZ NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

const TASK_COLUMNS: &str =
    "id, org_id, title, description, created_by, assigned_to, status, due_at, created_at, updated_at";

/// Task progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started; the initial status
    Pending,

    /// Being worked on
    #[serde(alias = "in-progress")]
    InProgress,

    /// Done
    Completed,
}

impl TaskStatus {
    /// Every status, in workflow order
    pub const ALL: [TaskStatus; 3] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
    ];

    /// Wire and database spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid status '{0}': expected one of pending, in_progress, completed")]
pub struct ParseTaskStatusError(pub String);

impl FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" | "in-progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(ParseTaskStatusError(other.to_string())),
        }
    }
}

/// A task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,

    /// Owning organization
    pub org_id: Uuid,

    pub title: String,
    pub description: Option<String>,

    /// User who created the task
    pub created_by: Uuid,

    /// Current assignee, if any
    pub assigned_to: Option<Uuid>,

    pub status: TaskStatus,
    pub due_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task; status starts as pending
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub org_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub due_at: DateTime<Utc>,
}

/// Partial update of a task's descriptive fields
///
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub due_at: Option<DateTime<Utc>>,
}

impl UpdateTask {
    /// True when no field would change
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.due_at.is_none()
    }
}

/// Row filter for listing an organization's tasks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Only tasks with this status
    pub status: Option<TaskStatus>,

    /// `Some(None)` selects unassigned tasks, `Some(Some(id))` tasks assigned to `id`
    pub assigned_to: Option<Option<Uuid>>,
}

impl TaskFilter {
    /// Checks a task against this filter
    pub fn matches(&self, task: &Task) -> bool {
        self.status.map_or(true, |s| task.status == s)
            && self.assigned_to.map_or(true, |a| task.assigned_to == a)
    }
}

/// Task counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StatusCounts {
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
}

impl StatusCounts {
    /// Adds one task with `status`
    pub fn record(&mut self, status: TaskStatus) {
        self.total += 1;
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::InProgress => self.in_progress += 1,
            TaskStatus::Completed => self.completed += 1,
        }
    }
}

impl Task {
    /// Inserts a new task with status pending
    pub async fn create<'e, E>(executor: E, data: CreateTask) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            INSERT INTO tasks (org_id, title, description, created_by, assigned_to, due_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(data.org_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.created_by)
        .bind(data.assigned_to)
        .bind(data.due_at)
        .fetch_one(executor)
        .await?;

        Ok(task)
    }

    /// Finds a task by ID
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let task = sqlx::query_as::<_, Task>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(task)
    }

    /// Lists an organization's tasks by due date, earliest first
    pub async fn list_by_organization<'e, E>(
        executor: E,
        org_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE org_id = $1");
        let mut bind_count = 1;

        if filter.status.is_some() {
            bind_count += 1;
            query.push_str(&format!(" AND status = ${}", bind_count));
        }
        match filter.assigned_to {
            Some(None) => query.push_str(" AND assigned_to IS NULL"),
            Some(Some(_)) => {
                bind_count += 1;
                query.push_str(&format!(" AND assigned_to = ${}", bind_count));
            }
            None => {}
        }

        query.push_str(" ORDER BY due_at ASC, created_at ASC");

        let mut q = sqlx::query_as::<_, Task>(&query).bind(org_id);

        if let Some(status) = filter.status {
            q = q.bind(status);
        }
        if let Some(Some(assignee)) = filter.assigned_to {
            q = q.bind(assignee);
        }

        let tasks = q.fetch_all(executor).await?;

        Ok(tasks)
    }

    /// Applies a partial update to title, description and due date
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateTask,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut query = String::from("UPDATE tasks SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.title.is_some() {
            bind_count += 1;
            query.push_str(&format!(", title = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if data.due_at.is_some() {
            bind_count += 1;
            query.push_str(&format!(", due_at = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {TASK_COLUMNS}"));

        let mut q = sqlx::query_as::<_, Task>(&query).bind(id);

        if let Some(title) = data.title {
            q = q.bind(title);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(due_at) = data.due_at {
            q = q.bind(due_at);
        }

        let task = q.fetch_optional(executor).await?;

        Ok(task)
    }

    /// Sets or clears the assignee
    pub async fn set_assignee<'e, E>(
        executor: E,
        id: Uuid,
        assignee: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let task = sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks SET assigned_to = $2, updated_at = NOW() WHERE id = $1 RETURNING {TASK_COLUMNS}"
        ))
        .bind(id)
        .bind(assignee)
        .fetch_optional(executor)
        .await?;

        Ok(task)
    }

    /// Sets the status
    pub async fn set_status<'e, E>(
        executor: E,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let task = sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {TASK_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(executor)
        .await?;

        Ok(task)
    }

    /// Clears `assigned_to` on every task of `org_id` assigned to `user_id`
    ///
    /// Returns the number of tasks unassigned.
    pub async fn unassign_user<'e, E>(
        executor: E,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE tasks SET assigned_to = NULL, updated_at = NOW() WHERE org_id = $1 AND assigned_to = $2",
        )
        .bind(org_id)
        .bind(user_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Deletes a task
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes every task of an organization
    pub async fn delete_by_organization<'e, E>(executor: E, org_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM tasks WHERE org_id = $1")
            .bind(org_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    /// Counts tasks assigned to `user_id` across all organizations, by status
    pub async fn status_counts_for_assignee<'e, E>(
        executor: E,
        user_id: Uuid,
    ) -> Result<StatusCounts, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let counts = sqlx::query_as::<_, StatusCounts>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'in_progress') AS in_progress,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed
            FROM tasks
            WHERE assigned_to = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(executor)
        .await?;

        Ok(counts)
    }

    /// Most recently created tasks that `user_id` created or is assigned
    pub async fn recent_for_user<'e, E>(
        executor: E,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let tasks = sqlx::query_as::<_, Task>(&format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM tasks
            WHERE created_by = $1 OR assigned_to = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(executor)
        .await?;

        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_with(status: TaskStatus, assigned_to: Option<Uuid>) -> Task {
        Task {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            title: "Fix bug".to_string(),
            description: None,
            created_by: Uuid::new_v4(),
            assigned_to,
            status,
            due_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("pending".parse::<TaskStatus>(), Ok(TaskStatus::Pending));
        assert_eq!("in_progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
        assert_eq!("in-progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
        assert_eq!("completed".parse::<TaskStatus>(), Ok(TaskStatus::Completed));
        assert!("done".parse::<TaskStatus>().is_err());
        assert!("Pending".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(serde_json::to_string(&TaskStatus::InProgress).unwrap(), "\"in_progress\"");
        let parsed: TaskStatus = serde_json::from_str("\"in-progress\"").unwrap();
        assert_eq!(parsed, TaskStatus::InProgress);
        assert!(serde_json::from_str::<TaskStatus>("\"archived\"").is_err());
    }

    #[test]
    fn test_status_display_matches_parse() {
        for status in TaskStatus::ALL {
            assert_eq!(status.to_string().parse::<TaskStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_filter_matches() {
        let bob = Uuid::new_v4();
        let assigned = task_with(TaskStatus::Pending, Some(bob));
        let unassigned = task_with(TaskStatus::Completed, None);

        let any = TaskFilter::default();
        assert!(any.matches(&assigned) && any.matches(&unassigned));

        let only_unassigned = TaskFilter {
            assigned_to: Some(None),
            ..Default::default()
        };
        assert!(!only_unassigned.matches(&assigned));
        assert!(only_unassigned.matches(&unassigned));

        let bobs_pending = TaskFilter {
            status: Some(TaskStatus::Pending),
            assigned_to: Some(Some(bob)),
        };
        assert!(bobs_pending.matches(&assigned));
        assert!(!bobs_pending.matches(&unassigned));
    }

    #[test]
    fn test_status_counts_record() {
        let mut counts = StatusCounts::default();
        counts.record(TaskStatus::Pending);
        counts.record(TaskStatus::InProgress);
        counts.record(TaskStatus::InProgress);
        assert_eq!(
            counts,
            StatusCounts {
                total: 3,
                pending: 1,
                in_progress: 2,
                completed: 0
            }
        );
    }
}
