//! Task Store
//!
//! CRUD plus status and assignment transitions, each gated by the access
//! policy. Assignee participation is checked here for a clear error and
//! again by the store in the same unit as the write.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::memberships::MembershipLedger;
use super::required_text;
use crate::auth::policy::{authorize, require_assignable, Action, Participation};
use crate::error::{CoreError, CoreResult};
use crate::models::organization::Organization;
use crate::models::task::{CreateTask, Task, TaskFilter, TaskStatus, UpdateTask};
use crate::store::SharedStore;

/// Parses a wire status, failing with `InvalidInput`
pub fn parse_status(status: &str) -> CoreResult<TaskStatus> {
    Ok(status.parse::<TaskStatus>()?)
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub org_id: Uuid,
    pub title: String,
    pub due_at: DateTime<Utc>,
    pub description: Option<String>,
    pub assigned_to: Option<Uuid>,
}

/// Assignee selector for listing tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssigneeFilter {
    /// Tasks assigned to the requester
    Me,
    /// Tasks with no assignee
    Unassigned,
    /// Tasks assigned to a specific user
    User(Uuid),
}

impl FromStr for AssigneeFilter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "me" => Ok(AssigneeFilter::Me),
            "unassigned" => Ok(AssigneeFilter::Unassigned),
            other => Uuid::parse_str(other).map(AssigneeFilter::User).map_err(|_| {
                CoreError::InvalidInput(format!(
                    "Invalid assignee filter '{other}': expected me, unassigned or a user id"
                ))
            }),
        }
    }
}

/// Filters for [`TaskService::list`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<AssigneeFilter>,
}

impl TaskQuery {
    fn resolve(self, requester: Uuid) -> TaskFilter {
        TaskFilter {
            status: self.status,
            assigned_to: self.assigned_to.map(|a| match a {
                AssigneeFilter::Me => Some(requester),
                AssigneeFilter::Unassigned => None,
                AssigneeFilter::User(id) => Some(id),
            }),
        }
    }
}

fn clean_title(title: &str) -> CoreResult<String> {
    required_text("Title", title)
}

fn clean_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

/// Task lifecycle operations
#[derive(Clone)]
pub struct TaskService {
    store: SharedStore,
    ledger: MembershipLedger,
}

impl TaskService {
    pub fn new(store: SharedStore, ledger: MembershipLedger) -> Self {
        Self { store, ledger }
    }

    /// Loads a task with its organization and the requester's participation
    async fn load(&self, task_id: Uuid, requester: Uuid) -> CoreResult<(Task, Participation)> {
        let task = self
            .store
            .find_task(task_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Task not found".to_string()))?;
        let (_, actor) = self.ledger.participation_in(task.org_id, requester).await?;

        Ok((task, actor))
    }

    async fn check_assignee(&self, org: &Organization, assignee: Uuid) -> CoreResult<()> {
        let candidate = self.ledger.participation(org, assignee).await?;
        Ok(require_assignable(&candidate)?)
    }

    /// Creates a pending task in `input.org_id`
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the title is blank
    /// - `NotFound` if the organization does not exist
    /// - `Forbidden` if `requester` is not a participant
    /// - `InvalidAssignee` if the assignee is not a participant
    pub async fn create(&self, input: NewTask, requester: Uuid) -> CoreResult<Task> {
        let title = clean_title(&input.title)?;

        let (org, actor) = self.ledger.participation_in(input.org_id, requester).await?;
        authorize(&actor, Action::CreateTask)?;

        if let Some(assignee) = input.assigned_to {
            self.check_assignee(&org, assignee).await?;
        }

        let task = self
            .store
            .insert_task(CreateTask {
                org_id: org.id,
                title,
                description: clean_description(input.description),
                created_by: requester,
                assigned_to: input.assigned_to,
                due_at: input.due_at,
            })
            .await?;

        tracing::info!(task_id = %task.id, org_id = %task.org_id, "Task created");
        Ok(task)
    }

    /// Reads a task the requester may view
    pub async fn get(&self, task_id: Uuid, requester: Uuid) -> CoreResult<Task> {
        let (task, actor) = self.load(task_id, requester).await?;
        authorize(&actor, Action::ViewTask)?;

        Ok(task)
    }

    /// Lists an organization's tasks by due date, earliest first
    pub async fn list(&self, org_id: Uuid, query: TaskQuery, requester: Uuid) -> CoreResult<Vec<Task>> {
        let (_, actor) = self.ledger.participation_in(org_id, requester).await?;
        authorize(&actor, Action::ViewTask)?;

        Ok(self.store.list_tasks(org_id, &query.resolve(requester)).await?)
    }

    /// Partially updates title, description and due date
    ///
    /// An empty patch returns the task unchanged.
    pub async fn update_fields(
        &self,
        task_id: Uuid,
        patch: UpdateTask,
        requester: Uuid,
    ) -> CoreResult<Task> {
        let (task, actor) = self.load(task_id, requester).await?;
        authorize(
            &actor,
            Action::ModifyTask {
                created_by: task.created_by,
            },
        )?;

        if patch.is_empty() {
            return Ok(task);
        }

        let patch = UpdateTask {
            title: patch.title.as_deref().map(clean_title).transpose()?,
            description: patch.description.map(clean_description),
            due_at: patch.due_at,
        };

        let updated = self
            .store
            .update_task(task_id, patch, requester)
            .await?
            .ok_or_else(|| CoreError::NotFound("Task not found".to_string()))?;

        tracing::info!(task_id = %task_id, "Task updated");
        Ok(updated)
    }

    /// Sets or clears the assignee
    pub async fn assign(
        &self,
        task_id: Uuid,
        assignee: Option<Uuid>,
        requester: Uuid,
    ) -> CoreResult<Task> {
        let task = self
            .store
            .find_task(task_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Task not found".to_string()))?;
        let (org, actor) = self.ledger.participation_in(task.org_id, requester).await?;
        authorize(
            &actor,
            Action::ModifyTask {
                created_by: task.created_by,
            },
        )?;

        if let Some(assignee) = assignee {
            self.check_assignee(&org, assignee).await?;
        }

        let updated = self
            .store
            .set_task_assignee(task_id, assignee, requester)
            .await?
            .ok_or_else(|| CoreError::NotFound("Task not found".to_string()))?;

        tracing::info!(
            task_id = %task_id,
            assigned_to = ?assignee,
            "Task assignment changed"
        );
        Ok(updated)
    }

    /// Moves a task to `status`
    pub async fn set_status(
        &self,
        task_id: Uuid,
        status: TaskStatus,
        requester: Uuid,
    ) -> CoreResult<Task> {
        let (task, actor) = self.load(task_id, requester).await?;
        authorize(
            &actor,
            Action::ChangeTaskStatus {
                created_by: task.created_by,
                assigned_to: task.assigned_to,
            },
        )?;

        let updated = self
            .store
            .set_task_status(task_id, status, requester)
            .await?
            .ok_or_else(|| CoreError::NotFound("Task not found".to_string()))?;

        tracing::info!(task_id = %task_id, status = %status, "Task status changed");
        Ok(updated)
    }

    /// Deletes a task
    pub async fn delete(&self, task_id: Uuid, requester: Uuid) -> CoreResult<()> {
        let (task, actor) = self.load(task_id, requester).await?;
        authorize(
            &actor,
            Action::ModifyTask {
                created_by: task.created_by,
            },
        )?;

        if !self.store.delete_task(task_id, requester).await? {
            return Err(CoreError::NotFound("Task not found".to_string()));
        }

        tracing::info!(task_id = %task_id, "Task deleted");
        Ok(())
    }
}
