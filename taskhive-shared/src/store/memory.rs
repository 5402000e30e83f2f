//! In-memory store
//!
//! All relations sit behind one [`RwLock`], and every mutating method holds
//! the write guard for its whole body, which makes each call atomic. It
//! enforces the same constraints as the Postgres schema and backs the test
//! suites.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult, UniqueConstraint};
use crate::models::{
    membership::{Member, Membership},
    organization::{CreateOrganization, Organization, UpdateOrganization},
    task::{CreateTask, StatusCounts, Task, TaskFilter, TaskStatus, UpdateTask},
    user::{CreateUser, UpdateUser, User, UserProfile},
};

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    /// Creation order
    organizations: Vec<Organization>,
    issued_invite_codes: HashSet<String>,
    /// Join order
    memberships: Vec<Membership>,
    /// Creation order
    tasks: Vec<Task>,
}

impl State {
    fn organization(&self, id: Uuid) -> Option<&Organization> {
        self.organizations.iter().find(|o| o.id == id)
    }

    fn has_membership(&self, org_id: Uuid, user_id: Uuid) -> bool {
        self.memberships
            .iter()
            .any(|m| m.org_id == org_id && m.user_id == user_id)
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn is_participant(&self, org_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let org = self
            .organization(org_id)
            .ok_or_else(|| StoreError::MissingReference("organizations".to_string()))?;

        Ok(org.owner_id == user_id || self.has_membership(org_id, user_id))
    }

    fn check_assignee(&self, org_id: Uuid, assignee: Uuid) -> StoreResult<()> {
        if self.is_participant(org_id, assignee)? {
            Ok(())
        } else {
            Err(StoreError::AssigneeNotParticipant)
        }
    }

    /// Organization of the task, once `actor` is confirmed as a participant
    fn task_org_for_actor(&self, task_id: Uuid, actor: Uuid) -> StoreResult<Option<Uuid>> {
        let Some(org_id) = self.tasks.iter().find(|t| t.id == task_id).map(|t| t.org_id) else {
            return Ok(None);
        };

        if self.is_participant(org_id, actor)? {
            Ok(Some(org_id))
        } else {
            Err(StoreError::ActorNotParticipant)
        }
    }

    fn task_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }
}

/// [`Store`] kept entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of membership rows, across all organizations
    pub async fn membership_count(&self) -> usize {
        self.state.read().await.memberships.len()
    }

    /// Number of tasks, across all organizations
    pub async fn task_count(&self) -> usize {
        self.state.read().await.tasks.len()
    }

    /// Every invite code ever issued
    pub async fn issued_invite_codes(&self) -> HashSet<String> {
        self.state.read().await.issued_invite_codes.clone()
    }

    /// Snapshot of all membership rows
    pub async fn memberships(&self) -> Vec<Membership> {
        self.state.read().await.memberships.clone()
    }

    /// Snapshot of all organizations
    pub async fn organizations(&self) -> Vec<Organization> {
        self.state.read().await.organizations.clone()
    }

    /// Snapshot of all tasks
    pub async fn tasks(&self) -> Vec<Task> {
        self.state.read().await.tasks.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert_user(&self, data: CreateUser) -> StoreResult<User> {
        let mut state = self.state.write().await;

        if state.email_taken(&data.email, None) {
            return Err(StoreError::UniqueViolation(UniqueConstraint::UserEmail));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            full_name: data.full_name,
            email: data.email,
            password_hash: data.password_hash,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: Uuid, data: UpdateUser) -> StoreResult<Option<User>> {
        let mut state = self.state.write().await;

        if let Some(email) = data.email.as_deref() {
            if state.email_taken(email, Some(id)) {
                return Err(StoreError::UniqueViolation(UniqueConstraint::UserEmail));
            }
        }

        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(full_name) = data.full_name {
            user.full_name = full_name;
        }
        if let Some(email) = data.email {
            user.email = email;
        }
        if let Some(password_hash) = data.password_hash {
            user.password_hash = password_hash;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn insert_organization(&self, data: CreateOrganization) -> StoreResult<Organization> {
        let mut state = self.state.write().await;

        if !state.users.contains_key(&data.owner_id) {
            return Err(StoreError::MissingReference("users".to_string()));
        }
        if state.issued_invite_codes.contains(&data.invite_code) {
            return Err(StoreError::UniqueViolation(UniqueConstraint::InviteCode));
        }

        let now = Utc::now();
        let org = Organization {
            id: Uuid::new_v4(),
            name: data.name,
            description: data.description,
            invite_code: data.invite_code,
            owner_id: data.owner_id,
            created_at: now,
            updated_at: now,
        };
        state.issued_invite_codes.insert(org.invite_code.clone());
        state.organizations.push(org.clone());

        Ok(org)
    }

    async fn find_organization(&self, id: Uuid) -> StoreResult<Option<Organization>> {
        Ok(self.state.read().await.organization(id).cloned())
    }

    async fn find_organization_by_invite_code(
        &self,
        code: &str,
    ) -> StoreResult<Option<Organization>> {
        let state = self.state.read().await;
        Ok(state
            .organizations
            .iter()
            .find(|o| o.invite_code == code)
            .cloned())
    }

    async fn update_organization(
        &self,
        id: Uuid,
        data: UpdateOrganization,
    ) -> StoreResult<Option<Organization>> {
        let mut state = self.state.write().await;

        if let Some(code) = data.invite_code.as_deref() {
            if state.issued_invite_codes.contains(code) {
                return Err(StoreError::UniqueViolation(UniqueConstraint::InviteCode));
            }
        }

        let Some(index) = state.organizations.iter().position(|o| o.id == id) else {
            return Ok(None);
        };

        if let Some(code) = data.invite_code.as_ref() {
            state.issued_invite_codes.insert(code.clone());
        }

        let org = &mut state.organizations[index];
        if let Some(name) = data.name {
            org.name = name;
        }
        if let Some(description) = data.description {
            org.description = description;
        }
        if let Some(code) = data.invite_code {
            org.invite_code = code;
        }
        org.updated_at = Utc::now();

        Ok(Some(org.clone()))
    }

    async fn delete_organization(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.write().await;

        state.tasks.retain(|t| t.org_id != id);
        state.memberships.retain(|m| m.org_id != id);

        let before = state.organizations.len();
        state.organizations.retain(|o| o.id != id);

        Ok(state.organizations.len() < before)
    }

    async fn list_organizations_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Organization>> {
        let state = self.state.read().await;

        let owned = state
            .organizations
            .iter()
            .filter(|o| o.owner_id == user_id)
            .cloned();
        let joined = state
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| state.organization(m.org_id).cloned());

        Ok(owned.chain(joined).collect())
    }

    async fn insert_membership(&self, org_id: Uuid, user_id: Uuid) -> StoreResult<Membership> {
        let mut state = self.state.write().await;

        if state.organization(org_id).is_none() {
            return Err(StoreError::MissingReference("organizations".to_string()));
        }
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::MissingReference("users".to_string()));
        }
        if state.has_membership(org_id, user_id) {
            return Err(StoreError::UniqueViolation(UniqueConstraint::Membership));
        }

        let membership = Membership {
            org_id,
            user_id,
            joined_at: Utc::now(),
        };
        state.memberships.push(membership.clone());

        Ok(membership)
    }

    async fn find_membership(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<Membership>> {
        let state = self.state.read().await;
        Ok(state
            .memberships
            .iter()
            .find(|m| m.org_id == org_id && m.user_id == user_id)
            .cloned())
    }

    async fn list_members(&self, org_id: Uuid) -> StoreResult<Vec<Member>> {
        let state = self.state.read().await;

        Ok(state
            .memberships
            .iter()
            .filter(|m| m.org_id == org_id)
            .filter_map(|m| {
                state.users.get(&m.user_id).map(|user| Member {
                    user: UserProfile::from(user),
                    joined_at: m.joined_at,
                    is_owner: false,
                })
            })
            .collect())
    }

    async fn remove_membership(&self, org_id: Uuid, user_id: Uuid) -> StoreResult<Option<u64>> {
        let mut state = self.state.write().await;

        let before = state.memberships.len();
        state
            .memberships
            .retain(|m| !(m.org_id == org_id && m.user_id == user_id));
        if state.memberships.len() == before {
            return Ok(None);
        }

        let now = Utc::now();
        let mut unassigned = 0;
        for task in state
            .tasks
            .iter_mut()
            .filter(|t| t.org_id == org_id && t.assigned_to == Some(user_id))
        {
            task.assigned_to = None;
            task.updated_at = now;
            unassigned += 1;
        }

        Ok(Some(unassigned))
    }

    async fn insert_task(&self, data: CreateTask) -> StoreResult<Task> {
        let mut state = self.state.write().await;

        if state.organization(data.org_id).is_none() {
            return Err(StoreError::MissingReference("organizations".to_string()));
        }
        if let Some(assignee) = data.assigned_to {
            state.check_assignee(data.org_id, assignee)?;
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            org_id: data.org_id,
            title: data.title,
            description: data.description,
            created_by: data.created_by,
            assigned_to: data.assigned_to,
            status: TaskStatus::Pending,
            due_at: data.due_at,
            created_at: now,
            updated_at: now,
        };
        state.tasks.push(task.clone());

        Ok(task)
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let state = self.state.read().await;
        Ok(state.tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tasks(&self, org_id: Uuid, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        let state = self.state.read().await;

        let mut tasks: Vec<Task> = state
            .tasks
            .iter()
            .filter(|t| t.org_id == org_id && filter.matches(t))
            .cloned()
            .collect();
        // Stable sort keeps creation order among equal due dates
        tasks.sort_by_key(|t| t.due_at);

        Ok(tasks)
    }

    async fn update_task(
        &self,
        id: Uuid,
        data: UpdateTask,
        actor: Uuid,
    ) -> StoreResult<Option<Task>> {
        let mut state = self.state.write().await;

        if state.task_org_for_actor(id, actor)?.is_none() {
            return Ok(None);
        }
        let Some(task) = state.task_mut(id) else {
            return Ok(None);
        };
        if let Some(title) = data.title {
            task.title = title;
        }
        if let Some(description) = data.description {
            task.description = description;
        }
        if let Some(due_at) = data.due_at {
            task.due_at = due_at;
        }
        task.updated_at = Utc::now();

        Ok(Some(task.clone()))
    }

    async fn set_task_assignee(
        &self,
        id: Uuid,
        assignee: Option<Uuid>,
        actor: Uuid,
    ) -> StoreResult<Option<Task>> {
        let mut state = self.state.write().await;

        let Some(org_id) = state.task_org_for_actor(id, actor)? else {
            return Ok(None);
        };
        if let Some(assignee) = assignee {
            state.check_assignee(org_id, assignee)?;
        }

        let Some(task) = state.task_mut(id) else {
            return Ok(None);
        };
        task.assigned_to = assignee;
        task.updated_at = Utc::now();

        Ok(Some(task.clone()))
    }

    async fn set_task_status(
        &self,
        id: Uuid,
        status: TaskStatus,
        actor: Uuid,
    ) -> StoreResult<Option<Task>> {
        let mut state = self.state.write().await;

        if state.task_org_for_actor(id, actor)?.is_none() {
            return Ok(None);
        }
        let Some(task) = state.task_mut(id) else {
            return Ok(None);
        };
        task.status = status;
        task.updated_at = Utc::now();

        Ok(Some(task.clone()))
    }

    async fn delete_task(&self, id: Uuid, actor: Uuid) -> StoreResult<bool> {
        let mut state = self.state.write().await;

        if state.task_org_for_actor(id, actor)?.is_none() {
            return Ok(false);
        }
        let before = state.tasks.len();
        state.tasks.retain(|t| t.id != id);

        Ok(state.tasks.len() < before)
    }

    async fn task_counts_for_assignee(&self, user_id: Uuid) -> StoreResult<StatusCounts> {
        let state = self.state.read().await;

        let mut counts = StatusCounts::default();
        for task in state.tasks.iter().filter(|t| t.assigned_to == Some(user_id)) {
            counts.record(task.status);
        }

        Ok(counts)
    }

    async fn recent_tasks_for_user(&self, user_id: Uuid, limit: usize) -> StoreResult<Vec<Task>> {
        let state = self.state.read().await;

        Ok(state
            .tasks
            .iter()
            .rev()
            .filter(|t| t.created_by == user_id || t.assigned_to == Some(user_id))
            .take(limit)
            .cloned()
            .collect())
    }
}
