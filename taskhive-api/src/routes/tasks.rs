/// Task endpoints
///
/// - `POST /v1/tasks`
/// - `GET /v1/organizations/:org_id/tasks?status=&assigned_to=`
/// - `GET|PUT|DELETE /v1/tasks/:task_id`
/// - `POST /v1/tasks/:task_id/assign`
/// - `PATCH /v1/tasks/:task_id/status`
///
/// `due_at` accepts an RFC 3339 timestamp or a `YYYY-MM-DD` date, read as
/// midnight UTC.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use taskhive_shared::{
    models::{
        double_option,
        task::{Task, UpdateTask},
    },
    services::tasks::{parse_status, AssigneeFilter, NewTask, TaskQuery},
};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::auth::AuthContext,
};

/// Parses a due date from the wire
pub fn parse_due_at(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    let raw = raw.trim();

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
        .map_err(|_| {
            ApiError::bad_request(format!(
                "Invalid due date '{raw}': expected RFC 3339 or YYYY-MM-DD"
            ))
        })
}

/// Create request
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(alias = "orgId")]
    pub org_id: Uuid,
    #[serde(alias = "dueAt")]
    pub due_at: String,
    pub description: Option<String>,
    #[serde(alias = "assignedTo")]
    pub assigned_to: Option<Uuid>,
}

/// Partial update request
///
/// `"description": null` clears the description.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,

    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub description: Option<Option<String>>,

    #[serde(alias = "dueAt")]
    pub due_at: Option<String>,
}

/// Assignment request; `null` or omitted unassigns
#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    #[serde(default, alias = "assignedTo", alias = "user_id")]
    pub assigned_to: Option<Uuid>,
}

/// Status change request
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

/// Query string for listing tasks
#[derive(Debug, Default, Deserialize)]
pub struct ListTasksParams {
    pub status: Option<String>,
    /// `me`, `unassigned` or a user id
    pub assigned_to: Option<String>,
}

impl ListTasksParams {
    fn into_query(self) -> ApiResult<TaskQuery> {
        let status = self.status.as_deref().map(parse_status).transpose()?;
        let assigned_to = self
            .assigned_to
            .as_deref()
            .map(str::parse::<AssigneeFilter>)
            .transpose()?;

        Ok(TaskQuery {
            status,
            assigned_to,
        })
    }
}

/// Creates a pending task in an organization the caller participates in
///
/// # Errors
///
/// - `400 Bad Request`: Blank title, bad due date, or assignee not a participant
/// - `403 Forbidden`: Caller is not a participant
/// - `404 Not Found`: Organization does not exist
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let Json(req) = payload?;

    let task = state
        .services
        .tasks
        .create(
            NewTask {
                org_id: req.org_id,
                title: req.title,
                due_at: parse_due_at(&req.due_at)?,
                description: req.description,
                assigned_to: req.assigned_to,
            },
            auth.user_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(task)))
}

/// Tasks of an organization, earliest due first
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    path: Result<Path<Uuid>, PathRejection>,
    params: Result<Query<ListTasksParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Task>>> {
    let Path(org_id) = path?;
    let Query(params) = params?;

    let tasks = state
        .services
        .tasks
        .list(org_id, params.into_query()?, auth.user_id)
        .await?;

    Ok(Json(tasks))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Task>> {
    let Path(task_id) = path?;

    Ok(Json(state.services.tasks.get(task_id, auth.user_id).await?))
}

/// Updates title, description or due date (owner or creator)
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> ApiResult<Json<Task>> {
    let Path(task_id) = path?;
    let Json(req) = payload?;

    let patch = UpdateTask {
        title: req.title,
        description: req.description,
        due_at: req.due_at.as_deref().map(parse_due_at).transpose()?,
    };

    let task = state
        .services
        .tasks
        .update_fields(task_id, patch, auth.user_id)
        .await?;

    Ok(Json(task))
}

/// Sets or clears the assignee (owner or creator)
pub async fn assign_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<AssignRequest>, JsonRejection>,
) -> ApiResult<Json<Task>> {
    let Path(task_id) = path?;
    let Json(req) = payload?;

    let task = state
        .services
        .tasks
        .assign(task_id, req.assigned_to, auth.user_id)
        .await?;

    Ok(Json(task))
}

/// Changes status (owner, creator or assignee)
pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<Json<Task>> {
    let Path(task_id) = path?;
    let Json(req) = payload?;

    let task = state
        .services
        .tasks
        .set_status(task_id, parse_status(&req.status)?, auth.user_id)
        .await?;

    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(task_id) = path?;

    state.services.tasks.delete(task_id, auth.user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_due_at() {
        let date = parse_due_at("2025-06-01").unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());

        let timestamp = parse_due_at("2025-06-01T12:30:00+02:00").unwrap();
        assert_eq!(timestamp, Utc.with_ymd_and_hms(2025, 6, 1, 10, 30, 0).unwrap());

        assert!(parse_due_at("June 1st").is_err());
        assert!(parse_due_at("2025-13-01").is_err());
    }

    #[test]
    fn test_list_params() {
        let query = ListTasksParams {
            status: Some("in-progress".to_string()),
            assigned_to: Some("me".to_string()),
        }
        .into_query()
        .unwrap();
        assert_eq!(
            query.status,
            Some(taskhive_shared::models::task::TaskStatus::InProgress)
        );
        assert_eq!(query.assigned_to, Some(AssigneeFilter::Me));

        let bad = ListTasksParams {
            status: Some("done".to_string()),
            assigned_to: None,
        };
        assert!(bad.into_query().is_err());
    }
}
