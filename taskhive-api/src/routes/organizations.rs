/// Organization endpoints
///
/// - `POST /v1/organizations` - Create (caller becomes owner)
/// - `GET /v1/organizations` - Owned and joined organizations
/// - `POST /v1/organizations/join` - Join by invite code
/// - `GET|PUT|DELETE /v1/organizations/:org_id`
/// - `GET /v1/organizations/:org_id/members`
/// - `DELETE /v1/organizations/:org_id/members/:user_id` - Owner removes a member
/// - `POST /v1/organizations/:org_id/leave`

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use taskhive_shared::{
    models::{double_option, membership::Member, organization::OrganizationView},
    services::organizations::{NewOrganization, OrganizationPatch},
};
use uuid::Uuid;

use crate::{app::AppState, error::ApiResult, middleware::auth::AuthContext};

/// Join request
#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    #[serde(alias = "invite_code", alias = "inviteCode")]
    pub code: String,
}

/// Update request
///
/// `"description": null` clears the description; omitting it leaves it.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateOrganizationRequest {
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub description: Option<Option<String>>,

    #[serde(default, alias = "refreshInviteCode")]
    pub refresh_invite_code: bool,
}

impl From<UpdateOrganizationRequest> for OrganizationPatch {
    fn from(req: UpdateOrganizationRequest) -> Self {
        OrganizationPatch {
            name: req.name,
            description: req.description,
            refresh_invite_code: req.refresh_invite_code,
        }
    }
}

/// Creates an organization owned by the caller
///
/// # Errors
///
/// - `400 Bad Request`: Empty name
/// - `503 Service Unavailable`: No unique invite code could be minted
pub async fn create_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<NewOrganization>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<OrganizationView>)> {
    let Json(input) = payload?;

    let org = state
        .services
        .organizations
        .create(auth.user_id, input)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrganizationView::for_viewer(org, auth.user_id)),
    ))
}

pub async fn list_organizations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<OrganizationView>>> {
    Ok(Json(
        state
            .services
            .organizations
            .list_for_user(auth.user_id)
            .await?,
    ))
}

/// Joins the organization holding the invite code
///
/// # Errors
///
/// - `400 Bad Request`: Blank code, or already a participant
/// - `404 Not Found`: No organization holds the code
pub async fn join_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<JoinRequest>, JsonRejection>,
) -> ApiResult<Json<OrganizationView>> {
    let Json(req) = payload?;

    let view = state
        .services
        .organizations
        .join(&req.code, auth.user_id)
        .await?;

    Ok(Json(view))
}

pub async fn get_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<OrganizationView>> {
    let Path(org_id) = path?;

    Ok(Json(
        state
            .services
            .organizations
            .get(org_id, auth.user_id)
            .await?,
    ))
}

/// Owner-only update, optionally refreshing the invite code
pub async fn update_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateOrganizationRequest>, JsonRejection>,
) -> ApiResult<Json<OrganizationView>> {
    let Path(org_id) = path?;
    let Json(req) = payload?;

    let org = state
        .services
        .organizations
        .update(org_id, req.into(), auth.user_id)
        .await?;

    Ok(Json(OrganizationView::for_viewer(org, auth.user_id)))
}

/// Owner-only delete; removes all tasks and memberships
pub async fn delete_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(org_id) = path?;

    state
        .services
        .organizations
        .delete(org_id, auth.user_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Owner first, then members in join order
pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Vec<Member>>> {
    let Path(org_id) = path?;

    Ok(Json(
        state
            .services
            .memberships
            .list_members(org_id, auth.user_id)
            .await?,
    ))
}

/// Owner removes a member; the member's tasks become unassigned
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path((org_id, user_id)) = path?;

    state
        .services
        .memberships
        .remove(org_id, user_id, auth.user_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn leave_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(org_id) = path?;

    state
        .services
        .memberships
        .leave(org_id, auth.user_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_distinguishes_null_description() {
        let clear: UpdateOrganizationRequest =
            serde_json::from_str(r#"{"description": null}"#).unwrap();
        let patch = OrganizationPatch::from(clear);
        assert_eq!(patch.description, Some(None));
        assert!(!patch.refresh_invite_code);

        let refresh: UpdateOrganizationRequest =
            serde_json::from_str(r#"{"refreshInviteCode": true}"#).unwrap();
        let patch = OrganizationPatch::from(refresh);
        assert_eq!(patch.description, None);
        assert!(patch.refresh_invite_code);
    }
}
