/// User profile endpoints
///
/// - `GET /v1/users/profile`
/// - `PUT /v1/users/profile`
/// - `GET /v1/users/stats`

use axum::{extract::rejection::JsonRejection, extract::State, Extension, Json};
use taskhive_shared::{
    models::user::UserProfile,
    services::identity::{ProfileUpdate, UserStats},
};

use crate::{app::AppState, error::ApiResult, middleware::auth::AuthContext};

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UserProfile>> {
    Ok(Json(state.services.identity.current_user(auth.user_id).await?))
}

/// Partially updates the profile
///
/// ```json
/// { "full_name": "Alice Jones", "current_password": "...", "new_password": "..." }
/// ```
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult<Json<UserProfile>> {
    let Json(update) = payload?;

    let profile = state
        .services
        .identity
        .update_profile(auth.user_id, update)
        .await?;

    Ok(Json(profile))
}

/// Dashboard counters for the authenticated user
pub async fn stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UserStats>> {
    Ok(Json(state.services.identity.stats(auth.user_id).await?))
}
