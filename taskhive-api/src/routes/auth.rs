/// Authentication endpoints
///
/// - `POST /v1/auth/register` - Create an account and sign in
/// - `POST /v1/auth/login` - Exchange email and password for a credential
/// - `GET /v1/auth/me` - Profile of the authenticated user

use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Extension, Json};
use serde::Deserialize;
use taskhive_shared::{
    models::user::UserProfile,
    services::identity::{Registration, Session},
};

use crate::{app::AppState, error::ApiResult, middleware::auth::AuthContext};

/// Register request
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(alias = "fullName")]
    pub full_name: String,
    pub email: String,
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Registers a new user and returns a session
///
/// ```text
/// POST /v1/auth/register
///
/// { "full_name": "Alice Smith", "email": "alice@example.com", "password": "Secret123!" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed
/// - `409 Conflict`: Email already registered
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    let Json(req) = payload?;
    let identity = &state.services.identity;

    let user = identity
        .register(Registration {
            full_name: req.full_name,
            email: req.email,
            password: req.password,
        })
        .await?;
    let credential = identity.issue_credential(user.id)?;

    Ok((StatusCode::CREATED, Json(Session { credential, user })))
}

/// Logs in with email and password
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown email or wrong password
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<Session>> {
    let Json(req) = payload?;

    let session = state
        .services
        .identity
        .authenticate(&req.email, &req.password)
        .await?;

    Ok(Json(session))
}

/// Returns the authenticated user's profile
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UserProfile>> {
    Ok(Json(state.services.identity.current_user(auth.user_id).await?))
}
