/// Bearer credential authentication
///
/// [`require_auth`] verifies the `Authorization: Bearer <token>` header with
/// the Identity Provider and stores the resolved actor in the request
/// extensions. Handlers read it with `Extension<AuthContext>`.
///
/// ```no_run
/// use axum::Extension;
/// use taskhive_api::middleware::auth::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("User: {}", auth.user_id)
/// }
/// ```

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{app::AppState, error::ApiError};

/// The authenticated actor of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
}

/// Extracts the token from an `Authorization` header value
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Rejects requests without a valid bearer credential
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?;

    let token = bearer_token(header_value)
        .ok_or_else(|| ApiError::unauthorized("Expected Bearer token"))?;

    let user_id = state.services.identity.verify(token).await?;

    req.extensions_mut().insert(AuthContext { user_id });

    Ok(next.run(req).await)
}
