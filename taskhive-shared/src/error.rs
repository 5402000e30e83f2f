//! Error kinds returned by every core operation
//!
//! Each operation in [`crate::services`] fails with exactly one [`CoreError`]
//! variant. The request-handling layer maps these onto status codes; the core
//! itself never exposes storage details to callers.

use crate::auth::{jwt::JwtError, password::PasswordError, policy::AuthzError};
use crate::models::task::ParseTaskStatusError;
use crate::store::StoreError;

/// Result alias used across the core services
pub type CoreResult<T> = Result<T, CoreError>;

/// Failure kinds surfaced by the core
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A required field is missing or malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown email or wrong password at login
    ///
    /// Both cases share this variant so callers cannot enumerate accounts.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Missing, invalid or expired credential, or the user no longer exists
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated but the access policy denies the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness violation, e.g. a duplicate email
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The user already participates in the organization
    #[error("Already a participant of this organization")]
    AlreadyMember,

    /// The proposed assignee is not a participant of the task's organization
    #[error("Assignee must be the owner or a member of the organization")]
    InvalidAssignee,

    /// Invite code generation ran out of attempts
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Unrecognized storage or cryptographic failure
    #[error("Internal error")]
    Internal,
}

impl CoreError {
    /// Short machine-readable code for this error kind
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidInput(_) => "invalid_input",
            CoreError::InvalidCredentials => "invalid_credentials",
            CoreError::Unauthenticated(_) => "unauthenticated",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::NotFound(_) => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::AlreadyMember => "already_member",
            CoreError::InvalidAssignee => "invalid_assignee",
            CoreError::ResourceExhausted(_) => "resource_exhausted",
            CoreError::Internal => "internal_error",
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AssigneeNotParticipant => CoreError::InvalidAssignee,
            StoreError::ActorNotParticipant => {
                CoreError::Forbidden("You are no longer a participant of this organization".to_string())
            }
            StoreError::UniqueViolation(constraint) => {
                CoreError::Conflict(format!("{} already exists", constraint.subject()))
            }
            StoreError::MissingReference(table) => {
                tracing::debug!(table = %table, "Write referenced a missing row");
                CoreError::NotFound("Referenced resource no longer exists".to_string())
            }
            StoreError::Database(e) => {
                tracing::error!(error = %e, "Storage operation failed");
                CoreError::Internal
            }
        }
    }
}

impl From<AuthzError> for CoreError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::InvalidAssignee(_) => CoreError::InvalidAssignee,
            other => CoreError::Forbidden(other.to_string()),
        }
    }
}

impl From<PasswordError> for CoreError {
    fn from(err: PasswordError) -> Self {
        tracing::error!(error = %err, "Password hashing failed");
        CoreError::Internal
    }
}

impl From<JwtError> for CoreError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => {
                tracing::error!(error = %msg, "Credential issuance failed");
                CoreError::Internal
            }
            JwtError::Expired => CoreError::Unauthenticated("Token expired".to_string()),
            other => CoreError::Unauthenticated(other.to_string()),
        }
    }
}

impl From<ParseTaskStatusError> for CoreError {
    fn from(err: ParseTaskStatusError) -> Self {
        CoreError::InvalidInput(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::UniqueConstraint;
    use uuid::Uuid;

    #[test]
    fn test_assignee_guard_maps_to_invalid_assignee() {
        let err: CoreError = StoreError::AssigneeNotParticipant.into();
        assert_eq!(err, CoreError::InvalidAssignee);
    }

    #[test]
    fn test_lapsed_actor_maps_to_forbidden() {
        let err: CoreError = StoreError::ActorNotParticipant.into();
        assert_eq!(err.code(), "forbidden");
    }

    #[test]
    fn test_unique_violation_maps_to_conflict() {
        let err: CoreError = StoreError::UniqueViolation(UniqueConstraint::UserEmail).into();
        assert!(matches!(err, CoreError::Conflict(ref m) if m.contains("Email")));
    }

    #[test]
    fn test_database_error_is_not_leaked() {
        let err: CoreError = StoreError::Database(sqlx::Error::PoolTimedOut).into();
        assert_eq!(err, CoreError::Internal);
        assert_eq!(err.to_string(), "Internal error");
    }

    #[test]
    fn test_authz_denials_map_to_forbidden() {
        let err: CoreError = AuthzError::NotParticipant(Uuid::new_v4()).into();
        assert!(matches!(err, CoreError::Forbidden(_)));

        let err: CoreError = AuthzError::InvalidAssignee(Uuid::new_v4()).into();
        assert_eq!(err, CoreError::InvalidAssignee);
    }

    #[test]
    fn test_expired_token_is_unauthenticated() {
        let err: CoreError = JwtError::Expired.into();
        assert_eq!(err.code(), "unauthenticated");
    }
}
