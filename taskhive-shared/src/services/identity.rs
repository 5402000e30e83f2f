//! Identity Provider
//!
//! Registers accounts, exchanges email and password for a signed bearer
//! credential, and resolves credentials back to a user id. Verification is
//! stateless apart from checking that the user still exists.

use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{required_text, validation_message};
use crate::auth::{
    jwt::{self, Claims},
    password::{self, HashingParams},
};
use crate::error::{CoreError, CoreResult};
use crate::models::{
    task::Task,
    user::{CreateUser, UpdateUser, UserProfile},
};
use crate::store::{SharedStore, StoreError, UniqueConstraint};

/// Verified against when the email is unknown; never matches a real login
const DUMMY_PASSWORD: &str = "taskhive-unknown-account";

/// Number of tasks reported in [`UserStats::recent_activity`]
pub const RECENT_ACTIVITY_LIMIT: usize = 5;

/// Credential signing and password hashing settings
#[derive(Clone)]
pub struct IdentitySettings {
    /// HS256 signing secret
    pub jwt_secret: String,

    /// Credential lifetime
    pub token_ttl: Duration,

    /// Argon2id cost for new hashes
    pub hashing: HashingParams,
}

impl IdentitySettings {
    /// Production defaults: 7-day credentials, full Argon2id cost
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_ttl: jwt::default_ttl(),
            hashing: HashingParams::default(),
        }
    }
}

impl fmt::Debug for IdentitySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentitySettings")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("hashing", &self.hashing)
            .finish()
    }
}

/// Signup input
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Registration {
    #[validate(length(min = 1, max = 255, message = "Full name must be 1 to 255 characters"))]
    pub full_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

/// Signed bearer credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

/// Successful login or signup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub credential: Credential,
    pub user: UserProfile,
}

/// Partial profile update
///
/// Changing the password requires `current_password`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// Per-user dashboard counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStats {
    /// Organizations owned plus organizations joined
    pub total_organizations: usize,
    /// Tasks assigned to the user
    pub total_tasks: i64,
    pub pending_tasks: i64,
    pub in_progress_tasks: i64,
    pub completed_tasks: i64,
    /// Newest tasks the user created or is assigned
    pub recent_activity: Vec<Task>,
}

#[derive(Validate)]
struct EmailAddress {
    #[validate(email(message = "Invalid email format"))]
    value: String,
}

/// Trims and lowercases an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> CoreResult<()> {
    EmailAddress {
        value: email.to_string(),
    }
    .validate()
    .map_err(|e| CoreError::InvalidInput(validation_message(&e)))
}

fn email_conflict(err: StoreError, message: &str) -> CoreError {
    if err.is_unique_violation_of(&UniqueConstraint::UserEmail) {
        CoreError::Conflict(message.to_string())
    } else {
        err.into()
    }
}

/// Issues and verifies credentials, manages accounts
#[derive(Clone)]
pub struct IdentityProvider {
    store: SharedStore,
    settings: IdentitySettings,
    dummy_hash: Arc<OnceLock<String>>,
}

impl IdentityProvider {
    pub fn new(store: SharedStore, settings: IdentitySettings) -> Self {
        Self {
            store,
            settings,
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    /// Hash at the configured cost, so an unknown email costs the same
    /// Argon2 run as a wrong password
    fn dummy_hash(&self) -> CoreResult<&str> {
        if let Some(hash) = self.dummy_hash.get() {
            return Ok(hash.as_str());
        }

        let hash = password::hash_password_with(DUMMY_PASSWORD, &self.settings.hashing)?;
        Ok(self.dummy_hash.get_or_init(|| hash).as_str())
    }

    /// Creates an account
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty name, malformed email or weak password
    /// - `Conflict` if the email is already registered
    pub async fn register(&self, registration: Registration) -> CoreResult<UserProfile> {
        let registration = Registration {
            full_name: registration.full_name.trim().to_string(),
            email: normalize_email(&registration.email),
            password: registration.password,
        };

        registration
            .validate()
            .map_err(|e| CoreError::InvalidInput(validation_message(&e)))?;
        password::validate_password_strength(&registration.password)
            .map_err(CoreError::InvalidInput)?;

        let password_hash =
            password::hash_password_with(&registration.password, &self.settings.hashing)?;

        let user = self
            .store
            .insert_user(CreateUser {
                full_name: registration.full_name,
                email: registration.email,
                password_hash,
            })
            .await
            .map_err(|e| email_conflict(e, "Email is already registered"))?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user.into())
    }

    /// Exchanges email and password for a credential
    ///
    /// Unknown email and wrong password both fail with `InvalidCredentials`.
    pub async fn authenticate(&self, email: &str, password: &str) -> CoreResult<Session> {
        let email = normalize_email(email);

        let Some(user) = self.store.find_user_by_email(&email).await? else {
            password::verify_password(password, self.dummy_hash()?)?;
            tracing::debug!("Login attempt for unknown email");
            return Err(CoreError::InvalidCredentials);
        };

        if !password::verify_password(password, &user.password_hash)? {
            tracing::debug!(user_id = %user.id, "Login attempt with wrong password");
            return Err(CoreError::InvalidCredentials);
        }

        let credential = self.issue_credential(user.id)?;

        tracing::info!(user_id = %user.id, "User authenticated");
        Ok(Session {
            credential,
            user: user.into(),
        })
    }

    /// Signs a fresh credential for `user_id`
    pub fn issue_credential(&self, user_id: Uuid) -> CoreResult<Credential> {
        let claims = Claims::with_expiration(user_id, self.settings.token_ttl);
        let token = jwt::create_token(&claims, &self.settings.jwt_secret)?;

        Ok(Credential {
            token,
            token_type: "Bearer".to_string(),
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now),
        })
    }

    /// Resolves a credential to the user it was issued for
    ///
    /// # Errors
    ///
    /// `Unauthenticated` if the signature is invalid, the credential expired,
    /// or the user no longer exists
    pub async fn verify(&self, token: &str) -> CoreResult<Uuid> {
        let claims = jwt::validate_token(token, &self.settings.jwt_secret)?;

        match self.store.find_user(claims.sub).await? {
            Some(user) => Ok(user.id),
            None => Err(CoreError::Unauthenticated(
                "User no longer exists".to_string(),
            )),
        }
    }

    /// Profile of the authenticated user
    pub async fn current_user(&self, user_id: Uuid) -> CoreResult<UserProfile> {
        self.store
            .find_user(user_id)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| CoreError::NotFound("User not found".to_string()))
    }

    /// Applies a partial profile update
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty name, malformed email, weak new password,
    ///   or a missing or wrong current password
    /// - `Conflict` if the new email belongs to another account
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        update: ProfileUpdate,
    ) -> CoreResult<UserProfile> {
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("User not found".to_string()))?;

        let mut patch = UpdateUser::default();

        if let Some(full_name) = update.full_name {
            let full_name = required_text("Full name", &full_name)?;
            if full_name != user.full_name {
                patch.full_name = Some(full_name);
            }
        }

        if let Some(email) = update.email {
            let email = normalize_email(&email);
            validate_email(&email)?;
            if email != user.email {
                patch.email = Some(email);
            }
        }

        if let Some(new_password) = update.new_password {
            let current = update.current_password.ok_or_else(|| {
                CoreError::InvalidInput("Current password is required to set a new password".to_string())
            })?;
            if !password::verify_password(&current, &user.password_hash)? {
                return Err(CoreError::InvalidInput("Current password is incorrect".to_string()));
            }
            password::validate_password_strength(&new_password).map_err(CoreError::InvalidInput)?;
            patch.password_hash = Some(password::hash_password_with(
                &new_password,
                &self.settings.hashing,
            )?);
        }

        if patch.is_empty() {
            return Ok(user.into());
        }

        let updated = self
            .store
            .update_user(user_id, patch)
            .await
            .map_err(|e| email_conflict(e, "Email is already in use"))?
            .ok_or_else(|| CoreError::NotFound("User not found".to_string()))?;

        tracing::info!(user_id = %user_id, "Profile updated");
        Ok(updated.into())
    }

    /// Organization and task counters for the user's dashboard
    pub async fn stats(&self, user_id: Uuid) -> CoreResult<UserStats> {
        let organizations = self.store.list_organizations_for_user(user_id).await?;
        let counts = self.store.task_counts_for_assignee(user_id).await?;
        let recent_activity = self
            .store
            .recent_tasks_for_user(user_id, RECENT_ACTIVITY_LIMIT)
            .await?;

        Ok(UserStats {
            total_organizations: organizations.len(),
            total_tasks: counts.total,
            pending_tasks: counts.pending,
            in_progress_tasks: counts.in_progress,
            completed_tasks: counts.completed,
            recent_activity,
        })
    }
}
