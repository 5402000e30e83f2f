//! Core operations
//!
//! Each service owns one concern and reaches storage only through the
//! [`Store`](crate::store::Store) trait. Authorization decisions come from
//! [`crate::auth::policy`], participation facts from [`MembershipLedger`].

pub mod identity;
pub mod memberships;
pub mod organizations;
pub mod tasks;

use std::sync::Arc;

use validator::Validate;

use crate::error::{CoreError, CoreResult};
use crate::invite_code::{InviteCodeSource, RandomInviteCodes};
use crate::store::SharedStore;

pub use identity::{IdentityProvider, IdentitySettings};
pub use memberships::MembershipLedger;
pub use organizations::{OrganizationRegistry, DEFAULT_INVITE_CODE_ATTEMPTS};
pub use tasks::TaskService;

/// Flattens validator output into one readable message
///
/// Field messages are sorted by field name and joined with `"; "`.
pub(crate) fn validation_message(errors: &validator::ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => message.to_string(),
                None => format!("{field} is invalid"),
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Longest name, title or full name the schema stores, in characters
pub const MAX_TEXT_LEN: usize = 255;

#[derive(Validate)]
struct BoundedText {
    #[validate(length(max = 255))]
    value: String,
}

/// Trims a required single-line field and enforces [`MAX_TEXT_LEN`]
pub(crate) fn required_text(label: &str, raw: &str) -> CoreResult<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(CoreError::InvalidInput(format!("{label} is required")));
    }

    let text = BoundedText {
        value: value.to_string(),
    };
    text.validate().map_err(|_| {
        CoreError::InvalidInput(format!("{label} must be at most {MAX_TEXT_LEN} characters"))
    })?;

    Ok(text.value)
}

/// Settings shared by the services
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub identity: IdentitySettings,
    pub invite_code_max_attempts: u32,
}

impl ServiceSettings {
    pub fn new(identity: IdentitySettings) -> Self {
        Self {
            identity,
            invite_code_max_attempts: DEFAULT_INVITE_CODE_ATTEMPTS,
        }
    }
}

/// All core services wired to one store
#[derive(Clone)]
pub struct Services {
    pub identity: IdentityProvider,
    pub organizations: OrganizationRegistry,
    pub memberships: MembershipLedger,
    pub tasks: TaskService,
}

impl Services {
    /// Wires the services with random invite codes
    pub fn new(store: SharedStore, settings: ServiceSettings) -> Self {
        Self::with_invite_codes(store, settings, Arc::new(RandomInviteCodes))
    }

    /// Wires the services with a caller-provided invite code source
    pub fn with_invite_codes(
        store: SharedStore,
        settings: ServiceSettings,
        invite_codes: Arc<dyn InviteCodeSource>,
    ) -> Self {
        let memberships = MembershipLedger::new(store.clone());

        Self {
            identity: IdentityProvider::new(store.clone(), settings.identity),
            organizations: OrganizationRegistry::new(
                store.clone(),
                memberships.clone(),
                invite_codes,
                settings.invite_code_max_attempts,
            ),
            tasks: TaskService::new(store, memberships.clone()),
            memberships,
        }
    }
}
