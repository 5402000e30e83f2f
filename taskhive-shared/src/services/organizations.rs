//! Organization Registry
//!
//! Creates organizations, mints their invite codes, and handles joining by
//! code. Invite code uniqueness is settled by the store's unique constraints:
//! a candidate is written and, on a collision, a new one is drawn, up to
//! `max_attempts` times.

use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use super::memberships::MembershipLedger;
use super::required_text;
use crate::auth::policy::{authorize, Action};
use crate::error::{CoreError, CoreResult};
use crate::invite_code::{self, InviteCodeSource};
use crate::models::organization::{
    CreateOrganization, Organization, OrganizationView, UpdateOrganization,
};
use crate::store::{SharedStore, StoreResult, UniqueConstraint};

/// Default bound on invite code draws per operation
pub const DEFAULT_INVITE_CODE_ATTEMPTS: u32 = 100;

/// Input for creating an organization
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrganization {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Owner-only changes to an organization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizationPatch {
    pub name: Option<String>,

    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,

    /// Replace the invite code with a freshly minted one
    pub refresh_invite_code: bool,
}

fn clean_name(name: &str) -> CoreResult<String> {
    required_text("Organization name", name)
}

/// Blank descriptions are stored as absent
fn clean_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

/// Creates, updates, deletes and joins organizations
#[derive(Clone)]
pub struct OrganizationRegistry {
    store: SharedStore,
    ledger: MembershipLedger,
    invite_codes: Arc<dyn InviteCodeSource>,
    max_attempts: u32,
}

impl OrganizationRegistry {
    pub fn new(
        store: SharedStore,
        ledger: MembershipLedger,
        invite_codes: Arc<dyn InviteCodeSource>,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            ledger,
            invite_codes,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Runs `write` with fresh invite codes until one is accepted
    async fn with_fresh_invite_code<T, F, Fut>(&self, mut write: F) -> CoreResult<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        for attempt in 1..=self.max_attempts {
            let code = self.invite_codes.next_code();

            match write(code).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_unique_violation_of(&UniqueConstraint::InviteCode) => {
                    tracing::debug!(attempt, "Invite code collision, drawing another");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(
            attempts = self.max_attempts,
            "Gave up minting a unique invite code"
        );
        Err(CoreError::ResourceExhausted(format!(
            "Could not generate a unique invite code after {} attempts",
            self.max_attempts
        )))
    }

    /// Creates an organization owned by `owner_id`
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the name is empty
    /// - `ResourceExhausted` if no unique invite code was found
    pub async fn create(&self, owner_id: Uuid, input: NewOrganization) -> CoreResult<Organization> {
        let name = clean_name(&input.name)?;
        let description = clean_description(input.description);

        let org = self
            .with_fresh_invite_code(|invite_code| {
                self.store.insert_organization(CreateOrganization {
                    name: name.clone(),
                    description: description.clone(),
                    invite_code,
                    owner_id,
                })
            })
            .await?;

        tracing::info!(org_id = %org.id, owner_id = %owner_id, "Organization created");
        Ok(org)
    }

    async fn load(&self, org_id: Uuid) -> CoreResult<Organization> {
        self.store
            .find_organization(org_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Organization not found".to_string()))
    }

    /// Organization details as seen by `requester`
    ///
    /// The invite code is only included for the owner.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the organization does not exist
    /// - `Forbidden` if `requester` is not a participant
    pub async fn get(&self, org_id: Uuid, requester: Uuid) -> CoreResult<OrganizationView> {
        let org = self.load(org_id).await?;
        let actor = self.ledger.participation(&org, requester).await?;
        authorize(&actor, Action::ViewOrganization)?;

        Ok(OrganizationView::for_viewer(org, requester))
    }

    /// Applies an owner's patch, optionally minting a new invite code
    ///
    /// An empty patch returns the organization unchanged.
    pub async fn update(
        &self,
        org_id: Uuid,
        patch: OrganizationPatch,
        requester: Uuid,
    ) -> CoreResult<Organization> {
        let org = self.load(org_id).await?;
        let actor = self.ledger.participation(&org, requester).await?;
        authorize(&actor, Action::ManageOrganization)?;

        let update = UpdateOrganization {
            name: patch.name.as_deref().map(clean_name).transpose()?,
            description: patch.description.map(clean_description),
            invite_code: None,
        };

        if update.name.is_none() && update.description.is_none() && !patch.refresh_invite_code {
            return Ok(org);
        }

        let updated = if patch.refresh_invite_code {
            self.with_fresh_invite_code(|invite_code| {
                self.store.update_organization(
                    org_id,
                    UpdateOrganization {
                        invite_code: Some(invite_code),
                        ..update.clone()
                    },
                )
            })
            .await?
        } else {
            self.store.update_organization(org_id, update).await?
        };

        let updated =
            updated.ok_or_else(|| CoreError::NotFound("Organization not found".to_string()))?;

        tracing::info!(
            org_id = %org_id,
            invite_code_refreshed = patch.refresh_invite_code,
            "Organization updated"
        );
        Ok(updated)
    }

    /// Deletes the organization with all its tasks and memberships
    pub async fn delete(&self, org_id: Uuid, requester: Uuid) -> CoreResult<()> {
        let org = self.load(org_id).await?;
        let actor = self.ledger.participation(&org, requester).await?;
        authorize(&actor, Action::ManageOrganization)?;

        if !self.store.delete_organization(org_id).await? {
            return Err(CoreError::NotFound("Organization not found".to_string()));
        }

        tracing::info!(org_id = %org_id, "Organization deleted");
        Ok(())
    }

    /// Joins the organization holding `code` as a member
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the code is blank
    /// - `NotFound` if no organization holds the code
    /// - `AlreadyMember` if `requester` owns or already belongs to it
    pub async fn join(&self, code: &str, requester: Uuid) -> CoreResult<OrganizationView> {
        let code = invite_code::normalize(code);
        if code.is_empty() {
            return Err(CoreError::InvalidInput("Join code is required".to_string()));
        }

        let org = self
            .store
            .find_organization_by_invite_code(&code)
            .await?
            .ok_or_else(|| CoreError::NotFound("Invalid join code".to_string()))?;

        // owner_id is immutable
        if org.owner_id == requester {
            return Err(CoreError::AlreadyMember);
        }

        self.store
            .insert_membership(org.id, requester)
            .await
            .map_err(|e| {
                if e.is_unique_violation_of(&UniqueConstraint::Membership) {
                    CoreError::AlreadyMember
                } else {
                    e.into()
                }
            })?;

        tracing::info!(org_id = %org.id, user_id = %requester, "User joined organization");
        Ok(OrganizationView::for_viewer(org, requester))
    }

    /// Organizations the user owns, then those they joined
    pub async fn list_for_user(&self, user_id: Uuid) -> CoreResult<Vec<OrganizationView>> {
        let orgs = self.store.list_organizations_for_user(user_id).await?;

        Ok(orgs
            .into_iter()
            .map(|org| OrganizationView::for_viewer(org, user_id))
            .collect())
    }
}
