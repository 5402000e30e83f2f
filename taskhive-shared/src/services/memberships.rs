//! Membership Ledger
//!
//! The single source of participation facts. Every authorization check in
//! the other services starts from [`MembershipLedger::participation`].

use uuid::Uuid;

use crate::auth::policy::{authorize, Action, Participation};
use crate::error::{CoreError, CoreResult};
use crate::models::{
    membership::Member,
    organization::Organization,
    user::UserProfile,
};
use crate::store::SharedStore;

/// Tracks who belongs to which organization
#[derive(Clone)]
pub struct MembershipLedger {
    store: SharedStore,
}

impl MembershipLedger {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Resolves how `user_id` relates to `org`
    pub async fn participation(&self, org: &Organization, user_id: Uuid) -> CoreResult<Participation> {
        if org.owner_id == user_id {
            return Ok(Participation::owner(org.id, user_id));
        }

        let participation = match self.store.find_membership(org.id, user_id).await? {
            Some(_) => Participation::member(org.id, user_id),
            None => Participation::outsider(org.id, user_id),
        };
        Ok(participation)
    }

    /// Loads the organization and resolves `user_id`'s participation in it
    ///
    /// # Errors
    ///
    /// `NotFound` if the organization does not exist
    pub async fn participation_in(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> CoreResult<(Organization, Participation)> {
        let org = self
            .store
            .find_organization(org_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Organization not found".to_string()))?;
        let participation = self.participation(&org, user_id).await?;

        Ok((org, participation))
    }

    /// True iff the user owns the organization or holds a membership row
    ///
    /// A missing organization has no participants.
    pub async fn is_participant(&self, user_id: Uuid, org_id: Uuid) -> CoreResult<bool> {
        match self.participation_in(org_id, user_id).await {
            Ok((_, participation)) => Ok(participation.is_participant()),
            Err(CoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Participants of an organization: the owner, then members by join time
    ///
    /// # Errors
    ///
    /// - `NotFound` if the organization does not exist
    /// - `Forbidden` if `requester` is not a participant
    pub async fn list_members(&self, org_id: Uuid, requester: Uuid) -> CoreResult<Vec<Member>> {
        let (org, actor) = self.participation_in(org_id, requester).await?;
        authorize(&actor, Action::ViewOrganization)?;

        let owner = self.store.find_user(org.owner_id).await?.ok_or_else(|| {
            tracing::error!(org_id = %org.id, owner_id = %org.owner_id, "Organization owner is missing");
            CoreError::Internal
        })?;

        let mut members = vec![Member {
            user: UserProfile::from(owner),
            joined_at: org.created_at,
            is_owner: true,
        }];
        members.extend(self.store.list_members(org.id).await?);

        Ok(members)
    }

    /// Owner removes a member; the member's tasks in the org become unassigned
    ///
    /// # Errors
    ///
    /// - `NotFound` if the organization does not exist or `user_id` has no
    ///   membership row (this includes the owner)
    /// - `Forbidden` if `requester` is not the owner
    pub async fn remove(&self, org_id: Uuid, user_id: Uuid, requester: Uuid) -> CoreResult<()> {
        let (_, actor) = self.participation_in(org_id, requester).await?;
        authorize(&actor, Action::ManageMembers)?;

        self.delete_membership(org_id, user_id).await?;

        tracing::info!(
            org_id = %org_id,
            user_id = %user_id,
            removed_by = %requester,
            "Member removed"
        );
        Ok(())
    }

    /// A member leaves an organization; their tasks there become unassigned
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the user is the owner
    /// - `NotFound` if the organization does not exist or the user is not a member
    pub async fn leave(&self, org_id: Uuid, user_id: Uuid) -> CoreResult<()> {
        let (_, participation) = self.participation_in(org_id, user_id).await?;
        if participation.is_owner {
            return Err(CoreError::InvalidInput(
                "The owner cannot leave their own organization".to_string(),
            ));
        }

        self.delete_membership(org_id, user_id).await?;

        tracing::info!(org_id = %org_id, user_id = %user_id, "Member left");
        Ok(())
    }

    async fn delete_membership(&self, org_id: Uuid, user_id: Uuid) -> CoreResult<()> {
        match self.store.remove_membership(org_id, user_id).await? {
            Some(unassigned) => {
                tracing::debug!(org_id = %org_id, user_id = %user_id, unassigned, "Tasks unassigned");
                Ok(())
            }
            None => Err(CoreError::NotFound(
                "User is not a member of this organization".to_string(),
            )),
        }
    }
}
