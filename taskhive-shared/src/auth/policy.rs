//! Access policy engine
//!
//! Every check is a pure function of the actor's [`Participation`] in an
//! organization and, for task operations, the task's creator and assignee.
//! The services resolve participation from the store, then ask this module
//! for a verdict.
//!
//! # Rules
//!
//! | Action | Allowed when |
//! |---|---|
//! | [`Action::ViewOrganization`] | actor is a participant |
//! | [`Action::ManageOrganization`] | actor is the owner |
//! | [`Action::ManageMembers`] | actor is the owner |
//! | [`Action::CreateTask`] | actor is a participant |
//! | [`Action::ViewTask`] | actor is a participant |
//! | [`Action::ModifyTask`] | actor is the owner, or a participant who created the task |
//! | [`Action::ChangeTaskStatus`] | actor is the owner, or a participant who created or is assigned the task |
//!
//! Owner and creator rights are additive. Creator and assignee rights lapse
//! once the actor stops being a participant.
//!
//! ```
//! use taskhive_shared::auth::policy::{authorize, Action, Participation};
//! use uuid::Uuid;
//!
//! let org_id = Uuid::new_v4();
//! let member = Participation::member(org_id, Uuid::new_v4());
//!
//! assert!(authorize(&member, Action::ViewOrganization).is_ok());
//! assert!(authorize(&member, Action::ManageOrganization).is_err());
//! ```

use uuid::Uuid;

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Actor is neither owner nor member of the organization
    #[error("Not a participant of organization {0}")]
    NotParticipant(Uuid),

    /// Action is reserved for the organization owner
    #[error("Only the owner of organization {0} may do this")]
    NotOwner(Uuid),

    /// Actor is neither the owner nor the task's creator
    #[error("Only the organization owner or the task creator may modify this task")]
    NotOwnerOrCreator,

    /// Actor is neither the owner, the creator nor the assignee
    #[error("Only the organization owner, the task creator or the assignee may change the status")]
    NotOwnerCreatorOrAssignee,

    /// Proposed assignee does not participate in the organization
    #[error("User {0} is not a participant of the organization")]
    InvalidAssignee(Uuid),
}

/// How a user relates to one organization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participation {
    /// Organization the facts refer to
    pub org_id: Uuid,
    /// The user whose participation this is
    pub user_id: Uuid,
    /// User is the organization's owner
    pub is_owner: bool,
    /// User holds a membership row
    pub is_member: bool,
}

impl Participation {
    /// Participation of the owner
    pub fn owner(org_id: Uuid, user_id: Uuid) -> Self {
        Self {
            org_id,
            user_id,
            is_owner: true,
            is_member: false,
        }
    }

    /// Participation of a membership holder
    pub fn member(org_id: Uuid, user_id: Uuid) -> Self {
        Self {
            org_id,
            user_id,
            is_owner: false,
            is_member: true,
        }
    }

    /// A user with no relation to the organization
    pub fn outsider(org_id: Uuid, user_id: Uuid) -> Self {
        Self {
            org_id,
            user_id,
            is_owner: false,
            is_member: false,
        }
    }

    /// Owner or member
    pub fn is_participant(&self) -> bool {
        self.is_owner || self.is_member
    }
}

/// Operations gated by the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Read organization details and its task list
    ViewOrganization,
    /// Update or delete the organization, view or regenerate its invite code
    ManageOrganization,
    /// Remove members
    ManageMembers,
    /// Create a task in the organization
    CreateTask,
    /// Read a task
    ViewTask,
    /// Update fields of, reassign or delete a task
    ModifyTask {
        /// Task creator
        created_by: Uuid,
    },
    /// Change a task's status
    ChangeTaskStatus {
        /// Task creator
        created_by: Uuid,
        /// Current assignee
        assigned_to: Option<Uuid>,
    },
}

/// Decides whether `actor` may perform `action`
pub fn authorize(actor: &Participation, action: Action) -> Result<(), AuthzError> {
    let org_id = actor.org_id;

    let decision = match action {
        Action::ViewOrganization | Action::CreateTask | Action::ViewTask => {
            if actor.is_participant() {
                Ok(())
            } else {
                Err(AuthzError::NotParticipant(org_id))
            }
        }
        Action::ManageOrganization | Action::ManageMembers => {
            if actor.is_owner {
                Ok(())
            } else {
                Err(AuthzError::NotOwner(org_id))
            }
        }
        Action::ModifyTask { created_by } => {
            if actor.is_owner || (actor.is_participant() && actor.user_id == created_by) {
                Ok(())
            } else {
                Err(AuthzError::NotOwnerOrCreator)
            }
        }
        Action::ChangeTaskStatus {
            created_by,
            assigned_to,
        } => {
            let is_creator = actor.user_id == created_by;
            let is_assignee = assigned_to == Some(actor.user_id);

            if actor.is_owner || (actor.is_participant() && (is_creator || is_assignee)) {
                Ok(())
            } else {
                Err(AuthzError::NotOwnerCreatorOrAssignee)
            }
        }
    };

    if let Err(reason) = &decision {
        tracing::warn!(
            org_id = %org_id,
            user_id = %actor.user_id,
            action = ?action,
            reason = %reason,
            "Access denied"
        );
    }
    decision
}

/// Checks that `candidate` may be assigned tasks in their organization
pub fn require_assignable(candidate: &Participation) -> Result<(), AuthzError> {
    if candidate.is_participant() {
        Ok(())
    } else {
        Err(AuthzError::InvalidAssignee(candidate.user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        org_id: Uuid,
        owner: Uuid,
        creator: Uuid,
        assignee: Uuid,
        member: Uuid,
        outsider: Uuid,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                org_id: Uuid::new_v4(),
                owner: Uuid::new_v4(),
                creator: Uuid::new_v4(),
                assignee: Uuid::new_v4(),
                member: Uuid::new_v4(),
                outsider: Uuid::new_v4(),
            }
        }

        fn owner(&self) -> Participation {
            Participation::owner(self.org_id, self.owner)
        }

        fn member(&self, user_id: Uuid) -> Participation {
            Participation::member(self.org_id, user_id)
        }

        fn outsider(&self, user_id: Uuid) -> Participation {
            Participation::outsider(self.org_id, user_id)
        }

        fn modify(&self) -> Action {
            Action::ModifyTask {
                created_by: self.creator,
            }
        }

        fn change_status(&self) -> Action {
            Action::ChangeTaskStatus {
                created_by: self.creator,
                assigned_to: Some(self.assignee),
            }
        }
    }

    #[test]
    fn test_participant_actions() {
        let f = Fixture::new();

        for action in [Action::ViewOrganization, Action::CreateTask, Action::ViewTask] {
            assert!(authorize(&f.owner(), action).is_ok());
            assert!(authorize(&f.member(f.member), action).is_ok());
            assert_eq!(
                authorize(&f.outsider(f.outsider), action),
                Err(AuthzError::NotParticipant(f.org_id))
            );
        }
    }

    #[test]
    fn test_owner_only_actions() {
        let f = Fixture::new();

        for action in [Action::ManageOrganization, Action::ManageMembers] {
            assert!(authorize(&f.owner(), action).is_ok());
            assert_eq!(
                authorize(&f.member(f.member), action),
                Err(AuthzError::NotOwner(f.org_id))
            );
            assert!(authorize(&f.outsider(f.outsider), action).is_err());
        }
    }

    #[test]
    fn test_modify_task() {
        let f = Fixture::new();

        assert!(authorize(&f.owner(), f.modify()).is_ok());
        assert!(authorize(&f.member(f.creator), f.modify()).is_ok());
        assert_eq!(
            authorize(&f.member(f.assignee), f.modify()),
            Err(AuthzError::NotOwnerOrCreator)
        );
        assert!(authorize(&f.member(f.member), f.modify()).is_err());
    }

    #[test]
    fn test_creator_rights_lapse_after_removal() {
        let f = Fixture::new();

        assert!(authorize(&f.outsider(f.creator), f.modify()).is_err());
        assert!(authorize(&f.outsider(f.creator), f.change_status()).is_err());
    }

    #[test]
    fn test_change_status() {
        let f = Fixture::new();

        assert!(authorize(&f.owner(), f.change_status()).is_ok());
        assert!(authorize(&f.member(f.creator), f.change_status()).is_ok());
        assert!(authorize(&f.member(f.assignee), f.change_status()).is_ok());
        assert_eq!(
            authorize(&f.member(f.member), f.change_status()),
            Err(AuthzError::NotOwnerCreatorOrAssignee)
        );
        assert!(authorize(&f.outsider(f.outsider), f.change_status()).is_err());
    }

    #[test]
    fn test_unassigned_task_status_change() {
        let f = Fixture::new();
        let action = Action::ChangeTaskStatus {
            created_by: f.creator,
            assigned_to: None,
        };

        assert!(authorize(&f.member(f.creator), action).is_ok());
        assert!(authorize(&f.member(f.assignee), action).is_err());
    }

    #[test]
    fn test_owner_who_created_task_keeps_rights() {
        let f = Fixture::new();
        let action = Action::ModifyTask { created_by: f.owner };
        assert!(authorize(&f.owner(), action).is_ok());
    }

    #[test]
    fn test_require_assignable() {
        let f = Fixture::new();

        assert!(require_assignable(&f.owner()).is_ok());
        assert!(require_assignable(&f.member(f.member)).is_ok());
        assert_eq!(
            require_assignable(&f.outsider(f.outsider)),
            Err(AuthzError::InvalidAssignee(f.outsider))
        );
    }
}
