use chrono::Utc;

use super::load_team;
use crate::access::{ManageAction, ResourceType, Role, SpecialAction};
use crate::events::{TeamEvent, dispatch};
use crate::teams::directory::{Actor, MembershipDirectory};
use crate::teams::repository::TeamStore;
use crate::teams::types::Membership;
use crate::AccessError;

#[derive(Debug, Clone)]
pub struct ChangeMemberRoleInput {
    pub team_id: i64,
    pub actor_id: i64,
    pub membership_id: i64,
    pub role: Role,
}

#[derive(Debug)]
pub struct ChangeMemberRoleOutput {
    /// The target membership after the change.
    pub membership: Membership,
    /// The demoted previous Owner, for ownership transfers.
    pub former_owner: Option<Membership>,
}

/// Changes a member's role, or transfers ownership when the new role is Owner.
///
/// A pending invite paired with the target moves with it. A transfer demotes
/// the acting Owner to Admin in the same transaction, so the team has exactly
/// one Owner before and after.
pub struct ChangeMemberRoleAction<S> {
    store: S,
}

impl<S: TeamStore> ChangeMemberRoleAction<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// # Returns
    ///
    /// - `Ok(output)` - role changed, ownership transferred, or already at the role
    /// - `Err(AccessError::AccessDenied)` - actor may not make this transition
    /// - `Err(AccessError::PermissionClosedByTeam)` - team closed editor/viewer member management
    /// - `Err(AccessError::OwnerMustTransferFirst)` - the Owner tried to change their own role
    /// - `Err(AccessError::InvariantViolation)` - transfer target is still pending
    /// - `Err(_)` - lookup or storage errors
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "change_member_role", skip_all, err)
    )]
    pub async fn execute(
        &self,
        input: ChangeMemberRoleInput,
    ) -> Result<ChangeMemberRoleOutput, AccessError> {
        let team = load_team(&self.store, input.team_id).await?;
        let directory = MembershipDirectory::new(&self.store);
        let actor = directory.actor(team.id, Some(input.actor_id)).await?;

        if actor.role.is_editor_or_viewer()
            && !team.permission.allows_member_management_from(actor.role)
        {
            return Err(AccessError::PermissionClosedByTeam("member management"));
        }

        let target = directory.find_by_id(team.id, input.membership_id).await?;
        let evaluator = actor.evaluator(ResourceType::TeamMember);
        actor.require(
            evaluator.can_manage(ManageAction::ManageRole)
                && evaluator.can_modify_role_transition(target.role, input.role),
            "change_member_role",
        )?;

        if actor.role == Role::Owner && actor.user_id == Some(target.user_id) {
            return Err(AccessError::OwnerMustTransferFirst);
        }

        if target.role == input.role {
            return Ok(ChangeMemberRoleOutput {
                membership: target,
                former_owner: None,
            });
        }

        if input.role == Role::Owner {
            return self.transfer(&actor, target).await;
        }

        let from = target.role;
        let membership = self
            .store
            .change_member_role(team.id, target.id, input.role)
            .await?;

        log::info!(
            target: "teamgate",
            "msg=\"member role changed\", team_id={}, membership_id={}, from=\"{from}\", to=\"{}\"",
            team.id,
            membership.id,
            membership.role
        );
        dispatch(TeamEvent::MemberRoleChanged {
            team_id: team.id,
            membership_id: membership.id,
            from,
            to: membership.role,
            at: Utc::now(),
        })
        .await;

        Ok(ChangeMemberRoleOutput {
            membership,
            former_owner: None,
        })
    }

    async fn transfer(
        &self,
        actor: &Actor,
        target: Membership,
    ) -> Result<ChangeMemberRoleOutput, AccessError> {
        if target.is_pending() {
            return Err(AccessError::InvariantViolation(
                "ownership cannot go to a pending member".into(),
            ));
        }

        let owner_membership = actor.membership.as_ref().filter(|m| m.is_owner());
        actor.require(
            owner_membership.is_some()
                && actor
                    .evaluator(ResourceType::TeamMember)
                    .can_manage_special(SpecialAction::TransferOwner),
            "transfer_ownership",
        )?;
        let Some(owner_membership) = owner_membership else {
            return Err(AccessError::AccessDenied);
        };

        let (former, new_owner) = self
            .store
            .transfer_ownership(actor.team_id, owner_membership.id, target.id)
            .await?;

        log::info!(
            target: "teamgate",
            "msg=\"ownership transferred\", team_id={}, from_membership_id={}, to_membership_id={}",
            actor.team_id,
            former.id,
            new_owner.id
        );
        dispatch(TeamEvent::OwnershipTransferred {
            team_id: actor.team_id,
            from_membership_id: former.id,
            to_membership_id: new_owner.id,
            at: Utc::now(),
        })
        .await;

        Ok(ChangeMemberRoleOutput {
            membership: new_owner,
            former_owner: Some(former),
        })
    }
}
