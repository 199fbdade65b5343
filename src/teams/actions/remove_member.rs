use chrono::Utc;

use super::load_team;
use crate::access::{ManageAction, ResourceType, role_from_action};
use crate::config::RemovalConfig;
use crate::events::{TeamEvent, dispatch};
use crate::teams::directory::MembershipDirectory;
use crate::teams::repository::TeamStore;
use crate::teams::types::Membership;
use crate::AccessError;

#[derive(Debug, Clone)]
pub struct RemoveMemberInput {
    pub team_id: i64,
    pub actor_id: i64,
    pub membership_id: i64,
}

#[derive(Debug)]
pub struct RemoveMemberOutput {
    pub removed: Membership,
    /// Whether the user account went with the membership.
    pub user_deleted: bool,
}

/// Removes a membership and any invite paired with it.
///
/// The Owner can never be removed. Actors can only remove members whose
/// current role they are allowed to manage. With `delete_account` set the
/// user account is deleted too, unless the user belongs to another team.
pub struct RemoveMemberAction<S> {
    store: S,
    config: RemovalConfig,
}

impl<S: TeamStore> RemoveMemberAction<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, RemovalConfig::default())
    }

    pub fn with_config(store: S, config: RemovalConfig) -> Self {
        Self { store, config }
    }

    /// # Returns
    ///
    /// - `Ok(output)` - membership removed
    /// - `Err(AccessError::AccessDenied)` - actor may not remove this member
    /// - `Err(AccessError::CannotRemoveOwner)` - target is the Owner
    /// - `Err(AccessError::NotFound)` - team or membership missing
    /// - `Err(_)` - storage errors
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "remove_member", skip_all, err)
    )]
    pub async fn execute(&self, input: RemoveMemberInput) -> Result<RemoveMemberOutput, AccessError> {
        let team = load_team(&self.store, input.team_id).await?;
        let directory = MembershipDirectory::new(&self.store);
        let actor = directory.actor(team.id, Some(input.actor_id)).await?;

        let evaluator = actor.evaluator(ResourceType::TeamMember);
        actor.require(evaluator.can_manage(ManageAction::RemoveMember), "remove_member")?;

        let target = directory.find_by_id(team.id, input.membership_id).await?;
        if target.is_owner() {
            log::warn!(
                target: "teamgate",
                "msg=\"refused to remove owner\", team_id={}, membership_id={}, actor_id={}",
                team.id,
                target.id,
                input.actor_id
            );
            return Err(AccessError::CannotRemoveOwner);
        }

        let manages_target_role =
            role_from_action(target.role).is_some_and(|action| evaluator.can_manage(action));
        actor.require(manages_target_role, "remove_member")?;

        let delete_user_id = self.account_to_delete(&target).await?;
        self.store
            .remove_member(team.id, target.id, delete_user_id)
            .await?;

        let user_deleted = delete_user_id.is_some();
        log::info!(
            target: "teamgate",
            "msg=\"member removed\", team_id={}, membership_id={}, removed_by={}, user_deleted={}",
            team.id,
            target.id,
            input.actor_id,
            user_deleted
        );
        dispatch(TeamEvent::MemberRemoved {
            team_id: team.id,
            membership_id: target.id,
            removed_by: input.actor_id,
            user_deleted,
            at: Utc::now(),
        })
        .await;
        if let Some(user_id) = delete_user_id {
            dispatch(TeamEvent::UserDeleted {
                user_id,
                at: Utc::now(),
            })
            .await;
        }

        Ok(RemoveMemberOutput {
            removed: target,
            user_deleted,
        })
    }

    async fn account_to_delete(&self, target: &Membership) -> Result<Option<i64>, AccessError> {
        if !self.config.delete_account || target.is_pending() {
            return Ok(None);
        }

        let memberships = self.store.list_user_memberships(target.user_id).await?;
        let elsewhere = memberships.iter().any(|m| m.id != target.id);
        Ok((!elsewhere).then_some(target.user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::teams::actions::fixtures::team_with_owner;
    use crate::teams::repository::{CreateEmailInvite, CreateMembership};
    use crate::teams::types::MembershipStatus;
    use crate::teams::{
        InviteRepository, MembershipRepository, TeamRepository, TeamTransactions, UserRepository,
    };
    use uuid::Uuid;

    fn input(team_id: i64, actor_id: i64, membership_id: i64) -> RemoveMemberInput {
        RemoveMemberInput {
            team_id,
            actor_id,
            membership_id,
        }
    }

    #[tokio::test]
    async fn test_admin_removes_editor_and_account() {
        let fx = team_with_owner().await;
        let (admin, _) = fx.store.seed_member(fx.team.id, "ad@x.com", Role::Admin).await;
        let (editor, membership) = fx.store.seed_member(fx.team.id, "e@x.com", Role::Editor).await;

        let output = RemoveMemberAction::new(fx.store.clone())
            .execute(input(fx.team.id, admin.id, membership.id))
            .await
            .unwrap();

        assert!(output.user_deleted);
        assert!(fx.store.find_user_by_id(editor.id).await.unwrap().is_none());
        assert!(fx.store.find_membership(fx.team.id, editor.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_owner_cannot_be_removed() {
        let fx = team_with_owner().await;
        let (admin, _) = fx.store.seed_member(fx.team.id, "ad@x.com", Role::Admin).await;
        let action = RemoveMemberAction::new(fx.store.clone());

        for actor in [admin.id, fx.owner.id] {
            let err = action
                .execute(input(fx.team.id, actor, fx.owner_membership.id))
                .await
                .unwrap_err();
            assert!(matches!(err, AccessError::CannotRemoveOwner));
            assert!(err.is_invariant_violation());
        }
        assert_eq!(fx.store.membership_count(fx.team.id), 2);
    }

    #[tokio::test]
    async fn test_editor_cannot_remove_admin() {
        let fx = team_with_owner().await;
        let (editor, _) = fx.store.seed_member(fx.team.id, "e@x.com", Role::Editor).await;
        let (_, admin_membership) = fx.store.seed_member(fx.team.id, "ad@x.com", Role::Admin).await;

        let result = RemoveMemberAction::new(fx.store.clone())
            .execute(input(fx.team.id, editor.id, admin_membership.id))
            .await;
        assert!(matches!(result.unwrap_err(), AccessError::AccessDenied));
    }

    #[tokio::test]
    async fn test_stranger_denied() {
        let fx = team_with_owner().await;
        let stranger = fx.store.seed_user("s", "s@x.com").await;
        let (_, membership) = fx.store.seed_member(fx.team.id, "v@x.com", Role::Viewer).await;

        let result = RemoveMemberAction::new(fx.store.clone())
            .execute(input(fx.team.id, stranger.id, membership.id))
            .await;
        assert!(matches!(result.unwrap_err(), AccessError::AccessDenied));
    }

    #[tokio::test]
    async fn test_pending_member_removal_drops_invite() {
        let fx = team_with_owner().await;
        let (pending, invite) = fx
            .store
            .create_email_invite(CreateEmailInvite {
                uid: Uuid::new_v4(),
                team_id: fx.team.id,
                app_id: None,
                email: "p@x.com".to_owned(),
                role: Role::Viewer,
            })
            .await
            .unwrap();
        assert_eq!(pending.status, MembershipStatus::Pending);

        let output = RemoveMemberAction::new(fx.store.clone())
            .execute(input(fx.team.id, fx.owner.id, pending.id))
            .await
            .unwrap();
        assert!(!output.user_deleted);
        assert_eq!(fx.store.invite_count(fx.team.id), 0);
        assert!(fx.store.find_invite_by_uid(invite.uid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_account_kept_when_member_elsewhere_or_disabled() {
        let fx = team_with_owner().await;
        let other = fx.store.seed_team("Other").await;
        let (user, membership) = fx.store.seed_member(fx.team.id, "e@x.com", Role::Editor).await;
        fx.store
            .create_membership(CreateMembership {
                team_id: other.id,
                user_id: user.id,
                role: Role::Viewer,
                status: MembershipStatus::Ok,
            })
            .await
            .unwrap();

        let output = RemoveMemberAction::new(fx.store.clone())
            .execute(input(fx.team.id, fx.owner.id, membership.id))
            .await
            .unwrap();
        assert!(!output.user_deleted);
        assert!(fx.store.find_user_by_id(user.id).await.unwrap().is_some());

        let (solo, solo_membership) = fx.store.seed_member(fx.team.id, "v@x.com", Role::Viewer).await;
        let keep = RemoveMemberAction::with_config(
            fx.store.clone(),
            RemovalConfig {
                delete_account: false,
            },
        );
        let output = keep
            .execute(input(fx.team.id, fx.owner.id, solo_membership.id))
            .await
            .unwrap();
        assert!(!output.user_deleted);
        assert!(fx.store.find_user_by_id(solo.id).await.unwrap().is_some());
        assert!(fx.store.find_team(other.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_storage_failure_leaves_member() {
        let fx = team_with_owner().await;
        let (user, membership) = fx.store.seed_member(fx.team.id, "e@x.com", Role::Editor).await;
        fx.store.fail_next("remove_member");

        let err = RemoveMemberAction::new(fx.store.clone())
            .execute(input(fx.team.id, fx.owner.id, membership.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Storage { operation: "remove_member", .. }));
        assert!(fx.store.find_membership(fx.team.id, user.id).await.unwrap().is_some());
        assert!(fx.store.find_user_by_id(user.id).await.unwrap().is_some());
    }
}
