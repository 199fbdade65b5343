use std::collections::HashMap;

use super::load_team;
use crate::access::{AccessAction, ResourceType};
use crate::teams::directory::MembershipDirectory;
use crate::teams::repository::TeamStore;
use crate::teams::types::{Membership, TeamMember, TeamMemberUser};
use crate::AccessError;

/// Lists a team's members, newest first.
///
/// Pending memberships appear with the invited address and no user.
pub struct ListTeamMembersAction<S> {
    store: S,
}

impl<S: TeamStore> ListTeamMembersAction<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "list_team_members", skip_all, err)
    )]
    pub async fn execute(&self, team_id: i64, actor_id: i64) -> Result<Vec<TeamMember>, AccessError> {
        let team = load_team(&self.store, team_id).await?;
        let actor = MembershipDirectory::new(&self.store)
            .actor(team.id, Some(actor_id))
            .await?;
        actor.require(
            actor
                .evaluator(ResourceType::TeamMember)
                .can_access(AccessAction::View),
            "list_team_members",
        )?;

        let invited: HashMap<i64, String> = self
            .store
            .list_email_invites(team.id)
            .await?
            .into_iter()
            .filter_map(|invite| invite.team_member_id.map(|id| (id, invite.email)))
            .collect();

        let memberships = self.store.list_team_memberships(team.id).await?;
        let mut members = Vec::with_capacity(memberships.len());
        for membership in memberships {
            members.push(self.describe(membership, &invited).await?);
        }
        Ok(members)
    }

    async fn describe(
        &self,
        membership: Membership,
        invited: &HashMap<i64, String>,
    ) -> Result<TeamMember, AccessError> {
        let (user, email) = if membership.is_pending() {
            (None, invited.get(&membership.id).cloned().unwrap_or_default())
        } else {
            match self.store.find_user_by_id(membership.user_id).await? {
                Some(user) => (
                    Some(TeamMemberUser {
                        id: user.id,
                        uid: user.uid,
                        nickname: user.nickname,
                        avatar: user.avatar,
                    }),
                    user.email,
                ),
                None => {
                    log::warn!(
                        target: "teamgate",
                        "msg=\"membership without user\", team_id={}, membership_id={}, user_id={}",
                        membership.team_id,
                        membership.id,
                        membership.user_id
                    );
                    (None, String::new())
                }
            }
        };

        Ok(TeamMember {
            membership_id: membership.id,
            user,
            email,
            role: membership.role,
            status: membership.status,
            created_at: membership.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::teams::actions::fixtures::team_with_owner;
    use crate::teams::repository::CreateEmailInvite;
    use crate::teams::types::MembershipStatus;
    use crate::teams::TeamTransactions;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_lists_active_and_pending_members() {
        let fx = team_with_owner().await;
        fx.store.seed_member(fx.team.id, "v@x.com", Role::Viewer).await;
        let (pending, _) = fx
            .store
            .create_email_invite(CreateEmailInvite {
                uid: Uuid::new_v4(),
                team_id: fx.team.id,
                app_id: None,
                email: "p@x.com".to_owned(),
                role: Role::Editor,
            })
            .await
            .unwrap();

        let members = ListTeamMembersAction::new(fx.store.clone())
            .execute(fx.team.id, fx.owner.id)
            .await
            .unwrap();

        assert_eq!(members.len(), 3);
        assert_eq!(members[0].membership_id, pending.id);
        assert_eq!(members[0].email, "p@x.com");
        assert_eq!(members[0].status, MembershipStatus::Pending);
        assert!(members[0].user.is_none());

        let owner = members.iter().find(|m| m.role == Role::Owner).unwrap();
        assert_eq!(owner.email, "owner@x.com");
        assert_eq!(owner.user.as_ref().map(|u| u.id), Some(fx.owner.id));
    }

    #[tokio::test]
    async fn test_viewers_may_list_strangers_may_not() {
        let fx = team_with_owner().await;
        let (viewer, _) = fx.store.seed_member(fx.team.id, "v@x.com", Role::Viewer).await;
        let stranger = fx.store.seed_user("s", "s@x.com").await;
        let action = ListTeamMembersAction::new(fx.store.clone());

        assert_eq!(action.execute(fx.team.id, viewer.id).await.unwrap().len(), 2);
        assert!(matches!(
            action.execute(fx.team.id, stranger.id).await.unwrap_err(),
            AccessError::AccessDenied
        ));
    }
}
