use super::repository::MembershipRepository;
use super::types::Membership;
use crate::access::{AttributeEvaluator, ResourceType, Role};
use crate::{AccessError, Entity};

/// A caller resolved against one team.
#[derive(Debug, Clone)]
pub struct Actor {
    pub team_id: i64,
    /// `None` for unauthenticated callers.
    pub user_id: Option<i64>,
    /// The caller's active membership, if any.
    pub membership: Option<Membership>,
    pub role: Role,
}

impl Actor {
    pub fn anonymous(team_id: i64) -> Self {
        Self {
            team_id,
            user_id: None,
            membership: None,
            role: Role::Anonymous,
        }
    }

    pub fn evaluator(&self, resource: ResourceType) -> AttributeEvaluator<'static> {
        AttributeEvaluator::new(self.role, resource)
    }

    /// Turns a policy decision into `AccessDenied`, logging the refusal.
    pub fn require(&self, allowed: bool, operation: &'static str) -> Result<(), AccessError> {
        if allowed {
            return Ok(());
        }

        log::warn!(
            target: "teamgate",
            "msg=\"access denied\", operation=\"{operation}\", team_id={}, user_id={:?}, role=\"{}\"",
            self.team_id,
            self.user_id,
            self.role
        );
        Err(AccessError::AccessDenied)
    }
}

/// Resolves `(team, user)` pairs to roles.
pub struct MembershipDirectory<'s, M: ?Sized> {
    memberships: &'s M,
}

impl<'s, M> MembershipDirectory<'s, M>
where
    M: MembershipRepository + ?Sized,
{
    pub fn new(memberships: &'s M) -> Self {
        Self { memberships }
    }

    /// # Errors
    ///
    /// `NotFound(Membership)` when the user has no membership in the team.
    pub async fn find(&self, team_id: i64, user_id: i64) -> Result<Membership, AccessError> {
        self.memberships
            .find_membership(team_id, user_id)
            .await?
            .ok_or(AccessError::NotFound(Entity::Membership))
    }

    /// # Errors
    ///
    /// `NotFound(Membership)` when the ID does not belong to the team.
    pub async fn find_by_id(
        &self,
        team_id: i64,
        membership_id: i64,
    ) -> Result<Membership, AccessError> {
        self.memberships
            .find_membership_by_id(team_id, membership_id)
            .await?
            .ok_or(AccessError::NotFound(Entity::Membership))
    }

    /// Resolves a caller. Callers without an active membership act as Anonymous.
    pub async fn actor(&self, team_id: i64, user_id: Option<i64>) -> Result<Actor, AccessError> {
        let Some(user_id) = user_id else {
            return Ok(Actor::anonymous(team_id));
        };

        let membership = self
            .memberships
            .find_membership(team_id, user_id)
            .await?
            .filter(Membership::is_active);

        Ok(Actor {
            team_id,
            user_id: Some(user_id),
            role: membership.as_ref().map_or(Role::Anonymous, |m| m.role),
            membership,
        })
    }

    pub async fn role_of(&self, team_id: i64, user_id: Option<i64>) -> Result<Role, AccessError> {
        self.actor(team_id, user_id).await.map(|actor| actor.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::ManageAction;
    use crate::teams::mocks::MockTeamStore;
    use crate::teams::{CreateMembership, MembershipStatus};

    async fn store_with_member(role: Role) -> (MockTeamStore, i64) {
        let store = MockTeamStore::new();
        let team = store.seed_team("acme").await;
        store
            .create_membership(CreateMembership {
                team_id: team.id,
                user_id: 7,
                role,
                status: MembershipStatus::Ok,
            })
            .await
            .unwrap();
        (store, team.id)
    }

    #[tokio::test]
    async fn test_member_resolves_to_role() {
        let (store, team_id) = store_with_member(Role::Editor).await;
        let directory = MembershipDirectory::new(&store);

        assert_eq!(directory.role_of(team_id, Some(7)).await.unwrap(), Role::Editor);
        let actor = directory.actor(team_id, Some(7)).await.unwrap();
        assert!(actor.membership.is_some());
        assert!(actor
            .evaluator(ResourceType::TeamMember)
            .can_manage(ManageAction::RemoveMember));
    }

    #[tokio::test]
    async fn test_strangers_and_anonymous_resolve_to_anonymous() {
        let (store, team_id) = store_with_member(Role::Owner).await;
        let directory = MembershipDirectory::new(&store);

        assert_eq!(directory.role_of(team_id, None).await.unwrap(), Role::Anonymous);
        assert_eq!(directory.role_of(team_id, Some(99)).await.unwrap(), Role::Anonymous);
        // membership in a different team does not carry over
        assert_eq!(directory.role_of(team_id + 1, Some(7)).await.unwrap(), Role::Anonymous);
    }

    #[tokio::test]
    async fn test_find_reports_missing_membership() {
        let (store, team_id) = store_with_member(Role::Viewer).await;
        let directory = MembershipDirectory::new(&store);

        assert!(directory.find(team_id, 7).await.is_ok());
        assert!(matches!(
            directory.find(team_id, 8).await.unwrap_err(),
            AccessError::NotFound(Entity::Membership)
        ));
        assert!(matches!(
            directory.find_by_id(team_id, 1000).await.unwrap_err(),
            AccessError::NotFound(Entity::Membership)
        ));
    }

    #[test]
    fn test_require_maps_denial() {
        let actor = Actor::anonymous(1);
        assert!(actor.require(true, "noop").is_ok());
        assert!(matches!(
            actor.require(false, "noop").unwrap_err(),
            AccessError::AccessDenied
        ));
    }
}
