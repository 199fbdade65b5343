//! The surface a request handler calls.
//!
//! [`TeamGate`] resolves bearer tokens to users, then runs the matching
//! action. Check methods answer with `Ok(bool)`; a missing token or a caller
//! outside the team is evaluated as Anonymous, while a token that does not
//! resolve is `Unauthenticated`.

use crate::access::{ActionCategory, AttributeEvaluator, ManageAction, ResourceType, Role};
use crate::crypto::{Argon2Hasher, PasswordHasher};
use crate::teams::{
    ChangeMemberRoleAction, ChangeMemberRoleInput, ChangeMemberRoleOutput,
    ConfigureInviteLinkAction, ConfigureInviteLinkInput, DeleteAccountAction, EmailInviteInput,
    EmailInviteOutput, Identity, IdentityProvider, InviteLinkInput, InviteLinkOutput,
    InviteNotifier, JoinTeamAction, JoinTeamInput, JoinTeamOutput, ListTeamMembersAction,
    MembershipDirectory, RemoveMemberAction, RemoveMemberInput, RemoveMemberOutput,
    RequestEmailInviteAction, RequestInviteLinkAction, SignupAction, SignupInput, SignupOutput,
    Team, TeamMember, TeamPermission, TeamRepository, TeamStore, UpdateTeamPermissionAction,
    UpdateTeamPermissionInput,
};
use crate::{AccessError, Entity, SecretString, TeamGateConfig};

pub struct TeamGate<S, N, I, H = Argon2Hasher> {
    store: S,
    notifier: N,
    identities: I,
    hasher: H,
    config: TeamGateConfig,
}

impl<S, N, I> TeamGate<S, N, I>
where
    S: TeamStore,
    N: InviteNotifier + Clone,
    I: IdentityProvider,
{
    pub fn new(store: S, notifier: N, identities: I) -> Self {
        Self::with_config(store, notifier, identities, TeamGateConfig::default())
    }

    pub fn with_config(store: S, notifier: N, identities: I, config: TeamGateConfig) -> Self {
        Self {
            store,
            notifier,
            identities,
            hasher: Argon2Hasher::default(),
            config,
        }
    }
}

impl<S, N, I, H> TeamGate<S, N, I, H>
where
    S: TeamStore,
    N: InviteNotifier + Clone,
    I: IdentityProvider,
    H: PasswordHasher + Clone,
{
    pub fn with_hasher<H2: PasswordHasher + Clone>(self, hasher: H2) -> TeamGate<S, N, I, H2> {
        TeamGate {
            store: self.store,
            notifier: self.notifier,
            identities: self.identities,
            hasher,
            config: self.config,
        }
    }

    pub fn config(&self) -> &TeamGateConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn identify(&self, bearer: &SecretString) -> Result<Identity, AccessError> {
        self.identities.resolve(bearer).await
    }

    async fn user_id(&self, bearer: Option<&SecretString>) -> Result<Option<i64>, AccessError> {
        match bearer {
            Some(bearer) => Ok(Some(self.identify(bearer).await?.user_id)),
            None => Ok(None),
        }
    }

    async fn team(&self, team_id: i64) -> Result<Team, AccessError> {
        self.store
            .find_team(team_id)
            .await?
            .ok_or(AccessError::NotFound(Entity::Team))
    }

    /// The caller's role in a team; Anonymous without a token or membership.
    pub async fn role_in(
        &self,
        team_id: i64,
        bearer: Option<&SecretString>,
    ) -> Result<Role, AccessError> {
        let user_id = self.user_id(bearer).await?;
        MembershipDirectory::new(&self.store)
            .role_of(team_id, user_id)
            .await
    }

    pub async fn evaluator(
        &self,
        team_id: i64,
        bearer: Option<&SecretString>,
        resource: ResourceType,
    ) -> Result<AttributeEvaluator<'static>, AccessError> {
        let role = self.role_in(team_id, bearer).await?;
        Ok(AttributeEvaluator::new(role, resource))
    }

    /// Raw check. Unknown resource or action IDs deny.
    pub async fn check(
        &self,
        team_id: i64,
        bearer: Option<&SecretString>,
        category: ActionCategory,
        resource_id: u16,
        action_id: u16,
    ) -> Result<bool, AccessError> {
        let Some(resource) = ResourceType::from_id(resource_id) else {
            log::debug!(
                target: "teamgate",
                "msg=\"check on unknown resource type\", resource_id={resource_id}"
            );
            return Ok(false);
        };

        let evaluator = self.evaluator(team_id, bearer, resource).await?;
        let allowed = evaluator.check(category, action_id);
        log::debug!(
            target: "teamgate",
            "msg=\"permission check\", team_id={team_id}, role=\"{}\", category=\"{category}\", resource=\"{resource}\", action_id={action_id}, allowed={allowed}",
            evaluator.role()
        );
        Ok(allowed)
    }

    pub async fn can_access(
        &self,
        team_id: i64,
        bearer: Option<&SecretString>,
        resource_id: u16,
        action_id: u16,
    ) -> Result<bool, AccessError> {
        self.check(team_id, bearer, ActionCategory::Access, resource_id, action_id)
            .await
    }

    pub async fn can_delete(
        &self,
        team_id: i64,
        bearer: Option<&SecretString>,
        resource_id: u16,
        action_id: u16,
    ) -> Result<bool, AccessError> {
        self.check(team_id, bearer, ActionCategory::Delete, resource_id, action_id)
            .await
    }

    pub async fn can_manage(
        &self,
        team_id: i64,
        bearer: Option<&SecretString>,
        resource_id: u16,
        action_id: u16,
    ) -> Result<bool, AccessError> {
        self.check(team_id, bearer, ActionCategory::Manage, resource_id, action_id)
            .await
    }

    pub async fn can_manage_special(
        &self,
        team_id: i64,
        bearer: Option<&SecretString>,
        resource_id: u16,
        action_id: u16,
    ) -> Result<bool, AccessError> {
        self.check(team_id, bearer, ActionCategory::Special, resource_id, action_id)
            .await
    }

    /// Whether the caller may move a member from `from` to `to`.
    pub async fn can_modify_role(
        &self,
        team_id: i64,
        bearer: Option<&SecretString>,
        from: Role,
        to: Role,
    ) -> Result<bool, AccessError> {
        let evaluator = self
            .evaluator(team_id, bearer, ResourceType::TeamMember)
            .await?;
        Ok(evaluator.can_manage(ManageAction::ManageRole)
            && evaluator.can_modify_role_transition(from, to))
    }

    /// Whether the caller may invite someone at `role`, team toggles included.
    pub async fn can_invite_as(
        &self,
        team_id: i64,
        bearer: Option<&SecretString>,
        role: Role,
    ) -> Result<bool, AccessError> {
        let team = self.team(team_id).await?;
        let evaluator = self.evaluator(team.id, bearer, ResourceType::Invite).await?;
        if evaluator.is_editor_or_viewer() && !team.permission.allows_invite_from(evaluator.role()) {
            return Ok(false);
        }
        Ok(evaluator.can_sponsor_invite_at_role(role))
    }

    pub async fn request_email_invite(
        &self,
        bearer: &SecretString,
        team_id: i64,
        email: &str,
        role: Role,
        app_id: Option<i64>,
    ) -> Result<EmailInviteOutput, AccessError> {
        let inviter = self.identify(bearer).await?;
        RequestEmailInviteAction::with_config(
            self.store.clone(),
            self.notifier.clone(),
            self.config.invite.clone(),
        )
        .execute(EmailInviteInput {
            team_id,
            inviter_id: inviter.user_id,
            email: email.to_owned(),
            role,
            app_id,
        })
        .await
    }

    pub async fn request_invite_link(
        &self,
        bearer: &SecretString,
        team_id: i64,
        role: Role,
        renew: bool,
        app_id: Option<i64>,
    ) -> Result<InviteLinkOutput, AccessError> {
        let inviter = self.identify(bearer).await?;
        RequestInviteLinkAction::with_config(self.store.clone(), self.config.invite.clone())
            .execute(InviteLinkInput {
                team_id,
                inviter_id: inviter.user_id,
                role,
                renew,
                app_id,
            })
            .await
    }

    pub async fn configure_invite_link(
        &self,
        bearer: &SecretString,
        team_id: i64,
        enabled: bool,
    ) -> Result<TeamPermission, AccessError> {
        let actor = self.identify(bearer).await?;
        ConfigureInviteLinkAction::new(self.store.clone())
            .execute(ConfigureInviteLinkInput {
                team_id,
                actor_id: actor.user_id,
                enabled,
            })
            .await
    }

    pub async fn join_team(
        &self,
        bearer: &SecretString,
        invite_token: SecretString,
    ) -> Result<JoinTeamOutput, AccessError> {
        let user = self.identify(bearer).await?;
        JoinTeamAction::new(self.store.clone())
            .execute(JoinTeamInput {
                user_id: user.user_id,
                invite_token,
            })
            .await
    }

    pub async fn signup(&self, input: SignupInput) -> Result<SignupOutput, AccessError> {
        SignupAction::with_config(
            self.store.clone(),
            self.hasher.clone(),
            self.config.signup.clone(),
        )
        .execute(input)
        .await
    }

    pub async fn remove_member(
        &self,
        bearer: &SecretString,
        team_id: i64,
        membership_id: i64,
    ) -> Result<RemoveMemberOutput, AccessError> {
        let actor = self.identify(bearer).await?;
        RemoveMemberAction::with_config(self.store.clone(), self.config.removal.clone())
            .execute(RemoveMemberInput {
                team_id,
                actor_id: actor.user_id,
                membership_id,
            })
            .await
    }

    pub async fn change_member_role(
        &self,
        bearer: &SecretString,
        team_id: i64,
        membership_id: i64,
        role: Role,
    ) -> Result<ChangeMemberRoleOutput, AccessError> {
        let actor = self.identify(bearer).await?;
        ChangeMemberRoleAction::new(self.store.clone())
            .execute(ChangeMemberRoleInput {
                team_id,
                actor_id: actor.user_id,
                membership_id,
                role,
            })
            .await
    }

    pub async fn list_team_members(
        &self,
        bearer: &SecretString,
        team_id: i64,
    ) -> Result<Vec<TeamMember>, AccessError> {
        let actor = self.identify(bearer).await?;
        ListTeamMembersAction::new(self.store.clone())
            .execute(team_id, actor.user_id)
            .await
    }

    pub async fn update_team_permission(
        &self,
        bearer: &SecretString,
        team_id: i64,
        permission: TeamPermission,
    ) -> Result<Team, AccessError> {
        let actor = self.identify(bearer).await?;
        UpdateTeamPermissionAction::new(self.store.clone())
            .execute(UpdateTeamPermissionInput {
                team_id,
                actor_id: actor.user_id,
                permission,
            })
            .await
    }

    /// Deletes the caller's own account.
    pub async fn delete_account(&self, bearer: &SecretString) -> Result<(), AccessError> {
        let user = self.identify(bearer).await?;
        DeleteAccountAction::new(self.store.clone())
            .execute(user.user_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessAction, SpecialAction};
    use crate::teams::mocks::{MockIdentityProvider, MockInviteNotifier, MockTeamStore};

    type Gate = TeamGate<MockTeamStore, MockInviteNotifier, MockIdentityProvider>;

    fn gate(store: &MockTeamStore, identities: &MockIdentityProvider) -> Gate {
        TeamGate::new(store.clone(), MockInviteNotifier::new(), identities.clone())
            .with_hasher(Argon2Hasher::new(4096, 1, 1))
    }

    #[tokio::test]
    async fn test_roles_resolve_from_bearer() {
        let store = MockTeamStore::new();
        let identities = MockIdentityProvider::new();
        let team = store.seed_team("Acme").await;
        let (editor, _) = store.seed_member(team.id, "e@x.com", Role::Editor).await;
        let outsider = store.seed_user("o", "o@x.com").await;
        let gate = gate(&store, &identities);

        let editor_token = identities.issue(&editor);
        let outsider_token = identities.issue(&outsider);

        assert_eq!(gate.role_in(team.id, Some(&editor_token)).await.unwrap(), Role::Editor);
        assert_eq!(gate.role_in(team.id, Some(&outsider_token)).await.unwrap(), Role::Anonymous);
        assert_eq!(gate.role_in(team.id, None).await.unwrap(), Role::Anonymous);
        assert!(matches!(
            gate.role_in(team.id, Some(&SecretString::new("forged"))).await.unwrap_err(),
            AccessError::Unauthenticated
        ));
    }

    #[tokio::test]
    async fn test_raw_checks() {
        let store = MockTeamStore::new();
        let identities = MockIdentityProvider::new();
        let team = store.seed_team("Acme").await;
        let (owner, _) = store.seed_member(team.id, "owner@x.com", Role::Owner).await;
        let gate = gate(&store, &identities);
        let token = identities.issue(&owner);

        let billing = ResourceType::Billing.id();
        assert!(gate
            .can_access(team.id, Some(&token), billing, AccessAction::View.id())
            .await
            .unwrap());
        assert!(!gate
            .can_access(team.id, None, billing, AccessAction::View.id())
            .await
            .unwrap());
        assert!(gate
            .can_manage_special(
                team.id,
                Some(&token),
                ResourceType::TeamMember.id(),
                SpecialAction::TransferOwner.id()
            )
            .await
            .unwrap());
        // unknown IDs deny instead of failing
        assert!(!gate.can_delete(team.id, Some(&token), 999, 1).await.unwrap());
        assert!(!gate
            .can_manage(team.id, Some(&token), ResourceType::Team.id(), 999)
            .await
            .unwrap());
        assert!(gate
            .can_manage(
                team.id,
                Some(&token),
                ResourceType::Team.id(),
                ManageAction::TeamName.id()
            )
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_invite_checks_follow_team_toggle() {
        let store = MockTeamStore::new();
        let identities = MockIdentityProvider::new();
        let team = store.seed_team("Acme").await;
        let (editor, _) = store.seed_member(team.id, "e@x.com", Role::Editor).await;
        let gate = gate(&store, &identities);
        let token = identities.issue(&editor);

        assert!(gate.can_invite_as(team.id, Some(&token), Role::Viewer).await.unwrap());
        assert!(!gate.can_invite_as(team.id, Some(&token), Role::Owner).await.unwrap());
        assert!(!gate.can_modify_role(team.id, Some(&token), Role::Admin, Role::Viewer).await.unwrap());
        assert!(gate.can_modify_role(team.id, Some(&token), Role::Viewer, Role::Editor).await.unwrap());

        store
            .update_team_permission(
                team.id,
                TeamPermission {
                    allow_editor_invite: false,
                    ..TeamPermission::default()
                },
            )
            .await
            .unwrap();
        assert!(!gate.can_invite_as(team.id, Some(&token), Role::Viewer).await.unwrap());
    }

    #[tokio::test]
    async fn test_operations_require_valid_bearer() {
        let store = MockTeamStore::new();
        let identities = MockIdentityProvider::new();
        let team = store.seed_team("Acme").await;
        let gate = gate(&store, &identities);

        let result = gate
            .request_invite_link(&SecretString::new("nope"), team.id, Role::Viewer, false, None)
            .await;
        assert!(matches!(result.unwrap_err(), AccessError::Unauthenticated));
    }
}
