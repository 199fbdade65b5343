use chrono::Utc;

use super::load_team;
use crate::access::{AccessAction, ManageAction, ResourceType, Role};
use crate::config::InviteConfig;
use crate::events::{TeamEvent, dispatch};
use crate::teams::directory::MembershipDirectory;
use crate::teams::repository::{CreateInvite, TeamStore};
use crate::teams::token::{Base64InviteCodec, InviteTokenCodec};
use crate::teams::types::{Invite, Team, TeamPermission};
use crate::{AccessError, Entity, SecretString};

#[derive(Debug, Clone)]
pub struct InviteLinkInput {
    pub team_id: i64,
    pub inviter_id: i64,
    pub role: Role,
    /// Replace the current link for this role with a fresh one.
    pub renew: bool,
    /// Decorates the returned link only; link invites are never app-scoped in storage.
    pub app_id: Option<i64>,
}

#[derive(Debug)]
pub struct InviteLinkOutput {
    pub invite: Invite,
    pub token: SecretString,
    pub join_link: String,
    /// Whether this call created the invite.
    pub issued: bool,
}

/// Returns, creates or renews the shareable invite link for `(team, role)`.
///
/// Authorization matches email invites, and the team's invite-link toggle
/// must be on for every role. There is at most one active link per
/// `(team, role)`; renewing deletes the old one in the same transaction
/// that stores its replacement.
pub struct RequestInviteLinkAction<S, C = Base64InviteCodec> {
    store: S,
    codec: C,
    config: InviteConfig,
}

impl<S: TeamStore> RequestInviteLinkAction<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, InviteConfig::default())
    }

    pub fn with_config(store: S, config: InviteConfig) -> Self {
        Self {
            store,
            codec: Base64InviteCodec,
            config,
        }
    }
}

impl<S: TeamStore, C: InviteTokenCodec> RequestInviteLinkAction<S, C> {
    pub fn with_codec(store: S, codec: C, config: InviteConfig) -> Self {
        Self {
            store,
            codec,
            config,
        }
    }

    /// # Returns
    ///
    /// - `Ok(output)` - the active link for the role
    /// - `Err(AccessError::AccessDenied)` - inviter may not invite at this role
    /// - `Err(AccessError::PermissionClosedByTeam)` - invite links or member invites are off
    /// - `Err(_)` - lookup or storage errors
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "request_invite_link", skip_all, err)
    )]
    pub async fn execute(&self, input: InviteLinkInput) -> Result<InviteLinkOutput, AccessError> {
        let team = load_team(&self.store, input.team_id).await?;
        let actor = MembershipDirectory::new(&self.store)
            .actor(team.id, Some(input.inviter_id))
            .await?;

        let evaluator = actor.evaluator(ResourceType::Invite);
        actor.require(
            evaluator.can_access(AccessAction::InviteByLink)
                && evaluator.can_sponsor_invite_at_role(input.role),
            "request_invite_link",
        )?;

        if evaluator.is_editor_or_viewer() && !team.permission.allows_invite_from(actor.role) {
            return Err(AccessError::PermissionClosedByTeam("member invites"));
        }
        if !team.permission.invite_link_enabled {
            return Err(AccessError::PermissionClosedByTeam("invite link"));
        }

        let (invite, issued) = if input.renew {
            let invite = self
                .store
                .replace_link_invite(CreateInvite::link(team.id, input.role))
                .await?;
            self.announce(&team, &invite, true).await;
            (invite, true)
        } else {
            self.find_or_issue(&team, input.role).await?
        };

        let token = self.codec.encode(invite.uid);
        let join_link = self.config.join_link(&token, None, input.app_id);

        Ok(InviteLinkOutput {
            invite,
            token: SecretString::new(token),
            join_link,
            issued,
        })
    }

    async fn find_or_issue(&self, team: &Team, role: Role) -> Result<(Invite, bool), AccessError> {
        if let Some(existing) = self.store.find_active_link_invite(team.id, role).await? {
            return Ok((existing, false));
        }

        match self.store.create_invite(CreateInvite::link(team.id, role)).await {
            Ok(invite) => {
                self.announce(team, &invite, false).await;
                Ok((invite, true))
            }
            // lost a race with a concurrent issue for the same role
            Err(AccessError::AlreadyExists(Entity::Invite)) => self
                .store
                .find_active_link_invite(team.id, role)
                .await?
                .map(|invite| (invite, false))
                .ok_or(AccessError::NotFound(Entity::Invite)),
            Err(err) => Err(err),
        }
    }

    async fn announce(&self, team: &Team, invite: &Invite, renewed: bool) {
        log::info!(
            target: "teamgate",
            "msg=\"invite link {}\", team_id={}, invite_id={}, role=\"{}\"",
            if renewed { "renewed" } else { "issued" },
            team.id,
            invite.id,
            invite.role
        );

        let event = if renewed {
            TeamEvent::InviteLinkRenewed {
                team_id: team.id,
                invite_id: invite.id,
                role: invite.role,
                at: Utc::now(),
            }
        } else {
            TeamEvent::InviteLinkIssued {
                team_id: team.id,
                invite_id: invite.id,
                role: invite.role,
                at: Utc::now(),
            }
        };
        dispatch(event).await;
    }
}

#[derive(Debug, Clone)]
pub struct ConfigureInviteLinkInput {
    pub team_id: i64,
    pub actor_id: i64,
    pub enabled: bool,
}

/// Turns the team's invite links on or off.
pub struct ConfigureInviteLinkAction<S> {
    store: S,
}

impl<S: TeamStore> ConfigureInviteLinkAction<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "configure_invite_link", skip_all, err)
    )]
    pub async fn execute(&self, input: ConfigureInviteLinkInput) -> Result<TeamPermission, AccessError> {
        let team = load_team(&self.store, input.team_id).await?;
        let actor = MembershipDirectory::new(&self.store)
            .actor(team.id, Some(input.actor_id))
            .await?;
        actor.require(
            actor
                .evaluator(ResourceType::Invite)
                .can_manage(ManageAction::InviteLink),
            "configure_invite_link",
        )?;

        let permission = TeamPermission {
            invite_link_enabled: input.enabled,
            ..team.permission
        };
        let team = self.store.update_team_permission(team.id, permission).await?;

        log::info!(
            target: "teamgate",
            "msg=\"invite link toggled\", team_id={}, enabled={}",
            team.id,
            input.enabled
        );
        dispatch(TeamEvent::TeamPermissionUpdated {
            team_id: team.id,
            updated_by: input.actor_id,
            at: Utc::now(),
        })
        .await;

        Ok(team.permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::teams::InviteRepository;
    use crate::teams::actions::fixtures::{team_with_owner, team_with_permission};
    use crate::teams::mocks::MockTeamStore;

    fn input(team_id: i64, inviter_id: i64, role: Role, renew: bool) -> InviteLinkInput {
        InviteLinkInput {
            team_id,
            inviter_id,
            role,
            renew,
            app_id: None,
        }
    }

    fn action(store: &MockTeamStore) -> RequestInviteLinkAction<MockTeamStore> {
        RequestInviteLinkAction::new(store.clone())
    }

    #[tokio::test]
    async fn test_link_is_reused_until_renewed() {
        let fx = team_with_owner().await;
        let action = action(&fx.store);

        let first = action
            .execute(input(fx.team.id, fx.owner.id, Role::Editor, false))
            .await
            .unwrap();
        assert!(first.issued);
        assert!(first.invite.is_link());
        assert!(first.invite.email.is_empty());

        let again = action
            .execute(input(fx.team.id, fx.owner.id, Role::Editor, false))
            .await
            .unwrap();
        assert!(!again.issued);
        assert_eq!(again.invite.uid, first.invite.uid);

        let renewed = action
            .execute(input(fx.team.id, fx.owner.id, Role::Editor, true))
            .await
            .unwrap();
        assert_ne!(renewed.invite.uid, first.invite.uid);
        assert_eq!(fx.store.invite_count(fx.team.id), 1);
        assert!(fx.store.find_invite_by_uid(first.invite.uid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_links_are_per_role() {
        let fx = team_with_owner().await;
        let action = action(&fx.store);

        let editor = action
            .execute(input(fx.team.id, fx.owner.id, Role::Editor, false))
            .await
            .unwrap();
        let viewer = action
            .execute(input(fx.team.id, fx.owner.id, Role::Viewer, false))
            .await
            .unwrap();
        assert_ne!(editor.invite.id, viewer.invite.id);

        action
            .execute(input(fx.team.id, fx.owner.id, Role::Viewer, true))
            .await
            .unwrap();
        let editor_link = fx
            .store
            .find_active_link_invite(fx.team.id, Role::Editor)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(editor_link.uid, editor.invite.uid);
    }

    #[tokio::test]
    async fn test_disabled_links_refused_for_every_role() {
        let fx = team_with_permission(TeamPermission {
            invite_link_enabled: false,
            ..TeamPermission::default()
        })
        .await;

        let result = action(&fx.store)
            .execute(input(fx.team.id, fx.owner.id, Role::Viewer, false))
            .await;
        assert!(matches!(
            result.unwrap_err(),
            AccessError::PermissionClosedByTeam("invite link")
        ));
    }

    #[tokio::test]
    async fn test_viewer_link_rules() {
        let fx = team_with_owner().await;
        let (viewer, _) = fx.store.seed_member(fx.team.id, "v@x.com", Role::Viewer).await;
        let action = action(&fx.store);

        assert!(action
            .execute(input(fx.team.id, viewer.id, Role::Viewer, false))
            .await
            .is_ok());
        assert!(matches!(
            action
                .execute(input(fx.team.id, viewer.id, Role::Editor, false))
                .await
                .unwrap_err(),
            AccessError::AccessDenied
        ));
    }

    #[tokio::test]
    async fn test_app_id_only_decorates_link() {
        let fx = team_with_owner().await;
        let output = action(&fx.store)
            .execute(InviteLinkInput {
                app_id: Some(5),
                ..input(fx.team.id, fx.owner.id, Role::Viewer, false)
            })
            .await
            .unwrap();
        assert!(output.join_link.ends_with("&appID=5"));
        assert_eq!(output.invite.app_id, None);
    }

    #[tokio::test]
    async fn test_configure_invite_link() {
        let fx = team_with_owner().await;
        let (editor, _) = fx.store.seed_member(fx.team.id, "e@x.com", Role::Editor).await;
        let configure = ConfigureInviteLinkAction::new(fx.store.clone());

        let denied = configure
            .execute(ConfigureInviteLinkInput {
                team_id: fx.team.id,
                actor_id: editor.id,
                enabled: false,
            })
            .await;
        assert!(matches!(denied.unwrap_err(), AccessError::AccessDenied));

        let permission = configure
            .execute(ConfigureInviteLinkInput {
                team_id: fx.team.id,
                actor_id: fx.owner.id,
                enabled: false,
            })
            .await
            .unwrap();
        assert!(!permission.invite_link_enabled);
        assert!(permission.allow_editor_invite);

        let result = action(&fx.store)
            .execute(input(fx.team.id, fx.owner.id, Role::Viewer, false))
            .await;
        assert!(matches!(
            result.unwrap_err(),
            AccessError::PermissionClosedByTeam(_)
        ));
    }
}
