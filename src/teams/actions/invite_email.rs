use chrono::Utc;
use uuid::Uuid;

use super::load_team;
use crate::access::{AccessAction, ResourceType, Role};
use crate::config::InviteConfig;
use crate::events::{TeamEvent, dispatch};
use crate::teams::directory::MembershipDirectory;
use crate::teams::notifier::{InviteNotification, InviteNotifier, NotificationKind};
use crate::teams::repository::{CreateEmailInvite, TeamStore};
use crate::teams::token::{Base64InviteCodec, InviteTokenCodec};
use crate::teams::types::{EmailDeliveryStatus, Invite, Team};
use crate::validators::{normalize_email, validate_email};
use crate::{AccessError, SecretString};

#[derive(Debug, Clone)]
pub struct EmailInviteInput {
    pub team_id: i64,
    pub inviter_id: i64,
    pub email: String,
    pub role: Role,
    /// Share a single app instead of the whole team.
    pub app_id: Option<i64>,
}

/// What happened to the `(team, email)` invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailInviteDisposition {
    /// New invite and pending membership.
    Created,
    /// Same role as before; notification sent again.
    Resent,
    /// Existing invite and its pending membership moved to the new role.
    RoleChanged { from: Role },
}

#[derive(Debug)]
pub struct EmailInviteOutput {
    pub invite: Invite,
    pub disposition: EmailInviteDisposition,
    pub token: SecretString,
    pub join_link: String,
}

/// Invites an email address into a team.
///
/// This action:
/// 1. Checks the inviter may invite at the requested role
/// 2. Checks the team lets editors/viewers invite, when the inviter is one
/// 3. Resends, or changes the role of, an existing invite for the address
/// 4. Otherwise refuses addresses that already belong to a member
/// 5. Otherwise creates a pending membership and its invite together
/// 6. Sends the notification and records the delivery status
///
/// A failed send keeps the invite and returns `AccessError::DeliveryFailed`
/// carrying it.
pub struct RequestEmailInviteAction<S, N, C = Base64InviteCodec> {
    store: S,
    notifier: N,
    codec: C,
    config: InviteConfig,
}

impl<S: TeamStore, N: InviteNotifier> RequestEmailInviteAction<S, N> {
    pub fn new(store: S, notifier: N) -> Self {
        Self::with_config(store, notifier, InviteConfig::default())
    }

    pub fn with_config(store: S, notifier: N, config: InviteConfig) -> Self {
        Self {
            store,
            notifier,
            codec: Base64InviteCodec,
            config,
        }
    }
}

impl<S: TeamStore, N: InviteNotifier, C: InviteTokenCodec> RequestEmailInviteAction<S, N, C> {
    pub fn with_codec(store: S, notifier: N, codec: C, config: InviteConfig) -> Self {
        Self {
            store,
            notifier,
            codec,
            config,
        }
    }

    /// # Returns
    ///
    /// - `Ok(output)` - invite created, resent or moved to the new role
    /// - `Err(AccessError::AccessDenied)` - inviter may not invite at this role
    /// - `Err(AccessError::PermissionClosedByTeam)` - team closed editor/viewer invites
    /// - `Err(AccessError::EmailAlreadyUsed)` - address belongs to an active member
    /// - `Err(AccessError::DeliveryFailed)` - invite stored, notification failed
    /// - `Err(_)` - validation, lookup or storage errors
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "request_email_invite", skip_all, err)
    )]
    pub async fn execute(&self, input: EmailInviteInput) -> Result<EmailInviteOutput, AccessError> {
        let email = normalize_email(&input.email);
        validate_email(&email)?;

        let team = load_team(&self.store, input.team_id).await?;
        let actor = MembershipDirectory::new(&self.store)
            .actor(team.id, Some(input.inviter_id))
            .await?;

        let evaluator = actor.evaluator(ResourceType::Invite);
        actor.require(
            evaluator.can_access(AccessAction::InviteByEmail)
                && evaluator.can_sponsor_invite_at_role(input.role),
            "request_email_invite",
        )?;

        if evaluator.is_editor_or_viewer() && !team.permission.allows_invite_from(actor.role) {
            return Err(AccessError::PermissionClosedByTeam("member invites"));
        }

        let (invite, disposition) = match self
            .store
            .find_active_email_invite(team.id, &email)
            .await?
        {
            // a resend keeps the stored invite, app scope included
            Some(invite) if invite.role == input.role => {
                dispatch(TeamEvent::InviteResent {
                    team_id: team.id,
                    invite_id: invite.id,
                    at: Utc::now(),
                })
                .await;
                (invite, EmailInviteDisposition::Resent)
            }
            Some(existing) => {
                let from = existing.role;
                let (_, invite) = self.store.change_invite_role(existing.id, input.role).await?;
                let invite = self.refresh_app_scope(invite, input.app_id).await?;

                log::info!(
                    target: "teamgate",
                    "msg=\"invite role changed\", team_id={}, invite_id={}, from=\"{}\", to=\"{}\"",
                    team.id,
                    invite.id,
                    from,
                    invite.role
                );
                dispatch(TeamEvent::InviteRoleChanged {
                    team_id: team.id,
                    invite_id: invite.id,
                    from,
                    to: invite.role,
                    at: Utc::now(),
                })
                .await;
                (invite, EmailInviteDisposition::RoleChanged { from })
            }
            None => {
                self.ensure_not_member(&team, &email).await?;

                let (membership, invite) = self
                    .store
                    .create_email_invite(CreateEmailInvite {
                        uid: Uuid::new_v4(),
                        team_id: team.id,
                        app_id: input.app_id,
                        email: email.clone(),
                        role: input.role,
                    })
                    .await?;

                log::info!(
                    target: "teamgate",
                    "msg=\"invite created\", team_id={}, invite_id={}, membership_id={}, email=\"{}\", role=\"{}\"",
                    team.id,
                    invite.id,
                    membership.id,
                    invite.email,
                    invite.role
                );
                dispatch(TeamEvent::InviteCreated {
                    team_id: team.id,
                    invite_id: invite.id,
                    email: invite.email.clone(),
                    role: invite.role,
                    at: Utc::now(),
                })
                .await;
                (invite, EmailInviteDisposition::Created)
            }
        };

        let token = self.codec.encode(invite.uid);
        let join_link = self
            .config
            .join_link(&token, Some(&invite.email), invite.app_id);
        let invite = self
            .deliver(&team, input.inviter_id, invite, &join_link)
            .await?;

        Ok(EmailInviteOutput {
            invite,
            disposition,
            token: SecretString::new(token),
            join_link,
        })
    }

    async fn ensure_not_member(&self, team: &Team, email: &str) -> Result<(), AccessError> {
        let Some(user) = self.store.find_user_by_email(email).await? else {
            return Ok(());
        };

        let membership = self.store.find_membership(team.id, user.id).await?;
        if membership.is_some_and(|m| m.is_active()) {
            return Err(AccessError::EmailAlreadyUsed);
        }
        Ok(())
    }

    /// A role change re-issues the invite, so it takes the new request's app scope.
    async fn refresh_app_scope(
        &self,
        mut invite: Invite,
        app_id: Option<i64>,
    ) -> Result<Invite, AccessError> {
        if app_id.is_none() || invite.app_id == app_id {
            return Ok(invite);
        }
        invite.app_id = app_id;
        self.store.update_invite(&invite).await
    }

    /// Sends the notification and persists the outcome on the invite.
    async fn deliver(
        &self,
        team: &Team,
        inviter_id: i64,
        mut invite: Invite,
        join_link: &str,
    ) -> Result<Invite, AccessError> {
        let inviter = self.store.find_user_by_id(inviter_id).await?;
        let (inviter_nickname, language) = inviter
            .map(|user| (user.nickname, user.language))
            .unwrap_or_default();

        let notification = InviteNotification {
            kind: if invite.app_id.is_some() {
                NotificationKind::ShareApp
            } else {
                NotificationKind::JoinTeam
            },
            recipient: invite.email.clone(),
            team_name: team.name.clone(),
            team_icon: team.icon.clone(),
            inviter_nickname,
            language,
            role: invite.role,
            join_link: join_link.to_owned(),
        };

        let outcome = self.notifier.send_invite(&notification).await;
        invite.delivery = if outcome.is_ok() {
            EmailDeliveryStatus::Sent
        } else {
            EmailDeliveryStatus::Failed
        };
        let invite = self.store.update_invite(&invite).await?;

        match outcome {
            Ok(()) => Ok(invite),
            Err(err) => {
                log::warn!(
                    target: "teamgate",
                    "msg=\"invite delivery failed\", team_id={}, invite_id={}, error=\"{err}\"",
                    team.id,
                    invite.id
                );
                dispatch(TeamEvent::InviteDeliveryFailed {
                    team_id: team.id,
                    invite_id: invite.id,
                    reason: err.to_string(),
                    at: Utc::now(),
                })
                .await;
                Err(AccessError::DeliveryFailed {
                    invite: Box::new(invite),
                    reason: err.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::teams::actions::fixtures::{team_with_owner, team_with_permission};
    use crate::teams::mocks::{MockInviteNotifier, MockTeamStore};
    use crate::teams::{
        InviteRepository, InviteStatus, MembershipRepository, MembershipStatus, TeamPermission,
    };

    fn action(
        store: &MockTeamStore,
        notifier: &MockInviteNotifier,
    ) -> RequestEmailInviteAction<MockTeamStore, MockInviteNotifier> {
        RequestEmailInviteAction::with_config(
            store.clone(),
            notifier.clone(),
            InviteConfig {
                join_base_url: "https://app.test/join".to_owned(),
            },
        )
    }

    fn input(team_id: i64, inviter_id: i64, email: &str, role: Role) -> EmailInviteInput {
        EmailInviteInput {
            team_id,
            inviter_id,
            email: email.to_owned(),
            role,
            app_id: None,
        }
    }

    #[tokio::test]
    async fn test_creates_invite_and_pending_membership() {
        let fx = team_with_owner().await;
        let notifier = MockInviteNotifier::new();

        let output = action(&fx.store, &notifier)
            .execute(input(fx.team.id, fx.owner.id, "A@X.com", Role::Editor))
            .await
            .unwrap();

        assert_eq!(output.disposition, EmailInviteDisposition::Created);
        assert_eq!(output.invite.email, "a@x.com");
        assert_eq!(output.invite.role, Role::Editor);
        assert_eq!(output.invite.delivery, EmailDeliveryStatus::Sent);
        assert!(output.join_link.contains("&email=a%40x.com"));

        let member_id = output.invite.team_member_id.unwrap();
        let pending = fx
            .store
            .find_membership_by_id(fx.team.id, member_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pending.status, MembershipStatus::Pending);
        assert_eq!(pending.role, Role::Editor);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "a@x.com");
        assert_eq!(sent[0].team_name, "Acme");
        assert_eq!(sent[0].kind, NotificationKind::JoinTeam);
    }

    #[tokio::test]
    async fn test_same_role_resends() {
        let fx = team_with_owner().await;
        let notifier = MockInviteNotifier::new();
        let action = action(&fx.store, &notifier);

        let first = action
            .execute(input(fx.team.id, fx.owner.id, "a@x.com", Role::Viewer))
            .await
            .unwrap();
        let second = action
            .execute(input(fx.team.id, fx.owner.id, "a@x.com", Role::Viewer))
            .await
            .unwrap();

        assert_eq!(second.disposition, EmailInviteDisposition::Resent);
        assert_eq!(first.invite.id, second.invite.id);
        assert_eq!(fx.store.invite_count(fx.team.id), 1);
        // owner plus one pending
        assert_eq!(fx.store.membership_count(fx.team.id), 2);
        assert_eq!(notifier.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_resend_keeps_stored_app_scope() {
        let fx = team_with_owner().await;
        let notifier = MockInviteNotifier::new();
        let action = action(&fx.store, &notifier);

        let first = action
            .execute(input(fx.team.id, fx.owner.id, "a@x.com", Role::Viewer))
            .await
            .unwrap();
        let second = action
            .execute(EmailInviteInput {
                app_id: Some(9),
                ..input(fx.team.id, fx.owner.id, "a@x.com", Role::Viewer)
            })
            .await
            .unwrap();

        assert_eq!(second.disposition, EmailInviteDisposition::Resent);
        assert_eq!(second.invite.app_id, None);
        assert!(!second.join_link.contains("appID"));
        let stored = fx.store.find_invite_by_uid(first.invite.uid).await.unwrap().unwrap();
        assert_eq!(stored.app_id, None);
        assert_eq!(notifier.sent()[1].kind, NotificationKind::JoinTeam);
    }

    #[tokio::test]
    async fn test_inactive_invite_does_not_block_a_new_one() {
        let fx = team_with_owner().await;
        let notifier = MockInviteNotifier::new();
        let action = action(&fx.store, &notifier);

        let first = action
            .execute(input(fx.team.id, fx.owner.id, "a@x.com", Role::Viewer))
            .await
            .unwrap();
        let retired = Invite {
            status: InviteStatus::Inactive,
            ..first.invite.clone()
        };
        fx.store.update_invite(&retired).await.unwrap();

        let second = action
            .execute(input(fx.team.id, fx.owner.id, "a@x.com", Role::Viewer))
            .await
            .unwrap();
        assert_eq!(second.disposition, EmailInviteDisposition::Created);
        assert_ne!(second.invite.id, first.invite.id);
        assert!(second.invite.is_active());
    }

    #[tokio::test]
    async fn test_different_role_updates_in_place() {
        let fx = team_with_owner().await;
        let notifier = MockInviteNotifier::new();
        let action = action(&fx.store, &notifier);

        let first = action
            .execute(input(fx.team.id, fx.owner.id, "a@x.com", Role::Editor))
            .await
            .unwrap();
        let second = action
            .execute(input(fx.team.id, fx.owner.id, "a@x.com", Role::Viewer))
            .await
            .unwrap();

        assert_eq!(
            second.disposition,
            EmailInviteDisposition::RoleChanged { from: Role::Editor }
        );
        assert_eq!(first.invite.id, second.invite.id);
        assert_eq!(second.invite.role, Role::Viewer);
        assert_eq!(fx.store.invite_count(fx.team.id), 1);
        assert_eq!(fx.store.membership_count(fx.team.id), 2);

        let pending = fx
            .store
            .find_membership_by_id(fx.team.id, second.invite.team_member_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pending.role, Role::Viewer);
    }

    #[tokio::test]
    async fn test_editor_cannot_invite_admin() {
        let fx = team_with_owner().await;
        let (editor, _) = fx.store.seed_member(fx.team.id, "ed@x.com", Role::Editor).await;
        let notifier = MockInviteNotifier::new();

        let result = action(&fx.store, &notifier)
            .execute(input(fx.team.id, editor.id, "a@x.com", Role::Admin))
            .await;

        assert!(matches!(result.unwrap_err(), AccessError::AccessDenied));
        assert_eq!(fx.store.invite_count(fx.team.id), 0);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_nobody_invites_owner() {
        let fx = team_with_owner().await;
        let result = action(&fx.store, &MockInviteNotifier::new())
            .execute(input(fx.team.id, fx.owner.id, "a@x.com", Role::Owner))
            .await;
        assert!(matches!(result.unwrap_err(), AccessError::AccessDenied));
    }

    #[tokio::test]
    async fn test_team_toggle_closes_viewer_invites() {
        let fx = team_with_permission(TeamPermission {
            allow_viewer_invite: false,
            ..TeamPermission::default()
        })
        .await;
        let (viewer, _) = fx.store.seed_member(fx.team.id, "v@x.com", Role::Viewer).await;
        let (editor, _) = fx.store.seed_member(fx.team.id, "e@x.com", Role::Editor).await;
        let action = action(&fx.store, &MockInviteNotifier::new());

        let result = action
            .execute(input(fx.team.id, viewer.id, "a@x.com", Role::Viewer))
            .await;
        assert!(matches!(
            result.unwrap_err(),
            AccessError::PermissionClosedByTeam(_)
        ));

        // editors have their own toggle
        assert!(action
            .execute(input(fx.team.id, editor.id, "a@x.com", Role::Viewer))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_outsider_is_denied() {
        let fx = team_with_owner().await;
        let outsider = fx.store.seed_user("out", "out@x.com").await;
        let result = action(&fx.store, &MockInviteNotifier::new())
            .execute(input(fx.team.id, outsider.id, "a@x.com", Role::Viewer))
            .await;
        assert!(matches!(result.unwrap_err(), AccessError::AccessDenied));
    }

    #[tokio::test]
    async fn test_existing_member_email_is_refused() {
        let fx = team_with_owner().await;
        fx.store.seed_member(fx.team.id, "member@x.com", Role::Viewer).await;

        let result = action(&fx.store, &MockInviteNotifier::new())
            .execute(input(fx.team.id, fx.owner.id, "member@x.com", Role::Editor))
            .await;

        assert!(matches!(result.unwrap_err(), AccessError::EmailAlreadyUsed));
        assert_eq!(fx.store.invite_count(fx.team.id), 0);
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_invite() {
        let fx = team_with_owner().await;
        let notifier = MockInviteNotifier::new();
        notifier.set_failing(true);

        let err = action(&fx.store, &notifier)
            .execute(input(fx.team.id, fx.owner.id, "a@x.com", Role::Editor))
            .await
            .unwrap_err();

        assert!(err.is_warning());
        let AccessError::DeliveryFailed { invite, .. } = err else {
            panic!("expected DeliveryFailed");
        };
        assert_eq!(invite.delivery, EmailDeliveryStatus::Failed);

        let stored = fx
            .store
            .find_active_email_invite(fx.team.id, "a@x.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, invite.id);
        assert_eq!(stored.delivery, EmailDeliveryStatus::Failed);

        // a manual resend recovers
        notifier.set_failing(false);
        let output = action(&fx.store, &notifier)
            .execute(input(fx.team.id, fx.owner.id, "a@x.com", Role::Editor))
            .await
            .unwrap();
        assert_eq!(output.invite.delivery, EmailDeliveryStatus::Sent);
    }

    #[tokio::test]
    async fn test_app_scoped_invite_shares_app() {
        let fx = team_with_owner().await;
        let notifier = MockInviteNotifier::new();

        let output = action(&fx.store, &notifier)
            .execute(EmailInviteInput {
                app_id: Some(77),
                ..input(fx.team.id, fx.owner.id, "a@x.com", Role::Viewer)
            })
            .await
            .unwrap();

        assert_eq!(output.invite.app_id, Some(77));
        assert!(output.join_link.ends_with("&appID=77"));
        assert_eq!(notifier.sent()[0].kind, NotificationKind::ShareApp);
    }

    #[tokio::test]
    async fn test_invalid_email_is_rejected() {
        let fx = team_with_owner().await;
        let result = action(&fx.store, &MockInviteNotifier::new())
            .execute(input(fx.team.id, fx.owner.id, "not-an-email", Role::Viewer))
            .await;
        assert!(matches!(result.unwrap_err(), AccessError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_team() {
        let fx = team_with_owner().await;
        let result = action(&fx.store, &MockInviteNotifier::new())
            .execute(input(999, fx.owner.id, "a@x.com", Role::Viewer))
            .await;
        assert!(matches!(
            result.unwrap_err(),
            AccessError::NotFound(crate::Entity::Team)
        ));
    }
}
