use chrono::Utc;

use super::load_team;
use crate::events::{TeamEvent, dispatch};
use crate::teams::repository::{CreateMembership, TeamStore};
use crate::teams::token::{Base64InviteCodec, InviteTokenCodec};
use crate::teams::types::{Invite, InviteCategory, Membership, MembershipStatus, Team};
use crate::validators::normalize_email;
use crate::{AccessError, Entity, SecretString};

#[derive(Debug)]
pub struct JoinTeamInput {
    pub user_id: i64,
    pub invite_token: SecretString,
}

#[derive(Debug)]
pub struct JoinTeamOutput {
    pub membership: Membership,
    /// The invite as it was before consumption. Email invites no longer exist.
    pub invite: Invite,
    pub team: Team,
}

/// Consumes an invite token for an existing user.
///
/// Link invites add a new active membership and stay usable. Email invites
/// activate their pending membership and are deleted in the same
/// transaction.
pub struct JoinTeamAction<S, C = Base64InviteCodec> {
    store: S,
    codec: C,
}

impl<S: TeamStore> JoinTeamAction<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            codec: Base64InviteCodec,
        }
    }
}

impl<S: TeamStore, C: InviteTokenCodec> JoinTeamAction<S, C> {
    pub fn with_codec(store: S, codec: C) -> Self {
        Self { store, codec }
    }

    /// # Returns
    ///
    /// - `Ok(output)` - the user is now an active member
    /// - `Err(AccessError::InvalidToken)` - token undecodable or unknown
    /// - `Err(AccessError::InviteUnavailable)` - invite is not active
    /// - `Err(AccessError::EmailMismatch)` - email invite addressed to someone else
    /// - `Err(AccessError::PermissionClosedByTeam)` - link invites are off
    /// - `Err(AccessError::AlreadyMember)` - user already belongs to the team
    /// - `Err(_)` - lookup or storage errors
    #[cfg_attr(feature = "tracing", tracing::instrument(name = "join_team", skip_all, err))]
    pub async fn execute(&self, input: JoinTeamInput) -> Result<JoinTeamOutput, AccessError> {
        let user = self
            .store
            .find_user_by_id(input.user_id)
            .await?
            .ok_or(AccessError::NotFound(Entity::User))?;

        let (invite, team) =
            inspect_invite(&self.store, &self.codec, &input.invite_token, &user.email).await?;
        let membership = consume_invite(&self.store, &invite, user.id).await?;

        Ok(JoinTeamOutput {
            membership,
            invite,
            team,
        })
    }
}

/// Checks an invite token against the joining email without changing anything.
pub(super) async fn inspect_invite<S, C>(
    store: &S,
    codec: &C,
    token: &SecretString,
    email: &str,
) -> Result<(Invite, Team), AccessError>
where
    S: TeamStore,
    C: InviteTokenCodec,
{
    let uid = codec.decode(token.expose_secret())?;
    let invite = store
        .find_invite_by_uid(uid)
        .await?
        .ok_or(AccessError::InvalidToken)?;

    if !invite.is_active() {
        return Err(AccessError::InviteUnavailable);
    }
    if invite.is_email() && normalize_email(email) != invite.email {
        return Err(AccessError::EmailMismatch);
    }

    let team = load_team(store, invite.team_id).await?;
    if invite.is_link() && !team.permission.invite_link_enabled {
        return Err(AccessError::PermissionClosedByTeam("invite link"));
    }

    Ok((invite, team))
}

/// Turns an inspected invite into an active membership for `user_id`.
pub(super) async fn consume_invite<S: TeamStore>(
    store: &S,
    invite: &Invite,
    user_id: i64,
) -> Result<Membership, AccessError> {
    if store.find_membership(invite.team_id, user_id).await?.is_some() {
        return Err(AccessError::AlreadyMember);
    }

    let result = match invite.category {
        InviteCategory::ByLink => {
            store
                .create_membership(CreateMembership {
                    team_id: invite.team_id,
                    user_id,
                    role: invite.role,
                    status: MembershipStatus::Ok,
                })
                .await
        }
        InviteCategory::ByEmail => store.accept_email_invite(invite.id, user_id).await,
    };

    let membership = match result {
        Ok(membership) => membership,
        // a concurrent join for the same user won
        Err(AccessError::AlreadyExists(Entity::Membership)) => {
            return Err(AccessError::AlreadyMember);
        }
        Err(err) => return Err(err),
    };

    log::info!(
        target: "teamgate",
        "msg=\"invite consumed\", team_id={}, invite_id={}, category=\"{}\", user_id={}, membership_id={}",
        invite.team_id,
        invite.id,
        if invite.is_link() { "link" } else { "email" },
        user_id,
        membership.id
    );
    dispatch(TeamEvent::InviteConsumed {
        team_id: invite.team_id,
        invite_id: invite.id,
        user_id,
        membership_id: membership.id,
        at: Utc::now(),
    })
    .await;

    Ok(membership)
}
