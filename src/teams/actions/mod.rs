mod change_role;
mod delete_account;
mod invite_email;
mod invite_link;
mod join;
mod list_members;
mod remove_member;
mod signup;
mod team_permission;

pub use change_role::{ChangeMemberRoleAction, ChangeMemberRoleInput, ChangeMemberRoleOutput};
pub use delete_account::DeleteAccountAction;
pub use invite_email::{
    EmailInviteDisposition, EmailInviteInput, EmailInviteOutput, RequestEmailInviteAction,
};
pub use invite_link::{
    ConfigureInviteLinkAction, ConfigureInviteLinkInput, InviteLinkInput, InviteLinkOutput,
    RequestInviteLinkAction,
};
pub use join::{JoinTeamAction, JoinTeamInput, JoinTeamOutput};
pub use list_members::ListTeamMembersAction;
pub use remove_member::{RemoveMemberAction, RemoveMemberInput, RemoveMemberOutput};
pub use signup::{SignupAction, SignupInput, SignupOutput};
pub use team_permission::{UpdateTeamPermissionAction, UpdateTeamPermissionInput};

use super::repository::TeamRepository;
use super::types::Team;
use crate::{AccessError, Entity};

async fn load_team<T>(teams: &T, team_id: i64) -> Result<Team, AccessError>
where
    T: TeamRepository + ?Sized,
{
    teams
        .find_team(team_id)
        .await?
        .ok_or(AccessError::NotFound(Entity::Team))
}
