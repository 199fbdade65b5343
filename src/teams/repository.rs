use async_trait::async_trait;
use uuid::Uuid;

use super::types::{Invite, InviteCategory, Membership, MembershipStatus, Team, TeamPermission, User};
use crate::AccessError;
use crate::access::Role;

#[derive(Debug, Clone)]
pub struct CreateTeam {
    pub name: String,
    pub identifier: String,
    pub icon: String,
    pub permission: TeamPermission,
}

#[derive(Debug, Clone)]
pub struct CreateMembership {
    pub team_id: i64,
    pub user_id: i64,
    pub role: Role,
    pub status: MembershipStatus,
}

#[derive(Debug, Clone)]
pub struct CreateInvite {
    pub uid: Uuid,
    pub category: InviteCategory,
    pub team_id: i64,
    pub team_member_id: Option<i64>,
    pub app_id: Option<i64>,
    pub email: String,
    pub role: Role,
}

impl CreateInvite {
    /// A fresh link invite with a new random UID.
    pub fn link(team_id: i64, role: Role) -> Self {
        Self {
            uid: Uuid::new_v4(),
            category: InviteCategory::ByLink,
            team_id,
            team_member_id: None,
            app_id: None,
            email: String::new(),
            role,
        }
    }
}

/// Input for the atomic "pending membership plus email invite" write.
#[derive(Debug, Clone)]
pub struct CreateEmailInvite {
    pub uid: Uuid,
    pub team_id: i64,
    pub app_id: Option<i64>,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub nickname: String,
    pub email: String,
    pub password_digest: String,
    pub language: String,
}

#[async_trait]
pub trait TeamRepository: Send + Sync {
    async fn create_team(&self, data: CreateTeam) -> Result<Team, AccessError>;
    async fn find_team(&self, team_id: i64) -> Result<Option<Team>, AccessError>;
    async fn update_team_permission(
        &self,
        team_id: i64,
        permission: TeamPermission,
    ) -> Result<Team, AccessError>;
}

/// Storage side of the membership directory.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn create_membership(&self, data: CreateMembership) -> Result<Membership, AccessError>;
    /// Looks up the membership of a real user; never matches pending rows.
    async fn find_membership(
        &self,
        team_id: i64,
        user_id: i64,
    ) -> Result<Option<Membership>, AccessError>;
    async fn find_membership_by_id(
        &self,
        team_id: i64,
        membership_id: i64,
    ) -> Result<Option<Membership>, AccessError>;
    /// All memberships of a team, newest first.
    async fn list_team_memberships(&self, team_id: i64) -> Result<Vec<Membership>, AccessError>;
    async fn list_user_memberships(&self, user_id: i64) -> Result<Vec<Membership>, AccessError>;
    async fn update_membership(&self, membership: &Membership) -> Result<Membership, AccessError>;
    async fn delete_membership(&self, team_id: i64, membership_id: i64) -> Result<(), AccessError>;
}

#[async_trait]
pub trait InviteRepository: Send + Sync {
    async fn create_invite(&self, data: CreateInvite) -> Result<Invite, AccessError>;
    async fn find_invite_by_uid(&self, uid: Uuid) -> Result<Option<Invite>, AccessError>;
    async fn find_active_email_invite(
        &self,
        team_id: i64,
        email: &str,
    ) -> Result<Option<Invite>, AccessError>;
    async fn find_active_link_invite(
        &self,
        team_id: i64,
        role: Role,
    ) -> Result<Option<Invite>, AccessError>;
    /// The email invite paired with a membership, if any.
    async fn find_invite_by_membership(
        &self,
        team_id: i64,
        membership_id: i64,
    ) -> Result<Option<Invite>, AccessError>;
    async fn list_email_invites(&self, team_id: i64) -> Result<Vec<Invite>, AccessError>;
    async fn update_invite(&self, invite: &Invite) -> Result<Invite, AccessError>;
    async fn delete_invite(&self, invite_id: i64) -> Result<(), AccessError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, data: CreateUser) -> Result<User, AccessError>;
    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, AccessError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AccessError>;
    async fn delete_user(&self, user_id: i64) -> Result<(), AccessError>;
}

/// Multi-row lifecycle writes. Each method commits all of its rows or none.
#[async_trait]
pub trait TeamTransactions: Send + Sync {
    /// Creates a pending membership and the email invite paired with it.
    async fn create_email_invite(
        &self,
        data: CreateEmailInvite,
    ) -> Result<(Membership, Invite), AccessError>;

    /// Sets the role of an email invite and of its paired membership.
    async fn change_invite_role(
        &self,
        invite_id: i64,
        role: Role,
    ) -> Result<(Membership, Invite), AccessError>;

    /// Activates the paired membership for `user_id` and deletes the invite.
    async fn accept_email_invite(
        &self,
        invite_id: i64,
        user_id: i64,
    ) -> Result<Membership, AccessError>;

    /// Deletes the active link invite for the data's `(team, role)` and stores the new one.
    async fn replace_link_invite(&self, data: CreateInvite) -> Result<Invite, AccessError>;

    /// Sets a member's role and the role of any invite paired with it.
    async fn change_member_role(
        &self,
        team_id: i64,
        membership_id: i64,
        role: Role,
    ) -> Result<Membership, AccessError>;

    /// Demotes the current owner to admin and promotes the target to owner.
    ///
    /// Returns `(former_owner, new_owner)`.
    async fn transfer_ownership(
        &self,
        team_id: i64,
        from_membership_id: i64,
        to_membership_id: i64,
    ) -> Result<(Membership, Membership), AccessError>;

    /// Deletes a membership with its paired invites, and the user account when given.
    async fn remove_member(
        &self,
        team_id: i64,
        membership_id: i64,
        delete_user_id: Option<i64>,
    ) -> Result<(), AccessError>;

    /// Deletes a user together with all of their memberships.
    async fn delete_account(&self, user_id: i64) -> Result<(), AccessError>;
}

/// Everything the lifecycle actions need from persistence.
pub trait TeamStore:
    TeamRepository + MembershipRepository + InviteRepository + UserRepository + TeamTransactions + Clone
{
}

impl<T> TeamStore for T where
    T: TeamRepository
        + MembershipRepository
        + InviteRepository
        + UserRepository
        + TeamTransactions
        + Clone
{
}
