//! Core types for teams, memberships, invites and user accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::Role;

/// User ID stored on a membership that is still waiting for its invitee.
pub const PENDING_USER_ID: i64 = 0;

/// A tenant: the unit every permission check and membership is keyed by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    /// Unique identifier.
    pub id: i64,
    /// Opaque external identifier.
    pub uid: Uuid,
    /// Human-readable team name, shown in invite notifications.
    pub name: String,
    /// URL-friendly unique identifier.
    pub identifier: String,
    /// Icon URL, shown in invite notifications.
    pub icon: String,
    /// Team-level toggles layered on top of the permission matrix.
    pub permission: TeamPermission,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Team-level toggles that can close actions the matrix would allow.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamPermission {
    /// Editors may send invites.
    pub allow_editor_invite: bool,
    /// Viewers may send invites.
    pub allow_viewer_invite: bool,
    /// Editors may change member roles.
    pub allow_editor_manage_team_member: bool,
    /// Viewers may change member roles.
    pub allow_viewer_manage_team_member: bool,
    /// Invite links may be issued and redeemed.
    pub invite_link_enabled: bool,
    /// Organic signup into this team is refused.
    pub block_register: bool,
}

impl Default for TeamPermission {
    fn default() -> Self {
        Self {
            allow_editor_invite: true,
            allow_viewer_invite: true,
            allow_editor_manage_team_member: true,
            allow_viewer_manage_team_member: true,
            invite_link_enabled: true,
            block_register: false,
        }
    }
}

impl TeamPermission {
    /// Whether a member at `role` may send invites. Owner and Admin bypass the toggles.
    pub fn allows_invite_from(&self, role: Role) -> bool {
        match role {
            Role::Editor => self.allow_editor_invite,
            Role::Viewer => self.allow_viewer_invite,
            _ => true,
        }
    }

    /// Whether a member at `role` may change member roles. Owner and Admin bypass the toggles.
    pub fn allows_member_management_from(&self, role: Role) -> bool {
        match role {
            Role::Editor => self.allow_editor_manage_team_member,
            Role::Viewer => self.allow_viewer_manage_team_member,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    /// Active member with a real user account.
    Ok,
    /// Placeholder paired with an email invite.
    Pending,
}

impl MembershipStatus {
    pub fn id(self) -> i16 {
        match self {
            Self::Ok => 1,
            Self::Pending => 2,
        }
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Self::Ok),
            2 => Some(Self::Pending),
            _ => None,
        }
    }
}

/// One user's standing in one team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    /// Unique identifier.
    pub id: i64,
    pub team_id: i64,
    /// [`PENDING_USER_ID`] while the membership waits for its invitee.
    pub user_id: i64,
    pub role: Role,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    pub fn is_pending(&self) -> bool {
        self.status == MembershipStatus::Pending
    }

    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Ok
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteCategory {
    /// Reusable, role-scoped link.
    ByLink,
    /// Single-use, tied to one address and a pending membership.
    ByEmail,
}

impl InviteCategory {
    pub fn id(self) -> i16 {
        match self {
            Self::ByLink => 1,
            Self::ByEmail => 2,
        }
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Self::ByLink),
            2 => Some(Self::ByEmail),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    Active,
    /// Any stored status other than active.
    Inactive,
}

impl InviteStatus {
    pub fn id(self) -> i16 {
        match self {
            Self::Active => 1,
            Self::Inactive => 0,
        }
    }

    pub fn from_id(id: i16) -> Self {
        if id == 1 { Self::Active } else { Self::Inactive }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailDeliveryStatus {
    /// Link invites are never mailed.
    NotApplicable,
    Pending,
    Sent,
    Failed,
}

impl EmailDeliveryStatus {
    pub fn id(self) -> i16 {
        match self {
            Self::NotApplicable => 0,
            Self::Pending => 1,
            Self::Sent => 2,
            Self::Failed => 3,
        }
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(Self::NotApplicable),
            1 => Some(Self::Pending),
            2 => Some(Self::Sent),
            3 => Some(Self::Failed),
            _ => None,
        }
    }
}

/// An outstanding offer to join a team at a given role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invite {
    /// Unique identifier.
    pub id: i64,
    /// Payload of the invite token. Role and team are never read from the token.
    pub uid: Uuid,
    pub category: InviteCategory,
    pub team_id: i64,
    /// The pending membership an email invite is paired with.
    pub team_member_id: Option<i64>,
    /// Set when the invite shares a single app instead of the whole team.
    pub app_id: Option<i64>,
    /// Target address; empty for link invites.
    pub email: String,
    pub role: Role,
    pub delivery: EmailDeliveryStatus,
    pub status: InviteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invite {
    pub fn is_active(&self) -> bool {
        self.status == InviteStatus::Active
    }

    pub fn is_email(&self) -> bool {
        self.category == InviteCategory::ByEmail
    }

    pub fn is_link(&self) -> bool {
        self.category == InviteCategory::ByLink
    }
}

/// A user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: i64,
    /// Opaque external identifier.
    pub uid: Uuid,
    pub nickname: String,
    /// Lowercased email address.
    pub email: String,
    #[serde(skip_serializing)]
    pub password_digest: String,
    pub avatar: String,
    pub language: String,
    /// Free-form UI preferences.
    pub customization: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of a team's member list.
#[derive(Debug, Clone, Serialize)]
pub struct TeamMember {
    pub membership_id: i64,
    /// `None` for pending memberships.
    pub user: Option<TeamMemberUser>,
    /// The account address, or the invited address for pending rows.
    pub email: String,
    pub role: Role,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamMemberUser {
    pub id: i64,
    pub uid: Uuid,
    pub nickname: String,
    pub avatar: String,
}
