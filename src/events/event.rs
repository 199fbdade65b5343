use chrono::{DateTime, Utc};

use crate::access::Role;

/// Lifecycle events emitted by team actions.
///
/// Always fired; ignored unless listeners are registered through
/// [`register_event_listeners`](crate::register_event_listeners).
#[derive(Debug, Clone)]
pub enum TeamEvent {
    // invites
    InviteCreated {
        team_id: i64,
        invite_id: i64,
        email: String,
        role: Role,
        at: DateTime<Utc>,
    },
    InviteResent {
        team_id: i64,
        invite_id: i64,
        at: DateTime<Utc>,
    },
    InviteRoleChanged {
        team_id: i64,
        invite_id: i64,
        from: Role,
        to: Role,
        at: DateTime<Utc>,
    },
    InviteDeliveryFailed {
        team_id: i64,
        invite_id: i64,
        reason: String,
        at: DateTime<Utc>,
    },
    InviteLinkIssued {
        team_id: i64,
        invite_id: i64,
        role: Role,
        at: DateTime<Utc>,
    },
    InviteLinkRenewed {
        team_id: i64,
        invite_id: i64,
        role: Role,
        at: DateTime<Utc>,
    },
    InviteConsumed {
        team_id: i64,
        invite_id: i64,
        user_id: i64,
        membership_id: i64,
        at: DateTime<Utc>,
    },

    // members
    MemberRemoved {
        team_id: i64,
        membership_id: i64,
        removed_by: i64,
        user_deleted: bool,
        at: DateTime<Utc>,
    },
    MemberRoleChanged {
        team_id: i64,
        membership_id: i64,
        from: Role,
        to: Role,
        at: DateTime<Utc>,
    },
    OwnershipTransferred {
        team_id: i64,
        from_membership_id: i64,
        to_membership_id: i64,
        at: DateTime<Utc>,
    },

    // accounts
    UserRegistered {
        user_id: i64,
        email: String,
        at: DateTime<Utc>,
    },
    UserDeleted {
        user_id: i64,
        at: DateTime<Utc>,
    },

    // teams
    TeamPermissionUpdated {
        team_id: i64,
        updated_by: i64,
        at: DateTime<Utc>,
    },
}

impl TeamEvent {
    /// Dotted event name, stable for log filtering.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InviteCreated { .. } => "invite.created",
            Self::InviteResent { .. } => "invite.resent",
            Self::InviteRoleChanged { .. } => "invite.role_changed",
            Self::InviteDeliveryFailed { .. } => "invite.delivery_failed",
            Self::InviteLinkIssued { .. } => "invite.link.issued",
            Self::InviteLinkRenewed { .. } => "invite.link.renewed",
            Self::InviteConsumed { .. } => "invite.consumed",
            Self::MemberRemoved { .. } => "member.removed",
            Self::MemberRoleChanged { .. } => "member.role_changed",
            Self::OwnershipTransferred { .. } => "member.ownership_transferred",
            Self::UserRegistered { .. } => "user.registered",
            Self::UserDeleted { .. } => "user.deleted",
            Self::TeamPermissionUpdated { .. } => "team.permission_updated",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::InviteCreated { at, .. }
            | Self::InviteResent { at, .. }
            | Self::InviteRoleChanged { at, .. }
            | Self::InviteDeliveryFailed { at, .. }
            | Self::InviteLinkIssued { at, .. }
            | Self::InviteLinkRenewed { at, .. }
            | Self::InviteConsumed { at, .. }
            | Self::MemberRemoved { at, .. }
            | Self::MemberRoleChanged { at, .. }
            | Self::OwnershipTransferred { at, .. }
            | Self::UserRegistered { at, .. }
            | Self::UserDeleted { at, .. }
            | Self::TeamPermissionUpdated { at, .. } => *at,
        }
    }

    /// The team the event concerns, if any.
    pub fn team_id(&self) -> Option<i64> {
        match self {
            Self::InviteCreated { team_id, .. }
            | Self::InviteResent { team_id, .. }
            | Self::InviteRoleChanged { team_id, .. }
            | Self::InviteDeliveryFailed { team_id, .. }
            | Self::InviteLinkIssued { team_id, .. }
            | Self::InviteLinkRenewed { team_id, .. }
            | Self::InviteConsumed { team_id, .. }
            | Self::MemberRemoved { team_id, .. }
            | Self::MemberRoleChanged { team_id, .. }
            | Self::OwnershipTransferred { team_id, .. }
            | Self::TeamPermissionUpdated { team_id, .. } => Some(*team_id),
            Self::UserRegistered { .. } | Self::UserDeleted { .. } => None,
        }
    }
}
