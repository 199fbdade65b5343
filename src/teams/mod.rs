//! Teams, memberships, invites and the join lifecycle.
//!
//! Storage is reached through the repository traits; [`TeamStore`] bundles
//! them with the multi-row [`TeamTransactions`]. Each lifecycle operation is
//! an action struct with an `execute` method.

pub mod actions;
mod directory;
mod identity;
mod notifier;
mod repository;
mod token;
mod types;

pub use actions::{
    ChangeMemberRoleAction, ChangeMemberRoleInput, ChangeMemberRoleOutput,
    ConfigureInviteLinkAction, ConfigureInviteLinkInput, DeleteAccountAction,
    EmailInviteDisposition, EmailInviteInput, EmailInviteOutput, InviteLinkInput,
    InviteLinkOutput, JoinTeamAction, JoinTeamInput, JoinTeamOutput, ListTeamMembersAction,
    RemoveMemberAction, RemoveMemberInput, RemoveMemberOutput, RequestEmailInviteAction,
    RequestInviteLinkAction, SignupAction, SignupInput, SignupOutput, UpdateTeamPermissionAction,
    UpdateTeamPermissionInput,
};
pub use directory::{Actor, MembershipDirectory};
pub use identity::{Identity, IdentityProvider};
pub use notifier::{
    DeliveryError, InviteNotification, InviteNotifier, LogNotifier, NotificationKind,
};
pub use repository::{
    CreateEmailInvite, CreateInvite, CreateMembership, CreateTeam, CreateUser, InviteRepository,
    MembershipRepository, TeamRepository, TeamStore, TeamTransactions, UserRepository,
};
pub use token::{Base64InviteCodec, InviteTokenCodec};
pub use types::{
    EmailDeliveryStatus, Invite, InviteCategory, InviteStatus, Membership, MembershipStatus,
    PENDING_USER_ID, Team, TeamMember, TeamMemberUser, TeamPermission, User,
};

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
