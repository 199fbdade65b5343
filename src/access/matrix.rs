//! The static permission table.
//!
//! `matrix[category][role][resource][action_id] -> bool`, stored as the set
//! of granted action IDs per `(category, role, resource)`. Every lookup goes
//! through chained `get`s so a missing level denies instead of panicking.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use super::types::{
    AccessAction as A, ActionCategory, CategoryAction, DeleteAction as D, ManageAction as M,
    ResourceType as R, Role, SpecialAction as S,
};

/// Granted action IDs for one `(category, role, resource)` triple.
pub type ActionSet = HashSet<u16>;

type GrantTable<Act> = &'static [(Role, R, &'static [Act])];

static STANDARD: LazyLock<PermissionMatrix> = LazyLock::new(PermissionMatrix::standard);

/// Resource-keyed grants for one `(category, role)` pair.
#[derive(Debug, Clone, Default)]
pub struct PermissionSet {
    grants: HashMap<R, ActionSet>,
}

impl PermissionSet {
    pub fn actions_for(&self, resource: R) -> Option<&ActionSet> {
        self.grants.get(&resource)
    }

    pub fn allows(&self, resource: R, action_id: u16) -> bool {
        self.actions_for(resource)
            .is_some_and(|actions| actions.contains(&action_id))
    }

    pub fn is_empty(&self) -> bool {
        self.grants.values().all(HashSet::is_empty)
    }
}

/// Immutable permission matrix.
///
/// The process-wide instance is built once on first use; see [`PermissionMatrix::global`].
#[derive(Debug, Clone, Default)]
pub struct PermissionMatrix {
    sets: HashMap<(ActionCategory, Role), PermissionSet>,
}

impl PermissionMatrix {
    /// The shared standard matrix.
    pub fn global() -> &'static Self {
        &STANDARD
    }

    /// A matrix that denies everything.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> PermissionMatrixBuilder {
        PermissionMatrixBuilder::default()
    }

    /// Builds the standard table from the grant lists below.
    pub fn standard() -> Self {
        Self::builder()
            .grant_table(ACCESS_GRANTS)
            .grant_table(DELETE_GRANTS)
            .grant_table(MANAGE_GRANTS)
            .grant_table(SPECIAL_GRANTS)
            .build()
    }

    pub fn permission_set(&self, category: ActionCategory, role: Role) -> Option<&PermissionSet> {
        self.sets.get(&(category, role))
    }

    /// The granted IDs for a triple, `None` when any level is missing.
    pub fn slice(&self, category: ActionCategory, role: Role, resource: R) -> Option<&ActionSet> {
        self.permission_set(category, role)
            .and_then(|set| set.actions_for(resource))
    }

    pub fn is_allowed(&self, category: ActionCategory, role: Role, resource: R, action_id: u16) -> bool {
        self.slice(category, role, resource)
            .is_some_and(|actions| actions.contains(&action_id))
    }
}

#[derive(Debug, Default)]
pub struct PermissionMatrixBuilder {
    sets: HashMap<(ActionCategory, Role), PermissionSet>,
}

impl PermissionMatrixBuilder {
    #[must_use]
    pub fn grant<Act: CategoryAction>(mut self, role: Role, resource: R, actions: &[Act]) -> Self {
        let slot = self
            .sets
            .entry((Act::CATEGORY, role))
            .or_default()
            .grants
            .entry(resource)
            .or_default();
        slot.extend(actions.iter().map(|action| action.action_id()));
        self
    }

    #[must_use]
    pub fn grant_table<Act: CategoryAction>(self, table: &[(Role, R, &[Act])]) -> Self {
        table
            .iter()
            .fold(self, |builder, (role, resource, actions)| {
                builder.grant(*role, *resource, actions)
            })
    }

    pub fn build(self) -> PermissionMatrix {
        PermissionMatrix { sets: self.sets }
    }
}

const INVITE_ADMIN_EDITOR_VIEWER: &[A] = &[
    A::View,
    A::InviteByLink,
    A::InviteByEmail,
    A::InviteAdmin,
    A::InviteEditor,
    A::InviteViewer,
];

const ACCESS_GRANTS: GrantTable<A> = &[
    (Role::Anonymous, R::App, &[A::View]),
    (Role::Anonymous, R::Action, &[A::View]),
    (Role::Owner, R::Team, &[A::View]),
    (Role::Owner, R::TeamMember, &[A::View]),
    (Role::Owner, R::User, &[A::View]),
    (Role::Owner, R::Invite, INVITE_ADMIN_EDITOR_VIEWER),
    (Role::Owner, R::Domain, &[A::View]),
    (Role::Owner, R::Billing, &[A::View]),
    (Role::Owner, R::BuilderDashboard, &[A::View]),
    (Role::Owner, R::App, &[A::View]),
    (Role::Owner, R::Components, &[A::View]),
    (Role::Owner, R::Resource, &[A::View]),
    (Role::Owner, R::Action, &[A::View]),
    (Role::Owner, R::Transformer, &[A::View]),
    (Role::Owner, R::Job, &[A::View]),
    (Role::Admin, R::Team, &[A::View]),
    (Role::Admin, R::TeamMember, &[A::View]),
    (Role::Admin, R::User, &[A::View]),
    (Role::Admin, R::Invite, INVITE_ADMIN_EDITOR_VIEWER),
    (Role::Admin, R::Domain, &[A::View]),
    (Role::Admin, R::BuilderDashboard, &[A::View]),
    (Role::Admin, R::App, &[A::View]),
    (Role::Admin, R::Components, &[A::View]),
    (Role::Admin, R::Resource, &[A::View]),
    (Role::Admin, R::Action, &[A::View]),
    (Role::Admin, R::Transformer, &[A::View]),
    (Role::Admin, R::Job, &[A::View]),
    (Role::Editor, R::TeamMember, &[A::View]),
    (Role::Editor, R::User, &[A::View]),
    (
        Role::Editor,
        R::Invite,
        &[A::View, A::InviteByLink, A::InviteByEmail, A::InviteEditor, A::InviteViewer],
    ),
    (Role::Editor, R::BuilderDashboard, &[A::View]),
    (Role::Editor, R::App, &[A::View]),
    (Role::Editor, R::Components, &[A::View]),
    (Role::Editor, R::Resource, &[A::View]),
    (Role::Editor, R::Action, &[A::View]),
    (Role::Editor, R::Transformer, &[A::View]),
    (Role::Editor, R::Job, &[A::View]),
    (Role::Viewer, R::TeamMember, &[A::View]),
    (Role::Viewer, R::User, &[A::View]),
    (
        Role::Viewer,
        R::Invite,
        &[A::View, A::InviteByLink, A::InviteByEmail, A::InviteViewer],
    ),
    (Role::Viewer, R::BuilderDashboard, &[A::View]),
    (Role::Viewer, R::App, &[A::View]),
    (Role::Viewer, R::Components, &[A::View]),
    (Role::Viewer, R::Resource, &[A::View]),
    (Role::Viewer, R::Action, &[A::View]),
    (Role::Viewer, R::Transformer, &[A::View]),
    (Role::Viewer, R::Job, &[A::View]),
];

const ALL_DOMAIN_DELETES: &[D] = &[D::Delete, D::DeleteTeamDomain, D::DeleteAppDomain];

const DELETE_GRANTS: GrantTable<D> = &[
    (Role::Owner, R::Team, &[D::Delete]),
    (Role::Owner, R::TeamMember, &[D::Delete]),
    (Role::Owner, R::User, &[D::Delete]),
    (Role::Owner, R::Invite, &[D::Delete]),
    (Role::Owner, R::Domain, ALL_DOMAIN_DELETES),
    (Role::Owner, R::Billing, &[D::Delete]),
    (Role::Owner, R::BuilderDashboard, &[D::Delete]),
    (Role::Owner, R::App, &[D::Delete]),
    (Role::Owner, R::Components, &[D::Delete]),
    (Role::Owner, R::Resource, &[D::Delete]),
    (Role::Owner, R::Action, &[D::Delete]),
    (Role::Owner, R::Transformer, &[D::Delete]),
    (Role::Owner, R::Job, &[D::Delete]),
    (Role::Admin, R::TeamMember, &[D::Delete]),
    (Role::Admin, R::User, &[D::Delete]),
    (Role::Admin, R::Invite, &[D::Delete]),
    (Role::Admin, R::Domain, ALL_DOMAIN_DELETES),
    (Role::Admin, R::BuilderDashboard, &[D::Delete]),
    (Role::Admin, R::App, &[D::Delete]),
    (Role::Admin, R::Components, &[D::Delete]),
    (Role::Admin, R::Resource, &[D::Delete]),
    (Role::Admin, R::Action, &[D::Delete]),
    (Role::Admin, R::Transformer, &[D::Delete]),
    (Role::Admin, R::Job, &[D::Delete]),
    (Role::Editor, R::TeamMember, &[D::Delete]),
    (Role::Editor, R::User, &[D::Delete]),
    (Role::Editor, R::Invite, &[D::Delete]),
    (Role::Editor, R::App, &[D::Delete]),
    (Role::Editor, R::Components, &[D::Delete]),
    (Role::Editor, R::Resource, &[D::Delete]),
    (Role::Editor, R::Action, &[D::Delete]),
    (Role::Editor, R::Transformer, &[D::Delete]),
    (Role::Editor, R::Job, &[D::Delete]),
    (Role::Viewer, R::TeamMember, &[D::Delete]),
    (Role::Viewer, R::User, &[D::Delete]),
];

const OWNER_MEMBER_MANAGEMENT: &[M] = &[
    M::RemoveMember,
    M::ManageRole,
    M::RoleFromOwner,
    M::RoleFromAdmin,
    M::RoleFromEditor,
    M::RoleFromViewer,
    M::RoleToOwner,
    M::RoleToAdmin,
    M::RoleToEditor,
    M::RoleToViewer,
];

const ADMIN_MEMBER_MANAGEMENT: &[M] = &[
    M::RemoveMember,
    M::ManageRole,
    M::RoleFromAdmin,
    M::RoleFromEditor,
    M::RoleFromViewer,
    M::RoleToAdmin,
    M::RoleToEditor,
    M::RoleToViewer,
];

const TEAM_SETTINGS: &[M] = &[M::TeamName, M::TeamIcon, M::TeamConfig, M::UpdateTeamDomain];
const USER_PROFILE: &[M] = &[M::RenameUser, M::UpdateUserAvatar];
const BUILDER_ACTIONS: &[M] = &[M::CreateAction, M::EditAction, M::PreviewAction, M::RunAction];

const MANAGE_GRANTS: GrantTable<M> = &[
    (Role::Anonymous, R::App, &[M::RunAction]),
    (Role::Owner, R::Team, TEAM_SETTINGS),
    (Role::Owner, R::TeamMember, OWNER_MEMBER_MANAGEMENT),
    (Role::Owner, R::User, USER_PROFILE),
    (Role::Owner, R::Invite, &[M::ConfigInvite, M::InviteLink]),
    (Role::Owner, R::Domain, &[M::TeamDomain, M::AppDomain]),
    (Role::Owner, R::Billing, &[M::PaymentInfo]),
    (Role::Owner, R::BuilderDashboard, &[M::DashboardBroadcast]),
    (Role::Owner, R::App, &[M::CreateApp, M::EditApp]),
    (Role::Owner, R::Resource, &[M::CreateResource, M::EditResource]),
    (Role::Owner, R::Action, BUILDER_ACTIONS),
    (Role::Admin, R::Team, TEAM_SETTINGS),
    (Role::Admin, R::TeamMember, ADMIN_MEMBER_MANAGEMENT),
    (Role::Admin, R::User, USER_PROFILE),
    (Role::Admin, R::Invite, &[M::ConfigInvite, M::InviteLink]),
    (Role::Admin, R::Domain, &[M::TeamDomain, M::AppDomain]),
    (Role::Admin, R::Billing, &[M::PaymentInfo]),
    (Role::Admin, R::BuilderDashboard, &[M::DashboardBroadcast]),
    (Role::Admin, R::App, &[M::CreateApp, M::EditApp]),
    (Role::Admin, R::Resource, &[M::CreateResource, M::EditResource]),
    (Role::Admin, R::Action, BUILDER_ACTIONS),
    (
        Role::Editor,
        R::TeamMember,
        &[
            M::RemoveMember,
            M::ManageRole,
            M::RoleFromEditor,
            M::RoleFromViewer,
            M::RoleToEditor,
            M::RoleToViewer,
        ],
    ),
    (Role::Editor, R::User, USER_PROFILE),
    (Role::Editor, R::BuilderDashboard, &[M::DashboardBroadcast]),
    (Role::Editor, R::App, &[M::CreateApp, M::EditApp]),
    (Role::Editor, R::Resource, &[M::CreateResource, M::EditResource]),
    (Role::Editor, R::Action, BUILDER_ACTIONS),
    (
        Role::Viewer,
        R::TeamMember,
        &[M::RemoveMember, M::ManageRole, M::RoleFromViewer, M::RoleToViewer],
    ),
    (Role::Viewer, R::User, USER_PROFILE),
    (Role::Viewer, R::Action, &[M::RunAction]),
];

const SPECIAL_GRANTS: GrantTable<S> = &[
    (Role::Owner, R::Team, &[S::EditorAndViewerCanInviteSwitch]),
    (Role::Owner, R::TeamMember, &[S::TransferOwner]),
    (Role::Owner, R::Invite, &[S::InviteLinkRenew]),
    (Role::Owner, R::App, &[S::ReleaseApp]),
    (Role::Admin, R::Team, &[S::EditorAndViewerCanInviteSwitch]),
    (Role::Admin, R::Invite, &[S::InviteLinkRenew]),
    (Role::Admin, R::App, &[S::ReleaseApp]),
    (Role::Editor, R::App, &[S::ReleaseApp]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_is_shared() {
        assert!(std::ptr::eq(PermissionMatrix::global(), PermissionMatrix::global()));
    }

    #[test]
    fn test_missing_levels_deny() {
        let matrix = PermissionMatrix::global();
        // no special grants at all for viewers
        assert!(matrix.permission_set(ActionCategory::Special, Role::Viewer).is_none());
        assert!(!matrix.is_allowed(ActionCategory::Special, Role::Viewer, R::App, S::ReleaseApp.id()));
        // role present, resource absent
        assert!(matrix.slice(ActionCategory::Access, Role::Editor, R::Billing).is_none());
        assert!(!matrix.is_allowed(ActionCategory::Access, Role::Editor, R::Billing, A::View.id()));
        // resource present, action absent
        assert!(!matrix.is_allowed(ActionCategory::Access, Role::Owner, R::Invite, A::InviteOwner.id()));
        // IDs outside any catalog
        assert!(!matrix.is_allowed(ActionCategory::Manage, Role::Owner, R::Team, 999));
    }

    #[test]
    fn test_anonymous_is_narrow() {
        let matrix = PermissionMatrix::global();
        assert!(matrix.is_allowed(ActionCategory::Access, Role::Anonymous, R::App, A::View.id()));
        assert!(matrix.is_allowed(ActionCategory::Access, Role::Anonymous, R::Action, A::View.id()));
        assert!(matrix.is_allowed(ActionCategory::Manage, Role::Anonymous, R::App, M::RunAction.id()));
        assert!(!matrix.is_allowed(ActionCategory::Access, Role::Anonymous, R::Team, A::View.id()));
        assert!(matrix.permission_set(ActionCategory::Delete, Role::Anonymous).is_none());
        assert!(matrix.permission_set(ActionCategory::Special, Role::Anonymous).is_none());
    }

    #[test]
    fn test_billing_is_owner_only() {
        let matrix = PermissionMatrix::global();
        assert!(matrix.is_allowed(ActionCategory::Access, Role::Owner, R::Billing, A::View.id()));
        assert!(!matrix.is_allowed(ActionCategory::Access, Role::Admin, R::Billing, A::View.id()));
        assert!(matrix.is_allowed(ActionCategory::Delete, Role::Owner, R::Billing, D::Delete.id()));
        assert!(!matrix.is_allowed(ActionCategory::Delete, Role::Admin, R::Billing, D::Delete.id()));
        assert!(!matrix.is_allowed(ActionCategory::Delete, Role::Admin, R::Team, D::Delete.id()));
    }

    #[test]
    fn test_same_id_differs_by_category() {
        let matrix = PermissionMatrix::global();
        // ID 1 is View in Access and TeamName in Manage
        assert!(matrix.is_allowed(ActionCategory::Access, Role::Editor, R::App, 1));
        assert!(!matrix.is_allowed(ActionCategory::Manage, Role::Editor, R::App, 1));
    }

    #[test]
    fn test_builder_merges_grants() {
        let matrix = PermissionMatrix::builder()
            .grant(Role::Editor, R::Drive, &[M::CreateFile])
            .grant(Role::Editor, R::Drive, &[M::EditFile])
            .build();
        assert!(matrix.is_allowed(ActionCategory::Manage, Role::Editor, R::Drive, M::CreateFile.id()));
        assert!(matrix.is_allowed(ActionCategory::Manage, Role::Editor, R::Drive, M::EditFile.id()));
        assert!(!matrix.is_allowed(ActionCategory::Access, Role::Editor, R::Drive, A::View.id()));
    }

    #[test]
    fn test_empty_matrix_denies_everything() {
        let matrix = PermissionMatrix::empty();
        for role in Role::ALL {
            for category in ActionCategory::ALL {
                assert!(matrix.permission_set(*category, *role).is_none());
                assert!(!matrix.is_allowed(*category, *role, R::Team, 1));
            }
        }
    }

    #[test]
    fn test_permission_set_is_empty() {
        assert!(PermissionSet::default().is_empty());
        let matrix = PermissionMatrix::global();
        let owner_special = matrix.permission_set(ActionCategory::Special, Role::Owner).unwrap();
        assert!(!owner_special.is_empty());
        assert!(owner_special.allows(R::TeamMember, S::TransferOwner.id()));
    }
}
