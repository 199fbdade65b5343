//! Per-request permission answers for one role and resource type.

use super::matrix::{ActionSet, PermissionMatrix};
use super::types::{
    AccessAction, ActionCategory, DeleteAction, ManageAction, ResourceType, Role, SpecialAction,
};

/// Role → "manage role from X" grant.
const ROLE_FROM_ACTIONS: &[(Role, ManageAction)] = &[
    (Role::Owner, ManageAction::RoleFromOwner),
    (Role::Admin, ManageAction::RoleFromAdmin),
    (Role::Editor, ManageAction::RoleFromEditor),
    (Role::Viewer, ManageAction::RoleFromViewer),
];

/// Role → "manage role to Y" grant.
const ROLE_TO_ACTIONS: &[(Role, ManageAction)] = &[
    (Role::Owner, ManageAction::RoleToOwner),
    (Role::Admin, ManageAction::RoleToAdmin),
    (Role::Editor, ManageAction::RoleToEditor),
    (Role::Viewer, ManageAction::RoleToViewer),
];

/// Role → "invite as X" grant.
const INVITE_AS_ACTIONS: &[(Role, AccessAction)] = &[
    (Role::Owner, AccessAction::InviteOwner),
    (Role::Admin, AccessAction::InviteAdmin),
    (Role::Editor, AccessAction::InviteEditor),
    (Role::Viewer, AccessAction::InviteViewer),
];

fn translate<Act: Copy>(table: &[(Role, Act)], role: Role) -> Option<Act> {
    table
        .iter()
        .find(|(candidate, _)| *candidate == role)
        .map(|(_, action)| *action)
}

/// The Manage grant needed to change a member away from `role`.
pub fn role_from_action(role: Role) -> Option<ManageAction> {
    translate(ROLE_FROM_ACTIONS, role)
}

/// The Manage grant needed to change a member into `role`.
pub fn role_to_action(role: Role) -> Option<ManageAction> {
    translate(ROLE_TO_ACTIONS, role)
}

/// The Access grant needed to invite someone at `role`.
pub fn invite_action(role: Role) -> Option<AccessAction> {
    translate(INVITE_AS_ACTIONS, role)
}

/// Answers permission questions for one `(role, resource)` pair.
///
/// Built per request; binds the four category slices of the matrix up front
/// so each query is a single set lookup. Every query denies when its slice
/// is missing.
///
/// ```rust
/// use teamgate::access::{AttributeEvaluator, ManageAction, ResourceType, Role};
///
/// let admin = AttributeEvaluator::new(Role::Admin, ResourceType::TeamMember);
/// assert!(admin.can_manage(ManageAction::RemoveMember));
/// assert!(admin.can_modify_role_transition(Role::Editor, Role::Viewer));
/// assert!(!admin.can_modify_role_transition(Role::Editor, Role::Owner));
/// ```
#[derive(Debug, Clone)]
pub struct AttributeEvaluator<'m> {
    role: Role,
    resource: ResourceType,
    unit_id: Option<i64>,
    access: Option<&'m ActionSet>,
    delete: Option<&'m ActionSet>,
    manage: Option<&'m ActionSet>,
    special: Option<&'m ActionSet>,
}

impl AttributeEvaluator<'static> {
    /// Evaluator over the global matrix.
    pub fn new(role: Role, resource: ResourceType) -> Self {
        Self::with_matrix(PermissionMatrix::global(), role, resource)
    }
}

impl<'m> AttributeEvaluator<'m> {
    pub fn with_matrix(matrix: &'m PermissionMatrix, role: Role, resource: ResourceType) -> Self {
        Self {
            role,
            resource,
            unit_id: None,
            access: matrix.slice(ActionCategory::Access, role, resource),
            delete: matrix.slice(ActionCategory::Delete, role, resource),
            manage: matrix.slice(ActionCategory::Manage, role, resource),
            special: matrix.slice(ActionCategory::Special, role, resource),
        }
    }

    /// Attaches a resource instance ID. Carried for callers, not consulted by any check.
    #[must_use]
    pub fn for_unit(mut self, unit_id: i64) -> Self {
        self.unit_id = Some(unit_id);
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn resource(&self) -> ResourceType {
        self.resource
    }

    pub fn unit_id(&self) -> Option<i64> {
        self.unit_id
    }

    /// Raw `(category, action_id)` lookup.
    pub fn check(&self, category: ActionCategory, action_id: u16) -> bool {
        let slice = match category {
            ActionCategory::Access => self.access,
            ActionCategory::Delete => self.delete,
            ActionCategory::Manage => self.manage,
            ActionCategory::Special => self.special,
        };
        slice.is_some_and(|actions| actions.contains(&action_id))
    }

    pub fn can_access(&self, action: AccessAction) -> bool {
        self.check(ActionCategory::Access, action.id())
    }

    pub fn can_delete(&self, action: DeleteAction) -> bool {
        self.check(ActionCategory::Delete, action.id())
    }

    pub fn can_manage(&self, action: ManageAction) -> bool {
        self.check(ActionCategory::Manage, action.id())
    }

    pub fn can_manage_special(&self, action: SpecialAction) -> bool {
        self.check(ActionCategory::Special, action.id())
    }

    /// Whether this role may move a member from `from` to `to`.
    ///
    /// Both the "from" and the "to" grant must be held. Roles missing from
    /// either translation table deny. Owner to Owner always denies: handing
    /// over ownership is a transfer from a non-owner role.
    pub fn can_modify_role_transition(&self, from: Role, to: Role) -> bool {
        if from == Role::Owner && to == Role::Owner {
            return false;
        }
        let (Some(from_action), Some(to_action)) = (role_from_action(from), role_to_action(to))
        else {
            return false;
        };
        self.can_manage(from_action) && self.can_manage(to_action)
    }

    /// Whether this role may invite someone at `target`.
    pub fn can_sponsor_invite_at_role(&self, target: Role) -> bool {
        invite_action(target).is_some_and(|action| self.can_access(action))
    }

    pub fn is_editor_or_viewer(&self) -> bool {
        self.role.is_editor_or_viewer()
    }
}
