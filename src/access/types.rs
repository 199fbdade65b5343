//! Closed catalogs of roles, resource types, categories and action IDs.
//!
//! Every value carries a stable integer ID. Action IDs are only meaningful
//! together with their [`ActionCategory`]: `ManageAction::TeamName` and
//! `AccessAction::View` are both ID 1.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! id_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident: $repr:ty {
            $($variant:ident = $id:literal => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub const fn id(self) -> $repr {
                match self {
                    $(Self::$variant => $id),+
                }
            }

            pub fn from_id(id: $repr) -> Option<Self> {
                match id {
                    $($id => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownCatalogValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|value| value.as_str() == s)
                    .ok_or_else(|| UnknownCatalogValue(s.to_owned()))
            }
        }
    };
}

/// Returned when parsing a catalog value from an unknown label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown catalog value `{0}`")]
pub struct UnknownCatalogValue(pub String);

id_enum! {
    /// A team member's privilege level.
    ///
    /// Privilege is not a total order: Owner and Admin both outrank Editor and
    /// Viewer, but only one Owner exists per team.
    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Role: i16 {
        Anonymous = -1 => "anonymous",
        Owner = 1 => "owner",
        Admin = 2 => "admin",
        Editor = 3 => "editor",
        Viewer = 4 => "viewer",
    }
}

impl Role {
    /// Roles a membership can hold.
    pub const MEMBER_ROLES: [Self; 4] = [Self::Owner, Self::Admin, Self::Editor, Self::Viewer];

    pub fn is_editor_or_viewer(self) -> bool {
        matches!(self, Self::Editor | Self::Viewer)
    }

    pub fn is_member_role(self) -> bool {
        self != Self::Anonymous
    }
}

id_enum! {
    /// Class of protected object a check applies to.
    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ResourceType: u16 {
        Team = 1 => "team",
        TeamMember = 2 => "team_member",
        User = 3 => "user",
        Invite = 4 => "invite",
        Domain = 5 => "domain",
        Billing = 6 => "billing",
        BuilderDashboard = 7 => "builder_dashboard",
        App = 8 => "app",
        Components = 9 => "components",
        Resource = 10 => "resource",
        Action = 11 => "action",
        Transformer = 12 => "transformer",
        Job = 13 => "job",
        TreeStates = 14 => "tree_states",
        KvStates = 15 => "kv_states",
        SetStates = 16 => "set_states",
        PromoteCodes = 17 => "promote_codes",
        PromoteCodeUsages = 18 => "promote_code_usages",
        Roles = 19 => "roles",
        UserRoleRelations = 20 => "user_role_relations",
        UnitRoleRelations = 21 => "unit_role_relations",
        CompensatingTransactions = 22 => "compensating_transactions",
        TransactionSerials = 23 => "transaction_serials",
        Capacities = 24 => "capacities",
        Drive = 25 => "drive",
        PeripheralService = 26 => "peripheral_service",
    }
}

id_enum! {
    /// Independent namespace of checkable actions.
    #[derive(Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ActionCategory: u16 {
        Access = 1 => "access",
        Delete = 2 => "delete",
        Manage = 3 => "manage",
        Special = 4 => "special",
    }
}

id_enum! {
    pub enum AccessAction: u16 {
        View = 1 => "view",
        InviteByLink = 2 => "invite_by_link",
        InviteByEmail = 3 => "invite_by_email",
        InviteOwner = 4 => "invite_owner",
        InviteAdmin = 5 => "invite_admin",
        InviteEditor = 6 => "invite_editor",
        InviteViewer = 7 => "invite_viewer",
    }
}

id_enum! {
    pub enum DeleteAction: u16 {
        Delete = 1 => "delete",
        DeleteTeamDomain = 2 => "delete_team_domain",
        DeleteAppDomain = 3 => "delete_app_domain",
    }
}

id_enum! {
    pub enum ManageAction: u16 {
        TeamName = 1 => "team_name",
        TeamIcon = 2 => "team_icon",
        TeamConfig = 3 => "team_config",
        UpdateTeamDomain = 4 => "update_team_domain",
        RemoveMember = 5 => "remove_member",
        ManageRole = 6 => "role",
        RoleFromOwner = 7 => "role_from_owner",
        RoleFromAdmin = 8 => "role_from_admin",
        RoleFromEditor = 9 => "role_from_editor",
        RoleFromViewer = 10 => "role_from_viewer",
        RoleToOwner = 11 => "role_to_owner",
        RoleToAdmin = 12 => "role_to_admin",
        RoleToEditor = 13 => "role_to_editor",
        RoleToViewer = 14 => "role_to_viewer",
        RenameUser = 15 => "rename_user",
        UpdateUserAvatar = 16 => "update_user_avatar",
        ConfigInvite = 17 => "config_invite",
        InviteLink = 18 => "invite_link",
        TeamDomain = 19 => "team_domain",
        AppDomain = 20 => "app_domain",
        Payment = 21 => "payment",
        PaymentInfo = 22 => "payment_info",
        DashboardBroadcast = 23 => "dashboard_broadcast",
        CreateApp = 24 => "create_app",
        EditApp = 25 => "edit_app",
        CreateResource = 26 => "create_resource",
        EditResource = 27 => "edit_resource",
        CreateAction = 28 => "create_action",
        EditAction = 29 => "edit_action",
        PreviewAction = 30 => "preview_action",
        RunAction = 31 => "run_action",
        CreateFile = 32 => "create_file",
        EditFile = 33 => "edit_file",
        CreateSharelink = 34 => "create_sharelink",
    }
}

id_enum! {
    pub enum SpecialAction: u16 {
        EditorAndViewerCanInviteSwitch = 1 => "editor_and_viewer_can_invite_switch",
        TransferOwner = 2 => "transfer_owner",
        InviteLinkRenew = 3 => "invite_link_renew",
        ReleaseApp = 4 => "release_app",
        GenerateSql = 5 => "generate_sql",
        TakeSnapshot = 6 => "take_snapshot",
        RecoverSnapshot = 7 => "recover_snapshot",
    }
}

/// An action bound to the category whose namespace it lives in.
pub trait CategoryAction: Copy {
    const CATEGORY: ActionCategory;

    fn action_id(self) -> u16;
}

impl CategoryAction for AccessAction {
    const CATEGORY: ActionCategory = ActionCategory::Access;

    fn action_id(self) -> u16 {
        self.id()
    }
}

impl CategoryAction for DeleteAction {
    const CATEGORY: ActionCategory = ActionCategory::Delete;

    fn action_id(self) -> u16 {
        self.id()
    }
}

impl CategoryAction for ManageAction {
    const CATEGORY: ActionCategory = ActionCategory::Manage;

    fn action_id(self) -> u16 {
        self.id()
    }
}

impl CategoryAction for SpecialAction {
    const CATEGORY: ActionCategory = ActionCategory::Special;

    fn action_id(self) -> u16 {
        self.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ids() {
        assert_eq!(Role::Anonymous.id(), -1);
        assert_eq!(Role::Owner.id(), 1);
        assert_eq!(Role::Viewer.id(), 4);
        assert_eq!(Role::from_id(3), Some(Role::Editor));
        assert_eq!(Role::from_id(0), None);
        assert_eq!(Role::from_id(5), None);
    }

    #[test]
    fn test_role_labels_parse_back() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_classes() {
        assert!(Role::Editor.is_editor_or_viewer());
        assert!(Role::Viewer.is_editor_or_viewer());
        assert!(!Role::Admin.is_editor_or_viewer());
        assert!(!Role::Anonymous.is_member_role());
        assert!(Role::MEMBER_ROLES.iter().all(|role| role.is_member_role()));
    }

    #[test]
    fn test_catalog_sizes() {
        assert_eq!(ResourceType::ALL.len(), 26);
        assert_eq!(AccessAction::ALL.len(), 7);
        assert_eq!(DeleteAction::ALL.len(), 3);
        assert_eq!(ManageAction::ALL.len(), 34);
        assert_eq!(SpecialAction::ALL.len(), 7);
    }

    #[test]
    fn test_ids_overlap_across_categories() {
        assert_eq!(AccessAction::View.action_id(), ManageAction::TeamName.action_id());
        assert_ne!(AccessAction::CATEGORY, ManageAction::CATEGORY);
    }

    #[test]
    fn test_role_serde_uses_labels() {
        assert_eq!(serde_json::to_string(&Role::Editor).unwrap(), "\"editor\"");
        let role: Role = serde_json::from_str("\"viewer\"").unwrap();
        assert_eq!(role, Role::Viewer);
    }
}
