//! Attribute-based access control.
//!
//! A static [`PermissionMatrix`] answers `(category, role, resource, action)`
//! lookups, deny-by-default. An [`AttributeEvaluator`] binds one
//! `(role, resource)` pair and adds the two relational checks: role
//! transitions and invite sponsorship.
//!
//! ```rust
//! use teamgate::access::{AccessAction, AttributeEvaluator, ResourceType, Role};
//!
//! let editor = AttributeEvaluator::new(Role::Editor, ResourceType::Invite);
//! assert!(editor.can_access(AccessAction::InviteByEmail));
//! assert!(editor.can_sponsor_invite_at_role(Role::Viewer));
//! assert!(!editor.can_sponsor_invite_at_role(Role::Owner));
//! ```

mod evaluator;
mod matrix;
mod types;

pub use evaluator::{AttributeEvaluator, invite_action, role_from_action, role_to_action};
pub use matrix::{ActionSet, PermissionMatrix, PermissionMatrixBuilder, PermissionSet};
pub use types::{
    AccessAction, ActionCategory, CategoryAction, DeleteAction, ManageAction, ResourceType, Role,
    SpecialAction, UnknownCatalogValue,
};
