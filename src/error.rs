use std::fmt;

use thiserror::Error;

use crate::teams::Invite;

/// Entity named by a [`AccessError::NotFound`] or [`AccessError::AlreadyExists`] error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Team,
    User,
    Membership,
    Invite,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Team => "team",
            Self::User => "user",
            Self::Membership => "membership",
            Self::Invite => "invite",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of an [`AccessError`].
///
/// The calling layer maps each kind to its own vocabulary (an HTTP status,
/// an RPC code, an exit code) without matching on individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Denied by policy or by a team toggle.
    Forbidden,
    /// A looked-up entity is absent.
    NotFound,
    /// Malformed input or token.
    BadRequest,
    /// Uniqueness or invariant guarantees would break.
    Conflict,
    /// A collaborator (storage, notification) failed.
    Unavailable,
    /// Bug or corrupted state inside this crate.
    Internal,
}

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("access denied by policy")]
    AccessDenied,

    #[error("{0} is disabled for this team")]
    PermissionClosedByTeam(&'static str),

    #[error("{0} not found")]
    NotFound(Entity),

    #[error("invalid invite token")]
    InvalidToken,

    #[error("invalid bearer token")]
    Unauthenticated,

    #[error("invite is no longer available")]
    InviteUnavailable,

    #[error("email does not match the invited address")]
    EmailMismatch,

    #[error("user is already a member of this team")]
    AlreadyMember,

    #[error("email already belongs to a member of this team")]
    EmailAlreadyUsed,

    #[error("{0} already exists")]
    AlreadyExists(Entity),

    #[error("the team owner cannot be removed")]
    CannotRemoveOwner,

    #[error("ownership must be transferred first")]
    OwnerMustTransferFirst,

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("invite notification failed: {reason}")]
    DeliveryFailed {
        /// The invite as persisted, with its delivery status set to failed.
        invite: Box<Invite>,
        reason: String,
    },

    #[error("storage error during {operation}: {message}")]
    Storage {
        operation: &'static str,
        message: String,
    },

    #[error("failed to hash password")]
    PasswordHash,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AccessError {
    /// Wraps a persistence failure with the name of the failing operation.
    pub fn storage(operation: &'static str, message: impl fmt::Display) -> Self {
        Self::Storage {
            operation,
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AccessDenied | Self::PermissionClosedByTeam(_) | Self::Unauthenticated => {
                ErrorKind::Forbidden
            }
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidToken | Self::EmailMismatch | Self::Validation(_) => {
                ErrorKind::BadRequest
            }
            Self::InviteUnavailable
            | Self::AlreadyMember
            | Self::EmailAlreadyUsed
            | Self::AlreadyExists(_)
            | Self::CannotRemoveOwner
            | Self::OwnerMustTransferFirst
            | Self::InvariantViolation(_) => ErrorKind::Conflict,
            Self::DeliveryFailed { .. } | Self::Storage { .. } => ErrorKind::Unavailable,
            Self::PasswordHash | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True for errors raised after the requested state change was persisted.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::DeliveryFailed { .. })
    }

    /// True for errors that guard the single-owner and uniqueness invariants.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::CannotRemoveOwner | Self::OwnerMustTransferFirst | Self::InvariantViolation(_)
        )
    }
}
