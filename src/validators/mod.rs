//! Input validation for signup and invites.

mod email;
mod nickname;
mod password;

pub use email::{normalize_email, validate_email};
pub use nickname::validate_nickname;
pub use password::validate_password;

use thiserror::Error;

use crate::AccessError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("email cannot be empty")]
    EmailEmpty,
    #[error("email is too long (max 254 characters)")]
    EmailTooLong,
    #[error("invalid email format")]
    EmailInvalidFormat,
    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),
    #[error("password is too long (max {0} characters)")]
    PasswordTooLong(usize),
    #[error("nickname cannot be empty")]
    NicknameEmpty,
    #[error("nickname is too long (max {0} characters)")]
    NicknameTooLong(usize),
}

impl From<ValidationError> for AccessError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}
