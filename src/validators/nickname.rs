use super::ValidationError;

pub const MAX_NICKNAME_LENGTH: usize = 32;

pub fn validate_nickname(nickname: &str) -> Result<(), ValidationError> {
    let trimmed = nickname.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::NicknameEmpty);
    }

    if trimmed.chars().count() > MAX_NICKNAME_LENGTH {
        return Err(ValidationError::NicknameTooLong(MAX_NICKNAME_LENGTH));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_nicknames() {
        assert!(validate_nickname("ada").is_ok());
        assert!(validate_nickname("José García").is_ok());
    }

    #[test]
    fn test_invalid_nicknames() {
        assert_eq!(validate_nickname("   ").unwrap_err(), ValidationError::NicknameEmpty);
        assert_eq!(
            validate_nickname(&"n".repeat(33)).unwrap_err(),
            ValidationError::NicknameTooLong(MAX_NICKNAME_LENGTH)
        );
    }
}
