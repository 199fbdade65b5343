//! Invite token codec.
//!
//! A token is a reversible encoding of the invite UID and nothing else. Role
//! and team are always read from storage, so a forged token can at best name
//! another invite. The UID's randomness is what keeps tokens unguessable.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use uuid::Uuid;

use crate::AccessError;

pub trait InviteTokenCodec: Send + Sync {
    fn encode(&self, uid: Uuid) -> String;

    /// # Errors
    ///
    /// Returns `AccessError::InvalidToken` when `token` does not decode to a UID.
    fn decode(&self, token: &str) -> Result<Uuid, AccessError>;
}

/// URL-safe base64 of the hyphenated UID string.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64InviteCodec;

impl InviteTokenCodec for Base64InviteCodec {
    fn encode(&self, uid: Uuid) -> String {
        URL_SAFE.encode(uid.hyphenated().to_string())
    }

    fn decode(&self, token: &str) -> Result<Uuid, AccessError> {
        let bytes = URL_SAFE
            .decode(token.trim())
            .map_err(|_| AccessError::InvalidToken)?;
        let text = std::str::from_utf8(&bytes).map_err(|_| AccessError::InvalidToken)?;
        Uuid::parse_str(text).map_err(|_| AccessError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_decodes_to_same_uid() {
        let codec = Base64InviteCodec;
        let uid = Uuid::new_v4();
        let token = codec.encode(uid);
        assert_eq!(token.len(), 48);
        assert!(!token.contains('+') && !token.contains('/'));
        assert_eq!(codec.decode(&token).unwrap(), uid);
    }

    #[test]
    fn test_rejects_garbage() {
        let codec = Base64InviteCodec;
        assert!(matches!(codec.decode("%%%"), Err(AccessError::InvalidToken)));
        // valid base64, not a UID
        let token = URL_SAFE.encode("team=1;role=owner");
        assert!(matches!(codec.decode(&token), Err(AccessError::InvalidToken)));
        assert!(matches!(codec.decode(""), Err(AccessError::InvalidToken)));
    }
}
