use async_trait::async_trait;
use uuid::Uuid;

use crate::{AccessError, SecretString};

/// The user a bearer token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub user_uid: Uuid,
}

/// Resolves bearer tokens issued by the session layer.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns `AccessError::Unauthenticated` for unknown or expired tokens.
    async fn resolve(&self, token: &SecretString) -> Result<Identity, AccessError>;
}
