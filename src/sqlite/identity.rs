use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::config::BearerConfig;
use crate::crypto::{BEARER_TOKEN_LENGTH, generate_token, hash_token};
use crate::teams::{Identity, IdentityProvider};
use crate::{AccessError, SecretString};

/// Bearer tokens stored as SHA-256 digests in `access_tokens`.
#[derive(Clone)]
pub struct SqliteIdentityProvider {
    pool: SqlitePool,
    ttl: Duration,
}

#[derive(FromRow)]
struct IdentityRecord {
    user_id: i64,
    user_uid: String,
}

impl SqliteIdentityProvider {
    pub fn new(pool: SqlitePool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    pub fn from_config(pool: SqlitePool, config: &BearerConfig) -> Self {
        Self::new(pool, config.token_ttl)
    }

    /// Issues a token for `user_id`. Only the digest is persisted.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn issue_token(&self, user_id: i64) -> Result<SecretString, AccessError> {
        let token = generate_token(BEARER_TOKEN_LENGTH);
        let now = Utc::now();
        let expires_at: DateTime<Utc> = now + self.ttl;

        sqlx::query(
            "INSERT INTO access_tokens (token_hash, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(hash_token(&token))
        .bind(user_id)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            log::error!(
                target: "teamgate",
                "msg=\"database error\", operation=\"issue_token\", error=\"{e}\""
            );
            AccessError::storage("issue_token", e)
        })?;

        log::debug!(target: "teamgate", "msg=\"bearer token issued\", user_id={user_id}");
        Ok(SecretString::new(token))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    pub async fn revoke_token(&self, token: &SecretString) -> Result<(), AccessError> {
        sqlx::query("DELETE FROM access_tokens WHERE token_hash = ?")
            .bind(hash_token(token.expose_secret()))
            .execute(&self.pool)
            .await
            .map_err(|e| AccessError::storage("revoke_token", e))?;
        Ok(())
    }

    /// Deletes expired tokens and returns how many were removed.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    pub async fn prune_expired(&self) -> Result<u64, AccessError> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| AccessError::storage("prune_expired", e))?;

        let pruned = result.rows_affected();
        if pruned > 0 {
            log::info!(target: "teamgate", "msg=\"expired tokens pruned\", count={pruned}");
        }
        Ok(pruned)
    }
}

#[async_trait]
impl IdentityProvider for SqliteIdentityProvider {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, err))]
    async fn resolve(&self, token: &SecretString) -> Result<Identity, AccessError> {
        let row: Option<IdentityRecord> = sqlx::query_as(
            r"SELECT u.id AS user_id, u.uid AS user_uid
              FROM access_tokens t
              JOIN users u ON u.id = t.user_id
              WHERE t.token_hash = ? AND t.expires_at > ?",
        )
        .bind(hash_token(token.expose_secret()))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AccessError::storage("resolve_token", e))?;

        let Some(row) = row else {
            log::debug!(target: "teamgate", "msg=\"bearer token rejected\"");
            return Err(AccessError::Unauthenticated);
        };
        let user_uid =
            Uuid::parse_str(&row.user_uid).map_err(|e| AccessError::storage("resolve_token", e))?;

        Ok(Identity {
            user_id: row.user_id,
            user_uid,
        })
    }
}
