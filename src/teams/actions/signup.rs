use chrono::Utc;

use super::join::{consume_invite, inspect_invite};
use super::load_team;
use crate::config::SignupConfig;
use crate::crypto::{Argon2Hasher, PasswordHasher};
use crate::events::{TeamEvent, dispatch};
use crate::teams::repository::{CreateMembership, CreateUser, TeamStore};
use crate::teams::token::{Base64InviteCodec, InviteTokenCodec};
use crate::teams::types::{Invite, Membership, MembershipStatus, Team, User};
use crate::validators::{normalize_email, validate_email, validate_nickname, validate_password};
use crate::{AccessError, Entity, SecretString};

#[derive(Debug)]
pub struct SignupInput {
    pub nickname: String,
    pub email: String,
    pub password: SecretString,
    pub language: String,
    /// Join through this invite instead of the default team.
    pub invite_token: Option<SecretString>,
}

#[derive(Debug)]
pub struct SignupOutput {
    pub user: User,
    /// `None` when no invite was given and no default team is configured.
    pub membership: Option<Membership>,
}

enum Destination {
    Invite(Invite),
    DefaultTeam(Team),
    Nowhere,
}

/// Creates an account, optionally joining a team in the same request.
///
/// An invite token is checked before the account exists. If joining fails
/// afterwards the account is deleted again, so a failed signup never leaves
/// an orphan user behind.
pub struct SignupAction<S, H = Argon2Hasher, C = Base64InviteCodec> {
    store: S,
    hasher: H,
    codec: C,
    config: SignupConfig,
}

impl<S: TeamStore, H: PasswordHasher> SignupAction<S, H> {
    pub fn new(store: S, hasher: H) -> Self {
        Self::with_config(store, hasher, SignupConfig::default())
    }

    pub fn with_config(store: S, hasher: H, config: SignupConfig) -> Self {
        Self {
            store,
            hasher,
            codec: Base64InviteCodec,
            config,
        }
    }
}

impl<S: TeamStore, H: PasswordHasher, C: InviteTokenCodec> SignupAction<S, H, C> {
    pub fn with_codec(store: S, hasher: H, codec: C, config: SignupConfig) -> Self {
        Self {
            store,
            hasher,
            codec,
            config,
        }
    }

    /// # Returns
    ///
    /// - `Ok(output)` - account created, joined if an invite or default team applied
    /// - `Err(AccessError::Validation)` - nickname, email or password rejected
    /// - `Err(AccessError::AlreadyExists)` - email already registered
    /// - `Err(AccessError::PermissionClosedByTeam)` - default team blocks registration
    /// - `Err(_)` - any invite error from joining; the account is rolled back
    #[cfg_attr(feature = "tracing", tracing::instrument(name = "signup", skip_all, err))]
    pub async fn execute(&self, input: SignupInput) -> Result<SignupOutput, AccessError> {
        let email = normalize_email(&input.email);
        validate_nickname(&input.nickname)?;
        validate_email(&email)?;
        validate_password(input.password.expose_secret())?;

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(AccessError::AlreadyExists(Entity::User));
        }

        let destination = self.destination(input.invite_token.as_ref(), &email).await?;

        let password_digest = self.hasher.hash(input.password.expose_secret())?;
        let user = self
            .store
            .create_user(CreateUser {
                nickname: input.nickname,
                email,
                password_digest,
                language: input.language,
            })
            .await?;

        let joined = match &destination {
            Destination::Invite(invite) => consume_invite(&self.store, invite, user.id).await.map(Some),
            Destination::DefaultTeam(team) => self
                .store
                .create_membership(CreateMembership {
                    team_id: team.id,
                    user_id: user.id,
                    role: self.config.default_role,
                    status: MembershipStatus::Ok,
                })
                .await
                .map(Some),
            Destination::Nowhere => Ok(None),
        };

        let membership = match joined {
            Ok(membership) => membership,
            Err(err) => {
                self.compensate(&user, &err).await;
                return Err(err);
            }
        };

        log::info!(
            target: "teamgate",
            "msg=\"user registered\", user_id={}, team_id={:?}",
            user.id,
            membership.as_ref().map(|m| m.team_id)
        );
        dispatch(TeamEvent::UserRegistered {
            user_id: user.id,
            email: user.email.clone(),
            at: Utc::now(),
        })
        .await;

        Ok(SignupOutput { user, membership })
    }

    async fn destination(
        &self,
        token: Option<&SecretString>,
        email: &str,
    ) -> Result<Destination, AccessError> {
        if let Some(token) = token {
            let (invite, _) = inspect_invite(&self.store, &self.codec, token, email).await?;
            return Ok(Destination::Invite(invite));
        }

        let Some(team_id) = self.config.default_team_id else {
            return Ok(Destination::Nowhere);
        };
        let team = load_team(&self.store, team_id).await?;
        if team.permission.block_register {
            return Err(AccessError::PermissionClosedByTeam("registration"));
        }
        Ok(Destination::DefaultTeam(team))
    }

    async fn compensate(&self, user: &User, cause: &AccessError) {
        log::warn!(
            target: "teamgate",
            "msg=\"signup join failed, removing account\", user_id={}, error=\"{cause}\"",
            user.id
        );
        if let Err(err) = self.store.delete_user(user.id).await {
            log::error!(
                target: "teamgate",
                "msg=\"failed to remove account after signup failure\", user_id={}, error=\"{err}\"",
                user.id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::teams::actions::fixtures::{team_with_owner, team_with_permission};
    use crate::teams::mocks::MockTeamStore;
    use crate::teams::repository::{CreateEmailInvite, CreateInvite};
    use crate::teams::types::TeamPermission;
    use crate::teams::{InviteRepository, TeamTransactions, UserRepository};
    use uuid::Uuid;

    fn hasher() -> Argon2Hasher {
        Argon2Hasher::new(4096, 1, 1)
    }

    fn input(email: &str, token: Option<SecretString>) -> SignupInput {
        SignupInput {
            nickname: "newbie".to_owned(),
            email: email.to_owned(),
            password: SecretString::new("hunter22"),
            language: "en-US".to_owned(),
            invite_token: token,
        }
    }

    fn token(uid: Uuid) -> Option<SecretString> {
        Some(SecretString::new(Base64InviteCodec.encode(uid)))
    }

    #[tokio::test]
    async fn test_plain_signup_creates_account_only() {
        let store = MockTeamStore::new();
        let output = SignupAction::new(store.clone(), hasher())
            .execute(input(" New@X.com ", None))
            .await
            .unwrap();

        assert_eq!(output.user.email, "new@x.com");
        assert!(output.membership.is_none());
        assert!(hasher()
            .verify("hunter22", &output.user.password_digest)
            .unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MockTeamStore::new();
        store.seed_user("a", "a@x.com").await;

        let result = SignupAction::new(store, hasher())
            .execute(input("A@x.com", None))
            .await;
        assert!(matches!(
            result.unwrap_err(),
            AccessError::AlreadyExists(Entity::User)
        ));
    }

    #[tokio::test]
    async fn test_signup_consumes_email_invite() {
        let fx = team_with_owner().await;
        let (pending, invite) = fx
            .store
            .create_email_invite(CreateEmailInvite {
                uid: Uuid::new_v4(),
                team_id: fx.team.id,
                app_id: None,
                email: "a@x.com".to_owned(),
                role: Role::Viewer,
            })
            .await
            .unwrap();

        let output = SignupAction::new(fx.store.clone(), hasher())
            .execute(input("a@x.com", token(invite.uid)))
            .await
            .unwrap();

        let membership = output.membership.unwrap();
        assert_eq!(membership.id, pending.id);
        assert_eq!(membership.user_id, output.user.id);
        assert_eq!(membership.role, Role::Viewer);
        assert!(fx.store.find_invite_by_uid(invite.uid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bad_invite_creates_no_account() {
        let fx = team_with_owner().await;
        let (_, invite) = fx
            .store
            .create_email_invite(CreateEmailInvite {
                uid: Uuid::new_v4(),
                team_id: fx.team.id,
                app_id: None,
                email: "a@x.com".to_owned(),
                role: Role::Viewer,
            })
            .await
            .unwrap();
        let action = SignupAction::new(fx.store.clone(), hasher());

        let mismatch = action.execute(input("b@x.com", token(invite.uid))).await;
        assert!(matches!(mismatch.unwrap_err(), AccessError::EmailMismatch));
        let unknown = action.execute(input("b@x.com", token(Uuid::new_v4()))).await;
        assert!(matches!(unknown.unwrap_err(), AccessError::InvalidToken));

        assert!(fx.store.find_user_by_email("b@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_join_removes_new_account() {
        let fx = team_with_owner().await;
        let invite = fx
            .store
            .create_invite(CreateInvite::link(fx.team.id, Role::Editor))
            .await
            .unwrap();
        fx.store.fail_next("create_membership");

        let result = SignupAction::new(fx.store.clone(), hasher())
            .execute(input("c@x.com", token(invite.uid)))
            .await;
        assert!(matches!(result.unwrap_err(), AccessError::Storage { .. }));
        assert!(fx.store.find_user_by_email("c@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_default_team_signup() {
        let fx = team_with_owner().await;
        let config = SignupConfig {
            default_team_id: Some(fx.team.id),
            default_role: Role::Editor,
        };

        let output = SignupAction::with_config(fx.store.clone(), hasher(), config)
            .execute(input("d@x.com", None))
            .await
            .unwrap();
        let membership = output.membership.unwrap();
        assert_eq!(membership.team_id, fx.team.id);
        assert_eq!(membership.role, Role::Editor);
    }

    #[tokio::test]
    async fn test_blocked_registration() {
        let fx = team_with_permission(TeamPermission {
            block_register: true,
            ..TeamPermission::default()
        })
        .await;
        let config = SignupConfig {
            default_team_id: Some(fx.team.id),
            default_role: Role::Viewer,
        };

        let result = SignupAction::with_config(fx.store.clone(), hasher(), config)
            .execute(input("d@x.com", None))
            .await;
        assert!(matches!(
            result.unwrap_err(),
            AccessError::PermissionClosedByTeam("registration")
        ));
        assert!(fx.store.find_user_by_email("d@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_weak_password_rejected() {
        let result = SignupAction::new(MockTeamStore::new(), hasher())
            .execute(SignupInput {
                password: SecretString::new("abc"),
                ..input("e@x.com", None)
            })
            .await;
        assert!(matches!(result.unwrap_err(), AccessError::Validation(_)));
    }
}
