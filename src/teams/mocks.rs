#![allow(clippy::significant_drop_tightening)]

//! In-memory collaborators for tests.
//!
//! [`MockTeamStore`] enforces the same uniqueness rules as the SQLite schema
//! and applies every transactional write to a draft copy of its state, so a
//! failing step leaves nothing behind.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::identity::{Identity, IdentityProvider};
use super::notifier::{DeliveryError, InviteNotification, InviteNotifier};
use super::repository::{
    CreateEmailInvite, CreateInvite, CreateMembership, CreateTeam, CreateUser, InviteRepository,
    MembershipRepository, TeamRepository, TeamTransactions, UserRepository,
};
use super::types::{
    EmailDeliveryStatus, Invite, InviteCategory, InviteStatus, Membership, MembershipStatus,
    PENDING_USER_ID, Team, TeamPermission, User,
};
use crate::access::Role;
use crate::crypto::generate_token;
use crate::{AccessError, Entity, SecretString};

fn poisoned<T>(_: T) -> AccessError {
    AccessError::Internal("lock poisoned".into())
}

#[derive(Debug, Clone, Default)]
struct MockState {
    teams: HashMap<i64, Team>,
    memberships: HashMap<i64, Membership>,
    invites: HashMap<i64, Invite>,
    users: HashMap<i64, User>,
    next_id: i64,
}

impl MockState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_membership(&self, candidate: &Membership) -> Result<(), AccessError> {
        let others = self
            .memberships
            .values()
            .filter(|m| m.id != candidate.id && m.team_id == candidate.team_id);

        for other in others {
            if candidate.user_id != PENDING_USER_ID && other.user_id == candidate.user_id {
                return Err(AccessError::AlreadyExists(Entity::Membership));
            }
            if candidate.is_owner() && other.is_owner() {
                return Err(AccessError::InvariantViolation(
                    "team already has an owner".into(),
                ));
            }
        }
        Ok(())
    }

    fn check_invite(&self, candidate: &Invite) -> Result<(), AccessError> {
        let conflict = self.invites.values().any(|other| {
            other.id != candidate.id
                && other.team_id == candidate.team_id
                && other.category == candidate.category
                && other.is_active()
                && candidate.is_active()
                && match candidate.category {
                    InviteCategory::ByEmail => other.email == candidate.email,
                    InviteCategory::ByLink => other.role == candidate.role,
                }
        });

        if conflict {
            return Err(AccessError::AlreadyExists(Entity::Invite));
        }
        Ok(())
    }

    fn insert_membership(&mut self, data: CreateMembership) -> Result<Membership, AccessError> {
        let now = Utc::now();
        let membership = Membership {
            id: self.next_id(),
            team_id: data.team_id,
            user_id: data.user_id,
            role: data.role,
            status: data.status,
            created_at: now,
            updated_at: now,
        };
        self.check_membership(&membership)?;
        self.memberships.insert(membership.id, membership.clone());
        Ok(membership)
    }

    fn save_membership(&mut self, membership: &Membership) -> Result<Membership, AccessError> {
        if !self.memberships.contains_key(&membership.id) {
            return Err(AccessError::NotFound(Entity::Membership));
        }
        let mut updated = membership.clone();
        updated.updated_at = Utc::now();
        self.check_membership(&updated)?;
        self.memberships.insert(updated.id, updated.clone());
        Ok(updated)
    }

    fn insert_invite(&mut self, data: CreateInvite) -> Result<Invite, AccessError> {
        let now = Utc::now();
        let delivery = match data.category {
            InviteCategory::ByEmail => EmailDeliveryStatus::Pending,
            InviteCategory::ByLink => EmailDeliveryStatus::NotApplicable,
        };
        let invite = Invite {
            id: self.next_id(),
            uid: data.uid,
            category: data.category,
            team_id: data.team_id,
            team_member_id: data.team_member_id,
            app_id: data.app_id,
            email: data.email,
            role: data.role,
            delivery,
            status: InviteStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.check_invite(&invite)?;
        self.invites.insert(invite.id, invite.clone());
        Ok(invite)
    }

    fn save_invite(&mut self, invite: &Invite) -> Result<Invite, AccessError> {
        if !self.invites.contains_key(&invite.id) {
            return Err(AccessError::NotFound(Entity::Invite));
        }
        let mut updated = invite.clone();
        updated.updated_at = Utc::now();
        self.check_invite(&updated)?;
        self.invites.insert(updated.id, updated.clone());
        Ok(updated)
    }

    fn membership_in(&self, team_id: i64, membership_id: i64) -> Result<Membership, AccessError> {
        self.memberships
            .get(&membership_id)
            .filter(|m| m.team_id == team_id)
            .cloned()
            .ok_or(AccessError::NotFound(Entity::Membership))
    }

    fn paired_invites(&self, team_id: i64, membership_id: i64) -> Vec<i64> {
        self.invites
            .values()
            .filter(|i| i.team_id == team_id && i.team_member_id == Some(membership_id))
            .map(|i| i.id)
            .collect()
    }
}

/// In-memory implementation of every store trait. Clones share state.
#[derive(Clone, Default)]
pub struct MockTeamStore {
    state: Arc<RwLock<MockState>>,
    failures: Arc<Mutex<HashSet<&'static str>>>,
}

impl MockTeamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call of `operation` fail with a storage error.
    pub fn fail_next(&self, operation: &'static str) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(operation);
        }
    }

    /// Creates a team with default toggles.
    pub async fn seed_team(&self, name: &str) -> Team {
        self.seed_team_with(name, TeamPermission::default()).await
    }

    pub async fn seed_team_with(&self, name: &str, permission: TeamPermission) -> Team {
        let data = CreateTeam {
            name: name.to_owned(),
            identifier: name.to_lowercase().replace(' ', "-"),
            icon: String::new(),
            permission,
        };
        match self.create_team(data).await {
            Ok(team) => team,
            Err(err) => panic!("seed_team failed: {err}"),
        }
    }

    /// Creates a user with a placeholder digest.
    pub async fn seed_user(&self, nickname: &str, email: &str) -> User {
        let data = CreateUser {
            nickname: nickname.to_owned(),
            email: email.to_owned(),
            password_digest: "$argon2id$placeholder".to_owned(),
            language: "en-US".to_owned(),
        };
        match self.create_user(data).await {
            Ok(user) => user,
            Err(err) => panic!("seed_user failed: {err}"),
        }
    }

    /// Creates a user and an active membership for them.
    pub async fn seed_member(&self, team_id: i64, email: &str, role: Role) -> (User, Membership) {
        let nickname = email.split('@').next().unwrap_or(email).to_owned();
        let user = self.seed_user(&nickname, email).await;
        let membership = self
            .create_membership(CreateMembership {
                team_id,
                user_id: user.id,
                role,
                status: MembershipStatus::Ok,
            })
            .await;
        match membership {
            Ok(membership) => (user, membership),
            Err(err) => panic!("seed_member failed: {err}"),
        }
    }

    pub fn invite_count(&self, team_id: i64) -> usize {
        self.read(|state| state.invites.values().filter(|i| i.team_id == team_id).count())
            .unwrap_or_default()
    }

    pub fn membership_count(&self, team_id: i64) -> usize {
        self.read(|state| {
            state
                .memberships
                .values()
                .filter(|m| m.team_id == team_id)
                .count()
        })
        .unwrap_or_default()
    }

    fn take_failure(&self, operation: &'static str) -> Result<(), AccessError> {
        let mut failures = self.failures.lock().map_err(poisoned)?;
        if failures.remove(operation) {
            return Err(AccessError::storage(operation, "injected failure"));
        }
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&MockState) -> T) -> Result<T, AccessError> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(f(&state))
    }

    /// Runs `f` against a draft and commits it only on success.
    fn transaction<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut MockState) -> Result<T, AccessError>,
    ) -> Result<T, AccessError> {
        self.take_failure(operation)?;
        let mut state = self.state.write().map_err(poisoned)?;
        let mut draft = state.clone();
        let out = f(&mut draft)?;
        *state = draft;
        Ok(out)
    }
}

#[async_trait]
impl TeamRepository for MockTeamStore {
    async fn create_team(&self, data: CreateTeam) -> Result<Team, AccessError> {
        self.transaction("create_team", |state| {
            let now = Utc::now();
            let team = Team {
                id: state.next_id(),
                uid: Uuid::new_v4(),
                name: data.name,
                identifier: data.identifier,
                icon: data.icon,
                permission: data.permission,
                created_at: now,
                updated_at: now,
            };
            state.teams.insert(team.id, team.clone());
            Ok(team)
        })
    }

    async fn find_team(&self, team_id: i64) -> Result<Option<Team>, AccessError> {
        self.read(|state| state.teams.get(&team_id).cloned())
    }

    async fn update_team_permission(
        &self,
        team_id: i64,
        permission: TeamPermission,
    ) -> Result<Team, AccessError> {
        self.transaction("update_team_permission", |state| {
            let team = state
                .teams
                .get_mut(&team_id)
                .ok_or(AccessError::NotFound(Entity::Team))?;
            team.permission = permission;
            team.updated_at = Utc::now();
            Ok(team.clone())
        })
    }
}

#[async_trait]
impl MembershipRepository for MockTeamStore {
    async fn create_membership(&self, data: CreateMembership) -> Result<Membership, AccessError> {
        self.transaction("create_membership", |state| state.insert_membership(data))
    }

    async fn find_membership(
        &self,
        team_id: i64,
        user_id: i64,
    ) -> Result<Option<Membership>, AccessError> {
        if user_id == PENDING_USER_ID {
            return Ok(None);
        }
        self.read(|state| {
            state
                .memberships
                .values()
                .find(|m| m.team_id == team_id && m.user_id == user_id)
                .cloned()
        })
    }

    async fn find_membership_by_id(
        &self,
        team_id: i64,
        membership_id: i64,
    ) -> Result<Option<Membership>, AccessError> {
        self.read(|state| state.membership_in(team_id, membership_id).ok())
    }

    async fn list_team_memberships(&self, team_id: i64) -> Result<Vec<Membership>, AccessError> {
        self.read(|state| {
            let mut memberships: Vec<Membership> = state
                .memberships
                .values()
                .filter(|m| m.team_id == team_id)
                .cloned()
                .collect();
            memberships.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
            memberships
        })
    }

    async fn list_user_memberships(&self, user_id: i64) -> Result<Vec<Membership>, AccessError> {
        self.read(|state| {
            state
                .memberships
                .values()
                .filter(|m| m.user_id == user_id && user_id != PENDING_USER_ID)
                .cloned()
                .collect()
        })
    }

    async fn update_membership(&self, membership: &Membership) -> Result<Membership, AccessError> {
        self.transaction("update_membership", |state| state.save_membership(membership))
    }

    async fn delete_membership(&self, team_id: i64, membership_id: i64) -> Result<(), AccessError> {
        self.transaction("delete_membership", |state| {
            state.membership_in(team_id, membership_id)?;
            state.memberships.remove(&membership_id);
            Ok(())
        })
    }
}

#[async_trait]
impl InviteRepository for MockTeamStore {
    async fn create_invite(&self, data: CreateInvite) -> Result<Invite, AccessError> {
        self.transaction("create_invite", |state| state.insert_invite(data))
    }

    async fn find_invite_by_uid(&self, uid: Uuid) -> Result<Option<Invite>, AccessError> {
        self.read(|state| state.invites.values().find(|i| i.uid == uid).cloned())
    }

    async fn find_active_email_invite(
        &self,
        team_id: i64,
        email: &str,
    ) -> Result<Option<Invite>, AccessError> {
        self.read(|state| {
            state
                .invites
                .values()
                .find(|i| i.team_id == team_id && i.is_email() && i.is_active() && i.email == email)
                .cloned()
        })
    }

    async fn find_active_link_invite(
        &self,
        team_id: i64,
        role: Role,
    ) -> Result<Option<Invite>, AccessError> {
        self.read(|state| {
            state
                .invites
                .values()
                .find(|i| i.team_id == team_id && i.is_link() && i.is_active() && i.role == role)
                .cloned()
        })
    }

    async fn find_invite_by_membership(
        &self,
        team_id: i64,
        membership_id: i64,
    ) -> Result<Option<Invite>, AccessError> {
        self.read(|state| {
            state
                .invites
                .values()
                .find(|i| i.team_id == team_id && i.team_member_id == Some(membership_id))
                .cloned()
        })
    }

    async fn list_email_invites(&self, team_id: i64) -> Result<Vec<Invite>, AccessError> {
        self.read(|state| {
            state
                .invites
                .values()
                .filter(|i| i.team_id == team_id && i.is_email())
                .cloned()
                .collect()
        })
    }

    async fn update_invite(&self, invite: &Invite) -> Result<Invite, AccessError> {
        self.transaction("update_invite", |state| state.save_invite(invite))
    }

    async fn delete_invite(&self, invite_id: i64) -> Result<(), AccessError> {
        self.transaction("delete_invite", |state| {
            state
                .invites
                .remove(&invite_id)
                .map(|_| ())
                .ok_or(AccessError::NotFound(Entity::Invite))
        })
    }
}

#[async_trait]
impl UserRepository for MockTeamStore {
    async fn create_user(&self, data: CreateUser) -> Result<User, AccessError> {
        self.transaction("create_user", |state| {
            if state.users.values().any(|u| u.email == data.email) {
                return Err(AccessError::AlreadyExists(Entity::User));
            }
            let now = Utc::now();
            let user = User {
                id: state.next_id(),
                uid: Uuid::new_v4(),
                nickname: data.nickname,
                email: data.email,
                password_digest: data.password_digest,
                avatar: String::new(),
                language: data.language,
                customization: serde_json::Value::Object(serde_json::Map::new()),
                created_at: now,
                updated_at: now,
            };
            state.users.insert(user.id, user.clone());
            Ok(user)
        })
    }

    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, AccessError> {
        self.read(|state| state.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AccessError> {
        self.read(|state| state.users.values().find(|u| u.email == email).cloned())
    }

    async fn delete_user(&self, user_id: i64) -> Result<(), AccessError> {
        self.transaction("delete_user", |state| {
            state
                .users
                .remove(&user_id)
                .map(|_| ())
                .ok_or(AccessError::NotFound(Entity::User))
        })
    }
}

#[async_trait]
impl TeamTransactions for MockTeamStore {
    async fn create_email_invite(
        &self,
        data: CreateEmailInvite,
    ) -> Result<(Membership, Invite), AccessError> {
        self.transaction("create_email_invite", |state| {
            let membership = state.insert_membership(CreateMembership {
                team_id: data.team_id,
                user_id: PENDING_USER_ID,
                role: data.role,
                status: MembershipStatus::Pending,
            })?;
            let invite = state.insert_invite(CreateInvite {
                uid: data.uid,
                category: InviteCategory::ByEmail,
                team_id: data.team_id,
                team_member_id: Some(membership.id),
                app_id: data.app_id,
                email: data.email,
                role: data.role,
            })?;
            Ok((membership, invite))
        })
    }

    async fn change_invite_role(
        &self,
        invite_id: i64,
        role: Role,
    ) -> Result<(Membership, Invite), AccessError> {
        self.transaction("change_invite_role", |state| {
            let mut invite = state
                .invites
                .get(&invite_id)
                .cloned()
                .ok_or(AccessError::NotFound(Entity::Invite))?;
            let member_id = invite
                .team_member_id
                .ok_or(AccessError::NotFound(Entity::Membership))?;
            let mut membership = state.membership_in(invite.team_id, member_id)?;

            invite.role = role;
            membership.role = role;
            let membership = state.save_membership(&membership)?;
            let invite = state.save_invite(&invite)?;
            Ok((membership, invite))
        })
    }

    async fn accept_email_invite(
        &self,
        invite_id: i64,
        user_id: i64,
    ) -> Result<Membership, AccessError> {
        self.transaction("accept_email_invite", |state| {
            let invite = state
                .invites
                .remove(&invite_id)
                .ok_or(AccessError::NotFound(Entity::Invite))?;
            let member_id = invite
                .team_member_id
                .ok_or(AccessError::NotFound(Entity::Membership))?;
            let mut membership = state.membership_in(invite.team_id, member_id)?;

            membership.user_id = user_id;
            membership.status = MembershipStatus::Ok;
            state.save_membership(&membership)
        })
    }

    async fn replace_link_invite(&self, data: CreateInvite) -> Result<Invite, AccessError> {
        self.transaction("replace_link_invite", |state| {
            state.invites.retain(|_, i| {
                !(i.team_id == data.team_id && i.is_link() && i.is_active() && i.role == data.role)
            });
            state.insert_invite(data)
        })
    }

    async fn change_member_role(
        &self,
        team_id: i64,
        membership_id: i64,
        role: Role,
    ) -> Result<Membership, AccessError> {
        self.transaction("change_member_role", |state| {
            let mut membership = state.membership_in(team_id, membership_id)?;
            membership.role = role;
            let membership = state.save_membership(&membership)?;

            for invite_id in state.paired_invites(team_id, membership_id) {
                if let Some(invite) = state.invites.get_mut(&invite_id) {
                    invite.role = role;
                    invite.updated_at = membership.updated_at;
                }
            }
            Ok(membership)
        })
    }

    async fn transfer_ownership(
        &self,
        team_id: i64,
        from_membership_id: i64,
        to_membership_id: i64,
    ) -> Result<(Membership, Membership), AccessError> {
        self.transaction("transfer_ownership", |state| {
            let mut from = state.membership_in(team_id, from_membership_id)?;
            let mut to = state.membership_in(team_id, to_membership_id)?;
            if !from.is_owner() {
                return Err(AccessError::InvariantViolation(
                    "ownership can only be transferred by the owner".into(),
                ));
            }

            // demote first so the one-owner rule holds at every step
            from.role = Role::Admin;
            let from = state.save_membership(&from)?;
            to.role = Role::Owner;
            let to = state.save_membership(&to)?;
            Ok((from, to))
        })
    }

    async fn remove_member(
        &self,
        team_id: i64,
        membership_id: i64,
        delete_user_id: Option<i64>,
    ) -> Result<(), AccessError> {
        self.transaction("remove_member", |state| {
            state.membership_in(team_id, membership_id)?;
            state.memberships.remove(&membership_id);
            for invite_id in state.paired_invites(team_id, membership_id) {
                state.invites.remove(&invite_id);
            }
            if let Some(user_id) = delete_user_id {
                state.users.remove(&user_id);
            }
            Ok(())
        })
    }

    async fn delete_account(&self, user_id: i64) -> Result<(), AccessError> {
        self.transaction("delete_account", |state| {
            state
                .users
                .remove(&user_id)
                .ok_or(AccessError::NotFound(Entity::User))?;
            state.memberships.retain(|_, m| m.user_id != user_id);
            Ok(())
        })
    }
}

/// Records invite notifications; can be switched to fail every send.
#[derive(Clone, Default)]
pub struct MockInviteNotifier {
    sent: Arc<Mutex<Vec<InviteNotification>>>,
    failing: Arc<AtomicBool>,
}

impl MockInviteNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<InviteNotification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl InviteNotifier for MockInviteNotifier {
    async fn send_invite(&self, notification: &InviteNotification) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError("mailbox unavailable".into()));
        }
        self.sent
            .lock()
            .map_err(|_| DeliveryError("lock poisoned".into()))?
            .push(notification.clone());
        Ok(())
    }
}

/// Maps bearer tokens to identities.
#[derive(Clone, Default)]
pub struct MockIdentityProvider {
    tokens: Arc<RwLock<HashMap<String, Identity>>>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh bearer token for `user`.
    pub fn issue(&self, user: &User) -> SecretString {
        let token = generate_token(24);
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert(
                token.clone(),
                Identity {
                    user_id: user.id,
                    user_uid: user.uid,
                },
            );
        }
        SecretString::new(token)
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn resolve(&self, token: &SecretString) -> Result<Identity, AccessError> {
        let tokens = self.tokens.read().map_err(poisoned)?;
        tokens
            .get(token.expose_secret())
            .copied()
            .ok_or(AccessError::Unauthenticated)
    }
}
