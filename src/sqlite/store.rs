//! `SQLite` implementation of every team store trait.
//!
//! Uniqueness rules live in the schema as partial unique indexes; violations
//! come back as `AlreadyExists`, or `InvariantViolation` for a second Owner.
//! Multi-row writes run in one transaction each.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use uuid::Uuid;

use super::records::{
    INVITE_COLUMNS, InviteRecord, MEMBER_COLUMNS, MembershipRecord, TEAM_COLUMNS, TeamRecord,
    USER_COLUMNS, UserRecord, convert, convert_all,
};
use crate::access::Role;
use crate::teams::{
    CreateEmailInvite, CreateInvite, CreateMembership, CreateTeam, CreateUser,
    EmailDeliveryStatus, Invite, InviteCategory, InviteRepository, InviteStatus, Membership,
    MembershipRepository, MembershipStatus, PENDING_USER_ID, Team, TeamPermission,
    TeamRepository, TeamTransactions, User, UserRepository,
};
use crate::{AccessError, Entity};

/// The single-owner index reports only this column.
const OWNER_INDEX_COLUMNS: &str = "team_members.team_id";

fn db_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> AccessError {
    move |err| {
        log::error!(
            target: "teamgate",
            "msg=\"database error\", operation=\"{operation}\", error=\"{err}\""
        );
        AccessError::storage(operation, err)
    }
}

/// Like [`db_error`], but maps missing rows and constraint violations to domain errors.
fn write_error(operation: &'static str, entity: Entity) -> impl FnOnce(sqlx::Error) -> AccessError {
    move |err| {
        if matches!(err, sqlx::Error::RowNotFound) {
            return AccessError::NotFound(entity);
        }
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                if db.message().ends_with(OWNER_INDEX_COLUMNS) {
                    return AccessError::InvariantViolation("team already has an owner".into());
                }
                log::debug!(
                    target: "teamgate",
                    "msg=\"unique constraint\", operation=\"{operation}\", error=\"{}\"",
                    db.message()
                );
                return AccessError::AlreadyExists(entity);
            }
        }
        db_error(operation)(err)
    }
}

fn encode_json(value: &impl serde::Serialize) -> Result<String, AccessError> {
    serde_json::to_string(value).map_err(|e| AccessError::Internal(e.to_string()))
}

async fn insert_membership<'e, E>(executor: E, data: &CreateMembership) -> Result<Membership, AccessError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = Utc::now();
    let row: MembershipRecord = sqlx::query_as(&format!(
        "INSERT INTO team_members (team_id, user_id, user_role, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING {MEMBER_COLUMNS}"
    ))
    .bind(data.team_id)
    .bind(data.user_id)
    .bind(data.role.id())
    .bind(data.status.id())
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await
    .map_err(write_error("create_membership", Entity::Membership))?;

    row.try_into()
}

async fn insert_invite<'e, E>(executor: E, data: &CreateInvite) -> Result<Invite, AccessError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = Utc::now();
    let delivery = match data.category {
        InviteCategory::ByEmail => EmailDeliveryStatus::Pending,
        InviteCategory::ByLink => EmailDeliveryStatus::NotApplicable,
    };
    let row: InviteRecord = sqlx::query_as(&format!(
        "INSERT INTO invites (uid, category, team_id, team_member_id, app_id, email, user_role, \
         email_status, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {INVITE_COLUMNS}"
    ))
    .bind(data.uid.to_string())
    .bind(data.category.id())
    .bind(data.team_id)
    .bind(data.team_member_id)
    .bind(data.app_id)
    .bind(&data.email)
    .bind(data.role.id())
    .bind(delivery.id())
    .bind(InviteStatus::Active.id())
    .bind(now)
    .bind(now)
    .fetch_one(executor)
    .await
    .map_err(write_error("create_invite", Entity::Invite))?;

    row.try_into()
}

async fn fetch_invite<'e, E>(executor: E, invite_id: i64) -> Result<Invite, AccessError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<InviteRecord> =
        sqlx::query_as(&format!("SELECT {INVITE_COLUMNS} FROM invites WHERE id = ?"))
            .bind(invite_id)
            .fetch_optional(executor)
            .await
            .map_err(db_error("find_invite"))?;

    convert(row)?.ok_or(AccessError::NotFound(Entity::Invite))
}

async fn fetch_membership<'e, E>(
    executor: E,
    team_id: i64,
    membership_id: i64,
) -> Result<Option<Membership>, AccessError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<MembershipRecord> = sqlx::query_as(&format!(
        "SELECT {MEMBER_COLUMNS} FROM team_members WHERE id = ? AND team_id = ?"
    ))
    .bind(membership_id)
    .bind(team_id)
    .fetch_optional(executor)
    .await
    .map_err(db_error("find_membership_by_id"))?;

    convert(row)
}

async fn set_member_role<'e, E>(
    executor: E,
    team_id: i64,
    membership_id: i64,
    role: Role,
) -> Result<Membership, AccessError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: MembershipRecord = sqlx::query_as(&format!(
        "UPDATE team_members SET user_role = ?, updated_at = ? \
         WHERE id = ? AND team_id = ? RETURNING {MEMBER_COLUMNS}"
    ))
    .bind(role.id())
    .bind(Utc::now())
    .bind(membership_id)
    .bind(team_id)
    .fetch_one(executor)
    .await
    .map_err(write_error("update_membership_role", Entity::Membership))?;

    row.try_into()
}

/// Team store over a `SQLite` pool.
#[derive(Clone)]
pub struct SqliteTeamStore {
    pool: SqlitePool,
}

impl SqliteTeamStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TeamRepository for SqliteTeamStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn create_team(&self, data: CreateTeam) -> Result<Team, AccessError> {
        let now = Utc::now();
        let row: TeamRecord = sqlx::query_as(&format!(
            "INSERT INTO teams (uid, name, identifier, icon, permission, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {TEAM_COLUMNS}"
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(&data.name)
        .bind(&data.identifier)
        .bind(&data.icon)
        .bind(encode_json(&data.permission)?)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("create_team", Entity::Team))?;

        row.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_team(&self, team_id: i64) -> Result<Option<Team>, AccessError> {
        let row: Option<TeamRecord> =
            sqlx::query_as(&format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = ?"))
                .bind(team_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("find_team"))?;

        convert(row)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn update_team_permission(
        &self,
        team_id: i64,
        permission: TeamPermission,
    ) -> Result<Team, AccessError> {
        let row: TeamRecord = sqlx::query_as(&format!(
            "UPDATE teams SET permission = ?, updated_at = ? WHERE id = ? RETURNING {TEAM_COLUMNS}"
        ))
        .bind(encode_json(&permission)?)
        .bind(Utc::now())
        .bind(team_id)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("update_team_permission", Entity::Team))?;

        row.try_into()
    }
}

#[async_trait]
impl MembershipRepository for SqliteTeamStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn create_membership(&self, data: CreateMembership) -> Result<Membership, AccessError> {
        insert_membership(&self.pool, &data).await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_membership(
        &self,
        team_id: i64,
        user_id: i64,
    ) -> Result<Option<Membership>, AccessError> {
        if user_id == PENDING_USER_ID {
            return Ok(None);
        }
        let row: Option<MembershipRecord> = sqlx::query_as(&format!(
            "SELECT {MEMBER_COLUMNS} FROM team_members WHERE team_id = ? AND user_id = ?"
        ))
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_membership"))?;

        convert(row)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_membership_by_id(
        &self,
        team_id: i64,
        membership_id: i64,
    ) -> Result<Option<Membership>, AccessError> {
        fetch_membership(&self.pool, team_id, membership_id).await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn list_team_memberships(&self, team_id: i64) -> Result<Vec<Membership>, AccessError> {
        let rows: Vec<MembershipRecord> = sqlx::query_as(&format!(
            "SELECT {MEMBER_COLUMNS} FROM team_members WHERE team_id = ? \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list_team_memberships"))?;

        convert_all(rows)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn list_user_memberships(&self, user_id: i64) -> Result<Vec<Membership>, AccessError> {
        if user_id == PENDING_USER_ID {
            return Ok(Vec::new());
        }
        let rows: Vec<MembershipRecord> = sqlx::query_as(&format!(
            "SELECT {MEMBER_COLUMNS} FROM team_members WHERE user_id = ? ORDER BY created_at ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list_user_memberships"))?;

        convert_all(rows)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn update_membership(&self, membership: &Membership) -> Result<Membership, AccessError> {
        let row: MembershipRecord = sqlx::query_as(&format!(
            "UPDATE team_members SET user_id = ?, user_role = ?, status = ?, updated_at = ? \
             WHERE id = ? AND team_id = ? RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(membership.user_id)
        .bind(membership.role.id())
        .bind(membership.status.id())
        .bind(Utc::now())
        .bind(membership.id)
        .bind(membership.team_id)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("update_membership", Entity::Membership))?;

        row.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn delete_membership(&self, team_id: i64, membership_id: i64) -> Result<(), AccessError> {
        let result = sqlx::query("DELETE FROM team_members WHERE id = ? AND team_id = ?")
            .bind(membership_id)
            .bind(team_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete_membership"))?;

        if result.rows_affected() == 0 {
            return Err(AccessError::NotFound(Entity::Membership));
        }
        Ok(())
    }
}

#[async_trait]
impl InviteRepository for SqliteTeamStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn create_invite(&self, data: CreateInvite) -> Result<Invite, AccessError> {
        insert_invite(&self.pool, &data).await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_invite_by_uid(&self, uid: Uuid) -> Result<Option<Invite>, AccessError> {
        let row: Option<InviteRecord> =
            sqlx::query_as(&format!("SELECT {INVITE_COLUMNS} FROM invites WHERE uid = ?"))
                .bind(uid.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("find_invite_by_uid"))?;

        convert(row)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_active_email_invite(
        &self,
        team_id: i64,
        email: &str,
    ) -> Result<Option<Invite>, AccessError> {
        let row: Option<InviteRecord> = sqlx::query_as(&format!(
            "SELECT {INVITE_COLUMNS} FROM invites \
             WHERE team_id = ? AND category = ? AND status = ? AND email = ?"
        ))
        .bind(team_id)
        .bind(InviteCategory::ByEmail.id())
        .bind(InviteStatus::Active.id())
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_active_email_invite"))?;

        convert(row)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_active_link_invite(
        &self,
        team_id: i64,
        role: Role,
    ) -> Result<Option<Invite>, AccessError> {
        let row: Option<InviteRecord> = sqlx::query_as(&format!(
            "SELECT {INVITE_COLUMNS} FROM invites \
             WHERE team_id = ? AND category = ? AND status = ? AND user_role = ?"
        ))
        .bind(team_id)
        .bind(InviteCategory::ByLink.id())
        .bind(InviteStatus::Active.id())
        .bind(role.id())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_active_link_invite"))?;

        convert(row)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_invite_by_membership(
        &self,
        team_id: i64,
        membership_id: i64,
    ) -> Result<Option<Invite>, AccessError> {
        let row: Option<InviteRecord> = sqlx::query_as(&format!(
            "SELECT {INVITE_COLUMNS} FROM invites WHERE team_id = ? AND team_member_id = ?"
        ))
        .bind(team_id)
        .bind(membership_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_invite_by_membership"))?;

        convert(row)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn list_email_invites(&self, team_id: i64) -> Result<Vec<Invite>, AccessError> {
        let rows: Vec<InviteRecord> = sqlx::query_as(&format!(
            "SELECT {INVITE_COLUMNS} FROM invites WHERE team_id = ? AND category = ? \
             ORDER BY created_at DESC"
        ))
        .bind(team_id)
        .bind(InviteCategory::ByEmail.id())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list_email_invites"))?;

        convert_all(rows)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn update_invite(&self, invite: &Invite) -> Result<Invite, AccessError> {
        let row: InviteRecord = sqlx::query_as(&format!(
            "UPDATE invites SET team_member_id = ?, app_id = ?, email = ?, user_role = ?, \
             email_status = ?, status = ?, updated_at = ? WHERE id = ? RETURNING {INVITE_COLUMNS}"
        ))
        .bind(invite.team_member_id)
        .bind(invite.app_id)
        .bind(&invite.email)
        .bind(invite.role.id())
        .bind(invite.delivery.id())
        .bind(invite.status.id())
        .bind(Utc::now())
        .bind(invite.id)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("update_invite", Entity::Invite))?;

        row.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn delete_invite(&self, invite_id: i64) -> Result<(), AccessError> {
        let result = sqlx::query("DELETE FROM invites WHERE id = ?")
            .bind(invite_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete_invite"))?;

        if result.rows_affected() == 0 {
            return Err(AccessError::NotFound(Entity::Invite));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for SqliteTeamStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, data), err))]
    async fn create_user(&self, data: CreateUser) -> Result<User, AccessError> {
        let now = Utc::now();
        let row: UserRecord = sqlx::query_as(&format!(
            "INSERT INTO users (uid, nickname, email, password_digest, language, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(&data.nickname)
        .bind(&data.email)
        .bind(&data.password_digest)
        .bind(&data.language)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error("create_user", Entity::User))?;

        row.try_into()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User>, AccessError> {
        let row: Option<UserRecord> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("find_user_by_id"))?;

        convert(row)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, email), err))]
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AccessError> {
        let row: Option<UserRecord> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("find_user_by_email"))?;

        convert(row)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn delete_user(&self, user_id: i64) -> Result<(), AccessError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete_user"))?;

        if result.rows_affected() == 0 {
            return Err(AccessError::NotFound(Entity::User));
        }
        Ok(())
    }
}

#[async_trait]
impl TeamTransactions for SqliteTeamStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn create_email_invite(
        &self,
        data: CreateEmailInvite,
    ) -> Result<(Membership, Invite), AccessError> {
        let mut tx = self.pool.begin().await.map_err(db_error("create_email_invite"))?;

        let membership = insert_membership(
            &mut *tx,
            &CreateMembership {
                team_id: data.team_id,
                user_id: PENDING_USER_ID,
                role: data.role,
                status: MembershipStatus::Pending,
            },
        )
        .await?;
        let invite = insert_invite(
            &mut *tx,
            &CreateInvite {
                uid: data.uid,
                category: InviteCategory::ByEmail,
                team_id: data.team_id,
                team_member_id: Some(membership.id),
                app_id: data.app_id,
                email: data.email,
                role: data.role,
            },
        )
        .await?;

        tx.commit().await.map_err(db_error("create_email_invite"))?;
        Ok((membership, invite))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn change_invite_role(
        &self,
        invite_id: i64,
        role: Role,
    ) -> Result<(Membership, Invite), AccessError> {
        let mut tx = self.pool.begin().await.map_err(db_error("change_invite_role"))?;

        let invite = fetch_invite(&mut *tx, invite_id).await?;
        let member_id = invite
            .team_member_id
            .ok_or(AccessError::NotFound(Entity::Membership))?;
        let membership = set_member_role(&mut *tx, invite.team_id, member_id, role).await?;

        let row: InviteRecord = sqlx::query_as(&format!(
            "UPDATE invites SET user_role = ?, updated_at = ? WHERE id = ? RETURNING {INVITE_COLUMNS}"
        ))
        .bind(role.id())
        .bind(Utc::now())
        .bind(invite.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(write_error("change_invite_role", Entity::Invite))?;
        let invite = Invite::try_from(row)?;

        tx.commit().await.map_err(db_error("change_invite_role"))?;
        Ok((membership, invite))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn accept_email_invite(
        &self,
        invite_id: i64,
        user_id: i64,
    ) -> Result<Membership, AccessError> {
        let mut tx = self.pool.begin().await.map_err(db_error("accept_email_invite"))?;

        let invite = fetch_invite(&mut *tx, invite_id).await?;
        let member_id = invite
            .team_member_id
            .ok_or(AccessError::NotFound(Entity::Membership))?;

        sqlx::query("DELETE FROM invites WHERE id = ?")
            .bind(invite.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("accept_email_invite"))?;

        let row: MembershipRecord = sqlx::query_as(&format!(
            "UPDATE team_members SET user_id = ?, status = ?, updated_at = ? \
             WHERE id = ? AND team_id = ? RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(MembershipStatus::Ok.id())
        .bind(Utc::now())
        .bind(member_id)
        .bind(invite.team_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(write_error("accept_email_invite", Entity::Membership))?;
        let membership = Membership::try_from(row)?;

        tx.commit().await.map_err(db_error("accept_email_invite"))?;
        Ok(membership)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn replace_link_invite(&self, data: CreateInvite) -> Result<Invite, AccessError> {
        let mut tx = self.pool.begin().await.map_err(db_error("replace_link_invite"))?;

        sqlx::query(
            "DELETE FROM invites WHERE team_id = ? AND category = ? AND status = ? AND user_role = ?",
        )
        .bind(data.team_id)
        .bind(InviteCategory::ByLink.id())
        .bind(InviteStatus::Active.id())
        .bind(data.role.id())
        .execute(&mut *tx)
        .await
        .map_err(db_error("replace_link_invite"))?;
        let invite = insert_invite(&mut *tx, &data).await?;

        tx.commit().await.map_err(db_error("replace_link_invite"))?;
        Ok(invite)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn change_member_role(
        &self,
        team_id: i64,
        membership_id: i64,
        role: Role,
    ) -> Result<Membership, AccessError> {
        let mut tx = self.pool.begin().await.map_err(db_error("change_member_role"))?;

        let membership = set_member_role(&mut *tx, team_id, membership_id, role).await?;
        sqlx::query(
            "UPDATE invites SET user_role = ?, updated_at = ? WHERE team_id = ? AND team_member_id = ?",
        )
        .bind(role.id())
        .bind(membership.updated_at)
        .bind(team_id)
        .bind(membership_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("change_member_role"))?;

        tx.commit().await.map_err(db_error("change_member_role"))?;
        Ok(membership)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn transfer_ownership(
        &self,
        team_id: i64,
        from_membership_id: i64,
        to_membership_id: i64,
    ) -> Result<(Membership, Membership), AccessError> {
        let mut tx = self.pool.begin().await.map_err(db_error("transfer_ownership"))?;

        let from = fetch_membership(&mut *tx, team_id, from_membership_id)
            .await?
            .ok_or(AccessError::NotFound(Entity::Membership))?;
        if !from.is_owner() {
            return Err(AccessError::InvariantViolation(
                "ownership can only be transferred by the owner".into(),
            ));
        }

        // demote first so the single-owner index holds at every statement
        let former = set_member_role(&mut *tx, team_id, from.id, Role::Admin).await?;
        let owner = set_member_role(&mut *tx, team_id, to_membership_id, Role::Owner).await?;

        tx.commit().await.map_err(db_error("transfer_ownership"))?;
        Ok((former, owner))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn remove_member(
        &self,
        team_id: i64,
        membership_id: i64,
        delete_user_id: Option<i64>,
    ) -> Result<(), AccessError> {
        let mut tx = self.pool.begin().await.map_err(db_error("remove_member"))?;

        let result = sqlx::query("DELETE FROM team_members WHERE id = ? AND team_id = ?")
            .bind(membership_id)
            .bind(team_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("remove_member"))?;
        if result.rows_affected() == 0 {
            return Err(AccessError::NotFound(Entity::Membership));
        }

        sqlx::query("DELETE FROM invites WHERE team_id = ? AND team_member_id = ?")
            .bind(team_id)
            .bind(membership_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("remove_member"))?;

        if let Some(user_id) = delete_user_id {
            sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(db_error("remove_member"))?;
        }

        tx.commit().await.map_err(db_error("remove_member"))?;
        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn delete_account(&self, user_id: i64) -> Result<(), AccessError> {
        let mut tx = self.pool.begin().await.map_err(db_error("delete_account"))?;

        sqlx::query("DELETE FROM team_members WHERE user_id = ? AND user_id <> 0")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("delete_account"))?;
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("delete_account"))?;
        if result.rows_affected() == 0 {
            return Err(AccessError::NotFound(Entity::User));
        }

        tx.commit().await.map_err(db_error("delete_account"))?;
        Ok(())
    }
}
