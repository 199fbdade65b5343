//! Row types and their conversion into domain values.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::access::Role;
use crate::teams::{
    EmailDeliveryStatus, Invite, InviteCategory, InviteStatus, Membership, MembershipStatus, Team,
    TeamPermission, User,
};
use crate::AccessError;

pub(super) const TEAM_COLUMNS: &str =
    "id, uid, name, identifier, icon, permission, created_at, updated_at";
pub(super) const MEMBER_COLUMNS: &str =
    "id, team_id, user_id, user_role, status, created_at, updated_at";
pub(super) const INVITE_COLUMNS: &str = "id, uid, category, team_id, team_member_id, app_id, email, user_role, email_status, status, created_at, updated_at";
pub(super) const USER_COLUMNS: &str = "id, uid, nickname, email, password_digest, avatar, language, customization, created_at, updated_at";

fn corrupt(column: &'static str, value: impl std::fmt::Display) -> AccessError {
    log::error!(
        target: "teamgate",
        "msg=\"unreadable column value\", column=\"{column}\", value=\"{value}\""
    );
    AccessError::storage("decode_row", format!("bad {column} value `{value}`"))
}

fn parse_uid(column: &'static str, value: &str) -> Result<Uuid, AccessError> {
    Uuid::parse_str(value).map_err(|_| corrupt(column, value))
}

fn parse_role(value: i16) -> Result<Role, AccessError> {
    Role::from_id(value).ok_or_else(|| corrupt("user_role", value))
}

#[derive(FromRow)]
pub(super) struct TeamRecord {
    id: i64,
    uid: String,
    name: String,
    identifier: String,
    icon: String,
    permission: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TeamRecord> for Team {
    type Error = AccessError;

    fn try_from(row: TeamRecord) -> Result<Self, Self::Error> {
        let permission: TeamPermission = serde_json::from_str(&row.permission)
            .map_err(|_| corrupt("permission", &row.permission))?;
        Ok(Team {
            id: row.id,
            uid: parse_uid("teams.uid", &row.uid)?,
            name: row.name,
            identifier: row.identifier,
            icon: row.icon,
            permission,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
pub(super) struct MembershipRecord {
    id: i64,
    team_id: i64,
    user_id: i64,
    user_role: i16,
    status: i16,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MembershipRecord> for Membership {
    type Error = AccessError;

    fn try_from(row: MembershipRecord) -> Result<Self, Self::Error> {
        Ok(Membership {
            id: row.id,
            team_id: row.team_id,
            user_id: row.user_id,
            role: parse_role(row.user_role)?,
            status: MembershipStatus::from_id(row.status)
                .ok_or_else(|| corrupt("team_members.status", row.status))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
pub(super) struct InviteRecord {
    id: i64,
    uid: String,
    category: i16,
    team_id: i64,
    team_member_id: Option<i64>,
    app_id: Option<i64>,
    email: String,
    user_role: i16,
    email_status: i16,
    status: i16,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InviteRecord> for Invite {
    type Error = AccessError;

    fn try_from(row: InviteRecord) -> Result<Self, Self::Error> {
        Ok(Invite {
            id: row.id,
            uid: parse_uid("invites.uid", &row.uid)?,
            category: InviteCategory::from_id(row.category)
                .ok_or_else(|| corrupt("invites.category", row.category))?,
            team_id: row.team_id,
            team_member_id: row.team_member_id,
            app_id: row.app_id,
            email: row.email,
            role: parse_role(row.user_role)?,
            delivery: EmailDeliveryStatus::from_id(row.email_status)
                .ok_or_else(|| corrupt("invites.email_status", row.email_status))?,
            status: InviteStatus::from_id(row.status),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
pub(super) struct UserRecord {
    id: i64,
    uid: String,
    nickname: String,
    email: String,
    password_digest: String,
    avatar: String,
    language: String,
    customization: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRecord> for User {
    type Error = AccessError;

    fn try_from(row: UserRecord) -> Result<Self, Self::Error> {
        let customization = serde_json::from_str(&row.customization)
            .map_err(|_| corrupt("users.customization", &row.customization))?;
        Ok(User {
            id: row.id,
            uid: parse_uid("users.uid", &row.uid)?,
            nickname: row.nickname,
            email: row.email,
            password_digest: row.password_digest,
            avatar: row.avatar,
            language: row.language,
            customization,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Converts an optional row.
pub(super) fn convert<R, T>(row: Option<R>) -> Result<Option<T>, AccessError>
where
    T: TryFrom<R, Error = AccessError>,
{
    row.map(T::try_from).transpose()
}

/// Converts a list of rows.
pub(super) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, AccessError>
where
    T: TryFrom<R, Error = AccessError>,
{
    rows.into_iter().map(T::try_from).collect()
}
