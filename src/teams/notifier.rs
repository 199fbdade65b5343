use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::access::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    JoinTeam,
    /// The invite shares one app rather than the whole team.
    ShareApp,
}

/// Everything an outbound invite message needs.
#[derive(Debug, Clone, Serialize)]
pub struct InviteNotification {
    pub kind: NotificationKind,
    pub recipient: String,
    pub team_name: String,
    pub team_icon: String,
    pub inviter_nickname: String,
    pub language: String,
    pub role: Role,
    pub join_link: String,
}

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct DeliveryError(pub String);

/// Outbound invite delivery, best-effort.
#[async_trait]
pub trait InviteNotifier: Send + Sync {
    async fn send_invite(&self, notification: &InviteNotification) -> Result<(), DeliveryError>;
}

/// Logs invite notifications instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl InviteNotifier for LogNotifier {
    async fn send_invite(&self, notification: &InviteNotification) -> Result<(), DeliveryError> {
        log::info!(
            target: "teamgate",
            "msg=\"invite notification\", kind={:?}, recipient=\"{}\", team=\"{}\", link=\"{}\"",
            notification.kind,
            notification.recipient,
            notification.team_name,
            notification.join_link
        );
        Ok(())
    }
}
