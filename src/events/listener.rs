use async_trait::async_trait;

use super::TeamEvent;

/// Handles team lifecycle events.
///
/// ```rust,ignore
/// use teamgate::events::{Listener, TeamEvent};
/// use async_trait::async_trait;
///
/// struct AuditTrail;
///
/// #[async_trait]
/// impl Listener for AuditTrail {
///     async fn handle(&self, event: &TeamEvent) {
///         if let TeamEvent::OwnershipTransferred { team_id, .. } = event {
///             // write an audit row
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    async fn handle(&self, event: &TeamEvent);
}
