use chrono::Utc;

use crate::events::{TeamEvent, dispatch};
use crate::teams::repository::TeamStore;
use crate::{AccessError, Entity};

/// Deletes a user account and every membership it holds.
///
/// Refused while the user owns a team; ownership has to be transferred first.
pub struct DeleteAccountAction<S> {
    store: S,
}

impl<S: TeamStore> DeleteAccountAction<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "delete_account", skip_all, err)
    )]
    pub async fn execute(&self, user_id: i64) -> Result<(), AccessError> {
        if self.store.find_user_by_id(user_id).await?.is_none() {
            return Err(AccessError::NotFound(Entity::User));
        }

        let memberships = self.store.list_user_memberships(user_id).await?;
        if let Some(owned) = memberships.iter().find(|m| m.is_owner()) {
            log::warn!(
                target: "teamgate",
                "msg=\"account deletion refused, user owns a team\", user_id={user_id}, team_id={}",
                owned.team_id
            );
            return Err(AccessError::OwnerMustTransferFirst);
        }

        self.store.delete_account(user_id).await?;

        log::info!(
            target: "teamgate",
            "msg=\"account deleted\", user_id={user_id}, memberships={}",
            memberships.len()
        );
        dispatch(TeamEvent::UserDeleted {
            user_id,
            at: Utc::now(),
        })
        .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Role;
    use crate::teams::actions::fixtures::team_with_owner;
    use crate::teams::{MembershipRepository, UserRepository};

    #[tokio::test]
    async fn test_member_account_deleted_with_memberships() {
        let fx = team_with_owner().await;
        let (user, _) = fx.store.seed_member(fx.team.id, "e@x.com", Role::Editor).await;

        DeleteAccountAction::new(fx.store.clone())
            .execute(user.id)
            .await
            .unwrap();

        assert!(fx.store.find_user_by_id(user.id).await.unwrap().is_none());
        assert!(fx.store.list_user_memberships(user.id).await.unwrap().is_empty());
        assert_eq!(fx.store.membership_count(fx.team.id), 1);
    }

    #[tokio::test]
    async fn test_owner_must_transfer_first() {
        let fx = team_with_owner().await;

        let err = DeleteAccountAction::new(fx.store.clone())
            .execute(fx.owner.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::OwnerMustTransferFirst));
        assert!(fx.store.find_user_by_id(fx.owner.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let fx = team_with_owner().await;
        let err = DeleteAccountAction::new(fx.store.clone())
            .execute(9999)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotFound(Entity::User)));
    }
}
