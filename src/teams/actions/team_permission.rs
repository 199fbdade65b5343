use chrono::Utc;

use super::load_team;
use crate::access::{ResourceType, SpecialAction};
use crate::events::{TeamEvent, dispatch};
use crate::teams::directory::MembershipDirectory;
use crate::teams::repository::TeamStore;
use crate::teams::types::{Team, TeamPermission};
use crate::AccessError;

#[derive(Debug, Clone)]
pub struct UpdateTeamPermissionInput {
    pub team_id: i64,
    pub actor_id: i64,
    pub permission: TeamPermission,
}

/// Replaces a team's permission toggles. Owner and Admin only.
pub struct UpdateTeamPermissionAction<S> {
    store: S,
}

impl<S: TeamStore> UpdateTeamPermissionAction<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "update_team_permission", skip_all, err)
    )]
    pub async fn execute(&self, input: UpdateTeamPermissionInput) -> Result<Team, AccessError> {
        let team = load_team(&self.store, input.team_id).await?;
        let actor = MembershipDirectory::new(&self.store)
            .actor(team.id, Some(input.actor_id))
            .await?;
        actor.require(
            actor
                .evaluator(ResourceType::Team)
                .can_manage_special(SpecialAction::EditorAndViewerCanInviteSwitch),
            "update_team_permission",
        )?;

        let team = self
            .store
            .update_team_permission(team.id, input.permission)
            .await?;

        log::info!(
            target: "teamgate",
            "msg=\"team permission updated\", team_id={}, updated_by={}, permission={:?}",
            team.id,
            input.actor_id,
            team.permission
        );
        dispatch(TeamEvent::TeamPermissionUpdated {
            team_id: team.id,
            updated_by: input.actor_id,
            at: Utc::now(),
        })
        .await;

        Ok(team)
    }
}
