use crate::model::error::{Result, ScoringError};
use crate::model::fixture::{
    Match, MatchCommand, MatchDraft, MatchPlayer, MatchSheet, MatchSide, NewMatchRequest, SquadRequest,
};
use crate::repository::store::ScoringStore;
use crate::service::{Actor, ScoringService};
use chrono::{DateTime, Utc};
use log::info;
use uuid::Uuid;

impl<S: ScoringStore + 'static> ScoringService<S> {
    /// A match arranged directly by a manager of the home team.
    pub async fn create_match(
        &self,
        actor: &Actor,
        request: NewMatchRequest,
        now: DateTime<Utc>,
    ) -> Result<MatchDraft> {
        self.require_manager(request.home_team_id, actor).await?;
        let draft = Match::arrange(request, Uuid::new_v4(), actor.user_id, now)?;
        self.store.insert_match(&draft).await?;
        info!("Match {} arranged by {}", draft.fixture.id, actor.user_id);
        Ok(draft)
    }

    pub async fn find_match(&self, id: Uuid) -> Result<MatchSheet> {
        self.store.find_match(id).await
    }

    /// Runs one lifecycle command. Ending a match also rolls the scoring
    /// ledger up into player statistics.
    pub async fn apply_match_command(
        &self,
        actor: &Actor,
        id: Uuid,
        command: MatchCommand,
        now: DateTime<Utc>,
    ) -> Result<MatchSheet> {
        let sheet = self.store.find_match(id).await?;
        self.authorize_match_command(&sheet, &command, actor).await?;

        let ended = matches!(command, MatchCommand::End { .. });
        let sheet = self
            .store
            .update_match(id, move |sheet| {
                sheet.fixture.apply(&command, &sheet.teams, now)
            })
            .await?;
        info!("Match {id} is now {}", sheet.fixture.status);

        if ended {
            self.rollup_after_end(id, now).await;
        }
        Ok(sheet)
    }

    pub async fn remove_match(&self, actor: &Actor, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        let sheet = self.store.find_match(id).await?;
        self.authorize_match_manager(&sheet, actor).await?;
        self.store
            .update_match(id, move |sheet| sheet.fixture.remove(now))
            .await?;
        info!("Match {id} removed by {}", actor.user_id);
        Ok(())
    }

    /// Replaces one side's squad. Every listed player has to be on the
    /// team's roster.
    pub async fn select_squad(
        &self,
        actor: &Actor,
        match_id: Uuid,
        request: SquadRequest,
    ) -> Result<Vec<MatchPlayer>> {
        let team_id = request.team_id;
        self.require_manager(team_id, actor).await?;
        for player in &request.players {
            if !self.store.is_team_member(team_id, player.user_id).await? {
                return Err(ScoringError::InvalidReference(format!(
                    "player {} is not on the roster of team {team_id}",
                    player.user_id
                )));
            }
        }
        let limit = self.default_playing_xi.max(0) as usize;
        let players = self
            .store
            .replace_squad(match_id, team_id, move |sheet| {
                sheet.select_squad(&request, limit)
            })
            .await?;
        info!(
            "Squad of team {team_id} for match {match_id} set to {} players",
            players.len()
        );
        Ok(players)
    }

    async fn authorize_match_command(
        &self,
        sheet: &MatchSheet,
        command: &MatchCommand,
        actor: &Actor,
    ) -> Result<()> {
        if command.is_override() {
            return if actor.is_admin {
                Ok(())
            } else {
                Err(ScoringError::Forbidden(format!(
                    "only administrators can force a match to {}",
                    command.verb()
                )))
            };
        }
        if let MatchCommand::Confirm = command {
            return match sheet.team_for_side(MatchSide::Away) {
                Some(away) => self.require_manager(away, actor).await,
                None => Err(ScoringError::invalid_state("match", "without an away team", "be confirmed")),
            };
        }
        self.authorize_match_manager(sheet, actor).await
    }

    /// A manager of either side. Matches without teams belong to whoever
    /// created them.
    pub(crate) async fn authorize_match_manager(&self, sheet: &MatchSheet, actor: &Actor) -> Result<()> {
        if actor.is_admin {
            return Ok(());
        }
        let teams: Vec<Uuid> = sheet.teams.iter().map(|t| t.team_id).collect();
        let allowed = if teams.is_empty() {
            sheet.fixture.created_by == actor.user_id
        } else {
            self.manages_any(&teams, actor).await?
        };
        if allowed {
            Ok(())
        } else {
            Err(ScoringError::Forbidden(format!(
                "user {} does not manage a team in match {}",
                actor.user_id, sheet.fixture.id
            )))
        }
    }
}
