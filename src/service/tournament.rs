use crate::model::error::{Result, ScoringError};
use crate::model::tournament::{NewTournamentRequest, Tournament, TournamentCommand, TournamentTeam};
use crate::repository::store::ScoringStore;
use crate::service::{Actor, ScoringService};
use chrono::{DateTime, Utc};
use log::{info, warn};
use uuid::Uuid;

impl<S: ScoringStore + 'static> ScoringService<S> {
    pub async fn create_tournament(
        &self,
        actor: &Actor,
        request: NewTournamentRequest,
        now: DateTime<Utc>,
    ) -> Result<Tournament> {
        let tournament = Tournament::create(request, Uuid::new_v4(), actor.user_id, now)?;
        self.store.insert_tournament(&tournament).await?;
        info!("Tournament {} created by {}", tournament.id, actor.user_id);
        Ok(tournament)
    }

    pub async fn find_tournament(&self, id: Uuid) -> Result<Tournament> {
        self.store.find_tournament(id).await
    }

    pub async fn tournament_teams(&self, id: Uuid) -> Result<Vec<TournamentTeam>> {
        self.store.find_tournament(id).await?;
        self.store.tournament_teams(id).await
    }

    pub async fn apply_tournament_command(
        &self,
        actor: &Actor,
        id: Uuid,
        command: TournamentCommand,
        now: DateTime<Utc>,
    ) -> Result<Tournament> {
        let tournament = self.store.find_tournament(id).await?;
        ensure_organiser(&tournament, actor)?;
        let tournament = self
            .store
            .update_tournament(id, move |tournament| tournament.apply(command, now))
            .await?;
        info!("Tournament {id} is now {}", tournament.status);
        Ok(tournament)
    }

    /// Enters a team. The capacity check and the counter increment happen
    /// under the tournament's lock, so the last free slot goes to exactly one
    /// caller.
    pub async fn register_team(
        &self,
        actor: &Actor,
        tournament_id: Uuid,
        team_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(Tournament, TournamentTeam)> {
        self.require_manager(team_id, actor).await?;
        let registered_by = actor.user_id;
        let result = self
            .store
            .register_team(tournament_id, team_id, move |tournament, already| {
                tournament.register(team_id, already, registered_by, now)
            })
            .await;
        match &result {
            Ok((tournament, _)) => info!(
                "Team {team_id} registered for tournament {tournament_id} ({}/{})",
                tournament.current_teams, tournament.max_teams
            ),
            Err(err @ (ScoringError::CapacityExceeded { .. } | ScoringError::ConcurrencyConflict)) => {
                warn!("Team {team_id} turned away from tournament {tournament_id}: {err}")
            }
            Err(_) => {}
        }
        result
    }

    pub async fn unregister_team(
        &self,
        actor: &Actor,
        tournament_id: Uuid,
        team_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Tournament> {
        let tournament = self.store.find_tournament(tournament_id).await?;
        if ensure_organiser(&tournament, actor).is_err() {
            self.require_manager(team_id, actor).await?;
        }
        let tournament = self
            .store
            .unregister_team(tournament_id, team_id, move |tournament, registered| {
                tournament.unregister(team_id, registered, now)
            })
            .await?;
        info!("Team {team_id} withdrawn from tournament {tournament_id}");
        Ok(tournament)
    }
}

fn ensure_organiser(tournament: &Tournament, actor: &Actor) -> Result<()> {
    if actor.is_admin || tournament.created_by == actor.user_id {
        Ok(())
    } else {
        Err(ScoringError::Forbidden(format!(
            "user {} does not organise tournament {}",
            actor.user_id, tournament.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::team::TeamRole;
    use crate::model::tournament::TournamentStatus;
    use crate::repository::local::LocalStore;
    use chrono::Duration;

    struct Cup {
        service: ScoringService<LocalStore>,
        organiser: Actor,
        id: Uuid,
    }

    async fn open_cup(max_teams: i32) -> Cup {
        let service = ScoringService::new(LocalStore::new(), 11);
        let organiser = Actor::user(Uuid::new_v4());
        let now = Utc::now();
        let tournament = service
            .create_tournament(
                &organiser,
                NewTournamentRequest {
                    name: "Harbour League".to_string(),
                    sport_id: Uuid::new_v4(),
                    max_teams,
                    registration_deadline: now + Duration::days(7),
                    starts_at: None,
                },
                now,
            )
            .await
            .unwrap();
        service
            .apply_tournament_command(&organiser, tournament.id, TournamentCommand::OpenRegistration, now)
            .await
            .unwrap();
        Cup {
            service,
            organiser,
            id: tournament.id,
        }
    }

    fn captain_of(cup: &Cup, team_id: Uuid) -> Actor {
        let captain = Actor::user(Uuid::new_v4());
        cup.service
            .store()
            .add_team_member(team_id, captain.user_id, TeamRole::Captain)
            .unwrap();
        captain
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn last_slot_goes_to_one_team() {
        let cup = open_cup(1).await;
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        let first_captain = captain_of(&cup, first);
        let second_captain = captain_of(&cup, second);
        let now = Utc::now();

        let a = {
            let service = cup.service.clone();
            let id = cup.id;
            tokio::spawn(async move { service.register_team(&first_captain, id, first, now).await })
        };
        let b = {
            let service = cup.service.clone();
            let id = cup.id;
            tokio::spawn(async move { service.register_team(&second_captain, id, second, now).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(ScoringError::CapacityExceeded { max_teams: 1 }))));
        let tournament = cup.service.find_tournament(cup.id).await.unwrap();
        assert_eq!(tournament.current_teams, 1);
        assert_eq!(cup.service.tournament_teams(cup.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn counter_matches_the_entry_list() {
        let cup = open_cup(0).await;
        let now = Utc::now();
        let teams: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        for team in &teams {
            let captain = captain_of(&cup, *team);
            cup.service.register_team(&captain, cup.id, *team, now).await.unwrap();
        }
        let again = captain_of(&cup, teams[0]);
        let err = cup.service.register_team(&again, cup.id, teams[0], now).await.unwrap_err();
        assert!(matches!(err, ScoringError::AlreadyRegistered));

        let tournament = cup
            .service
            .unregister_team(&cup.organiser, cup.id, teams[1], now)
            .await
            .unwrap();
        assert_eq!(tournament.current_teams, 4);
        assert_eq!(
            cup.service.tournament_teams(cup.id).await.unwrap().len() as i32,
            tournament.current_teams
        );
    }

    #[tokio::test]
    async fn only_managers_enter_teams() {
        let cup = open_cup(4).await;
        let team = Uuid::new_v4();
        let err = cup
            .service
            .register_team(&Actor::user(Uuid::new_v4()), cup.id, team, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::Forbidden(_)));
        assert_eq!(cup.service.find_tournament(cup.id).await.unwrap().current_teams, 0);
    }

    #[tokio::test]
    async fn organiser_runs_the_lifecycle() {
        let cup = open_cup(4).await;
        let now = Utc::now();
        let err = cup
            .service
            .apply_tournament_command(&Actor::user(Uuid::new_v4()), cup.id, TournamentCommand::Start, now)
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::Forbidden(_)));

        let started = cup
            .service
            .apply_tournament_command(&cup.organiser, cup.id, TournamentCommand::Start, now)
            .await
            .unwrap();
        assert_eq!(started.status, TournamentStatus::InProgress);

        let team = Uuid::new_v4();
        let captain = captain_of(&cup, team);
        let err = cup.service.register_team(&captain, cup.id, team, now).await.unwrap_err();
        assert!(matches!(err, ScoringError::NotOpen));
    }
}
