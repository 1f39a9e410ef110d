//! In-memory implementation of [`ScoringStore`].
//!
//! All data lives behind one `RwLock`, so every mutating call is serialised
//! the same way row locks serialise writers in Postgres. Closures run on
//! copies of the aggregate and nothing is stored unless they succeed.

use crate::model::challenge::Challenge;
use crate::model::error::{Result, ScoringError};
use crate::model::fixture::{Match, MatchDraft, MatchPlayer, MatchSheet, MatchStatus, MatchTeam};
use crate::model::innings::{BallDelivery, FallOfWicket, Inning, InningLedger, RecordedDelivery};
use crate::model::stats::{PlayerMatchStat, PlayerOverallCricketStat};
use crate::model::team::TeamRole;
use crate::model::tournament::{Tournament, TournamentTeam};
use crate::repository::store::ScoringStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct LocalStore {
    data: Arc<RwLock<LocalData>>,
}

#[derive(Default)]
struct LocalData {
    team_members: HashMap<(Uuid, Uuid), TeamRole>,
    challenges: HashMap<Uuid, Challenge>,
    matches: HashMap<Uuid, Match>,
    match_teams: Vec<MatchTeam>,
    match_players: Vec<MatchPlayer>,
    innings: HashMap<Uuid, Inning>,
    // keyed by inning id, in sequence order
    deliveries: HashMap<Uuid, Vec<BallDelivery>>,
    fall_of_wickets: HashMap<Uuid, Vec<FallOfWicket>>,
    match_stats: HashMap<(Uuid, Uuid, i32), PlayerMatchStat>,
    career_stats: HashMap<Uuid, PlayerOverallCricketStat>,
    tournaments: HashMap<Uuid, Tournament>,
    tournament_teams: Vec<TournamentTeam>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the roster reference table.
    pub fn add_team_member(&self, team_id: Uuid, user_id: Uuid, role: TeamRole) -> Result<()> {
        self.write(|data| {
            data.team_members.insert((team_id, user_id), role);
            Ok(())
        })
    }

    fn read<T>(&self, f: impl FnOnce(&LocalData) -> Result<T>) -> Result<T> {
        let data = self
            .data
            .read()
            .map_err(|_| ScoringError::Pool("local store lock poisoned".to_string()))?;
        f(&data)
    }

    fn write<T>(&self, f: impl FnOnce(&mut LocalData) -> Result<T>) -> Result<T> {
        let mut data = self
            .data
            .write()
            .map_err(|_| ScoringError::Pool("local store lock poisoned".to_string()))?;
        f(&mut data)
    }
}

impl LocalData {
    fn sheet(&self, id: Uuid) -> Result<MatchSheet> {
        let fixture = self
            .matches
            .get(&id)
            .filter(|m| m.deleted_at.is_none())
            .cloned()
            .ok_or_else(|| ScoringError::not_found("match", id))?;
        Ok(MatchSheet {
            fixture,
            teams: self.match_teams.iter().filter(|t| t.match_id == id).cloned().collect(),
            players: self.match_players.iter().filter(|p| p.match_id == id).cloned().collect(),
        })
    }

    fn inning(&self, id: Uuid) -> Result<Inning> {
        self.innings
            .get(&id)
            .cloned()
            .ok_or_else(|| ScoringError::not_found("innings", id))
    }

    fn innings_of(&self, match_id: Uuid) -> Vec<Inning> {
        let mut innings: Vec<Inning> = self
            .innings
            .values()
            .filter(|i| i.match_id == match_id)
            .cloned()
            .collect();
        innings.sort_by_key(|i| i.innings_number);
        innings
    }

    fn squad(&self, match_id: Uuid, team_id: Uuid) -> Vec<Uuid> {
        self.match_players
            .iter()
            .filter(|p| p.match_id == match_id && p.team_id == team_id)
            .map(|p| p.user_id)
            .collect()
    }

    fn ledger(&self, inning_id: Uuid) -> Result<InningLedger> {
        let inning = self.inning(inning_id)?;
        let batting = self.squad(inning.match_id, inning.batting_team_id);
        let bowling = self.squad(inning.match_id, inning.bowling_team_id);
        let match_status = self.sheet(inning.match_id)?.fixture.status;
        Ok(InningLedger {
            match_status,
            deliveries: self.deliveries.get(&inning_id).cloned().unwrap_or_default(),
            fall_of_wickets: self.fall_of_wickets.get(&inning_id).cloned().unwrap_or_default(),
            inning,
            batting_squad: batting,
            bowling_squad: bowling,
        })
    }

    fn challenge(&self, id: Uuid) -> Result<Challenge> {
        self.challenges
            .get(&id)
            .cloned()
            .ok_or_else(|| ScoringError::not_found("challenge", id))
    }

    fn tournament(&self, id: Uuid) -> Result<Tournament> {
        self.tournaments
            .get(&id)
            .cloned()
            .ok_or_else(|| ScoringError::not_found("tournament", id))
    }

    fn is_registered(&self, tournament_id: Uuid, team_id: Uuid) -> bool {
        self.tournament_teams
            .iter()
            .any(|t| t.tournament_id == tournament_id && t.team_id == team_id)
    }

    fn store_match(&mut self, draft: &MatchDraft) {
        self.matches.insert(draft.fixture.id, draft.fixture.clone());
        self.match_teams.extend(draft.teams.iter().cloned());
    }
}

#[async_trait]
impl ScoringStore for LocalStore {
    // ==================== Identity ====================

    async fn is_team_manager(&self, team_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.read(|data| {
            Ok(data
                .team_members
                .get(&(team_id, user_id))
                .is_some_and(|role| role.is_manager()))
        })
    }

    async fn is_team_member(&self, team_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.read(|data| Ok(data.team_members.contains_key(&(team_id, user_id))))
    }

    // ==================== Challenges ====================

    async fn insert_challenge(&self, challenge: &Challenge) -> Result<()> {
        self.write(|data| {
            data.challenges.insert(challenge.id, challenge.clone());
            Ok(())
        })
    }

    async fn find_challenge(&self, id: Uuid) -> Result<Challenge> {
        self.read(|data| data.challenge(id))
    }

    async fn accept_challenge<F>(&self, id: Uuid, accept: F) -> Result<(Challenge, MatchDraft)>
    where
        F: FnOnce(&mut Challenge) -> Result<MatchDraft> + Send + 'static,
    {
        self.write(|data| {
            let mut challenge = data.challenge(id)?;
            let draft = accept(&mut challenge)?;
            data.store_match(&draft);
            data.challenges.insert(id, challenge.clone());
            Ok((challenge, draft))
        })
    }

    async fn update_challenge<F>(&self, id: Uuid, change: F) -> Result<Challenge>
    where
        F: FnOnce(&mut Challenge) -> Result<()> + Send + 'static,
    {
        self.write(|data| {
            let mut challenge = data.challenge(id)?;
            change(&mut challenge)?;
            data.challenges.insert(id, challenge.clone());
            Ok(challenge)
        })
    }

    async fn expire_challenges(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        self.write(|data| {
            Ok(data
                .challenges
                .values_mut()
                .filter_map(|c| c.expire(now).then_some(c.id))
                .collect())
        })
    }

    // ==================== Matches ====================

    async fn insert_match(&self, draft: &MatchDraft) -> Result<()> {
        self.write(|data| {
            data.store_match(draft);
            Ok(())
        })
    }

    async fn find_match(&self, id: Uuid) -> Result<MatchSheet> {
        self.read(|data| data.sheet(id))
    }

    async fn update_match<F>(&self, id: Uuid, change: F) -> Result<MatchSheet>
    where
        F: FnOnce(&mut MatchSheet) -> Result<()> + Send + 'static,
    {
        self.write(|data| {
            let mut sheet = data.sheet(id)?;
            change(&mut sheet)?;
            data.matches.insert(id, sheet.fixture.clone());
            Ok(sheet)
        })
    }

    async fn replace_squad<F>(&self, match_id: Uuid, team_id: Uuid, select: F) -> Result<Vec<MatchPlayer>>
    where
        F: FnOnce(&MatchSheet) -> Result<Vec<MatchPlayer>> + Send + 'static,
    {
        self.write(|data| {
            let sheet = data.sheet(match_id)?;
            let players = select(&sheet)?;
            data.match_players
                .retain(|p| !(p.match_id == match_id && p.team_id == team_id));
            data.match_players.extend(players.iter().cloned());
            Ok(players)
        })
    }

    // ==================== Innings ====================

    async fn open_inning<F>(&self, match_id: Uuid, open: F) -> Result<Inning>
    where
        F: FnOnce(&MatchSheet, &[Inning]) -> Result<Inning> + Send + 'static,
    {
        self.write(|data| {
            let sheet = data.sheet(match_id)?;
            let previous = data.innings_of(match_id);
            let inning = open(&sheet, &previous)?;
            data.innings.insert(inning.id, inning.clone());
            Ok(inning)
        })
    }

    async fn find_inning(&self, id: Uuid) -> Result<Inning> {
        self.read(|data| data.inning(id))
    }

    async fn match_innings(&self, match_id: Uuid) -> Result<Vec<Inning>> {
        self.read(|data| Ok(data.innings_of(match_id)))
    }

    async fn find_ledger(&self, inning_id: Uuid) -> Result<InningLedger> {
        self.read(|data| data.ledger(inning_id))
    }

    async fn record_delivery<F>(&self, inning_id: Uuid, record: F) -> Result<RecordedDelivery>
    where
        F: FnOnce(&mut InningLedger) -> Result<RecordedDelivery> + Send + 'static,
    {
        self.write(|data| {
            let mut ledger = data.ledger(inning_id)?;
            let recorded = record(&mut ledger)?;
            data.innings.insert(inning_id, ledger.inning);
            data.deliveries.insert(inning_id, ledger.deliveries);
            data.fall_of_wickets.insert(inning_id, ledger.fall_of_wickets);
            Ok(recorded)
        })
    }

    async fn update_inning<F>(&self, inning_id: Uuid, change: F) -> Result<Inning>
    where
        F: FnOnce(&mut Inning) -> Result<()> + Send + 'static,
    {
        self.write(|data| {
            let mut inning = data.inning(inning_id)?;
            change(&mut inning)?;
            data.innings.insert(inning_id, inning.clone());
            Ok(inning)
        })
    }

    async fn rebuild_inning(&self, inning_id: Uuid) -> Result<(InningLedger, bool)> {
        self.write(|data| {
            let mut ledger = data.ledger(inning_id)?;
            let drifted = ledger.rebuild();
            data.innings.insert(inning_id, ledger.inning.clone());
            data.fall_of_wickets
                .insert(inning_id, ledger.fall_of_wickets.clone());
            Ok((ledger, drifted))
        })
    }

    // ==================== Statistics ====================

    async fn match_deliveries(&self, match_id: Uuid) -> Result<Vec<BallDelivery>> {
        self.read(|data| {
            Ok(data
                .innings_of(match_id)
                .iter()
                .flat_map(|i| data.deliveries.get(&i.id).cloned().unwrap_or_default())
                .collect())
        })
    }

    async fn replace_match_stats(&self, match_id: Uuid, stats: &[PlayerMatchStat]) -> Result<()> {
        self.write(|data| {
            data.match_stats.retain(|(m, _, _), _| *m != match_id);
            for stat in stats {
                data.match_stats
                    .insert((stat.match_id, stat.user_id, stat.innings_number), stat.clone());
            }
            Ok(())
        })
    }

    async fn replace_player_match_stats(&self, match_id: Uuid, user_id: Uuid, stats: &[PlayerMatchStat]) -> Result<()> {
        self.write(|data| {
            data.match_stats
                .retain(|(m, u, _), _| !(*m == match_id && *u == user_id));
            for stat in stats {
                data.match_stats
                    .insert((stat.match_id, stat.user_id, stat.innings_number), stat.clone());
            }
            Ok(())
        })
    }

    async fn match_stats(&self, match_id: Uuid) -> Result<Vec<PlayerMatchStat>> {
        self.read(|data| {
            let mut stats: Vec<PlayerMatchStat> = data
                .match_stats
                .values()
                .filter(|s| s.match_id == match_id)
                .cloned()
                .collect();
            stats.sort_by_key(|s| (s.innings_number, s.user_id));
            Ok(stats)
        })
    }

    async fn completed_match_stats(&self, user_id: Uuid) -> Result<Vec<PlayerMatchStat>> {
        self.read(|data| {
            let mut stats: Vec<(Option<DateTime<Utc>>, PlayerMatchStat)> = data
                .match_stats
                .values()
                .filter(|s| s.user_id == user_id)
                .filter_map(|s| {
                    let fixture = data.matches.get(&s.match_id)?;
                    (fixture.status == MatchStatus::Completed && fixture.deleted_at.is_none())
                        .then(|| (fixture.completed_at, s.clone()))
                })
                .collect();
            stats.sort_by_key(|(completed_at, s)| (*completed_at, s.match_id, s.innings_number));
            Ok(stats.into_iter().map(|(_, s)| s).collect())
        })
    }

    async fn upsert_career_stat(&self, stat: &PlayerOverallCricketStat) -> Result<()> {
        self.write(|data| {
            data.career_stats.insert(stat.user_id, stat.clone());
            Ok(())
        })
    }

    async fn find_career_stat(&self, user_id: Uuid) -> Result<PlayerOverallCricketStat> {
        self.read(|data| {
            data.career_stats
                .get(&user_id)
                .cloned()
                .ok_or_else(|| ScoringError::not_found("career stats for player", user_id))
        })
    }

    // ==================== Tournaments ====================

    async fn insert_tournament(&self, tournament: &Tournament) -> Result<()> {
        self.write(|data| {
            data.tournaments.insert(tournament.id, tournament.clone());
            Ok(())
        })
    }

    async fn find_tournament(&self, id: Uuid) -> Result<Tournament> {
        self.read(|data| data.tournament(id))
    }

    async fn update_tournament<F>(&self, id: Uuid, change: F) -> Result<Tournament>
    where
        F: FnOnce(&mut Tournament) -> Result<()> + Send + 'static,
    {
        self.write(|data| {
            let mut tournament = data.tournament(id)?;
            change(&mut tournament)?;
            data.tournaments.insert(id, tournament.clone());
            Ok(tournament)
        })
    }

    async fn register_team<F>(
        &self,
        tournament_id: Uuid,
        team_id: Uuid,
        register: F,
    ) -> Result<(Tournament, TournamentTeam)>
    where
        F: FnOnce(&mut Tournament, bool) -> Result<TournamentTeam> + Send + 'static,
    {
        self.write(|data| {
            let mut tournament = data.tournament(tournament_id)?;
            let already = data.is_registered(tournament_id, team_id);
            let entry = register(&mut tournament, already)?;
            data.tournament_teams.push(entry.clone());
            data.tournaments.insert(tournament_id, tournament.clone());
            Ok((tournament, entry))
        })
    }

    async fn unregister_team<F>(&self, tournament_id: Uuid, team_id: Uuid, withdraw: F) -> Result<Tournament>
    where
        F: FnOnce(&mut Tournament, bool) -> Result<()> + Send + 'static,
    {
        self.write(|data| {
            let mut tournament = data.tournament(tournament_id)?;
            let registered = data.is_registered(tournament_id, team_id);
            withdraw(&mut tournament, registered)?;
            data.tournament_teams
                .retain(|t| !(t.tournament_id == tournament_id && t.team_id == team_id));
            data.tournaments.insert(tournament_id, tournament.clone());
            Ok(tournament)
        })
    }

    async fn tournament_teams(&self, tournament_id: Uuid) -> Result<Vec<TournamentTeam>> {
        self.read(|data| {
            Ok(data
                .tournament_teams
                .iter()
                .filter(|t| t.tournament_id == tournament_id)
                .cloned()
                .collect())
        })
    }
}
