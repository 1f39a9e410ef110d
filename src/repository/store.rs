//! The persistence collaborator of the scoring core.
//!
//! Every mutating method takes the pure domain transition as a closure. The
//! implementation loads the aggregate with an exclusive lock, runs the
//! closure, and writes whatever it produced in the same transaction. If the
//! closure returns an error nothing is written.

use crate::model::challenge::Challenge;
use crate::model::error::Result;
use crate::model::fixture::{MatchDraft, MatchPlayer, MatchSheet};
use crate::model::innings::{BallDelivery, Inning, InningLedger, RecordedDelivery};
use crate::model::stats::{PlayerMatchStat, PlayerOverallCricketStat};
use crate::model::tournament::{Tournament, TournamentTeam};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait ScoringStore: Send + Sync {
    // ==================== Identity ====================

    /// Whether the user is a creator, captain, vice captain or moderator of
    /// the team.
    async fn is_team_manager(&self, team_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn is_team_member(&self, team_id: Uuid, user_id: Uuid) -> Result<bool>;

    // ==================== Challenges ====================

    async fn insert_challenge(&self, challenge: &Challenge) -> Result<()>;

    async fn find_challenge(&self, id: Uuid) -> Result<Challenge>;

    /// Runs `accept` on the locked challenge and stores the match it returns
    /// together with the updated challenge.
    async fn accept_challenge<F>(&self, id: Uuid, accept: F) -> Result<(Challenge, MatchDraft)>
    where
        F: FnOnce(&mut Challenge) -> Result<MatchDraft> + Send + 'static;

    async fn update_challenge<F>(&self, id: Uuid, change: F) -> Result<Challenge>
    where
        F: FnOnce(&mut Challenge) -> Result<()> + Send + 'static;

    /// Expires every open or pending challenge whose deadline is before
    /// `now`. Returns the ids that changed.
    async fn expire_challenges(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>>;

    // ==================== Matches ====================

    async fn insert_match(&self, draft: &MatchDraft) -> Result<()>;

    /// Loads a match with its teams and selected players. Removed matches
    /// are not found.
    async fn find_match(&self, id: Uuid) -> Result<MatchSheet>;

    /// Runs `change` on the locked match and writes the match row back.
    async fn update_match<F>(&self, id: Uuid, change: F) -> Result<MatchSheet>
    where
        F: FnOnce(&mut MatchSheet) -> Result<()> + Send + 'static;

    /// Replaces one side's squad with what `select` builds from the locked
    /// match.
    async fn replace_squad<F>(&self, match_id: Uuid, team_id: Uuid, select: F) -> Result<Vec<MatchPlayer>>
    where
        F: FnOnce(&MatchSheet) -> Result<Vec<MatchPlayer>> + Send + 'static;

    // ==================== Innings ====================

    /// Locks the match, hands `open` the match and its innings so far, and
    /// stores the innings it returns.
    async fn open_inning<F>(&self, match_id: Uuid, open: F) -> Result<Inning>
    where
        F: FnOnce(&MatchSheet, &[Inning]) -> Result<Inning> + Send + 'static;

    async fn find_inning(&self, id: Uuid) -> Result<Inning>;

    async fn match_innings(&self, match_id: Uuid) -> Result<Vec<Inning>>;

    /// An innings with its deliveries in sequence order, fall of wickets in
    /// wicket order, and the squads of both sides.
    async fn find_ledger(&self, inning_id: Uuid) -> Result<InningLedger>;

    /// Appends one delivery. The new delivery, its fall of wicket and the
    /// innings figures are written in one transaction.
    async fn record_delivery<F>(&self, inning_id: Uuid, record: F) -> Result<RecordedDelivery>
    where
        F: FnOnce(&mut InningLedger) -> Result<RecordedDelivery> + Send + 'static;

    async fn update_inning<F>(&self, inning_id: Uuid, change: F) -> Result<Inning>
    where
        F: FnOnce(&mut Inning) -> Result<()> + Send + 'static;

    /// Refolds the innings from its ledger and persists the result. Returns
    /// the rebuilt ledger and whether the stored figures had drifted.
    async fn rebuild_inning(&self, inning_id: Uuid) -> Result<(InningLedger, bool)>;

    // ==================== Statistics ====================

    /// Every delivery of the match, innings by innings in sequence order.
    async fn match_deliveries(&self, match_id: Uuid) -> Result<Vec<BallDelivery>>;

    /// Replaces the match's stat rows with `stats`.
    async fn replace_match_stats(&self, match_id: Uuid, stats: &[PlayerMatchStat]) -> Result<()>;

    /// Replaces one player's rows for the match with `stats`.
    async fn replace_player_match_stats(&self, match_id: Uuid, user_id: Uuid, stats: &[PlayerMatchStat]) -> Result<()>;

    /// The match's rows, innings by innings.
    async fn match_stats(&self, match_id: Uuid) -> Result<Vec<PlayerMatchStat>>;

    /// The player's rows from matches that reached `completed`.
    async fn completed_match_stats(&self, user_id: Uuid) -> Result<Vec<PlayerMatchStat>>;

    async fn upsert_career_stat(&self, stat: &PlayerOverallCricketStat) -> Result<()>;

    async fn find_career_stat(&self, user_id: Uuid) -> Result<PlayerOverallCricketStat>;

    // ==================== Tournaments ====================

    async fn insert_tournament(&self, tournament: &Tournament) -> Result<()>;

    async fn find_tournament(&self, id: Uuid) -> Result<Tournament>;

    async fn update_tournament<F>(&self, id: Uuid, change: F) -> Result<Tournament>
    where
        F: FnOnce(&mut Tournament) -> Result<()> + Send + 'static;

    /// Locks the tournament, tells `register` whether the team already has
    /// an entry, then inserts the entry and bumps the counter.
    async fn register_team<F>(
        &self,
        tournament_id: Uuid,
        team_id: Uuid,
        register: F,
    ) -> Result<(Tournament, TournamentTeam)>
    where
        F: FnOnce(&mut Tournament, bool) -> Result<TournamentTeam> + Send + 'static;

    async fn unregister_team<F>(&self, tournament_id: Uuid, team_id: Uuid, withdraw: F) -> Result<Tournament>
    where
        F: FnOnce(&mut Tournament, bool) -> Result<()> + Send + 'static;

    async fn tournament_teams(&self, tournament_id: Uuid) -> Result<Vec<TournamentTeam>>;
}
