use crate::model::error::Result;
use crate::model::stats::{PlayerMatchStat, PlayerOverallCricketStat};
use crate::repository::store::ScoringStore;
use crate::service::ScoringService;
use chrono::{DateTime, Utc};
use log::{error, info};
use std::collections::BTreeSet;
use uuid::Uuid;

impl<S: ScoringStore + 'static> ScoringService<S> {
    /// Refolds every participant's figures for the match from its deliveries,
    /// one row per innings, and replaces the stored rows.
    pub async fn recompute_match_stats(&self, match_id: Uuid, now: DateTime<Utc>) -> Result<Vec<PlayerMatchStat>> {
        self.store.find_match(match_id).await?;
        let innings = self.store.match_innings(match_id).await?;
        let deliveries = self.store.match_deliveries(match_id).await?;
        let stats = PlayerMatchStat::fold_match(&innings, &deliveries, now);
        self.store.replace_match_stats(match_id, &stats).await?;
        info!(
            "Match {match_id}: stats recomputed for {} players from {} deliveries",
            stats.len(),
            deliveries.len()
        );
        Ok(stats)
    }

    /// Refolds one player's rows for the match, one per innings they appear
    /// in. A player who never appeared ends up with no rows.
    pub async fn recompute_player_match_stat(
        &self,
        match_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<PlayerMatchStat>> {
        self.store.find_match(match_id).await?;
        let innings = self.store.match_innings(match_id).await?;
        let deliveries = self.store.match_deliveries(match_id).await?;
        let stats = PlayerMatchStat::fold_player(&innings, user_id, &deliveries, now);
        self.store
            .replace_player_match_stats(match_id, user_id, &stats)
            .await?;
        info!(
            "Match {match_id}: stats recomputed for player {user_id} over {} innings",
            stats.len()
        );
        Ok(stats)
    }

    /// Rebuilds a player's career figures from all of their completed
    /// matches. Running it twice gives the same row.
    pub async fn recompute_career(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<PlayerOverallCricketStat> {
        let match_stats = self.store.completed_match_stats(user_id).await?;
        let career = PlayerOverallCricketStat::rebuild(user_id, &match_stats, now);
        self.store.upsert_career_stat(&career).await?;
        Ok(career)
    }

    pub async fn rollup_match(&self, match_id: Uuid, now: DateTime<Utc>) -> Result<Vec<PlayerMatchStat>> {
        let stats = self.recompute_match_stats(match_id, now).await?;
        let players: BTreeSet<Uuid> = stats.iter().map(|s| s.user_id).collect();
        for user_id in players {
            self.recompute_career(user_id, now).await?;
        }
        Ok(stats)
    }

    /// Best effort: the match has already ended, so a failed rollup is
    /// logged and left for an explicit recompute.
    pub(crate) async fn rollup_after_end(&self, match_id: Uuid, now: DateTime<Utc>) {
        if let Err(err) = self.rollup_match(match_id, now).await {
            error!("An error occurred while rolling up stats for match {match_id}. The error: {:?}", err);
        }
    }

    pub async fn match_stats(&self, match_id: Uuid) -> Result<Vec<PlayerMatchStat>> {
        self.store.match_stats(match_id).await
    }

    pub async fn career_stats(&self, user_id: Uuid) -> Result<PlayerOverallCricketStat> {
        self.store.find_career_stat(user_id).await
    }
}
