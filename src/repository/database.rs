use crate::config::config::Config;
use crate::model::challenge::{Challenge, ChallengeStatus};
use crate::model::error::{Result, ScoringError};
use crate::model::fixture::{MatchDraft, MatchPlayer, MatchSheet, MatchStatus, MatchTeam};
use crate::model::innings::{BallDelivery, FallOfWicket, Inning, InningLedger, RecordedDelivery};
use crate::model::rows::{
    parse_column, CareerStatRow, ChallengeRow, DeliveryRow, InningRow, MatchRow, MatchTeamRow,
    PlayerMatchStatRow, TournamentRow,
};
use crate::model::schema::{
    ball_deliveries, challenges, fall_of_wickets, innings, match_players, match_teams, matches,
    player_match_stats, player_overall_cricket_stats, team_members, tournament_teams, tournaments,
};
use crate::model::stats::{PlayerMatchStat, PlayerOverallCricketStat};
use crate::model::team::TeamRole;
use crate::model::tournament::{Tournament, TournamentTeam};
use crate::repository::store::ScoringStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool::managed::Object;
use diesel::{
    BoolExpressionMethods, ConnectionError, ConnectionResult, ExpressionMethods, OptionalExtension,
    QueryDsl, SelectableHelper,
};
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager},
    AsyncConnection, AsyncPgConnection, RunQueryDsl,
};
use log::{error, warn};
use openssl::ssl::{SslConnector, SslMethod};
use postgres_openssl::MakeTlsConnector;
use scoped_futures::ScopedFutureExt;
use uuid::Uuid;

pub type DBPool = deadpool::managed::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;
type PooledConnection = Object<AsyncDieselConnectionManager<AsyncPgConnection>>;

pub struct Database {
    pool: DBPool,
}

impl Database {
    pub fn new(config: &Config) -> Result<Self> {
        let ca_file = config.database_ca_file.clone();
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_setup(
            config.database_url.clone(),
            move |url| Box::pin(Self::establish(url, ca_file.clone())),
        );
        let pool = Pool::builder(manager)
            .max_size(config.database_pool_size)
            .build()
            .map_err(|e| ScoringError::Pool(e.to_string()))?;
        Ok(Database { pool })
    }

    async fn establish(database_url: &str, ca_file: Option<String>) -> ConnectionResult<AsyncPgConnection> {
        let tls_error = |e: openssl::error::ErrorStack| ConnectionError::BadConnection(e.to_string());
        let mut builder = SslConnector::builder(SslMethod::tls()).map_err(tls_error)?;
        if let Some(ca_file) = ca_file {
            builder.set_ca_file(ca_file).map_err(tls_error)?;
        }
        let connector = MakeTlsConnector::new(builder.build());
        let (client, connection) = tokio_postgres::connect(database_url, connector)
            .await
            .map_err(|e| ConnectionError::BadConnection(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("Postgres connection closed with an error: {e}");
            }
        });
        AsyncPgConnection::try_from(client).await
    }

    async fn get_db_conn(&self) -> Result<PooledConnection> {
        self.pool.get().await.map_err(|err| {
            error!("An error occurred while acquiring a database connection. The error: {:?}", err);
            ScoringError::Pool(err.to_string())
        })
    }
}

async fn lock_challenge(conn: &mut AsyncPgConnection, id: Uuid) -> Result<Challenge> {
    challenges::table
        .find(id)
        .select(ChallengeRow::as_select())
        .for_update()
        .first::<ChallengeRow>(conn)
        .await
        .optional()?
        .ok_or_else(|| ScoringError::not_found("challenge", id))?
        .try_into()
}

async fn load_sheet(conn: &mut AsyncPgConnection, id: Uuid, lock: bool) -> Result<MatchSheet> {
    let live = matches::table
        .find(id)
        .filter(matches::deleted_at.is_null())
        .select(MatchRow::as_select());
    let row = if lock {
        live.for_update().first::<MatchRow>(conn).await.optional()?
    } else {
        live.first::<MatchRow>(conn).await.optional()?
    };
    let fixture = row
        .ok_or_else(|| ScoringError::not_found("match", id))?
        .try_into()?;
    let teams = match_teams::table
        .filter(match_teams::match_id.eq(id))
        .order(match_teams::created_at.asc())
        .select(MatchTeamRow::as_select())
        .load::<MatchTeamRow>(conn)
        .await?
        .into_iter()
        .map(MatchTeam::try_from)
        .collect::<Result<Vec<_>>>()?;
    let players = match_players::table
        .filter(match_players::match_id.eq(id))
        .select(MatchPlayer::as_select())
        .load::<MatchPlayer>(conn)
        .await?;
    Ok(MatchSheet {
        fixture,
        teams,
        players,
    })
}

async fn load_innings(conn: &mut AsyncPgConnection, match_id: Uuid) -> Result<Vec<Inning>> {
    innings::table
        .filter(innings::match_id.eq(match_id))
        .order(innings::innings_number.asc())
        .select(InningRow::as_select())
        .load::<InningRow>(conn)
        .await?
        .into_iter()
        .map(Inning::try_from)
        .collect()
}

async fn load_inning(conn: &mut AsyncPgConnection, id: Uuid, lock: bool) -> Result<Inning> {
    let query = innings::table.find(id).select(InningRow::as_select());
    let row = if lock {
        query.for_update().first::<InningRow>(conn).await.optional()?
    } else {
        query.first::<InningRow>(conn).await.optional()?
    };
    row.ok_or_else(|| ScoringError::not_found("innings", id))?
        .try_into()
}

async fn squad(conn: &mut AsyncPgConnection, match_id: Uuid, team_id: Uuid) -> Result<Vec<Uuid>> {
    Ok(match_players::table
        .filter(match_players::match_id.eq(match_id))
        .filter(match_players::team_id.eq(team_id))
        .select(match_players::user_id)
        .load::<Uuid>(conn)
        .await?)
}

/// Status of the match. When locking, the row is share-locked so a status
/// change waits for the delivery being written.
async fn load_match_status(conn: &mut AsyncPgConnection, id: Uuid, lock: bool) -> Result<MatchStatus> {
    let query = matches::table
        .find(id)
        .filter(matches::deleted_at.is_null())
        .select(matches::status);
    let status = if lock {
        query.for_share().first::<String>(conn).await.optional()?
    } else {
        query.first::<String>(conn).await.optional()?
    };
    let status = status.ok_or_else(|| ScoringError::not_found("match", id))?;
    parse_column("matches.status", &status)
}

async fn load_ledger(conn: &mut AsyncPgConnection, inning_id: Uuid, lock: bool) -> Result<InningLedger> {
    let inning = load_inning(conn, inning_id, lock).await?;
    let match_status = load_match_status(conn, inning.match_id, lock).await?;
    let deliveries = ball_deliveries::table
        .filter(ball_deliveries::inning_id.eq(inning_id))
        .order(ball_deliveries::sequence.asc())
        .select(DeliveryRow::as_select())
        .load::<DeliveryRow>(conn)
        .await?
        .into_iter()
        .map(BallDelivery::try_from)
        .collect::<Result<Vec<_>>>()?;
    let fall_of_wickets = fall_of_wickets::table
        .filter(fall_of_wickets::inning_id.eq(inning_id))
        .order(fall_of_wickets::wicket_number.asc())
        .select(FallOfWicket::as_select())
        .load::<FallOfWicket>(conn)
        .await?;
    let batting = squad(conn, inning.match_id, inning.batting_team_id).await?;
    let bowling = squad(conn, inning.match_id, inning.bowling_team_id).await?;
    Ok(InningLedger {
        inning,
        deliveries,
        fall_of_wickets,
        match_status,
        batting_squad: batting,
        bowling_squad: bowling,
    })
}

async fn save_inning(conn: &mut AsyncPgConnection, inning: &Inning) -> Result<()> {
    diesel::update(innings::table.find(inning.id))
        .set(&InningRow::from(inning))
        .execute(conn)
        .await?;
    Ok(())
}

async fn lock_tournament(conn: &mut AsyncPgConnection, id: Uuid) -> Result<Tournament> {
    tournaments::table
        .find(id)
        .select(TournamentRow::as_select())
        .for_update()
        .first::<TournamentRow>(conn)
        .await
        .optional()?
        .ok_or_else(|| ScoringError::not_found("tournament", id))?
        .try_into()
}

async fn is_registered(conn: &mut AsyncPgConnection, tournament_id: Uuid, team_id: Uuid) -> Result<bool> {
    Ok(diesel::select(diesel::dsl::exists(
        tournament_teams::table.find((tournament_id, team_id)),
    ))
    .get_result::<bool>(conn)
    .await?)
}

#[async_trait]
impl ScoringStore for Database {
    async fn is_team_manager(&self, team_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut conn = self.get_db_conn().await?;
        let role = team_members::table
            .find((team_id, user_id))
            .select(team_members::role)
            .first::<String>(&mut conn)
            .await
            .optional()?;
        match role {
            Some(role) => Ok(parse_column::<TeamRole>("team_members.role", &role)?.is_manager()),
            None => Ok(false),
        }
    }

    async fn is_team_member(&self, team_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut conn = self.get_db_conn().await?;
        Ok(diesel::select(diesel::dsl::exists(
            team_members::table.find((team_id, user_id)),
        ))
        .get_result::<bool>(&mut conn)
        .await?)
    }

    async fn insert_challenge(&self, challenge: &Challenge) -> Result<()> {
        let mut conn = self.get_db_conn().await?;
        diesel::insert_into(challenges::table)
            .values(&ChallengeRow::from(challenge))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn find_challenge(&self, id: Uuid) -> Result<Challenge> {
        let mut conn = self.get_db_conn().await?;
        challenges::table
            .find(id)
            .select(ChallengeRow::as_select())
            .first::<ChallengeRow>(&mut conn)
            .await
            .optional()?
            .ok_or_else(|| ScoringError::not_found("challenge", id))?
            .try_into()
    }

    async fn accept_challenge<F>(&self, id: Uuid, accept: F) -> Result<(Challenge, MatchDraft)>
    where
        F: FnOnce(&mut Challenge) -> Result<MatchDraft> + Send + 'static,
    {
        let mut pooled = self.get_db_conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        conn.transaction::<_, ScoringError, _>(|conn| {
            async move {
                let mut challenge = lock_challenge(conn, id).await?;
                let draft = accept(&mut challenge)?;
                diesel::insert_into(matches::table)
                    .values(&MatchRow::from(&draft.fixture))
                    .execute(conn)
                    .await?;
                let teams: Vec<MatchTeamRow> = draft.teams.iter().map(MatchTeamRow::from).collect();
                diesel::insert_into(match_teams::table)
                    .values(&teams)
                    .execute(conn)
                    .await?;
                diesel::update(challenges::table.find(id))
                    .set(&ChallengeRow::from(&challenge))
                    .execute(conn)
                    .await?;
                Ok((challenge, draft))
            }
            .scope_boxed()
        })
        .await
    }

    async fn update_challenge<F>(&self, id: Uuid, change: F) -> Result<Challenge>
    where
        F: FnOnce(&mut Challenge) -> Result<()> + Send + 'static,
    {
        let mut pooled = self.get_db_conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        conn.transaction::<_, ScoringError, _>(|conn| {
            async move {
                let mut challenge = lock_challenge(conn, id).await?;
                change(&mut challenge)?;
                diesel::update(challenges::table.find(id))
                    .set(&ChallengeRow::from(&challenge))
                    .execute(conn)
                    .await?;
                Ok(challenge)
            }
            .scope_boxed()
        })
        .await
    }

    async fn expire_challenges(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let mut conn = self.get_db_conn().await?;
        let live: Vec<String> = ChallengeStatus::LIVE.iter().map(|s| s.to_string()).collect();
        Ok(diesel::update(
            challenges::table
                .filter(challenges::status.eq_any(live))
                .filter(challenges::expires_at.lt(now)),
        )
        .set((
            challenges::status.eq(ChallengeStatus::Expired.to_string()),
            challenges::updated_at.eq(now),
        ))
        .returning(challenges::id)
        .get_results::<Uuid>(&mut conn)
        .await?)
    }

    async fn insert_match(&self, draft: &MatchDraft) -> Result<()> {
        let row = MatchRow::from(&draft.fixture);
        let teams: Vec<MatchTeamRow> = draft.teams.iter().map(MatchTeamRow::from).collect();
        let mut pooled = self.get_db_conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        conn.transaction::<_, ScoringError, _>(|conn| {
            async move {
                diesel::insert_into(matches::table)
                    .values(&row)
                    .execute(conn)
                    .await?;
                diesel::insert_into(match_teams::table)
                    .values(&teams)
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
    }

    async fn find_match(&self, id: Uuid) -> Result<MatchSheet> {
        let mut pooled = self.get_db_conn().await?;
        load_sheet(&mut pooled, id, false).await
    }

    async fn update_match<F>(&self, id: Uuid, change: F) -> Result<MatchSheet>
    where
        F: FnOnce(&mut MatchSheet) -> Result<()> + Send + 'static,
    {
        let mut pooled = self.get_db_conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        conn.transaction::<_, ScoringError, _>(|conn| {
            async move {
                let mut sheet = load_sheet(conn, id, true).await?;
                change(&mut sheet)?;
                diesel::update(matches::table.find(id))
                    .set(&MatchRow::from(&sheet.fixture))
                    .execute(conn)
                    .await?;
                Ok(sheet)
            }
            .scope_boxed()
        })
        .await
    }

    async fn replace_squad<F>(&self, match_id: Uuid, team_id: Uuid, select: F) -> Result<Vec<MatchPlayer>>
    where
        F: FnOnce(&MatchSheet) -> Result<Vec<MatchPlayer>> + Send + 'static,
    {
        let mut pooled = self.get_db_conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        conn.transaction::<_, ScoringError, _>(|conn| {
            async move {
                let sheet = load_sheet(conn, match_id, true).await?;
                let players = select(&sheet)?;
                diesel::delete(
                    match_players::table.filter(
                        match_players::match_id
                            .eq(match_id)
                            .and(match_players::team_id.eq(team_id)),
                    ),
                )
                .execute(conn)
                .await?;
                diesel::insert_into(match_players::table)
                    .values(&players)
                    .execute(conn)
                    .await?;
                Ok(players)
            }
            .scope_boxed()
        })
        .await
    }

    async fn open_inning<F>(&self, match_id: Uuid, open: F) -> Result<Inning>
    where
        F: FnOnce(&MatchSheet, &[Inning]) -> Result<Inning> + Send + 'static,
    {
        let mut pooled = self.get_db_conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        conn.transaction::<_, ScoringError, _>(|conn| {
            async move {
                let sheet = load_sheet(conn, match_id, true).await?;
                let previous = load_innings(conn, match_id).await?;
                let inning = open(&sheet, &previous)?;
                diesel::insert_into(innings::table)
                    .values(&InningRow::from(&inning))
                    .execute(conn)
                    .await?;
                Ok(inning)
            }
            .scope_boxed()
        })
        .await
    }

    async fn find_inning(&self, id: Uuid) -> Result<Inning> {
        let mut pooled = self.get_db_conn().await?;
        load_inning(&mut pooled, id, false).await
    }

    async fn match_innings(&self, match_id: Uuid) -> Result<Vec<Inning>> {
        let mut pooled = self.get_db_conn().await?;
        load_innings(&mut pooled, match_id).await
    }

    async fn find_ledger(&self, inning_id: Uuid) -> Result<InningLedger> {
        let mut pooled = self.get_db_conn().await?;
        load_ledger(&mut pooled, inning_id, false).await
    }

    async fn record_delivery<F>(&self, inning_id: Uuid, record: F) -> Result<RecordedDelivery>
    where
        F: FnOnce(&mut InningLedger) -> Result<RecordedDelivery> + Send + 'static,
    {
        let mut pooled = self.get_db_conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        conn.transaction::<_, ScoringError, _>(|conn| {
            async move {
                let mut ledger = load_ledger(conn, inning_id, true).await?;
                let recorded = record(&mut ledger)?;
                diesel::insert_into(ball_deliveries::table)
                    .values(&DeliveryRow::from(&recorded.delivery))
                    .execute(conn)
                    .await?;
                if let Some(fow) = &recorded.fall_of_wicket {
                    diesel::insert_into(fall_of_wickets::table)
                        .values(fow)
                        .execute(conn)
                        .await?;
                }
                save_inning(conn, &ledger.inning).await?;
                Ok(recorded)
            }
            .scope_boxed()
        })
        .await
    }

    async fn update_inning<F>(&self, inning_id: Uuid, change: F) -> Result<Inning>
    where
        F: FnOnce(&mut Inning) -> Result<()> + Send + 'static,
    {
        let mut pooled = self.get_db_conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        conn.transaction::<_, ScoringError, _>(|conn| {
            async move {
                let mut inning = load_inning(conn, inning_id, true).await?;
                change(&mut inning)?;
                save_inning(conn, &inning).await?;
                Ok(inning)
            }
            .scope_boxed()
        })
        .await
    }

    async fn rebuild_inning(&self, inning_id: Uuid) -> Result<(InningLedger, bool)> {
        let mut pooled = self.get_db_conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        conn.transaction::<_, ScoringError, _>(|conn| {
            async move {
                let mut ledger = load_ledger(conn, inning_id, true).await?;
                let drifted = ledger.rebuild();
                if drifted {
                    warn!("Innings {inning_id} had drifted from its delivery ledger and was rebuilt");
                    save_inning(conn, &ledger.inning).await?;
                    diesel::delete(fall_of_wickets::table.filter(fall_of_wickets::inning_id.eq(inning_id)))
                        .execute(conn)
                        .await?;
                    diesel::insert_into(fall_of_wickets::table)
                        .values(&ledger.fall_of_wickets)
                        .execute(conn)
                        .await?;
                }
                Ok((ledger, drifted))
            }
            .scope_boxed()
        })
        .await
    }

    async fn match_deliveries(&self, match_id: Uuid) -> Result<Vec<BallDelivery>> {
        let mut conn = self.get_db_conn().await?;
        ball_deliveries::table
            .inner_join(innings::table)
            .filter(innings::match_id.eq(match_id))
            .order((innings::innings_number.asc(), ball_deliveries::sequence.asc()))
            .select(DeliveryRow::as_select())
            .load::<DeliveryRow>(&mut conn)
            .await?
            .into_iter()
            .map(BallDelivery::try_from)
            .collect()
    }

    async fn replace_match_stats(&self, match_id: Uuid, stats: &[PlayerMatchStat]) -> Result<()> {
        let rows: Vec<PlayerMatchStatRow> = stats.iter().map(PlayerMatchStatRow::from).collect();
        let mut pooled = self.get_db_conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        conn.transaction::<_, ScoringError, _>(|conn| {
            async move {
                diesel::delete(player_match_stats::table.filter(player_match_stats::match_id.eq(match_id)))
                    .execute(conn)
                    .await?;
                if !rows.is_empty() {
                    diesel::insert_into(player_match_stats::table)
                        .values(&rows)
                        .execute(conn)
                        .await?;
                }
                Ok(())
            }
            .scope_boxed()
        })
        .await
    }

    async fn replace_player_match_stats(&self, match_id: Uuid, user_id: Uuid, stats: &[PlayerMatchStat]) -> Result<()> {
        let rows: Vec<PlayerMatchStatRow> = stats.iter().map(PlayerMatchStatRow::from).collect();
        let mut pooled = self.get_db_conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        conn.transaction::<_, ScoringError, _>(|conn| {
            async move {
                diesel::delete(
                    player_match_stats::table
                        .filter(player_match_stats::match_id.eq(match_id))
                        .filter(player_match_stats::user_id.eq(user_id)),
                )
                .execute(conn)
                .await?;
                if !rows.is_empty() {
                    diesel::insert_into(player_match_stats::table)
                        .values(&rows)
                        .execute(conn)
                        .await?;
                }
                Ok(())
            }
            .scope_boxed()
        })
        .await
    }

    async fn match_stats(&self, match_id: Uuid) -> Result<Vec<PlayerMatchStat>> {
        let mut conn = self.get_db_conn().await?;
        Ok(player_match_stats::table
            .filter(player_match_stats::match_id.eq(match_id))
            .order((player_match_stats::innings_number.asc(), player_match_stats::user_id.asc()))
            .select(PlayerMatchStatRow::as_select())
            .load::<PlayerMatchStatRow>(&mut conn)
            .await?
            .into_iter()
            .map(PlayerMatchStat::from)
            .collect())
    }

    async fn completed_match_stats(&self, user_id: Uuid) -> Result<Vec<PlayerMatchStat>> {
        let mut conn = self.get_db_conn().await?;
        Ok(player_match_stats::table
            .inner_join(matches::table)
            .filter(player_match_stats::user_id.eq(user_id))
            .filter(matches::status.eq(MatchStatus::Completed.to_string()))
            .filter(matches::deleted_at.is_null())
            .order((matches::completed_at.asc(), player_match_stats::match_id.asc(), player_match_stats::innings_number.asc()))
            .select(PlayerMatchStatRow::as_select())
            .load::<PlayerMatchStatRow>(&mut conn)
            .await?
            .into_iter()
            .map(PlayerMatchStat::from)
            .collect())
    }

    async fn upsert_career_stat(&self, stat: &PlayerOverallCricketStat) -> Result<()> {
        let row = CareerStatRow::from(stat);
        let mut conn = self.get_db_conn().await?;
        diesel::insert_into(player_overall_cricket_stats::table)
            .values(&row)
            .on_conflict(player_overall_cricket_stats::user_id)
            .do_update()
            .set(&row)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn find_career_stat(&self, user_id: Uuid) -> Result<PlayerOverallCricketStat> {
        let mut conn = self.get_db_conn().await?;
        player_overall_cricket_stats::table
            .find(user_id)
            .select(CareerStatRow::as_select())
            .first::<CareerStatRow>(&mut conn)
            .await
            .optional()?
            .map(PlayerOverallCricketStat::from)
            .ok_or_else(|| ScoringError::not_found("career stats for player", user_id))
    }

    async fn insert_tournament(&self, tournament: &Tournament) -> Result<()> {
        let mut conn = self.get_db_conn().await?;
        diesel::insert_into(tournaments::table)
            .values(&TournamentRow::from(tournament))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn find_tournament(&self, id: Uuid) -> Result<Tournament> {
        let mut conn = self.get_db_conn().await?;
        tournaments::table
            .find(id)
            .select(TournamentRow::as_select())
            .first::<TournamentRow>(&mut conn)
            .await
            .optional()?
            .ok_or_else(|| ScoringError::not_found("tournament", id))?
            .try_into()
    }

    async fn update_tournament<F>(&self, id: Uuid, change: F) -> Result<Tournament>
    where
        F: FnOnce(&mut Tournament) -> Result<()> + Send + 'static,
    {
        let mut pooled = self.get_db_conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        conn.transaction::<_, ScoringError, _>(|conn| {
            async move {
                let mut tournament = lock_tournament(conn, id).await?;
                change(&mut tournament)?;
                diesel::update(tournaments::table.find(id))
                    .set((
                        tournaments::status.eq(tournament.status.to_string()),
                        tournaments::updated_at.eq(tournament.updated_at),
                    ))
                    .execute(conn)
                    .await?;
                Ok(tournament)
            }
            .scope_boxed()
        })
        .await
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
        let mut pooled = self.get_db_conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        conn.transaction::<_, ScoringError, _>(|conn| {
            async move {
                let mut tournament = lock_tournament(conn, tournament_id).await?;
                let already = is_registered(conn, tournament_id, team_id).await?;
                let entry = register(&mut tournament, already)?;
                diesel::insert_into(tournament_teams::table)
                    .values(&entry)
                    .execute(conn)
                    .await?;
                diesel::update(tournaments::table.find(tournament_id))
                    .set((
                        tournaments::current_teams.eq(tournaments::current_teams + 1),
                        tournaments::updated_at.eq(tournament.updated_at),
                    ))
                    .execute(conn)
                    .await?;
                Ok((tournament, entry))
            }
            .scope_boxed()
        })
        .await
    }

    async fn unregister_team<F>(&self, tournament_id: Uuid, team_id: Uuid, withdraw: F) -> Result<Tournament>
    where
        F: FnOnce(&mut Tournament, bool) -> Result<()> + Send + 'static,
    {
        let mut pooled = self.get_db_conn().await?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        conn.transaction::<_, ScoringError, _>(|conn| {
            async move {
                let mut tournament = lock_tournament(conn, tournament_id).await?;
                let registered = is_registered(conn, tournament_id, team_id).await?;
                withdraw(&mut tournament, registered)?;
                diesel::delete(tournament_teams::table.find((tournament_id, team_id)))
                    .execute(conn)
                    .await?;
                diesel::update(
                    tournaments::table
                        .find(tournament_id)
                        .filter(tournaments::current_teams.gt(0)),
                )
                .set((
                    tournaments::current_teams.eq(tournaments::current_teams - 1),
                    tournaments::updated_at.eq(tournament.updated_at),
                ))
                .execute(conn)
                .await?;
                Ok(tournament)
            }
            .scope_boxed()
        })
        .await
    }

    async fn tournament_teams(&self, tournament_id: Uuid) -> Result<Vec<TournamentTeam>> {
        let mut conn = self.get_db_conn().await?;
        Ok(tournament_teams::table
            .filter(tournament_teams::tournament_id.eq(tournament_id))
            .order(tournament_teams::registered_at.asc())
            .select(TournamentTeam::as_select())
            .load::<TournamentTeam>(&mut conn)
            .await?)
    }
}
