//! Diesel row structs and their conversions to and from the domain types.
//! Enum columns are stored as their snake_case names.

use crate::model::challenge::{Challenge, ChallengeType, Matchup, MatchupColumns, Party};
use crate::model::error::{Result, ScoringError};
use crate::model::fixture::{Match, MatchTeam, MatchTerms, Toss};
use crate::model::innings::{BallDelivery, Extras, Inning, InningTotals};
use crate::model::schema::{
    ball_deliveries, challenges, innings, match_teams, matches, player_match_stats,
    player_overall_cricket_stats, tournaments,
};
use crate::model::stats::{
    BattingFigures, BestBowling, BowlingFigures, FieldingFigures, PlayerMatchStat,
    PlayerOverallCricketStat,
};
use crate::model::tournament::Tournament;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::str::FromStr;
use uuid::Uuid;

pub fn parse_column<T: FromStr>(column: &'static str, value: &str) -> Result<T> {
    value.parse().map_err(|_| ScoringError::CorruptRow {
        column,
        value: value.to_string(),
    })
}

fn parse_optional<T: FromStr>(column: &'static str, value: Option<&str>) -> Result<Option<T>> {
    value.map(|v| parse_column(column, v)).transpose()
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = challenges, treat_none_as_null = true)]
pub struct ChallengeRow {
    pub id: Uuid,
    pub challenge_type: String,
    pub status: String,
    pub sender_team_id: Option<Uuid>,
    pub sender_user_id: Option<Uuid>,
    pub receiver_team_id: Option<Uuid>,
    pub receiver_user_id: Option<Uuid>,
    pub sport_id: Uuid,
    pub venue_id: Option<Uuid>,
    pub proposed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub message: Option<String>,
    pub overs_per_innings: Option<i32>,
    pub ball_type: Option<String>,
    pub entry_fee: Option<i32>,
    pub accepted_by_team_id: Option<Uuid>,
    pub accepted_by_user_id: Option<Uuid>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub scheduled_match_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Challenge> for ChallengeRow {
    fn from(c: &Challenge) -> Self {
        let columns = c.matchup.columns();
        ChallengeRow {
            id: c.id,
            challenge_type: c.matchup.challenge_type().to_string(),
            status: c.status.to_string(),
            sender_team_id: columns.sender_team_id,
            sender_user_id: columns.sender_user_id,
            receiver_team_id: columns.receiver_team_id,
            receiver_user_id: columns.receiver_user_id,
            sport_id: c.sport_id,
            venue_id: c.venue_id,
            proposed_at: c.proposed_at,
            expires_at: c.expires_at,
            message: c.message.clone(),
            overs_per_innings: c.terms.overs_per_innings,
            ball_type: c.terms.ball_type.clone(),
            entry_fee: c.terms.entry_fee,
            accepted_by_team_id: c.accepted_by.and_then(Party::team_id),
            accepted_by_user_id: c.accepted_by.and_then(Party::user_id),
            accepted_at: c.accepted_at,
            responded_at: c.responded_at,
            scheduled_match_id: c.scheduled_match_id,
            created_by: c.created_by,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

impl TryFrom<ChallengeRow> for Challenge {
    type Error = ScoringError;

    fn try_from(row: ChallengeRow) -> Result<Self> {
        let kind: ChallengeType = parse_column("challenges.challenge_type", &row.challenge_type)?;
        let matchup = Matchup::from_columns(
            kind,
            MatchupColumns {
                sender_team_id: row.sender_team_id,
                sender_user_id: row.sender_user_id,
                receiver_team_id: row.receiver_team_id,
                receiver_user_id: row.receiver_user_id,
            },
        )
        .map_err(|_| ScoringError::CorruptRow {
            column: "challenges.sender",
            value: row.id.to_string(),
        })?;
        let accepted_by = match (row.accepted_by_team_id, row.accepted_by_user_id) {
            (Some(team), _) => Some(Party::Team(team)),
            (None, Some(user)) => Some(Party::User(user)),
            (None, None) => None,
        };
        Ok(Challenge {
            id: row.id,
            matchup,
            status: parse_column("challenges.status", &row.status)?,
            sport_id: row.sport_id,
            venue_id: row.venue_id,
            proposed_at: row.proposed_at,
            expires_at: row.expires_at,
            message: row.message,
            terms: MatchTerms {
                overs_per_innings: row.overs_per_innings,
                ball_type: row.ball_type,
                entry_fee: row.entry_fee,
            },
            accepted_by,
            accepted_at: row.accepted_at,
            responded_at: row.responded_at,
            scheduled_match_id: row.scheduled_match_id,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = matches, treat_none_as_null = true)]
pub struct MatchRow {
    pub id: Uuid,
    pub sport_id: Uuid,
    pub venue_id: Option<Uuid>,
    pub challenge_id: Option<Uuid>,
    pub status: String,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub overs_per_innings: Option<i32>,
    pub ball_type: Option<String>,
    pub entry_fee: Option<i32>,
    pub toss_winner_team_id: Option<Uuid>,
    pub toss_decision: Option<String>,
    pub winning_team_id: Option<Uuid>,
    pub created_by: Uuid,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Match> for MatchRow {
    fn from(m: &Match) -> Self {
        MatchRow {
            id: m.id,
            sport_id: m.sport_id,
            venue_id: m.venue_id,
            challenge_id: m.challenge_id,
            status: m.status.to_string(),
            scheduled_at: m.scheduled_at,
            started_at: m.started_at,
            completed_at: m.completed_at,
            overs_per_innings: m.terms.overs_per_innings,
            ball_type: m.terms.ball_type.clone(),
            entry_fee: m.terms.entry_fee,
            toss_winner_team_id: m.toss.map(|t| t.winner_team_id),
            toss_decision: m.toss.map(|t| t.decision.to_string()),
            winning_team_id: m.winning_team_id,
            created_by: m.created_by,
            deleted_at: m.deleted_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

impl TryFrom<MatchRow> for Match {
    type Error = ScoringError;

    fn try_from(row: MatchRow) -> Result<Self> {
        let toss = match row.toss_winner_team_id {
            Some(winner_team_id) => {
                let decision = parse_optional("matches.toss_decision", row.toss_decision.as_deref())?
                    .ok_or_else(|| ScoringError::CorruptRow {
                        column: "matches.toss_decision",
                        value: String::new(),
                    })?;
                Some(Toss {
                    winner_team_id,
                    decision,
                })
            }
            None => None,
        };
        Ok(Match {
            id: row.id,
            sport_id: row.sport_id,
            venue_id: row.venue_id,
            challenge_id: row.challenge_id,
            status: parse_column("matches.status", &row.status)?,
            scheduled_at: row.scheduled_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            terms: MatchTerms {
                overs_per_innings: row.overs_per_innings,
                ball_type: row.ball_type,
                entry_fee: row.entry_fee,
            },
            toss,
            winning_team_id: row.winning_team_id,
            created_by: row.created_by,
            deleted_at: row.deleted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = match_teams)]
pub struct MatchTeamRow {
    pub id: Uuid,
    pub match_id: Uuid,
    pub team_id: Uuid,
    pub side: String,
    pub created_at: DateTime<Utc>,
}

impl From<&MatchTeam> for MatchTeamRow {
    fn from(t: &MatchTeam) -> Self {
        MatchTeamRow {
            id: t.id,
            match_id: t.match_id,
            team_id: t.team_id,
            side: t.side.to_string(),
            created_at: t.created_at,
        }
    }
}

impl TryFrom<MatchTeamRow> for MatchTeam {
    type Error = ScoringError;

    fn try_from(row: MatchTeamRow) -> Result<Self> {
        Ok(MatchTeam {
            id: row.id,
            match_id: row.match_id,
            team_id: row.team_id,
            side: parse_column("match_teams.side", &row.side)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = innings, treat_none_as_null = true)]
pub struct InningRow {
    pub id: Uuid,
    pub match_id: Uuid,
    pub innings_number: i32,
    pub batting_team_id: Uuid,
    pub bowling_team_id: Uuid,
    pub status: String,
    pub score: i32,
    pub wickets: i32,
    pub balls: i32,
    pub wides: i32,
    pub no_balls: i32,
    pub byes: i32,
    pub leg_byes: i32,
    pub penalty: i32,
    pub target: Option<i32>,
    pub max_overs: Option<i32>,
    pub eligible_batters: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Inning> for InningRow {
    fn from(i: &Inning) -> Self {
        let extras = i.totals.extras;
        InningRow {
            id: i.id,
            match_id: i.match_id,
            innings_number: i.innings_number,
            batting_team_id: i.batting_team_id,
            bowling_team_id: i.bowling_team_id,
            status: i.status.to_string(),
            score: i.totals.score,
            wickets: i.totals.wickets,
            balls: i.totals.balls,
            wides: extras.wides,
            no_balls: extras.no_balls,
            byes: extras.byes,
            leg_byes: extras.leg_byes,
            penalty: extras.penalty,
            target: i.target,
            max_overs: i.max_overs,
            eligible_batters: i.eligible_batters,
            started_at: i.started_at,
            completed_at: i.completed_at,
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}

impl TryFrom<InningRow> for Inning {
    type Error = ScoringError;

    fn try_from(row: InningRow) -> Result<Self> {
        Ok(Inning {
            id: row.id,
            match_id: row.match_id,
            innings_number: row.innings_number,
            batting_team_id: row.batting_team_id,
            bowling_team_id: row.bowling_team_id,
            status: parse_column("innings.status", &row.status)?,
            totals: InningTotals {
                score: row.score,
                wickets: row.wickets,
                balls: row.balls,
                extras: Extras {
                    wides: row.wides,
                    no_balls: row.no_balls,
                    byes: row.byes,
                    leg_byes: row.leg_byes,
                    penalty: row.penalty,
                },
            },
            target: row.target,
            max_overs: row.max_overs,
            eligible_batters: row.eligible_batters,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = ball_deliveries)]
pub struct DeliveryRow {
    pub id: Uuid,
    pub inning_id: Uuid,
    pub sequence: i32,
    pub over_number: i32,
    pub ball_number: i32,
    pub delivery_in_over: i32,
    pub bowler_id: Uuid,
    pub striker_id: Uuid,
    pub non_striker_id: Uuid,
    pub runs_scored: i32,
    pub is_four: bool,
    pub is_six: bool,
    pub is_wicket: bool,
    pub dismissal_type: Option<String>,
    pub player_out_id: Option<Uuid>,
    pub fielder1_id: Option<Uuid>,
    pub fielder2_id: Option<Uuid>,
    pub is_extra: bool,
    pub extra_type: Option<String>,
    pub extra_runs: i32,
    pub is_legal_delivery: bool,
    pub commentary: Option<String>,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<&BallDelivery> for DeliveryRow {
    fn from(d: &BallDelivery) -> Self {
        DeliveryRow {
            id: d.id,
            inning_id: d.inning_id,
            sequence: d.sequence,
            over_number: d.over_number,
            ball_number: d.ball_number,
            delivery_in_over: d.delivery_in_over,
            bowler_id: d.bowler_id,
            striker_id: d.striker_id,
            non_striker_id: d.non_striker_id,
            runs_scored: d.runs_scored,
            is_four: d.is_four,
            is_six: d.is_six,
            is_wicket: d.is_wicket,
            dismissal_type: d.dismissal_type.map(|t| t.to_string()),
            player_out_id: d.player_out_id,
            fielder1_id: d.fielder1_id,
            fielder2_id: d.fielder2_id,
            is_extra: d.is_extra,
            extra_type: d.extra_type.map(|t| t.to_string()),
            extra_runs: d.extra_runs,
            is_legal_delivery: d.is_legal_delivery,
            commentary: d.commentary.clone(),
            recorded_by: d.recorded_by,
            created_at: d.created_at,
        }
    }
}

impl TryFrom<DeliveryRow> for BallDelivery {
    type Error = ScoringError;

    fn try_from(row: DeliveryRow) -> Result<Self> {
        Ok(BallDelivery {
            id: row.id,
            inning_id: row.inning_id,
            sequence: row.sequence,
            over_number: row.over_number,
            ball_number: row.ball_number,
            delivery_in_over: row.delivery_in_over,
            bowler_id: row.bowler_id,
            striker_id: row.striker_id,
            non_striker_id: row.non_striker_id,
            runs_scored: row.runs_scored,
            is_four: row.is_four,
            is_six: row.is_six,
            is_wicket: row.is_wicket,
            dismissal_type: parse_optional("ball_deliveries.dismissal_type", row.dismissal_type.as_deref())?,
            player_out_id: row.player_out_id,
            fielder1_id: row.fielder1_id,
            fielder2_id: row.fielder2_id,
            is_extra: row.is_extra,
            extra_type: parse_optional("ball_deliveries.extra_type", row.extra_type.as_deref())?,
            extra_runs: row.extra_runs,
            is_legal_delivery: row.is_legal_delivery,
            commentary: row.commentary,
            recorded_by: row.recorded_by,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = player_match_stats)]
pub struct PlayerMatchStatRow {
    pub match_id: Uuid,
    pub user_id: Uuid,
    pub innings_number: i32,
    pub innings_batted: i32,
    pub runs: i32,
    pub balls_faced: i32,
    pub fours: i32,
    pub sixes: i32,
    pub dismissals: i32,
    pub highest_score: i32,
    pub fifties: i32,
    pub hundreds: i32,
    pub strike_rate: f64,
    pub balls_bowled: i32,
    pub runs_conceded: i32,
    pub wickets: i32,
    pub maidens: i32,
    pub wides: i32,
    pub no_balls: i32,
    pub economy: f64,
    pub catches: i32,
    pub stumpings: i32,
    pub run_outs: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<&PlayerMatchStat> for PlayerMatchStatRow {
    fn from(s: &PlayerMatchStat) -> Self {
        let (bat, bowl, field) = (&s.batting, &s.bowling, &s.fielding);
        PlayerMatchStatRow {
            match_id: s.match_id,
            user_id: s.user_id,
            innings_number: s.innings_number,
            innings_batted: bat.innings,
            runs: bat.runs,
            balls_faced: bat.balls_faced,
            fours: bat.fours,
            sixes: bat.sixes,
            dismissals: bat.dismissals,
            highest_score: bat.highest,
            fifties: bat.fifties,
            hundreds: bat.hundreds,
            strike_rate: bat.strike_rate,
            balls_bowled: bowl.balls,
            runs_conceded: bowl.runs_conceded,
            wickets: bowl.wickets,
            maidens: bowl.maidens,
            wides: bowl.wides,
            no_balls: bowl.no_balls,
            economy: bowl.economy,
            catches: field.catches,
            stumpings: field.stumpings,
            run_outs: field.run_outs,
            updated_at: s.updated_at,
        }
    }
}

impl From<PlayerMatchStatRow> for PlayerMatchStat {
    fn from(row: PlayerMatchStatRow) -> Self {
        PlayerMatchStat {
            match_id: row.match_id,
            user_id: row.user_id,
            innings_number: row.innings_number,
            batting: BattingFigures {
                innings: row.innings_batted,
                runs: row.runs,
                balls_faced: row.balls_faced,
                fours: row.fours,
                sixes: row.sixes,
                dismissals: row.dismissals,
                highest: row.highest_score,
                fifties: row.fifties,
                hundreds: row.hundreds,
                strike_rate: row.strike_rate,
            },
            bowling: BowlingFigures {
                balls: row.balls_bowled,
                runs_conceded: row.runs_conceded,
                wickets: row.wickets,
                maidens: row.maidens,
                wides: row.wides,
                no_balls: row.no_balls,
                economy: row.economy,
            },
            fielding: FieldingFigures {
                catches: row.catches,
                stumpings: row.stumpings,
                run_outs: row.run_outs,
            },
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = player_overall_cricket_stats, treat_none_as_null = true)]
pub struct CareerStatRow {
    pub user_id: Uuid,
    pub matches: i32,
    pub batting_innings: i32,
    pub not_outs: i32,
    pub runs: i32,
    pub balls_faced: i32,
    pub fours: i32,
    pub sixes: i32,
    pub highest_score: i32,
    pub fifties: i32,
    pub hundreds: i32,
    pub batting_average: Option<f64>,
    pub strike_rate: f64,
    pub balls_bowled: i32,
    pub runs_conceded: i32,
    pub wickets: i32,
    pub maidens: i32,
    pub best_bowling_wickets: Option<i32>,
    pub best_bowling_runs: Option<i32>,
    pub bowling_average: Option<f64>,
    pub economy: f64,
    pub catches: i32,
    pub stumpings: i32,
    pub run_outs: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<&PlayerOverallCricketStat> for CareerStatRow {
    fn from(s: &PlayerOverallCricketStat) -> Self {
        CareerStatRow {
            user_id: s.user_id,
            matches: s.matches,
            batting_innings: s.batting_innings,
            not_outs: s.not_outs,
            runs: s.runs,
            balls_faced: s.balls_faced,
            fours: s.fours,
            sixes: s.sixes,
            highest_score: s.highest_score,
            fifties: s.fifties,
            hundreds: s.hundreds,
            batting_average: s.batting_average,
            strike_rate: s.strike_rate,
            balls_bowled: s.balls_bowled,
            runs_conceded: s.runs_conceded,
            wickets: s.wickets,
            maidens: s.maidens,
            best_bowling_wickets: s.best_bowling.map(|b| b.wickets),
            best_bowling_runs: s.best_bowling.map(|b| b.runs),
            bowling_average: s.bowling_average,
            economy: s.economy,
            catches: s.catches,
            stumpings: s.stumpings,
            run_outs: s.run_outs,
            updated_at: s.updated_at,
        }
    }
}

impl From<CareerStatRow> for PlayerOverallCricketStat {
    fn from(row: CareerStatRow) -> Self {
        let best_bowling = match (row.best_bowling_wickets, row.best_bowling_runs) {
            (Some(wickets), Some(runs)) => Some(BestBowling { wickets, runs }),
            _ => None,
        };
        PlayerOverallCricketStat {
            user_id: row.user_id,
            matches: row.matches,
            batting_innings: row.batting_innings,
            not_outs: row.not_outs,
            runs: row.runs,
            balls_faced: row.balls_faced,
            fours: row.fours,
            sixes: row.sixes,
            highest_score: row.highest_score,
            fifties: row.fifties,
            hundreds: row.hundreds,
            batting_average: row.batting_average,
            strike_rate: row.strike_rate,
            balls_bowled: row.balls_bowled,
            runs_conceded: row.runs_conceded,
            wickets: row.wickets,
            maidens: row.maidens,
            best_bowling,
            bowling_average: row.bowling_average,
            economy: row.economy,
            catches: row.catches,
            stumpings: row.stumpings,
            run_outs: row.run_outs,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = tournaments, treat_none_as_null = true)]
pub struct TournamentRow {
    pub id: Uuid,
    pub name: String,
    pub sport_id: Uuid,
    pub status: String,
    pub max_teams: i32,
    pub current_teams: i32,
    pub registration_deadline: DateTime<Utc>,
    pub starts_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Tournament> for TournamentRow {
    fn from(t: &Tournament) -> Self {
        TournamentRow {
            id: t.id,
            name: t.name.clone(),
            sport_id: t.sport_id,
            status: t.status.to_string(),
            max_teams: t.max_teams,
            current_teams: t.current_teams,
            registration_deadline: t.registration_deadline,
            starts_at: t.starts_at,
            created_by: t.created_by,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

impl TryFrom<TournamentRow> for Tournament {
    type Error = ScoringError;

    fn try_from(row: TournamentRow) -> Result<Self> {
        Ok(Tournament {
            id: row.id,
            name: row.name,
            sport_id: row.sport_id,
            status: parse_column("tournaments.status", &row.status)?,
            max_teams: row.max_teams,
            current_teams: row.current_teams,
            registration_deadline: row.registration_deadline,
            starts_at: row.starts_at,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
