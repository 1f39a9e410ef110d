use crate::model::error::{Result, ScoringError};
use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Upcoming,
    PreToss,
    TossDone,
    Live,
    Completed,
    Cancelled,
    Postponed,
    Forfeited,
    Abandoned,
}

impl MatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MatchStatus::Completed
                | MatchStatus::Cancelled
                | MatchStatus::Forfeited
                | MatchStatus::Abandoned
        )
    }

    /// States in which the line-ups may still change.
    pub fn is_before_start(self) -> bool {
        matches!(
            self,
            MatchStatus::Pending
                | MatchStatus::Upcoming
                | MatchStatus::PreToss
                | MatchStatus::TossDone
                | MatchStatus::Postponed
        )
    }

    /// The match status transition table. `None` means the command is not
    /// permitted from this state.
    pub fn next(self, command: &MatchCommand) -> Option<MatchStatus> {
        use MatchStatus::*;
        match (self, command) {
            (Pending, MatchCommand::Confirm) => Some(Upcoming),
            (Upcoming, MatchCommand::BeginToss) => Some(PreToss),
            (Upcoming | PreToss, MatchCommand::RecordToss { .. }) => Some(TossDone),
            // pre_toss and toss_done sit between upcoming and live
            (Upcoming | PreToss | TossDone, MatchCommand::Start) => Some(Live),
            (Live, MatchCommand::End { .. }) => Some(Completed),
            (Upcoming | PreToss | TossDone, MatchCommand::Postpone { .. }) => Some(Postponed),
            (Postponed, MatchCommand::Reschedule) => Some(Upcoming),
            (state, MatchCommand::Cancel) if !state.is_terminal() => Some(Cancelled),
            (Live, MatchCommand::Abandon) => Some(Abandoned),
            (Live, MatchCommand::Forfeit) => Some(Forfeited),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TossDecision {
    Bat,
    Bowl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchSide {
    Home,
    Away,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MatchCommand {
    Confirm,
    BeginToss,
    RecordToss {
        winner_team_id: Uuid,
        decision: TossDecision,
    },
    Start,
    End {
        winning_team_id: Uuid,
    },
    Postpone {
        scheduled_at: DateTime<Utc>,
    },
    Reschedule,
    Cancel,
    Abandon,
    Forfeit,
}

impl MatchCommand {
    pub fn verb(&self) -> &'static str {
        match self {
            MatchCommand::Confirm => "be confirmed",
            MatchCommand::BeginToss => "begin the toss",
            MatchCommand::RecordToss { .. } => "record the toss",
            MatchCommand::Start => "start",
            MatchCommand::End { .. } => "end",
            MatchCommand::Postpone { .. } => "be postponed",
            MatchCommand::Reschedule => "be rescheduled",
            MatchCommand::Cancel => "be cancelled",
            MatchCommand::Abandon => "be abandoned",
            MatchCommand::Forfeit => "be forfeited",
        }
    }

    /// Administrative overrides are only available to configured admins.
    pub fn is_override(&self) -> bool {
        matches!(self, MatchCommand::Abandon | MatchCommand::Forfeit)
    }
}

/// Playing conditions agreed for a match. Copied verbatim from a challenge
/// when the challenge is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchTerms {
    pub overs_per_innings: Option<i32>,
    pub ball_type: Option<String>,
    pub entry_fee: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toss {
    pub winner_team_id: Uuid,
    pub decision: TossDecision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub sport_id: Uuid,
    pub venue_id: Option<Uuid>,
    pub challenge_id: Option<Uuid>,
    pub status: MatchStatus,
    #[serde(rename = "scheduledAt")]
    pub scheduled_at: DateTime<Utc>,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "completedAt")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub terms: MatchTerms,
    pub toss: Option<Toss>,
    pub winning_team_id: Option<Uuid>,
    pub created_by: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchTeam {
    pub id: Uuid,
    pub match_id: Uuid,
    pub team_id: Uuid,
    pub side: MatchSide,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::model::schema::match_players)]
pub struct MatchPlayer {
    pub id: Uuid,
    pub match_id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub is_playing_xi: bool,
    pub is_substitute: bool,
    pub batting_order: Option<i32>,
    pub bowling_order: Option<i32>,
}

/// A match together with its sides, written and read as one unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchDraft {
    #[serde(rename = "match")]
    pub fixture: Match,
    pub teams: Vec<MatchTeam>,
}

/// A match with everything hanging off it that the scoring core reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchSheet {
    #[serde(rename = "match")]
    pub fixture: Match,
    pub teams: Vec<MatchTeam>,
    pub players: Vec<MatchPlayer>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMatchRequest {
    pub home_team_id: Uuid,
    pub away_team_id: Uuid,
    pub sport_id: Uuid,
    pub venue_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    #[validate(range(min = 1, max = 50))]
    pub overs_per_innings: Option<i32>,
    #[validate(length(min = 1, max = 32))]
    pub ball_type: Option<String>,
    #[validate(range(min = 0))]
    pub entry_fee: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SquadPlayerRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub is_playing_xi: bool,
    #[serde(default)]
    pub is_substitute: bool,
    #[validate(range(min = 1, max = 11))]
    pub batting_order: Option<i32>,
    #[validate(range(min = 1, max = 11))]
    pub bowling_order: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SquadRequest {
    pub team_id: Uuid,
    #[validate(length(min = 1, max = 30))]
    pub players: Vec<SquadPlayerRequest>,
}

impl Match {
    /// A match arranged directly between two teams. It waits in `pending`
    /// until the away side confirms.
    pub fn arrange(
        request: NewMatchRequest,
        id: Uuid,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<MatchDraft> {
        request.validate()?;
        if request.home_team_id == request.away_team_id {
            return Err(ScoringError::validation("a team cannot play itself"));
        }
        if request.scheduled_at <= now {
            return Err(ScoringError::validation("scheduled_at must be in the future"));
        }
        let fixture = Match {
            id,
            sport_id: request.sport_id,
            venue_id: request.venue_id,
            challenge_id: None,
            status: MatchStatus::Pending,
            scheduled_at: request.scheduled_at,
            started_at: None,
            completed_at: None,
            terms: MatchTerms {
                overs_per_innings: request.overs_per_innings,
                ball_type: request.ball_type,
                entry_fee: request.entry_fee,
            },
            toss: None,
            winning_team_id: None,
            created_by,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        let teams = vec![
            MatchTeam::new(id, request.home_team_id, MatchSide::Home, now),
            MatchTeam::new(id, request.away_team_id, MatchSide::Away, now),
        ];
        Ok(MatchDraft { fixture, teams })
    }

    /// Applies one command through the transition table. Payloads are
    /// checked before anything is written so a rejected command leaves the
    /// match untouched.
    pub fn apply(
        &mut self,
        command: &MatchCommand,
        teams: &[MatchTeam],
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.deleted_at.is_some() {
            return Err(ScoringError::invalid_state("match", "removed", command.verb()));
        }
        let next = self
            .status
            .next(command)
            .ok_or_else(|| ScoringError::invalid_state("match", self.status, command.verb()))?;

        match command {
            MatchCommand::RecordToss { winner_team_id, .. } => {
                ensure_match_team(teams, *winner_team_id, "toss winner")?;
            }
            MatchCommand::End { winning_team_id } => {
                ensure_match_team(teams, *winning_team_id, "winning team")?;
            }
            MatchCommand::Postpone { scheduled_at } if *scheduled_at <= now => {
                return Err(ScoringError::validation(
                    "a postponed match needs a new time in the future",
                ));
            }
            _ => {}
        }

        match command {
            MatchCommand::RecordToss {
                winner_team_id,
                decision,
            } => {
                self.toss = Some(Toss {
                    winner_team_id: *winner_team_id,
                    decision: *decision,
                });
            }
            MatchCommand::Start => self.started_at = Some(now),
            MatchCommand::End { winning_team_id } => {
                self.winning_team_id = Some(*winning_team_id);
                self.completed_at = Some(now);
            }
            MatchCommand::Postpone { scheduled_at } => self.scheduled_at = *scheduled_at,
            _ => {}
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Soft removal. A match that ever went live is part of the scoring
    /// record and stays.
    pub fn remove(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.deleted_at.is_some() {
            return Err(ScoringError::not_found("match", self.id));
        }
        if self.started_at.is_some() || self.status == MatchStatus::Completed {
            return Err(ScoringError::invalid_state("match", self.status, "be removed"));
        }
        self.deleted_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

impl MatchTeam {
    pub fn new(match_id: Uuid, team_id: Uuid, side: MatchSide, now: DateTime<Utc>) -> Self {
        MatchTeam {
            id: Uuid::new_v4(),
            match_id,
            team_id,
            side,
            created_at: now,
        }
    }
}

fn ensure_match_team(teams: &[MatchTeam], team_id: Uuid, what: &str) -> Result<()> {
    if teams.iter().any(|t| t.team_id == team_id) {
        Ok(())
    } else {
        Err(ScoringError::InvalidReference(format!(
            "{what} {team_id} is not playing in this match"
        )))
    }
}

impl MatchSheet {
    pub fn has_team(&self, team_id: Uuid) -> bool {
        self.teams.iter().any(|t| t.team_id == team_id)
    }

    pub fn team_for_side(&self, side: MatchSide) -> Option<Uuid> {
        self.teams.iter().find(|t| t.side == side).map(|t| t.team_id)
    }

    /// Everyone named for a team, substitutes included.
    pub fn squad(&self, team_id: Uuid) -> Vec<Uuid> {
        self.players
            .iter()
            .filter(|p| p.team_id == team_id)
            .map(|p| p.user_id)
            .collect()
    }

    pub fn playing_xi_count(&self, team_id: Uuid) -> usize {
        self.players
            .iter()
            .filter(|p| p.team_id == team_id && p.is_playing_xi)
            .count()
    }

    /// Builds the replacement squad for one side. Roster membership is
    /// checked by the caller against the team service before this runs.
    pub fn select_squad(&self, request: &SquadRequest, playing_xi_limit: usize) -> Result<Vec<MatchPlayer>> {
        request.validate()?;
        for player in &request.players {
            player.validate()?;
        }
        if !self.fixture.status.is_before_start() {
            return Err(ScoringError::invalid_state(
                "match",
                self.fixture.status,
                "change its squads",
            ));
        }
        ensure_match_team(&self.teams, request.team_id, "team")?;

        let mut seen = HashSet::new();
        let mut batting_slots = HashSet::new();
        let mut playing_xi = 0;
        for player in &request.players {
            if !seen.insert(player.user_id) {
                return Err(ScoringError::validation(format!(
                    "player {} is listed twice",
                    player.user_id
                )));
            }
            if player.is_playing_xi && player.is_substitute {
                return Err(ScoringError::validation(format!(
                    "player {} cannot be both in the playing XI and a substitute",
                    player.user_id
                )));
            }
            if let Some(slot) = player.batting_order {
                if !batting_slots.insert(slot) {
                    return Err(ScoringError::validation(format!(
                        "batting order position {slot} is taken twice"
                    )));
                }
            }
            if player.is_playing_xi {
                playing_xi += 1;
            }
        }
        if playing_xi > playing_xi_limit {
            return Err(ScoringError::validation(format!(
                "at most {playing_xi_limit} players can be in the playing XI"
            )));
        }

        Ok(request
            .players
            .iter()
            .map(|p| MatchPlayer {
                id: Uuid::new_v4(),
                match_id: self.fixture.id,
                team_id: request.team_id,
                user_id: p.user_id,
                is_playing_xi: p.is_playing_xi,
                is_substitute: p.is_substitute,
                batting_order: p.batting_order,
                bowling_order: p.bowling_order,
            })
            .collect())
    }
}
