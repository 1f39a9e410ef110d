use crate::model::error::{Result, ScoringError};
use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TournamentStatus {
    Draft,
    RegistrationOpen,
    RegistrationClosed,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum TournamentCommand {
    OpenRegistration,
    CloseRegistration,
    Start,
    Complete,
    Cancel,
}

impl TournamentCommand {
    fn verb(self) -> &'static str {
        match self {
            TournamentCommand::OpenRegistration => "open registration",
            TournamentCommand::CloseRegistration => "close registration",
            TournamentCommand::Start => "start",
            TournamentCommand::Complete => "be completed",
            TournamentCommand::Cancel => "be cancelled",
        }
    }
}

impl TournamentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TournamentStatus::Completed | TournamentStatus::Cancelled)
    }

    /// Whether the entry list can still shrink.
    pub fn allows_withdrawal(self) -> bool {
        matches!(
            self,
            TournamentStatus::RegistrationOpen | TournamentStatus::RegistrationClosed
        )
    }

    pub fn next(self, command: TournamentCommand) -> Option<TournamentStatus> {
        use TournamentStatus::*;
        match (self, command) {
            (Draft, TournamentCommand::OpenRegistration) => Some(RegistrationOpen),
            (RegistrationOpen, TournamentCommand::CloseRegistration) => Some(RegistrationClosed),
            (RegistrationOpen | RegistrationClosed, TournamentCommand::Start) => Some(InProgress),
            (InProgress, TournamentCommand::Complete) => Some(Completed),
            (state, TournamentCommand::Cancel) if !state.is_terminal() => Some(Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: Uuid,
    pub name: String,
    pub sport_id: Uuid,
    pub status: TournamentStatus,
    /// Zero means no limit.
    pub max_teams: i32,
    pub current_teams: i32,
    #[serde(rename = "registrationDeadline")]
    pub registration_deadline: DateTime<Utc>,
    #[serde(rename = "startsAt")]
    pub starts_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::model::schema::tournament_teams)]
pub struct TournamentTeam {
    pub tournament_id: Uuid,
    pub team_id: Uuid,
    pub registered_by: Uuid,
    #[serde(rename = "registeredAt")]
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewTournamentRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub sport_id: Uuid,
    #[validate(range(min = 0, max = 512))]
    #[serde(default)]
    pub max_teams: i32,
    pub registration_deadline: DateTime<Utc>,
    pub starts_at: Option<DateTime<Utc>>,
}

impl Tournament {
    pub fn create(
        request: NewTournamentRequest,
        id: Uuid,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Tournament> {
        request.validate()?;
        if request.registration_deadline <= now {
            return Err(ScoringError::validation(
                "registration_deadline must be in the future",
            ));
        }
        if let Some(starts_at) = request.starts_at {
            if starts_at < request.registration_deadline {
                return Err(ScoringError::validation(
                    "a tournament cannot start before registration closes",
                ));
            }
        }
        Ok(Tournament {
            id,
            name: request.name,
            sport_id: request.sport_id,
            status: TournamentStatus::Draft,
            max_teams: request.max_teams,
            current_teams: 0,
            registration_deadline: request.registration_deadline,
            starts_at: request.starts_at,
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(&mut self, command: TournamentCommand, now: DateTime<Utc>) -> Result<()> {
        self.status = self
            .status
            .next(command)
            .ok_or_else(|| ScoringError::invalid_state("tournament", self.status, command.verb()))?;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.max_teams > 0 && self.current_teams >= self.max_teams
    }

    /// Admits a team. Must run under the tournament's row lock: the checks
    /// and the counter move together or not at all.
    pub fn register(
        &mut self,
        team_id: Uuid,
        already_registered: bool,
        registered_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TournamentTeam> {
        if self.status != TournamentStatus::RegistrationOpen {
            return Err(ScoringError::NotOpen);
        }
        if now > self.registration_deadline {
            return Err(ScoringError::DeadlineExpired);
        }
        if self.is_full() {
            return Err(ScoringError::CapacityExceeded {
                max_teams: self.max_teams,
            });
        }
        if already_registered {
            return Err(ScoringError::AlreadyRegistered);
        }
        self.current_teams += 1;
        self.updated_at = now;
        Ok(TournamentTeam {
            tournament_id: self.id,
            team_id,
            registered_by,
            registered_at: now,
        })
    }

    pub fn unregister(&mut self, team_id: Uuid, registered: bool, now: DateTime<Utc>) -> Result<()> {
        if !self.status.allows_withdrawal() {
            return Err(ScoringError::NotOpen);
        }
        if !registered {
            return Err(ScoringError::not_found("registration", team_id));
        }
        if self.current_teams > 0 {
            self.current_teams -= 1;
        }
        self.updated_at = now;
        Ok(())
    }
}
