use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScoringError>;

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{entity} cannot {action} while {state}")]
    InvalidState {
        entity: &'static str,
        state: String,
        action: &'static str,
    },
    #[error("invalid reference: {0}")]
    InvalidReference(String),
    #[error("delivery out of order: {0}")]
    Ordering(String),
    #[error("tournament is not open for registration")]
    NotOpen,
    #[error("tournament registration deadline has passed")]
    DeadlineExpired,
    #[error("tournament is full ({max_teams} teams)")]
    CapacityExceeded { max_teams: i32 },
    #[error("team is already registered for this tournament")]
    AlreadyRegistered,
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("transaction aborted by a concurrent update, retry the request")]
    ConcurrencyConflict,
    #[error("not allowed: {0}")]
    Forbidden(String),
    #[error("stored {column} value '{value}' is not recognised")]
    CorruptRow { column: &'static str, value: String },
    #[error("database error: {0}")]
    Database(DieselError),
    #[error("could not get database connection from pool: {0}")]
    Pool(String),
}

impl ScoringError {
    pub fn invalid_state(entity: &'static str, state: impl ToString, action: &'static str) -> Self {
        ScoringError::InvalidState {
            entity,
            state: state.to_string(),
            action,
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ScoringError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ScoringError::Validation(message.into())
    }
}

impl From<DieselError> for ScoringError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => ScoringError::not_found("row", "requested"),
            DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
                ScoringError::ConcurrencyConflict
            }
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info) => {
                match info.constraint_name() {
                    Some("ball_deliveries_inning_sequence_key") => ScoringError::Ordering(
                        "another delivery was recorded at the same position".to_string(),
                    ),
                    Some("tournament_teams_pkey") => ScoringError::AlreadyRegistered,
                    _ => ScoringError::Database(err),
                }
            }
            // deadlock_detected
            DieselError::DatabaseError(DatabaseErrorKind::Unknown, ref info)
                if info.message().contains("deadlock") =>
            {
                ScoringError::ConcurrencyConflict
            }
            other => ScoringError::Database(other),
        }
    }
}

impl From<validator::ValidationErrors> for ScoringError {
    fn from(errs: validator::ValidationErrors) -> Self {
        ScoringError::Validation(errs.to_string())
    }
}
