//! Orchestration of the scoring core: authority checks against the roster,
//! then the pure model transition run inside one store transaction.

use crate::config::config::Config;
use crate::model::challenge::Party;
use crate::model::error::{Result, ScoringError};
use crate::repository::store::ScoringStore;
use std::sync::Arc;
use uuid::Uuid;

pub mod challenge;
pub mod fixture;
pub mod innings;
pub mod stats;
pub mod tournament;

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl Actor {
    pub fn user(user_id: Uuid) -> Self {
        Actor {
            user_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Actor {
            user_id,
            is_admin: true,
        }
    }
}

pub struct ScoringService<S> {
    store: Arc<S>,
    default_playing_xi: i32,
}

impl<S> Clone for ScoringService<S> {
    fn clone(&self) -> Self {
        ScoringService {
            store: Arc::clone(&self.store),
            default_playing_xi: self.default_playing_xi,
        }
    }
}

impl<S: ScoringStore + 'static> ScoringService<S> {
    pub fn new(store: S, default_playing_xi: i32) -> Self {
        ScoringService {
            store: Arc::new(store),
            default_playing_xi,
        }
    }

    pub fn from_config(store: S, config: &Config) -> Self {
        Self::new(store, config.default_playing_xi)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn require_manager(&self, team_id: Uuid, actor: &Actor) -> Result<()> {
        if self.store.is_team_manager(team_id, actor.user_id).await? {
            Ok(())
        } else {
            Err(ScoringError::Forbidden(format!(
                "user {} does not manage team {team_id}",
                actor.user_id
            )))
        }
    }

    async fn manages_any(&self, teams: &[Uuid], actor: &Actor) -> Result<bool> {
        for team_id in teams {
            if self.store.is_team_manager(*team_id, actor.user_id).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Checks the caller may speak for `party`: a manager of the team, or the
    /// player themself.
    async fn act_as(&self, party: Party, actor: &Actor) -> Result<()> {
        match party {
            Party::Team(team_id) => self.require_manager(team_id, actor).await,
            Party::User(user_id) if user_id == actor.user_id => Ok(()),
            Party::User(user_id) => Err(ScoringError::Forbidden(format!(
                "user {} cannot act for player {user_id}",
                actor.user_id
            ))),
        }
    }
}
