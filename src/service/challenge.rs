use crate::model::challenge::{Challenge, NewChallengeRequest, Party};
use crate::model::error::Result;
use crate::model::fixture::MatchDraft;
use crate::repository::store::ScoringStore;
use crate::service::{Actor, ScoringService};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct AcceptedChallenge {
    pub challenge: Challenge,
    #[serde(rename = "scheduledMatch")]
    pub scheduled_match: MatchDraft,
}

/// Who answers a challenge.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ChallengeResponse {
    pub party: Party,
}

impl<S: ScoringStore + 'static> ScoringService<S> {
    pub async fn create_challenge(
        &self,
        actor: &Actor,
        request: NewChallengeRequest,
        now: DateTime<Utc>,
    ) -> Result<Challenge> {
        let matchup = request.matchup()?;
        self.act_as(matchup.sender(), actor).await?;
        let challenge = Challenge::create(request, Uuid::new_v4(), actor.user_id, now)?;
        self.store.insert_challenge(&challenge).await?;
        info!(
            "Challenge {} ({}) created by {}",
            challenge.id,
            challenge.matchup.challenge_type(),
            actor.user_id
        );
        Ok(challenge)
    }

    pub async fn find_challenge(&self, id: Uuid) -> Result<Challenge> {
        self.store.find_challenge(id).await
    }

    /// Accepts on behalf of `party` and schedules the match in the same
    /// transaction. Of two concurrent acceptances only one can succeed.
    pub async fn accept_challenge(
        &self,
        actor: &Actor,
        id: Uuid,
        party: Party,
        now: DateTime<Utc>,
    ) -> Result<AcceptedChallenge> {
        self.act_as(party, actor).await?;
        let acting_user = actor.user_id;
        let match_id = Uuid::new_v4();
        let (challenge, scheduled_match) = self
            .store
            .accept_challenge(id, move |challenge| {
                challenge.accept(party, acting_user, match_id, now)
            })
            .await?;
        info!("Challenge {id} accepted, match {match_id} scheduled");
        Ok(AcceptedChallenge {
            challenge,
            scheduled_match,
        })
    }

    pub async fn reject_challenge(
        &self,
        actor: &Actor,
        id: Uuid,
        party: Party,
        now: DateTime<Utc>,
    ) -> Result<Challenge> {
        self.act_as(party, actor).await?;
        let challenge = self
            .store
            .update_challenge(id, move |challenge| challenge.reject(party, now))
            .await?;
        info!("Challenge {id} rejected");
        Ok(challenge)
    }

    pub async fn cancel_challenge(
        &self,
        actor: &Actor,
        id: Uuid,
        party: Party,
        now: DateTime<Utc>,
    ) -> Result<Challenge> {
        self.act_as(party, actor).await?;
        let challenge = self
            .store
            .update_challenge(id, move |challenge| challenge.cancel(party, now))
            .await?;
        info!("Challenge {id} cancelled by its sender");
        Ok(challenge)
    }

    /// Expires every unanswered challenge past its deadline. Safe to run
    /// repeatedly.
    pub async fn expire_challenges(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let expired = self.store.expire_challenges(now).await?;
        if !expired.is_empty() {
            info!("Expired {} challenges", expired.len());
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::challenge::{ChallengeStatus, ChallengeType};
    use crate::model::error::ScoringError;
    use crate::model::fixture::{MatchSide, MatchStatus};
    use crate::model::team::TeamRole;
    use crate::repository::local::LocalStore;
    use chrono::Duration;

    struct Fixture {
        service: ScoringService<LocalStore>,
        home: Uuid,
        away: Uuid,
        home_captain: Actor,
        away_captain: Actor,
    }

    fn setup() -> Fixture {
        let store = LocalStore::new();
        let (home, away) = (Uuid::new_v4(), Uuid::new_v4());
        let home_captain = Actor::user(Uuid::new_v4());
        let away_captain = Actor::user(Uuid::new_v4());
        store.add_team_member(home, home_captain.user_id, TeamRole::Captain).unwrap();
        store.add_team_member(away, away_captain.user_id, TeamRole::Creator).unwrap();
        Fixture {
            service: ScoringService::new(store, 11),
            home,
            away,
            home_captain,
            away_captain,
        }
    }

    fn open_team(sender: Uuid, now: DateTime<Utc>) -> NewChallengeRequest {
        NewChallengeRequest {
            challenge_type: ChallengeType::OpenTeam,
            sender_team_id: Some(sender),
            sender_user_id: None,
            receiver_team_id: None,
            receiver_user_id: None,
            sport_id: Uuid::new_v4(),
            venue_id: None,
            proposed_at: now + Duration::days(3),
            expires_at: now + Duration::days(1),
            message: Some("Sunday morning, tape ball".to_string()),
            overs_per_innings: Some(20),
            ball_type: Some("tennis".to_string()),
            entry_fee: None,
        }
    }

    #[tokio::test]
    async fn accepted_open_challenge_schedules_a_match() {
        let f = setup();
        let now = Utc::now();
        let challenge = f
            .service
            .create_challenge(&f.home_captain, open_team(f.home, now), now)
            .await
            .unwrap();
        assert_eq!(challenge.status, ChallengeStatus::Open);

        let accepted = f
            .service
            .accept_challenge(&f.away_captain, challenge.id, Party::Team(f.away), now)
            .await
            .unwrap();
        assert_eq!(accepted.challenge.status, ChallengeStatus::Accepted);
        assert_eq!(accepted.challenge.accepted_by, Some(Party::Team(f.away)));

        let sheet = f
            .service
            .find_match(accepted.scheduled_match.fixture.id)
            .await
            .unwrap();
        assert_eq!(sheet.fixture.status, MatchStatus::Upcoming);
        assert_eq!(sheet.fixture.challenge_id, Some(challenge.id));
        assert_eq!(sheet.fixture.terms.overs_per_innings, Some(20));
        assert_eq!(sheet.team_for_side(MatchSide::Home), Some(f.home));
        assert_eq!(sheet.team_for_side(MatchSide::Away), Some(f.away));
    }

    #[tokio::test]
    async fn only_managers_answer_for_a_team() {
        let f = setup();
        let now = Utc::now();
        let challenge = f
            .service
            .create_challenge(&f.home_captain, open_team(f.home, now), now)
            .await
            .unwrap();
        let stranger = Actor::user(Uuid::new_v4());
        let err = f
            .service
            .accept_challenge(&stranger, challenge.id, Party::Team(f.away), now)
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::Forbidden(_)));

        let err = f
            .service
            .create_challenge(&f.away_captain, open_team(f.home, now), now)
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::Forbidden(_)));
    }

    #[tokio::test]
    async fn second_acceptance_is_refused() {
        let f = setup();
        let now = Utc::now();
        let third = Uuid::new_v4();
        let third_captain = Actor::user(Uuid::new_v4());
        f.service
            .store()
            .add_team_member(third, third_captain.user_id, TeamRole::Captain)
            .unwrap();
        let challenge = f
            .service
            .create_challenge(&f.home_captain, open_team(f.home, now), now)
            .await
            .unwrap();

        f.service
            .accept_challenge(&f.away_captain, challenge.id, Party::Team(f.away), now)
            .await
            .unwrap();
        let err = f
            .service
            .accept_challenge(&third_captain, challenge.id, Party::Team(third), now)
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::InvalidState { .. }));
        let stored = f.service.find_challenge(challenge.id).await.unwrap();
        assert_eq!(stored.accepted_by, Some(Party::Team(f.away)));
    }

    #[tokio::test]
    async fn sweep_expires_once() {
        let f = setup();
        let now = Utc::now();
        let challenge = f
            .service
            .create_challenge(&f.home_captain, open_team(f.home, now), now)
            .await
            .unwrap();

        let later = now + Duration::days(2);
        assert_eq!(f.service.expire_challenges(later).await.unwrap(), vec![challenge.id]);
        assert!(f.service.expire_challenges(later).await.unwrap().is_empty());

        let err = f
            .service
            .accept_challenge(&f.away_captain, challenge.id, Party::Team(f.away), later)
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn sender_withdraws_its_challenge() {
        let f = setup();
        let now = Utc::now();
        let challenge = f
            .service
            .create_challenge(&f.home_captain, open_team(f.home, now), now)
            .await
            .unwrap();
        let err = f
            .service
            .cancel_challenge(&f.away_captain, challenge.id, Party::Team(f.away), now)
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::InvalidReference(_)));

        let cancelled = f
            .service
            .cancel_challenge(&f.home_captain, challenge.id, Party::Team(f.home), now)
            .await
            .unwrap();
        assert_eq!(cancelled.status, ChallengeStatus::Cancelled);
    }
}
