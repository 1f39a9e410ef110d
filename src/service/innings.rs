use crate::model::error::{Result, ScoringError};
use crate::model::innings::{
    DeliveryInput, Inning, InningCommand, InningLedger, OpenInningsRequest, RecordedDelivery,
};
use crate::repository::store::ScoringStore;
use crate::service::{Actor, ScoringService};
use chrono::{DateTime, Utc};
use log::{info, warn};
use uuid::Uuid;

impl<S: ScoringStore + 'static> ScoringService<S> {
    pub async fn open_innings(
        &self,
        actor: &Actor,
        match_id: Uuid,
        request: OpenInningsRequest,
        now: DateTime<Utc>,
    ) -> Result<Inning> {
        let sheet = self.store.find_match(match_id).await?;
        self.authorize_match_manager(&sheet, actor).await?;
        let default_playing_xi = self.default_playing_xi;
        let id = Uuid::new_v4();
        let inning = self
            .store
            .open_inning(match_id, move |sheet, previous| {
                Inning::open(sheet, previous, &request, default_playing_xi, id, now)
            })
            .await?;
        info!(
            "Innings {} of match {match_id} opened, team {} batting",
            inning.innings_number, inning.batting_team_id
        );
        Ok(inning)
    }

    pub async fn match_innings(&self, match_id: Uuid) -> Result<Vec<Inning>> {
        self.store.match_innings(match_id).await
    }

    pub async fn scorecard(&self, inning_id: Uuid) -> Result<InningLedger> {
        self.store.find_ledger(inning_id).await
    }

    /// Appends the next ball. Concurrent scorers are serialised on the
    /// innings; the loser sees `Ordering` and must refresh.
    pub async fn record_delivery(
        &self,
        actor: &Actor,
        inning_id: Uuid,
        input: DeliveryInput,
        now: DateTime<Utc>,
    ) -> Result<RecordedDelivery> {
        let inning = self.store.find_inning(inning_id).await?;
        self.authorize_scorer(&inning, actor).await?;
        let recorded_by = actor.user_id;
        let delivery_id = Uuid::new_v4();
        let recorded = self
            .store
            .record_delivery(inning_id, move |ledger| {
                ledger.record(input, delivery_id, recorded_by, now)
            })
            .await
            .map_err(|err| {
                if let ScoringError::Ordering(reason) = &err {
                    warn!("Delivery for innings {inning_id} rejected: {reason}");
                }
                err
            })?;
        info!(
            "Innings {inning_id}: ball {} ({} runs{})",
            recorded.delivery.ball_label(),
            recorded.delivery.total_runs(),
            if recorded.delivery.is_wicket { ", wicket" } else { "" }
        );
        Ok(recorded)
    }

    /// Closes an innings by hand. Innings start with their first ball, so
    /// `start` is not accepted here.
    pub async fn apply_inning_command(
        &self,
        actor: &Actor,
        inning_id: Uuid,
        command: InningCommand,
        now: DateTime<Utc>,
    ) -> Result<Inning> {
        if command == InningCommand::Start {
            return Err(ScoringError::validation(
                "an innings starts when its first delivery is recorded",
            ));
        }
        let inning = self.store.find_inning(inning_id).await?;
        self.authorize_scorer(&inning, actor).await?;
        let inning = self
            .store
            .update_inning(inning_id, move |inning| inning.apply(command, now))
            .await?;
        info!("Innings {inning_id} is now {}", inning.status);
        Ok(inning)
    }

    /// Recomputes the innings figures from its deliveries and stores them.
    pub async fn rebuild_innings(&self, actor: &Actor, inning_id: Uuid) -> Result<InningLedger> {
        let inning = self.store.find_inning(inning_id).await?;
        self.authorize_scorer(&inning, actor).await?;
        let (ledger, drifted) = self.store.rebuild_inning(inning_id).await?;
        if drifted {
            warn!("Innings {inning_id} figures did not match its deliveries and were rebuilt");
        }
        Ok(ledger)
    }

    async fn authorize_scorer(&self, inning: &Inning, actor: &Actor) -> Result<()> {
        if actor.is_admin
            || self
                .manages_any(&[inning.batting_team_id, inning.bowling_team_id], actor)
                .await?
        {
            Ok(())
        } else {
            Err(ScoringError::Forbidden(format!(
                "user {} cannot score innings {}",
                actor.user_id, inning.id
            )))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::fixture::{MatchCommand, NewMatchRequest};
    use crate::model::innings::tests::{ball, bowled, side, Side};
    use crate::model::innings::InningStatus;
    use crate::model::team::TeamRole;
    use crate::repository::local::LocalStore;
    use chrono::Duration;

    pub(crate) struct LiveMatch {
        pub service: ScoringService<LocalStore>,
        pub match_id: Uuid,
        pub home: Uuid,
        pub away: Uuid,
        pub scorer: Actor,
    }

    /// A live two-team match whose home captain also manages the away side,
    /// so one actor can score both innings.
    pub(crate) async fn live_match(overs: Option<i32>) -> LiveMatch {
        let store = LocalStore::new();
        let (home, away) = (Uuid::new_v4(), Uuid::new_v4());
        let scorer = Actor::user(Uuid::new_v4());
        store.add_team_member(home, scorer.user_id, TeamRole::Captain).unwrap();
        store.add_team_member(away, scorer.user_id, TeamRole::Moderator).unwrap();
        let service = ScoringService::new(store, 11);
        let now = Utc::now();
        let draft = service
            .create_match(
                &scorer,
                NewMatchRequest {
                    home_team_id: home,
                    away_team_id: away,
                    sport_id: Uuid::new_v4(),
                    venue_id: None,
                    scheduled_at: now + Duration::hours(2),
                    overs_per_innings: overs,
                    ball_type: None,
                    entry_fee: None,
                },
                now,
            )
            .await
            .unwrap();
        let match_id = draft.fixture.id;
        for command in [MatchCommand::Confirm, MatchCommand::Start] {
            service
                .apply_match_command(&scorer, match_id, command, now)
                .await
                .unwrap();
        }
        LiveMatch {
            service,
            match_id,
            home,
            away,
            scorer,
        }
    }

    pub(crate) async fn open(m: &LiveMatch, batting: Uuid, bowling: Uuid) -> Inning {
        m.service
            .open_innings(
                &m.scorer,
                m.match_id,
                OpenInningsRequest {
                    batting_team_id: batting,
                    bowling_team_id: bowling,
                    target: None,
                },
                Utc::now(),
            )
            .await
            .unwrap()
    }

    pub(crate) async fn bowl(m: &LiveMatch, inning_id: Uuid, input: DeliveryInput) -> Result<RecordedDelivery> {
        m.service
            .record_delivery(&m.scorer, inning_id, input, Utc::now())
            .await
    }

    #[tokio::test]
    async fn first_ball_starts_the_innings() {
        let m = live_match(Some(20)).await;
        let inning = open(&m, m.home, m.away).await;
        assert_eq!(inning.status, InningStatus::NotStarted);

        let s = side();
        bowl(&m, inning.id, ball(&s, 2)).await.unwrap();
        let card = m.service.scorecard(inning.id).await.unwrap();
        assert_eq!(card.inning.status, InningStatus::InProgress);
        assert_eq!(card.inning.totals.score, 2);
        assert_eq!(card.deliveries.len(), 1);
    }

    #[tokio::test]
    async fn ended_match_refuses_deliveries() {
        let m = live_match(None).await;
        let inning = open(&m, m.home, m.away).await;
        let s = side();
        bowl(&m, inning.id, ball(&s, 1)).await.unwrap();
        m.service
            .apply_match_command(&m.scorer, m.match_id, MatchCommand::End { winning_team_id: m.home }, Utc::now())
            .await
            .unwrap();
        let career_runs = m.service.career_stats(s.striker).await.unwrap().runs;

        let err = bowl(&m, inning.id, ball(&s, 6)).await.unwrap_err();
        assert!(matches!(err, ScoringError::InvalidState { entity: "match", .. }));

        let card = m.service.scorecard(inning.id).await.unwrap();
        assert_eq!(card.deliveries.len(), 1);
        assert_eq!(card.inning.totals.score, 1);
        assert_eq!(m.service.career_stats(s.striker).await.unwrap().runs, career_runs);
    }

    #[tokio::test]
    async fn stale_sequence_is_refused_and_nothing_is_written() {
        let m = live_match(None).await;
        let inning = open(&m, m.home, m.away).await;
        let s = side();
        bowl(&m, inning.id, ball(&s, 1)).await.unwrap();

        let stale = DeliveryInput {
            sequence: Some(1),
            ..ball(&s, 4)
        };
        let err = bowl(&m, inning.id, stale).await.unwrap_err();
        assert!(matches!(err, ScoringError::Ordering(_)));

        let card = m.service.scorecard(inning.id).await.unwrap();
        assert_eq!(card.deliveries.len(), 1);
        assert_eq!(card.inning.totals.score, 1);
    }

    #[tokio::test]
    async fn second_innings_chases_the_first() {
        let m = live_match(Some(5)).await;
        let first = open(&m, m.home, m.away).await;
        let s = side();
        for runs in [4, 6, 1] {
            bowl(&m, first.id, ball(&s, runs)).await.unwrap();
        }

        let err = m
            .service
            .open_innings(
                &m.scorer,
                m.match_id,
                OpenInningsRequest {
                    batting_team_id: m.away,
                    bowling_team_id: m.home,
                    target: None,
                },
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::InvalidState { .. }));

        m.service
            .apply_inning_command(&m.scorer, first.id, InningCommand::Complete, Utc::now())
            .await
            .unwrap();
        let second = open(&m, m.away, m.home).await;
        assert_eq!(second.innings_number, 2);
        assert_eq!(second.target, Some(12));

        let chase = side();
        bowl(&m, second.id, ball(&chase, 6)).await.unwrap();
        let last = bowl(&m, second.id, ball(&chase, 6)).await.unwrap();
        assert_eq!(last.delivery.total_runs(), 6);
        let card = m.service.scorecard(second.id).await.unwrap();
        assert_eq!(card.inning.status, InningStatus::Completed);
    }

    #[tokio::test]
    async fn closed_innings_takes_no_more_balls() {
        let m = live_match(None).await;
        let inning = open(&m, m.home, m.away).await;
        let s: Side = side();
        bowl(&m, inning.id, bowled(&s)).await.unwrap();
        m.service
            .apply_inning_command(&m.scorer, inning.id, InningCommand::Declare, Utc::now())
            .await
            .unwrap();
        let next = Side {
            striker: Uuid::new_v4(),
            ..s
        };
        let err = bowl(&m, inning.id, ball(&next, 1)).await.unwrap_err();
        assert!(matches!(err, ScoringError::InvalidState { .. }));

        let err = m
            .service
            .apply_inning_command(&m.scorer, inning.id, InningCommand::Start, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::Validation(_)));
    }

    #[tokio::test]
    async fn strangers_cannot_score() {
        let m = live_match(None).await;
        let inning = open(&m, m.home, m.away).await;
        let stranger = Actor::user(Uuid::new_v4());
        let err = m
            .service
            .record_delivery(&stranger, inning.id, ball(&side(), 1), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::Forbidden(_)));
    }

    #[tokio::test]
    async fn rebuild_of_a_clean_innings_changes_nothing() {
        let m = live_match(None).await;
        let inning = open(&m, m.home, m.away).await;
        let s = side();
        for runs in [1, 0, 4] {
            bowl(&m, inning.id, ball(&s, runs)).await.unwrap();
        }
        let before = m.service.scorecard(inning.id).await.unwrap();
        let after = m.service.rebuild_innings(&m.scorer, inning.id).await.unwrap();
        assert_eq!(before, after);
        assert!(after.is_consistent());
    }
}
