use chrono::{DateTime, Duration, Utc};
use pitchside_engine::model::challenge::{ChallengeStatus, ChallengeType, NewChallengeRequest, Party};
use pitchside_engine::model::error::ScoringError;
use pitchside_engine::model::fixture::{MatchCommand, MatchStatus};
use pitchside_engine::model::innings::{DeliveryInput, DismissalType, InningStatus, OpenInningsRequest};
use pitchside_engine::model::team::TeamRole;
use pitchside_engine::model::tournament::{NewTournamentRequest, TournamentCommand};
use pitchside_engine::repository::local::LocalStore;
use pitchside_engine::service::{Actor, ScoringService};
use uuid::Uuid;

struct Club {
    team_id: Uuid,
    captain: Actor,
}

fn club(store: &LocalStore) -> Club {
    let team_id = Uuid::new_v4();
    let captain = Actor::user(Uuid::new_v4());
    store
        .add_team_member(team_id, captain.user_id, TeamRole::Captain)
        .unwrap();
    Club { team_id, captain }
}

fn open_team_challenge(sender: Uuid, now: DateTime<Utc>) -> NewChallengeRequest {
    NewChallengeRequest {
        challenge_type: ChallengeType::OpenTeam,
        sender_team_id: Some(sender),
        sender_user_id: None,
        receiver_team_id: None,
        receiver_user_id: None,
        sport_id: Uuid::new_v4(),
        venue_id: Some(Uuid::new_v4()),
        proposed_at: now + Duration::days(2),
        expires_at: now + Duration::days(1),
        message: None,
        overs_per_innings: Some(20),
        ball_type: Some("leather".to_string()),
        entry_fee: Some(200),
    }
}

struct Batters {
    bowler: Uuid,
    striker: Uuid,
    non_striker: Uuid,
}

fn ball(b: &Batters, runs: i32) -> DeliveryInput {
    DeliveryInput {
        bowler_id: b.bowler,
        striker_id: b.striker,
        non_striker_id: b.non_striker,
        runs_scored: runs,
        is_four: runs == 4,
        is_six: runs == 6,
        ..Default::default()
    }
}

/// An open challenge from `home` taken up by `away`. Returns the match id.
async fn accepted_match(
    service: &ScoringService<LocalStore>,
    home: &Club,
    away: &Club,
    now: DateTime<Utc>,
) -> Uuid {
    let challenge = service
        .create_challenge(&home.captain, open_team_challenge(home.team_id, now), now)
        .await
        .unwrap();
    let accepted = service
        .accept_challenge(&away.captain, challenge.id, Party::Team(away.team_id), now)
        .await
        .unwrap();
    accepted.scheduled_match.fixture.id
}

#[tokio::test]
async fn open_challenge_becomes_a_match_with_its_terms() {
    let store = LocalStore::new();
    let (home, away) = (club(&store), club(&store));
    let service = ScoringService::new(store, 11);
    let now = Utc::now();

    let challenge = service
        .create_challenge(&home.captain, open_team_challenge(home.team_id, now), now)
        .await
        .unwrap();
    let accepted = service
        .accept_challenge(&away.captain, challenge.id, Party::Team(away.team_id), now)
        .await
        .unwrap();

    assert_eq!(accepted.challenge.status, ChallengeStatus::Accepted);
    let fixture = &accepted.scheduled_match.fixture;
    assert_eq!(fixture.status, MatchStatus::Upcoming);
    assert_eq!(fixture.scheduled_at, challenge.proposed_at);
    assert_eq!(fixture.venue_id, challenge.venue_id);
    assert_eq!(fixture.terms, challenge.terms);
    assert_eq!(accepted.challenge.scheduled_match_id, Some(fixture.id));
}

#[tokio::test]
async fn a_completed_match_cannot_start_again() {
    let store = LocalStore::new();
    let (home, away) = (club(&store), club(&store));
    let service = ScoringService::new(store, 11);
    let now = Utc::now();
    let match_id = accepted_match(&service, &home, &away, now).await;

    service
        .apply_match_command(&home.captain, match_id, MatchCommand::Start, now)
        .await
        .unwrap();
    service
        .apply_match_command(
            &away.captain,
            match_id,
            MatchCommand::End {
                winning_team_id: away.team_id,
            },
            now,
        )
        .await
        .unwrap();

    let err = service
        .apply_match_command(&home.captain, match_id, MatchCommand::Start, now)
        .await
        .unwrap_err();
    assert!(matches!(err, ScoringError::InvalidState { .. }));
    let sheet = service.find_match(match_id).await.unwrap();
    assert_eq!(sheet.fixture.status, MatchStatus::Completed);
    assert_eq!(sheet.fixture.winning_team_id, Some(away.team_id));
}

#[tokio::test]
async fn the_third_team_is_turned_away_from_a_two_team_cup() {
    let store = LocalStore::new();
    let clubs: Vec<Club> = (0..3).map(|_| club(&store)).collect();
    let service = ScoringService::new(store, 11);
    let organiser = Actor::user(Uuid::new_v4());
    let now = Utc::now();

    let cup = service
        .create_tournament(
            &organiser,
            NewTournamentRequest {
                name: "Two Team Cup".to_string(),
                sport_id: Uuid::new_v4(),
                max_teams: 2,
                registration_deadline: now + Duration::days(3),
                starts_at: Some(now + Duration::days(5)),
            },
            now,
        )
        .await
        .unwrap();
    service
        .apply_tournament_command(&organiser, cup.id, TournamentCommand::OpenRegistration, now)
        .await
        .unwrap();

    for c in &clubs[..2] {
        service
            .register_team(&c.captain, cup.id, c.team_id, now)
            .await
            .unwrap();
    }
    let err = service
        .register_team(&clubs[2].captain, cup.id, clubs[2].team_id, now)
        .await
        .unwrap_err();
    assert!(matches!(err, ScoringError::CapacityExceeded { max_teams: 2 }));
    assert_eq!(service.find_tournament(cup.id).await.unwrap().current_teams, 2);
}

#[tokio::test]
async fn scoring_an_over_builds_the_innings_and_fall_of_wickets() {
    let store = LocalStore::new();
    let (home, away) = (club(&store), club(&store));
    let service = ScoringService::new(store, 11);
    let now = Utc::now();
    let match_id = accepted_match(&service, &home, &away, now).await;
    service
        .apply_match_command(&home.captain, match_id, MatchCommand::Start, now)
        .await
        .unwrap();
    let inning = service
        .open_innings(
            &home.captain,
            match_id,
            OpenInningsRequest {
                batting_team_id: home.team_id,
                bowling_team_id: away.team_id,
                target: None,
            },
            now,
        )
        .await
        .unwrap();

    let batters = Batters {
        bowler: Uuid::new_v4(),
        striker: Uuid::new_v4(),
        non_striker: Uuid::new_v4(),
    };

    // a wicket without a dismissal type is refused and nothing changes
    let err = service
        .record_delivery(
            &home.captain,
            inning.id,
            DeliveryInput {
                is_wicket: true,
                ..ball(&batters, 0)
            },
            now,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ScoringError::Validation(_)));
    let card = service.scorecard(inning.id).await.unwrap();
    assert!(card.deliveries.is_empty());
    assert_eq!(card.inning.status, InningStatus::NotStarted);

    for runs in [1, 4, 0, 6, 1] {
        service
            .record_delivery(&home.captain, inning.id, ball(&batters, runs), now)
            .await
            .unwrap();
    }
    let wicket = service
        .record_delivery(
            &away.captain,
            inning.id,
            DeliveryInput {
                is_wicket: true,
                dismissal_type: Some(DismissalType::Bowled),
                ..ball(&batters, 0)
            },
            now,
        )
        .await
        .unwrap();
    assert_eq!(wicket.delivery.sequence, 6);
    assert_eq!(wicket.delivery.over_number, 0);
    assert_eq!(wicket.delivery.ball_number, 6);

    let card = service.scorecard(inning.id).await.unwrap();
    assert_eq!(card.inning.totals.score, 12);
    assert_eq!(card.inning.totals.wickets, 1);
    assert_eq!(card.inning.overs().to_string(), "1.0");
    assert_eq!(card.fall_of_wickets.len(), 1);
    let fow = &card.fall_of_wickets[0];
    assert_eq!(fow.wicket_number, 1);
    assert_eq!(fow.score_at_wicket, 12);
    assert_eq!(fow.player_out_id, batters.striker);
    assert!(card.is_consistent());
}
