use crate::model::error::{Result, ScoringError};
use crate::model::fixture::{Match, MatchDraft, MatchSide, MatchStatus, MatchTeam, MatchTerms};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChallengeType {
    OpenTeam,
    OpenIndividual,
    DirectTeam,
    DirectIndividual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChallengeStatus {
    Open,
    Pending,
    Accepted,
    Rejected,
    Expired,
    Cancelled,
    /// Stored by older clients once the produced match finished. Nothing in
    /// this crate moves a challenge here.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeAction {
    Accept,
    Reject,
    Cancel,
    Expire,
}

impl ChallengeAction {
    fn verb(self) -> &'static str {
        match self {
            ChallengeAction::Accept => "be accepted",
            ChallengeAction::Reject => "be rejected",
            ChallengeAction::Cancel => "be cancelled",
            ChallengeAction::Expire => "expire",
        }
    }
}

impl ChallengeStatus {
    /// Statuses a challenge can still be answered from.
    pub const LIVE: [ChallengeStatus; 2] = [ChallengeStatus::Open, ChallengeStatus::Pending];

    pub fn is_terminal(self) -> bool {
        !Self::LIVE.contains(&self)
    }

    /// The challenge transition table. Every answer is final.
    pub fn next(self, action: ChallengeAction) -> Result<ChallengeStatus> {
        use ChallengeStatus::*;
        match (self, action) {
            (Open | Pending, ChallengeAction::Accept) => Ok(Accepted),
            (Pending, ChallengeAction::Reject) => Ok(Rejected),
            (Open | Pending, ChallengeAction::Cancel) => Ok(Cancelled),
            (Open | Pending, ChallengeAction::Expire) => Ok(Expired),
            (state, action) => Err(ScoringError::invalid_state("challenge", state, action.verb())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PartyKind {
    Team,
    User,
}

/// One side of a challenge: a team or an individual player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Party {
    Team(Uuid),
    User(Uuid),
}

impl Party {
    pub fn kind(self) -> PartyKind {
        match self {
            Party::Team(_) => PartyKind::Team,
            Party::User(_) => PartyKind::User,
        }
    }

    pub fn team_id(self) -> Option<Uuid> {
        match self {
            Party::Team(id) => Some(id),
            Party::User(_) => None,
        }
    }

    pub fn user_id(self) -> Option<Uuid> {
        match self {
            Party::User(id) => Some(id),
            Party::Team(_) => None,
        }
    }

    fn from_columns(team: Option<Uuid>, user: Option<Uuid>) -> Option<Party> {
        match (team, user) {
            (Some(team), None) => Some(Party::Team(team)),
            (None, Some(user)) => Some(Party::User(user)),
            _ => None,
        }
    }
}

/// Who challenges whom. Each variant only carries the identities its type
/// allows, so a team challenge with a user receiver cannot be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Matchup {
    OpenTeam { sender_team_id: Uuid },
    OpenIndividual { sender_user_id: Uuid },
    DirectTeam { sender_team_id: Uuid, receiver_team_id: Uuid },
    DirectIndividual { sender_user_id: Uuid, receiver_user_id: Uuid },
}

/// Nullable column form of a [`Matchup`], as stored and as submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchupColumns {
    pub sender_team_id: Option<Uuid>,
    pub sender_user_id: Option<Uuid>,
    pub receiver_team_id: Option<Uuid>,
    pub receiver_user_id: Option<Uuid>,
}

impl Matchup {
    pub fn from_columns(kind: ChallengeType, columns: MatchupColumns) -> Result<Matchup> {
        let sender = Party::from_columns(columns.sender_team_id, columns.sender_user_id)
            .ok_or_else(|| ScoringError::validation("exactly one of sender team or sender user must be set"))?;
        let receiver = match (columns.receiver_team_id, columns.receiver_user_id) {
            (None, None) => None,
            (team, user) => Some(Party::from_columns(team, user).ok_or_else(|| {
                ScoringError::validation("a challenge has at most one receiver")
            })?),
        };

        let matchup = match (kind, sender, receiver) {
            (ChallengeType::OpenTeam, Party::Team(sender_team_id), None) => {
                Matchup::OpenTeam { sender_team_id }
            }
            (ChallengeType::OpenIndividual, Party::User(sender_user_id), None) => {
                Matchup::OpenIndividual { sender_user_id }
            }
            (
                ChallengeType::DirectTeam,
                Party::Team(sender_team_id),
                Some(Party::Team(receiver_team_id)),
            ) => Matchup::DirectTeam {
                sender_team_id,
                receiver_team_id,
            },
            (
                ChallengeType::DirectIndividual,
                Party::User(sender_user_id),
                Some(Party::User(receiver_user_id)),
            ) => Matchup::DirectIndividual {
                sender_user_id,
                receiver_user_id,
            },
            (kind, sender, receiver) => {
                return Err(ScoringError::validation(format!(
                    "a {kind} challenge cannot be sent by a {} to {}",
                    sender.kind(),
                    receiver.map_or("anyone in particular".to_string(), |r| format!("a {}", r.kind()))
                )));
            }
        };
        if Some(matchup.sender()) == matchup.receiver() {
            return Err(ScoringError::validation("a challenge cannot be sent to its sender"));
        }
        Ok(matchup)
    }

    pub fn columns(&self) -> MatchupColumns {
        let sender = self.sender();
        let receiver = self.receiver();
        MatchupColumns {
            sender_team_id: sender.team_id(),
            sender_user_id: sender.user_id(),
            receiver_team_id: receiver.and_then(Party::team_id),
            receiver_user_id: receiver.and_then(Party::user_id),
        }
    }

    pub fn challenge_type(&self) -> ChallengeType {
        match self {
            Matchup::OpenTeam { .. } => ChallengeType::OpenTeam,
            Matchup::OpenIndividual { .. } => ChallengeType::OpenIndividual,
            Matchup::DirectTeam { .. } => ChallengeType::DirectTeam,
            Matchup::DirectIndividual { .. } => ChallengeType::DirectIndividual,
        }
    }

    pub fn sender(&self) -> Party {
        match *self {
            Matchup::OpenTeam { sender_team_id } | Matchup::DirectTeam { sender_team_id, .. } => {
                Party::Team(sender_team_id)
            }
            Matchup::OpenIndividual { sender_user_id }
            | Matchup::DirectIndividual { sender_user_id, .. } => Party::User(sender_user_id),
        }
    }

    pub fn receiver(&self) -> Option<Party> {
        match *self {
            Matchup::DirectTeam {
                receiver_team_id, ..
            } => Some(Party::Team(receiver_team_id)),
            Matchup::DirectIndividual {
                receiver_user_id, ..
            } => Some(Party::User(receiver_user_id)),
            Matchup::OpenTeam { .. } | Matchup::OpenIndividual { .. } => None,
        }
    }

    pub fn side_kind(&self) -> PartyKind {
        self.sender().kind()
    }

    pub fn initial_status(&self) -> ChallengeStatus {
        match self.receiver() {
            Some(_) => ChallengeStatus::Pending,
            None => ChallengeStatus::Open,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: Uuid,
    #[serde(flatten)]
    pub matchup: Matchup,
    pub status: ChallengeStatus,
    pub sport_id: Uuid,
    pub venue_id: Option<Uuid>,
    #[serde(rename = "proposedAt")]
    pub proposed_at: DateTime<Utc>,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
    pub message: Option<String>,
    #[serde(flatten)]
    pub terms: MatchTerms,
    pub accepted_by: Option<Party>,
    #[serde(rename = "acceptedAt")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(rename = "respondedAt")]
    pub responded_at: Option<DateTime<Utc>>,
    pub scheduled_match_id: Option<Uuid>,
    pub created_by: Uuid,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewChallengeRequest {
    pub challenge_type: ChallengeType,
    pub sender_team_id: Option<Uuid>,
    pub sender_user_id: Option<Uuid>,
    pub receiver_team_id: Option<Uuid>,
    pub receiver_user_id: Option<Uuid>,
    pub sport_id: Uuid,
    pub venue_id: Option<Uuid>,
    pub proposed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[validate(length(max = 500))]
    pub message: Option<String>,
    #[validate(range(min = 1, max = 50))]
    pub overs_per_innings: Option<i32>,
    #[validate(length(min = 1, max = 32))]
    pub ball_type: Option<String>,
    #[validate(range(min = 0))]
    pub entry_fee: Option<i32>,
}

impl NewChallengeRequest {
    pub fn matchup(&self) -> Result<Matchup> {
        Matchup::from_columns(
            self.challenge_type,
            MatchupColumns {
                sender_team_id: self.sender_team_id,
                sender_user_id: self.sender_user_id,
                receiver_team_id: self.receiver_team_id,
                receiver_user_id: self.receiver_user_id,
            },
        )
    }
}

impl Challenge {
    pub fn create(
        request: NewChallengeRequest,
        id: Uuid,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Challenge> {
        request.validate()?;
        let matchup = request.matchup()?;
        if request.proposed_at <= now {
            return Err(ScoringError::validation("proposed_at must be in the future"));
        }
        if request.expires_at <= now {
            return Err(ScoringError::validation("expires_at must be in the future"));
        }
        if request.expires_at > request.proposed_at {
            return Err(ScoringError::validation(
                "a challenge must expire before the match it proposes",
            ));
        }

        Ok(Challenge {
            id,
            status: matchup.initial_status(),
            matchup,
            sport_id: request.sport_id,
            venue_id: request.venue_id,
            proposed_at: request.proposed_at,
            expires_at: request.expires_at,
            message: request.message,
            terms: MatchTerms {
                overs_per_innings: request.overs_per_innings,
                ball_type: request.ball_type,
                entry_fee: request.entry_fee,
            },
            accepted_by: None,
            accepted_at: None,
            responded_at: None,
            scheduled_match_id: None,
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    /// Accepts the challenge on behalf of `party` and returns the match it
    /// produces. The challenge is only modified once every check passed; the
    /// caller persists both in one transaction.
    pub fn accept(
        &mut self,
        party: Party,
        acting_user: Uuid,
        match_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<MatchDraft> {
        let next = self.status.next(ChallengeAction::Accept)?;
        if now > self.expires_at {
            return Err(ScoringError::invalid_state("challenge", "expired", "be accepted"));
        }
        self.ensure_side_kind(party)?;
        match self.matchup.receiver() {
            Some(receiver) if receiver != party => {
                return Err(ScoringError::InvalidReference(
                    "only the challenged party can accept this challenge".to_string(),
                ));
            }
            None if party == self.matchup.sender() => {
                return Err(ScoringError::validation("a challenge cannot be accepted by its sender"));
            }
            _ => {}
        }

        let teams = match (self.matchup.sender(), party) {
            (Party::Team(home), Party::Team(away)) => vec![
                MatchTeam::new(match_id, home, MatchSide::Home, now),
                MatchTeam::new(match_id, away, MatchSide::Away, now),
            ],
            _ => Vec::new(),
        };
        let fixture = Match {
            id: match_id,
            sport_id: self.sport_id,
            venue_id: self.venue_id,
            challenge_id: Some(self.id),
            status: MatchStatus::Upcoming,
            scheduled_at: self.proposed_at,
            started_at: None,
            completed_at: None,
            terms: self.terms.clone(),
            toss: None,
            winning_team_id: None,
            created_by: acting_user,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };

        self.status = next;
        self.accepted_by = Some(party);
        self.accepted_at = Some(now);
        self.responded_at = Some(now);
        self.scheduled_match_id = Some(match_id);
        self.updated_at = now;
        Ok(MatchDraft { fixture, teams })
    }

    pub fn reject(&mut self, party: Party, now: DateTime<Utc>) -> Result<()> {
        let next = self.status.next(ChallengeAction::Reject)?;
        self.ensure_side_kind(party)?;
        if self.matchup.receiver() != Some(party) {
            return Err(ScoringError::InvalidReference(
                "only the challenged party can reject this challenge".to_string(),
            ));
        }
        self.status = next;
        self.responded_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, party: Party, now: DateTime<Utc>) -> Result<()> {
        let next = self.status.next(ChallengeAction::Cancel)?;
        if self.matchup.sender() != party {
            return Err(ScoringError::InvalidReference(
                "only the sender can withdraw a challenge".to_string(),
            ));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Marks the challenge expired if its deadline passed while it was still
    /// unanswered. Returns whether anything changed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if self.expires_at >= now {
            return false;
        }
        match self.status.next(ChallengeAction::Expire) {
            Ok(next) => {
                self.status = next;
                self.updated_at = now;
                true
            }
            Err(_) => false,
        }
    }

    fn ensure_side_kind(&self, party: Party) -> Result<()> {
        let expected = self.matchup.side_kind();
        if party.kind() != expected {
            return Err(ScoringError::validation(format!(
                "a {} challenge must be answered by a {expected}",
                self.matchup.challenge_type()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request(kind: ChallengeType, columns: MatchupColumns, now: DateTime<Utc>) -> NewChallengeRequest {
        NewChallengeRequest {
            challenge_type: kind,
            sender_team_id: columns.sender_team_id,
            sender_user_id: columns.sender_user_id,
            receiver_team_id: columns.receiver_team_id,
            receiver_user_id: columns.receiver_user_id,
            sport_id: Uuid::new_v4(),
            venue_id: Some(Uuid::new_v4()),
            proposed_at: now + Duration::days(3),
            expires_at: now + Duration::days(1),
            message: Some("Sunday morning, 20 overs?".to_string()),
            overs_per_innings: Some(20),
            ball_type: Some("tennis".to_string()),
            entry_fee: Some(500),
        }
    }

    fn open_team(now: DateTime<Utc>) -> (Challenge, Uuid) {
        let sender = Uuid::new_v4();
        let columns = MatchupColumns {
            sender_team_id: Some(sender),
            ..Default::default()
        };
        let challenge = Challenge::create(
            request(ChallengeType::OpenTeam, columns, now),
            Uuid::new_v4(),
            Uuid::new_v4(),
            now,
        )
        .unwrap();
        (challenge, sender)
    }

    #[test]
    fn inconsistent_sides_are_rejected() {
        let now = Utc::now();
        let columns = MatchupColumns {
            sender_team_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        let err = Challenge::create(
            request(ChallengeType::OpenIndividual, columns, now),
            Uuid::new_v4(),
            Uuid::new_v4(),
            now,
        )
        .unwrap_err();
        assert!(matches!(err, ScoringError::Validation(_)));

        let both = MatchupColumns {
            sender_team_id: Some(Uuid::new_v4()),
            sender_user_id: Some(Uuid::new_v4()),
            receiver_team_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(Matchup::from_columns(ChallengeType::DirectTeam, both).is_err());

        let team_to_user = MatchupColumns {
            sender_team_id: Some(Uuid::new_v4()),
            receiver_user_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(Matchup::from_columns(ChallengeType::DirectTeam, team_to_user).is_err());
    }

    #[test]
    fn columns_round_trip_through_matchup() {
        let columns = MatchupColumns {
            sender_user_id: Some(Uuid::new_v4()),
            receiver_user_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        let matchup = Matchup::from_columns(ChallengeType::DirectIndividual, columns).unwrap();
        assert_eq!(matchup.columns(), columns);
        assert_eq!(matchup.initial_status(), ChallengeStatus::Pending);
    }

    #[test]
    fn accepting_open_team_challenge_schedules_match() {
        let now = Utc::now();
        let (mut challenge, sender) = open_team(now);
        assert_eq!(challenge.status, ChallengeStatus::Open);

        let acceptor = Uuid::new_v4();
        let match_id = Uuid::new_v4();
        let draft = challenge
            .accept(Party::Team(acceptor), Uuid::new_v4(), match_id, now)
            .unwrap();

        assert_eq!(challenge.status, ChallengeStatus::Accepted);
        assert_eq!(challenge.scheduled_match_id, Some(match_id));
        assert_eq!(challenge.accepted_by, Some(Party::Team(acceptor)));
        assert_eq!(draft.fixture.status, MatchStatus::Upcoming);
        assert_eq!(draft.fixture.challenge_id, Some(challenge.id));
        assert_eq!(draft.fixture.scheduled_at, challenge.proposed_at);
        assert_eq!(draft.fixture.terms, challenge.terms);
        let sides: Vec<_> = draft.teams.iter().map(|t| (t.team_id, t.side)).collect();
        assert_eq!(sides, vec![(sender, MatchSide::Home), (acceptor, MatchSide::Away)]);
    }

    #[test]
    fn terminal_challenges_stay_terminal() {
        let now = Utc::now();
        let (mut challenge, _) = open_team(now);
        challenge
            .accept(Party::Team(Uuid::new_v4()), Uuid::new_v4(), Uuid::new_v4(), now)
            .unwrap();
        let snapshot = challenge.clone();

        let again = challenge.accept(Party::Team(Uuid::new_v4()), Uuid::new_v4(), Uuid::new_v4(), now);
        assert!(matches!(again, Err(ScoringError::InvalidState { .. })));
        assert!(challenge.cancel(challenge.matchup.sender(), now).is_err());
        assert!(!challenge.expire(now + Duration::days(30)));
        assert_eq!(challenge, snapshot);
    }

    #[test]
    fn sender_cannot_accept_own_open_challenge() {
        let now = Utc::now();
        let (mut challenge, sender) = open_team(now);
        let err = challenge
            .accept(Party::Team(sender), Uuid::new_v4(), Uuid::new_v4(), now)
            .unwrap_err();
        assert!(matches!(err, ScoringError::Validation(_)));
        assert_eq!(challenge.status, ChallengeStatus::Open);
        assert!(challenge.scheduled_match_id.is_none());
    }

    #[test]
    fn direct_challenge_answers_belong_to_receiver() {
        let now = Utc::now();
        let (sender, receiver) = (Uuid::new_v4(), Uuid::new_v4());
        let columns = MatchupColumns {
            sender_user_id: Some(sender),
            receiver_user_id: Some(receiver),
            ..Default::default()
        };
        let mut challenge = Challenge::create(
            request(ChallengeType::DirectIndividual, columns, now),
            Uuid::new_v4(),
            sender,
            now,
        )
        .unwrap();

        let stranger = challenge.reject(Party::User(Uuid::new_v4()), now);
        assert!(matches!(stranger, Err(ScoringError::InvalidReference(_))));
        let wrong_kind = challenge.reject(Party::Team(receiver), now);
        assert!(matches!(wrong_kind, Err(ScoringError::Validation(_))));

        challenge.reject(Party::User(receiver), now).unwrap();
        assert_eq!(challenge.status, ChallengeStatus::Rejected);

        let late = challenge.accept(Party::User(receiver), receiver, Uuid::new_v4(), now);
        assert!(matches!(late, Err(ScoringError::InvalidState { .. })));
    }

    #[test]
    fn individual_acceptance_has_no_match_teams() {
        let now = Utc::now();
        let (sender, receiver) = (Uuid::new_v4(), Uuid::new_v4());
        let columns = MatchupColumns {
            sender_user_id: Some(sender),
            receiver_user_id: Some(receiver),
            ..Default::default()
        };
        let mut challenge = Challenge::create(
            request(ChallengeType::DirectIndividual, columns, now),
            Uuid::new_v4(),
            sender,
            now,
        )
        .unwrap();
        let draft = challenge
            .accept(Party::User(receiver), receiver, Uuid::new_v4(), now)
            .unwrap();
        assert!(draft.teams.is_empty());
    }

    #[test]
    fn open_challenges_cannot_be_rejected() {
        let now = Utc::now();
        let (mut challenge, _) = open_team(now);
        let err = challenge.reject(Party::Team(Uuid::new_v4()), now).unwrap_err();
        assert!(matches!(err, ScoringError::InvalidState { .. }));
    }

    #[test]
    fn expired_challenge_cannot_be_accepted_before_sweep() {
        let now = Utc::now();
        let (mut challenge, _) = open_team(now);
        let later = challenge.expires_at + Duration::minutes(1);
        let err = challenge
            .accept(Party::Team(Uuid::new_v4()), Uuid::new_v4(), Uuid::new_v4(), later)
            .unwrap_err();
        assert!(matches!(err, ScoringError::InvalidState { .. }));
        assert_eq!(challenge.status, ChallengeStatus::Open);

        assert!(challenge.expire(later));
        assert_eq!(challenge.status, ChallengeStatus::Expired);
        assert!(!challenge.expire(later));
    }

    #[test]
    fn only_sender_cancels() {
        let now = Utc::now();
        let (mut challenge, sender) = open_team(now);
        assert!(challenge.cancel(Party::Team(Uuid::new_v4()), now).is_err());
        challenge.cancel(Party::Team(sender), now).unwrap();
        assert_eq!(challenge.status, ChallengeStatus::Cancelled);
    }
}
