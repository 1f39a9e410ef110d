//! Innings and the ball-by-ball delivery ledger.
//!
//! Deliveries are append-only. Every running figure on an [`Inning`]
//! (score, wickets, balls, extras) and every [`FallOfWicket`] row is a fold
//! over the ledger in sequence order; [`InningTotals::apply`] is the single
//! step function used both when a ball is recorded and when the innings is
//! rebuilt from scratch, so the two paths cannot drift apart.

use crate::model::error::{Result, ScoringError};
use crate::model::fixture::{MatchSheet, MatchStatus};
use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub const BALLS_PER_OVER: i32 = 6;
pub const MAX_INNINGS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InningStatus {
    NotStarted,
    InProgress,
    Completed,
    Declared,
    Forfeited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InningCommand {
    Start,
    Complete,
    Declare,
    Forfeit,
}

impl InningCommand {
    fn verb(self) -> &'static str {
        match self {
            InningCommand::Start => "start",
            InningCommand::Complete => "be completed",
            InningCommand::Declare => "be declared",
            InningCommand::Forfeit => "be forfeited",
        }
    }
}

impl InningStatus {
    pub fn accepts_deliveries(self) -> bool {
        matches!(self, InningStatus::NotStarted | InningStatus::InProgress)
    }

    pub fn next(self, command: InningCommand) -> Result<InningStatus> {
        use InningStatus::*;
        match (self, command) {
            (NotStarted, InningCommand::Start) => Ok(InProgress),
            (InProgress, InningCommand::Complete) => Ok(Completed),
            (InProgress, InningCommand::Declare) => Ok(Declared),
            (NotStarted | InProgress, InningCommand::Forfeit) => Ok(Forfeited),
            (state, command) => Err(ScoringError::invalid_state("innings", state, command.verb())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExtraType {
    Wide,
    NoBall,
    Bye,
    LegBye,
    Penalty,
}

impl ExtraType {
    /// Wides and no-balls have to be bowled again.
    pub fn is_illegal(self) -> bool {
        matches!(self, ExtraType::Wide | ExtraType::NoBall)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DismissalType {
    Bowled,
    Caught,
    Lbw,
    RunOut,
    Stumped,
    HitWicket,
    RetiredOut,
    ObstructingField,
    HandledBall,
    TimedOut,
}

impl DismissalType {
    pub fn credited_to_bowler(self) -> bool {
        matches!(
            self,
            DismissalType::Bowled
                | DismissalType::Caught
                | DismissalType::Lbw
                | DismissalType::Stumped
                | DismissalType::HitWicket
        )
    }

    pub fn needs_fielder(self) -> bool {
        matches!(
            self,
            DismissalType::Caught | DismissalType::RunOut | DismissalType::Stumped
        )
    }

    /// Dismissals where the non-striker may be the one out.
    pub fn either_batter(self) -> bool {
        matches!(
            self,
            DismissalType::RunOut
                | DismissalType::ObstructingField
                | DismissalType::RetiredOut
                | DismissalType::TimedOut
        )
    }

    pub fn possible_on(self, extra: Option<ExtraType>) -> bool {
        match extra {
            Some(ExtraType::NoBall) => matches!(
                self,
                DismissalType::RunOut | DismissalType::ObstructingField | DismissalType::HandledBall
            ),
            Some(ExtraType::Wide) => matches!(
                self,
                DismissalType::Stumped
                    | DismissalType::RunOut
                    | DismissalType::HitWicket
                    | DismissalType::ObstructingField
            ),
            _ => true,
        }
    }
}

/// Completed overs and balls into the current one, written `X.Y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
pub struct Overs {
    pub completed: i32,
    pub balls: i32,
}

impl Overs {
    pub fn from_balls(balls: i32) -> Self {
        Overs {
            completed: balls / BALLS_PER_OVER,
            balls: balls % BALLS_PER_OVER,
        }
    }

    /// The X.Y figure as a number, e.g. 14 balls is 2.2. Not a decimal
    /// fraction of an over.
    pub fn notation(&self) -> f64 {
        self.completed as f64 + self.balls as f64 / 10.0
    }

    pub fn as_balls(&self) -> i32 {
        self.completed * BALLS_PER_OVER + self.balls
    }
}

impl fmt::Display for Overs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.completed, self.balls)
    }
}

impl Serialize for Overs {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extras {
    pub wides: i32,
    pub no_balls: i32,
    pub byes: i32,
    pub leg_byes: i32,
    pub penalty: i32,
}

impl Extras {
    pub fn total(&self) -> i32 {
        self.wides + self.no_balls + self.byes + self.leg_byes + self.penalty
    }
}

/// Running figures of an innings. Always equal to the fold of its ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InningTotals {
    pub score: i32,
    pub wickets: i32,
    pub balls: i32,
    pub extras: Extras,
}

impl InningTotals {
    pub fn fold<'a>(deliveries: impl IntoIterator<Item = &'a BallDelivery>) -> Self {
        let mut totals = InningTotals::default();
        for delivery in deliveries {
            totals.apply(delivery);
        }
        totals
    }

    pub fn apply(&mut self, delivery: &BallDelivery) {
        self.score += delivery.total_runs();
        if delivery.is_legal_delivery {
            self.balls += 1;
        }
        if delivery.is_wicket {
            self.wickets += 1;
        }
        match delivery.extra_type {
            Some(ExtraType::Wide) => self.extras.wides += delivery.extra_runs,
            // One run for the no-ball itself, anything else was run as byes.
            Some(ExtraType::NoBall) => {
                self.extras.no_balls += 1;
                self.extras.byes += delivery.extra_runs - 1;
            }
            Some(ExtraType::Bye) => self.extras.byes += delivery.extra_runs,
            Some(ExtraType::LegBye) => self.extras.leg_byes += delivery.extra_runs,
            Some(ExtraType::Penalty) => self.extras.penalty += delivery.extra_runs,
            None => {}
        }
    }

    pub fn overs(&self) -> Overs {
        Overs::from_balls(self.balls)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inning {
    pub id: Uuid,
    pub match_id: Uuid,
    pub innings_number: i32,
    pub batting_team_id: Uuid,
    pub bowling_team_id: Uuid,
    pub status: InningStatus,
    #[serde(flatten)]
    pub totals: InningTotals,
    pub target: Option<i32>,
    pub max_overs: Option<i32>,
    pub eligible_batters: i32,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "completedAt")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallDelivery {
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
    pub dismissal_type: Option<DismissalType>,
    pub player_out_id: Option<Uuid>,
    pub fielder1_id: Option<Uuid>,
    pub fielder2_id: Option<Uuid>,
    pub is_extra: bool,
    pub extra_type: Option<ExtraType>,
    pub extra_runs: i32,
    pub is_legal_delivery: bool,
    pub commentary: Option<String>,
    pub recorded_by: Uuid,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl BallDelivery {
    pub fn total_runs(&self) -> i32 {
        self.runs_scored + self.extra_runs
    }

    /// Runs charged against the bowler: off the bat, wides, and the no-ball
    /// run. Byes, leg-byes and penalties are not the bowler's.
    pub fn bowler_runs(&self) -> i32 {
        match self.extra_type {
            Some(ExtraType::Wide) => self.runs_scored + self.extra_runs,
            Some(ExtraType::NoBall) => self.runs_scored + 1,
            _ => self.runs_scored,
        }
    }

    /// Whether the striker faced this ball. Wides are not faced.
    pub fn is_faced(&self) -> bool {
        self.extra_type != Some(ExtraType::Wide)
    }

    /// `over.ball` of this delivery, e.g. `0.1` for the first ball.
    pub fn ball_label(&self) -> String {
        format!("{}.{}", self.over_number, self.ball_number)
    }

    pub fn fielders(&self) -> impl Iterator<Item = Uuid> {
        self.fielder1_id.into_iter().chain(self.fielder2_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::model::schema::fall_of_wickets)]
pub struct FallOfWicket {
    pub inning_id: Uuid,
    pub wicket_number: i32,
    pub delivery_id: Uuid,
    pub player_out_id: Uuid,
    pub score_at_wicket: i32,
    pub balls_at_wicket: i32,
    pub overs_at_wicket: String,
}

/// A ball as reported by the scorer. Position in the innings is never taken
/// from here: it follows from the ledger.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[validate(schema(function = "check_delivery"))]
pub struct DeliveryInput {
    /// Position the scorer believes it is recording; rejected when stale.
    pub sequence: Option<i32>,
    pub bowler_id: Uuid,
    pub striker_id: Uuid,
    pub non_striker_id: Uuid,
    #[validate(range(min = 0, max = 8))]
    #[serde(default)]
    pub runs_scored: i32,
    #[serde(default)]
    pub is_four: bool,
    #[serde(default)]
    pub is_six: bool,
    #[serde(default)]
    pub is_wicket: bool,
    pub dismissal_type: Option<DismissalType>,
    pub player_out_id: Option<Uuid>,
    pub fielder1_id: Option<Uuid>,
    pub fielder2_id: Option<Uuid>,
    #[serde(default)]
    pub is_extra: bool,
    pub extra_type: Option<ExtraType>,
    #[validate(range(min = 0, max = 10))]
    #[serde(default)]
    pub extra_runs: i32,
    #[validate(length(max = 280))]
    pub commentary: Option<String>,
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

fn check_delivery(d: &DeliveryInput) -> std::result::Result<(), ValidationError> {
    if d.is_four && d.is_six {
        return Err(invalid("boundary", "a ball cannot be both a four and a six"));
    }
    if d.is_four && d.runs_scored != 4 {
        return Err(invalid("boundary", "a four scores exactly 4 runs off the bat"));
    }
    if d.is_six && d.runs_scored != 6 {
        return Err(invalid("boundary", "a six scores exactly 6 runs off the bat"));
    }
    if d.is_extra != d.extra_type.is_some() {
        return Err(invalid("extra", "is_extra and extra_type must agree"));
    }
    match d.extra_type {
        None if d.extra_runs != 0 => {
            return Err(invalid("extra", "extra runs need an extra type"));
        }
        Some(ExtraType::Wide | ExtraType::Bye | ExtraType::LegBye) if d.runs_scored != 0 => {
            return Err(invalid("extra", "no runs can be scored off the bat on this extra"));
        }
        Some(_) if d.extra_runs < 1 => {
            return Err(invalid("extra", "an extra is worth at least one run"));
        }
        _ => {}
    }
    if d.is_wicket != d.dismissal_type.is_some() {
        return Err(invalid("wicket", "a wicket needs a dismissal type and only a wicket has one"));
    }
    if !d.is_wicket && (d.player_out_id.is_some() || d.fielder1_id.is_some() || d.fielder2_id.is_some()) {
        return Err(invalid("wicket", "player out and fielders are only recorded with a wicket"));
    }
    if d.fielder1_id.is_none() && d.fielder2_id.is_some() {
        return Err(invalid("fielder", "the second fielder needs a first fielder"));
    }
    if let Some(dismissal) = d.dismissal_type {
        if dismissal.needs_fielder() && d.fielder1_id.is_none() {
            return Err(invalid("fielder", "this dismissal needs at least one fielder"));
        }
        if !dismissal.possible_on(d.extra_type) {
            return Err(invalid("wicket", "this dismissal is not possible on that extra"));
        }
    }
    Ok(())
}

/// Where the next ball falls in the innings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub sequence: i32,
    pub over_number: i32,
    pub ball_number: i32,
    pub delivery_in_over: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedDelivery {
    pub delivery: BallDelivery,
    pub fall_of_wicket: Option<FallOfWicket>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OpenInningsRequest {
    pub batting_team_id: Uuid,
    pub bowling_team_id: Uuid,
    #[validate(range(min = 1))]
    pub target: Option<i32>,
}

impl Inning {
    /// Opens the next innings of a live match.
    pub fn open(
        sheet: &MatchSheet,
        previous: &[Inning],
        request: &OpenInningsRequest,
        default_playing_xi: i32,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Inning> {
        request.validate()?;
        let fixture = &sheet.fixture;
        if fixture.status != MatchStatus::Live {
            return Err(ScoringError::invalid_state("match", fixture.status, "open an innings"));
        }
        if request.batting_team_id == request.bowling_team_id {
            return Err(ScoringError::validation("a team cannot bowl to itself"));
        }
        for team in [request.batting_team_id, request.bowling_team_id] {
            if !sheet.has_team(team) {
                return Err(ScoringError::InvalidReference(format!(
                    "team {team} is not playing in match {}",
                    fixture.id
                )));
            }
        }
        if let Some(open) = previous.iter().find(|i| i.status.accepts_deliveries()) {
            return Err(ScoringError::invalid_state(
                "match",
                format!("innings {} is {}", open.innings_number, open.status),
                "open another innings",
            ));
        }
        if previous.len() >= MAX_INNINGS {
            return Err(ScoringError::validation(format!(
                "a match has at most {MAX_INNINGS} innings"
            )));
        }

        let innings_number = previous.len() as i32 + 1;
        let max_overs = fixture.terms.overs_per_innings;
        let target = request.target.or_else(|| {
            let chasing = innings_number == 2 && max_overs.is_some();
            previous
                .iter()
                .find(|i| i.innings_number == 1)
                .filter(|_| chasing)
                .map(|first| first.totals.score + 1)
        });
        let eligible_batters = match sheet.playing_xi_count(request.batting_team_id) {
            0 => default_playing_xi,
            n => n as i32,
        };
        if eligible_batters < 2 {
            return Err(ScoringError::validation("an innings needs at least two batters"));
        }

        Ok(Inning {
            id,
            match_id: fixture.id,
            innings_number,
            batting_team_id: request.batting_team_id,
            bowling_team_id: request.bowling_team_id,
            status: InningStatus::NotStarted,
            totals: InningTotals::default(),
            target,
            max_overs,
            eligible_batters,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn overs(&self) -> Overs {
        self.totals.overs()
    }

    pub fn apply(&mut self, command: InningCommand, now: DateTime<Utc>) -> Result<()> {
        self.status = self.status.next(command)?;
        match self.status {
            InningStatus::InProgress => self.started_at = Some(now),
            InningStatus::Completed | InningStatus::Declared | InningStatus::Forfeited => {
                self.completed_at = Some(now)
            }
            InningStatus::NotStarted => {}
        }
        self.updated_at = now;
        Ok(())
    }

    fn all_out(&self) -> bool {
        self.totals.wickets >= self.eligible_batters - 1
    }

    fn overs_exhausted(&self) -> bool {
        self.max_overs
            .map_or(false, |overs| self.totals.balls >= overs * BALLS_PER_OVER)
    }

    fn target_reached(&self) -> bool {
        self.target.map_or(false, |target| self.totals.score >= target)
    }
}

/// An innings with its full delivery ledger, the status of its match and
/// the squads allowed to appear in it. Empty squads mean no line-up was
/// selected and any player is accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InningLedger {
    pub inning: Inning,
    pub deliveries: Vec<BallDelivery>,
    pub fall_of_wickets: Vec<FallOfWicket>,
    #[serde(skip)]
    pub match_status: MatchStatus,
    #[serde(skip)]
    pub batting_squad: Vec<Uuid>,
    #[serde(skip)]
    pub bowling_squad: Vec<Uuid>,
}

impl InningLedger {
    pub fn new(inning: Inning, match_status: MatchStatus) -> Self {
        InningLedger {
            inning,
            deliveries: Vec::new(),
            fall_of_wickets: Vec::new(),
            match_status,
            batting_squad: Vec::new(),
            bowling_squad: Vec::new(),
        }
    }

    pub fn with_squads(mut self, batting: Vec<Uuid>, bowling: Vec<Uuid>) -> Self {
        self.batting_squad = batting;
        self.bowling_squad = bowling;
        self
    }

    pub fn next_position(&self) -> Position {
        let legal = self.deliveries.iter().filter(|d| d.is_legal_delivery).count() as i32;
        let over_number = legal / BALLS_PER_OVER;
        let in_this_over = self
            .deliveries
            .iter()
            .rev()
            .take_while(|d| d.over_number == over_number)
            .count() as i32;
        Position {
            sequence: self.deliveries.len() as i32 + 1,
            over_number,
            ball_number: legal % BALLS_PER_OVER + 1,
            delivery_in_over: in_this_over + 1,
        }
    }

    pub fn dismissed(&self) -> HashSet<Uuid> {
        self.deliveries.iter().filter_map(|d| d.player_out_id).collect()
    }

    /// Appends one ball to the ledger and rolls it into the innings figures.
    /// Nothing is changed unless every check passes.
    pub fn record(
        &mut self,
        input: DeliveryInput,
        id: Uuid,
        recorded_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<RecordedDelivery> {
        if self.match_status != MatchStatus::Live {
            return Err(ScoringError::invalid_state(
                "match",
                self.match_status,
                "take another delivery",
            ));
        }
        let status = self.inning.status;
        if !status.accepts_deliveries() {
            return Err(ScoringError::invalid_state("innings", status, "take another delivery"));
        }
        input.validate()?;

        let position = self.next_position();
        if let Some(claimed) = input.sequence {
            if claimed != position.sequence {
                return Err(ScoringError::Ordering(format!(
                    "delivery {claimed} submitted but the next delivery is {}",
                    position.sequence
                )));
            }
        }
        let player_out_id = self.check_players(&input)?;

        let delivery = BallDelivery {
            id,
            inning_id: self.inning.id,
            sequence: position.sequence,
            over_number: position.over_number,
            ball_number: position.ball_number,
            delivery_in_over: position.delivery_in_over,
            bowler_id: input.bowler_id,
            striker_id: input.striker_id,
            non_striker_id: input.non_striker_id,
            runs_scored: input.runs_scored,
            is_four: input.is_four,
            is_six: input.is_six,
            is_wicket: input.is_wicket,
            dismissal_type: input.dismissal_type,
            player_out_id,
            fielder1_id: input.fielder1_id,
            fielder2_id: input.fielder2_id,
            is_extra: input.is_extra,
            extra_type: input.extra_type,
            extra_runs: input.extra_runs,
            is_legal_delivery: !input.extra_type.map_or(false, ExtraType::is_illegal),
            commentary: input.commentary,
            recorded_by,
            created_at: now,
        };

        if status == InningStatus::NotStarted {
            self.inning.apply(InningCommand::Start, now)?;
        }
        self.inning.totals.apply(&delivery);
        let fall_of_wicket = wicket_fallen(&self.inning, &delivery);
        if self.inning.all_out() || self.inning.overs_exhausted() || self.inning.target_reached() {
            self.inning.apply(InningCommand::Complete, now)?;
        }
        self.inning.updated_at = now;

        self.deliveries.push(delivery.clone());
        if let Some(fow) = &fall_of_wicket {
            self.fall_of_wickets.push(fow.clone());
        }
        Ok(RecordedDelivery {
            delivery,
            fall_of_wicket,
        })
    }

    /// Checks who is on the field and returns the batter dismissed, if any.
    fn check_players(&self, input: &DeliveryInput) -> Result<Option<Uuid>> {
        if input.striker_id == input.non_striker_id {
            return Err(ScoringError::validation("striker and non-striker must differ"));
        }
        if input.bowler_id == input.striker_id || input.bowler_id == input.non_striker_id {
            return Err(ScoringError::validation("the bowler cannot also be batting"));
        }
        for batter in [input.striker_id, input.non_striker_id] {
            if !self.batting_squad.is_empty() && !self.batting_squad.contains(&batter) {
                return Err(ScoringError::InvalidReference(format!(
                    "batter {batter} is not in the batting side's squad"
                )));
            }
        }
        let fielding = std::iter::once(input.bowler_id)
            .chain(input.fielder1_id)
            .chain(input.fielder2_id);
        for fielder in fielding {
            if !self.bowling_squad.is_empty() && !self.bowling_squad.contains(&fielder) {
                return Err(ScoringError::InvalidReference(format!(
                    "player {fielder} is not in the fielding side's squad"
                )));
            }
        }
        let dismissed = self.dismissed();
        for batter in [input.striker_id, input.non_striker_id] {
            if dismissed.contains(&batter) {
                return Err(ScoringError::validation(format!(
                    "batter {batter} has already been dismissed in this innings"
                )));
            }
        }

        let Some(dismissal) = input.dismissal_type else {
            return Ok(None);
        };
        let out = input.player_out_id.unwrap_or(input.striker_id);
        if out != input.striker_id && out != input.non_striker_id {
            return Err(ScoringError::InvalidReference(format!(
                "player {out} is not at the crease"
            )));
        }
        if out != input.striker_id && !dismissal.either_batter() {
            return Err(ScoringError::validation(format!(
                "only the striker can be out {dismissal}"
            )));
        }
        Ok(Some(out))
    }

    /// Recomputes the innings figures and fall of wickets from the ledger.
    /// Returns whether the stored figures had drifted.
    pub fn rebuild(&mut self) -> bool {
        let totals = InningTotals::fold(&self.deliveries);
        let fall_of_wickets = fold_fall_of_wickets(&self.inning, &self.deliveries);
        let drifted = totals != self.inning.totals || fall_of_wickets != self.fall_of_wickets;
        self.inning.totals = totals;
        self.fall_of_wickets = fall_of_wickets;
        drifted
    }

    pub fn is_consistent(&self) -> bool {
        InningTotals::fold(&self.deliveries) == self.inning.totals
            && fold_fall_of_wickets(&self.inning, &self.deliveries) == self.fall_of_wickets
    }
}

fn wicket_fallen(inning: &Inning, delivery: &BallDelivery) -> Option<FallOfWicket> {
    if !delivery.is_wicket {
        return None;
    }
    let player_out_id = delivery.player_out_id?;
    Some(FallOfWicket {
        inning_id: inning.id,
        wicket_number: inning.totals.wickets,
        delivery_id: delivery.id,
        player_out_id,
        score_at_wicket: inning.totals.score,
        balls_at_wicket: inning.totals.balls,
        overs_at_wicket: inning.totals.overs().to_string(),
    })
}

/// Fall of wickets derived from scratch, one per wicket ball in order.
pub fn fold_fall_of_wickets(inning: &Inning, deliveries: &[BallDelivery]) -> Vec<FallOfWicket> {
    let mut running = inning.clone();
    running.totals = InningTotals::default();
    deliveries
        .iter()
        .filter_map(|delivery| {
            running.totals.apply(delivery);
            wicket_fallen(&running, delivery)
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::fixture::{Match, MatchCommand, MatchDraft, NewMatchRequest};
    use chrono::Duration;
    use proptest::prelude::*;

    pub(crate) struct Side {
        pub bowler: Uuid,
        pub striker: Uuid,
        pub non_striker: Uuid,
    }

    pub(crate) fn side() -> Side {
        Side {
            bowler: Uuid::new_v4(),
            striker: Uuid::new_v4(),
            non_striker: Uuid::new_v4(),
        }
    }

    pub(crate) fn live_sheet(overs: Option<i32>) -> MatchSheet {
        let now = Utc::now();
        let MatchDraft { mut fixture, teams } = Match::arrange(
            NewMatchRequest {
                home_team_id: Uuid::new_v4(),
                away_team_id: Uuid::new_v4(),
                sport_id: Uuid::new_v4(),
                venue_id: None,
                scheduled_at: now + Duration::hours(1),
                overs_per_innings: overs,
                ball_type: None,
                entry_fee: None,
            },
            Uuid::new_v4(),
            Uuid::new_v4(),
            now,
        )
        .unwrap();
        fixture.apply(&MatchCommand::Confirm, &teams, now).unwrap();
        fixture.apply(&MatchCommand::Start, &teams, now).unwrap();
        MatchSheet {
            fixture,
            teams,
            players: vec![],
        }
    }

    pub(crate) fn ledger(overs: Option<i32>) -> InningLedger {
        let sheet = live_sheet(overs);
        let request = OpenInningsRequest {
            batting_team_id: sheet.teams[0].team_id,
            bowling_team_id: sheet.teams[1].team_id,
            target: None,
        };
        let inning = Inning::open(&sheet, &[], &request, 11, Uuid::new_v4(), Utc::now()).unwrap();
        InningLedger::new(inning, sheet.fixture.status)
    }

    pub(crate) fn ball(side: &Side, runs: i32) -> DeliveryInput {
        DeliveryInput {
            bowler_id: side.bowler,
            striker_id: side.striker,
            non_striker_id: side.non_striker,
            runs_scored: runs,
            is_four: runs == 4,
            is_six: runs == 6,
            ..Default::default()
        }
    }

    pub(crate) fn extra(side: &Side, kind: ExtraType, runs: i32) -> DeliveryInput {
        DeliveryInput {
            is_extra: true,
            extra_type: Some(kind),
            extra_runs: runs,
            ..ball(side, 0)
        }
    }

    pub(crate) fn bowled(side: &Side) -> DeliveryInput {
        DeliveryInput {
            is_wicket: true,
            dismissal_type: Some(DismissalType::Bowled),
            ..ball(side, 0)
        }
    }

    fn record(ledger: &mut InningLedger, input: DeliveryInput) -> Result<RecordedDelivery> {
        ledger.record(input, Uuid::new_v4(), Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn first_over_with_a_wicket() {
        let side = side();
        let mut ledger = ledger(None);
        for runs in [1, 4, 0, 6, 1] {
            record(&mut ledger, ball(&side, runs)).unwrap();
        }
        let last = record(&mut ledger, bowled(&side)).unwrap();

        let inning = &ledger.inning;
        assert_eq!(inning.status, InningStatus::InProgress);
        assert_eq!(inning.totals.score, 12);
        assert_eq!(inning.totals.wickets, 1);
        assert_eq!(inning.totals.balls, 6);
        assert_eq!(inning.overs().to_string(), "1.0");
        assert_eq!(last.delivery.ball_label(), "0.6");

        let fow = last.fall_of_wicket.unwrap();
        assert_eq!(fow.wicket_number, 1);
        assert_eq!(fow.score_at_wicket, 12);
        assert_eq!(fow.overs_at_wicket, "1.0");
        assert_eq!(fow.player_out_id, side.striker);
        assert_eq!(ledger.fall_of_wickets.len(), 1);
        assert!(ledger.is_consistent());
    }

    #[test]
    fn illegal_balls_do_not_advance_the_over() {
        let side = side();
        let mut ledger = ledger(None);
        let wide = record(&mut ledger, extra(&side, ExtraType::Wide, 1)).unwrap();
        assert!(!wide.delivery.is_legal_delivery);
        assert_eq!((wide.delivery.over_number, wide.delivery.ball_number), (0, 1));
        assert_eq!(wide.delivery.delivery_in_over, 1);

        let first = record(&mut ledger, ball(&side, 2)).unwrap();
        assert_eq!((first.delivery.ball_number, first.delivery.delivery_in_over), (1, 2));

        let no_ball = record(&mut ledger, extra(&side, ExtraType::NoBall, 1)).unwrap();
        assert_eq!((no_ball.delivery.ball_number, no_ball.delivery.delivery_in_over), (2, 3));

        for _ in 0..5 {
            record(&mut ledger, ball(&side, 0)).unwrap();
        }
        let next = ledger.next_position();
        assert_eq!((next.over_number, next.ball_number, next.delivery_in_over), (1, 1, 1));
        assert_eq!(ledger.inning.totals.balls, 6);
        assert_eq!(ledger.inning.totals.score, 4);
        assert_eq!(ledger.inning.totals.extras.wides, 1);
        assert_eq!(ledger.inning.totals.extras.no_balls, 1);
    }

    #[test]
    fn no_ball_runs_split_between_no_ball_and_byes() {
        let side = side();
        let mut ledger = ledger(None);
        record(&mut ledger, extra(&side, ExtraType::NoBall, 3)).unwrap();
        let mut hit = extra(&side, ExtraType::NoBall, 1);
        hit.runs_scored = 4;
        hit.is_four = true;
        let hit = record(&mut ledger, hit).unwrap();

        let totals = ledger.inning.totals;
        assert_eq!(totals.score, 8);
        assert_eq!(totals.extras.no_balls, 2);
        assert_eq!(totals.extras.byes, 2);
        assert_eq!(totals.balls, 0);
        assert_eq!(hit.delivery.bowler_runs(), 5);
    }

    #[test]
    fn wicket_without_dismissal_type_appends_nothing() {
        let side = side();
        let mut ledger = ledger(None);
        let mut input = ball(&side, 0);
        input.is_wicket = true;
        let err = record(&mut ledger, input).unwrap_err();
        assert!(matches!(err, ScoringError::Validation(_)));
        assert!(ledger.deliveries.is_empty());
        assert_eq!(ledger.inning.status, InningStatus::NotStarted);
    }

    #[test]
    fn finished_match_takes_no_more_balls() {
        let side = side();
        let mut ledger = ledger(None);
        record(&mut ledger, ball(&side, 1)).unwrap();
        for status in [MatchStatus::Completed, MatchStatus::Abandoned, MatchStatus::Cancelled] {
            ledger.match_status = status;
            let err = record(&mut ledger, ball(&side, 4)).unwrap_err();
            assert!(matches!(err, ScoringError::InvalidState { entity: "match", .. }));
        }
        assert_eq!(ledger.deliveries.len(), 1);
        assert_eq!(ledger.inning.totals.score, 1);
    }

    #[test]
    fn run_out_needs_a_fielder_and_may_take_the_non_striker() {
        let side = side();
        let mut ledger = ledger(None);
        let mut input = DeliveryInput {
            is_wicket: true,
            dismissal_type: Some(DismissalType::RunOut),
            player_out_id: Some(side.non_striker),
            ..ball(&side, 1)
        };
        assert!(matches!(
            record(&mut ledger, input.clone()),
            Err(ScoringError::Validation(_))
        ));

        input.fielder1_id = Some(Uuid::new_v4());
        let out = record(&mut ledger, input).unwrap();
        assert_eq!(out.delivery.player_out_id, Some(side.non_striker));
        assert_eq!(out.fall_of_wicket.unwrap().score_at_wicket, 1);

        // the dismissed batter cannot come back
        assert!(record(&mut ledger, ball(&side, 0)).is_err());
    }

    #[test]
    fn only_the_striker_is_bowled() {
        let side = side();
        let mut ledger = ledger(None);
        let input = DeliveryInput {
            player_out_id: Some(side.non_striker),
            ..bowled(&side)
        };
        assert!(matches!(
            record(&mut ledger, input),
            Err(ScoringError::Validation(_))
        ));
    }

    #[test]
    fn bowled_off_a_no_ball_is_impossible() {
        let side = side();
        let mut ledger = ledger(None);
        let input = DeliveryInput {
            is_extra: true,
            extra_type: Some(ExtraType::NoBall),
            extra_runs: 1,
            ..bowled(&side)
        };
        assert!(record(&mut ledger, input).is_err());
    }

    #[test]
    fn stale_sequence_is_an_ordering_error() {
        let side = side();
        let mut ledger = ledger(None);
        record(&mut ledger, ball(&side, 1)).unwrap();
        record(&mut ledger, ball(&side, 1)).unwrap();

        let mut late = ball(&side, 2);
        late.sequence = Some(2);
        let err = record(&mut ledger, late).unwrap_err();
        assert!(matches!(err, ScoringError::Ordering(_)));
        assert_eq!(ledger.deliveries.len(), 2);

        let mut next = ball(&side, 2);
        next.sequence = Some(3);
        assert_eq!(record(&mut ledger, next).unwrap().delivery.sequence, 3);
    }

    #[test]
    fn squads_are_enforced_when_selected() {
        let side = side();
        let ledger_base = ledger(None);
        let mut ledger = ledger_base.with_squads(vec![side.striker, side.non_striker], vec![Uuid::new_v4()]);
        let err = record(&mut ledger, ball(&side, 0)).unwrap_err();
        assert!(matches!(err, ScoringError::InvalidReference(_)));
    }

    #[test]
    fn declared_innings_takes_no_more_balls() {
        let side = side();
        let mut ledger = ledger(None);
        record(&mut ledger, ball(&side, 1)).unwrap();
        ledger.inning.apply(InningCommand::Declare, Utc::now()).unwrap();
        assert_eq!(ledger.inning.status, InningStatus::Declared);
        assert!(matches!(
            record(&mut ledger, ball(&side, 1)),
            Err(ScoringError::InvalidState { .. })
        ));
        assert!(ledger.inning.apply(InningCommand::Forfeit, Utc::now()).is_err());
    }

    #[test]
    fn innings_closes_when_overs_run_out() {
        let side = side();
        let mut ledger = ledger(Some(1));
        for _ in 0..6 {
            record(&mut ledger, ball(&side, 1)).unwrap();
        }
        assert_eq!(ledger.inning.status, InningStatus::Completed);
        assert!(ledger.inning.completed_at.is_some());
    }

    #[test]
    fn innings_closes_when_all_out() {
        let mut ledger = ledger(None);
        ledger.inning.eligible_batters = 3;
        let bowler = Uuid::new_v4();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let first = Side { bowler, striker: a, non_striker: b };
        record(&mut ledger, bowled(&first)).unwrap();
        let second = Side { bowler, striker: c, non_striker: b };
        record(&mut ledger, bowled(&second)).unwrap();
        assert_eq!(ledger.inning.totals.wickets, 2);
        assert_eq!(ledger.inning.status, InningStatus::Completed);
    }

    #[test]
    fn second_innings_chases_first_score() {
        let mut sheet = live_sheet(Some(20));
        let (home, away) = (sheet.teams[0].team_id, sheet.teams[1].team_id);
        let now = Utc::now();
        let first_request = OpenInningsRequest {
            batting_team_id: home,
            bowling_team_id: away,
            target: None,
        };
        let mut first = Inning::open(&sheet, &[], &first_request, 11, Uuid::new_v4(), now).unwrap();
        assert!(first.target.is_none());

        let blocked = Inning::open(&sheet, &[first.clone()], &first_request, 11, Uuid::new_v4(), now);
        assert!(matches!(blocked, Err(ScoringError::InvalidState { .. })));

        first.totals.score = 150;
        first.status = InningStatus::Completed;
        let chase = OpenInningsRequest {
            batting_team_id: away,
            bowling_team_id: home,
            target: None,
        };
        let second = Inning::open(&sheet, &[first], &chase, 11, Uuid::new_v4(), now).unwrap();
        assert_eq!(second.innings_number, 2);
        assert_eq!(second.target, Some(151));

        sheet.fixture.status = MatchStatus::Completed;
        assert!(Inning::open(&sheet, &[], &chase, 11, Uuid::new_v4(), now).is_err());
    }

    #[test]
    fn rebuild_repairs_drift() {
        let side = side();
        let mut ledger = ledger(None);
        record(&mut ledger, ball(&side, 4)).unwrap();
        record(&mut ledger, bowled(&side)).unwrap();
        ledger.inning.totals.score = 99;
        ledger.fall_of_wickets.clear();
        assert!(!ledger.is_consistent());

        assert!(ledger.rebuild());
        assert!(ledger.is_consistent());
        assert_eq!(ledger.inning.totals.score, 4);
        assert_eq!(ledger.fall_of_wickets.len(), 1);
        assert!(!ledger.rebuild());
    }

    #[test]
    fn overs_notation() {
        assert_eq!(Overs::from_balls(0).to_string(), "0.0");
        assert_eq!(Overs::from_balls(14).to_string(), "2.2");
        assert_eq!(Overs::from_balls(14).notation(), 2.2);
        assert_eq!(Overs::from_balls(120).to_string(), "20.0");
        assert_eq!(Overs::from_balls(17).as_balls(), 17);
    }

    #[derive(Debug, Clone)]
    enum Kind {
        Runs(i32),
        Wide(i32),
        NoBall(i32),
        Bye(i32),
        Wicket,
    }

    fn kind() -> impl Strategy<Value = Kind> {
        prop_oneof![
            6 => (0..=6i32).prop_map(Kind::Runs),
            1 => (1..=5i32).prop_map(Kind::Wide),
            1 => (1..=5i32).prop_map(Kind::NoBall),
            1 => (1..=4i32).prop_map(Kind::Bye),
            1 => Just(Kind::Wicket),
        ]
    }

    proptest! {
        #[test]
        fn ledger_figures_are_a_fold(kinds in proptest::collection::vec(kind(), 0..80)) {
            let mut ledger = ledger(None);
            ledger.inning.eligible_batters = 100;
            let bowler = Uuid::new_v4();
            let mut striker = Uuid::new_v4();
            let non_striker = Uuid::new_v4();

            for k in kinds {
                let side = Side { bowler, striker, non_striker };
                let input = match k {
                    Kind::Runs(r) => DeliveryInput { is_four: r == 4, is_six: r == 6, ..ball(&side, r) },
                    Kind::Wide(r) => extra(&side, ExtraType::Wide, r),
                    Kind::NoBall(r) => extra(&side, ExtraType::NoBall, r),
                    Kind::Bye(r) => extra(&side, ExtraType::Bye, r),
                    Kind::Wicket => bowled(&side),
                };
                let recorded = record(&mut ledger, input).unwrap();
                if recorded.delivery.is_wicket {
                    striker = Uuid::new_v4();
                }
            }

            let d = &ledger.deliveries;
            let totals = ledger.inning.totals;
            prop_assert_eq!(totals.balls, d.iter().filter(|d| d.is_legal_delivery).count() as i32);
            prop_assert_eq!(totals.score, d.iter().map(|d| d.runs_scored + d.extra_runs).sum::<i32>());
            prop_assert_eq!(ledger.fall_of_wickets.len(), d.iter().filter(|d| d.is_wicket).count());
            let numbers: Vec<i32> = ledger.fall_of_wickets.iter().map(|f| f.wicket_number).collect();
            let expected: Vec<i32> = (1..=numbers.len() as i32).collect();
            prop_assert_eq!(numbers, expected);
            prop_assert_eq!(ledger.inning.overs().as_balls(), totals.balls);
            prop_assert!(ledger.is_consistent());
            for (i, delivery) in d.iter().enumerate() {
                prop_assert_eq!(delivery.sequence, i as i32 + 1);
                prop_assert!(delivery.ball_number >= 1 && delivery.ball_number <= 6);
            }
        }
    }
}
