//! Player statistics derived from the delivery ledger.
//!
//! Nothing here is authoritative. A [`PlayerMatchStat`] is the fold of one
//! player's part in one innings of a match, and a [`PlayerOverallCricketStat`]
//! is the fold of that player's completed-match rows. Both are rebuilt whole
//! rather than patched, so recomputing twice gives the same row.

use crate::model::innings::{BallDelivery, DismissalType, ExtraType, Inning, Overs, BALLS_PER_OVER};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Runs per 100 balls, zero before a ball is faced.
pub fn strike_rate(runs: i32, balls: i32) -> f64 {
    if balls > 0 {
        round2(runs as f64 * 100.0 / balls as f64)
    } else {
        0.0
    }
}

/// Runs conceded per six-ball over, zero before a ball is bowled.
pub fn economy(runs: i32, balls: i32) -> f64 {
    if balls > 0 {
        round2(runs as f64 * BALLS_PER_OVER as f64 / balls as f64)
    } else {
        0.0
    }
}

fn average(runs: i32, outs: i32) -> Option<f64> {
    (outs > 0).then(|| round2(runs as f64 / outs as f64))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BattingFigures {
    pub innings: i32,
    pub runs: i32,
    pub balls_faced: i32,
    pub fours: i32,
    pub sixes: i32,
    pub dismissals: i32,
    /// Best single-innings score in the match.
    pub highest: i32,
    pub fifties: i32,
    pub hundreds: i32,
    pub strike_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BowlingFigures {
    pub balls: i32,
    pub runs_conceded: i32,
    pub wickets: i32,
    pub maidens: i32,
    pub wides: i32,
    pub no_balls: i32,
    pub economy: f64,
}

impl BowlingFigures {
    pub fn overs(&self) -> Overs {
        Overs::from_balls(self.balls)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldingFigures {
    pub catches: i32,
    pub stumpings: i32,
    pub run_outs: i32,
}

/// One player's figures for one innings of a match. A two-innings-a-side
/// match gives a player up to four rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMatchStat {
    pub match_id: Uuid,
    pub user_id: Uuid,
    pub innings_number: i32,
    pub batting: BattingFigures,
    pub bowling: BowlingFigures,
    pub fielding: FieldingFigures,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Everyone who took part in any of the given deliveries.
pub fn participants(deliveries: &[BallDelivery]) -> BTreeSet<Uuid> {
    appearances(deliveries.iter())
}

fn appearances<'a>(deliveries: impl Iterator<Item = &'a BallDelivery>) -> BTreeSet<Uuid> {
    deliveries
        .flat_map(|d| {
            [d.striker_id, d.non_striker_id, d.bowler_id]
                .into_iter()
                .chain(d.fielders())
        })
        .collect()
}

impl PlayerMatchStat {
    /// Folds the innings' deliveries, in ledger order, into one player's row.
    /// Deliveries from other innings are skipped.
    pub fn fold(inning: &Inning, user_id: Uuid, deliveries: &[BallDelivery], now: DateTime<Utc>) -> Self {
        let mut batting = BattingFigures::default();
        let mut bowling = BowlingFigures::default();
        let mut fielding = FieldingFigures::default();
        let mut innings_runs: BTreeMap<Uuid, i32> = BTreeMap::new();
        // (inning, over) -> (legal balls, runs charged)
        let mut overs: BTreeMap<(Uuid, i32), (i32, i32)> = BTreeMap::new();

        for d in deliveries.iter().filter(|d| d.inning_id == inning.id) {
            if d.striker_id == user_id || d.non_striker_id == user_id {
                innings_runs.entry(d.inning_id).or_default();
            }
            if d.striker_id == user_id {
                batting.runs += d.runs_scored;
                *innings_runs.entry(d.inning_id).or_default() += d.runs_scored;
                if d.is_faced() {
                    batting.balls_faced += 1;
                }
                if d.is_four {
                    batting.fours += 1;
                }
                if d.is_six {
                    batting.sixes += 1;
                }
            }
            if d.player_out_id == Some(user_id) {
                batting.dismissals += 1;
            }

            if d.bowler_id == user_id {
                let runs = d.bowler_runs();
                bowling.runs_conceded += runs;
                if d.is_legal_delivery {
                    bowling.balls += 1;
                }
                match d.extra_type {
                    Some(ExtraType::Wide) => bowling.wides += 1,
                    Some(ExtraType::NoBall) => bowling.no_balls += 1,
                    _ => {}
                }
                if d.dismissal_type.map_or(false, DismissalType::credited_to_bowler) {
                    bowling.wickets += 1;
                }
                let over = overs.entry((d.inning_id, d.over_number)).or_default();
                if d.is_legal_delivery {
                    over.0 += 1;
                }
                over.1 += runs;
            }

            match d.dismissal_type {
                Some(DismissalType::Caught) if d.fielder1_id == Some(user_id) => fielding.catches += 1,
                Some(DismissalType::Stumped) if d.fielder1_id == Some(user_id) => {
                    fielding.stumpings += 1
                }
                Some(DismissalType::RunOut) => {
                    fielding.run_outs += d.fielders().filter(|f| *f == user_id).count() as i32
                }
                _ => {}
            }
        }

        batting.innings = innings_runs.len() as i32;
        for runs in innings_runs.into_values() {
            batting.highest = batting.highest.max(runs);
            if runs >= 100 {
                batting.hundreds += 1;
            } else if runs >= 50 {
                batting.fifties += 1;
            }
        }
        batting.strike_rate = strike_rate(batting.runs, batting.balls_faced);
        bowling.maidens = overs
            .values()
            .filter(|(balls, runs)| *balls == BALLS_PER_OVER && *runs == 0)
            .count() as i32;
        bowling.economy = economy(bowling.runs_conceded, bowling.balls);

        PlayerMatchStat {
            match_id: inning.match_id,
            user_id,
            innings_number: inning.innings_number,
            batting,
            bowling,
            fielding,
            updated_at: now,
        }
    }

    /// A row per innings for everyone who appears in it, innings by innings.
    pub fn fold_match(innings: &[Inning], deliveries: &[BallDelivery], now: DateTime<Utc>) -> Vec<Self> {
        innings
            .iter()
            .flat_map(|inning| {
                appearances(deliveries.iter().filter(|d| d.inning_id == inning.id))
                    .into_iter()
                    .map(move |user_id| Self::fold(inning, user_id, deliveries, now))
            })
            .collect()
    }

    /// One player's rows, for the innings they appear in.
    pub fn fold_player(
        innings: &[Inning],
        user_id: Uuid,
        deliveries: &[BallDelivery],
        now: DateTime<Utc>,
    ) -> Vec<Self> {
        innings
            .iter()
            .filter(|inning| {
                appearances(deliveries.iter().filter(|d| d.inning_id == inning.id)).contains(&user_id)
            })
            .map(|inning| Self::fold(inning, user_id, deliveries, now))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestBowling {
    pub wickets: i32,
    pub runs: i32,
}

impl BestBowling {
    /// More wickets wins, then fewer runs.
    fn beats(&self, other: &BestBowling) -> bool {
        (self.wickets, -self.runs) > (other.wickets, -other.runs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerOverallCricketStat {
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
    pub best_bowling: Option<BestBowling>,
    pub bowling_average: Option<f64>,
    pub economy: f64,
    pub catches: i32,
    pub stumpings: i32,
    pub run_outs: i32,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl PlayerOverallCricketStat {
    pub fn empty(user_id: Uuid, now: DateTime<Utc>) -> Self {
        PlayerOverallCricketStat {
            user_id,
            matches: 0,
            batting_innings: 0,
            not_outs: 0,
            runs: 0,
            balls_faced: 0,
            fours: 0,
            sixes: 0,
            highest_score: 0,
            fifties: 0,
            hundreds: 0,
            batting_average: None,
            strike_rate: 0.0,
            balls_bowled: 0,
            runs_conceded: 0,
            wickets: 0,
            maidens: 0,
            best_bowling: None,
            bowling_average: None,
            economy: 0.0,
            catches: 0,
            stumpings: 0,
            run_outs: 0,
            updated_at: now,
        }
    }

    /// The career row for a player, from every completed-match row they have.
    pub fn rebuild(user_id: Uuid, match_stats: &[PlayerMatchStat], now: DateTime<Utc>) -> Self {
        let mut by_match: BTreeMap<Uuid, Vec<&PlayerMatchStat>> = BTreeMap::new();
        for stat in match_stats.iter().filter(|s| s.user_id == user_id) {
            by_match.entry(stat.match_id).or_default().push(stat);
        }
        let mut career = Self::empty(user_id, now);
        for rows in by_match.into_values() {
            career.absorb_match(rows);
        }
        career.refresh_rates();
        career
    }

    /// Adds one match's innings rows. Rates are left stale until
    /// [`Self::refresh_rates`].
    pub fn absorb_match<'a>(&mut self, innings: impl IntoIterator<Item = &'a PlayerMatchStat>) {
        let mut played = false;
        for stat in innings {
            self.absorb_innings(stat);
            played = true;
        }
        if played {
            self.matches += 1;
        }
    }

    fn absorb_innings(&mut self, stat: &PlayerMatchStat) {
        let batting = &stat.batting;
        let bowling = &stat.bowling;

        self.batting_innings += batting.innings;
        self.not_outs += (batting.innings - batting.dismissals).max(0);
        self.runs += batting.runs;
        self.balls_faced += batting.balls_faced;
        self.fours += batting.fours;
        self.sixes += batting.sixes;
        self.highest_score = self.highest_score.max(batting.highest);
        self.fifties += batting.fifties;
        self.hundreds += batting.hundreds;

        self.balls_bowled += bowling.balls;
        self.runs_conceded += bowling.runs_conceded;
        self.wickets += bowling.wickets;
        self.maidens += bowling.maidens;
        if bowling.balls > 0 {
            let figures = BestBowling {
                wickets: bowling.wickets,
                runs: bowling.runs_conceded,
            };
            if self.best_bowling.map_or(true, |best| figures.beats(&best)) {
                self.best_bowling = Some(figures);
            }
        }

        self.catches += stat.fielding.catches;
        self.stumpings += stat.fielding.stumpings;
        self.run_outs += stat.fielding.run_outs;
    }

    pub fn refresh_rates(&mut self) {
        self.batting_average = average(self.runs, self.batting_innings - self.not_outs);
        self.strike_rate = strike_rate(self.runs, self.balls_faced);
        self.bowling_average = average(self.runs_conceded, self.wickets);
        self.economy = economy(self.runs_conceded, self.balls_bowled);
    }
}
