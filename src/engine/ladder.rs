//! Elo ladder: ratings, a dense global ranking and per-player streaks.

use std::sync::Arc;

use log::info;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    records::{LadderMatch, Standing, User},
    repo::{MatchRepository, StandingRepository},
    types::Timestamp,
};

/// Rating difference at which the stronger player is expected to win 10:1.
const ELO_SCALE: f64 = 400.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LadderConfig {
    /// Maximum rating change per match.
    pub k_factor: f64,
    /// Rating of a player before their first match.
    pub base_rating: f64,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            k_factor: 20.0,
            base_rating: 400.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum LadderError {
    #[error("{0} cannot play against themselves")]
    SamePlayer(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Elo {
    pub k_factor: f64,
}

impl Elo {
    /// Probability that a player rated `rating` beats one rated `opponent`.
    pub fn expected(rating: f64, opponent: f64) -> f64 {
        1.0 / (1.0 + 10f64.powf((opponent - rating) / ELO_SCALE))
    }

    /// New `(winner, loser)` ratings, rounded to two decimals.
    pub fn game_over(&self, winner: f64, loser: f64) -> (f64, f64) {
        let gain = self.k_factor * (1.0 - Self::expected(winner, loser));
        (round2(winner + gain), round2(loser - gain))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A value before and after a match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delta<T> {
    pub before: T,
    pub after: T,
}

impl Delta<f64> {
    pub fn change(&self) -> f64 {
        round2(self.after - self.before)
    }
}

impl Delta<u32> {
    /// Positive when the player climbed.
    pub fn change(&self) -> i64 {
        i64::from(self.before) - i64::from(self.after)
    }
}

impl Delta<i32> {
    pub fn change(&self) -> i32 {
        self.after - self.before
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub player: String,
    pub rating: Delta<f64>,
    pub rank: Delta<u32>,
    pub streak: Delta<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub winner: MatchResult,
    pub loser: MatchResult,
    /// Every standing written for this match, including players whose rank
    /// moved without playing.
    pub updates: Vec<Standing>,
}

/// Next streak after a result: `1` for a win, `-1` for a loss.
pub fn advance_streak(streak: i32, outcome: i32) -> i32 {
    if streak.signum() == outcome.signum() {
        streak + outcome
    } else {
        outcome
    }
}

/// Sorts best first: rating descending, then player name.
pub fn sort_standings(standings: &mut [Standing]) {
    standings.sort_by(|a, b| b.rating.total_cmp(&a.rating).then_with(|| a.player.cmp(&b.player)));
}

/// Splices `changed` into `all`, re-ranks everyone and returns the standings
/// to store: those whose rank moved plus every changed one.
pub fn rank_changes(mut all: Vec<Standing>, changed: &[Standing]) -> Vec<Standing> {
    for standing in changed {
        match all.iter_mut().find(|s| s.player == standing.player) {
            Some(slot) => *slot = standing.clone(),
            None => all.push(standing.clone()),
        }
    }
    sort_standings(&mut all);

    all.into_iter()
        .zip(1u32..)
        .filter_map(|(standing, rank)| {
            let was_changed = changed.iter().any(|c| c.player == standing.player);
            (standing.rank != rank || was_changed).then(|| Standing { rank, ..standing })
        })
        .collect()
}

pub struct Ladder {
    standings: Arc<dyn StandingRepository>,
    matches: Arc<dyn MatchRepository>,
    elo: Elo,
    base_rating: f64,
    lock: Mutex<()>,
}

impl Ladder {
    pub fn new(
        standings: Arc<dyn StandingRepository>,
        matches: Arc<dyn MatchRepository>,
        config: &LadderConfig,
    ) -> Self {
        Self {
            standings,
            matches,
            elo: Elo {
                k_factor: config.k_factor,
            },
            base_rating: config.base_rating,
            lock: Mutex::new(()),
        }
    }

    /// Stored standing, or the default one for players without matches.
    pub fn standing(&self, player: &User) -> Standing {
        match self.standings.standing(&player.full_name) {
            Some(standing) => standing.as_ref().clone(),
            None => Standing {
                telegram_username: (!player.telegram_username.is_empty())
                    .then(|| player.telegram_username.clone()),
                ..Standing::new(player.full_name.as_str(), self.base_rating)
            },
        }
    }

    pub fn streak(&self, player: &User) -> i32 {
        self.matches.streak(&player.full_name)
    }

    /// Every standing, best first.
    pub fn standings(&self) -> Vec<Arc<Standing>> {
        self.standings.all_standings()
    }

    /// Records a match: updates both ratings, re-ranks the whole ladder and
    /// stores every moved standing in one batch before appending the match.
    pub async fn record_result(
        &self,
        winner: &User,
        loser: &User,
        at: Timestamp,
    ) -> Result<MatchOutcome, LadderError> {
        if winner.full_name == loser.full_name {
            return Err(LadderError::SamePlayer(winner.full_name.clone()));
        }
        let _guard = self.lock.lock().await;

        let old_winner = self.standing(winner);
        let old_loser = self.standing(loser);
        let winner_streak = self.streak(winner);
        let loser_streak = self.streak(loser);

        let (winner_rating, loser_rating) = self.elo.game_over(old_winner.rating, old_loser.rating);
        let played = [
            Standing {
                rating: winner_rating,
                wins: old_winner.wins + 1,
                ..old_winner.clone()
            },
            Standing {
                rating: loser_rating,
                losses: old_loser.losses + 1,
                ..old_loser.clone()
            },
        ];

        let all = self
            .standings
            .all_standings()
            .iter()
            .map(|s| s.as_ref().clone())
            .collect();
        let updates = rank_changes(all, &played);

        self.standings.save_all(updates.clone()).await;
        self.matches
            .insert(LadderMatch {
                date: at,
                winner: winner.full_name.clone(),
                loser: loser.full_name.clone(),
            })
            .await;

        info!(
            "ladder: {} beat {}, {} standings updated",
            winner.full_name,
            loser.full_name,
            updates.len()
        );

        let result = |old: &Standing, streak: i32, outcome: i32| {
            let new = updates
                .iter()
                .find(|s| s.player == old.player)
                .unwrap_or(old);
            MatchResult {
                player: old.player.clone(),
                rating: Delta {
                    before: old.rating,
                    after: new.rating,
                },
                rank: Delta {
                    before: old.rank,
                    after: new.rank,
                },
                streak: Delta {
                    before: streak,
                    after: advance_streak(streak, outcome),
                },
            }
        };

        Ok(MatchOutcome {
            winner: result(&old_winner, winner_streak, 1),
            loser: result(&old_loser, loser_streak, -1),
            updates,
        })
    }
}
