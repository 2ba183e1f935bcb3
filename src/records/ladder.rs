use serde::{Deserialize, Serialize};

use crate::{core::index::Record, types::Timestamp};

/// A player's position on the ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub player: String,
    pub rating: f64,
    pub wins: u32,
    pub losses: u32,
    /// 1 is the best.
    pub rank: u32,
    pub telegram_username: Option<String>,
}

impl Standing {
    /// Fresh standing for a player without matches.
    pub fn new(player: impl Into<String>, rating: f64) -> Self {
        Self {
            player: player.into(),
            rating,
            wins: 0,
            losses: 0,
            rank: 1,
            telegram_username: None,
        }
    }

    pub fn matches(&self) -> u32 {
        self.wins + self.losses
    }
}

impl Record for Standing {
    type Id = String;

    fn id(&self) -> String {
        self.player.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderMatch {
    pub date: Timestamp,
    pub winner: String,
    pub loser: String,
}

impl LadderMatch {
    /// `1` if `player` won, `-1` if they lost, `0` if they did not play.
    pub fn outcome_for(&self, player: &str) -> i32 {
        if self.winner == player {
            1
        } else if self.loser == player {
            -1
        } else {
            0
        }
    }
}

/// A match is identified by its date and players. Rows repeating all three
/// describe one game and are indexed once.
impl Record for LadderMatch {
    type Id = (Timestamp, String, String);

    fn id(&self) -> Self::Id {
        (self.date, self.winner.clone(), self.loser.clone())
    }
}
