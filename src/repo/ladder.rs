use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    core::{
        index::{Index, IndexSet, KeyFn, Record},
        indices::{SortedBucketIndex, UniqueIndex},
        table::{Table, TableSchema, WritableSchema},
    },
    op::Row,
    records::{LadderMatch, Standing},
    runtime::database::Database,
    types::{Timestamp, format_timestamp, parse_timestamp},
};

use super::{parse_f64, parse_u32};

#[async_trait]
pub trait MatchRepository: Send + Sync {
    async fn insert(&self, game: LadderMatch) -> Arc<LadderMatch>;

    /// Matches `player` took part in, oldest first.
    fn matches(&self, player: &str) -> Vec<Arc<LadderMatch>>;

    /// Signed run of equal outcomes ending with the latest match: `3` for three
    /// wins in a row, `-2` for two losses, `0` without matches.
    fn streak(&self, player: &str) -> i32 {
        streak_of(player, &self.matches(player))
    }
}

#[async_trait]
pub trait StandingRepository: Send + Sync {
    fn standing(&self, player: &str) -> Option<Arc<Standing>>;

    /// Every standing, best rank first.
    fn all_standings(&self) -> Vec<Arc<Standing>>;

    /// Updates known players and appends new ones.
    async fn save_all(&self, standings: Vec<Standing>) -> Vec<Arc<Standing>>;
}

/// Streak over `matches`, oldest first.
pub fn streak_of(player: &str, matches: &[Arc<LadderMatch>]) -> i32 {
    let mut streak: i32 = 0;
    for game in matches.iter().rev() {
        let outcome = game.outcome_for(player);
        if outcome == 0 {
            continue;
        }
        if streak != 0 && streak.signum() != outcome {
            break;
        }
        streak += outcome;
    }
    streak
}

pub struct MatchIndexes {
    pub by_player: SortedBucketIndex<LadderMatch, String, Timestamp>,
}

impl IndexSet<LadderMatch> for MatchIndexes {
    fn indexes_mut(&mut self) -> Vec<&mut dyn Index<LadderMatch>> {
        vec![&mut self.by_player]
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MatchSchema;

impl TableSchema for MatchSchema {
    type Record = LadderMatch;
    type Indexes = MatchIndexes;

    fn new_indexes(&self) -> MatchIndexes {
        let by_winner: KeyFn<LadderMatch, String> = Box::new(|game: &LadderMatch| Some(game.winner.clone()));
        let by_loser: KeyFn<LadderMatch, String> = Box::new(|game: &LadderMatch| Some(game.loser.clone()));
        MatchIndexes {
            by_player: SortedBucketIndex::with_keys(vec![by_winner, by_loser], |game: &LadderMatch| game.date),
        }
    }

    fn deserialize(&self, row: &Row) -> Option<LadderMatch> {
        Some(LadderMatch {
            date: parse_timestamp(row.text("date"))?,
            winner: row.non_empty("winner")?.to_string(),
            loser: row.non_empty("loser")?.to_string(),
        })
    }
}

impl WritableSchema for MatchSchema {
    const KEY_COLUMN: &'static str = "date";

    fn serialize(&self, game: &LadderMatch) -> Row {
        Row::new()
            .with("date", format_timestamp(Some(game.date)))
            .with("winner", game.winner.as_str())
            .with("loser", game.loser.as_str())
    }

    fn row_key(&self, game: &LadderMatch) -> String {
        format_timestamp(Some(game.date))
    }

    fn existing(&self, indexes: &MatchIndexes, game: &LadderMatch) -> Option<Arc<LadderMatch>> {
        let id = game.id();
        indexes
            .by_player
            .get_ref(game.winner.as_str())?
            .iter()
            .find(|held| held.id() == id)
            .cloned()
    }
}

pub struct StandingIndexes {
    pub by_player: UniqueIndex<Standing, String>,
}

impl IndexSet<Standing> for StandingIndexes {
    fn indexes_mut(&mut self) -> Vec<&mut dyn Index<Standing>> {
        vec![&mut self.by_player]
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StandingSchema;

impl TableSchema for StandingSchema {
    type Record = Standing;
    type Indexes = StandingIndexes;

    fn new_indexes(&self) -> StandingIndexes {
        StandingIndexes {
            by_player: UniqueIndex::new(|standing: &Standing| Some(standing.player.clone())),
        }
    }

    fn deserialize(&self, row: &Row) -> Option<Standing> {
        let player = row.non_empty("player_name")?;
        let rating = parse_f64(row.text("rating"))?;

        Some(Standing {
            player: player.to_string(),
            rating,
            wins: parse_u32(row.text("wins")).unwrap_or(0),
            losses: parse_u32(row.text("losses")).unwrap_or(0),
            rank: parse_u32(row.text("rank")).filter(|rank| *rank > 0).unwrap_or(1),
            telegram_username: row.non_empty("telegram_username").map(str::to_string),
        })
    }
}

impl WritableSchema for StandingSchema {
    const KEY_COLUMN: &'static str = "player_name";

    fn serialize(&self, standing: &Standing) -> Row {
        Row::new()
            .with("player_name", standing.player.as_str())
            .with("rating", standing.rating.to_string())
            .with("wins", standing.wins.to_string())
            .with("losses", standing.losses.to_string())
            .with("rank", standing.rank.to_string())
            .with(
                "telegram_username",
                standing.telegram_username.clone().unwrap_or_default(),
            )
    }

    fn row_key(&self, standing: &Standing) -> String {
        standing.player.clone()
    }

    fn existing(&self, indexes: &StandingIndexes, standing: &Standing) -> Option<Arc<Standing>> {
        indexes.by_player.get(standing.player.as_str())
    }
}

pub struct SheetMatchRepository {
    table: Table<MatchSchema>,
}

impl SheetMatchRepository {
    pub fn attach(db: Arc<Database>, sheet: &str) -> Self {
        Self {
            table: Table::attach(db, sheet, MatchSchema),
        }
    }

    pub fn table(&self) -> &Table<MatchSchema> {
        &self.table
    }
}

#[async_trait]
impl MatchRepository for SheetMatchRepository {
    async fn insert(&self, game: LadderMatch) -> Arc<LadderMatch> {
        self.table.insert(game).await
    }

    fn matches(&self, player: &str) -> Vec<Arc<LadderMatch>> {
        self.table.read().by_player.get(player).unwrap_or_default()
    }

    fn streak(&self, player: &str) -> i32 {
        let indexes = self.table.read();
        indexes
            .by_player
            .get_ref(player)
            .map_or(0, |matches| streak_of(player, matches))
    }
}

pub struct SheetStandingRepository {
    table: Table<StandingSchema>,
}

impl SheetStandingRepository {
    pub fn attach(db: Arc<Database>, sheet: &str) -> Self {
        Self {
            table: Table::attach(db, sheet, StandingSchema),
        }
    }

    pub fn table(&self) -> &Table<StandingSchema> {
        &self.table
    }
}

#[async_trait]
impl StandingRepository for SheetStandingRepository {
    fn standing(&self, player: &str) -> Option<Arc<Standing>> {
        self.table.read().by_player.get(player)
    }

    fn all_standings(&self) -> Vec<Arc<Standing>> {
        let mut standings: Vec<Arc<Standing>> = self.table.read().by_player.values().cloned().collect();
        standings.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.player.cmp(&b.player)));
        standings
    }

    async fn save_all(&self, standings: Vec<Standing>) -> Vec<Arc<Standing>> {
        self.table.save_all(standings).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn game(minute: u32, winner: &str, loser: &str) -> Arc<LadderMatch> {
        Arc::new(LadderMatch {
            date: NaiveDate::from_ymd_opt(2024, 11, 4)
                .expect("date")
                .and_hms_opt(18, minute, 0)
                .expect("time"),
            winner: winner.into(),
            loser: loser.into(),
        })
    }

    #[test]
    fn streak_counts_the_latest_run() {
        let matches = vec![
            game(1, "ana", "bo"),
            game(2, "bo", "ana"),
            game(3, "ana", "bo"),
            game(4, "ana", "cy"),
        ];
        assert_eq!(streak_of("ana", &matches), 2);
        assert_eq!(streak_of("bo", &matches), -1);
        assert_eq!(streak_of("cy", &matches), -1);
        assert_eq!(streak_of("dan", &matches), 0);
    }

    #[test]
    fn standings_without_rating_are_dropped() {
        let valid = Row::from_pairs([("player_name", "Ana"), ("rating", "412.5"), ("rank", "")]);
        let invalid = Row::from_pairs([("player_name", "Bo"), ("rating", "n/a")]);

        let standing = StandingSchema.deserialize(&valid).expect("valid row");
        assert_eq!(standing.rating, 412.5);
        assert_eq!(standing.rank, 1);
        assert_eq!(standing.wins, 0);
        assert!(StandingSchema.deserialize(&invalid).is_none());
    }
}
