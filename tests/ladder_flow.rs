use std::sync::Arc;

use chrono::NaiveDate;

use clubhouse::{
    engine::ladder::{Ladder, LadderConfig, LadderError, rank_changes},
    persist::memory::{MemoryRecordStore, WriteRecord},
    records::{Standing, User},
    repo::{MatchRepository, SheetMatchRepository, SheetStandingRepository, StandingRepository},
    runtime::database::Database,
    types::Timestamp,
};

const STANDINGS: &str = "Ladder";
const MATCHES: &str = "Matches";

fn at(hour: u32, minute: u32) -> Timestamp {
    NaiveDate::from_ymd_opt(2024, 11, 4)
        .expect("date")
        .and_hms_opt(hour, minute, 0)
        .expect("time")
}

struct Fixture {
    store: Arc<MemoryRecordStore>,
    standings: Arc<SheetStandingRepository>,
    matches: Arc<SheetMatchRepository>,
    ladder: Ladder,
}

async fn fixture(standings: &[&[&str]], matches: &[&[&str]]) -> Fixture {
    let store = Arc::new(MemoryRecordStore::new());
    let mut standing_rows: Vec<&[&str]> = vec![&["Player Name", "Rating (ELO)", "Wins", "Losses", "Rank"]];
    standing_rows.extend_from_slice(standings);
    store.put_rows(STANDINGS, &standing_rows);
    let mut match_rows: Vec<&[&str]> = vec![&["Date", "Winner", "Loser"]];
    match_rows.extend_from_slice(matches);
    store.put_rows(MATCHES, &match_rows);

    let db = Database::new(store.clone());
    let standings = Arc::new(SheetStandingRepository::attach(db.clone(), STANDINGS));
    let matches = Arc::new(SheetMatchRepository::attach(db.clone(), MATCHES));
    db.refresh().await;

    let ladder = Ladder::new(standings.clone(), matches.clone(), &LadderConfig::default());
    Fixture {
        store,
        standings,
        matches,
        ladder,
    }
}

fn ranks(standings: &[Arc<Standing>]) -> Vec<(String, u32)> {
    standings.iter().map(|s| (s.player.clone(), s.rank)).collect()
}

#[tokio::test]
async fn upset_reranks_players_who_did_not_play() {
    let f = fixture(
        &[&["A", "420", "3", "0", "1"], &["B", "405", "1", "1", "2"], &["C", "400", "0", "2", "3"]],
        &[],
    )
    .await;

    let outcome = f
        .ladder
        .record_result(&User::new("C"), &User::new("A"), at(19, 0))
        .await
        .expect("record");

    assert_eq!(outcome.winner.rating.after, 410.58);
    assert_eq!(outcome.loser.rating.after, 409.42);
    assert_eq!((outcome.winner.rank.before, outcome.winner.rank.after), (3, 1));
    assert_eq!(outcome.winner.rank.change(), 2);
    assert_eq!((outcome.loser.rank.before, outcome.loser.rank.after), (1, 2));
    assert_eq!(outcome.loser.rank.change(), -1);

    let mut moved: Vec<(String, u32)> = outcome.updates.iter().map(|s| (s.player.clone(), s.rank)).collect();
    moved.sort();
    assert_eq!(moved, vec![("A".into(), 2), ("B".into(), 3), ("C".into(), 1)]);

    assert_eq!(ranks(&f.standings.all_standings()), vec![("C".into(), 1), ("A".into(), 2), ("B".into(), 3)]);
    let c = f.standings.standing("C").expect("c");
    assert_eq!((c.wins, c.losses), (1, 2));

    // One patch for the standings, then the match row.
    let writes = f.store.writes();
    assert_eq!(writes.len(), 2);
    assert!(matches!(&writes[0], WriteRecord::Patch { table, patch } if table == STANDINGS && patch.rows.len() == 3));
    assert!(matches!(&writes[1], WriteRecord::Append { table, rows } if table == MATCHES && rows.len() == 1));
}

#[tokio::test]
async fn ranks_stay_dense_over_a_sequence_of_results() {
    let f = fixture(&[], &[]).await;
    let players = ["Ana", "Bo", "Cy", "Dan"].map(User::new);

    let results = [(0, 1), (2, 3), (0, 2), (3, 1), (1, 0)];
    for (minute, (winner, loser)) in results.into_iter().enumerate() {
        f.ladder
            .record_result(&players[winner], &players[loser], at(19, minute as u32))
            .await
            .expect("record");

        let all = f.standings.all_standings();
        let ranks: Vec<u32> = all.iter().map(|s| s.rank).collect();
        let expected: Vec<u32> = (1..=all.len() as u32).collect();
        assert_eq!(ranks, expected);
        assert!(all.windows(2).all(|w| w[0].rating >= w[1].rating));
    }

    assert_eq!(f.standings.all_standings().len(), 4);
    let total: u32 = f.standings.all_standings().iter().map(|s| s.matches()).sum();
    assert_eq!(total, 10);
    assert_eq!(f.matches.matches("Ana").len(), 3);
}

#[tokio::test]
async fn first_match_between_newcomers() {
    let f = fixture(&[], &[]).await;

    let outcome = f
        .ladder
        .record_result(&User::new("Ana"), &User::new("Bo"), at(19, 0))
        .await
        .expect("record");

    assert_eq!(outcome.winner.rating.after, 410.0);
    assert_eq!(outcome.loser.rating.after, 390.0);
    assert_eq!(outcome.winner.rating.change(), 10.0);
    assert_eq!(outcome.winner.streak.after, 1);
    assert_eq!(outcome.loser.streak.after, -1);
    assert_eq!(ranks(&f.standings.all_standings()), vec![("Ana".into(), 1), ("Bo".into(), 2)]);

    let writes = f.store.writes();
    assert!(matches!(&writes[0], WriteRecord::Append { table, rows } if table == STANDINGS && rows.len() == 2));
}

#[tokio::test]
async fn repeated_match_rows_count_as_one_game() {
    let f = fixture(
        &[],
        &[
            &["2024-11-04 19:00:00", "Ana", "Bo"],
            &["2024-11-04 19:00:00", "Ana", "Bo"],
            &["2024-11-04 20:00:00", "Ana", "Bo"],
        ],
    )
    .await;
    assert_eq!(f.matches.matches("Ana").len(), 2);
    assert_eq!(f.ladder.streak(&User::new("Ana")), 2);
    assert_eq!(f.ladder.streak(&User::new("Bo")), -2);
}

#[tokio::test]
async fn streak_extends_or_flips() {
    let history: &[&[&str]] = &[
        &["2024-11-01 19:00:00", "Ana", "Bo"],
        &["2024-11-02 19:00:00", "Cy", "Bo"],
        &["2024-11-03 19:00:00", "Ana", "Cy"],
    ];

    let f = fixture(&[], history).await;
    assert_eq!(f.ladder.streak(&User::new("Ana")), 2);
    assert_eq!(f.ladder.streak(&User::new("Bo")), -2);
    let outcome = f
        .ladder
        .record_result(&User::new("Ana"), &User::new("Bo"), at(19, 0))
        .await
        .expect("record");
    assert_eq!((outcome.winner.streak.before, outcome.winner.streak.after), (2, 3));
    assert_eq!(outcome.loser.streak.after, -3);
    assert_eq!(f.ladder.streak(&User::new("Ana")), 3);

    let f = fixture(&[], history).await;
    let outcome = f
        .ladder
        .record_result(&User::new("Bo"), &User::new("Ana"), at(19, 0))
        .await
        .expect("record");
    assert_eq!((outcome.loser.streak.before, outcome.loser.streak.after), (2, -1));
    assert_eq!(outcome.loser.streak.change(), -3);
    assert_eq!(outcome.winner.streak.after, 1);
}

#[tokio::test]
async fn playing_yourself_is_rejected() {
    let f = fixture(&[], &[]).await;
    let err = f
        .ladder
        .record_result(&User::new("Ana"), &User::new("Ana"), at(19, 0))
        .await
        .expect_err("same player");
    assert!(matches!(err, LadderError::SamePlayer(name) if name == "Ana"));
    assert!(f.store.writes().is_empty());
}

#[test]
fn rank_changes_cascade_to_everyone_passed() {
    let all = vec![
        Standing {
            rank: 2,
            ..Standing::new("A", 1500.0)
        },
        Standing {
            rank: 3,
            ..Standing::new("B", 1400.0)
        },
        Standing {
            rank: 1,
            ..Standing::new("C", 1600.0)
        },
    ];
    let changed = [Standing {
        rank: 3,
        ..Standing::new("B", 1700.0)
    }];

    let updates = rank_changes(all.clone(), &changed);
    let got: Vec<(&str, u32)> = updates.iter().map(|s| (s.player.as_str(), s.rank)).collect();
    assert_eq!(got, vec![("B", 1), ("C", 2), ("A", 3)]);

    // A change that keeps the order only rewrites the changed standing.
    let small = [Standing {
        rank: 3,
        ..Standing::new("B", 1450.0)
    }];
    let updates = rank_changes(all, &small);
    assert_eq!(updates.len(), 1);
    assert_eq!((updates[0].player.as_str(), updates[0].rank), ("B", 3));
}
