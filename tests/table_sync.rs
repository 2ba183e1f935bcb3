use std::sync::Arc;

use chrono::NaiveDate;

use clubhouse::{
    core::table::TableError,
    op::Row,
    persist::memory::{MemoryRecordStore, WriteRecord},
    records::{User, VisitsEntry},
    repo::{RepoError, SheetUserRepository, SheetVisitRepository, UserRepository, VisitRepository},
    runtime::{
        database::Database,
        events::DatabaseEvent,
        handle::{RefreshConfig, RuntimeError, spawn_refresher},
    },
};

const USERS: &str = "Users";

fn users_grid(store: &MemoryRecordStore, extra: &[&[&str]]) {
    let mut rows: Vec<&[&str]> = vec![
        &["Full Name", "Aliases", "Role", "Telegram Username", "Birthday", "Telegram ID", "POS ID"],
        &["Ana Pop", "Ani", "Community", "@anapop", "03-14", "", "P1"],
        &["Bo Ionescu", "", "Manager", "Bo_I", "", "77", ""],
        &["", "ghost", "Community", "", "", "", ""],
    ];
    rows.extend_from_slice(extra);
    store.put_rows(USERS, &rows);
}

async fn setup() -> (Arc<MemoryRecordStore>, Arc<Database>, SheetUserRepository) {
    let store = Arc::new(MemoryRecordStore::new());
    users_grid(&store, &[]);
    let db = Database::new(store.clone());
    let users = SheetUserRepository::attach(db.clone(), USERS);
    assert!(users.table().refresh().await);
    (store, db, users)
}

#[tokio::test]
async fn refresh_loads_rows_and_drops_invalid_ones() {
    let (_store, _db, users) = setup().await;

    let all = users.all();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].full_name, "Ana Pop");

    assert_eq!(users.by_telegram_name("@ANAPOP").map(|u| u.full_name.clone()), Some("Ana Pop".into()));
    assert_eq!(users.by_telegram_name("bo_i").map(|u| u.full_name.clone()), Some("Bo Ionescu".into()));
    assert_eq!(users.by_telegram_id(77).map(|u| u.full_name.clone()), Some("Bo Ionescu".into()));
    assert_eq!(users.by_pos_id("P1").map(|u| u.full_name.clone()), Some("Ana Pop".into()));
    let birthday = NaiveDate::from_ymd_opt(2025, 3, 14).expect("date");
    assert_eq!(users.by_birthday(birthday).len(), 1);
    assert!(users.search("").is_empty());
}

#[tokio::test]
async fn unchanged_snapshot_is_not_reapplied() {
    let (store, _db, users) = setup().await;
    assert!(!users.table().refresh().await);

    users_grid(&store, &[&["Cy Radu", "", "Alumni", "", "", "", ""]]);
    assert!(users.table().refresh().await);
    assert_eq!(users.all().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_see_a_half_applied_update() {
    let (_store, _db, users) = setup().await;
    let users = Arc::new(users);

    let writer = {
        let users = users.clone();
        tokio::spawn(async move {
            for round in 0..200 {
                let mut ana = users.by_full_name("Ana Pop").expect("ana").as_ref().clone();
                ana.pos_id = Some(if round % 2 == 0 { "P2" } else { "P1" }.to_string());
                users.save(ana).await.expect("save");
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let users = users.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    {
                        let indexes = users.table().read();
                        let old = indexes.by_pos_id.get("P1");
                        let new = indexes.by_pos_id.get("P2");
                        assert!(old.is_some() != new.is_some(), "old and new both present or both missing");
                        let held = old.or(new).expect("one of them");

                        let ana = indexes.by_full_name.get("Ana Pop").expect("ana");
                        assert_eq!(ana.pos_id, held.pos_id);

                        let found = indexes.by_prefix.get("ana").unwrap_or_default();
                        assert_eq!(found.len(), 1);
                        assert_eq!(found[0].pos_id, held.pos_id);
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    writer.await.expect("writer");
    for reader in readers {
        reader.await.expect("reader");
    }
    assert_eq!(users.by_pos_id("P1").map(|u| u.full_name.clone()), Some("Ana Pop".into()));
    assert!(users.by_pos_id("P2").is_none());
}

#[tokio::test]
async fn update_sends_only_changed_cells() {
    let (store, _db, users) = setup().await;

    let mut ana = users.by_full_name("Ana Pop").expect("ana").as_ref().clone();
    ana.telegram_id = Some(42);
    users.save(ana).await.expect("save");

    assert_eq!(users.by_telegram_id(42).map(|u| u.full_name.clone()), Some("Ana Pop".into()));
    let writes = store.writes();
    assert_eq!(writes.len(), 1);
    let WriteRecord::Patch { table, patch } = &writes[0] else {
        panic!("expected a patch, got {writes:?}");
    };
    assert_eq!(table, USERS);
    assert_eq!(patch.key_column, "full_name");
    assert_eq!(patch.rows, vec![("Ana Pop".to_string(), Row::from_pairs([("telegram_id", "42")]))]);

    let grid = store.grid(USERS).expect("grid");
    assert_eq!(grid[1][5], "42");
    assert_eq!(grid[1][3], "@anapop");
}

#[tokio::test]
async fn saving_unknown_user_fails_without_writing() {
    let (store, _db, users) = setup().await;

    let err = users
        .save_all(vec![
            User::new("Ana Pop"),
            User::new("Nobody"),
        ])
        .await
        .expect_err("unknown user");
    assert!(matches!(
        err,
        RepoError::Table(TableError::Missing { ref key, .. }) if key == "Nobody"
    ));
    assert!(store.writes().is_empty());
    assert_eq!(users.by_full_name("Ana Pop").expect("ana").pos_id.as_deref(), Some("P1"));
}

#[tokio::test]
async fn failed_remote_write_keeps_memory() {
    let (store, db, users) = setup().await;
    let mut events = db.subscribe();
    store.set_failing(true);

    let mut bo = users.by_full_name("Bo Ionescu").expect("bo").as_ref().clone();
    bo.pos_id = Some("P9".into());
    users.save(bo).await.expect("memory write succeeds");
    assert_eq!(users.by_pos_id("P9").map(|u| u.full_name.clone()), Some("Bo Ionescu".into()));

    assert!(!users.table().refresh().await);
    assert_eq!(users.by_pos_id("P9").map(|u| u.full_name.clone()), Some("Bo Ionescu".into()));

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&DatabaseEvent::WriteFailed { table: USERS.into() }));
    assert!(seen.contains(&DatabaseEvent::RefreshFailed { table: USERS.into() }));
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn delete_is_local_until_refresh() {
    let (store, _db, users) = setup().await;
    let ana = users.by_full_name("Ana Pop").expect("ana");

    users.table().delete(&ana);
    assert!(users.by_full_name("Ana Pop").is_none());
    assert!(users.by_pos_id("P1").is_none());

    // Same content comes back only when the remote grid changes.
    users_grid(&store, &[&["Cy Radu", "", "", "", "", "", ""]]);
    users.table().refresh().await;
    assert!(users.by_full_name("Ana Pop").is_some());
}

#[tokio::test]
async fn new_month_columns_extend_the_header() {
    let store = Arc::new(MemoryRecordStore::new());
    store.put_rows("Visits", &[&["Full Name", "Last Visit", "Nov 2024"], &["Ana Pop", "2024-11-02 10:00:00", "3"]]);
    let db = Database::new(store.clone());
    let visits = SheetVisitRepository::attach(db, "Visits");
    visits.table().refresh().await;

    let nov = NaiveDate::from_ymd_opt(2024, 11, 1).expect("date");
    let dec = NaiveDate::from_ymd_opt(2024, 12, 1).expect("date");
    let ana = visits.entry_for("Ana Pop");
    assert_eq!(ana.visits_in(nov), 3);

    let ts = dec.and_hms_opt(18, 0, 0).expect("time");
    let updated = ana.add_visits(&[(dec, 1)].into()).with_last_visit(ts);
    let fresh = VisitsEntry::new("Bo Ionescu").add_visits(&[(dec, 2)].into());
    visits.save_all(vec![updated, fresh]).await;

    let grid = store.grid("Visits").expect("grid");
    assert_eq!(grid[0], vec!["Full Name", "Last Visit", "Dec 2024", "Nov 2024"]);
    assert_eq!(grid[1], vec!["Ana Pop", "2024-12-01 18:00:00", "1", "3"]);
    assert_eq!(grid[2], vec!["Bo Ionescu", "", "2"]);
    assert_eq!(visits.visitors_in_month(dec), vec![("Bo Ionescu".to_string(), 2), ("Ana Pop".to_string(), 1)]);
}

#[tokio::test]
async fn refresher_reloads_on_demand_and_stops() {
    let (store, db, users) = setup().await;
    let refresher = spawn_refresher(
        db,
        RefreshConfig {
            interval_secs: 3600,
            run_on_start: false,
        },
    );

    assert_eq!(refresher.refresh_now().await.expect("refresh"), 0);
    users_grid(&store, &[&["Cy Radu", "", "", "", "", "", ""]]);
    assert_eq!(refresher.refresh_now().await.expect("refresh"), 1);
    assert_eq!(users.all().len(), 3);

    refresher.shutdown().await.expect("shutdown");
    assert!(matches!(refresher.refresh_now().await, Err(RuntimeError::ChannelClosed)));
}
