use std::sync::Arc;

use chrono::{NaiveDate, Weekday};
use tempfile::TempDir;

use clubhouse::{
    op::{CellPatch, Row},
    persist::{PersistError, RecordStore, sqlite::SqliteRecordStore},
    records::Nomination,
    repo::{NominationRepository, SheetNominationRepository, SheetTaskRepository, TaskRepository},
    runtime::database::Database,
    types::Timestamp,
};

fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect()
}

fn at(day: u32, hour: u32) -> Timestamp {
    NaiveDate::from_ymd_opt(2024, 11, day)
        .expect("date")
        .and_hms_opt(hour, 0, 0)
        .expect("time")
}

#[test]
fn appends_and_patches_survive_reopen() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("sheets.db");

    {
        let store = SqliteRecordStore::open(&path).expect("open");
        store
            .import_grid("Visits", &grid(&[&["Full Name", "Last Visit"], &["Ana Pop", ""]]))
            .expect("import");
        store
            .append_rows("Visits", &[Row::from_pairs([("full_name", "Bo"), ("nov_2024", "2")])])
            .expect("append");

        let mut patch = CellPatch::new("full_name");
        patch.push("Ana Pop", Row::from_pairs([("last_visit", "2024-11-04 10:00:00")]));
        store.patch_cells("Visits", &patch).expect("patch");
        assert_eq!(store.row_count("Visits").expect("count"), 3);
    }

    let store = SqliteRecordStore::open(&path).expect("reopen");
    let loaded = store.load_snapshot("Visits").expect("load");
    assert_eq!(
        loaded,
        grid(&[
            &["Full Name", "Last Visit", "Nov 2024"],
            &["Ana Pop", "2024-11-04 10:00:00"],
            &["Bo", "", "2"],
        ])
    );
}

#[test]
fn new_month_columns_shift_stored_rows() {
    let store = SqliteRecordStore::open_in_memory().expect("open");
    store
        .import_grid(
            "Visits",
            &grid(&[&["Full Name", "Last Visit", "Nov 2024"], &["Ana Pop", "2024-11-04 10:00:00", "3"]]),
        )
        .expect("import");
    store
        .append_rows("Visits", &[Row::from_pairs([("full_name", "Bo"), ("dec_2024", "1")])])
        .expect("append");

    assert_eq!(
        store.load_snapshot("Visits").expect("load"),
        grid(&[
            &["Full Name", "Last Visit", "Dec 2024", "Nov 2024"],
            &["Ana Pop", "2024-11-04 10:00:00", "", "3"],
            &["Bo", "", "1"],
        ])
    );
}

#[test]
fn unknown_tables_and_key_columns_are_errors() {
    let store = SqliteRecordStore::open_in_memory().expect("open");
    assert!(matches!(store.load_snapshot("Nope"), Err(PersistError::MissingTable(_))));

    store.import_grid("Users", &grid(&[&["Full Name"], &["Ana Pop"]])).expect("import");
    let mut patch = CellPatch::new("pos_id");
    patch.push("P1", Row::from_pairs([("role", "Manager")]));
    assert!(matches!(
        store.patch_cells("Users", &patch),
        Err(PersistError::MissingKeyColumn { .. })
    ));
}

#[tokio::test]
async fn task_lists_toggle_and_clear_through_sqlite() {
    let store = Arc::new(SqliteRecordStore::open_in_memory().expect("open"));
    store
        .import_grid(
            "Tasks",
            &grid(&[
                &["ID", "Weekday", "Group", "Position", "Time", "Name", "Done"],
                &["0.opening.1", "Monday", "Opening", "1", "09:00", "Unlock doors", ""],
                &["0.opening.0", "Monday", "Opening", "0", "08:30", "Lights on", "x"],
                &["4.closing.0", "Friday", "Closing", "0", "23:00", "Lock up", ""],
                &["", "Funday", "Closing", "1", "23:30", "Broken row", ""],
            ]),
        )
        .expect("import");

    let db = Database::new(store.clone());
    let tasks = SheetTaskRepository::attach(db.clone(), "Tasks");
    db.refresh().await;

    let opening = tasks.task_list(Weekday::Mon, "opening").expect("opening");
    let names: Vec<&str> = opening.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Lights on", "Unlock doors"]);
    assert!(!opening.is_done());

    // 2024-11-04 is a Monday.
    let next = tasks.next_task_list(at(4, 10)).expect("next");
    assert_eq!(next.id(), "4.closing");
    assert_eq!(tasks.next_task_list(at(4, 8)).expect("next").id(), "0.opening");

    let toggled = tasks.toggle(&opening, 1).expect("toggle");
    assert!(toggled.is_done());
    assert!(!tasks.task_list(Weekday::Mon, "opening").expect("opening").is_done());
    assert!(tasks.toggle(&opening, 7).is_err());

    let saved = tasks.save(toggled).await.expect("save");
    assert!(saved.is_done());
    let raw = store.load_snapshot("Tasks").expect("load");
    assert_eq!(raw[1][6], "x");

    tasks.clear(saved).await.expect("clear");
    let raw = store.load_snapshot("Tasks").expect("load");
    assert_eq!((raw[1][6].as_str(), raw[2][6].as_str()), ("", ""));
}

#[tokio::test]
async fn latest_nomination_decides_whether_someone_voted() {
    let store = Arc::new(SqliteRecordStore::open_in_memory().expect("open"));
    store
        .import_grid(
            "Nominations",
            &grid(&[
                &["Nominee", "Date", "Voted By", "Reason"],
                &["Bo Ionescu", "2024-10-02 12:00:00", "Ana Pop", "Helped out"],
            ]),
        )
        .expect("import");

    let db = Database::new(store.clone());
    let nominations = SheetNominationRepository::attach(db.clone(), "Nominations");
    db.refresh().await;

    let month_start = at(1, 0);
    assert!(!nominations.has_voted("Ana Pop", month_start));

    nominations
        .insert(Nomination {
            nominee: "Cy Radu".into(),
            date: at(3, 18),
            voter: "Ana Pop".into(),
            reason: "Great quiz".into(),
        })
        .await;
    assert!(nominations.has_voted("Ana Pop", month_start));
    assert!(!nominations.has_voted("Bo Ionescu", month_start));
    assert_eq!(store.row_count("Nominations").expect("count"), 3);
}
