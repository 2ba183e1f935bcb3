//! SQLite-backed local record store.
//!
//! Each sheet row is stored as a JSON array of cells; row 0 is the header.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Transaction, params};

use crate::op::{CellPatch, Grid, Row};

use super::{PersistError, PersistResult, RecordStore, append_to_grid, patch_grid};

/// SQLite implementation of [`crate::persist::RecordStore`].
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Opens or creates a SQLite-backed store at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory SQLite store.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Replaces a whole sheet, e.g. when importing an export of the remote store.
    pub fn import_grid(&self, table: &str, grid: &Grid) -> PersistResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM sheet_rows WHERE sheet = ?1", params![table])?;
        write_rows(&tx, table, grid.iter().enumerate())?;
        tx.commit()?;
        Ok(())
    }

    /// Number of stored rows for `table`, header included.
    pub fn row_count(&self, table: &str) -> PersistResult<usize> {
        let count: i64 = self.conn.lock().query_row(
            "SELECT COUNT(*) FROM sheet_rows WHERE sheet = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn exists(conn: &Connection, table: &str) -> PersistResult<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT idx FROM sheet_rows WHERE sheet = ?1 LIMIT 1",
                params![table],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

impl RecordStore for SqliteRecordStore {
    fn load_snapshot(&self, table: &str) -> PersistResult<Grid> {
        let conn = self.conn.lock();
        if !Self::exists(&conn, table)? {
            return Err(PersistError::MissingTable(table.to_string()));
        }
        load_grid(&conn, table)
    }

    fn append_rows(&self, table: &str, rows: &[Row]) -> PersistResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let original = load_grid(&tx, table)?;
        let mut grid = original.clone();
        append_to_grid(&mut grid, rows);

        // New month columns may shift cells of existing rows.
        let changed = grid
            .iter()
            .enumerate()
            .filter(|(i, row)| original.get(*i) != Some(*row));
        write_rows(&tx, table, changed)?;
        tx.commit()?;
        Ok(())
    }

    fn patch_cells(&self, table: &str, patch: &CellPatch) -> PersistResult<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        if !Self::exists(&tx, table)? {
            return Err(PersistError::MissingTable(table.to_string()));
        }
        let original = load_grid(&tx, table)?;
        let mut grid = original.clone();
        patch_grid(table, &mut grid, patch)?;

        let changed = grid
            .iter()
            .enumerate()
            .filter(|(i, row)| original.get(*i) != Some(*row));
        write_rows(&tx, table, changed)?;
        tx.commit()?;
        Ok(())
    }
}

fn load_grid(conn: &Connection, table: &str) -> PersistResult<Grid> {
    let mut stmt = conn.prepare("SELECT idx, cells FROM sheet_rows WHERE sheet = ?1 ORDER BY idx ASC")?;
    let rows = stmt.query_map(params![table], |row| {
        let idx: i64 = row.get(0)?;
        let cells: String = row.get(1)?;
        Ok((idx as usize, cells))
    })?;

    let mut grid = Grid::new();
    for row in rows {
        let (idx, cells) = row?;
        let cells: Vec<String> = serde_json::from_str(&cells)?;
        // Gaps can only come from manual edits of the database file.
        if grid.len() < idx {
            grid.resize(idx, Vec::new());
        }
        grid.push(cells);
    }
    Ok(grid)
}

fn write_rows<'a>(
    tx: &Transaction<'_>,
    table: &str,
    rows: impl Iterator<Item = (usize, &'a Vec<String>)>,
) -> PersistResult<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO sheet_rows(sheet, idx, cells, updated_ms) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(sheet, idx) DO UPDATE SET cells = excluded.cells, updated_ms = excluded.updated_ms",
    )?;
    let ts_ms = now_ms();
    for (idx, cells) in rows {
        let payload = serde_json::to_string(cells)?;
        stmt.execute(params![table, idx as i64, payload, ts_ms as i64])?;
    }
    Ok(())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
