//! In-process record store, used for tests and offline runs.

use std::sync::atomic::{AtomicBool, Ordering};

use hashbrown::HashMap;
use parking_lot::Mutex;

use crate::op::{CellPatch, Grid, Row};

use super::{PersistError, PersistResult, RecordStore, append_to_grid, patch_grid};

/// Remote write observed by a [`MemoryRecordStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRecord {
    /// Rows appended to a table.
    Append {
        /// Table name.
        table: String,
        /// Appended rows.
        rows: Vec<Row>,
    },
    /// Cells patched in a table.
    Patch {
        /// Table name.
        table: String,
        /// Patch as sent.
        patch: CellPatch,
    },
}

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: Mutex<HashMap<String, Grid>>,
    writes: Mutex<Vec<WriteRecord>>,
    failing: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a table's grid, as a human editing the remote store would.
    pub fn put_grid(&self, table: &str, grid: Grid) {
        self.tables.lock().insert(table.to_string(), grid);
    }

    /// Convenience for tests: builds a grid from string slices.
    pub fn put_rows(&self, table: &str, rows: &[&[&str]]) {
        let grid = rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        self.put_grid(table, grid);
    }

    /// Current grid of a table.
    pub fn grid(&self, table: &str) -> Option<Grid> {
        self.tables.lock().get(table).cloned()
    }

    /// Makes every subsequent call fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Remote writes in the order they arrived.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes.lock().clone()
    }

    fn check(&self) -> PersistResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistError::Message("record store unavailable".to_string()));
        }
        Ok(())
    }
}

impl RecordStore for MemoryRecordStore {
    fn load_snapshot(&self, table: &str) -> PersistResult<Grid> {
        self.check()?;
        self.tables
            .lock()
            .get(table)
            .cloned()
            .ok_or_else(|| PersistError::MissingTable(table.to_string()))
    }

    fn append_rows(&self, table: &str, rows: &[Row]) -> PersistResult<()> {
        self.check()?;
        {
            let mut tables = self.tables.lock();
            let grid = tables.entry(table.to_string()).or_default();
            append_to_grid(grid, rows);
        }
        self.writes.lock().push(WriteRecord::Append {
            table: table.to_string(),
            rows: rows.to_vec(),
        });
        Ok(())
    }

    fn patch_cells(&self, table: &str, patch: &CellPatch) -> PersistResult<()> {
        self.check()?;
        {
            let mut tables = self.tables.lock();
            let grid = tables
                .get_mut(table)
                .ok_or_else(|| PersistError::MissingTable(table.to_string()))?;
            patch_grid(table, grid, patch)?;
        }
        self.writes.lock().push(WriteRecord::Patch {
            table: table.to_string(),
            patch: patch.clone(),
        });
        Ok(())
    }
}
