//! Record-store boundary: the remote, human-editable tabular system of record.

pub mod memory;
pub mod sqlite;

use thiserror::Error;

use crate::{
    op::{CellPatch, Grid, Row},
    types::{Month, parse_month_column},
};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("table {0} not found")]
    MissingTable(String),
    #[error("table {table} has no key column {column}")]
    MissingKeyColumn { table: String, column: String },
    #[error("{0}")]
    Message(String),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Blocking access to the record store; callers run it off the async executor.
pub trait RecordStore: Send + Sync {
    /// Loads the full cell grid of `table`, header row first.
    fn load_snapshot(&self, table: &str) -> PersistResult<Grid>;

    /// Appends rows; columns missing from the header are added to it.
    fn append_rows(&self, table: &str, rows: &[Row]) -> PersistResult<()>;

    /// Writes only the cells named in `patch`, locating rows by the key column.
    ///
    /// Keys with no matching row are skipped.
    fn patch_cells(&self, table: &str, patch: &CellPatch) -> PersistResult<()>;
}

/// Applies an append to an in-memory grid; shared by the bundled stores.
pub(crate) fn append_to_grid(grid: &mut Grid, rows: &[Row]) {
    if grid.is_empty() {
        grid.push(Vec::new());
    }
    let mut keys = header_keys(grid);
    for row in rows {
        extend_header(grid, &mut keys, row);
        grid.push(crate::op::row_to_cells(&keys, row));
    }
}

/// Applies a sparse patch to an in-memory grid; returns the number of touched rows.
pub(crate) fn patch_grid(table: &str, grid: &mut Grid, patch: &CellPatch) -> PersistResult<usize> {
    let mut keys = header_keys(grid);
    let key_col = keys
        .iter()
        .position(|k| *k == patch.key_column)
        .ok_or_else(|| PersistError::MissingKeyColumn {
            table: table.to_string(),
            column: patch.key_column.clone(),
        })?;

    let mut touched = 0;
    for (row_key, cells) in &patch.rows {
        extend_header(grid, &mut keys, cells);
        let key_col = keys.iter().position(|k| *k == patch.key_column).unwrap_or(key_col);
        let Some(target) = grid
            .iter()
            .skip(1)
            .position(|r| r.get(key_col).map(|v| v.trim()) == Some(row_key.as_str()))
            .map(|i| i + 1)
        else {
            continue;
        };

        let row = &mut grid[target];
        for (key, value) in cells.iter() {
            let Some(col) = keys.iter().position(|k| k == key) else {
                continue;
            };
            if row.len() <= col {
                row.resize(col + 1, String::new());
            }
            row[col] = value.to_string();
        }
        touched += 1;
    }
    Ok(touched)
}

fn header_keys(grid: &Grid) -> Vec<String> {
    grid.first()
        .map(|h| h.iter().map(|c| crate::op::normalize_header(c)).collect())
        .unwrap_or_default()
}

/// Adds header columns for keys of `row` the grid does not have yet.
///
/// Month columns are titled like `Nov 2024` and kept newest first next to
/// the existing months; other keys are appended.
fn extend_header(grid: &mut Grid, keys: &mut Vec<String>, row: &Row) {
    for key in row.keys() {
        if keys.iter().any(|k| k == key) {
            continue;
        }
        let Some(month) = parse_month_column(key) else {
            keys.push(key.to_string());
            grid[0].push(key.to_string());
            continue;
        };

        let months: Vec<(usize, Month)> = keys
            .iter()
            .enumerate()
            .filter_map(|(i, k)| parse_month_column(k).map(|m| (i, m)))
            .collect();
        let at = months
            .iter()
            .find(|(_, existing)| *existing < month)
            .map(|(i, _)| *i)
            .or_else(|| months.last().map(|(i, _)| i + 1))
            .unwrap_or(keys.len());

        keys.insert(at, key.to_string());
        let header_len = grid[0].len();
        grid[0].insert(at.min(header_len), month.format("%b %Y").to_string());
        for cells in grid.iter_mut().skip(1) {
            if cells.len() > at {
                cells.insert(at, String::new());
            }
        }
    }
}
