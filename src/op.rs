//! Row model and the remote mutations tables send to the record store.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Raw cell matrix of one table, header row first.
pub type Grid = Vec<Vec<String>>;

/// Ordered column-key to cell-text mapping.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Row {
    cells: Vec<(String, String)>,
}

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a row from `(column, value)` pairs; later duplicates overwrite earlier ones.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut row = Self::new();
        for (k, v) in pairs {
            row.set(k, v);
        }
        row
    }

    /// Sets a cell, keeping the column position if it already exists.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(k, _)| *k == key) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((key, value)),
        }
    }

    /// Builder form of [`Row::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Raw cell text.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Trimmed cell text, empty when the column is missing.
    pub fn text(&self, key: &str) -> &str {
        self.get(key).map(str::trim).unwrap_or("")
    }

    /// Trimmed cell text, `None` when missing or blank.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        Some(self.text(key)).filter(|v| !v.is_empty())
    }

    /// Iterates cells in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Column keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(k, _)| k.as_str())
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True when the row has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Sparse update addressed by the value of a key column.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellPatch {
    /// Normalized name of the column used to locate rows.
    pub key_column: String,
    /// Row key to changed cells; only columns present here are written.
    pub rows: Vec<(String, Row)>,
}

impl CellPatch {
    /// Creates an empty patch keyed by `key_column`.
    pub fn new(key_column: impl Into<String>) -> Self {
        Self {
            key_column: key_column.into(),
            rows: Vec::new(),
        }
    }

    /// Adds the changed cells of one row; empty diffs are ignored.
    pub fn push(&mut self, row_key: impl Into<String>, cells: Row) {
        if !cells.is_empty() {
            self.rows.push((row_key.into(), cells));
        }
    }

    /// True when nothing would be written.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Cells of `new` whose value differs from `old`.
pub fn diff_rows(old: &Row, new: &Row) -> Row {
    Row {
        cells: new
            .iter()
            .filter(|(k, v)| old.get(k) != Some(*v))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

static PARENS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("static regex"));
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));
static INVALID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9_]").expect("static regex"));

/// Turns a human header such as `Rating (ELO)` into a column key (`rating`).
pub fn normalize_header(text: &str) -> String {
    let text = PARENS.replace_all(text, "");
    let text = SPACES.replace_all(&text, " ");
    let text = text.trim().to_lowercase();
    INVALID.replace_all(&text, "_").into_owned()
}

/// Maps every data row of a header-first grid to a [`Row`].
///
/// Short rows only produce the cells they have; extra cells past the header are dropped.
pub fn rows_from_grid(grid: &[Vec<String>]) -> Vec<Row> {
    let Some((header, rows)) = grid.split_first() else {
        return Vec::new();
    };
    let keys: Vec<String> = header.iter().map(|h| normalize_header(h)).collect();
    rows.iter()
        .map(|cells| Row {
            cells: keys.iter().cloned().zip(cells.iter().cloned()).collect(),
        })
        .collect()
}

/// Lays out a row along a header, filling missing columns with blanks.
pub fn row_to_cells(header_keys: &[String], row: &Row) -> Vec<String> {
    let last = header_keys
        .iter()
        .rposition(|k| row.get(k).is_some())
        .map(|i| i + 1)
        .unwrap_or(0);
    header_keys[..last]
        .iter()
        .map(|k| row.get(k).unwrap_or("").to_string())
        .collect()
}
