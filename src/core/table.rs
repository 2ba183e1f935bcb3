//! A table: parsed snapshot of one remote sheet, its indexes, and write-back.

use std::sync::Arc;

use log::debug;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

use crate::{
    op::{CellPatch, Row, diff_rows, rows_from_grid},
    runtime::database::{Database, SnapshotSlot},
};

use super::index::{IndexSet, Record};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("table {table} has no record with key {key:?}")]
    Missing { table: String, key: String },
}

/// How one sheet maps to typed records and which indexes it maintains.
pub trait TableSchema: Send + Sync + 'static {
    type Record: Record;
    type Indexes: IndexSet<Self::Record>;

    fn new_indexes(&self) -> Self::Indexes;

    /// Converts one row; `None` excludes the row from the snapshot.
    fn deserialize(&self, row: &Row) -> Option<Self::Record>;

    /// Converts a header-first grid. Invalid rows are excluded, never reported.
    fn parse(&self, grid: &[Vec<String>]) -> Vec<Self::Record> {
        rows_from_grid(grid)
            .iter()
            .filter_map(|row| self.deserialize(row))
            .collect()
    }
}

/// Schemas whose records can be written back to the record store.
pub trait WritableSchema: TableSchema {
    /// Column whose value identifies a row for patches.
    const KEY_COLUMN: &'static str;

    fn serialize(&self, record: &Self::Record) -> Row;

    /// Value of [`WritableSchema::KEY_COLUMN`] for `record`.
    fn row_key(&self, record: &Self::Record) -> String;

    /// The stored record `record` would replace, if any.
    fn existing(&self, indexes: &Self::Indexes, record: &Self::Record) -> Option<Arc<Self::Record>>;
}

/// Parsed, indexed copy of one sheet.
///
/// One lock guards every index of the table. Reads share it; refreshes and
/// local writes take it exclusively and never hold it across a network call.
pub struct Table<S: TableSchema> {
    name: String,
    schema: S,
    db: Arc<Database>,
    slot: Mutex<SnapshotSlot>,
    indexes: RwLock<S::Indexes>,
    write_gate: tokio::sync::Mutex<()>,
}

impl<S: TableSchema> Table<S> {
    pub fn attach(db: Arc<Database>, name: impl Into<String>, schema: S) -> Self {
        let name = name.into();
        let slot = db.attach(&name);
        let indexes = schema.new_indexes();
        Self {
            name,
            schema,
            db,
            slot: Mutex::new(slot),
            indexes: RwLock::new(indexes),
            write_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &S {
        &self.schema
    }

    /// Applies the latest published snapshot if it changed since the last pull.
    pub fn pull(&self) -> bool {
        let mut slot = self.slot.lock();
        if !slot.has_changed().unwrap_or(false) {
            return false;
        }
        let Some(grid) = (*slot.borrow_and_update()).clone() else {
            return false;
        };

        let records: Vec<Arc<S::Record>> = self.schema.parse(&grid).into_iter().map(Arc::new).collect();
        self.indexes.write().reset(&records);
        debug!("table {} reloaded with {} records", self.name, records.len());
        true
    }

    /// Shared access to the indexes.
    pub fn read(&self) -> RwLockReadGuard<'_, S::Indexes> {
        self.pull();
        self.indexes.read()
    }

    /// Exclusive access, for callers that read and then decide to write.
    pub fn write(&self) -> RwLockWriteGuard<'_, S::Indexes> {
        self.pull();
        self.indexes.write()
    }

    /// Reloads this table from the record store and applies it.
    pub async fn refresh(&self) -> bool {
        self.db.refresh_table(&self.name).await;
        self.pull()
    }

    /// Evicts a record from memory. The record store has no row deletion, so a
    /// row still present remotely comes back on the next refresh.
    pub fn delete(&self, record: &S::Record) {
        self.write().delete(record);
    }
}

impl<S: WritableSchema> Table<S> {
    /// Inserts a new record and appends it remotely.
    pub async fn insert(&self, record: S::Record) -> Arc<S::Record> {
        let _gate = self.write_gate.lock().await;
        let mut rows = Vec::with_capacity(1);
        let inserted = self.stage_insert(&mut self.write(), record, &mut rows);

        self.db.append_rows(&self.name, rows).await;
        inserted
    }

    /// Inserts new records and appends them remotely.
    pub async fn insert_all(&self, records: Vec<S::Record>) -> Vec<Arc<S::Record>> {
        let _gate = self.write_gate.lock().await;
        let mut rows = Vec::with_capacity(records.len());
        let inserted: Vec<_> = {
            let mut indexes = self.write();
            records
                .into_iter()
                .map(|record| self.stage_insert(&mut indexes, record, &mut rows))
                .collect()
        };

        self.db.append_rows(&self.name, rows).await;
        inserted
    }

    /// Replaces existing records, sending only the cells that changed.
    ///
    /// Fails before touching anything if one of the records is not stored.
    pub async fn update_all(&self, records: Vec<S::Record>) -> Result<Vec<Arc<S::Record>>, TableError> {
        let _gate = self.write_gate.lock().await;
        let (updated, patch) = {
            let mut indexes = self.write();
            let mut staged = Vec::with_capacity(records.len());
            for record in records {
                let old = self
                    .schema
                    .existing(&indexes, &record)
                    .ok_or_else(|| TableError::Missing {
                        table: self.name.clone(),
                        key: self.schema.row_key(&record),
                    })?;
                staged.push((old, record));
            }

            let mut patch = CellPatch::new(S::KEY_COLUMN);
            let mut updated = Vec::with_capacity(staged.len());
            for (old, record) in staged {
                updated.push(self.stage_update(&mut indexes, &old, record, &mut patch));
            }
            (updated, patch)
        };

        self.db.patch_cells(&self.name, patch).await;
        Ok(updated)
    }

    /// Single-record form of [`Table::update_all`].
    pub async fn update(&self, record: S::Record) -> Result<Arc<S::Record>, TableError> {
        let key = self.schema.row_key(&record);
        self.update_all(vec![record])
            .await?
            .pop()
            .ok_or_else(|| TableError::Missing {
                table: self.name.clone(),
                key,
            })
    }

    /// Updates records that exist and appends the others.
    pub async fn save_all(&self, records: Vec<S::Record>) -> Vec<Arc<S::Record>> {
        let _gate = self.write_gate.lock().await;
        let (saved, rows, patch) = {
            let mut indexes = self.write();
            let mut saved = Vec::with_capacity(records.len());
            let mut rows = Vec::new();
            let mut patch = CellPatch::new(S::KEY_COLUMN);
            for record in records {
                match self.schema.existing(&indexes, &record) {
                    Some(old) => saved.push(self.stage_update(&mut indexes, &old, record, &mut patch)),
                    None => saved.push(self.stage_insert(&mut indexes, record, &mut rows)),
                }
            }
            (saved, rows, patch)
        };

        self.db.append_rows(&self.name, rows).await;
        self.db.patch_cells(&self.name, patch).await;
        saved
    }

    fn stage_insert(&self, indexes: &mut S::Indexes, record: S::Record, rows: &mut Vec<Row>) -> Arc<S::Record> {
        let record = Arc::new(record);
        rows.push(self.schema.serialize(&record));
        indexes.insert(&record);
        record
    }

    fn stage_update(
        &self,
        indexes: &mut S::Indexes,
        old: &Arc<S::Record>,
        record: S::Record,
        patch: &mut CellPatch,
    ) -> Arc<S::Record> {
        let record = Arc::new(record);
        let changed = diff_rows(&self.schema.serialize(old), &self.schema.serialize(&record));
        patch.push(self.schema.row_key(old), changed);
        indexes.update(old, &record);
        record
    }
}
