//! Record-store handle shared by every table of one spreadsheet.

use std::sync::Arc;

use hashbrown::HashMap;
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};

use crate::{
    op::{CellPatch, Grid, Row},
    persist::{PersistError, PersistResult, RecordStore},
};

use super::events::DatabaseEvent;

/// Latest published snapshot of one table; `None` until the first successful load.
pub type SnapshotSlot = watch::Receiver<Option<Arc<Grid>>>;

/// Owns the record-store connection, one snapshot slot per attached table and
/// the change-notification stream.
///
/// Refreshing only publishes into the slots; tables pull the new snapshot under
/// their own lock the next time they are read.
pub struct Database {
    store: Arc<dyn RecordStore>,
    slots: Mutex<HashMap<String, watch::Sender<Option<Arc<Grid>>>>>,
    events_tx: broadcast::Sender<DatabaseEvent>,
}

impl Database {
    pub fn new(store: Arc<dyn RecordStore>) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(256);
        Arc::new(Self {
            store,
            slots: Mutex::new(HashMap::new()),
            events_tx,
        })
    }

    /// Registers `table` for refreshes and returns its snapshot slot.
    pub fn attach(&self, table: &str) -> SnapshotSlot {
        self.slots
            .lock()
            .entry(table.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DatabaseEvent> {
        self.events_tx.subscribe()
    }

    /// Names of the attached tables, sorted.
    pub fn tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Reloads every attached table; returns how many changed.
    pub async fn refresh(&self) -> usize {
        let tables = self.tables();
        info!("refreshing {} tables", tables.len());

        let mut changed = 0;
        for table in tables {
            if self.refresh_table(&table).await {
                changed += 1;
            }
        }
        info!("refresh done, {changed} tables changed");
        changed
    }

    /// Reloads one table. Returns true when a new snapshot was published.
    ///
    /// On failure the previous snapshot stays in place.
    pub async fn refresh_table(&self, table: &str) -> bool {
        let loaded = self.blocking(table, |store, table| store.load_snapshot(&table)).await;

        let grid = match loaded {
            Ok(grid) => grid,
            Err(err) => {
                warn!("refresh of table {table} failed: {err}");
                let _ = self.events_tx.send(DatabaseEvent::RefreshFailed {
                    table: table.to_string(),
                });
                return false;
            }
        };

        let published = {
            let slots = self.slots.lock();
            let Some(slot) = slots.get(table) else {
                return false;
            };
            slot.send_if_modified(|current| {
                if current.as_deref() == Some(&grid) {
                    return false;
                }
                *current = Some(Arc::new(grid));
                true
            })
        };

        let table = table.to_string();
        if published {
            debug!("table {table} changed");
            let _ = self.events_tx.send(DatabaseEvent::Refreshed { table });
        } else {
            debug!("table {table} unchanged");
            let _ = self.events_tx.send(DatabaseEvent::Unchanged { table });
        }
        published
    }

    /// Appends rows remotely. Failures are logged and reported as `false`.
    pub async fn append_rows(&self, table: &str, rows: Vec<Row>) -> bool {
        if rows.is_empty() {
            return true;
        }
        let res = self
            .blocking(table, move |store, table| store.append_rows(&table, &rows))
            .await;
        self.settle_write(table, "append", res)
    }

    /// Patches cells remotely. Failures are logged and reported as `false`.
    pub async fn patch_cells(&self, table: &str, patch: CellPatch) -> bool {
        if patch.is_empty() {
            return true;
        }
        let res = self
            .blocking(table, move |store, table| store.patch_cells(&table, &patch))
            .await;
        self.settle_write(table, "patch", res)
    }

    fn settle_write(&self, table: &str, what: &str, res: PersistResult<()>) -> bool {
        match res {
            Ok(()) => true,
            Err(err) => {
                warn!("remote {what} on table {table} failed, keeping local state: {err}");
                let _ = self.events_tx.send(DatabaseEvent::WriteFailed {
                    table: table.to_string(),
                });
                false
            }
        }
    }

    async fn blocking<T, F>(&self, table: &str, f: F) -> PersistResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn RecordStore, String) -> PersistResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let table = table.to_string();
        tokio::task::spawn_blocking(move || f(store.as_ref(), table))
            .await
            .map_err(|e| PersistError::Message(format!("join error: {e}")))?
    }
}
