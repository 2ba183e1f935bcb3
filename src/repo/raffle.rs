use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use hashbrown::HashSet;

use crate::{
    core::{
        index::{Index, IndexSet},
        indices::{BucketIndex, UniqueIndex},
        table::{Table, TableSchema, WritableSchema},
    },
    op::{Row, rows_from_grid},
    records::{RaffleEntry, User},
    runtime::database::Database,
    types::{Timestamp, format_timestamp, parse_timestamp},
};

use super::parse_u32;

#[async_trait]
pub trait RaffleRepository: Send + Sync {
    fn entries_for(&self, full_name: &str) -> Vec<Arc<RaffleEntry>>;

    /// Every entry grouped by full name.
    fn entries_by_user(&self) -> BTreeMap<String, Vec<Arc<RaffleEntry>>>;

    /// Issues the next ticket to `user`.
    async fn create(&self, user: &User, now: Timestamp) -> Arc<RaffleEntry>;
}

pub struct RaffleIndexes {
    pub by_ticket: UniqueIndex<RaffleEntry, u32>,
    pub by_full_name: BucketIndex<RaffleEntry, String>,
}

impl IndexSet<RaffleEntry> for RaffleIndexes {
    fn indexes_mut(&mut self) -> Vec<&mut dyn Index<RaffleEntry>> {
        vec![&mut self.by_ticket, &mut self.by_full_name]
    }
}

impl RaffleIndexes {
    fn next_ticket(&self) -> u32 {
        self.by_ticket.values().map(|entry| entry.ticket).max().unwrap_or(0) + 1
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RaffleSchema;

impl TableSchema for RaffleSchema {
    type Record = RaffleEntry;
    type Indexes = RaffleIndexes;

    fn new_indexes(&self) -> RaffleIndexes {
        RaffleIndexes {
            by_ticket: UniqueIndex::new(|entry: &RaffleEntry| Some(entry.ticket)),
            by_full_name: BucketIndex::new(|entry: &RaffleEntry| Some(entry.full_name.clone())),
        }
    }

    /// A blank ticket cell reads as ticket 0 until [`RaffleSchema::parse`] numbers it.
    fn deserialize(&self, row: &Row) -> Option<RaffleEntry> {
        Some(RaffleEntry {
            full_name: row.non_empty("full_name")?.to_string(),
            ticket: parse_u32(row.text("ticket")).unwrap_or(0),
            created_at: parse_timestamp(row.text("date")),
        })
    }

    /// Entries typed in by hand may lack a ticket or repeat one; those get
    /// fresh numbers after the highest ticket, in sheet order.
    fn parse(&self, grid: &[Vec<String>]) -> Vec<RaffleEntry> {
        let mut entries: Vec<RaffleEntry> = rows_from_grid(grid)
            .iter()
            .filter_map(|row| self.deserialize(row))
            .collect();

        let mut next = entries.iter().map(|entry| entry.ticket).max().unwrap_or(0) + 1;
        let mut seen = HashSet::new();
        for entry in &mut entries {
            if entry.ticket == 0 || !seen.insert(entry.ticket) {
                entry.ticket = next;
                seen.insert(next);
                next += 1;
            }
        }
        entries
    }
}

impl WritableSchema for RaffleSchema {
    const KEY_COLUMN: &'static str = "ticket";

    fn serialize(&self, entry: &RaffleEntry) -> Row {
        Row::new()
            .with("full_name", entry.full_name.as_str())
            .with("ticket", entry.ticket.to_string())
            .with("date", format_timestamp(entry.created_at))
    }

    fn row_key(&self, entry: &RaffleEntry) -> String {
        entry.ticket.to_string()
    }

    fn existing(&self, indexes: &RaffleIndexes, entry: &RaffleEntry) -> Option<Arc<RaffleEntry>> {
        indexes.by_ticket.get(&entry.ticket)
    }
}

pub struct SheetRaffleRepository {
    table: Table<RaffleSchema>,
    issue: tokio::sync::Mutex<()>,
}

impl SheetRaffleRepository {
    pub fn attach(db: Arc<Database>, sheet: &str) -> Self {
        Self {
            table: Table::attach(db, sheet, RaffleSchema),
            issue: tokio::sync::Mutex::new(()),
        }
    }

    pub fn table(&self) -> &Table<RaffleSchema> {
        &self.table
    }
}

#[async_trait]
impl RaffleRepository for SheetRaffleRepository {
    fn entries_for(&self, full_name: &str) -> Vec<Arc<RaffleEntry>> {
        self.table.read().by_full_name.get(full_name).unwrap_or_default()
    }

    fn entries_by_user(&self) -> BTreeMap<String, Vec<Arc<RaffleEntry>>> {
        self.table.read().by_full_name.raw().into_iter().collect()
    }

    async fn create(&self, user: &User, now: Timestamp) -> Arc<RaffleEntry> {
        let _issue = self.issue.lock().await;
        let ticket = self.table.read().next_ticket();
        self.table
            .insert(RaffleEntry {
                full_name: user.full_name.clone(),
                ticket,
                created_at: Some(now),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[[&str; 2]]) -> Vec<Vec<String>> {
        let mut grid = vec![vec!["Full Name".to_string(), "Ticket".to_string()]];
        grid.extend(rows.iter().map(|r| r.iter().map(|c| c.to_string()).collect()));
        grid
    }

    #[test]
    fn missing_and_repeated_tickets_are_renumbered() {
        let entries = RaffleSchema.parse(&grid(&[["Ana", "3"], ["Bo", ""], ["Cy", "3"], ["", "9"]]));

        let tickets: Vec<(&str, u32)> = entries
            .iter()
            .map(|e| (e.full_name.as_str(), e.ticket))
            .collect();
        assert_eq!(tickets, vec![("Ana", 3), ("Bo", 4), ("Cy", 5)]);
    }
}
