use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;

use crate::{
    core::{
        index::{Index, IndexSet},
        indices::UniqueIndex,
        table::{Table, TableSchema, WritableSchema},
    },
    op::Row,
    records::VisitsEntry,
    runtime::database::Database,
    types::{Month, format_timestamp, month_column, parse_month_column, parse_timestamp},
};

use super::parse_u32;

#[async_trait]
pub trait VisitRepository: Send + Sync {
    /// Stored entry, or an empty one for members who never visited.
    fn entry_for(&self, full_name: &str) -> VisitsEntry;

    /// `(full name, visits)` for everyone who visited in `month`, most visits first.
    fn visitors_in_month(&self, month: Month) -> Vec<(String, u32)>;

    /// Updates known members and appends new ones.
    async fn save_all(&self, entries: Vec<VisitsEntry>) -> Vec<Arc<VisitsEntry>>;
}

pub struct VisitIndexes {
    pub by_full_name: UniqueIndex<VisitsEntry, String>,
}

impl IndexSet<VisitsEntry> for VisitIndexes {
    fn indexes_mut(&mut self) -> Vec<&mut dyn Index<VisitsEntry>> {
        vec![&mut self.by_full_name]
    }
}

/// One row per member: `full_name`, `last_visit`, then one column per month
/// (`Nov 2024`). Month columns are created on first write.
#[derive(Debug, Default, Clone, Copy)]
pub struct VisitSchema;

impl TableSchema for VisitSchema {
    type Record = VisitsEntry;
    type Indexes = VisitIndexes;

    fn new_indexes(&self) -> VisitIndexes {
        VisitIndexes {
            by_full_name: UniqueIndex::new(|entry: &VisitsEntry| Some(entry.full_name.clone())),
        }
    }

    fn deserialize(&self, row: &Row) -> Option<VisitsEntry> {
        let full_name = row.non_empty("full_name")?;

        let by_month: BTreeMap<Month, u32> = row
            .iter()
            .filter_map(|(key, value)| Some((parse_month_column(key)?, parse_u32(value)?)))
            .filter(|(_, visits)| *visits > 0)
            .collect();

        Some(VisitsEntry {
            full_name: full_name.to_string(),
            last_visit: parse_timestamp(row.text("last_visit")),
            by_month,
        })
    }
}

impl WritableSchema for VisitSchema {
    const KEY_COLUMN: &'static str = "full_name";

    fn serialize(&self, entry: &VisitsEntry) -> Row {
        let mut row = Row::new()
            .with("full_name", entry.full_name.as_str())
            .with("last_visit", format_timestamp(entry.last_visit));
        for (month, visits) in &entry.by_month {
            row.set(month_column(*month), visits.to_string());
        }
        row
    }

    fn row_key(&self, entry: &VisitsEntry) -> String {
        entry.full_name.clone()
    }

    fn existing(&self, indexes: &VisitIndexes, entry: &VisitsEntry) -> Option<Arc<VisitsEntry>> {
        indexes.by_full_name.get(entry.full_name.as_str())
    }
}

pub struct SheetVisitRepository {
    table: Table<VisitSchema>,
}

impl SheetVisitRepository {
    pub fn attach(db: Arc<Database>, sheet: &str) -> Self {
        Self {
            table: Table::attach(db, sheet, VisitSchema),
        }
    }

    pub fn table(&self) -> &Table<VisitSchema> {
        &self.table
    }
}

#[async_trait]
impl VisitRepository for SheetVisitRepository {
    fn entry_for(&self, full_name: &str) -> VisitsEntry {
        self.table
            .read()
            .by_full_name
            .get(full_name)
            .map(|entry| entry.as_ref().clone())
            .unwrap_or_else(|| VisitsEntry::new(full_name))
    }

    fn visitors_in_month(&self, month: Month) -> Vec<(String, u32)> {
        let mut visitors: Vec<(String, u32)> = self
            .table
            .read()
            .by_full_name
            .values()
            .filter_map(|entry| {
                let visits = entry.visits_in(month);
                (visits > 0).then(|| (entry.full_name.clone(), visits))
            })
            .collect();
        visitors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        visitors
    }

    async fn save_all(&self, entries: Vec<VisitsEntry>) -> Vec<Arc<VisitsEntry>> {
        self.table.save_all(entries).await
    }
}
