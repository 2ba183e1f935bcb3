use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    core::{
        index::{Index, IndexSet, Record},
        indices::SortedBucketIndex,
        table::{Table, TableSchema, WritableSchema},
    },
    op::Row,
    records::Nomination,
    runtime::database::Database,
    types::{Timestamp, format_timestamp, parse_timestamp},
};

#[async_trait]
pub trait NominationRepository: Send + Sync {
    async fn insert(&self, nomination: Nomination) -> Arc<Nomination>;

    /// True when `voter` has nominated someone at or after `since`.
    fn has_voted(&self, voter: &str, since: Timestamp) -> bool;
}

pub struct NominationIndexes {
    pub by_voter: SortedBucketIndex<Nomination, String, Timestamp>,
}

impl IndexSet<Nomination> for NominationIndexes {
    fn indexes_mut(&mut self) -> Vec<&mut dyn Index<Nomination>> {
        vec![&mut self.by_voter]
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NominationSchema;

impl TableSchema for NominationSchema {
    type Record = Nomination;
    type Indexes = NominationIndexes;

    fn new_indexes(&self) -> NominationIndexes {
        NominationIndexes {
            by_voter: SortedBucketIndex::new(
                |nomination: &Nomination| Some(nomination.voter.clone()),
                |nomination: &Nomination| nomination.date,
            ),
        }
    }

    fn deserialize(&self, row: &Row) -> Option<Nomination> {
        Some(Nomination {
            nominee: row.non_empty("nominee")?.to_string(),
            date: parse_timestamp(row.text("date"))?,
            voter: row.non_empty("voted_by")?.to_string(),
            reason: row.text("reason").to_string(),
        })
    }
}

impl WritableSchema for NominationSchema {
    const KEY_COLUMN: &'static str = "date";

    fn serialize(&self, nomination: &Nomination) -> Row {
        Row::new()
            .with("nominee", nomination.nominee.as_str())
            .with("date", format_timestamp(Some(nomination.date)))
            .with("voted_by", nomination.voter.as_str())
            .with("reason", nomination.reason.as_str())
    }

    fn row_key(&self, nomination: &Nomination) -> String {
        format_timestamp(Some(nomination.date))
    }

    fn existing(&self, indexes: &NominationIndexes, nomination: &Nomination) -> Option<Arc<Nomination>> {
        let id = nomination.id();
        indexes
            .by_voter
            .get_ref(nomination.voter.as_str())?
            .iter()
            .find(|held| held.id() == id)
            .cloned()
    }
}

pub struct SheetNominationRepository {
    table: Table<NominationSchema>,
}

impl SheetNominationRepository {
    pub fn attach(db: Arc<Database>, sheet: &str) -> Self {
        Self {
            table: Table::attach(db, sheet, NominationSchema),
        }
    }

    pub fn table(&self) -> &Table<NominationSchema> {
        &self.table
    }
}

#[async_trait]
impl NominationRepository for SheetNominationRepository {
    async fn insert(&self, nomination: Nomination) -> Arc<Nomination> {
        self.table.insert(nomination).await
    }

    fn has_voted(&self, voter: &str, since: Timestamp) -> bool {
        self.table
            .read()
            .by_voter
            .get_ref(voter)
            .and_then(|votes| votes.last())
            .is_some_and(|latest| latest.date >= since)
    }
}
