use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    core::index::Record,
    types::{Month, Timestamp},
};

/// Visit counts of one member, by month.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VisitsEntry {
    pub full_name: String,
    pub last_visit: Option<Timestamp>,
    pub by_month: BTreeMap<Month, u32>,
}

impl VisitsEntry {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            ..Self::default()
        }
    }

    pub fn visits_in(&self, month: Month) -> u32 {
        self.by_month.get(&month).copied().unwrap_or(0)
    }

    /// Returns a copy with `counts` added on top of the stored counts.
    pub fn add_visits(&self, counts: &BTreeMap<Month, u32>) -> Self {
        let mut by_month = self.by_month.clone();
        for (month, count) in counts {
            let slot = by_month.entry(*month).or_insert(0);
            *slot = slot.saturating_add(*count);
        }
        Self {
            by_month,
            ..self.clone()
        }
    }

    pub fn with_last_visit(self, last_visit: Timestamp) -> Self {
        Self {
            last_visit: Some(last_visit),
            ..self
        }
    }
}

impl Record for VisitsEntry {
    type Id = String;

    fn id(&self) -> String {
        self.full_name.clone()
    }
}
